use esp_hal::{
    Blocking,
    analog::adc::{Adc, AdcChannel, AdcPin},
    peripherals::ADC1,
};
use focus_core::sensors::mic_db_from_raw;

/// 12-bit one-shot full scale.
const ADC_FULL_SCALE: u16 = 4_095;
/// One-shot conversions complete within a few polls.
const READ_ATTEMPTS: u8 = 8;

/// Sound level sensor on an ADC1 channel.
pub struct Microphone<'d, PIN> {
    adc: Adc<'d, ADC1<'d>, Blocking>,
    pin: AdcPin<PIN, ADC1<'d>>,
}

impl<'d, PIN> Microphone<'d, PIN>
where
    PIN: AdcChannel,
{
    pub fn new(adc: Adc<'d, ADC1<'d>, Blocking>, pin: AdcPin<PIN, ADC1<'d>>) -> Self {
        Self { adc, pin }
    }

    pub fn read_raw(&mut self) -> Option<u16> {
        (0..READ_ATTEMPTS).find_map(|_| self.adc.read_oneshot(&mut self.pin).ok())
    }

    /// Calibrated level in dB, or `None` when no conversion completed.
    pub fn read_db(&mut self) -> Option<u8> {
        self.read_raw().map(|raw| mic_db_from_raw(raw, ADC_FULL_SCALE))
    }
}
