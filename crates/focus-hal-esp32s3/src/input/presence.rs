use embedded_hal::digital::InputPin;
use log::warn;

/// LD2410 radar `OUT` line: high while a person is detected.
///
/// Read errors are reported as "no reading" so the presence filter holds
/// its last value instead of clearing.
#[derive(Debug)]
pub struct PresenceLine<P> {
    pin: P,
    fault_logged: bool,
}

impl<P> PresenceLine<P>
where
    P: InputPin,
{
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            fault_logged: false,
        }
    }

    pub fn read(&mut self) -> Option<bool> {
        match self.pin.is_high() {
            Ok(high) => Some(high),
            Err(err) => {
                if !self.fault_logged {
                    warn!("presence: read failed: {:?}", err);
                    self.fault_logged = true;
                }
                None
            }
        }
    }
}
