use core::fmt::Write;

use heapless::String;

/// Hex characters needed for the longest (7-byte) ISO14443A UID.
pub const NFC_ID_BYTES: usize = 14;

const MIC_DB_FLOOR: u16 = 30;
const MIC_DB_CEILING: u16 = 100;
const MIC_DB_CLAMP_MAX: u16 = 110;
const NFC_UID_MAX_BYTES: usize = NFC_ID_BYTES / 2;

/// Optional peripheral readings. `None` means the peripheral is absent or
/// has not produced a value; such fields are left out of telemetry.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AuxReadings {
    pub mic_db: Option<u8>,
    pub nfc_id: Option<String<NFC_ID_BYTES>>,
}

impl AuxReadings {
    pub fn nfc_detected(&self) -> Option<bool> {
        self.nfc_id.as_ref().map(|id| !id.is_empty())
    }
}

/// Maps raw ADC counts linearly onto the sound sensor's nominal dB range.
pub fn mic_db_from_raw(raw: u16, full_scale: u16) -> u8 {
    let full_scale = full_scale.max(1) as u32;
    let raw = (raw as u32).min(full_scale);
    let span = (MIC_DB_CEILING - MIC_DB_FLOOR) as u32;
    let db = MIC_DB_FLOOR as u32 + raw * span / full_scale;
    db.clamp(MIC_DB_FLOOR as u32, MIC_DB_CLAMP_MAX as u32) as u8
}

/// Formats a tag UID as upper-case hex. UIDs longer than 7 bytes are cut.
pub fn nfc_id_from_uid(uid: &[u8]) -> String<NFC_ID_BYTES> {
    let mut id = String::new();
    for byte in uid.iter().take(NFC_UID_MAX_BYTES) {
        let _ = write!(id, "{:02X}", byte);
    }
    id
}
