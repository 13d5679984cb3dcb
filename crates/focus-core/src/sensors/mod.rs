//! Sensor conditioning between raw board signals and the session machine.

mod aux;
mod edge;
mod presence;

pub use aux::{AuxReadings, NFC_ID_BYTES, mic_db_from_raw, nfc_id_from_uid};
pub use edge::{EdgeCell, EdgeDebouncer, SensorSample};
pub use presence::{PresenceFilter, PresenceState};
