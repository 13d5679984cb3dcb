//! Backend message contract.
//!
//! Outbound frames are JSON arrays `[type, data]`. Inbound frames are JSON
//! objects `{"command": "<TOKEN>"}`.

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::{
    clock::Millis,
    config::DeviceIdentity,
    session::{SessionCommand, StateChange},
};

/// Largest frame the device encodes or accepts.
pub const FRAME_BYTES: usize = 512;

pub type Frame = String<FRAME_BYTES>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProtocolError {
    /// Payload is not a JSON object of the expected shape.
    Malformed,
    /// Object has no `command` field.
    MissingCommand,
    UnknownCommand,
    /// Encoded message does not fit in a [`Frame`].
    Encode,
}

/// Decoded inbound request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InboundCommand {
    Session(SessionCommand),
    Ping,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MessageKind {
    HardwareConnect,
    SensorData,
    StateChange,
    Heartbeat,
    Pong,
}

impl MessageKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HardwareConnect => "hardware_connect",
            Self::SensorData => "sensor_data",
            Self::StateChange => "state_change",
            Self::Heartbeat => "heartbeat",
            Self::Pong => "pong",
        }
    }
}

#[derive(Deserialize)]
struct InboundFrame<'a> {
    #[serde(borrow, default)]
    command: Option<&'a str>,
}

/// Maps a case-sensitive command token.
pub fn parse_command_token(token: &str) -> Result<InboundCommand, ProtocolError> {
    let command = match token {
        "START" => SessionCommand::Start,
        "STOP" | "CANCEL" => SessionCommand::Stop,
        "PAUSE" => SessionCommand::Pause,
        "RESUME" => SessionCommand::Resume,
        "ACKNOWLEDGE" => SessionCommand::Acknowledge,
        "PING" => return Ok(InboundCommand::Ping),
        _ => return Err(ProtocolError::UnknownCommand),
    };
    Ok(InboundCommand::Session(command))
}

pub fn decode_inbound(payload: &str) -> Result<InboundCommand, ProtocolError> {
    let (frame, _) = serde_json_core::from_str::<InboundFrame<'_>>(payload)
        .map_err(|_| ProtocolError::Malformed)?;
    let token = frame.command.ok_or(ProtocolError::MissingCommand)?;
    parse_command_token(token)
}

/// Extracts the raw token for logging, without validating it.
pub fn command_token(payload: &str) -> Option<&str> {
    serde_json_core::from_str::<InboundFrame<'_>>(payload)
        .ok()
        .and_then(|(frame, _)| frame.command)
}

pub fn encode<T: Serialize>(kind: MessageKind, data: &T) -> Result<Frame, ProtocolError> {
    serde_json_core::to_string::<_, FRAME_BYTES>(&(kind.as_str(), data))
        .map_err(|_| ProtocolError::Encode)
}

#[derive(Serialize)]
pub struct HardwareConnect<'a> {
    pub hardware_id: &'a str,
    pub version: &'a str,
    pub board: &'a str,
    pub features: &'a str,
}

impl<'a> From<&'a DeviceIdentity> for HardwareConnect<'a> {
    fn from(identity: &'a DeviceIdentity) -> Self {
        Self {
            hardware_id: identity.hardware_id,
            version: identity.version,
            board: identity.board,
            features: identity.features,
        }
    }
}

#[derive(Serialize)]
pub struct SensorData<'a> {
    pub hardware_id: &'a str,
    pub state: &'a str,
    pub box_open: bool,
    pub radar_presence: bool,
    /// Seconds.
    pub uptime: u32,
    pub timestamp: Millis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mic_db: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nfc_detected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nfc_id: Option<&'a str>,
}

#[derive(Serialize)]
pub struct StateChangeData<'a> {
    pub hardware_id: &'a str,
    pub previous_state: &'a str,
    pub current_state: &'a str,
    pub timestamp: Millis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_focus_time_ms: Option<Millis>,
}

impl<'a> StateChangeData<'a> {
    pub fn new(hardware_id: &'a str, change: &StateChange) -> Self {
        Self {
            hardware_id,
            previous_state: change.previous.as_str(),
            current_state: change.current.as_str(),
            timestamp: change.at_ms,
            total_focus_time_ms: change.total_focus_time_ms,
        }
    }
}

#[derive(Serialize)]
pub struct Heartbeat<'a> {
    pub hardware_id: &'a str,
    pub state: &'a str,
    pub uptime: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_quality: Option<i8>,
    pub free_memory: u32,
}

#[derive(Serialize)]
pub struct Pong<'a> {
    pub hardware_id: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;

    #[test]
    fn command_tokens_are_case_sensitive() {
        assert_eq!(
            parse_command_token("START"),
            Ok(InboundCommand::Session(SessionCommand::Start))
        );
        assert_eq!(
            parse_command_token("CANCEL"),
            Ok(InboundCommand::Session(SessionCommand::Stop))
        );
        assert_eq!(parse_command_token("PING"), Ok(InboundCommand::Ping));
        assert_eq!(
            parse_command_token("start"),
            Err(ProtocolError::UnknownCommand)
        );
    }

    #[test]
    fn inbound_object_is_decoded() {
        assert_eq!(
            decode_inbound(r#"{"command":"ACKNOWLEDGE"}"#),
            Ok(InboundCommand::Session(SessionCommand::Acknowledge))
        );
        assert_eq!(
            decode_inbound(r#"{ "command" : "RESUME" }"#),
            Ok(InboundCommand::Session(SessionCommand::Resume))
        );
    }

    #[test]
    fn bad_inbound_payloads_are_classified() {
        assert_eq!(decode_inbound("not json"), Err(ProtocolError::Malformed));
        assert_eq!(decode_inbound(r#"{"command":"#), Err(ProtocolError::Malformed));
        assert_eq!(decode_inbound("{}"), Err(ProtocolError::MissingCommand));
        assert_eq!(
            decode_inbound(r#"{"command":"SELF_DESTRUCT"}"#),
            Err(ProtocolError::UnknownCommand)
        );
        assert_eq!(command_token(r#"{"command":"SELF_DESTRUCT"}"#), Some("SELF_DESTRUCT"));
    }

    #[test]
    fn state_change_frame_shape() {
        let change = StateChange {
            previous: SessionState::Focusing,
            current: SessionState::Violation,
            at_ms: 1_234,
            total_focus_time_ms: Some(500),
        };
        let frame = encode(
            MessageKind::StateChange,
            &StateChangeData::new("DEV_1", &change),
        )
        .unwrap();
        assert_eq!(
            frame.as_str(),
            r#"["state_change",{"hardware_id":"DEV_1","previous_state":"FOCUSING","current_state":"VIOLATION","timestamp":1234,"total_focus_time_ms":500}]"#
        );
    }

    #[test]
    fn focus_time_is_omitted_when_absent() {
        let change = StateChange {
            previous: SessionState::Idle,
            current: SessionState::Preparing,
            at_ms: 7,
            total_focus_time_ms: None,
        };
        let frame = encode(
            MessageKind::StateChange,
            &StateChangeData::new("DEV_1", &change),
        )
        .unwrap();
        assert!(!frame.contains("total_focus_time_ms"));
    }

    #[test]
    fn sensor_data_omits_missing_aux_fields() {
        let data = SensorData {
            hardware_id: "DEV_1",
            state: "IDLE",
            box_open: false,
            radar_presence: true,
            uptime: 12,
            timestamp: 12_345,
            mic_db: Some(42),
            nfc_detected: None,
            nfc_id: None,
        };
        let frame = encode(MessageKind::SensorData, &data).unwrap();
        assert_eq!(
            frame.as_str(),
            r#"["sensor_data",{"hardware_id":"DEV_1","state":"IDLE","box_open":false,"radar_presence":true,"uptime":12,"timestamp":12345,"mic_db":42}]"#
        );
    }

    #[test]
    fn hardware_connect_uses_identity() {
        let identity = DeviceIdentity::new("DEV_1", "0.1.0", "ESP32-S3", "lid,lcd,radar");
        let frame = encode(
            MessageKind::HardwareConnect,
            &HardwareConnect::from(&identity),
        )
        .unwrap();
        assert_eq!(
            frame.as_str(),
            r#"["hardware_connect",{"hardware_id":"DEV_1","version":"0.1.0","board":"ESP32-S3","features":"lid,lcd,radar"}]"#
        );
    }

    #[test]
    fn heartbeat_carries_negative_rssi() {
        let frame = encode(
            MessageKind::Heartbeat,
            &Heartbeat {
                hardware_id: "DEV_1",
                state: "FOCUSING",
                uptime: 60,
                link_quality: Some(-61),
                free_memory: 40_000,
            },
        )
        .unwrap();
        assert!(frame.contains(r#""link_quality":-61"#));
        assert!(frame.starts_with(r#"["heartbeat",{"#));
    }
}
