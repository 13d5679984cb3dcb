//! Outbound message emission, gated on link availability.

use log::{debug, warn};
use serde::Serialize;

use crate::{
    clock::{Millis, has_elapsed},
    config::DeviceIdentity,
    link::Link,
    protocol::{
        self, HardwareConnect, Heartbeat, MessageKind, Pong, SensorData, StateChangeData,
    },
    sensors::AuxReadings,
    session::{SessionState, StateChange},
};

/// Sensor view published at the sampling cadence.
#[derive(Clone, Copy, Debug)]
pub struct SensorSnapshot<'a> {
    pub state: SessionState,
    pub box_open: bool,
    pub radar_presence: bool,
    pub aux: &'a AuxReadings,
}

#[derive(Debug)]
pub struct TelemetryPublisher {
    identity: DeviceIdentity,
    sensor_interval_ms: Millis,
    last_sample_at_ms: Option<Millis>,
    suppressed: u32,
}

impl TelemetryPublisher {
    pub const fn new(identity: DeviceIdentity, sensor_interval_ms: Millis) -> Self {
        Self {
            identity,
            sensor_interval_ms,
            last_sample_at_ms: None,
            suppressed: 0,
        }
    }

    /// Messages dropped because the link was not connected.
    pub fn suppressed(&self) -> u32 {
        self.suppressed
    }

    /// Returns `true` once per sampling interval. The first call is due.
    pub fn sample_due(&mut self, now: Millis) -> bool {
        let due = self
            .last_sample_at_ms
            .is_none_or(|last| has_elapsed(now, last, self.sensor_interval_ms));
        if due {
            self.last_sample_at_ms = Some(now);
        }
        due
    }

    pub fn announce<L: Link>(&mut self, link: &mut L, may_publish: bool) -> bool {
        let identity = self.identity;
        self.send(
            link,
            may_publish,
            MessageKind::HardwareConnect,
            &HardwareConnect::from(&identity),
        )
    }

    pub fn publish_state_change<L: Link>(
        &mut self,
        link: &mut L,
        may_publish: bool,
        change: &StateChange,
    ) -> bool {
        let data = StateChangeData::new(self.identity.hardware_id, change);
        self.send(link, may_publish, MessageKind::StateChange, &data)
    }

    pub fn publish_sensor_data<L: Link>(
        &mut self,
        link: &mut L,
        may_publish: bool,
        now: Millis,
        snapshot: SensorSnapshot<'_>,
    ) -> bool {
        let data = SensorData {
            hardware_id: self.identity.hardware_id,
            state: snapshot.state.as_str(),
            box_open: snapshot.box_open,
            radar_presence: snapshot.radar_presence,
            uptime: now / 1_000,
            timestamp: now,
            mic_db: snapshot.aux.mic_db,
            nfc_detected: snapshot.aux.nfc_detected(),
            nfc_id: snapshot.aux.nfc_id.as_deref(),
        };
        self.send(link, may_publish, MessageKind::SensorData, &data)
    }

    pub fn publish_heartbeat<L: Link>(
        &mut self,
        link: &mut L,
        may_publish: bool,
        now: Millis,
        state: SessionState,
        free_memory: u32,
    ) -> bool {
        let data = Heartbeat {
            hardware_id: self.identity.hardware_id,
            state: state.as_str(),
            uptime: now / 1_000,
            link_quality: link.link_quality(),
            free_memory,
        };
        self.send(link, may_publish, MessageKind::Heartbeat, &data)
    }

    pub fn publish_pong<L: Link>(&mut self, link: &mut L, may_publish: bool) -> bool {
        let data = Pong {
            hardware_id: self.identity.hardware_id,
        };
        self.send(link, may_publish, MessageKind::Pong, &data)
    }

    fn send<L: Link, T: Serialize>(
        &mut self,
        link: &mut L,
        may_publish: bool,
        kind: MessageKind,
        data: &T,
    ) -> bool {
        if !may_publish {
            self.suppressed = self.suppressed.saturating_add(1);
            return false;
        }

        let frame = match protocol::encode(kind, data) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("telemetry: {} encode failed: {:?}", kind.as_str(), err);
                return false;
            }
        };

        match link.send_text(&frame) {
            Ok(()) => {
                debug!("telemetry: sent {} bytes={}", kind.as_str(), frame.len());
                true
            }
            Err(err) => {
                warn!("telemetry: {} send failed: {:?}", kind.as_str(), err);
                false
            }
        }
    }
}
