//! Timing policy and device identity.

use crate::clock::Millis;

/// Timing windows for the whole poll step.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DeviceConfig {
    pub debounce_window_ms: Millis,
    pub presence_hysteresis_ms: Millis,
    pub prepare_duration_ms: Millis,
    /// Cadence of presence/aux sampling and `sensor_data` messages.
    pub sensor_interval_ms: Millis,
    pub display_interval_ms: Millis,
    pub heartbeat_interval_ms: Millis,
    /// Link may stay down this long before the device restarts.
    pub reconnect_timeout_ms: Millis,
    /// Spacing between reconnect attempts on the same layer.
    pub retry_interval_ms: Millis,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            debounce_window_ms: 50,
            presence_hysteresis_ms: 3_000,
            prepare_duration_ms: 10_000,
            sensor_interval_ms: 100,
            display_interval_ms: 250,
            heartbeat_interval_ms: 5_000,
            reconnect_timeout_ms: 30_000,
            retry_interval_ms: 10_000,
        }
    }
}

impl DeviceConfig {
    pub const fn with_debounce_window_ms(mut self, debounce_window_ms: Millis) -> Self {
        self.debounce_window_ms = debounce_window_ms;
        self
    }

    pub const fn with_presence_hysteresis_ms(mut self, presence_hysteresis_ms: Millis) -> Self {
        self.presence_hysteresis_ms = presence_hysteresis_ms;
        self
    }

    pub const fn with_prepare_duration_ms(mut self, prepare_duration_ms: Millis) -> Self {
        self.prepare_duration_ms = prepare_duration_ms;
        self
    }

    pub const fn with_sensor_interval_ms(mut self, sensor_interval_ms: Millis) -> Self {
        self.sensor_interval_ms = sensor_interval_ms;
        self
    }

    pub const fn with_display_interval_ms(mut self, display_interval_ms: Millis) -> Self {
        self.display_interval_ms = display_interval_ms;
        self
    }

    pub const fn with_heartbeat_interval_ms(mut self, heartbeat_interval_ms: Millis) -> Self {
        self.heartbeat_interval_ms = heartbeat_interval_ms;
        self
    }

    pub const fn with_reconnect_timeout_ms(mut self, reconnect_timeout_ms: Millis) -> Self {
        self.reconnect_timeout_ms = reconnect_timeout_ms;
        self
    }

    pub const fn with_retry_interval_ms(mut self, retry_interval_ms: Millis) -> Self {
        self.retry_interval_ms = retry_interval_ms;
        self
    }
}

/// Static description announced in `hardware_connect` and stamped on
/// every outbound message.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DeviceIdentity {
    pub hardware_id: &'static str,
    pub version: &'static str,
    pub board: &'static str,
    /// Comma-separated feature tags, e.g. `"lid,lcd,radar"`.
    pub features: &'static str,
}

impl DeviceIdentity {
    pub const fn new(
        hardware_id: &'static str,
        version: &'static str,
        board: &'static str,
        features: &'static str,
    ) -> Self {
        Self {
            hardware_id,
            version,
            board,
            features,
        }
    }
}
