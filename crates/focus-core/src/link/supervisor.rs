use log::{error, info, warn};

use super::Link;
use crate::clock::{Millis, elapsed_ms, has_elapsed};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Lifecycle edges the poll step has to react to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SupervisorEvent {
    /// Link (re)established; announce the device before any telemetry.
    Established,
    /// Link dropped while connected; outbound messages are now suppressed.
    Lost,
    /// Reconnect window exhausted. The host must reset the device.
    RestartRequired,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SupervisorConfig {
    pub reconnect_timeout_ms: Millis,
    pub retry_interval_ms: Millis,
    pub heartbeat_interval_ms: Millis,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            reconnect_timeout_ms: 30_000,
            retry_interval_ms: 10_000,
            heartbeat_interval_ms: 5_000,
        }
    }
}

#[derive(Debug)]
pub struct ConnectionSupervisor {
    config: SupervisorConfig,
    state: ConnectionState,
    reconnect_started_at_ms: Option<Millis>,
    last_attempt_at_ms: Millis,
    network_was_up: bool,
    last_heartbeat_at_ms: Millis,
    restart_requested: bool,
}

impl ConnectionSupervisor {
    pub const fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected,
            reconnect_started_at_ms: None,
            last_attempt_at_ms: 0,
            network_was_up: false,
            last_heartbeat_at_ms: 0,
            restart_requested: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Outbound gate: telemetry and state-change notifications may be sent.
    pub fn may_publish(&self) -> bool {
        self.state == ConnectionState::Connected && !self.restart_requested
    }

    pub fn reconnect_started_at_ms(&self) -> Option<Millis> {
        self.reconnect_started_at_ms
    }

    pub fn restart_requested(&self) -> bool {
        self.restart_requested
    }

    /// Advances the link lifecycle by one tick.
    pub fn poll<L: Link>(&mut self, link: &mut L, now: Millis) -> Option<SupervisorEvent> {
        if self.restart_requested {
            return None;
        }

        let network_up = link.network_up();
        let session_up = network_up && link.session_up();

        if self.state == ConnectionState::Connected {
            if session_up {
                return None;
            }
            warn!(
                "link: lost (network_up={}); reconnect window started at_ms={}",
                network_up, now
            );
            self.state = ConnectionState::Disconnected;
            self.reconnect_started_at_ms = Some(now);
            self.network_was_up = network_up;
            return Some(SupervisorEvent::Lost);
        }

        let started_at = *self.reconnect_started_at_ms.get_or_insert(now);
        if elapsed_ms(now, started_at) > self.config.reconnect_timeout_ms {
            error!(
                "link: down for {}ms (limit {}ms); restart required",
                elapsed_ms(now, started_at),
                self.config.reconnect_timeout_ms
            );
            self.restart_requested = true;
            return Some(SupervisorEvent::RestartRequired);
        }

        if session_up {
            info!(
                "link: established after {}ms",
                elapsed_ms(now, started_at)
            );
            self.state = ConnectionState::Connected;
            self.reconnect_started_at_ms = None;
            self.network_was_up = true;
            self.last_heartbeat_at_ms = now;
            return Some(SupervisorEvent::Established);
        }

        // Network just came back: the old session is stale, handshake again
        // without waiting for the retry spacing.
        let network_recovered = network_up && !self.network_was_up;
        self.network_was_up = network_up;

        let retry_due = self.state == ConnectionState::Disconnected
            || network_recovered
            || has_elapsed(now, self.last_attempt_at_ms, self.config.retry_interval_ms);
        if retry_due {
            self.attempt(link, network_up, now);
        }

        None
    }

    /// Returns `true` once per heartbeat interval while connected.
    pub fn heartbeat_due(&mut self, now: Millis) -> bool {
        if !self.may_publish() {
            return false;
        }
        if has_elapsed(now, self.last_heartbeat_at_ms, self.config.heartbeat_interval_ms) {
            self.last_heartbeat_at_ms = now;
            return true;
        }
        false
    }

    fn attempt<L: Link>(&mut self, link: &mut L, network_up: bool, now: Millis) {
        let result = if network_up {
            info!("link: starting session handshake");
            link.begin_session()
        } else {
            info!("link: requesting network association");
            link.begin_network()
        };

        if let Err(err) = result {
            warn!("link: attempt failed: {:?}", err);
        }

        self.state = ConnectionState::Connecting;
        self.last_attempt_at_ms = now;
    }
}
