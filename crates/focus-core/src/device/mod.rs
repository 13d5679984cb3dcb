//! The single cooperative poll step that ties sensors, session, link and
//! telemetry together.

mod dispatch;

use log::{info, warn};

pub use dispatch::{CommandDispatcher, MAX_FRAMES_PER_TICK};

use crate::{
    clock::{Millis, has_elapsed},
    config::{DeviceConfig, DeviceIdentity},
    link::{ConnectionState, ConnectionSupervisor, Link, SupervisorConfig, SupervisorEvent},
    protocol::InboundCommand,
    render::Screen,
    sensors::{AuxReadings, EdgeCell, EdgeDebouncer, PresenceFilter},
    session::{SessionConfig, SessionMachine, SessionState, StateChange},
    telemetry::{SensorSnapshot, TelemetryPublisher},
};

/// Raw readings gathered by the board for one poll step.
#[derive(Clone, Debug, Default)]
pub struct SensorInputs {
    /// Current raw lid level; `true` means open.
    pub lid_open_raw: bool,
    /// `None` while no presence sensor is fitted; the filter then holds.
    pub presence_raw: Option<bool>,
    pub aux: AuxReadings,
    pub free_memory: u32,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TickOutcome {
    pub render_requested: bool,
    /// Set on the one tick where the reconnect window ran out.
    pub restart_requested: bool,
}

pub struct FocusDevice<'a, L: Link> {
    config: DeviceConfig,
    link: L,
    machine: SessionMachine,
    lid: EdgeDebouncer<'a>,
    presence: PresenceFilter,
    aux: AuxReadings,
    supervisor: ConnectionSupervisor,
    telemetry: TelemetryPublisher,
    dispatcher: CommandDispatcher,
    last_render_at_ms: Option<Millis>,
}

impl<'a, L: Link> FocusDevice<'a, L> {
    pub fn new(
        config: DeviceConfig,
        identity: DeviceIdentity,
        lid_cell: &'a EdgeCell,
        link: L,
        now: Millis,
        lid_open_initial: bool,
    ) -> Self {
        info!(
            "device: boot id={} lid_open={} debounce_ms={} prepare_ms={}",
            identity.hardware_id,
            lid_open_initial,
            config.debounce_window_ms,
            config.prepare_duration_ms
        );

        Self {
            config,
            link,
            machine: SessionMachine::new(
                SessionConfig {
                    prepare_duration_ms: config.prepare_duration_ms,
                },
                now,
            ),
            lid: EdgeDebouncer::new(lid_cell, config.debounce_window_ms, lid_open_initial),
            presence: PresenceFilter::new(config.presence_hysteresis_ms),
            aux: AuxReadings::default(),
            supervisor: ConnectionSupervisor::new(SupervisorConfig {
                reconnect_timeout_ms: config.reconnect_timeout_ms,
                retry_interval_ms: config.retry_interval_ms,
                heartbeat_interval_ms: config.heartbeat_interval_ms,
            }),
            telemetry: TelemetryPublisher::new(identity, config.sensor_interval_ms),
            dispatcher: CommandDispatcher::new(),
            last_render_at_ms: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    pub fn machine(&self) -> &SessionMachine {
        &self.machine
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    pub fn lid_open(&self) -> bool {
        self.lid.stable_level()
    }

    pub fn occupied(&self) -> bool {
        self.presence.occupied()
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn screen(&self, now: Millis) -> Screen {
        Screen::for_session(&self.machine, now, self.config.display_interval_ms)
    }

    /// Runs one poll step.
    pub fn tick(&mut self, now: Millis, inputs: &SensorInputs) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        if self.supervisor.restart_requested() {
            return outcome;
        }

        match self.supervisor.poll(&mut self.link, now) {
            Some(SupervisorEvent::Established) => {
                let may_publish = self.supervisor.may_publish();
                self.telemetry.announce(&mut self.link, may_publish);
            }
            Some(SupervisorEvent::Lost) => {
                warn!(
                    "device: backend unreachable; {} messages suppressed so far",
                    self.telemetry.suppressed()
                );
            }
            Some(SupervisorEvent::RestartRequired) => {
                outcome.restart_requested = true;
                return outcome;
            }
            None => {}
        }

        let state_before = self.machine.state();
        self.drain_commands(now);

        if let Some(open) = self.lid.poll(now, inputs.lid_open_raw) {
            info!("device: lid stable open={} at_ms={}", open, now);
        }

        let sample_due = self.telemetry.sample_due(now);
        if sample_due {
            if let Some(raw_present) = inputs.presence_raw {
                self.presence.update(now, raw_present);
            }
            self.aux = inputs.aux.clone();
        }

        if let Some(change) = self.machine.tick(now, self.lid.stable_level()) {
            self.publish_change(&change);
        }

        let may_publish = self.supervisor.may_publish();
        if sample_due {
            self.telemetry.publish_sensor_data(
                &mut self.link,
                may_publish,
                now,
                SensorSnapshot {
                    state: self.machine.state(),
                    box_open: self.lid.stable_level(),
                    radar_presence: self.presence.occupied(),
                    aux: &self.aux,
                },
            );
        }

        if self.supervisor.heartbeat_due(now) {
            self.telemetry.publish_heartbeat(
                &mut self.link,
                may_publish,
                now,
                self.machine.state(),
                inputs.free_memory,
            );
        }

        outcome.render_requested = self.machine.state() != state_before || self.render_due(now);
        if outcome.render_requested {
            self.last_render_at_ms = Some(now);
        }
        outcome
    }

    fn drain_commands(&mut self, now: Millis) {
        if !self.supervisor.may_publish() {
            return;
        }

        let machine = &mut self.machine;
        let telemetry = &mut self.telemetry;
        self.dispatcher.drain(&mut self.link, |link, command| match command {
            InboundCommand::Session(command) => {
                if let Some(change) = machine.apply(command, now) {
                    telemetry.publish_state_change(link, true, &change);
                }
            }
            InboundCommand::Ping => {
                telemetry.publish_pong(link, true);
            }
        });
    }

    fn publish_change(&mut self, change: &StateChange) {
        let may_publish = self.supervisor.may_publish();
        self.telemetry
            .publish_state_change(&mut self.link, may_publish, change);
    }

    fn render_due(&self, now: Millis) -> bool {
        self.last_render_at_ms
            .is_none_or(|last| has_elapsed(now, last, self.config.display_interval_ms))
    }
}

#[cfg(test)]
mod tests;
