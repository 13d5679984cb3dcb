//! Focus-session state machine.
//!
//! Every transition goes through [`SessionMachine::transition_to`], which
//! applies the entry effects from one table and returns the single
//! [`StateChange`] the transition emits. Requesting the current state is a
//! no-op: no timer moves and no event is produced.

use log::{debug, info};

use crate::clock::{Millis, elapsed_ms, has_elapsed};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    Idle,
    Preparing,
    Focusing,
    Paused,
    Violation,
    /// Reserved for host-level faults; no command or sensor path leads here.
    Error,
}

impl SessionState {
    /// Name used on the wire and in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Preparing => "PREPARING",
            Self::Focusing => "FOCUSING",
            Self::Paused => "PAUSED",
            Self::Violation => "VIOLATION",
            Self::Error => "ERROR",
        }
    }

    const fn reports_focus_time(self) -> bool {
        matches!(self, Self::Violation | Self::Paused | Self::Idle)
    }
}

/// Commands that drive the session. `CANCEL` decodes to [`Self::Stop`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionCommand {
    Start,
    Stop,
    Pause,
    Resume,
    Acknowledge,
}

/// Emitted exactly once per transition.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StateChange {
    pub previous: SessionState,
    pub current: SessionState,
    pub at_ms: Millis,
    /// Present only for transitions into Violation, Paused or Idle.
    pub total_focus_time_ms: Option<Millis>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SessionConfig {
    pub prepare_duration_ms: Millis,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prepare_duration_ms: 10_000,
        }
    }
}

#[derive(Debug)]
pub struct SessionMachine {
    config: SessionConfig,
    state: SessionState,
    previous: SessionState,
    entered_at_ms: Millis,
    focus_started_at_ms: Millis,
    total_focus_time_ms: Millis,
}

impl SessionMachine {
    pub const fn new(config: SessionConfig, now: Millis) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            previous: SessionState::Idle,
            entered_at_ms: now,
            focus_started_at_ms: now,
            total_focus_time_ms: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn previous(&self) -> SessionState {
        self.previous
    }

    pub fn entered_at_ms(&self) -> Millis {
        self.entered_at_ms
    }

    /// Sum of completed focusing intervals, without the running one.
    pub fn total_focus_time_ms(&self) -> Millis {
        self.total_focus_time_ms
    }

    /// Session clock: completed intervals plus the running one while focusing.
    pub fn session_clock_ms(&self, now: Millis) -> Millis {
        if self.state == SessionState::Focusing {
            self.total_focus_time_ms
                .saturating_add(elapsed_ms(now, self.focus_started_at_ms))
        } else {
            self.total_focus_time_ms
        }
    }

    /// Milliseconds left in the preparation grace period, if preparing.
    pub fn prepare_remaining_ms(&self, now: Millis) -> Option<Millis> {
        if self.state != SessionState::Preparing {
            return None;
        }
        Some(
            self.config
                .prepare_duration_ms
                .saturating_sub(elapsed_ms(now, self.entered_at_ms)),
        )
    }

    /// Evaluates a command against the guard table. Commands with no
    /// matching guard for the current state are dropped.
    pub fn apply(&mut self, command: SessionCommand, now: Millis) -> Option<StateChange> {
        let next = match (self.state, command) {
            (_, SessionCommand::Stop) => SessionState::Idle,
            (SessionState::Idle, SessionCommand::Start) => SessionState::Preparing,
            (SessionState::Focusing, SessionCommand::Pause) => SessionState::Paused,
            (SessionState::Paused, SessionCommand::Resume) => SessionState::Focusing,
            (SessionState::Violation, SessionCommand::Acknowledge) => SessionState::Idle,
            (state, command) => {
                debug!(
                    "session: {:?} ignored in {}",
                    command,
                    state.as_str()
                );
                return None;
            }
        };

        self.transition_to(next, now)
    }

    /// Automatic transitions: the preparation timer and the lid violation.
    /// `lid_open` must be the debounced level.
    pub fn tick(&mut self, now: Millis, lid_open: bool) -> Option<StateChange> {
        match self.state {
            SessionState::Preparing
                if has_elapsed(now, self.entered_at_ms, self.config.prepare_duration_ms) =>
            {
                self.transition_to(SessionState::Focusing, now)
            }
            SessionState::Focusing if lid_open => {
                info!("session: lid opened during focus");
                self.transition_to(SessionState::Violation, now)
            }
            _ => None,
        }
    }

    /// Enters `next`, running exit and entry effects.
    pub fn transition_to(&mut self, next: SessionState, now: Millis) -> Option<StateChange> {
        if next == self.state {
            return None;
        }

        if self.state == SessionState::Focusing {
            self.total_focus_time_ms = self
                .total_focus_time_ms
                .saturating_add(elapsed_ms(now, self.focus_started_at_ms));
        }

        match next {
            SessionState::Idle => self.total_focus_time_ms = 0,
            SessionState::Preparing => self.total_focus_time_ms = 0,
            SessionState::Focusing => self.focus_started_at_ms = now,
            SessionState::Paused | SessionState::Violation | SessionState::Error => {}
        }

        // Reported after entry effects, so IDLE always carries 0.
        let reported_total = self.total_focus_time_ms;

        self.previous = self.state;
        self.state = next;
        self.entered_at_ms = now;

        info!(
            "session: {} -> {} at_ms={} total_focus_ms={}",
            self.previous.as_str(),
            self.state.as_str(),
            now,
            reported_total
        );

        Some(StateChange {
            previous: self.previous,
            current: self.state,
            at_ms: now,
            total_focus_time_ms: next.reports_focus_time().then_some(reported_total),
        })
    }
}

#[cfg(test)]
mod tests;
