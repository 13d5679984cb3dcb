use crate::clock::{Millis, has_elapsed};

/// Filtered presence as seen by the rest of the device.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PresenceState {
    pub occupied: bool,
    pub vacant_since_ms: Option<Millis>,
}

/// Asymmetric hysteresis: presence asserts on the first positive reading and
/// clears only after a full window of continuous absence.
#[derive(Debug)]
pub struct PresenceFilter {
    hysteresis_ms: Millis,
    state: PresenceState,
}

impl PresenceFilter {
    pub const fn new(hysteresis_ms: Millis) -> Self {
        Self {
            hysteresis_ms,
            state: PresenceState {
                occupied: false,
                vacant_since_ms: None,
            },
        }
    }

    pub fn update(&mut self, now: Millis, raw_present: bool) {
        if raw_present {
            self.state.occupied = true;
            self.state.vacant_since_ms = None;
            return;
        }

        if !self.state.occupied {
            return;
        }

        let vacant_since = *self.state.vacant_since_ms.get_or_insert(now);
        if has_elapsed(now, vacant_since, self.hysteresis_ms) {
            self.state.occupied = false;
            self.state.vacant_since_ms = None;
        }
    }

    pub fn occupied(&self) -> bool {
        self.state.occupied
    }

    pub fn state(&self) -> PresenceState {
        self.state
    }
}
