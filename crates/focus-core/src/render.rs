//! Screen view model for the 16x2 character display.

use core::fmt::Write;

use heapless::String;

use crate::{
    clock::Millis,
    session::{SessionMachine, SessionState},
};

pub const LCD_COLUMNS: usize = 16;

pub type Line = String<LCD_COLUMNS>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Screen {
    /// Bring-up, before the control loop owns the display.
    Booting,
    Idle,
    Preparing {
        remaining_s: u32,
    },
    Focusing {
        clock_ms: Millis,
    },
    Paused {
        total_ms: Millis,
    },
    Violation {
        banner_visible: bool,
    },
    Error,
}

impl Screen {
    /// Derives the screen from session state alone. The violation banner
    /// toggles on every display frame.
    pub fn for_session(machine: &SessionMachine, now: Millis, display_interval_ms: Millis) -> Self {
        match machine.state() {
            SessionState::Idle => Self::Idle,
            SessionState::Preparing => Self::Preparing {
                remaining_s: machine.prepare_remaining_ms(now).unwrap_or(0) / 1_000,
            },
            SessionState::Focusing => Self::Focusing {
                clock_ms: machine.session_clock_ms(now),
            },
            SessionState::Paused => Self::Paused {
                total_ms: machine.total_focus_time_ms(),
            },
            SessionState::Violation => {
                let frame = now / display_interval_ms.max(1);
                Self::Violation {
                    banner_visible: frame % 2 == 0,
                }
            }
            SessionState::Error => Self::Error,
        }
    }

    pub fn lines(&self) -> [Line; 2] {
        let mut top = Line::new();
        let mut bottom = Line::new();

        // Every line fits in 16 columns, so the writes cannot fail.
        match *self {
            Self::Booting => {
                let _ = top.push_str("Focus Enforcer");
                let _ = bottom.push_str("WiFi Connecting");
            }
            Self::Idle => {
                let _ = top.push_str("  READY TO GO   ");
                let _ = bottom.push_str("  Waiting...    ");
            }
            Self::Preparing { remaining_s } => {
                let _ = top.push_str("  PREPARING...  ");
                let _ = write!(bottom, "  Start in: {remaining_s}s");
            }
            Self::Focusing { clock_ms } => {
                let _ = top.push_str("   FOCUSING     ");
                let _ = write!(bottom, "Time: {}", format_mm_ss(clock_ms));
            }
            Self::Paused { total_ms } => {
                let _ = top.push_str("    PAUSED      ");
                let _ = write!(bottom, "Total: {}", format_mm_ss(total_ms));
            }
            Self::Violation { banner_visible } => {
                if banner_visible {
                    let _ = top.push_str("!! VIOLATION !! ");
                }
                let _ = bottom.push_str("Box was opened! ");
            }
            Self::Error => {
                let _ = top.push_str("     ERROR      ");
                let _ = bottom.push_str(" Restart device ");
            }
        }

        [top, bottom]
    }
}

/// `MM:SS` with minutes zero-padded to two digits and otherwise unbounded.
pub fn format_mm_ss(ms: Millis) -> String<12> {
    let total_s = ms / 1_000;
    let mut out = String::new();
    let _ = write!(out, "{:02}:{:02}", total_s / 60, total_s % 60);
    out
}
