use esp_hal::time::Instant;
use focus_core::clock::{Millis, MonotonicClock};

/// Milliseconds since boot, truncated to 32 bits.
///
/// Shared by the poll loop and the lid interrupt so edge timestamps and
/// poll timestamps come from the same source.
#[inline]
pub fn now_ms() -> Millis {
    Instant::now().duration_since_epoch().as_millis() as Millis
}

/// System timer backed [`MonotonicClock`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl MonotonicClock for SystemClock {
    fn now_ms(&self) -> Millis {
        now_ms()
    }
}
