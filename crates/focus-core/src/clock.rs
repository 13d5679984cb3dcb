//! Millisecond time base shared by every component.
//!
//! Timestamps are 32-bit and wrap. All window checks go through
//! [`elapsed_ms`], so a wrap between two readings still yields the right
//! difference as long as the real interval fits in `u32`.

/// Milliseconds from an arbitrary monotonic origin.
pub type Millis = u32;

/// Monotonic millisecond source supplied by the board.
pub trait MonotonicClock {
    fn now_ms(&self) -> Millis;
}

#[inline]
pub const fn elapsed_ms(now: Millis, since: Millis) -> Millis {
    now.wrapping_sub(since)
}

#[inline]
pub const fn has_elapsed(now: Millis, since: Millis, window_ms: Millis) -> bool {
    elapsed_ms(now, since) >= window_ms
}
