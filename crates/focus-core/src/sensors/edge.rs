use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use log::debug;

use crate::clock::{Millis, elapsed_ms};

/// Edge mailbox written from interrupt context and drained by the poll loop.
///
/// The interrupt side only ever calls [`EdgeCell::on_raw_edge`]. Everything
/// else runs on the poll loop, which is the sole reader and clearer.
#[derive(Debug)]
pub struct EdgeCell {
    edge_at_ms: AtomicU32,
    pending: AtomicBool,
}

impl EdgeCell {
    pub const fn new() -> Self {
        Self {
            edge_at_ms: AtomicU32::new(0),
            pending: AtomicBool::new(false),
        }
    }

    /// Records a raw edge. Safe to call from an interrupt handler.
    ///
    /// Edges coalesce: a newer edge overwrites the timestamp of an older
    /// one that has not been drained yet.
    #[inline]
    pub fn on_raw_edge(&self, now: Millis) {
        self.edge_at_ms.store(now, Ordering::Relaxed);
        self.pending.store(true, Ordering::Release);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Timestamp of the most recent edge (meaningless before the first one).
    pub fn last_edge_at_ms(&self) -> Millis {
        self.edge_at_ms.load(Ordering::Acquire)
    }

    /// Clears the pending flag once the latest edge is at least `window_ms`
    /// old. Returns `false` while nothing is pending or the line is still
    /// settling.
    pub fn take_settled(&self, now: Millis, window_ms: Millis) -> bool {
        if !self.pending.load(Ordering::Acquire) {
            return false;
        }

        let edge_at = self.edge_at_ms.load(Ordering::Acquire);
        if elapsed_ms(now, edge_at) < window_ms {
            return false;
        }

        self.pending.store(false, Ordering::Release);

        // An edge that landed between the timestamp read and the clear must
        // not be lost.
        if self.edge_at_ms.load(Ordering::Acquire) != edge_at {
            self.pending.store(true, Ordering::Release);
            return false;
        }

        true
    }
}

impl Default for EdgeCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Poll-side view of one debounced line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SensorSample {
    pub raw_level: bool,
    pub last_edge_at_ms: Millis,
    pub stable_level: bool,
}

/// Turns coalesced interrupt edges into a stable level.
#[derive(Debug)]
pub struct EdgeDebouncer<'a> {
    cell: &'a EdgeCell,
    debounce_window_ms: Millis,
    sample: SensorSample,
}

impl<'a> EdgeDebouncer<'a> {
    pub fn new(cell: &'a EdgeCell, debounce_window_ms: Millis, initial_level: bool) -> Self {
        Self {
            cell,
            debounce_window_ms,
            sample: SensorSample {
                raw_level: initial_level,
                last_edge_at_ms: 0,
                stable_level: initial_level,
            },
        }
    }

    /// Forwards a raw edge to the shared cell.
    #[inline]
    pub fn on_raw_edge(&self, now: Millis) {
        self.cell.on_raw_edge(now);
    }

    /// Returns the new stable level when a settled edge changed it.
    pub fn poll(&mut self, now: Millis, current_raw_level: bool) -> Option<bool> {
        self.sample.raw_level = current_raw_level;

        if !self.cell.take_settled(now, self.debounce_window_ms) {
            return None;
        }
        self.sample.last_edge_at_ms = self.cell.last_edge_at_ms();

        if current_raw_level == self.sample.stable_level {
            debug!("debounce: bounce settled back to level={}", current_raw_level);
            return None;
        }

        self.sample.stable_level = current_raw_level;
        Some(current_raw_level)
    }

    pub fn stable_level(&self) -> bool {
        self.sample.stable_level
    }

    pub fn sample(&self) -> SensorSample {
        self.sample
    }
}
