//! Backend link abstraction and the supervisor that owns its lifecycle.

mod supervisor;

#[cfg(test)]
pub(crate) mod fake;

pub use supervisor::{ConnectionState, ConnectionSupervisor, SupervisorConfig, SupervisorEvent};

/// Two-layer transport to the backend: a network association carrying a
/// message session (WebSocket-like) on top.
///
/// Every method must return immediately. `begin_*` only kick off work that
/// the board completes in the background; progress is observed through the
/// `*_up` queries on later ticks.
pub trait Link {
    type Error: core::fmt::Debug;

    /// Network association (Wi-Fi + IP) is usable.
    fn network_up(&mut self) -> bool;

    /// Message session is established on top of the network.
    fn session_up(&mut self) -> bool;

    /// Requests a fresh network association.
    fn begin_network(&mut self) -> Result<(), Self::Error>;

    /// Drops any stale session and starts a new handshake.
    fn begin_session(&mut self) -> Result<(), Self::Error>;

    /// Queues one outbound text frame.
    fn send_text(&mut self, text: &str) -> Result<(), Self::Error>;

    /// Copies the next inbound text frame into `buf`, returning its length.
    fn receive_text(&mut self, buf: &mut [u8]) -> Result<Option<usize>, Self::Error>;

    /// Received signal strength in dBm, if known.
    fn link_quality(&mut self) -> Option<i8> {
        None
    }
}
