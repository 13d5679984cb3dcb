//! Wi-Fi/WebSocket connectivity shared between the async network workers and
//! the poll loop.
//!
//! The workers own the radio and the socket. The poll loop only sees them
//! through [`ChannelLink`], which never blocks.

pub mod ws;

use core::sync::atomic::{AtomicBool, AtomicI8, AtomicU8, Ordering};

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use focus_core::{link::Link, protocol::Frame};
use log::debug;

/// Frames buffered in each direction.
pub const LINK_QUEUE_DEPTH: usize = 8;

pub type FrameChannel = Channel<CriticalSectionRawMutex, Frame, LINK_QUEUE_DEPTH>;

const RSSI_UNKNOWN: i8 = i8::MIN;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ConnectivityState {
    Disconnected = 0,
    Associating = 1,
    /// Associated with an IPv4 lease, no backend session.
    NetworkUp = 2,
    SessionUp = 3,
}

impl ConnectivityState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Associating,
            2 => Self::NetworkUp,
            3 => Self::SessionUp,
            _ => Self::Disconnected,
        }
    }
}

/// Wi-Fi credentials source.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WifiConfig {
    pub ssid: &'static str,
    pub password: &'static str,
}

impl WifiConfig {
    pub const fn new(ssid: &'static str, password: &'static str) -> Self {
        Self { ssid, password }
    }
}

/// Backend WebSocket endpoint.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BackendEndpoint {
    pub host: &'static str,
    pub port: u16,
    pub path: &'static str,
}

impl BackendEndpoint {
    pub const fn new(host: &'static str, port: u16, path: &'static str) -> Self {
        Self { host, port, path }
    }
}

/// Immutable connectivity snapshot for the poll loop and logs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConnectivitySnapshot {
    pub state: ConnectivityState,
    pub rssi_dbm: Option<i8>,
}

impl ConnectivitySnapshot {
    pub const fn network_up(self) -> bool {
        matches!(
            self.state,
            ConnectivityState::NetworkUp | ConnectivityState::SessionUp
        )
    }

    pub const fn session_up(self) -> bool {
        matches!(self.state, ConnectivityState::SessionUp)
    }
}

/// Lock-free shared connectivity status plus restart requests flowing the
/// other way.
#[derive(Debug)]
pub struct ConnectivityHandle {
    state: AtomicU8,
    rssi_dbm: AtomicI8,
    network_restart: AtomicBool,
    session_restart: AtomicBool,
}

impl ConnectivityHandle {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectivityState::Disconnected as u8),
            rssi_dbm: AtomicI8::new(RSSI_UNKNOWN),
            network_restart: AtomicBool::new(false),
            session_restart: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> ConnectivitySnapshot {
        let rssi = self.rssi_dbm.load(Ordering::Acquire);
        ConnectivitySnapshot {
            state: ConnectivityState::from_raw(self.state.load(Ordering::Acquire)),
            rssi_dbm: (rssi != RSSI_UNKNOWN).then_some(rssi),
        }
    }

    pub fn mark_associating(&self) {
        self.update_state(ConnectivityState::Associating);
    }

    /// Association and DHCP done. Clears any pending network request.
    pub fn mark_network_up(&self) {
        self.network_restart.store(false, Ordering::Release);
        self.update_state(ConnectivityState::NetworkUp);
    }

    /// Session dropped while the network stays up.
    pub fn mark_session_down(&self) {
        if self.state.load(Ordering::Acquire) == ConnectivityState::SessionUp as u8 {
            self.update_state(ConnectivityState::NetworkUp);
        }
    }

    /// Handshake done. Clears any pending session request.
    pub fn mark_session_up(&self) {
        self.session_restart.store(false, Ordering::Release);
        self.update_state(ConnectivityState::SessionUp);
    }

    pub fn mark_disconnected(&self) {
        self.rssi_dbm.store(RSSI_UNKNOWN, Ordering::Release);
        self.update_state(ConnectivityState::Disconnected);
    }

    pub fn update_rssi(&self, rssi_dbm: i8) {
        self.rssi_dbm.store(rssi_dbm, Ordering::Release);
    }

    pub fn request_network_restart(&self) {
        self.network_restart.store(true, Ordering::Release);
    }

    pub fn request_session_restart(&self) {
        self.session_restart.store(true, Ordering::Release);
    }

    pub fn network_restart_requested(&self) -> bool {
        self.network_restart.load(Ordering::Acquire)
    }

    pub fn take_session_restart(&self) -> bool {
        self.session_restart.swap(false, Ordering::AcqRel)
    }

    fn update_state(&self, next: ConnectivityState) {
        if self.state.swap(next as u8, Ordering::AcqRel) != next as u8 {
            debug!("connectivity: state={:?}", next);
        }
    }
}

impl Default for ConnectivityHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame queues between the WebSocket worker and [`ChannelLink`].
pub struct LinkChannels {
    pub outbound: FrameChannel,
    pub inbound: FrameChannel,
}

impl LinkChannels {
    pub const fn new() -> Self {
        Self {
            outbound: Channel::new(),
            inbound: Channel::new(),
        }
    }
}

impl Default for LinkChannels {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LinkError {
    /// Outbound queue is full; the worker is behind.
    OutboxFull,
    FrameTooLarge,
}

/// Poll-loop side of the link. Every call returns immediately.
pub struct ChannelLink {
    connectivity: &'static ConnectivityHandle,
    channels: &'static LinkChannels,
}

impl ChannelLink {
    pub const fn new(
        connectivity: &'static ConnectivityHandle,
        channels: &'static LinkChannels,
    ) -> Self {
        Self {
            connectivity,
            channels,
        }
    }
}

impl Link for ChannelLink {
    type Error = LinkError;

    fn network_up(&mut self) -> bool {
        self.connectivity.snapshot().network_up()
    }

    fn session_up(&mut self) -> bool {
        self.connectivity.snapshot().session_up()
    }

    fn begin_network(&mut self) -> Result<(), Self::Error> {
        self.connectivity.request_network_restart();
        Ok(())
    }

    fn begin_session(&mut self) -> Result<(), Self::Error> {
        // Frames queued for a dead session must not leak into the next one.
        self.channels.outbound.clear();
        self.channels.inbound.clear();
        self.connectivity.request_session_restart();
        Ok(())
    }

    fn send_text(&mut self, text: &str) -> Result<(), Self::Error> {
        let frame = Frame::try_from(text).map_err(|_| LinkError::FrameTooLarge)?;
        self.channels
            .outbound
            .try_send(frame)
            .map_err(|_| LinkError::OutboxFull)
    }

    fn receive_text(&mut self, buf: &mut [u8]) -> Result<Option<usize>, Self::Error> {
        let Ok(frame) = self.channels.inbound.try_receive() else {
            return Ok(None);
        };
        let bytes = frame.as_bytes();
        let dst = buf.get_mut(..bytes.len()).ok_or(LinkError::FrameTooLarge)?;
        dst.copy_from_slice(bytes);
        Ok(Some(bytes.len()))
    }

    fn link_quality(&mut self) -> Option<i8> {
        self.connectivity.snapshot().rssi_dbm
    }
}
