//! WebSocket session worker.
//!
//! Waits for the poll loop to request a session, then connects over TCP,
//! performs the HTTP upgrade and pumps text frames between the socket and
//! [`LinkChannels`] until the session dies or a restart is requested.

use core::{net::Ipv4Addr, str::FromStr};

use embassy_futures::select::{Either3, select3};
use embassy_net::{Stack, tcp::TcpSocket};
use embassy_time::{Duration, Timer};
use embedded_io_async::Write;
use embedded_websocket::{
    WebSocketClient, WebSocketCloseStatusCode, WebSocketOptions, WebSocketReceiveMessageType,
    WebSocketSendMessageType,
};
use esp_hal::rng::Rng;
use focus_core::protocol::{FRAME_BYTES, Frame};
use log::{info, warn};
use rand_core::{CryptoRng, RngCore};

use super::{BackendEndpoint, ConnectivityHandle, LinkChannels};

const SOCKET_BUFFER_BYTES: usize = 1_024;
const WIRE_BUFFER_BYTES: usize = FRAME_BYTES + 16;
const HANDSHAKE_BUFFER_BYTES: usize = 512;
const SOCKET_TIMEOUT_SECS: u64 = 15;
const REQUEST_POLL_MS: u64 = 100;

/// Hardware RNG adapter for the WebSocket masking keys.
#[derive(Clone, Copy)]
pub struct HardwareRng(Rng);

impl HardwareRng {
    pub fn new(rng: Rng) -> Self {
        Self(rng)
    }
}

impl RngCore for HardwareRng {
    fn next_u32(&mut self) -> u32 {
        self.0.random()
    }

    fn next_u64(&mut self) -> u64 {
        (u64::from(self.next_u32()) << 32) | u64::from(self.next_u32())
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let word = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl CryptoRng for HardwareRng {}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SessionEnd {
    Closed,
    Restart,
    Error,
}

/// Runs the session layer forever. Never touches session state; the poll
/// loop observes progress through `connectivity`.
pub async fn session_loop(
    stack: Stack<'_>,
    connectivity: &'static ConnectivityHandle,
    channels: &'static LinkChannels,
    endpoint: BackendEndpoint,
    mut rng: HardwareRng,
) -> ! {
    let address = match Ipv4Addr::from_str(endpoint.host) {
        Ok(address) => address,
        Err(_) => {
            warn!(
                "ws: backend host {} is not an IPv4 address; session layer disabled",
                endpoint.host
            );
            loop {
                Timer::after_secs(60).await;
            }
        }
    };

    let mut rx_buffer = [0u8; SOCKET_BUFFER_BYTES];
    let mut tx_buffer = [0u8; SOCKET_BUFFER_BYTES];

    loop {
        while !(connectivity.snapshot().network_up() && connectivity.take_session_restart()) {
            Timer::after_millis(REQUEST_POLL_MS).await;
        }

        let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
        socket.set_timeout(Some(Duration::from_secs(SOCKET_TIMEOUT_SECS)));

        info!(
            "ws: connecting to {}:{}{}",
            address, endpoint.port, endpoint.path
        );
        if let Err(err) = socket.connect((address, endpoint.port)).await {
            warn!("ws: tcp connect failed: {:?}", err);
            continue;
        }

        let end = run_session(&mut socket, connectivity, channels, endpoint, &mut rng).await;
        connectivity.mark_session_down();
        info!("ws: session ended reason={:?}", end);

        socket.close();
        let _ = socket.flush().await;
        socket.abort();
    }
}

async fn run_session(
    socket: &mut TcpSocket<'_>,
    connectivity: &'static ConnectivityHandle,
    channels: &'static LinkChannels,
    endpoint: BackendEndpoint,
    rng: &mut HardwareRng,
) -> SessionEnd {
    let mut ws = WebSocketClient::new_client(*rng);
    let mut wire = [0u8; WIRE_BUFFER_BYTES];
    let mut read_buf = [0u8; WIRE_BUFFER_BYTES];
    let mut read_len = 0usize;

    let mut host_header: heapless::String<32> = heapless::String::new();
    if core::fmt::write(&mut host_header, format_args!("{}:{}", endpoint.host, endpoint.port))
        .is_err()
    {
        return SessionEnd::Error;
    }

    let options = WebSocketOptions {
        path: endpoint.path,
        host: &host_header,
        origin: "",
        sub_protocols: None,
        additional_headers: None,
    };

    let mut handshake = [0u8; HANDSHAKE_BUFFER_BYTES];
    let key = match ws.client_connect(&options, &mut handshake) {
        Ok((len, key)) => {
            if let Err(err) = socket.write_all(&handshake[..len]).await {
                warn!("ws: upgrade request failed: {:?}", err);
                return SessionEnd::Error;
            }
            key
        }
        Err(err) => {
            warn!("ws: upgrade request encode failed: {:?}", err);
            return SessionEnd::Error;
        }
    };

    loop {
        let n = match socket.read(&mut read_buf[read_len..]).await {
            Ok(0) => return SessionEnd::Closed,
            Ok(n) => n,
            Err(err) => {
                warn!("ws: upgrade response read failed: {:?}", err);
                return SessionEnd::Error;
            }
        };
        read_len += n;

        match ws.client_accept(&key, &read_buf[..read_len]) {
            Ok((consumed, _)) => {
                read_buf.copy_within(consumed..read_len, 0);
                read_len -= consumed;
                break;
            }
            Err(embedded_websocket::Error::HttpHeaderIncomplete) if read_len < read_buf.len() => {}
            Err(err) => {
                warn!("ws: upgrade rejected: {:?}", err);
                return SessionEnd::Error;
            }
        }
    }

    connectivity.mark_session_up();
    info!("ws: session up");

    loop {
        if read_len > 0 {
            match drain_frames(&mut ws, &mut read_buf, &mut read_len, &mut wire, channels, socket).await {
                Ok(true) => {}
                Ok(false) => return SessionEnd::Closed,
                Err(()) => return SessionEnd::Error,
            }
        }

        let event = select3(
            socket.read(&mut read_buf[read_len..]),
            channels.outbound.receive(),
            Timer::after_millis(REQUEST_POLL_MS),
        )
        .await;

        match event {
            Either3::First(Ok(0)) => return SessionEnd::Closed,
            Either3::First(Ok(n)) => read_len += n,
            Either3::First(Err(err)) => {
                warn!("ws: read failed: {:?}", err);
                return SessionEnd::Error;
            }
            Either3::Second(frame) => {
                if send(&mut ws, socket, &mut wire, WebSocketSendMessageType::Text, frame.as_bytes())
                    .await
                    .is_err()
                {
                    return SessionEnd::Error;
                }
            }
            Either3::Third(()) => {
                if connectivity.take_session_restart() || !connectivity.snapshot().network_up() {
                    if let Ok(len) = ws.close(WebSocketCloseStatusCode::NormalClosure, None, &mut wire) {
                        let _ = socket.write_all(&wire[..len]).await;
                    }
                    return SessionEnd::Restart;
                }
            }
        }

        if read_len == read_buf.len() {
            warn!("ws: inbound frame larger than {} bytes", read_buf.len());
            return SessionEnd::Error;
        }
    }
}

/// Decodes every complete frame in `read_buf`. Returns `Ok(false)` once the
/// peer closed the session.
async fn drain_frames(
    ws: &mut WebSocketClient<HardwareRng>,
    read_buf: &mut [u8],
    read_len: &mut usize,
    wire: &mut [u8],
    channels: &'static LinkChannels,
    socket: &mut TcpSocket<'_>,
) -> Result<bool, ()> {
    let mut payload = [0u8; FRAME_BYTES];

    while *read_len > 0 {
        let result = match ws.read(&read_buf[..*read_len], &mut payload) {
            Ok(result) => result,
            Err(embedded_websocket::Error::ReadFrameIncomplete) => return Ok(true),
            Err(err) => {
                warn!("ws: frame decode failed: {:?}", err);
                return Err(());
            }
        };

        read_buf.copy_within(result.len_from..*read_len, 0);
        *read_len -= result.len_from;

        match result.message_type {
            WebSocketReceiveMessageType::Text if result.end_of_message => {
                let Ok(text) = core::str::from_utf8(&payload[..result.len_to]) else {
                    warn!("ws: inbound text frame is not utf-8; dropped");
                    continue;
                };
                match Frame::try_from(text) {
                    Ok(frame) => {
                        if channels.inbound.try_send(frame).is_err() {
                            warn!("ws: inbound queue full; frame dropped");
                        }
                    }
                    Err(()) => warn!("ws: inbound frame too large"),
                }
            }
            WebSocketReceiveMessageType::Ping => {
                let data = &payload[..result.len_to];
                send(ws, socket, wire, WebSocketSendMessageType::Pong, data).await?;
            }
            WebSocketReceiveMessageType::CloseMustReply => {
                let data = &payload[..result.len_to];
                send(ws, socket, wire, WebSocketSendMessageType::CloseReply, data).await?;
                return Ok(false);
            }
            WebSocketReceiveMessageType::CloseCompleted => return Ok(false),
            _ => {}
        }
    }

    Ok(true)
}

async fn send(
    ws: &mut WebSocketClient<HardwareRng>,
    socket: &mut TcpSocket<'_>,
    wire: &mut [u8],
    kind: WebSocketSendMessageType,
    payload: &[u8],
) -> Result<(), ()> {
    let len = ws.write(kind, true, payload, wire).map_err(|err| {
        warn!("ws: frame encode failed: {:?}", err);
    })?;
    socket.write_all(&wire[..len]).await.map_err(|err| {
        warn!("ws: write failed: {:?}", err);
    })
}
