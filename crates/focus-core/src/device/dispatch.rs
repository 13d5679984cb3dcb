use log::{debug, warn};

use crate::{
    link::Link,
    protocol::{self, FRAME_BYTES, InboundCommand, ProtocolError},
};

/// Frames handled per poll step before control returns to the sensors.
pub const MAX_FRAMES_PER_TICK: usize = 4;

/// Pulls inbound frames off the link and decodes them into commands.
/// Anything that does not decode is logged and dropped here.
#[derive(Debug)]
pub struct CommandDispatcher {
    buf: [u8; FRAME_BYTES],
    rejected: u32,
}

impl CommandDispatcher {
    pub const fn new() -> Self {
        Self {
            buf: [0; FRAME_BYTES],
            rejected: 0,
        }
    }

    /// Frames dropped as malformed or unknown since boot.
    pub fn rejected(&self) -> u32 {
        self.rejected
    }

    /// Decodes one payload, logging the reason when it is rejected.
    pub fn decode(&mut self, payload: &str) -> Option<InboundCommand> {
        decode_counted(&mut self.rejected, payload)
    }

    /// Handles up to [`MAX_FRAMES_PER_TICK`] queued frames, in arrival order.
    pub fn drain<L, F>(&mut self, link: &mut L, mut handle: F) -> usize
    where
        L: Link,
        F: FnMut(&mut L, InboundCommand),
    {
        let mut handled = 0;

        for _ in 0..MAX_FRAMES_PER_TICK {
            let len = match link.receive_text(&mut self.buf) {
                Ok(Some(len)) => len,
                Ok(None) => break,
                Err(err) => {
                    warn!("command: receive failed: {:?}", err);
                    break;
                }
            };

            let Ok(payload) = core::str::from_utf8(&self.buf[..len]) else {
                self.rejected = self.rejected.saturating_add(1);
                warn!("command: dropped non-utf8 payload len={}", len);
                continue;
            };
            let Some(command) = decode_counted(&mut self.rejected, payload) else {
                continue;
            };

            handle(link, command);
            handled += 1;
        }

        handled
    }
}

fn decode_counted(rejected: &mut u32, payload: &str) -> Option<InboundCommand> {
    match protocol::decode_inbound(payload) {
        Ok(command) => {
            debug!("command: received {:?}", command);
            Some(command)
        }
        Err(ProtocolError::UnknownCommand) => {
            *rejected = rejected.saturating_add(1);
            warn!(
                "command: unknown token={:?}",
                protocol::command_token(payload).unwrap_or("")
            );
            None
        }
        Err(err) => {
            *rejected = rejected.saturating_add(1);
            warn!("command: dropped payload err={:?} len={}", err, payload.len());
            None
        }
    }
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
