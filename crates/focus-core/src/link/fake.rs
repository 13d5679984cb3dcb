use std::collections::VecDeque;

use super::Link;

/// In-memory link whose layers are flipped by the test.
#[derive(Debug, Default)]
pub(crate) struct ScriptedLink {
    pub network: bool,
    pub session: bool,
    pub network_requests: u32,
    pub session_requests: u32,
    pub sent: Vec<String>,
    pub inbound: VecDeque<String>,
    pub rssi: Option<i8>,
}

impl ScriptedLink {
    pub fn up() -> Self {
        Self {
            network: true,
            session: true,
            ..Self::default()
        }
    }

    pub fn push_inbound(&mut self, frame: &str) {
        self.inbound.push_back(frame.to_owned());
    }

    /// Message types of every sent frame, in order.
    pub fn sent_types(&self) -> Vec<String> {
        self.sent
            .iter()
            .map(|frame| {
                frame
                    .trim_start_matches("[\"")
                    .split('"')
                    .next()
                    .unwrap_or_default()
                    .to_owned()
            })
            .collect()
    }

    pub fn take_sent(&mut self) -> Vec<String> {
        core::mem::take(&mut self.sent)
    }
}

impl Link for ScriptedLink {
    type Error = &'static str;

    fn network_up(&mut self) -> bool {
        self.network
    }

    fn session_up(&mut self) -> bool {
        self.session
    }

    fn begin_network(&mut self) -> Result<(), Self::Error> {
        self.network_requests += 1;
        Ok(())
    }

    fn begin_session(&mut self) -> Result<(), Self::Error> {
        self.session_requests += 1;
        Ok(())
    }

    fn send_text(&mut self, text: &str) -> Result<(), Self::Error> {
        if !(self.network && self.session) {
            return Err("link down");
        }
        self.sent.push(text.to_owned());
        Ok(())
    }

    fn receive_text(&mut self, buf: &mut [u8]) -> Result<Option<usize>, Self::Error> {
        let Some(frame) = self.inbound.pop_front() else {
            return Ok(None);
        };
        let bytes = frame.as_bytes();
        if bytes.len() > buf.len() {
            return Err("frame too large");
        }
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Some(bytes.len()))
    }

    fn link_quality(&mut self) -> Option<i8> {
        self.rssi
    }
}
