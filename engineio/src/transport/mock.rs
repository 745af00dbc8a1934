//! In-memory mock transport for exercising `socketio`'s session engine
//! without any real network I/O. Gated behind the `test-utils` feature,
//! mirroring the source crate's own `test-utils` feature.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::Transport;
use crate::error::{Error, Result};
use crate::packet::Packet;

/// A transport backed by two queues the test drives directly: packets
/// pushed onto `inbound` are handed out by `recv_packet`; packets sent
/// via `send_packet` are appended to `outbound` for assertions.
pub struct MockTransport {
    inbound: Mutex<VecDeque<Packet>>,
    outbound: Mutex<Vec<Packet>>,
    notify: Notify,
    closed: Mutex<bool>,
    fail_next_send: Mutex<Option<Error>>,
    timeout: Mutex<Option<Duration>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            inbound: Mutex::new(VecDeque::new()),
            outbound: Mutex::new(Vec::new()),
            notify: Notify::new(),
            closed: Mutex::new(false),
            fail_next_send: Mutex::new(None),
            timeout: Mutex::new(None),
        }
    }

    pub fn push_inbound(&self, packet: Packet) {
        self.inbound.lock().unwrap().push_back(packet);
        self.notify.notify_one();
    }

    pub fn take_outbound(&self) -> Vec<Packet> {
        std::mem::take(&mut self.outbound.lock().unwrap())
    }

    pub fn fail_next_send_with(&self, err: Error) {
        *self.fail_next_send.lock().unwrap() = Some(err);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn recv_packet(&self) -> Result<Packet> {
        loop {
            if let Some(packet) = self.inbound.lock().unwrap().pop_front() {
                return Ok(packet);
            }
            let timeout = *self.timeout.lock().unwrap();
            match timeout {
                Some(d) => {
                    tokio::select! {
                        _ = self.notify.notified() => {}
                        _ = tokio::time::sleep(d) => return Err(Error::Timeout),
                    }
                }
                None => self.notify.notified().await,
            }
        }
    }

    async fn send_packet(&self, packet: Packet) -> Result<()> {
        if let Some(err) = self.fail_next_send.lock().unwrap().take() {
            return Err(err);
        }
        self.outbound.lock().unwrap().push(packet);
        Ok(())
    }

    fn set_timeout(&self, timeout: Option<Duration>) {
        *self.timeout.lock().unwrap() = timeout;
    }

    async fn close(&self) {
        *self.closed.lock().unwrap() = true;
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
