//! The Engine.IO session established by the handshake (§3, §6).

use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::packet::Packet;
use crate::payload;

#[derive(Debug, Deserialize)]
struct HandshakePayload {
    sid: String,
    #[serde(rename = "pingInterval")]
    ping_interval: u64,
    #[serde(rename = "pingTimeout")]
    ping_timeout: u64,
    #[serde(default)]
    upgrades: Vec<String>,
}

/// The server's handshake response, owned by the Session Engine and
/// replaced wholesale on every (re)connect.
#[derive(Debug, Clone)]
pub struct EngineIoSession {
    pub id: String,
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
    pub upgrades: Vec<String>,
}

impl EngineIoSession {
    /// Parse the single framed Open packet returned by the handshake GET.
    pub fn from_handshake_body(body: &[u8]) -> Result<Self> {
        let mut packets = payload::decode(body);
        if packets.len() != 1 {
            return Err(Error::ProtocolError(format!(
                "expected exactly one handshake packet, got {}",
                packets.len()
            )));
        }
        match packets.remove(0) {
            Packet::Open(data) => Self::from_open_payload(data),
            other => Err(Error::ProtocolError(format!(
                "handshake response was not an Open packet: {other:?}"
            ))),
        }
    }

    fn from_open_payload(data: Bytes) -> Result<Self> {
        let parsed: HandshakePayload = serde_json::from_slice(&data)
            .map_err(|e| Error::ProtocolError(format!("invalid handshake payload: {e}")))?;
        Ok(EngineIoSession {
            id: parsed.sid,
            ping_interval: Duration::from_millis(parsed.ping_interval),
            ping_timeout: Duration::from_millis(parsed.ping_timeout),
            upgrades: parsed.upgrades,
        })
    }

    pub fn supports_websocket_upgrade(&self) -> bool {
        self.upgrades.iter().any(|u| u == "websocket")
    }
}
