//! Transport contract shared by the long-polling and WebSocket variants
//! (§4.2). Exactly one [`Transport`] is authoritative for a session at a
//! time; upgrading creates a new one, probes it, then atomically swaps.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::packet::Packet;

pub mod polling;
pub mod ws;

#[cfg(feature = "test-utils")]
pub mod mock;

/// A request-sequence-and-session-owning packet transport.
///
/// `recv_packet` may run concurrently with `send_packet` on the same
/// transport; concurrent `send_packet` calls are themselves serialized.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Receive the next packet, blocking up to the configured timeout.
    ///
    /// Fails with [`crate::Error::Timeout`] on a normal deadline expiry
    /// and [`crate::Error::ConnectionLost`] on irrecoverable transport
    /// failure.
    async fn recv_packet(&self) -> Result<Packet>;

    /// Send one packet. Outbound packets on a single transport are
    /// totally ordered.
    async fn send_packet(&self, packet: Packet) -> Result<()>;

    /// Adjust the per-receive blocking deadline. `None` removes it.
    fn set_timeout(&self, timeout: Option<Duration>);

    /// Best-effort notify the peer and release the connection.
    async fn close(&self);

    fn name(&self) -> &'static str;
}

/// Build the cache-busting `t` query value: `"<millis>-<index>"`.
pub(crate) fn timestamp_param(request_index: u64) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    format!("{millis}-{request_index}")
}
