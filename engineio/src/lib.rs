//! Engine.IO v3 protocol engine: packet grammar, polling payload framing,
//! transports, handshake session and heartbeat driver.
//!
//! This crate speaks only the engine layer. Namespace multiplexing, ack
//! correlation and the Socket.IO inner packet grammar live one level up,
//! in `socketio`.

pub mod config;
pub mod error;
pub mod heartbeat;
pub mod packet;
pub mod payload;
pub mod session;
pub mod transport;

pub use config::{EngineIoConfig, TransportKind};
pub use error::{Error, Result};
pub use heartbeat::{HeartbeatHandle, spawn as spawn_heartbeat};
pub use packet::Packet;
pub use session::EngineIoSession;
pub use transport::Transport;
