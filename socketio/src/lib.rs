//! Socket.IO 1.x client session layer, built on the `engineio` protocol
//! engine: namespace multiplexing, the ack-id correlation table, and the
//! Socket.IO inner packet grammar.

pub mod ack;
pub mod builder;
pub mod client;
pub mod error;
pub mod ns;
pub mod packet;

pub use builder::ClientBuilder;
pub use client::Client;
pub use error::{Error, Result};
pub use ns::{Handler, Namespace};
pub use packet::{PacketType, SocketPacket};

pub use engineio::TransportKind;
