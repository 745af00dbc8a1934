//! Error taxonomy for the Socket.IO session layer. Wraps the lower-level
//! [`engineio::Error`] rather than duplicating its variants.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Engine(#[from] engineio::Error),

    /// An operation was attempted after the session reached `Closed`.
    #[error("session is closed")]
    SessionClosed,

    /// A Socket.IO inner packet carried an unknown type digit.
    #[error("malformed socket.io packet: {0}")]
    PacketError(String),

    /// The handshake or transport negotiation produced something other
    /// than what the protocol promises.
    #[error("protocol error: {0}")]
    ProtocolError(String),
}

impl Error {
    pub fn packet(msg: impl std::fmt::Display) -> Self {
        Error::PacketError(msg.to_string())
    }

    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Error::Engine(e) if e.is_connection_lost())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Engine(e) if e.is_timeout())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
