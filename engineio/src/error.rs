use std::fmt;

/// Errors surfaced by the Engine.IO protocol engine.
///
/// Mirrors the taxonomy a caller needs to distinguish: a timed-out
/// receive is routine and recoverable, a lost connection is not.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A blocking receive exceeded its configured deadline. Recoverable;
    /// callers should treat this as a normal cooperative suspension point.
    #[error("operation timed out")]
    Timeout,

    /// The transport failed irrecoverably and must be rebuilt.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// A well-formed byte stream carried an unexpected packet type or a
    /// frame whose declared length didn't fit the remaining buffer.
    #[error("malformed packet: {0}")]
    PacketError(String),

    /// The handshake response wasn't a valid Open packet.
    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("http error: {0}")]
    Http(#[from] hyper::Error),

    #[error("http request error: {0}")]
    HttpRequest(#[from] hyper::http::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    pub fn connection_lost(msg: impl fmt::Display) -> Self {
        Error::ConnectionLost(msg.to_string())
    }

    pub fn packet(msg: impl fmt::Display) -> Self {
        Error::PacketError(msg.to_string())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }

    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Error::ConnectionLost(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
