//! Transport error types.

use std::time::Duration;

use thiserror::Error;

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The persistent connection is not established.
    #[error("not connected")]
    NotConnected,
    /// The connection's I/O task has stopped.
    #[error("connection closed")]
    Closed,
    /// Opening the connection failed.
    #[error("connect failed: {0}")]
    Connect(String),
    /// The server refused the Socket.IO handshake.
    #[error("handshake rejected: {0}")]
    Handshake(String),
    /// An HTTP request could not be completed.
    #[error("http error: {0}")]
    Http(String),
    /// A response could not be interpreted.
    #[error("unexpected response: {0}")]
    Decode(String),
    /// The operation exceeded its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl TransportError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::NotConnected => "not_connected",
            Self::Closed => "closed",
            Self::Connect(_) => "connect",
            Self::Handshake(_) => "handshake",
            Self::Http(_) => "http",
            Self::Decode(_) => "decode",
            Self::Timeout(_) => "timeout",
        }
    }
}
