//! Transport error types

use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors that can occur reading or writing a framed stream
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection closed")]
    Closed,

    #[error("Read timed out after {0:?}")]
    Timeout(Duration),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Check if the peer went away in an orderly fashion
    pub fn is_closed(&self) -> bool {
        matches!(self, TransportError::Closed)
    }
}

impl From<tungstenite::Error> for TransportError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => TransportError::Closed,
            tungstenite::Error::Io(e) => TransportError::Io(e),
            other => TransportError::Protocol(other.to_string()),
        }
    }
}
