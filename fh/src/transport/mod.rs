//! Framed transport boundary
//!
//! The hub never sees sockets. A connection is driven through two halves:
//! a [`FrameSource`] read by the inbound loop and a [`FrameSink`] written by
//! the outbound loop. [`websocket`] provides the production implementation.

mod error;
pub mod websocket;

use async_trait::async_trait;
use bytes::Bytes;

use crate::envelope::Content;

pub use error::TransportError;

/// Read half of a framed stream
#[async_trait]
pub trait FrameSource: Send {
    /// Read the next data frame
    ///
    /// Control frames are consumed internally. An orderly close by the peer is
    /// reported as [`TransportError::Closed`].
    async fn next_frame(&mut self) -> Result<Content, TransportError>;
}

/// Write half of a framed stream
#[async_trait]
pub trait FrameSink: Send {
    /// Write one frame verbatim
    async fn send_frame(&mut self, frame: Bytes) -> Result<(), TransportError>;

    /// Send a close frame and shut the write half down
    async fn close(&mut self) -> Result<(), TransportError>;
}
