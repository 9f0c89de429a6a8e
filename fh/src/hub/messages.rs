//! Message types for the Hub intake

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::envelope::Content;

/// An encoded envelope as queued in a mailbox; clones share one buffer
pub type Frame = Bytes;

/// Requests to the Hub task, handled strictly in arrival order
#[derive(Debug)]
pub enum HubRequest {
    /// Register a connection and the producer side of its mailbox
    Join { id: String, mailbox: mpsc::Sender<Frame> },

    /// Remove a connection (no-op if it is not a member)
    Leave { id: String },

    /// A frame read from a connection's stream
    Deliver { sender: String, content: Content },

    /// Get current metrics
    GetMetrics { reply_tx: oneshot::Sender<HubMetrics> },

    /// List current member identities
    Members { reply_tx: oneshot::Sender<Vec<String>> },

    /// Stop the coordination loop
    Shutdown,
}

/// Hub metrics for observability
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubMetrics {
    pub members: usize,
    pub joins: u64,
    pub leaves: u64,
    pub messages_received: u64,
    pub frames_sent: u64,
    pub evictions: u64,
    pub encode_failures: u64,
    pub dropped_from_non_members: u64,
}
