//! HubHandle - Client interface for submitting events to the Hub

use eyre::{Result, eyre};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::messages::{Frame, HubMetrics, HubRequest};
use crate::envelope::Content;

/// Handle for connections to interact with the Hub
///
/// Cloneable; every clone feeds the same intake. The Hub stops once all
/// handles are dropped.
#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubRequest>,
}

impl HubHandle {
    pub(crate) fn new(tx: mpsc::Sender<HubRequest>) -> Self {
        Self { tx }
    }

    async fn send(&self, req: HubRequest) -> Result<()> {
        self.tx.send(req).await.map_err(|_| eyre!("Hub channel closed"))
    }

    /// Register a connection together with the producer side of its mailbox
    pub async fn join(&self, id: &str, mailbox: mpsc::Sender<Frame>) -> Result<()> {
        debug!(%id, "HubHandle::join: called");
        self.send(HubRequest::Join {
            id: id.to_string(),
            mailbox,
        })
        .await
    }

    /// Remove a connection; safe to call more than once
    pub async fn leave(&self, id: &str) -> Result<()> {
        debug!(%id, "HubHandle::leave: called");
        self.send(HubRequest::Leave { id: id.to_string() }).await
    }

    /// Submit a frame read from `sender`'s stream for broadcast
    pub async fn deliver(&self, sender: &str, content: Content) -> Result<()> {
        debug!(%sender, "HubHandle::deliver: called");
        self.send(HubRequest::Deliver {
            sender: sender.to_string(),
            content,
        })
        .await
    }

    /// Get current hub metrics
    pub async fn metrics(&self) -> Result<HubMetrics> {
        debug!("HubHandle::metrics: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(HubRequest::GetMetrics { reply_tx }).await?;
        reply_rx.await.map_err(|_| eyre!("Hub shutdown before reply"))
    }

    /// Get the sorted identities of current members
    pub async fn members(&self) -> Result<Vec<String>> {
        debug!("HubHandle::members: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(HubRequest::Members { reply_tx }).await?;
        reply_rx.await.map_err(|_| eyre!("Hub shutdown before reply"))
    }

    /// Request shutdown of the Hub
    pub async fn shutdown(&self) -> Result<()> {
        debug!("HubHandle::shutdown: called");
        self.send(HubRequest::Shutdown).await
    }

    /// True once the Hub task has stopped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_requests_keep_submission_order() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle = HubHandle::new(tx);

        let (mailbox, _mailbox_rx) = mpsc::channel(1);
        handle.join("conn-1", mailbox).await.unwrap();
        handle.deliver("conn-1", Content::from("hi")).await.unwrap();
        handle.leave("conn-1").await.unwrap();
        handle.shutdown().await.unwrap();

        assert!(matches!(rx.recv().await, Some(HubRequest::Join { id, .. }) if id == "conn-1"));
        match rx.recv().await {
            Some(HubRequest::Deliver { sender, content }) => {
                assert_eq!(sender, "conn-1");
                assert_eq!(content, Content::from("hi"));
            }
            other => panic!("Expected deliver, got {other:?}"),
        }
        assert!(matches!(rx.recv().await, Some(HubRequest::Leave { id }) if id == "conn-1"));
        assert!(matches!(rx.recv().await, Some(HubRequest::Shutdown)));
    }

    #[tokio::test]
    async fn test_closed_hub_is_an_error() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = HubHandle::new(tx);

        assert!(handle.is_closed());
        assert!(handle.leave("x").await.is_err());
        assert!(handle.deliver("x", Content::from("y")).await.is_err());
        let err = handle.metrics().await.unwrap_err();
        assert!(err.to_string().contains("closed"));
    }
}
