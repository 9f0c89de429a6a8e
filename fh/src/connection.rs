//! Connection - one peer's stream bridged to the Hub
//!
//! Each connection runs two independent tasks:
//! - **Inbound drain:** reads frames from the stream and submits them to the Hub.
//!   Any read failure submits a leave and ends the task.
//! - **Outbound drain:** writes mailbox frames to the stream. A closed mailbox
//!   means the Hub removed this connection; the task sends a close frame and ends.
//!   Every write is bounded, so a peer that stops reading cannot pin the task.
//!
//! When the outbound drain ends it drops its half of the stream and tells the
//! inbound drain to stop, which releases the stream entirely.

use std::time::Duration;

use eyre::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::envelope::Content;
use crate::hub::{Frame, HubHandle};
use crate::identity::IdSource;
use crate::transport::{FrameSink, FrameSource, TransportError};

/// Default bound on a single write and on the closing frame
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// A registered connection whose drain loops have not started yet
#[derive(Debug)]
pub struct Connection {
    id: String,
    hub: HubHandle,
    mailbox: mpsc::Receiver<Frame>,
    read_timeout: Option<Duration>,
    write_timeout: Duration,
}

/// Task handles of a running connection
#[derive(Debug)]
pub struct ConnectionTasks {
    pub id: String,
    pub inbound: JoinHandle<()>,
    pub outbound: JoinHandle<()>,
}

impl ConnectionTasks {
    /// Wait for both drain loops to finish
    pub async fn wait(self) {
        let (inbound, outbound) = tokio::join!(self.inbound, self.outbound);
        if let Err(e) = inbound {
            warn!(id = %self.id, error = %e, "Inbound task failed");
        }
        if let Err(e) = outbound {
            warn!(id = %self.id, error = %e, "Outbound task failed");
        }
    }
}

impl Connection {
    /// Allocate an identity, create the mailbox, and join the Hub
    ///
    /// If no identity can be allocated the connection is never registered.
    pub async fn establish(hub: &HubHandle, ids: &dyn IdSource, mailbox_capacity: usize) -> Result<Self> {
        debug!(mailbox_capacity, "Connection::establish: called");
        let id = ids.next_id().context("Failed to allocate connection identity")?;
        let (mailbox_tx, mailbox) = mpsc::channel(mailbox_capacity.max(1));

        hub.join(&id, mailbox_tx)
            .await
            .context("Failed to register connection")?;

        Ok(Self {
            id,
            hub: hub.clone(),
            mailbox,
            read_timeout: None,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        })
    }

    /// Bound every read; an idle peer is treated as a read failure
    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Bound every write; a stalled peer is treated as a write failure
    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Start the inbound and outbound drain loops
    pub fn spawn<R, W>(self, source: R, sink: W) -> ConnectionTasks
    where
        R: FrameSource + 'static,
        W: FrameSink + 'static,
    {
        info!(id = %self.id, "Connection started");
        let (writer_done_tx, writer_done_rx) = oneshot::channel();
        let inbound = tokio::spawn(inbound_drain(
            self.id.clone(),
            self.hub.clone(),
            source,
            self.read_timeout,
            writer_done_rx,
        ));
        let outbound = tokio::spawn(outbound_drain(
            self.id.clone(),
            self.hub,
            self.mailbox,
            sink,
            self.write_timeout,
            writer_done_tx,
        ));
        ConnectionTasks {
            id: self.id,
            inbound,
            outbound,
        }
    }
}

async fn read_next<R: FrameSource>(
    source: &mut R,
    read_timeout: Option<Duration>,
) -> Result<Content, TransportError> {
    match read_timeout {
        Some(limit) => match tokio::time::timeout(limit, source.next_frame()).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(limit)),
        },
        None => source.next_frame().await,
    }
}

async fn write_frame<W: FrameSink>(sink: &mut W, frame: Frame, limit: Duration) -> Result<(), TransportError> {
    match tokio::time::timeout(limit, sink.send_frame(frame)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(limit)),
    }
}

async fn inbound_drain<R: FrameSource>(
    id: String,
    hub: HubHandle,
    mut source: R,
    read_timeout: Option<Duration>,
    mut writer_done: oneshot::Receiver<()>,
) {
    debug!(%id, ?read_timeout, "inbound_drain: started");
    loop {
        let next = tokio::select! {
            next = read_next(&mut source, read_timeout) => next,
            _ = &mut writer_done => {
                debug!(%id, "inbound_drain: writer stopped");
                break;
            }
        };

        match next {
            Ok(content) => {
                if let Err(e) = hub.deliver(&id, content).await {
                    warn!(%id, error = %e, "Hub unavailable, stopping reader");
                    return;
                }
            }
            Err(TransportError::Closed) => {
                info!(%id, "Peer closed connection");
                break;
            }
            Err(e) => {
                warn!(%id, error = %e, "Read failed");
                break;
            }
        }
    }

    if let Err(e) = hub.leave(&id).await {
        debug!(%id, error = %e, "inbound_drain: leave not delivered");
    }
    drop(source);
    debug!(%id, "inbound_drain: stopped");
}

async fn outbound_drain<W: FrameSink>(
    id: String,
    hub: HubHandle,
    mut mailbox: mpsc::Receiver<Frame>,
    mut sink: W,
    write_timeout: Duration,
    writer_done: oneshot::Sender<()>,
) {
    debug!(%id, ?write_timeout, "outbound_drain: started");
    while let Some(frame) = mailbox.recv().await {
        if let Err(e) = write_frame(&mut sink, frame, write_timeout).await {
            warn!(%id, error = %e, "Write failed");
            mailbox.close();
            if let Err(e) = hub.leave(&id).await {
                debug!(%id, error = %e, "outbound_drain: leave not delivered");
            }
            break;
        }
    }

    debug!(%id, "outbound_drain: closing stream");
    match tokio::time::timeout(write_timeout, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(%id, error = %e, "outbound_drain: close frame not sent"),
        Err(_) => debug!(%id, "outbound_drain: close frame timed out"),
    }
    drop(sink);
    drop(writer_done);
    debug!(%id, "outbound_drain: stopped");
}
