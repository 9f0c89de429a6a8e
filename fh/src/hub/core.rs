//! Main Hub task implementation

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::config::HubConfig;
use super::handle::HubHandle;
use super::membership::Membership;
use super::messages::{Frame, HubMetrics, HubRequest};
use crate::envelope::{Codec, Content, Envelope, JsonCodec};

/// The Hub owns membership and serializes every join, leave, and broadcast
///
/// All state lives inside [`Hub::run`]; the outside world talks to it only
/// through [`HubHandle`].
pub struct Hub {
    codec: Arc<dyn Codec>,
    tx: mpsc::Sender<HubRequest>,
    rx: mpsc::Receiver<HubRequest>,
}

impl Hub {
    /// Create a new Hub with JSON envelopes
    pub fn new(config: HubConfig) -> Self {
        Self::with_codec(config, Arc::new(JsonCodec))
    }

    /// Create a new Hub with a custom envelope codec
    pub fn with_codec(config: HubConfig, codec: Arc<dyn Codec>) -> Self {
        let buffer = config.intake_buffer();
        debug!(buffer, "Hub::with_codec: called");
        let (tx, rx) = mpsc::channel(buffer);
        Self { codec, tx, rx }
    }

    /// Get a handle for submitting events to this Hub
    pub fn handle(&self) -> HubHandle {
        HubHandle::new(self.tx.clone())
    }

    /// Run the coordination loop
    ///
    /// Consumes the Hub and runs until shutdown is requested or every handle is
    /// dropped. Requests are handled in arrival order; a connection joins before
    /// its drain loops start, so its arrival is announced before its first frame
    /// and its frames precede its own leave.
    pub async fn run(self) {
        let Hub { codec, tx, mut rx } = self;
        // Only handles keep the intake open
        drop(tx);

        let mut state = HubState::new(codec);
        info!("Hub started");

        while let Some(req) = rx.recv().await {
            match req {
                HubRequest::Join { id, mailbox } => state.join(id, mailbox),
                HubRequest::Leave { id } => state.leave(id),
                HubRequest::Deliver { sender, content } => state.deliver(sender, content),
                HubRequest::GetMetrics { reply_tx } => {
                    let _ = reply_tx.send(state.metrics());
                }
                HubRequest::Members { reply_tx } => {
                    let _ = reply_tx.send(state.membership.ids());
                }
                HubRequest::Shutdown => {
                    info!("Hub shutting down");
                    break;
                }
            }
        }

        info!(members = state.membership.len(), "Hub stopped");
    }
}

/// State owned by the coordination loop
struct HubState {
    codec: Arc<dyn Codec>,
    membership: Membership,
    metrics: HubMetrics,
}

impl HubState {
    fn new(codec: Arc<dyn Codec>) -> Self {
        Self {
            codec,
            membership: Membership::new(),
            metrics: HubMetrics::default(),
        }
    }

    fn metrics(&self) -> HubMetrics {
        HubMetrics {
            members: self.membership.len(),
            ..self.metrics.clone()
        }
    }

    fn join(&mut self, id: String, mailbox: mpsc::Sender<Frame>) {
        if !self.membership.insert(id.clone(), mailbox) {
            warn!(%id, "Duplicate join ignored");
            return;
        }
        self.metrics.joins += 1;
        info!(%id, members = self.membership.len(), "Connection joined");
        self.broadcast(&Envelope::connected(), Some(&id));
    }

    fn leave(&mut self, id: String) {
        if !self.membership.remove(&id) {
            debug!(%id, "Leave for non-member ignored");
            return;
        }
        self.metrics.leaves += 1;
        info!(%id, members = self.membership.len(), "Connection left");
        self.broadcast(&Envelope::disconnected(), None);
    }

    fn deliver(&mut self, sender: String, content: Content) {
        self.metrics.messages_received += 1;
        if !self.membership.contains(&sender) {
            debug!(%sender, "Dropping frame from non-member");
            self.metrics.dropped_from_non_members += 1;
            return;
        }
        debug!(%sender, len = content.len(), "Broadcasting message");
        let envelope = Envelope::from_peer(sender.clone(), content);
        self.broadcast(&envelope, Some(&sender));
    }

    /// Encode once and fan out; every eviction is announced exactly once
    fn broadcast(&mut self, envelope: &Envelope, exclude: Option<&str>) {
        let Some(frame) = self.encode(envelope) else {
            return;
        };
        let mut evicted: VecDeque<String> = self.fan_out(&frame, exclude);

        while let Some(id) = evicted.pop_front() {
            self.metrics.evictions += 1;
            warn!(%id, members = self.membership.len(), "Connection evicted");
            if let Some(notice) = self.encode(&Envelope::disconnected()) {
                let more = self.fan_out(&notice, None);
                evicted.extend(more);
            }
        }
    }

    fn fan_out(&mut self, frame: &Frame, exclude: Option<&str>) -> VecDeque<String> {
        let result = self.membership.fan_out(frame, exclude);
        self.metrics.frames_sent += result.delivered as u64;
        result.evicted.into()
    }

    fn encode(&mut self, envelope: &Envelope) -> Option<Frame> {
        match self.codec.encode(envelope) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(error = %e, "Dropping broadcast");
                self.metrics.encode_failures += 1;
                None
            }
        }
    }
}
