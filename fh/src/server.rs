//! WebSocket listener
//!
//! Accepts TCP connections, upgrades requests on the configured path, and hands
//! each upgraded stream to a new [`Connection`]. Everything past the upgrade
//! belongs to the connection's drain loops and the Hub.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use eyre::{Context, Result};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::connection::{Connection, ConnectionTasks};
use crate::hub::HubHandle;
use crate::identity::{IdSource, UuidSource};
use crate::transport::websocket;

/// Pause before accepting again after a failed accept
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Settings shared by every accepted peer
struct PeerSettings {
    path: String,
    ws_config: WebSocketConfig,
    handshake_timeout: Duration,
    mailbox_capacity: usize,
    read_timeout: Option<Duration>,
    write_timeout: Duration,
    ids: Arc<dyn IdSource>,
}

/// Tasks of peers accepted by a stopped [`Server`]
pub struct PeerTasks {
    tasks: JoinSet<()>,
}

impl PeerTasks {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait up to `grace` for every peer to finish, then abort the rest
    ///
    /// Returns how many peers had to be aborted.
    pub async fn drain(mut self, grace: Duration) -> usize {
        debug!(peers = self.tasks.len(), ?grace, "PeerTasks::drain: called");
        let finished = tokio::time::timeout(grace, async {
            while let Some(result) = self.tasks.join_next().await {
                if let Err(e) = result {
                    warn!(error = %e, "Peer task failed");
                }
            }
        })
        .await;

        match finished {
            Ok(()) => 0,
            Err(_) => {
                let remaining = self.tasks.len();
                warn!(remaining, "Aborting peers still open after grace period");
                self.tasks.shutdown().await;
                remaining
            }
        }
    }
}

/// Bound listener, ready to accept peers
pub struct Server {
    listener: TcpListener,
    settings: Arc<PeerSettings>,
}

impl Server {
    /// Bind the configured listen address
    pub async fn bind(config: &Config) -> Result<Self> {
        Self::bind_with_ids(config, Arc::new(UuidSource)).await
    }

    /// Bind with a custom identity source
    pub async fn bind_with_ids(config: &Config, ids: Arc<dyn IdSource>) -> Result<Self> {
        debug!(listen = %config.server.listen, "Server::bind: called");
        let listener = TcpListener::bind(&config.server.listen)
            .await
            .context(format!("Failed to bind {}", config.server.listen))?;

        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(config.server.max_message_size);

        let settings = PeerSettings {
            path: config.server.path.clone(),
            ws_config,
            handshake_timeout: config.server.handshake_timeout(),
            mailbox_capacity: config.hub.mailbox_capacity(),
            read_timeout: config.connection.read_timeout(),
            write_timeout: config.connection.write_timeout(),
            ids,
        };

        Ok(Self {
            listener,
            settings: Arc::new(settings),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().context("Failed to read listener address")
    }

    /// Accept peers until `shutdown_rx` fires or its sender is dropped
    ///
    /// Returns the tasks of peers still connected, so the caller can let them
    /// close cleanly once the Hub stops.
    pub async fn run(self, hub: HubHandle, mut shutdown_rx: mpsc::Receiver<()>) -> PeerTasks {
        info!(addr = ?self.listener.local_addr().ok(), path = %self.settings.path, "Server started");
        let mut peers = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Server shutting down");
                    break;
                }
                Some(result) = peers.join_next(), if !peers.is_empty() => {
                    if let Err(e) = result {
                        warn!(error = %e, "Peer task failed");
                    }
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "Server::run: accepted");
                        let hub = hub.clone();
                        let settings = self.settings.clone();
                        peers.spawn(async move {
                            match accept_peer(stream, peer, hub, settings).await {
                                Ok(tasks) => tasks.wait().await,
                                Err(e) => warn!(%peer, error = %e, "Peer rejected"),
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        info!(peers = peers.len(), "Server stopped");
        PeerTasks { tasks: peers }
    }
}

/// Upgrade one TCP stream and start its connection
async fn accept_peer(
    stream: TcpStream,
    peer: SocketAddr,
    hub: HubHandle,
    settings: Arc<PeerSettings>,
) -> Result<ConnectionTasks> {
    let path = settings.path.clone();
    let route = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        if request.uri().path() == path {
            Ok(response)
        } else {
            debug!(path = %request.uri().path(), "accept_peer: unknown path");
            let mut rejection = ErrorResponse::new(Some("Not Found".to_string()));
            *rejection.status_mut() = StatusCode::NOT_FOUND;
            Err(rejection)
        }
    };

    let handshake = tokio_tungstenite::accept_hdr_async_with_config(stream, route, Some(settings.ws_config));
    let ws = tokio::time::timeout(settings.handshake_timeout, handshake)
        .await
        .map_err(|_| eyre::eyre!("WebSocket handshake timed out after {:?}", settings.handshake_timeout))?
        .context("WebSocket handshake failed")?;

    let connection = Connection::establish(&hub, settings.ids.as_ref(), settings.mailbox_capacity)
        .await?
        .with_read_timeout(settings.read_timeout)
        .with_write_timeout(settings.write_timeout);
    info!(%peer, id = %connection.id(), "Peer connected");

    let (sink, source) = websocket::split(ws);
    Ok(connection.spawn(source, sink))
}
