//! FanHub - Real-time fan-out message hub
//!
//! Persistent WebSocket connections register with a central Hub, and every
//! frame received from one connection is broadcast to all the others.
//!
//! # Core Concepts
//!
//! - **Single Owner**: One Hub task owns membership; joins, leaves, and
//!   broadcasts are serialized through one intake, so nothing is locked
//! - **Two Loops per Connection**: Reading and writing block independently
//! - **Never Wait on a Peer**: Mailboxes are bounded and filled without
//!   blocking; a full mailbox evicts its connection
//!
//! # Modules
//!
//! - [`hub`] - Coordination loop, membership, and fan-out
//! - [`connection`] - Per-peer inbound and outbound drain loops
//! - [`envelope`] - Message unit and wire codec
//! - [`transport`] - Framed stream traits and the WebSocket implementation
//! - [`server`] - TCP listener and WebSocket upgrade
//! - [`client`] - Interactive terminal client
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod client;
pub mod config;
pub mod connection;
pub mod envelope;
pub mod hub;
pub mod identity;
pub mod server;
pub mod transport;

// Re-export commonly used types
pub use config::{ClientConfig, Config, ConnectionConfig, ServerConfig};
pub use connection::{Connection, ConnectionTasks};
pub use envelope::{Codec, CodecError, Content, Envelope, JsonCodec};
pub use hub::{Frame, Hub, HubConfig, HubHandle, HubMetrics};
pub use identity::{IdError, IdSource, UuidSource};
pub use server::{PeerTasks, Server};
pub use transport::{FrameSink, FrameSource, TransportError};
