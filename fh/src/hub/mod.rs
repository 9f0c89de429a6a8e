//! Hub for connection membership and broadcast fan-out
//!
//! A single task owns the membership set and consumes one intake, in order:
//! - **Join:** add a connection and announce its arrival
//! - **Leave:** remove a connection and announce its departure
//! - **Deliver:** broadcast a frame to every member but its sender
//!
//! Fan-out never blocks. A member whose mailbox is full is evicted as a slow
//! consumer within the same pass.

mod config;
mod core;
mod handle;
mod membership;
mod messages;

pub use config::HubConfig;
pub use core::Hub;
pub use handle::HubHandle;
pub use messages::{Frame, HubMetrics, HubRequest};
