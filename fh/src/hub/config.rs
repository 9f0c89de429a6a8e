//! Hub configuration

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Hub configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Buffer size of each intake channel (join, leave, deliver, control)
    #[serde(rename = "intake-buffer", default = "default_intake_buffer")]
    pub intake_buffer: usize,

    /// Frames a connection may have queued before it is evicted as a slow consumer
    #[serde(rename = "mailbox-capacity", default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
}

fn default_intake_buffer() -> usize {
    debug!("default_intake_buffer: called");
    1000
}

fn default_mailbox_capacity() -> usize {
    debug!("default_mailbox_capacity: called");
    256
}

impl Default for HubConfig {
    fn default() -> Self {
        debug!("HubConfig::default: called");
        Self {
            intake_buffer: 1000,
            mailbox_capacity: 256,
        }
    }
}

impl HubConfig {
    /// Intake buffer size, never zero (tokio channels reject zero capacity)
    pub fn intake_buffer(&self) -> usize {
        self.intake_buffer.max(1)
    }

    /// Mailbox capacity, never zero
    pub fn mailbox_capacity(&self) -> usize {
        debug!(mailbox_capacity = %self.mailbox_capacity, "HubConfig::mailbox_capacity: called");
        self.mailbox_capacity.max(1)
    }
}
