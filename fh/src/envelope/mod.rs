//! Envelope - the logical message unit fanned out by the hub
//!
//! An envelope is built once per broadcast, encoded once by a [`Codec`], and the
//! resulting bytes are shared by every mailbox it is delivered to.

mod codec;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use codec::{Codec, CodecError, JsonCodec};

/// Content of the announcement sent when a peer joins
pub const CONNECTED_NOTICE: &str = "/A new socket has connected.";

/// Content of the announcement sent when a peer leaves or is evicted
pub const DISCONNECTED_NOTICE: &str = "/A socket has disconnected.";

/// Prefix marking system-generated content
pub const SYSTEM_PREFIX: char = '/';

/// Message payload, text or binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Binary(Vec<u8>),
}

impl Content {
    /// Text view of the payload, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            Content::Binary(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Content::Text(text) => text.len(),
            Content::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Content {
    fn default() -> Self {
        Content::Text(String::new())
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<Vec<u8>> for Content {
    fn from(data: Vec<u8>) -> Self {
        Content::Binary(data)
    }
}

/// A message unit: who sent it, who it is for, and what it says
///
/// Fields are private so an envelope cannot change after construction.
/// Absent fields are omitted from the encoded form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sender: Option<String>,

    /// Reserved for direct messaging; never used for routing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    recipient: Option<String>,

    #[serde(default, skip_serializing_if = "Content::is_empty")]
    content: Content,
}

impl Envelope {
    /// Envelope carrying a frame received from a peer
    pub fn from_peer(sender: impl Into<String>, content: Content) -> Self {
        let sender = sender.into();
        debug!(%sender, len = content.len(), "Envelope::from_peer: called");
        Self {
            sender: Some(sender),
            recipient: None,
            content,
        }
    }

    /// System announcement with no sender
    pub fn system(content: &str) -> Self {
        debug!(%content, "Envelope::system: called");
        Self {
            sender: None,
            recipient: None,
            content: Content::Text(content.to_string()),
        }
    }

    /// Announcement that a peer has joined
    pub fn connected() -> Self {
        Self::system(CONNECTED_NOTICE)
    }

    /// Announcement that a peer has left
    pub fn disconnected() -> Self {
        Self::system(DISCONNECTED_NOTICE)
    }

    /// Address the envelope to a recipient (carried on the wire, not routed)
    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    pub fn recipient(&self) -> Option<&str> {
        self.recipient.as_deref()
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    /// True for hub-generated announcements
    pub fn is_system(&self) -> bool {
        self.sender.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_peer_sets_sender() {
        let envelope = Envelope::from_peer("peer-a", Content::from("hi"));
        assert_eq!(envelope.sender(), Some("peer-a"));
        assert_eq!(envelope.recipient(), None);
        assert_eq!(envelope.content().as_text(), Some("hi"));
        assert!(!envelope.is_system());
    }

    #[test]
    fn test_announcements_have_no_sender() {
        let joined = Envelope::connected();
        assert!(joined.is_system());
        assert_eq!(joined.content().as_text(), Some(CONNECTED_NOTICE));

        let left = Envelope::disconnected();
        assert!(left.is_system());
        assert_eq!(left.content().as_text(), Some(DISCONNECTED_NOTICE));
    }

    #[test]
    fn test_notices_carry_system_prefix() {
        assert!(CONNECTED_NOTICE.starts_with(SYSTEM_PREFIX));
        assert!(DISCONNECTED_NOTICE.starts_with(SYSTEM_PREFIX));
    }

    #[test]
    fn test_content_len() {
        assert_eq!(Content::from("abc").len(), 3);
        assert_eq!(Content::from(vec![1u8, 2]).len(), 2);
        assert!(Content::default().is_empty());
        assert_eq!(Content::from(vec![0u8]).as_text(), None);
    }
}
