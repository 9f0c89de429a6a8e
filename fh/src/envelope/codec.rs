//! Envelope wire encoding

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

use super::Envelope;

/// Errors from encoding or decoding envelopes
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to encode envelope: {0}")]
    Encode(String),

    #[error("Failed to decode envelope: {0}")]
    Decode(String),
}

/// Injectable encode/decode pair for envelopes
///
/// `encode` produces the exact bytes written to every recipient's stream.
pub trait Codec: Send + Sync {
    fn encode(&self, envelope: &Envelope) -> Result<Bytes, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<Envelope, CodecError>;
}

/// JSON encoding: `{"sender":"..","recipient":"..","content":".."}`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, envelope: &Envelope) -> Result<Bytes, CodecError> {
        debug!("JsonCodec::encode: called");
        serde_json::to_vec(envelope)
            .map(Bytes::from)
            .map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Envelope, CodecError> {
        debug!(len = bytes.len(), "JsonCodec::decode: called");
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{CONNECTED_NOTICE, Content};

    #[test]
    fn test_encode_peer_message() {
        let envelope = Envelope::from_peer("peer-a", Content::from("hi"));
        let bytes = JsonCodec.encode(&envelope).unwrap();
        assert_eq!(&bytes[..], br#"{"sender":"peer-a","content":"hi"}"#);
    }

    #[test]
    fn test_encode_omits_absent_sender() {
        let bytes = JsonCodec.encode(&Envelope::connected()).unwrap();
        let json = std::str::from_utf8(&bytes).unwrap();
        assert!(!json.contains("sender"));
        assert!(!json.contains("recipient"));
        assert!(json.contains(CONNECTED_NOTICE));
    }

    #[test]
    fn test_encode_keeps_recipient_when_set() {
        let envelope = Envelope::from_peer("peer-a", Content::from("hi")).with_recipient("peer-b");
        let bytes = JsonCodec.encode(&envelope).unwrap();
        let json = std::str::from_utf8(&bytes).unwrap();
        assert!(json.contains(r#""recipient":"peer-b""#));
    }

    #[test]
    fn test_decode_tolerates_missing_fields() {
        let envelope = JsonCodec.decode(br#"{"content":"hello"}"#).unwrap();
        assert!(envelope.is_system());
        assert_eq!(envelope.content().as_text(), Some("hello"));

        let empty = JsonCodec.decode(b"{}").unwrap();
        assert!(empty.content().is_empty());
    }

    #[test]
    fn test_binary_content_decodes_as_binary() {
        let envelope = Envelope::from_peer("peer-a", Content::from(vec![1u8, 2, 3]));
        let bytes = JsonCodec.encode(&envelope).unwrap();
        let decoded = JsonCodec.decode(&bytes).unwrap();
        assert_eq!(decoded.content(), &Content::Binary(vec![1, 2, 3]));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = JsonCodec.decode(b"not json").unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
        assert!(err.to_string().contains("decode"));
    }
}
