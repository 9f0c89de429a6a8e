//! Connection identity generation

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Errors from an identity source
#[derive(Debug, Error)]
pub enum IdError {
    #[error("Identity source unavailable: {0}")]
    Unavailable(String),
}

/// Supplies a globally unique identifier for each new connection
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> Result<String, IdError>;
}

/// Time-ordered UUID v7 identities
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidSource;

impl IdSource for UuidSource {
    fn next_id(&self) -> Result<String, IdError> {
        let id = Uuid::now_v7().to_string();
        debug!(%id, "UuidSource::next_id: generated");
        Ok(id)
    }
}
