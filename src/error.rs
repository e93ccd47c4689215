//! Error types for the batching stage.

use thiserror::Error;

/// Construction-time configuration validation failures.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("send_batch_max_size ({max}) must be 0 or >= send_batch_size ({size})")]
    MaxSizeBelowBatchSize { size: usize, max: usize },

    #[error("metadata_keys contains an empty key")]
    EmptyMetadataKey,
}

/// Error returned by a downstream sink's `accept` call.
///
/// The sink's concrete error type is out of scope for this crate (it is an
/// external collaborator), so this wraps whatever it produces behind a
/// boxed `std::error::Error`.
#[derive(Debug, Error)]
#[error("downstream sink rejected batch: {source}")]
pub struct SinkError {
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl SinkError {
    pub fn new(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self { source: Box::new(source) }
    }

    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            source: Box::<dyn std::error::Error + Send + Sync>::from(message.into()),
        }
    }
}

/// Error surfaced from a `consume*` entry point.
///
/// `DOWNSTREAM_FAILURE` is deliberately absent here: per the spec, a
/// downstream sink error is logged and the batch is considered delivered
/// from the stage's point of view, so it never reaches the producer.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum StageError {
    #[error("tenant cardinality limit exceeded")]
    TenantLimitExceeded,
}

impl StageError {
    /// Whether this is a permanent error - not worth retrying at a higher
    /// level, since this stage never retries internally regardless.
    pub fn is_permanent(&self) -> bool {
        matches!(self, StageError::TenantLimitExceeded)
    }
}
