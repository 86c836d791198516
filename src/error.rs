//! Domain error taxonomy.
//!
//! Only structural failures ([`TargetingError::IndexNotReady`],
//! [`TargetingError::InvalidRequest`], [`TargetingError::Embedding`]) ever
//! reach a caller. [`TargetingError::GenerationService`] is produced by the
//! generative providers and always absorbed by the segmenter, which swaps in
//! deterministic fallback segments.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TargetingError {
    /// Retrieval was attempted before the similarity index was built.
    #[error("similarity index is not ready: build the catalog index first")]
    IndexNotReady,

    /// A campaign request failed validated construction.
    #[error("invalid campaign request: {0}")]
    InvalidRequest(String),

    /// The embedding collaborator failed or returned a malformed batch.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The generative text collaborator failed, timed out, or returned
    /// output that does not match the segment schema.
    #[error("generation service failed: {0}")]
    GenerationService(String),
}

pub type Result<T> = std::result::Result<T, TargetingError>;
