//! Error types for context-store operations.

use thiserror::Error;

/// Result type for context-store operations.
pub type Result<T> = std::result::Result<T, ContextStoreError>;

/// Errors a [`crate::traits::ContextStore`] implementation can raise.
#[derive(Error, Debug)]
pub enum ContextStoreError {
    /// No context exists for the given `conversation_id`.
    #[error("context not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization of a context failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing storage rejected the operation.
    #[error("storage error: {0}")]
    Storage(String),

    /// A caller-supplied argument was invalid (e.g. empty conversation id).
    #[error("invalid argument: {0}")]
    Invalid(String),

    /// Catch-all for conditions not covered by a more specific variant.
    #[error("{0}")]
    Custom(String),
}
