//! Error types shared by every component of the engine.
//!
//! The taxonomy mirrors §7 of the specification: each variant carries the
//! error code that is part of the public contract (used in `StepResult`,
//! logged, and surfaced over the HTTP boundary) plus whatever context makes
//! the failure actionable.

use thiserror::Error;

/// Convenience result type using [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised while loading, validating, or executing a graph.
///
/// Every variant exposes a stable `code()` matching the table in §7 so
/// callers can branch on it without string-matching the `Display` output.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Graph failed structural validation and contains at least one
    /// ERROR-level diagnostic; the engine refuses to run it.
    #[error("graph failed validation: {0}")]
    GraphValidation(String),

    /// The conversation referenced by a step request does not exist in the
    /// backing store.
    #[error("conversation '{0}' not found")]
    ConversationNotFound(String),

    /// A step was requested for a conversation whose lock is already held by
    /// another in-flight call.
    #[error("conversation '{0}' is busy")]
    ConversationBusy(String),

    /// The step's caller-provided deadline expired before completion.
    #[error("step deadline exceeded for conversation '{0}'")]
    StepDeadline(String),

    /// The conversation is already in a terminal state and cannot accept
    /// further inbound messages.
    #[error("conversation '{0}' is already terminal")]
    FlowAlreadyTerminal(String),

    /// Serialization/deserialization of a context or graph failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A handler panicked; caught at the dispatch boundary and converted
    /// into a recoverable error without advancing the context.
    #[error("handler panicked in node '{0}': {1}")]
    HandlerPanic(String, String),

    /// Catch-all for conditions not covered by a more specific variant.
    #[error("{0}")]
    Custom(String),
}

impl EngineError {
    /// The stable error code from §7, for inclusion in `StepResult.error`.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::GraphValidation(_) => "GRAPH_VALIDATION_ERROR",
            EngineError::ConversationNotFound(_) => "CONVERSATION_NOT_FOUND",
            EngineError::ConversationBusy(_) => "CONVERSATION_BUSY",
            EngineError::StepDeadline(_) => "STEP_DEADLINE",
            EngineError::FlowAlreadyTerminal(_) => "FLOW_ALREADY_TERMINAL",
            EngineError::Serialization(_) => "SERIALIZATION_ERROR",
            EngineError::HandlerPanic(_, _) => "HANDLER_PANIC",
            EngineError::Custom(_) => "CUSTOM",
        }
    }

    /// Whether a caller can usefully retry the operation that produced this
    /// error (mirrors the "Recoverable?" column of §7's error table).
    pub fn recoverable(&self) -> bool {
        !matches!(
            self,
            EngineError::GraphValidation(_) | EngineError::FlowAlreadyTerminal(_)
        )
    }
}
