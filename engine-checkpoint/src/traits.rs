//! Storage abstraction for conversation contexts.
//!
//! The engine itself holds no opinion on durability —
//! [`engine_core::engine::Engine`] only ever touches a `&mut
//! ConversationContext` the caller hands it.
//! `ContextStore` is the seam a caller plugs a real backend into (Redis,
//! Postgres, DynamoDB, ...) so a conversation survives across process
//! restarts and horizontally-scaled workers. [`crate::memory`] ships the
//! reference in-process implementation.

use crate::error::Result;
use async_trait::async_trait;
use engine_core::ConversationContext;
use futures::stream::Stream;
use std::pin::Pin;

/// Async stream of conversation contexts, newest first.
pub type ContextStream = Pin<Box<dyn Stream<Item = Result<ConversationContext>> + Send + 'static>>;

/// Persists and retrieves [`ConversationContext`] by `conversation_id`.
///
/// Implementations must be `Send + Sync`: the engine calls through a shared
/// reference from any number of concurrent step handlers.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Fetch the current context for a conversation, or `None` if it has
    /// never been saved.
    async fn get(&self, conversation_id: &str) -> Result<Option<ConversationContext>>;

    /// Persist (insert or overwrite) a conversation's context. Called after
    /// every successful step so a crash never loses more than the step in
    /// flight.
    async fn put(&self, context: &ConversationContext) -> Result<()>;

    /// Stream contexts updated at or before `before` (all, if `None`),
    /// newest first, capped at `limit` if given. Used by maintenance jobs
    /// (e.g. sweeping timed-out conversations) rather than the hot path.
    async fn list(
        &self,
        before: Option<chrono::DateTime<chrono::Utc>>,
        limit: Option<usize>,
    ) -> Result<ContextStream>;

    /// Permanently remove a conversation's context.
    async fn delete(&self, conversation_id: &str) -> Result<()>;
}
