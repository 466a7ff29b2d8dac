//! In-memory context store for development and testing.
//!
//! Mirrors `langgraph-checkpoint`'s `InMemoryCheckpointSaver`: an
//! `Arc<RwLock<HashMap>>` keyed by conversation id, no eviction, a `clear()`
//! for test isolation. Data does not survive a process restart — production
//! deployments plug in a real [`crate::traits::ContextStore`] backend
//! instead.

use crate::error::{ContextStoreError, Result};
use crate::traits::{ContextStore, ContextStream};
use async_trait::async_trait;
use engine_core::ConversationContext;
use futures::stream;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type Storage = Arc<RwLock<HashMap<String, ConversationContext>>>;

/// Reference [`ContextStore`] implementation backed by an in-process map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryContextStore {
    storage: Storage,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of conversations currently held.
    pub async fn len(&self) -> usize {
        self.storage.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every stored context. Useful between test cases.
    pub async fn clear(&self) {
        self.storage.write().await.clear();
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn get(&self, conversation_id: &str) -> Result<Option<ConversationContext>> {
        if conversation_id.is_empty() {
            return Err(ContextStoreError::Invalid("conversation_id must not be empty".to_string()));
        }
        Ok(self.storage.read().await.get(conversation_id).cloned())
    }

    async fn put(&self, context: &ConversationContext) -> Result<()> {
        if context.conversation_id.is_empty() {
            return Err(ContextStoreError::Invalid("conversation_id must not be empty".to_string()));
        }
        self.storage
            .write()
            .await
            .insert(context.conversation_id.clone(), context.clone());
        Ok(())
    }

    async fn list(
        &self,
        before: Option<chrono::DateTime<chrono::Utc>>,
        limit: Option<usize>,
    ) -> Result<ContextStream> {
        let storage = self.storage.read().await;
        let mut contexts: Vec<ConversationContext> = storage.values().cloned().collect();
        contexts.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));

        if let Some(cutoff) = before {
            contexts.retain(|c| c.last_activity_at <= cutoff);
        }
        if let Some(limit) = limit {
            contexts.truncate(limit);
        }

        let results: Vec<Result<ConversationContext>> = contexts.into_iter().map(Ok).collect();
        Ok(Box::pin(stream::iter(results)))
    }

    async fn delete(&self, conversation_id: &str) -> Result<()> {
        self.storage.write().await.remove(conversation_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn context(id: &str) -> ConversationContext {
        ConversationContext::new(id, "graph-1", chrono::Utc::now())
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemoryContextStore::new();
        store.put(&context("c1")).await.unwrap();

        let loaded = store.get("c1").await.unwrap().unwrap();
        assert_eq!(loaded.conversation_id, "c1");
    }

    #[tokio::test]
    async fn missing_conversation_returns_none() {
        let store = InMemoryContextStore::new();
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_overwrites_existing_entry() {
        let store = InMemoryContextStore::new();
        let mut ctx = context("c1");
        store.put(&ctx).await.unwrap();

        ctx.collected_data.insert(
            "name".to_string(),
            engine_core::validators::FieldValue::String("Ana".to_string()),
        );
        store.put(&ctx).await.unwrap();

        let loaded = store.get("c1").await.unwrap().unwrap();
        assert!(loaded.collected_data.contains_key("name"));
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let store = InMemoryContextStore::new();
        store.put(&context("c1")).await.unwrap();
        store.delete("c1").await.unwrap();
        assert!(store.get("c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_orders_newest_first_and_respects_limit() {
        let store = InMemoryContextStore::new();
        let mut a = context("a");
        a.last_activity_at = chrono::Utc::now() - chrono::Duration::seconds(10);
        let mut b = context("b");
        b.last_activity_at = chrono::Utc::now();
        store.put(&a).await.unwrap();
        store.put(&b).await.unwrap();

        let results: Vec<_> = store.list(None, Some(1)).await.unwrap().collect().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap().conversation_id, "b");
    }

    #[tokio::test]
    async fn clear_empties_the_store() {
        let store = InMemoryContextStore::new();
        store.put(&context("c1")).await.unwrap();
        store.clear().await;
        assert_eq!(store.len().await, 0);
    }
}
