//! Shared application state handed to every handler.

use engine_core::actions::http::{HttpActionExecutor, ReqwestExecutor};
use engine_core::analytics::EventSink;
use engine_core::engine::ConversationLocks;
use engine_core::graph::Graph;
use engine_checkpoint::ContextStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory registry of validated graphs, keyed by `graph_id`.
///
/// Loading/versioning graphs from a config service is out of scope (§1) —
/// this registry only holds what `/graphs/validate` has already accepted,
/// the same way the engine itself treats a [`Graph`] as immutable shared
/// data once constructed.
#[derive(Default)]
pub struct GraphRegistry {
    graphs: RwLock<HashMap<String, Arc<Graph>>>,
}

impl GraphRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, graph_id: &str) -> Option<Arc<Graph>> {
        self.graphs.read().await.get(graph_id).cloned()
    }

    pub async fn put(&self, graph_id: impl Into<String>, graph: Graph) {
        self.graphs.write().await.insert(graph_id.into(), Arc::new(graph));
    }
}

/// Everything handlers need, cloned cheaply per request (every field is an
/// `Arc` or `Arc`-backed already).
#[derive(Clone)]
pub struct AppState {
    pub graphs: Arc<GraphRegistry>,
    pub context_store: Arc<dyn ContextStore>,
    pub locks: Arc<ConversationLocks>,
    pub event_sink: Arc<dyn EventSink>,
    pub http_executor: Arc<dyn HttpActionExecutor>,
}

impl AppState {
    /// Reference wiring: in-memory context store, null-ish reqwest executor,
    /// no analytics consumer. Production deployments build their own
    /// `AppState` with real backends instead of calling this.
    pub fn in_memory() -> Self {
        Self {
            graphs: Arc::new(GraphRegistry::new()),
            context_store: Arc::new(engine_checkpoint::InMemoryContextStore::new()),
            locks: Arc::new(ConversationLocks::new()),
            event_sink: Arc::new(engine_core::analytics::NullEventSink),
            http_executor: Arc::new(ReqwestExecutor::new(reqwest::Client::new())),
        }
    }
}
