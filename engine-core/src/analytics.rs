//! Analytics event sink (§4.8).
//!
//! Emission is fire-and-forget: a step never blocks on, retries, or fails
//! because of an analytics write. The bounded channel drops the oldest
//! queued event when full rather than the newest, so a slow consumer loses
//! history instead of losing the event that just happened.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// The closed set of event kinds a step can emit (§4.8).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsEventKind {
    ConversationStarted,
    ConversationEnded,
    ConversationAbandoned,
    MessageReceived,
    MessageSent,
    MessageFailed,
    FieldCollected,
    FieldValidationFailed,
    FieldRetry,
    NodeEntered,
    NodeCompleted,
    ConditionEvaluated,
    SwitchBranchTaken,
    FlowCompleted,
    FlowAbandoned,
    LeadScored,
    LeadQualified,
    LeadDisqualified,
    TemperatureChanged,
    NotificationTriggered,
    NotificationSent,
    NotificationFailed,
    HandoffRequested,
    HandoffCompleted,
    UserIntentDetected,
    SentimentDetected,
    ErrorOccurred,
    RateLimited,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub kind: AnalyticsEventKind,
    pub tenant_id: Option<String>,
    pub lead_id: Option<String>,
    pub conversation_id: String,
    pub node_id: Option<String>,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
    pub attributes: HashMap<String, serde_json::Value>,
}

/// Where emitted events go. Production wires [`InMemoryEventSink`] (or an
/// external-queue-backed equivalent) behind an `Arc`; tests use
/// [`NullEventSink`] when the assertions don't care about analytics at all.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: AnalyticsEvent);
}

/// Discards every event. The default for contexts that never configured an
/// external sink.
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
    async fn emit(&self, _event: AnalyticsEvent) {}
}

/// Bounded in-process sink backed by an `mpsc` channel; a background
/// consumer drains it via [`InMemoryEventSink::drain`]. When the channel is
/// full, `emit` drops the oldest queued event to make room rather than
/// blocking or dropping the new one.
pub struct InMemoryEventSink {
    sender: mpsc::Sender<AnalyticsEvent>,
    buffer: Arc<Mutex<std::collections::VecDeque<AnalyticsEvent>>>,
    capacity: usize,
}

impl InMemoryEventSink {
    pub fn new(capacity: usize) -> (Self, InMemoryEventSinkHandle) {
        let capacity = capacity.max(1);
        let (sender, mut receiver) = mpsc::channel(capacity);
        let buffer = Arc::new(Mutex::new(std::collections::VecDeque::with_capacity(capacity)));
        let buffer_for_task = Arc::clone(&buffer);

        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                let mut guard = buffer_for_task.lock().unwrap();
                if guard.len() == capacity {
                    guard.pop_front();
                }
                guard.push_back(event);
            }
        });

        let handle = InMemoryEventSinkHandle { buffer: Arc::clone(&buffer) };
        (InMemoryEventSink { sender, buffer, capacity }, handle)
    }
}

#[async_trait]
impl EventSink for InMemoryEventSink {
    async fn emit(&self, event: AnalyticsEvent) {
        // try_send, not send: a full channel must never block the step that
        // produced the event (§4.8's fire-and-forget contract).
        if self.sender.try_send(event.clone()).is_err() {
            let mut guard = self.buffer.lock().unwrap();
            if guard.len() == self.capacity {
                guard.pop_front();
            }
            guard.push_back(event);
        }
    }
}

/// Read-only view into an [`InMemoryEventSink`]'s buffer, for tests and
/// debugging endpoints.
#[derive(Clone)]
pub struct InMemoryEventSinkHandle {
    buffer: Arc<Mutex<std::collections::VecDeque<AnalyticsEvent>>>,
}

impl InMemoryEventSinkHandle {
    pub fn drain(&self) -> Vec<AnalyticsEvent> {
        let mut guard = self.buffer.lock().unwrap();
        guard.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: AnalyticsEventKind, id: &str) -> AnalyticsEvent {
        AnalyticsEvent {
            kind,
            tenant_id: None,
            lead_id: None,
            conversation_id: id.to_string(),
            node_id: None,
            occurred_at: chrono::Utc::now(),
            attributes: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn null_sink_accepts_and_discards() {
        let sink = NullEventSink;
        sink.emit(event(AnalyticsEventKind::ConversationStarted, "c1")).await;
    }

    #[tokio::test]
    async fn in_memory_sink_records_events() {
        let (sink, handle) = InMemoryEventSink::new(8);
        sink.emit(event(AnalyticsEventKind::ConversationStarted, "c1")).await;
        sink.emit(event(AnalyticsEventKind::NodeEntered, "c1")).await;

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let drained = handle.drain();
        assert_eq!(drained.len(), 2);
    }

    #[tokio::test]
    async fn over_capacity_drops_oldest_not_newest() {
        let (sink, handle) = InMemoryEventSink::new(2);
        for i in 0..5 {
            sink.emit(event(AnalyticsEventKind::NodeEntered, &format!("c{i}"))).await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let drained = handle.drain();
        assert!(drained.len() <= 2);
        if let Some(last) = drained.last() {
            assert_eq!(last.conversation_id, "c4");
        }
    }
}
