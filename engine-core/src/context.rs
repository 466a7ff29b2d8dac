//! Conversation context (§3): the durable state a step reads and writes.
//!
//! `ConversationContext` is plain data — no behavior beyond small derived
//! getters — so it round-trips through JSON untouched and can be handed to
//! any persistence backend without the engine caring how it's stored.

use crate::graph::NodeKind;
use crate::validators::{FieldValue, ValidationErrorCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Current value of the `schema_version` tag written into every serialized
/// context (§6's "stable" context serialization format).
pub const SCHEMA_VERSION: &str = "2.0";

/// Lifecycle states from §3. Transitions are one-directional except for the
/// `IN_PROGRESS <-> WAITING_INPUT/WAITING_MEDIA` loop around each step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationStatus {
    NotStarted,
    InProgress,
    WaitingInput,
    WaitingMedia,
    Completed,
    Handoff,
    Error,
    Timeout,
}

impl ConversationStatus {
    /// Terminal statuses reject further inbound steps (§5:
    /// `FLOW_ALREADY_TERMINAL`).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConversationStatus::Completed
                | ConversationStatus::Handoff
                | ConversationStatus::Error
                | ConversationStatus::Timeout
        )
    }
}

/// One entry in the visit history (§3).
///
/// `duration_ms` is derived rather than stored (like `idle_time` /
/// `session_duration` below): it only exists once `exited_at` is known.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeVisit {
    pub node_id: String,
    pub kind: NodeKind,
    pub entered_at: chrono::DateTime<chrono::Utc>,
    pub exited_at: Option<chrono::DateTime<chrono::Utc>>,
    pub user_input: Option<String>,
    pub response: Option<String>,
    pub data_collected: Option<HashMap<String, FieldValue>>,
}

impl NodeVisit {
    pub fn duration_ms(&self) -> Option<i64> {
        self.exited_at.map(|exited| (exited - self.entered_at).num_milliseconds())
    }
}

/// Per-field validation bookkeeping (§3: "attempts, last_error, validated_at,
/// status").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldValidationRecord {
    pub attempts: u32,
    pub last_error: Option<ValidationErrorCode>,
    pub validated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub status: FieldStatus,
}

impl Default for FieldValidationRecord {
    fn default() -> Self {
        FieldValidationRecord {
            attempts: 0,
            last_error: None,
            validated_at: None,
            status: FieldStatus::Pending,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldStatus {
    Pending,
    Valid,
    Invalid,
    Skipped,
}

/// The full durable state of one conversation (§3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationContext {
    pub conversation_id: String,
    pub lead_id: Option<String>,
    pub tenant_id: Option<String>,
    pub graph_id: String,
    pub current_node_id: Option<String>,
    pub previous_node_id: Option<String>,
    pub status: ConversationStatus,
    pub schema_version: String,

    pub history: Vec<NodeVisit>,
    pub collected_data: HashMap<String, FieldValue>,
    pub field_validation: HashMap<String, FieldValidationRecord>,
    pub retry_counts: HashMap<String, u32>,

    pub started_at: chrono::DateTime<chrono::Utc>,
    pub last_activity_at: chrono::DateTime<chrono::Utc>,

    pub awaiting_input: bool,
    pub awaiting_media: bool,
    pub expected_media_kind: Option<String>,
    pub is_qualified: bool,
    pub qualification_score: Option<f64>,

    pub variables: HashMap<String, serde_json::Value>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ConversationContext {
    pub fn new(conversation_id: impl Into<String>, graph_id: impl Into<String>, now: chrono::DateTime<chrono::Utc>) -> Self {
        ConversationContext {
            conversation_id: conversation_id.into(),
            lead_id: None,
            tenant_id: None,
            graph_id: graph_id.into(),
            current_node_id: None,
            previous_node_id: None,
            status: ConversationStatus::NotStarted,
            schema_version: SCHEMA_VERSION.to_string(),
            history: Vec::new(),
            collected_data: HashMap::new(),
            field_validation: HashMap::new(),
            retry_counts: HashMap::new(),
            started_at: now,
            last_activity_at: now,
            awaiting_input: false,
            awaiting_media: false,
            expected_media_kind: None,
            is_qualified: false,
            qualification_score: None,
            variables: HashMap::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_lead(mut self, lead_id: impl Into<String>) -> Self {
        self.lead_id = Some(lead_id.into());
        self
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Idle time since the last recorded activity, as of `now`.
    pub fn idle_time(&self, now: chrono::DateTime<chrono::Utc>) -> chrono::Duration {
        now - self.last_activity_at
    }

    /// Total wall-clock duration since the conversation started.
    pub fn session_duration(&self, now: chrono::DateTime<chrono::Utc>) -> chrono::Duration {
        now - self.started_at
    }

    /// Appends a visit and marks the previous one exited, per §3's
    /// append-only history invariant. Also advances `previous_node_id`.
    pub fn enter_node(&mut self, node_id: impl Into<String>, kind: NodeKind, now: chrono::DateTime<chrono::Utc>) {
        if let Some(last) = self.history.last_mut() {
            if last.exited_at.is_none() {
                last.exited_at = Some(now);
            }
        }
        self.previous_node_id = self.current_node_id.take();
        let node_id = node_id.into();
        self.current_node_id = Some(node_id.clone());
        self.history.push(NodeVisit {
            node_id,
            kind,
            entered_at: now,
            exited_at: None,
            user_input: None,
            response: None,
            data_collected: None,
        });
    }

    pub fn retry_count(&self, node_id: &str) -> u32 {
        self.retry_counts.get(node_id).copied().unwrap_or(0)
    }

    pub fn increment_retry(&mut self, node_id: &str) -> u32 {
        let counter = self.retry_counts.entry(node_id.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    pub fn reset_retry(&mut self, node_id: &str) {
        self.retry_counts.remove(node_id);
    }

    pub fn touch(&mut self, now: chrono::DateTime<chrono::Utc>) {
        self.last_activity_at = now;
    }
}
