//! The result of advancing a conversation by one step (§3).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The closed set of outcomes a step can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepResultKind {
    Message,
    Question,
    MediaRequest,
    MediaSend,
    Action,
    Handoff,
    Error,
    End,
    Continue,
    Parallel,
}

/// Everything produced by a single call into the engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepResult {
    pub result_kind: StepResultKind,
    pub conversation_id: String,
    pub node_id: Option<String>,

    /// Rendered message text, when `result_kind` carries one.
    pub message: Option<String>,
    /// Field name the conversation is now waiting on, for `QUESTION` /
    /// `MEDIA_REQUEST`.
    pub expected_field: Option<String>,
    /// Media kind expected back, for `MEDIA_REQUEST`.
    pub expected_media_kind: Option<String>,

    pub is_final: bool,
    pub status: crate::context::ConversationStatus,

    /// Stable error code from §7, set only when `result_kind == ERROR`.
    pub error: Option<String>,

    /// Free-form metadata surfaced to the caller (action outcomes, scorer
    /// snapshot, branch taken, etc).
    pub metadata: HashMap<String, serde_json::Value>,
}

impl StepResult {
    pub fn message(conversation_id: impl Into<String>, node_id: impl Into<String>, text: impl Into<String>, status: crate::context::ConversationStatus) -> Self {
        StepResult {
            result_kind: StepResultKind::Message,
            conversation_id: conversation_id.into(),
            node_id: Some(node_id.into()),
            message: Some(text.into()),
            expected_field: None,
            expected_media_kind: None,
            is_final: false,
            status,
            error: None,
            metadata: HashMap::new(),
        }
    }

    pub fn question(
        conversation_id: impl Into<String>,
        node_id: impl Into<String>,
        text: impl Into<String>,
        expected_field: impl Into<String>,
    ) -> Self {
        StepResult {
            result_kind: StepResultKind::Question,
            conversation_id: conversation_id.into(),
            node_id: Some(node_id.into()),
            message: Some(text.into()),
            expected_field: Some(expected_field.into()),
            expected_media_kind: None,
            is_final: false,
            status: crate::context::ConversationStatus::WaitingInput,
            error: None,
            metadata: HashMap::new(),
        }
    }

    pub fn end(conversation_id: impl Into<String>, node_id: impl Into<String>, text: Option<String>) -> Self {
        StepResult {
            result_kind: StepResultKind::End,
            conversation_id: conversation_id.into(),
            node_id: Some(node_id.into()),
            message: text,
            expected_field: None,
            expected_media_kind: None,
            is_final: true,
            status: crate::context::ConversationStatus::Completed,
            error: None,
            metadata: HashMap::new(),
        }
    }

    pub fn handoff(conversation_id: impl Into<String>, node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let mut metadata = HashMap::new();
        metadata.insert("reason".to_string(), serde_json::Value::String(reason.clone()));
        StepResult {
            result_kind: StepResultKind::Handoff,
            conversation_id: conversation_id.into(),
            node_id: Some(node_id.into()),
            message: Some(reason),
            expected_field: None,
            expected_media_kind: None,
            is_final: true,
            status: crate::context::ConversationStatus::Handoff,
            error: None,
            metadata,
        }
    }

    pub fn error(conversation_id: impl Into<String>, node_id: Option<String>, code: &'static str, message: impl Into<String>) -> Self {
        StepResult {
            result_kind: StepResultKind::Error,
            conversation_id: conversation_id.into(),
            node_id,
            message: Some(message.into()),
            expected_field: None,
            expected_media_kind: None,
            is_final: false,
            status: crate::context::ConversationStatus::Error,
            error: Some(code.to_string()),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
