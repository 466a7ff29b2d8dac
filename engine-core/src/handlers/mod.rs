//! Per-node-kind handlers (§4.5).
//!
//! Each submodule handles a cluster of [`crate::graph::NodeKind`] variants
//! that share a shape (plain utterance, typed input, branching, outbound
//! action, media, flow control). [`crate::engine`] dispatches a visited
//! node to exactly one of these based on its kind; nodes outside the closed
//! set fall through to [`unknown_kind`].

pub mod action;
pub mod branching;
pub mod control;
pub mod input;
pub mod media;
pub mod utterance;

use crate::graph::Node;
use crate::step::StepResult;

/// The single designated branch for a `type` tag outside the closed set
/// (§6: "unknown types are tolerated"). Treated as a no-op pass-through
/// that just follows `next`, so an unrecognized node never breaks a
/// conversation outright.
pub fn unknown_kind(node: &Node, conversation_id: &str) -> StepResult {
    tracing::warn!(node_id = %node.id, "unknown node kind, passing through");
    StepResult::message(
        conversation_id,
        node.id.clone(),
        String::new(),
        crate::context::ConversationStatus::InProgress,
    )
    .with_metadata("unknown_kind", serde_json::Value::Bool(true))
}
