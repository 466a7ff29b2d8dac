//! IMAGE / DOCUMENT / AUDIO / VIDEO handlers (§4.5).
//!
//! A media node either *sends* (a `media_url` is configured) or *requests*
//! (no URL — the conversation waits for the lead to upload one).

use crate::context::ConversationStatus;
use crate::graph::{Node, NodeKind};
use crate::render::render_message;
use crate::step::{StepResult, StepResultKind};
use crate::validators::FieldValue;
use rand::Rng;
use std::collections::HashMap;

pub fn handle_media(
    node: &Node,
    data: &HashMap<String, FieldValue>,
    conversation_id: &str,
    rng: &mut impl Rng,
) -> StepResult {
    let media_kind = node.kind.as_str().to_string();

    match node.config.str("media_url") {
        Some(url) => {
            let caption = node.config.str("caption").map(|c| render_message(c, &[], data, rng));
            let mut step = StepResult {
                result_kind: StepResultKind::MediaSend,
                conversation_id: conversation_id.to_string(),
                node_id: Some(node.id.clone()),
                message: caption,
                expected_field: None,
                expected_media_kind: Some(media_kind),
                is_final: false,
                status: ConversationStatus::InProgress,
                error: None,
                metadata: HashMap::new(),
            };
            step = step.with_metadata("media_url", serde_json::Value::String(url.to_string()));
            step
        }
        None => StepResult {
            result_kind: StepResultKind::MediaRequest,
            conversation_id: conversation_id.to_string(),
            node_id: Some(node.id.clone()),
            message: node.config.str("prompt").map(|p| render_message(p, &[], data, rng)),
            expected_field: None,
            expected_media_kind: Some(media_kind),
            is_final: false,
            status: ConversationStatus::WaitingMedia,
            error: None,
            metadata: HashMap::new(),
        },
    }
}

pub fn handles(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::Image | NodeKind::Document | NodeKind::Audio | NodeKind::Video)
}
