//! DELAY / LOOP / PARALLEL / HANDOFF handlers (§4.5) — the flow-control
//! kinds that don't fit the plain-utterance or typed-input shapes.

use crate::condition::evaluate_expression;
use crate::context::{ConversationContext, ConversationStatus};
use crate::graph::Node;
use crate::render::render_message;
use crate::step::{StepResult, StepResultKind};
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;

/// DELAY: suspend for `delay_seconds`, then proceed sequentially.
pub async fn handle_delay(node: &Node, conversation_id: &str) -> StepResult {
    let secs = node.config.f64("delay_seconds").unwrap_or(0.0).max(0.0);
    if secs > 0.0 {
        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
    }
    StepResult::message(conversation_id, node.id.clone(), String::new(), ConversationStatus::InProgress)
}

/// LOOP: bump this node's own iteration counter and decide whether to keep
/// looping. This is the one cycle-forming kind the loader's cycle check
/// trusts to bound itself (§4.1).
pub fn handle_loop(node: &Node, ctx: &mut ConversationContext) -> bool {
    let key = format!("_loop_{}_count", node.id);
    let count = ctx.variables.get(&key).and_then(|v| v.as_u64()).unwrap_or(0) + 1;
    ctx.variables.insert(key, serde_json::Value::from(count));

    let max_iterations = node.config.u64("max_iterations").unwrap_or(10);
    let condition_met = match node.config.str("loop_condition") {
        Some(expr) => evaluate_expression(&ctx.collected_data, expr),
        None => true,
    };

    condition_met && count <= max_iterations
}

/// PARALLEL: fan out graph positions. The engine processes one path per
/// inbound message; this handler just records which paths remain.
pub fn handle_parallel(node: &Node, ctx: &mut ConversationContext) -> StepResult {
    let paths: Vec<String> = node.parallel.clone();
    let (first, rest) = match paths.split_first() {
        Some((first, rest)) => (Some(first.clone()), rest.to_vec()),
        None => (None, Vec::new()),
    };

    let wait_for_all = node.config.bool("wait_for_all").unwrap_or(false);
    let merge_node_id = node.config.string("merge_node_id");
    let conversation_id = ctx.conversation_id.clone();

    ctx.metadata.insert(
        format!("_parallel_{}", node.id),
        serde_json::json!({
            "remaining_paths": rest,
            "wait_for_all": wait_for_all,
            "merge_node_id": merge_node_id,
        }),
    );

    let mut step = StepResult {
        result_kind: StepResultKind::Parallel,
        conversation_id,
        node_id: Some(node.id.clone()),
        message: None,
        expected_field: None,
        expected_media_kind: None,
        is_final: false,
        status: ConversationStatus::InProgress,
        error: None,
        metadata: HashMap::new(),
    };
    if let Some(first) = first {
        step = step.with_metadata("next_node_override", serde_json::Value::String(first));
    }
    step
}

/// HANDOFF: terminal — populate the handoff reason/department and set
/// status HANDOFF.
pub fn handle_handoff(
    node: &Node,
    data: &HashMap<String, crate::validators::FieldValue>,
    conversation_id: &str,
    rng: &mut impl Rng,
) -> StepResult {
    let reason = node.config.str("reason").unwrap_or("handoff_requested").to_string();
    let department = node.config.string("department").unwrap_or_else(|| "general".to_string());
    let message = node
        .config
        .str("message")
        .map(|m| render_message(m, &[], data, rng))
        .unwrap_or_else(|| "You're being connected with a member of our team.".to_string());

    StepResult::handoff(conversation_id, node.id.clone(), reason)
        .with_metadata("department", serde_json::Value::String(department))
        .with_metadata("message", serde_json::Value::String(message))
}
