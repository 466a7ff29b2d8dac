//! QUESTION and typed-input handlers (§4.5) — the two-phase prompt/validate
//! kinds.
//!
//! Typed kinds (`EMAIL`, `PHONE`, `TAXID_PERSON`, ...) preset their field
//! name and validator kind via [`crate::graph::NodeKind::default_field`];
//! plain `QUESTION` nodes read both from config. Both share this handler
//! since the two-phase contract — prompt on empty input, validate
//! otherwise — doesn't vary by kind.

use crate::context::{ConversationContext, ConversationStatus, FieldStatus, FieldValidationRecord};
use crate::graph::{GlobalConfig, Node, NodeKind};
use crate::render::render_message;
use crate::step::StepResult;
use crate::validators::{self, FieldKind};
use rand::Rng;

fn field_and_kind(node: &Node) -> (String, FieldKind) {
    if let Some((default_name, kind)) = node.kind.default_field() {
        let name = node.config.string("field").unwrap_or_else(|| default_name.to_string());
        return (name, kind);
    }
    let name = node.config.string("field").unwrap_or_else(|| node.id.clone());
    let kind = node
        .config
        .str("field_kind")
        .map(FieldKind::from_name)
        .unwrap_or(FieldKind::Text);
    (name, kind)
}

fn prompt_text(node: &Node) -> String {
    let base = node.config.str("prompt").unwrap_or_default();
    let options = node.config.array("options");
    match options {
        Some(opts) if !opts.is_empty() => {
            let mut text = base.to_string();
            for opt in opts {
                if let Some(s) = opt.as_str() {
                    text.push_str(&format!("\n- {s}"));
                }
            }
            text
        }
        _ => base.to_string(),
    }
}

/// Drive one step of the two-phase contract. `user_input` is `None`/empty
/// on first entry, `Some(text)` once the caller has a reply to validate.
pub fn handle_input(
    node: &Node,
    ctx: &mut ConversationContext,
    global: &GlobalConfig,
    user_input: Option<&str>,
    rng: &mut impl Rng,
) -> StepResult {
    let (field, kind) = field_and_kind(node);

    let is_empty_input = user_input.map(str::trim).map(str::is_empty).unwrap_or(true);
    if is_empty_input {
        let text = render_message(&prompt_text(node), &[], &ctx.collected_data, rng);
        ctx.awaiting_input = true;
        return StepResult::question(ctx.conversation_id.clone(), node.id.clone(), text, field);
    }

    let required = node.config.bool("required").unwrap_or(true);
    let result = validators::validate(kind, user_input, required);

    if result.is_valid {
        if let Some(value) = result.cleaned_value {
            ctx.collected_data.insert(field.clone(), value);
        }
        ctx.reset_retry(&node.id);
        ctx.field_validation.insert(
            field.clone(),
            FieldValidationRecord {
                attempts: ctx.field_validation.get(&field).map(|r| r.attempts).unwrap_or(0) + 1,
                last_error: None,
                validated_at: Some(ctx.last_activity_at),
                status: FieldStatus::Valid,
            },
        );
        ctx.awaiting_input = false;
        return StepResult::message(ctx.conversation_id.clone(), node.id.clone(), String::new(), ConversationStatus::InProgress);
    }

    let attempts = ctx.increment_retry(&node.id);
    let max_retries = node.config.f64("max_retries").map(|v| v as u32).unwrap_or(global.max_retries);
    ctx.field_validation.insert(
        field.clone(),
        FieldValidationRecord {
            attempts,
            last_error: result.error_code,
            validated_at: None,
            status: FieldStatus::Invalid,
        },
    );

    if attempts >= max_retries {
        ctx.awaiting_input = false;
        let fallback = node.config.string("fallback_department").unwrap_or_else(|| "general".to_string());
        let mut step = StepResult::handoff(ctx.conversation_id.clone(), node.id.clone(), "max_retries_exceeded");
        step = step.with_metadata("department", serde_json::Value::String(fallback));
        return step;
    }

    let error_message = node
        .config
        .str("error_message")
        .map(str::to_string)
        .unwrap_or_else(|| global.validation_error_message.clone());
    ctx.awaiting_input = true;
    StepResult::question(ctx.conversation_id.clone(), node.id.clone(), error_message, field)
}

/// Whether a node kind is routed through this handler.
pub fn handles(kind: &NodeKind) -> bool {
    kind.is_input()
}
