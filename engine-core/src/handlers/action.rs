//! ACTION (and its WEBHOOK_CALL/API_INTEGRATION/NOTIFICATION/ALERT/FOLLOWUP/
//! commercial siblings) handlers (§4.5).
//!
//! None of these block progression on failure: an action error is
//! recorded as `error.code=ACTION_ERROR` on the step result, not
//! propagated as an [`crate::error::EngineError`]. External collaborators
//! (CRM updates, SMS/email delivery, scheduling) are represented as typed
//! requests on the step result rather than executed here — this handler's
//! job ends at "describe what should happen next", same boundary
//! `langgraph-core`'s tool-calling layer draws between deciding to call a
//! tool and actually calling it.

use crate::actions::http::{HttpActionExecutor, HttpActionRequest, render_template};
use crate::context::ConversationStatus;
use crate::graph::Node;
use crate::render::render_message;
use crate::step::StepResult;
use crate::validators::FieldValue;
use rand::Rng;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;

fn sequential(node: &Node, conversation_id: &str) -> StepResult {
    StepResult::message(conversation_id, node.id.clone(), String::new(), ConversationStatus::InProgress)
}

/// ACTION / WEBHOOK_CALL / API_INTEGRATION: perform (or describe) the
/// configured side effect, then always proceed sequentially.
pub async fn handle_action(
    node: &Node,
    data: &HashMap<String, FieldValue>,
    conversation_id: &str,
    executor: &dyn HttpActionExecutor,
) -> StepResult {
    let sub_kind = node.config.str("action_type").unwrap_or("webhook");

    match sub_kind {
        "webhook" => handle_webhook(node, data, conversation_id, executor).await,
        "notify_team" => handle_notify(node, data, conversation_id, false),
        _ => {
            let payload = node.config.get("payload").cloned().unwrap_or_else(|| Value::Object(Map::new()));
            let mut step = sequential(node, conversation_id);
            step = step.with_metadata("action.name", Value::String(sub_kind.to_string()));
            step = step.with_metadata("action.payload", payload);
            step
        }
    }
}

/// WEBHOOK_CALL / API_INTEGRATION nodes share the ACTION(webhook) path.
pub async fn handle_webhook(
    node: &Node,
    data: &HashMap<String, FieldValue>,
    conversation_id: &str,
    executor: &dyn HttpActionExecutor,
) -> StepResult {
    let url = render_template(node.config.str("url").unwrap_or_default(), data);
    let method = node.config.str("method").unwrap_or("POST").to_string();
    let timeout_secs = node.config.f64("timeout_seconds").unwrap_or(30.0);
    let retry_on_fail = node.config.bool("retry_on_fail").unwrap_or(false);

    let mut headers = HashMap::new();
    if let Some(Value::Object(map)) = node.config.get("headers") {
        for (k, v) in map {
            if let Some(s) = v.as_str() {
                headers.insert(k.clone(), s.to_string());
            }
        }
    }

    let body = node.config.get("body").map(|v| {
        let templated = template_json_strings(v, data);
        serde_json::to_string(&templated).unwrap_or_default()
    });

    let request = HttpActionRequest {
        url,
        method,
        headers,
        body,
        timeout: Duration::from_secs_f64(timeout_secs),
        retry_on_fail,
    };

    let result = executor.execute(&request).await;
    let mut step = sequential(node, conversation_id);
    step = step.with_metadata("action.result", serde_json::to_value(&result).unwrap_or(Value::Null));
    if !result.success {
        step = step.with_metadata("error.code", Value::String("ACTION_ERROR".to_string()));
    }
    step
}

fn template_json_strings(value: &Value, data: &HashMap<String, FieldValue>) -> Value {
    match value {
        Value::String(s) => Value::String(render_template(s, data)),
        Value::Array(items) => Value::Array(items.iter().map(|v| template_json_strings(v, data)).collect()),
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), template_json_strings(v, data));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn handle_notify(node: &Node, data: &HashMap<String, FieldValue>, conversation_id: &str, is_alert: bool) -> StepResult {
    let channel = node.config.str("channel").unwrap_or("default").to_string();
    let message = render_template(node.config.str("message").unwrap_or_default(), data);
    let recipients: Vec<String> = node
        .config
        .array("recipients")
        .map(|values| values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let urgency = node
        .config
        .str("urgency")
        .map(str::to_string)
        .unwrap_or_else(|| if is_alert { "high".to_string() } else { "normal".to_string() });

    let notification = serde_json::json!({
        "channel": channel,
        "message": message,
        "recipients": recipients,
        "urgency": urgency,
    });

    sequential(node, conversation_id).with_metadata("notification", notification)
}

/// NOTIFICATION / ALERT: populate `notification`, `ALERT` defaulting its
/// urgency to `"high"`.
pub fn handle_notification(node: &Node, data: &HashMap<String, FieldValue>, conversation_id: &str, is_alert: bool) -> StepResult {
    handle_notify(node, data, conversation_id, is_alert)
}

/// FOLLOWUP: emit templated text, plus an action request carrying the
/// schedule the caller is responsible for enacting.
pub fn handle_followup(
    node: &Node,
    data: &HashMap<String, FieldValue>,
    conversation_id: &str,
    rng: &mut impl Rng,
) -> StepResult {
    let text = render_message(node.config.str("message").unwrap_or_default(), &[], data, rng);
    let intervals = node.config.array("intervals").cloned().unwrap_or_default();
    let messages = node.config.array("messages").cloned().unwrap_or_default();
    let max_followups = node.config.u64("max_followups").unwrap_or(3);

    let payload = serde_json::json!({
        "intervals": intervals,
        "messages": messages,
        "max_followups": max_followups,
    });

    StepResult::message(conversation_id, node.id.clone(), text, ConversationStatus::InProgress)
        .with_metadata("action.name", Value::String("schedule_followup".to_string()))
        .with_metadata("action.payload", payload)
}

/// PROPOSAL / NEGOTIATION / SCHEDULING / VISIT: template-render a
/// multi-section text and emit an action request with the structured
/// payload the caller needs to act on.
pub fn handle_commercial(
    node: &Node,
    data: &HashMap<String, FieldValue>,
    conversation_id: &str,
    kind_tag: &str,
) -> StepResult {
    let title = render_template(node.config.str("title").unwrap_or(kind_tag), data);
    let mut sections = vec![title.clone()];

    if let Some(Value::Object(values)) = node.config.get("values") {
        sections.push("Values:".to_string());
        for (k, v) in values {
            sections.push(format!("- {k}: {}", render_template(&v.to_string(), data)));
        }
    }
    if let Some(conditions) = node.config.str("conditions") {
        sections.push(format!("Conditions: {}", render_template(conditions, data)));
    }
    if let Some(validity) = node.config.str("validity") {
        sections.push(format!("Valid until: {}", render_template(validity, data)));
    }
    if let Some(times) = node.config.array("times") {
        sections.push("Available times:".to_string());
        for t in times {
            if let Some(s) = t.as_str() {
                sections.push(format!("- {}", render_template(s, data)));
            }
        }
    }

    let text = sections.join("\n");
    let payload = node.config.get("payload").cloned().unwrap_or_else(|| Value::Object(Map::new()));

    StepResult::message(conversation_id, node.id.clone(), text, ConversationStatus::InProgress)
        .with_metadata("action.name", Value::String(kind_tag.to_lowercase()))
        .with_metadata("action.payload", payload)
}
