//! GREETING / MESSAGE / END handlers (§4.5) — the plain-utterance kinds.

use crate::context::ConversationStatus;
use crate::graph::{GlobalConfig, Node};
use crate::render::render_message;
use crate::step::StepResult;
use crate::validators::FieldValue;
use rand::Rng;
use std::collections::HashMap;

fn alternatives(node: &Node) -> Vec<String> {
    node.config
        .array("alternatives")
        .map(|values| values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

/// GREETING / MESSAGE: emit templated text, then proceed sequentially.
pub fn handle_message(
    node: &Node,
    data: &HashMap<String, FieldValue>,
    conversation_id: &str,
    rng: &mut impl Rng,
) -> StepResult {
    let template = node.config.str("message").unwrap_or_default();
    let text = render_message(template, &alternatives(node), data, rng);
    StepResult::message(conversation_id, node.id.clone(), text, ConversationStatus::InProgress)
}

/// END: emit the node's farewell or the global default, mark COMPLETED.
pub fn handle_end(
    node: &Node,
    data: &HashMap<String, FieldValue>,
    global: &GlobalConfig,
    conversation_id: &str,
    rng: &mut impl Rng,
) -> StepResult {
    let template = node.config.str("message").unwrap_or(&global.farewell_message);
    let text = render_message(template, &alternatives(node), data, rng);
    StepResult::end(conversation_id, node.id.clone(), Some(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeConfig, NodeKind};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;

    fn node(message: &str) -> Node {
        let mut config = NodeConfig::default();
        config.set("message", json!(message));
        Node {
            id: "n1".to_string(),
            kind: NodeKind::Message,
            name: "n1".to_string(),
            config,
            next: Some("n2".to_string()),
            on_true: None,
            on_false: None,
            cases: indexmap::IndexMap::new(),
            parallel: Vec::new(),
        }
    }

    #[test]
    fn message_renders_template_with_field() {
        let mut data = HashMap::new();
        data.insert("name".to_string(), FieldValue::String("Ana".to_string()));
        let n = node("Hi {name}!");
        let mut rng = StdRng::seed_from_u64(1);
        let result = handle_message(&n, &data, "c1", &mut rng);
        assert_eq!(result.message.as_deref(), Some("Hi Ana!"));
        assert_eq!(result.status, ConversationStatus::InProgress);
    }

    #[test]
    fn end_falls_back_to_global_farewell_when_unconfigured() {
        let mut n = node("");
        n.config = NodeConfig::default();
        let global = GlobalConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let result = handle_end(&n, &HashMap::new(), &global, "c1", &mut rng);
        assert_eq!(result.message.as_deref(), Some(global.farewell_message.as_str()));
        assert!(result.is_final);
        assert_eq!(result.status, ConversationStatus::Completed);
    }
}
