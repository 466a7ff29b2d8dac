//! CONDITION / SWITCH / QUALIFICATION handlers (§4.5).
//!
//! CONDITION and SWITCH emit no reply text — [`crate::navigator`] resolves
//! their next node directly from the node's config and `collected_data`, so
//! there's nothing for a handler to do beyond what the navigator already
//! does. QUALIFICATION is the one branching kind with real handler work: it
//! computes a score and decides `true_branch`/`false_branch` from it.

use crate::context::ConversationContext;
use crate::graph::{GlobalConfig, Node};
use std::collections::HashMap;

/// Outcome of a QUALIFICATION node: whether the lead cleared the threshold,
/// plus enough detail to populate `metadata.score_breakdown` on the step.
pub struct QualificationOutcome {
    pub qualified: bool,
    pub score: f64,
    pub factors: HashMap<String, f64>,
}

/// Σ of `weights[f]` over the fields this node evaluates (defaulting to
/// every weighted field) that are present and non-empty in
/// `collected_data`; qualified iff the sum meets the threshold.
pub fn handle_qualification(node: &Node, ctx: &mut ConversationContext, global: &GlobalConfig) -> QualificationOutcome {
    let fields_evaluated: Vec<String> = node
        .config
        .array("fields_evaluated")
        .map(|values| values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_else(|| global.qualification_weights.keys().cloned().collect());

    let min_score = node.config.f64("min_score").unwrap_or(global.qualification_threshold);

    let mut score = 0.0;
    let mut factors = HashMap::new();
    for field in &fields_evaluated {
        let present = ctx.collected_data.get(field).map(|v| !v.is_empty()).unwrap_or(false);
        if present {
            let weight = global.qualification_weights.get(field).copied().unwrap_or(0.0);
            score += weight;
            factors.insert(field.clone(), weight);
        }
    }

    let qualified = score >= min_score;
    ctx.is_qualified = qualified;
    ctx.qualification_score = Some(score);

    QualificationOutcome { qualified, score, factors }
}
