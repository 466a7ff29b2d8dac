//! Pure graph-position resolver (§4.4).
//!
//! Given a node and the data collected so far, `resolve_next` decides which
//! transition slot applies and returns the next node ID. It never mutates a
//! context and never runs a handler — branching-kind dispatch (CONDITION,
//! SWITCH) lives here because it's itself just another transition rule, but
//! everything else (rendering messages, calling webhooks) is the handlers'
//! job.

use crate::condition::{self, Operator};
use crate::graph::{Node, NodeKind};
use crate::validators::FieldValue;
use std::collections::HashMap;

/// Why the navigator couldn't produce a next node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NavigationOutcome {
    Next(String),
    /// A terminal node (`END`/`HANDOFF`) — there is no next node by design.
    Terminal,
    /// A `next`/branch slot was required but absent or dangling; the loader
    /// should have caught this, but the navigator fails closed instead of
    /// panicking if it slips through.
    Dead,
}

/// Resolve the next node ID for a node that has already run its handler.
///
/// `branch_hint`, when present, is the outcome of a CONDITION evaluation or
/// SWITCH case match already computed by the handler; passing it in keeps
/// the evaluation logic in one place (`condition.rs`) while letting the
/// navigator stay purely a slot-picker for every other kind.
pub fn resolve_next(node: &Node, data: &HashMap<String, FieldValue>) -> NavigationOutcome {
    match &node.kind {
        NodeKind::End | NodeKind::Handoff => NavigationOutcome::Terminal,

        NodeKind::Condition => resolve_condition(node, data),
        NodeKind::Switch => resolve_switch(node, data),

        // Every other kind uses the plain `next` slot.
        _ => match &node.next {
            Some(next) => NavigationOutcome::Next(next.clone()),
            None => NavigationOutcome::Dead,
        },
    }
}

/// Resolve `on_true`/`on_false` for a node whose branch outcome was already
/// computed by its handler rather than derivable from `collected_data`
/// alone (QUALIFICATION's score-vs-threshold, LOOP's condition-and-bound
/// check). Kept separate from `resolve_next` so CONDITION/SWITCH — whose
/// outcome *is* a pure function of the data map — stay self-contained.
pub fn resolve_branch(node: &Node, is_true: bool) -> NavigationOutcome {
    let target = if is_true { &node.on_true } else { &node.on_false };
    match target {
        Some(t) => NavigationOutcome::Next(t.clone()),
        None => NavigationOutcome::Dead,
    }
}

fn resolve_condition(node: &Node, data: &HashMap<String, FieldValue>) -> NavigationOutcome {
    let result = if let Some(expr) = node.config.str("expression") {
        condition::evaluate_expression(data, expr)
    } else if let (Some(field), Some(op), Some(value)) = (
        node.config.str("field"),
        node.config.str("operator").and_then(Operator::from_tag),
        node.config.str("value"),
    ) {
        condition::evaluate_triple(data, field, op, value)
    } else {
        false // fail-closed: malformed condition config never takes the true branch
    };

    let target = if result { &node.on_true } else { &node.on_false };
    match target {
        Some(t) => NavigationOutcome::Next(t.clone()),
        None => NavigationOutcome::Dead,
    }
}

fn resolve_switch(node: &Node, data: &HashMap<String, FieldValue>) -> NavigationOutcome {
    let Some(field) = node.config.str("field") else {
        return fall_through(node);
    };
    let Some(value) = data.get(field) else {
        return fall_through(node);
    };
    let haystack = value.to_string().trim().to_lowercase();

    // Exact match first, in insertion order (§4.3: "insertion order of cases
    // governs" ties among candidates).
    for (case, target) in node.cases.iter() {
        if case.trim().to_lowercase() == haystack {
            return NavigationOutcome::Next(target.clone());
        }
    }

    // Substring fallback, same insertion order, per the pinned Open Question
    // in §9: a case key found *within* the collected value also matches.
    for (case, target) in node.cases.iter() {
        let case_norm = case.trim().to_lowercase();
        if !case_norm.is_empty() && haystack.contains(&case_norm) {
            return NavigationOutcome::Next(target.clone());
        }
    }

    fall_through(node)
}

fn fall_through(node: &Node) -> NavigationOutcome {
    match &node.next {
        Some(next) => NavigationOutcome::Next(next.clone()),
        None => NavigationOutcome::Dead,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeConfig;
    use serde_json::json;

    fn node(kind: NodeKind) -> Node {
        Node {
            id: "n1".to_string(),
            kind,
            name: "n1".to_string(),
            config: NodeConfig::default(),
            next: None,
            on_true: None,
            on_false: None,
            cases: indexmap::IndexMap::new(),
            parallel: Vec::new(),
        }
    }

    #[test]
    fn end_node_is_terminal() {
        let n = node(NodeKind::End);
        assert_eq!(resolve_next(&n, &HashMap::new()), NavigationOutcome::Terminal);
    }

    #[test]
    fn plain_node_follows_next() {
        let mut n = node(NodeKind::Message);
        n.next = Some("n2".to_string());
        assert_eq!(resolve_next(&n, &HashMap::new()), NavigationOutcome::Next("n2".to_string()));
    }

    #[test]
    fn plain_node_without_next_is_dead() {
        let n = node(NodeKind::Message);
        assert_eq!(resolve_next(&n, &HashMap::new()), NavigationOutcome::Dead);
    }

    #[test]
    fn condition_picks_true_branch() {
        let mut n = node(NodeKind::Condition);
        n.config.set("field", json!("urgencia"));
        n.config.set("operator", json!("equals"));
        n.config.set("value", json!("imediata"));
        n.on_true = Some("hot".to_string());
        n.on_false = Some("cold".to_string());

        let mut data = HashMap::new();
        data.insert("urgencia".to_string(), FieldValue::String("imediata".to_string()));

        assert_eq!(resolve_next(&n, &data), NavigationOutcome::Next("hot".to_string()));
    }

    #[test]
    fn condition_missing_config_fails_closed_to_false_branch() {
        let mut n = node(NodeKind::Condition);
        n.on_true = Some("hot".to_string());
        n.on_false = Some("cold".to_string());
        assert_eq!(resolve_next(&n, &HashMap::new()), NavigationOutcome::Next("cold".to_string()));
    }

    #[test]
    fn switch_matches_exact_case_in_insertion_order() {
        let mut n = node(NodeKind::Switch);
        n.config.set("field", json!("cidade"));
        n.cases.insert("recife".to_string(), "branch_recife".to_string());
        n.cases.insert("salvador".to_string(), "branch_salvador".to_string());

        let mut data = HashMap::new();
        data.insert("cidade".to_string(), FieldValue::String("Recife".to_string()));

        assert_eq!(resolve_next(&n, &data), NavigationOutcome::Next("branch_recife".to_string()));
    }

    #[test]
    fn switch_falls_back_to_substring_match() {
        let mut n = node(NodeKind::Switch);
        n.config.set("field", json!("interesse"));
        n.cases.insert("apartamento".to_string(), "branch_apto".to_string());
        n.next = Some("default_branch".to_string());

        let mut data = HashMap::new();
        data.insert("interesse".to_string(), FieldValue::String("quero um apartamento de 2 quartos".to_string()));

        assert_eq!(resolve_next(&n, &data), NavigationOutcome::Next("branch_apto".to_string()));
    }

    #[test]
    fn switch_with_no_match_falls_through_to_next() {
        let mut n = node(NodeKind::Switch);
        n.config.set("field", json!("cidade"));
        n.cases.insert("recife".to_string(), "branch_recife".to_string());
        n.next = Some("default_branch".to_string());

        let mut data = HashMap::new();
        data.insert("cidade".to_string(), FieldValue::String("Manaus".to_string()));

        assert_eq!(resolve_next(&n, &data), NavigationOutcome::Next("default_branch".to_string()));
    }

    #[test]
    fn resolve_branch_picks_on_true_or_on_false_directly() {
        let mut n = node(NodeKind::Loop);
        n.on_true = Some("loop_again".to_string());
        n.on_false = Some("after_loop".to_string());

        assert_eq!(resolve_branch(&n, true), NavigationOutcome::Next("loop_again".to_string()));
        assert_eq!(resolve_branch(&n, false), NavigationOutcome::Next("after_loop".to_string()));
    }

    #[test]
    fn resolve_branch_without_target_is_dead() {
        let n = node(NodeKind::Qualification);
        assert_eq!(resolve_branch(&n, true), NavigationOutcome::Dead);
    }
}
