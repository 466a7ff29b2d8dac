//! Graph loader and autocorrector (§4.1).
//!
//! Loading a graph is a two-pass process: first a handful of lenient
//! autocorrections repair common authoring mistakes in place, then a
//! validation pass collects diagnostics. A graph with any `ERROR`-severity
//! diagnostic is refused (`EngineError::GraphValidation`); `WARNING`
//! diagnostics are returned alongside the graph so a caller can surface them
//! without blocking load.

use crate::condition::Operator;
use crate::graph::{Graph, Node, NodeKind};
use std::collections::{HashSet, VecDeque};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: &'static str,
    pub severity: Severity,
    pub node_id: Option<String>,
    pub message: String,
}

impl Diagnostic {
    fn warn(code: &'static str, node_id: Option<&str>, message: impl Into<String>) -> Self {
        Diagnostic {
            code,
            severity: Severity::Warning,
            node_id: node_id.map(str::to_string),
            message: message.into(),
        }
    }

    fn error(code: &'static str, node_id: Option<&str>, message: impl Into<String>) -> Self {
        Diagnostic {
            code,
            severity: Severity::Error,
            node_id: node_id.map(str::to_string),
            message: message.into(),
        }
    }
}

/// Apply the autocorrection rules (§4.1 rules 1-8) in place. Idempotent: a
/// graph that has already been autocorrected is unchanged by a second pass.
pub fn autocorrect(graph: &mut Graph) {
    let node_ids: HashSet<String> = graph.nodes.iter().map(|n| n.id.clone()).collect();

    // Rule: if start_node_id is missing or doesn't resolve, fall back to the
    // first GREETING node, then the first node overall.
    if graph.start_node_id.is_empty() || !node_ids.contains(&graph.start_node_id) {
        if let Some(greeting) = graph.nodes.iter().find(|n| n.kind == NodeKind::Greeting) {
            graph.start_node_id = greeting.id.clone();
        } else if let Some(first) = graph.nodes.first() {
            graph.start_node_id = first.id.clone();
        }
    }

    for node in &mut graph.nodes {
        // Rule: dangling `next`/branch targets pointing at a node ID that
        // doesn't exist are cleared rather than left to panic later.
        if let Some(next) = &node.next {
            if !node_ids.contains(next) {
                node.next = None;
            }
        }
        if let Some(t) = &node.on_true {
            if !node_ids.contains(t) {
                node.on_true = None;
            }
        }
        if let Some(f) = &node.on_false {
            if !node_ids.contains(f) {
                node.on_false = None;
            }
        }
        node.cases.retain(|_, target| node_ids.contains(target));
        node.parallel.retain(|target| node_ids.contains(target));

        // Rule: a typed-input shortcut with no explicit config field name
        // gets its default field name populated (§3's "default_field").
        if let Some((default_name, _)) = node.kind.default_field() {
            if !node.config.contains("field") {
                node.config.set("field", serde_json::Value::String(default_name.to_string()));
            }
        }

        // Rule: blank node names fall back to the node ID.
        if node.name.trim().is_empty() {
            node.name = node.id.clone();
        }

        // Rule: negative timeout/retry/weight configs are clamped to zero.
        for key in ["timeout_secs", "max_retries", "delay_secs"] {
            if let Some(v) = node.config.f64(key) {
                if v < 0.0 {
                    node.config.set(key, serde_json::Value::from(0));
                }
            }
        }
    }
}

/// Validate a (typically already-autocorrected) graph, returning every
/// diagnostic found. Call site decides what to do with `WARNING`s; any
/// `ERROR` means the graph must not be run.
pub fn validate(graph: &Graph) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let index = graph.index();

    if graph.nodes.is_empty() {
        diagnostics.push(Diagnostic::error("EMPTY_GRAPH", None, "graph has no nodes"));
        return diagnostics;
    }

    if !index.contains_key(&graph.start_node_id) {
        diagnostics.push(Diagnostic::error(
            "MISSING_START_NODE",
            None,
            format!("start_node_id '{}' does not resolve to a node", graph.start_node_id),
        ));
    }

    let mut seen_ids = HashSet::new();
    for node in &graph.nodes {
        if !seen_ids.insert(&node.id) {
            diagnostics.push(Diagnostic::error("DUPLICATE_NODE_ID", Some(&node.id), "duplicate node id"));
        }

        validate_node(node, &index, &mut diagnostics);
    }

    check_orphans(graph, &index, &mut diagnostics);
    check_cycles(graph, &index, &mut diagnostics);

    diagnostics
}

fn validate_node(node: &Node, index: &std::collections::HashMap<&String, &Node>, out: &mut Vec<Diagnostic>) {
    if node.kind.is_terminal() {
        return; // END/HANDOFF carry no transition requirements
    }

    match &node.kind {
        NodeKind::Condition => {
            if node.on_true.is_none() || node.on_false.is_none() {
                out.push(Diagnostic::error(
                    "MISSING_BRANCH_TARGET",
                    Some(&node.id),
                    "CONDITION node must have both on_true and on_false",
                ));
            }
            let has_expr = node.config.str("expression").is_some();
            let has_triple = node.config.str("field").is_some() && node.config.str("operator").is_some();
            if !has_expr && !has_triple {
                out.push(Diagnostic::error(
                    "MISSING_CONDITION_CONFIG",
                    Some(&node.id),
                    "CONDITION node needs either 'expression' or 'field'+'operator'+'value'",
                ));
            }
            if let Some(op) = node.config.str("operator") {
                if Operator::from_tag(op).is_none() {
                    out.push(Diagnostic::error(
                        "UNKNOWN_OPERATOR",
                        Some(&node.id),
                        format!("unknown operator '{op}'"),
                    ));
                }
            }
        }
        NodeKind::Switch => {
            if node.cases.is_empty() {
                out.push(Diagnostic::warn("EMPTY_SWITCH", Some(&node.id), "SWITCH node has no cases"));
            }
            if node.next.is_none() {
                out.push(Diagnostic::warn(
                    "MISSING_SWITCH_DEFAULT",
                    Some(&node.id),
                    "SWITCH node has no fallback 'next'; unmatched values dead-end",
                ));
            }
        }
        NodeKind::Parallel => {
            if node.parallel.is_empty() {
                out.push(Diagnostic::error("EMPTY_PARALLEL", Some(&node.id), "PARALLEL node has no branches"));
            }
        }
        NodeKind::Unknown(tag) => {
            out.push(Diagnostic::warn(
                "UNKNOWN_NODE_KIND",
                Some(&node.id),
                format!("node type '{tag}' is not recognized; will be handled as a no-op pass-through"),
            ));
        }
        _ => {
            if node.next.is_none() {
                out.push(Diagnostic::warn(
                    "MISSING_NEXT",
                    Some(&node.id),
                    "node has no 'next' target and is not terminal",
                ));
            }
        }
    }

    for target in node.transition_targets() {
        if !index.contains_key(target) {
            out.push(Diagnostic::error(
                "DANGLING_TRANSITION",
                Some(&node.id),
                format!("transition target '{target}' does not exist"),
            ));
        }
    }
}

fn check_orphans(graph: &Graph, _index: &std::collections::HashMap<&String, &Node>, out: &mut Vec<Diagnostic>) {
    if !_index.contains_key(&graph.start_node_id) {
        return; // already reported as MISSING_START_NODE
    }
    let mut reachable = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(graph.start_node_id.clone());
    reachable.insert(graph.start_node_id.clone());

    while let Some(id) = queue.pop_front() {
        let Some(node) = graph.node(&id) else { continue };
        for target in node.transition_targets() {
            if reachable.insert(target.clone()) {
                queue.push_back(target.clone());
            }
        }
    }

    for node in &graph.nodes {
        if !reachable.contains(&node.id) {
            out.push(Diagnostic::warn("ORPHAN_NODE", Some(&node.id), "node is unreachable from start_node_id"));
        }
    }
}

/// Detects cycles that don't pass through a `LOOP` node, which is the only
/// kind the engine trusts to bound its own iteration count (§4.5's LOOP
/// handler enforces `max_iterations`). Any other cycle is just a graph
/// authoring bug.
fn check_cycles(graph: &Graph, _index: &std::collections::HashMap<&String, &Node>, out: &mut Vec<Diagnostic>) {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Visiting,
        Done,
    }
    let mut marks: std::collections::HashMap<&str, Mark> = std::collections::HashMap::new();

    fn visit<'a>(
        graph: &'a Graph,
        id: &'a str,
        marks: &mut std::collections::HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
        out: &mut Vec<Diagnostic>,
    ) {
        if let Some(Mark::Done) = marks.get(id) {
            return;
        }
        if let Some(Mark::Visiting) = marks.get(id) {
            out.push(Diagnostic::warn(
                "CYCLE_DETECTED",
                Some(id),
                format!("cycle detected through node '{id}' without an intervening LOOP node"),
            ));
            return;
        }
        let Some(node) = graph.node(id) else { return };
        if node.kind == NodeKind::Loop {
            marks.insert(id, Mark::Done);
            return; // LOOP is trusted to bound its own iteration
        }
        marks.insert(id, Mark::Visiting);
        stack.push(id);
        for target in node.transition_targets() {
            visit(graph, target, marks, stack, out);
        }
        stack.pop();
        marks.insert(id, Mark::Done);
    }

    if graph.nodes.iter().any(|n| n.id == graph.start_node_id) {
        let mut stack = Vec::new();
        visit(graph, &graph.start_node_id, &mut marks, &mut stack, out);
    }
}
