//! Property-based checks for the two invariants spec.md's behavior depends
//! on structurally rather than by example: the autocorrector is a true
//! idempotent repair pass, and a `Graph` survives a JSON round-trip with
//! every transition slot intact.

use engine_core::graph::{Edge, Graph, GlobalConfig, Node, NodeConfig, NodeKind};
use engine_core::loader::autocorrect;
use proptest::prelude::*;

/// A handful of node kinds covering the plain-`next` shape, the typed-input
/// shortcut shape (so the "default field name gets filled in" rule has
/// something to act on), and the one terminal kind.
fn arb_kind() -> impl Strategy<Value = NodeKind> {
    prop_oneof![
        Just(NodeKind::Greeting),
        Just(NodeKind::Message),
        Just(NodeKind::Name),
        Just(NodeKind::Email),
        Just(NodeKind::End),
    ]
}

/// One node, with a `next` pointer that may or may not resolve within the
/// eventual graph — dangling targets are exactly what rule 2 of
/// autocorrection exists to clear.
fn arb_node(id: String, possible_targets: Vec<String>) -> impl Strategy<Value = Node> {
    let target_strategy = if possible_targets.is_empty() {
        Just(None).boxed()
    } else {
        prop_oneof![
            Just(None),
            proptest::sample::select(possible_targets.clone()).prop_map(Some),
            Just(Some("dangling_target".to_string())),
        ]
        .boxed()
    };

    (arb_kind(), target_strategy, "[a-z ]{0,8}").prop_map(move |(kind, next, name)| Node {
        id: id.clone(),
        kind,
        name,
        config: NodeConfig::default(),
        next,
        on_true: None,
        on_false: None,
        cases: indexmap::IndexMap::new(),
        parallel: Vec::new(),
    })
}

/// A small graph: 1-6 nodes with distinct IDs, a `start_node_id` that may
/// or may not resolve, each node's `next` drawn from the full ID set (so
/// some graphs are well-formed and some aren't — autocorrect should repair
/// both into a state that is stable under a second pass).
fn arb_graph() -> impl Strategy<Value = Graph> {
    (1..=6usize).prop_flat_map(|n| {
        let ids: Vec<String> = (0..n).map(|i| format!("node_{i}")).collect();
        let node_strategies: Vec<_> = ids.iter().map(|id| arb_node(id.clone(), ids.clone())).collect();
        let start_strategy = prop_oneof![
            proptest::sample::select(ids.clone()),
            Just("does_not_exist".to_string()),
            Just(String::new()),
        ];

        (node_strategies, start_strategy).prop_map(|(nodes, start_node_id)| Graph {
            nodes,
            edges: Vec::<Edge>::new(),
            start_node_id,
            version: "2.0".to_string(),
            global_config: GlobalConfig::default(),
            name: None,
            description: None,
        })
    })
}

proptest! {
    /// Running `autocorrect` a second time never changes a graph that has
    /// already been autocorrected once, regardless of how malformed the
    /// input was (missing start node, dangling transitions, blank names).
    #[test]
    fn autocorrect_settles_after_one_pass(mut graph in arb_graph()) {
        autocorrect(&mut graph);
        let once = graph.clone();
        autocorrect(&mut graph);

        prop_assert_eq!(graph.start_node_id, once.start_node_id);
        prop_assert_eq!(graph.nodes.len(), once.nodes.len());
        for (after_twice, after_once) in graph.nodes.iter().zip(once.nodes.iter()) {
            prop_assert_eq!(&after_twice.id, &after_once.id);
            prop_assert_eq!(&after_twice.name, &after_once.name);
            prop_assert_eq!(&after_twice.next, &after_once.next);
            prop_assert_eq!(after_twice.config.get("field").cloned(), after_once.config.get("field").cloned());
        }
    }

    /// A never-dangling `next` is untouched by autocorrection, so it must
    /// also survive a full `serde_json` serialize/deserialize round-trip —
    /// the wire format is the graph's only on-disk representation (§6).
    #[test]
    fn graph_round_trips_through_json(mut graph in arb_graph()) {
        autocorrect(&mut graph);

        let encoded = serde_json::to_string(&graph).expect("autocorrected graph always serializes");
        let decoded: Graph = serde_json::from_str(&encoded).expect("encoded graph always parses");

        prop_assert_eq!(decoded.start_node_id, graph.start_node_id);
        prop_assert_eq!(decoded.nodes.len(), graph.nodes.len());
        for (original, round_tripped) in graph.nodes.iter().zip(decoded.nodes.iter()) {
            prop_assert_eq!(&original.id, &round_tripped.id);
            prop_assert_eq!(original.kind.as_str(), round_tripped.kind.as_str());
            prop_assert_eq!(&original.next, &round_tripped.next);
        }
    }
}

/// `NodeKind::from_tag` / `as_str` form an exact inverse pair for every tag
/// in the closed set — the one place a hand-rolled enum-as-string mapping
/// could silently drift is exactly the place worth pinning down directly.
#[test]
fn every_known_node_kind_tag_round_trips() {
    let tags = [
        "GREETING", "MESSAGE", "END", "QUESTION", "NAME", "EMAIL", "PHONE", "CITY", "ADDRESS", "TAXID_PERSON",
        "BIRTHDATE", "INTEREST", "BUDGET", "URGENCY", "CONDITION", "SWITCH", "QUALIFICATION", "ACTION",
        "WEBHOOK_CALL", "API_INTEGRATION", "NOTIFICATION", "ALERT", "FOLLOWUP", "PROPOSAL", "NEGOTIATION",
        "SCHEDULING", "VISIT", "IMAGE", "DOCUMENT", "AUDIO", "VIDEO", "DELAY", "LOOP", "PARALLEL", "HANDOFF",
    ];
    for tag in tags {
        let kind = NodeKind::from_tag(tag);
        assert_eq!(kind.as_str(), tag);
    }
}
