//! End-to-end walkthroughs for the conversation shapes a graph author
//! actually builds: a qualifying happy path, a validation-exhausted
//! handoff, SWITCH/CONDITION branch selection, LOOP bounds, and the
//! scorer's determinism on a fully-answered lead.

use async_trait::async_trait;
use engine_core::actions::http::{HttpActionExecutor, HttpActionRequest, HttpActionResult};
use engine_core::analytics::NullEventSink;
use engine_core::context::ConversationStatus;
use engine_core::engine::ConversationLocks;
use engine_core::graph::{Edge, GlobalConfig, Graph, Node, NodeConfig, NodeKind};
use engine_core::navigator::{self, NavigationOutcome};
use engine_core::scorer::{calculate_score, ConversationMetrics, LeadTemperature};
use engine_core::validators::FieldValue;
use engine_core::{ConversationContext, Engine};
use serde_json::json;
use std::collections::HashMap;

struct NoopExecutor;

#[async_trait]
impl HttpActionExecutor for NoopExecutor {
    async fn execute(&self, _request: &HttpActionRequest) -> HttpActionResult {
        HttpActionResult { success: true, status_code: Some(200), body_excerpt: None, error: None }
    }
}

fn node(id: &str, kind: NodeKind) -> Node {
    Node {
        id: id.to_string(),
        kind,
        name: id.to_string(),
        config: NodeConfig::default(),
        next: None,
        on_true: None,
        on_false: None,
        cases: indexmap::IndexMap::new(),
        parallel: Vec::new(),
    }
}

fn edges(nodes: &[Node]) -> Vec<Edge> {
    nodes
        .iter()
        .filter_map(|n| n.next.clone().map(|target| Edge { source: n.id.clone(), target, label: None }))
        .collect()
}

/// GREETING -> NAME -> PHONE -> INTEREST -> QUALIFICATION -> HANDOFF/END,
/// weights `{name:10, phone:15, interest:20}`, threshold 30.
fn qualification_graph() -> Graph {
    let mut greet = node("greet", NodeKind::Greeting);
    greet.config.set("message", json!("Welcome! Let's get you set up."));
    greet.next = Some("ask_name".to_string());

    let mut ask_name = node("ask_name", NodeKind::Name);
    ask_name.config.set("prompt", json!("What's your name?"));
    ask_name.next = Some("ask_phone".to_string());

    let mut ask_phone = node("ask_phone", NodeKind::Phone);
    ask_phone.config.set("prompt", json!("What's your phone number?"));
    ask_phone.next = Some("ask_interest".to_string());

    let mut ask_interest = node("ask_interest", NodeKind::Interest);
    ask_interest.config.set("prompt", json!("What are you looking for?"));
    ask_interest.next = Some("qualify".to_string());

    let mut qualify = node("qualify", NodeKind::Qualification);
    qualify.config.set("min_score", json!(30.0));
    qualify.on_true = Some("handoff".to_string());
    qualify.on_false = Some("bye".to_string());

    let mut handoff = node("handoff", NodeKind::Handoff);
    handoff.config.set("reason", json!("qualified_lead"));

    let bye = node("bye", NodeKind::End);

    let nodes = vec![greet, ask_name, ask_phone, ask_interest, qualify, handoff, bye];
    let edges = edges(&nodes);

    let mut global = GlobalConfig::default();
    global.qualification_weights =
        HashMap::from([("name".to_string(), 10.0), ("phone".to_string(), 15.0), ("interest".to_string(), 20.0)]);

    Graph {
        nodes,
        edges,
        start_node_id: "greet".to_string(),
        version: "2.0".to_string(),
        global_config: global,
        name: Some("qualification".to_string()),
        description: None,
    }
}

fn test_engine<'a>(graph: &'a Graph, locks: &'a ConversationLocks, sink: &'a NullEventSink, executor: &'a NoopExecutor) -> Engine<'a> {
    Engine { graph, locks, event_sink: sink, http_executor: executor }
}

#[tokio::test]
async fn scenario_a_happy_path_qualification_reaches_handoff() {
    let graph = qualification_graph();
    let locks = ConversationLocks::new();
    let sink = NullEventSink;
    let executor = NoopExecutor;
    let engine = test_engine(&graph, &locks, &sink, &executor);

    let mut ctx = ConversationContext::new("c-a", "g-a", chrono::Utc::now());

    let greeted = engine.process_message(&mut ctx, Some("hi")).await.unwrap();
    assert_eq!(greeted.message.as_deref(), Some("Welcome! Let's get you set up."));
    assert_eq!(ctx.current_node_id.as_deref(), Some("ask_name"));

    engine.process_message(&mut ctx, Some("joão silva")).await.unwrap();
    assert_eq!(ctx.collected_data.get("name").unwrap().to_string(), "João Silva");

    engine.process_message(&mut ctx, Some("(11) 99999-8888")).await.unwrap();
    assert_eq!(ctx.collected_data.get("phone").unwrap().to_string(), "11999998888");

    let handed_off = engine.process_message(&mut ctx, Some("apartamento")).await.unwrap();
    assert_eq!(ctx.collected_data.get("interest").unwrap().to_string(), "apartamento");
    assert_eq!(ctx.qualification_score, Some(45.0));
    assert!(ctx.is_qualified);
    assert!(handed_off.is_final);
    assert_eq!(handed_off.status, ConversationStatus::Handoff);
    assert_eq!(handed_off.metadata.get("reason").and_then(|v| v.as_str()), Some("qualified_lead"));
}

/// GREETING -> EMAIL(max_retries 2); "abc" then "def" both fail validation,
/// the second exhausting retries into a HANDOFF.
fn email_retry_graph() -> Graph {
    let mut greet = node("greet", NodeKind::Greeting);
    greet.config.set("message", json!("Hi! Let's start with your email."));
    greet.next = Some("ask_email".to_string());

    let mut ask_email = node("ask_email", NodeKind::Email);
    ask_email.config.set("prompt", json!("What's your email?"));
    ask_email.config.set("max_retries", json!(2));

    let nodes = vec![greet, ask_email];
    let edges = edges(&nodes);

    Graph {
        nodes,
        edges,
        start_node_id: "greet".to_string(),
        version: "2.0".to_string(),
        global_config: GlobalConfig::default(),
        name: None,
        description: None,
    }
}

#[tokio::test]
async fn scenario_b_exhausted_retries_yield_handoff() {
    let graph = email_retry_graph();
    let locks = ConversationLocks::new();
    let sink = NullEventSink;
    let executor = NoopExecutor;
    let engine = test_engine(&graph, &locks, &sink, &executor);

    let mut ctx = ConversationContext::new("c-b", "g-b", chrono::Utc::now());

    engine.process_message(&mut ctx, Some("hi")).await.unwrap();
    assert_eq!(ctx.current_node_id.as_deref(), Some("ask_email"));

    let first_try = engine.process_message(&mut ctx, Some("abc")).await.unwrap();
    assert_eq!(first_try.result_kind, engine_core::step::StepResultKind::Question);
    assert_eq!(ctx.retry_count("ask_email"), 1);
    assert_eq!(ctx.status, ConversationStatus::WaitingInput);

    let second_try = engine.process_message(&mut ctx, Some("def")).await.unwrap();
    assert!(second_try.is_final);
    assert_eq!(second_try.status, ConversationStatus::Handoff);
    assert_eq!(second_try.metadata.get("reason").and_then(|v| v.as_str()), Some("max_retries_exceeded"));
}

/// SWITCH(field=budget, cases={alto, medio}, default fallthrough).
#[test]
fn scenario_c_switch_resolves_exact_then_substring_then_default() {
    let mut n = node("switch_budget", NodeKind::Switch);
    n.config.set("field", json!("budget"));
    n.cases.insert("alto".to_string(), "high_budget".to_string());
    n.cases.insert("medio".to_string(), "medium_budget".to_string());
    n.next = Some("default_budget".to_string());

    let exact = HashMap::from([("budget".to_string(), FieldValue::String("alto".to_string()))]);
    assert_eq!(navigator::resolve_next(&n, &exact), NavigationOutcome::Next("high_budget".to_string()));

    let unmatched = HashMap::from([("budget".to_string(), FieldValue::String("não informado".to_string()))]);
    assert_eq!(navigator::resolve_next(&n, &unmatched), NavigationOutcome::Next("default_budget".to_string()));

    let substring = HashMap::from([("budget".to_string(), FieldValue::String("padrão alto, acima da média".to_string()))]);
    assert_eq!(navigator::resolve_next(&n, &substring), NavigationOutcome::Next("high_budget".to_string()));
}

/// CONDITION on `urgencia == 'imediata' AND orcamento > 500000`.
#[test]
fn scenario_d_condition_on_expression_branches_and_fails_closed() {
    let mut n = node("urgent_budget", NodeKind::Condition);
    n.config.set("expression", json!("urgencia == 'imediata' AND orcamento > 500000"));
    n.on_true = Some("hot_lead".to_string());
    n.on_false = Some("nurture".to_string());

    let qualifies = HashMap::from([
        ("urgencia".to_string(), FieldValue::String("imediata".to_string())),
        ("orcamento".to_string(), FieldValue::Number(600_000.0)),
    ]);
    assert_eq!(navigator::resolve_next(&n, &qualifies), NavigationOutcome::Next("hot_lead".to_string()));

    let under_budget = HashMap::from([
        ("urgencia".to_string(), FieldValue::String("imediata".to_string())),
        ("orcamento".to_string(), FieldValue::Number(300_000.0)),
    ]);
    assert_eq!(navigator::resolve_next(&n, &under_budget), NavigationOutcome::Next("nurture".to_string()));

    let non_numeric = HashMap::from([
        ("urgencia".to_string(), FieldValue::String("imediata".to_string())),
        ("orcamento".to_string(), FieldValue::String("nao sei".to_string())),
    ]);
    assert_eq!(navigator::resolve_next(&n, &non_numeric), NavigationOutcome::Next("nurture".to_string()));
}

/// LOOP with `loop_condition="true"`, `max_iterations=3`: three steps take
/// the true-branch back into the loop body, the fourth takes false.
fn loop_graph() -> Graph {
    let mut looper = node("looper", NodeKind::Loop);
    looper.config.set("loop_condition", json!("true"));
    looper.config.set("max_iterations", json!(3));
    looper.on_true = Some("looper".to_string());
    looper.on_false = Some("bye".to_string());

    let bye = node("bye", NodeKind::End);

    let nodes = vec![looper, bye];
    Graph {
        nodes,
        edges: Vec::new(),
        start_node_id: "looper".to_string(),
        version: "2.0".to_string(),
        global_config: GlobalConfig::default(),
        name: None,
        description: None,
    }
}

#[tokio::test]
async fn scenario_e_loop_takes_true_branch_exactly_max_iterations_times() {
    let graph = loop_graph();
    let locks = ConversationLocks::new();
    let sink = NullEventSink;
    let executor = NoopExecutor;
    let engine = test_engine(&graph, &locks, &sink, &executor);

    let mut ctx = ConversationContext::new("c-e", "g-e", chrono::Utc::now());

    for _ in 0..3 {
        let result = engine.process_message(&mut ctx, None).await.unwrap();
        assert!(!result.is_final);
        assert_eq!(ctx.current_node_id.as_deref(), Some("looper"));
    }

    // Fourth call: the loop's own handler reports its iteration budget
    // exhausted and takes the false branch, moving the conversation to
    // `bye` — but LOOP only ever represents one inbound message's worth
    // of progress, so that move doesn't itself process `bye` yet.
    let fourth = engine.process_message(&mut ctx, None).await.unwrap();
    assert!(!fourth.is_final);
    assert_eq!(ctx.current_node_id.as_deref(), Some("bye"));

    // Fifth call actually runs the END node reached by the false branch.
    let fifth = engine.process_message(&mut ctx, None).await.unwrap();
    assert!(fifth.is_final);
    assert_eq!(fifth.status, ConversationStatus::Completed);
}

/// The scorer is a pure function: a fully-answered, urgent, well-budgeted
/// lead lands HOT with an immediate-contact recommendation, deterministically.
#[test]
fn scenario_f_fully_qualified_lead_scores_hot_deterministically() {
    let data: HashMap<String, FieldValue> = HashMap::from([
        ("name".to_string(), FieldValue::String("Ana Silva".to_string())),
        ("phone".to_string(), FieldValue::String("11999998888".to_string())),
        ("email".to_string(), FieldValue::String("ana@example.com".to_string())),
        ("city".to_string(), FieldValue::String("Recife".to_string())),
        ("interest".to_string(), FieldValue::String("Quero comprar um apartamento de 3 quartos na praia".to_string())),
        ("budget".to_string(), FieldValue::Number(600_000.0)),
        ("urgency".to_string(), FieldValue::String("imediata".to_string())),
        ("cep".to_string(), FieldValue::String("50000000".to_string())),
        ("taxid".to_string(), FieldValue::String("11144477735".to_string())),
    ]);
    let metrics = ConversationMetrics {
        lead_messages: 6,
        avg_response_time_secs: 30.0,
        questions_asked_by_lead: 2,
        fields_collected_count: 9,
        ..Default::default()
    };
    let weights = engine_core::graph::default_weights();

    let first = calculate_score(&data, &weights, &metrics);
    let second = calculate_score(&data, &weights, &metrics);

    assert!((80..=100).contains(&first.total));
    assert_eq!(first.temperature, LeadTemperature::Hot);
    assert!(first.recommendations.iter().any(|r| r.contains("contato imediatamente")));
    assert_eq!(first.total, second.total);
    assert_eq!(first.recommendations, second.recommendations);
}
