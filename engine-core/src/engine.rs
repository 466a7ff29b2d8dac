//! Top-level step orchestration (§5): ties the loader, navigator, handlers,
//! scorer, and analytics sink together behind a single `process_message`
//! entry point.
//!
//! Concurrency is enforced here, not by callers: a per-conversation
//! in-process lock (§5's "natural unit of parallelism is one step per
//! conversation") guarantees at most one step in flight per
//! `conversation_id`, mirroring the single-writer guarantee
//! `langgraph-checkpoint`'s savers assume their callers already hold.

use crate::actions::http::HttpActionExecutor;
use crate::analytics::{AnalyticsEvent, AnalyticsEventKind, EventSink};
use crate::context::{ConversationContext, ConversationStatus};
use crate::error::{EngineError, Result};
use crate::graph::{Graph, NodeKind};
use crate::handlers::{action, branching, control, input, media, utterance};
use crate::navigator::{self, NavigationOutcome};
use crate::step::StepResult;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-conversation single-flight locks, keyed by `conversation_id`.
/// Entries are never removed — the set of distinct conversations a process
/// runs is bounded by the caller's own storage, and a stale `Mutex` costs
/// nothing while unlocked.
#[derive(Default)]
pub struct ConversationLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        ConversationLocks::default()
    }

    async fn lock_for(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(
            locks
                .entry(conversation_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}

/// Everything a single `process_message` call needs beyond the graph and
/// context themselves.
pub struct Engine<'a> {
    pub graph: &'a Graph,
    pub locks: &'a ConversationLocks,
    pub event_sink: &'a dyn EventSink,
    pub http_executor: &'a dyn HttpActionExecutor,
}

impl<'a> Engine<'a> {
    /// Advance `ctx` by exactly one step in response to `user_input`
    /// (`None` when the caller is just opening the conversation).
    ///
    /// Enforces, in order: the per-conversation lock (`CONVERSATION_BUSY`),
    /// the terminal-state short-circuit (`FLOW_ALREADY_TERMINAL`), and the
    /// session-timeout-at-step-start check, before running the handler for
    /// the current node.
    pub async fn process_message(&self, ctx: &mut ConversationContext, user_input: Option<&str>) -> Result<StepResult> {
        let lock = self.locks.lock_for(&ctx.conversation_id).await;
        let _guard = match lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => return Err(EngineError::ConversationBusy(ctx.conversation_id.clone())),
        };

        self.step_locked(ctx, user_input).await
    }

    async fn step_locked(&self, ctx: &mut ConversationContext, user_input: Option<&str>) -> Result<StepResult> {
        let now = chrono::Utc::now();

        if ctx.status.is_terminal() {
            return Err(EngineError::FlowAlreadyTerminal(ctx.conversation_id.clone()));
        }

        let session_timeout = chrono::Duration::seconds(self.graph.global_config.session_timeout_secs as i64);
        if ctx.status != ConversationStatus::NotStarted && ctx.session_duration(now) > session_timeout {
            ctx.status = ConversationStatus::Timeout;
            self.emit(ctx, None, AnalyticsEventKind::ConversationAbandoned).await;
            return Ok(StepResult::error(
                ctx.conversation_id.clone(),
                ctx.current_node_id.clone(),
                "SESSION_TIMEOUT",
                self.graph.global_config.timeout_message.clone(),
            ));
        }

        ctx.touch(now);

        if ctx.current_node_id.is_none() {
            ctx.status = ConversationStatus::InProgress;
            let start_id = self.graph.start_node_id.clone();
            let start_kind = self.graph.node(&start_id).map(|n| n.kind.clone()).unwrap_or_else(|| NodeKind::Unknown(String::new()));
            ctx.enter_node(start_id, start_kind, now);
        } else if ctx.status == ConversationStatus::WaitingInput || ctx.status == ConversationStatus::WaitingMedia {
            ctx.status = ConversationStatus::InProgress;
        }

        // A step runs every sequential (non-waiting, non-terminal) node
        // reachable from the current position in one call — the caller
        // only sees another message when a handler actually needs one
        // (QUESTION/media) or the conversation ends. `input` is consumed
        // only by the first node visited; everything past it is sequential
        // and ignores it. `MAX_NODES_PER_STEP` is a safety bound against a
        // graph-authoring cycle the loader's validator missed.
        const MAX_NODES_PER_STEP: usize = 1000;
        let mut remaining_input = user_input;

        for _ in 0..MAX_NODES_PER_STEP {
            let node_id = ctx.current_node_id.clone().expect("current_node_id set above");
            let Some(node) = self.graph.node(&node_id) else {
                return Ok(StepResult::error(
                    ctx.conversation_id.clone(),
                    Some(node_id),
                    "NODE_NOT_FOUND",
                    "current node no longer exists in the graph",
                ));
            };

            let mut rng = StdRng::from_entropy();
            let global = &self.graph.global_config;
            let consumed_input = remaining_input.map(str::to_string);
            let fields_before: std::collections::HashSet<String> = ctx.collected_data.keys().cloned().collect();

            let result = match &node.kind {
                NodeKind::Greeting | NodeKind::Message => {
                    utterance::handle_message(node, &ctx.collected_data, &ctx.conversation_id, &mut rng)
                }
                NodeKind::End => utterance::handle_end(node, &ctx.collected_data, global, &ctx.conversation_id, &mut rng),
                NodeKind::Condition | NodeKind::Switch => {
                    // No reply text; the navigator below resolves the branch.
                    StepResult::message(ctx.conversation_id.clone(), node.id.clone(), String::new(), ConversationStatus::InProgress)
                }
                NodeKind::Qualification => {
                    let outcome = branching::handle_qualification(node, ctx, global);
                    StepResult::message(ctx.conversation_id.clone(), node.id.clone(), String::new(), ConversationStatus::InProgress)
                        .with_metadata("qualification.qualified", serde_json::Value::Bool(outcome.qualified))
                        .with_metadata("qualification.score", serde_json::json!(outcome.score))
                        .with_metadata("metadata.score_breakdown", serde_json::json!(outcome.factors))
                }
                NodeKind::Action | NodeKind::WebhookCall | NodeKind::ApiIntegration => {
                    action::handle_action(node, &ctx.collected_data, &ctx.conversation_id, self.http_executor).await
                }
                NodeKind::Notification => action::handle_notification(node, &ctx.collected_data, &ctx.conversation_id, false),
                NodeKind::Alert => action::handle_notification(node, &ctx.collected_data, &ctx.conversation_id, true),
                NodeKind::Followup => action::handle_followup(node, &ctx.collected_data, &ctx.conversation_id, &mut rng),
                NodeKind::Proposal | NodeKind::Negotiation | NodeKind::Scheduling | NodeKind::Visit => {
                    action::handle_commercial(node, &ctx.collected_data, &ctx.conversation_id, node.kind.as_str())
                }
                NodeKind::Image | NodeKind::Document | NodeKind::Audio | NodeKind::Video => {
                    let result = media::handle_media(node, &ctx.collected_data, &ctx.conversation_id, &mut rng);
                    ctx.awaiting_media = result.status == ConversationStatus::WaitingMedia;
                    ctx.expected_media_kind = result.expected_media_kind.clone();
                    result
                }
                NodeKind::Delay => control::handle_delay(node, &ctx.conversation_id).await,
                NodeKind::Loop => {
                    let condition_met = control::handle_loop(node, ctx);
                    StepResult::message(ctx.conversation_id.clone(), node.id.clone(), String::new(), ConversationStatus::InProgress)
                        .with_metadata("loop.condition_met", serde_json::Value::Bool(condition_met))
                }
                NodeKind::Parallel => control::handle_parallel(node, ctx),
                NodeKind::Handoff => control::handle_handoff(node, &ctx.collected_data, &ctx.conversation_id, &mut rng),
                _ if input::handles(&node.kind) => input::handle_input(node, ctx, global, remaining_input, &mut rng),
                _ => crate::handlers::unknown_kind(node, &ctx.conversation_id),
            };
            remaining_input = None;

            ctx.status = result.status;
            if let Some(visit) = ctx.history.last_mut() {
                if visit.node_id == node.id {
                    visit.user_input = consumed_input;
                    if let Some(msg) = result.message.as_deref().filter(|m| !m.is_empty()) {
                        visit.response = Some(msg.to_string());
                    }
                }
            }
            let newly_collected: HashMap<String, crate::validators::FieldValue> = ctx
                .collected_data
                .iter()
                .filter(|(k, _)| !fields_before.contains(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            if !newly_collected.is_empty() {
                if let Some(visit) = ctx.history.last_mut() {
                    if visit.node_id == node.id {
                        visit.data_collected = Some(newly_collected);
                    }
                }
            }
            self.emit(ctx, Some(&node.id), AnalyticsEventKind::NodeEntered).await;

            if result.status == ConversationStatus::WaitingInput || result.status == ConversationStatus::WaitingMedia {
                return Ok(result);
            }
            if result.is_final {
                let kind = match result.status {
                    ConversationStatus::Completed => AnalyticsEventKind::FlowCompleted,
                    ConversationStatus::Handoff => AnalyticsEventKind::HandoffCompleted,
                    _ => AnalyticsEventKind::ErrorOccurred,
                };
                self.emit(ctx, Some(&node.id), kind).await;
                return Ok(result);
            }

            // QUALIFICATION and LOOP decide their branch from state their
            // handler just computed (score-vs-threshold, iteration count)
            // rather than from `collected_data` alone, so they bypass
            // `resolve_next`'s data-only branch resolution and go straight
            // to `resolve_branch` with the already-computed outcome.
            // PARALLEL's next position is the first fan-out path the
            // handler already chose, carried as `next_node_override`
            // rather than a `next`/branch slot the navigator would resolve.
            let navigation = match &node.kind {
                NodeKind::Qualification => navigator::resolve_branch(
                    node,
                    result.metadata.get("qualification.qualified").and_then(|v| v.as_bool()).unwrap_or(false),
                ),
                NodeKind::Loop => navigator::resolve_branch(
                    node,
                    result.metadata.get("loop.condition_met").and_then(|v| v.as_bool()).unwrap_or(false),
                ),
                NodeKind::Parallel => match result.metadata.get("next_node_override").and_then(|v| v.as_str()) {
                    Some(next) => NavigationOutcome::Next(next.to_string()),
                    None => NavigationOutcome::Terminal,
                },
                _ => navigator::resolve_next(node, &ctx.collected_data),
            };

            match navigation {
                NavigationOutcome::Next(next) => {
                    let next_kind = self.graph.node(&next).map(|n| n.kind.clone()).unwrap_or_else(|| NodeKind::Unknown(String::new()));
                    ctx.enter_node(next, next_kind, chrono::Utc::now());
                }
                NavigationOutcome::Terminal => return Ok(result),
                NavigationOutcome::Dead => {
                    return Ok(result.with_metadata("error.code", serde_json::Value::String("DEAD_END".to_string())))
                }
            }

            // LOOP and PARALLEL each represent exactly one inbound message's
            // worth of progress (§4.5, §5's "one path per inbound message")
            // even though their own reply text is empty; every other
            // "sequential" kind only pauses the step once it has something
            // worth showing the caller, and otherwise keeps walking the
            // chain built by the loader's cycle-checked graph.
            if matches!(node.kind, NodeKind::Loop | NodeKind::Parallel) {
                return Ok(result);
            }
            if result.message.as_deref().is_some_and(|m| !m.is_empty()) {
                return Ok(result);
            }
        }

        Ok(StepResult::error(
            ctx.conversation_id.clone(),
            ctx.current_node_id.clone(),
            "STEP_NODE_LIMIT_EXCEEDED",
            "step exceeded the maximum number of sequential nodes without waiting or terminating",
        ))
    }

    async fn emit(&self, ctx: &ConversationContext, node_id: Option<&str>, kind: AnalyticsEventKind) {
        self.event_sink
            .emit(AnalyticsEvent {
                kind,
                tenant_id: ctx.tenant_id.clone(),
                lead_id: ctx.lead_id.clone(),
                conversation_id: ctx.conversation_id.clone(),
                node_id: node_id.map(str::to_string),
                occurred_at: chrono::Utc::now(),
                attributes: HashMap::new(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::http::{HttpActionRequest, HttpActionResult};
    use crate::analytics::NullEventSink;
    use crate::graph::{Edge, GlobalConfig, Node, NodeConfig};
    use async_trait::async_trait;
    use serde_json::json;

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

    fn happy_path_graph() -> Graph {
        let mut greet = node("greet", NodeKind::Greeting);
        greet.config.set("message", json!("Hi there!"));
        greet.next = Some("ask_name".to_string());

        let mut ask_name = node("ask_name", NodeKind::Name);
        ask_name.config.set("prompt", json!("What's your name?"));
        ask_name.next = Some("bye".to_string());

        let bye = node("bye", NodeKind::End);

        Graph {
            nodes: vec![greet, ask_name, bye],
            edges: vec![Edge { source: "greet".to_string(), target: "ask_name".to_string(), label: None }],
            start_node_id: "greet".to_string(),
            version: "2.0".to_string(),
            global_config: GlobalConfig::default(),
            name: None,
            description: None,
        }
    }

    #[tokio::test]
    async fn first_step_runs_greeting_and_advances_to_question() {
        let graph = happy_path_graph();
        let locks = ConversationLocks::new();
        let sink = NullEventSink;
        let executor = NoopExecutor;
        let engine = Engine { graph: &graph, locks: &locks, event_sink: &sink, http_executor: &executor };

        let mut ctx = ConversationContext::new("c1", "g1", chrono::Utc::now());
        let result = engine.process_message(&mut ctx, None).await.unwrap();

        assert_eq!(result.message.as_deref(), Some("Hi there!"));
        assert_eq!(ctx.current_node_id.as_deref(), Some("ask_name"));
    }

    #[tokio::test]
    async fn waiting_for_input_then_completing_the_flow() {
        let graph = happy_path_graph();
        let locks = ConversationLocks::new();
        let sink = NullEventSink;
        let executor = NoopExecutor;
        let engine = Engine { graph: &graph, locks: &locks, event_sink: &sink, http_executor: &executor };

        let mut ctx = ConversationContext::new("c1", "g1", chrono::Utc::now());
        engine.process_message(&mut ctx, None).await.unwrap();

        let question = engine.process_message(&mut ctx, None).await.unwrap();
        assert_eq!(question.expected_field.as_deref(), Some("name"));
        assert_eq!(ctx.status, ConversationStatus::WaitingInput);

        let answered = engine.process_message(&mut ctx, Some("Ana Silva")).await.unwrap();
        assert_eq!(ctx.collected_data.get("name").unwrap().to_string(), "Ana Silva");
        assert_eq!(answered.status, ConversationStatus::Completed);
        assert!(answered.is_final);
    }

    #[tokio::test]
    async fn terminal_conversation_rejects_further_steps() {
        let graph = happy_path_graph();
        let locks = ConversationLocks::new();
        let sink = NullEventSink;
        let executor = NoopExecutor;
        let engine = Engine { graph: &graph, locks: &locks, event_sink: &sink, http_executor: &executor };

        let mut ctx = ConversationContext::new("c1", "g1", chrono::Utc::now());
        ctx.status = ConversationStatus::Completed;

        let err = engine.process_message(&mut ctx, None).await.unwrap_err();
        assert_eq!(err.code(), "FLOW_ALREADY_TERMINAL");
    }

    #[tokio::test]
    async fn concurrent_step_on_same_conversation_is_busy() {
        let graph = happy_path_graph();
        let locks = ConversationLocks::new();
        let sink = NullEventSink;
        let executor = NoopExecutor;
        let engine = Engine { graph: &graph, locks: &locks, event_sink: &sink, http_executor: &executor };

        let mut ctx_a = ConversationContext::new("c1", "g1", chrono::Utc::now());
        let lock = engine.locks.lock_for("c1").await;
        let _held = lock.lock().await;

        let err = engine.process_message(&mut ctx_a, None).await.unwrap_err();
        assert_eq!(err.code(), "CONVERSATION_BUSY");
    }
}
