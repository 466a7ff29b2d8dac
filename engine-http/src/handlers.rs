//! Handlers for the three endpoints in §6: step, context lookup, graph
//! validation.

use axum::{
    extract::{Path, State},
    Json,
};
use engine_core::context::ConversationContext;
use engine_core::engine::Engine;
use engine_core::graph::Graph;
use engine_core::loader;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::response;
use crate::state::AppState;

/// `POST /engine/step` request body (§6).
#[derive(Debug, Deserialize)]
pub struct StepRequest {
    pub conversation_id: String,
    pub lead_id: Option<String>,
    pub tenant_id: Option<String>,
    pub graph_id: String,
    pub user_message: Option<String>,
    pub media: Option<Value>,
    pub received_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// `POST /engine/step` response body, mirroring §3's `StepResult` over the
/// wire (§6).
#[derive(Debug, Serialize)]
pub struct StepResponse {
    pub reply_text: Option<String>,
    pub result_kind: engine_core::step::StepResultKind,
    pub next_node_id: Option<String>,
    pub collected_field: Option<String>,
    pub notification: Option<Value>,
    pub action: Option<Value>,
    pub handoff: Option<Value>,
    pub qualification: Option<Value>,
    pub error: Option<String>,
}

impl From<engine_core::step::StepResult> for StepResponse {
    fn from(result: engine_core::step::StepResult) -> Self {
        let action = result
            .metadata
            .get("action.name")
            .map(|name| {
                serde_json::json!({
                    "name": name,
                    "payload": result.metadata.get("action.payload").cloned().unwrap_or(Value::Null),
                    "result": result.metadata.get("action.result").cloned(),
                })
            });

        let handoff = (result.result_kind == engine_core::step::StepResultKind::Handoff).then(|| {
            serde_json::json!({
                "reason": result.metadata.get("reason").cloned(),
                "department": result.metadata.get("department").cloned(),
            })
        });

        let qualification = result.metadata.get("qualification.qualified").map(|qualified| {
            serde_json::json!({
                "qualified": qualified,
                "score": result.metadata.get("qualification.score").cloned(),
            })
        });

        StepResponse {
            reply_text: result.message,
            result_kind: result.result_kind,
            next_node_id: result.node_id,
            collected_field: result.expected_field,
            notification: result.metadata.get("notification").cloned(),
            action,
            handoff,
            qualification,
            error: result.error,
        }
    }
}

/// `POST /engine/step`
pub async fn step(
    State(state): State<AppState>,
    Json(req): Json<StepRequest>,
) -> ApiResult<impl axum::response::IntoResponse> {
    if req.conversation_id.trim().is_empty() {
        return Err(ApiError::BadRequest("conversation_id must not be empty".to_string()));
    }

    let graph = state
        .graphs
        .get(&req.graph_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("graph '{}' is not registered", req.graph_id)))?;

    let now = req.received_at.unwrap_or_else(chrono::Utc::now);
    let mut ctx = state
        .context_store
        .get(&req.conversation_id)
        .await?
        .unwrap_or_else(|| ConversationContext::new(req.conversation_id.clone(), req.graph_id.clone(), now));

    if let Some(lead_id) = &req.lead_id {
        ctx.lead_id = Some(lead_id.clone());
    }
    if let Some(tenant_id) = &req.tenant_id {
        ctx.tenant_id = Some(tenant_id.clone());
    }

    let engine = Engine {
        graph: &graph,
        locks: &state.locks,
        event_sink: state.event_sink.as_ref(),
        http_executor: state.http_executor.as_ref(),
    };

    let result = engine.process_message(&mut ctx, req.user_message.as_deref()).await?;

    state.context_store.put(&ctx).await?;

    Ok(response::ok(StepResponse::from(result)))
}

/// `GET /engine/context/{conversation_id}`
pub async fn get_context(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let ctx = state
        .context_store
        .get(&conversation_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no context for conversation '{conversation_id}'")))?;

    Ok(response::ok(ctx))
}

/// `POST /graphs/validate` request/response (§6). The raw graph JSON is
/// deserialized leniently (unknown node kinds fall back to
/// [`engine_core::graph::NodeKind::Unknown`] rather than a parse error),
/// then autocorrected and validated per §4.1. An accepted graph (no
/// `ERROR`-severity diagnostic) is registered so a later `/engine/step` can
/// find it by `graph_id`.
#[derive(Debug, Deserialize)]
pub struct ValidateGraphRequest {
    pub graph_id: String,
    #[serde(flatten)]
    pub graph: Graph,
}

#[derive(Debug, Serialize)]
pub struct DiagnosticDto {
    pub code: String,
    pub severity: String,
    pub node_id: Option<String>,
    pub message: String,
}

impl From<&loader::Diagnostic> for DiagnosticDto {
    fn from(d: &loader::Diagnostic) -> Self {
        DiagnosticDto {
            code: d.code.to_string(),
            severity: match d.severity {
                loader::Severity::Error => "ERROR".to_string(),
                loader::Severity::Warning => "WARNING".to_string(),
            },
            node_id: d.node_id.clone(),
            message: d.message.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValidateGraphResponse {
    pub canonical_graph: Graph,
    pub diagnostics: Vec<DiagnosticDto>,
    pub accepted: bool,
}

pub async fn validate_graph(
    State(state): State<AppState>,
    Json(req): Json<ValidateGraphRequest>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let mut graph = req.graph;
    loader::autocorrect(&mut graph);
    let diagnostics = loader::validate(&graph);

    let accepted = !diagnostics.iter().any(|d| d.severity == loader::Severity::Error);
    if accepted {
        state.graphs.put(req.graph_id.clone(), graph.clone()).await;
    }

    Ok(response::ok(ValidateGraphResponse {
        canonical_graph: graph,
        diagnostics: diagnostics.iter().map(DiagnosticDto::from).collect(),
        accepted,
    }))
}
