//! Route table (§6): three endpoints, no auth/tenant middleware — those are
//! out of scope (§1) and live in front of this service, not inside it.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers;
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/engine/step", post(handlers::step))
        .route("/engine/context/:conversation_id", get(handlers::get_context))
        .route("/graphs/validate", post(handlers::validate_graph))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

pub fn cors_layer() -> CorsLayer {
    CorsLayer::permissive()
}
