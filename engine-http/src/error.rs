//! API error types and HTTP response conversion.

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
    pub code: String,
}

impl ApiErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self { error: error.into(), message: message.into(), code: code.into() }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("validation failed: {0}")]
    ValidationError(String),

    #[error("conversation busy: {0}")]
    Busy(String),

    #[error("internal server error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Busy(_) => StatusCode::CONFLICT,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::Busy(_) => "CONVERSATION_BUSY",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NotFound",
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::ValidationError(_) => "ValidationError",
            ApiError::Busy(_) => "Busy",
            ApiError::InternalError(_) => "InternalError",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ApiErrorResponse::new(self.error_type(), self.to_string(), self.code());
        tracing::error!(code = body.code, "api error: {}", body.message);
        (status, Json(body)).into_response()
    }
}

/// Every `EngineError` already carries a stable `code()` (§7); map it onto
/// the nearest HTTP status rather than collapsing everything to 500.
impl From<engine_core::EngineError> for ApiError {
    fn from(err: engine_core::EngineError) -> Self {
        match &err {
            engine_core::EngineError::ConversationNotFound(_) => ApiError::NotFound(err.to_string()),
            engine_core::EngineError::ConversationBusy(_) => ApiError::Busy(err.to_string()),
            engine_core::EngineError::GraphValidation(_) => ApiError::ValidationError(err.to_string()),
            engine_core::EngineError::FlowAlreadyTerminal(_) => ApiError::BadRequest(err.to_string()),
            _ => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<engine_checkpoint::ContextStoreError> for ApiError {
    fn from(err: engine_checkpoint::ContextStoreError) -> Self {
        match &err {
            engine_checkpoint::ContextStoreError::NotFound(_) => ApiError::NotFound(err.to_string()),
            engine_checkpoint::ContextStoreError::Invalid(_) => ApiError::BadRequest(err.to_string()),
            _ => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = ApiError::NotFound("c1".to_string());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn busy_maps_to_409() {
        let err = ApiError::Busy("c1".to_string());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "CONVERSATION_BUSY");
    }

    #[test]
    fn validation_error_maps_to_422() {
        let err = ApiError::ValidationError("bad graph".to_string());
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
