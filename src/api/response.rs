//! Response types for the pipeline API.
//!
//! Every error is returned as `{code, message, details?}` with a status
//! derived from the pipeline error kind.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::models::{PendingAmbiguity, SessionState};

/// API error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Creates a new API error with details.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// Creates a validation error response.
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// Creates a malformed JSON error response.
    pub fn malformed_json(message: impl Into<String>) -> Self {
        Self::new("MALFORMED_JSON", message)
    }

    /// Creates an unknown artifact error response.
    pub fn artifact_not_found(name: &str) -> Self {
        Self::with_details(
            "ARTIFACT_NOT_FOUND",
            format!("Artifact not found: {}", name),
            "The artifact is unknown or the session has not produced it yet",
        )
    }
}

/// API error with HTTP status code.
pub struct ApiErrorResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The error body.
    pub error: ApiError,
}

impl ApiErrorResponse {
    /// A 400 response.
    pub fn bad_request(error: ApiError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error,
        }
    }

    /// A 404 response.
    pub fn not_found(error: ApiError) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error,
        }
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

impl From<PipelineError> for ApiErrorResponse {
    fn from(error: PipelineError) -> Self {
        let status = match &error {
            PipelineError::SessionNotFound { .. } => StatusCode::NOT_FOUND,
            PipelineError::InvalidTransition { .. } | PipelineError::UnresolvedAmbiguities { .. } => {
                StatusCode::CONFLICT
            }
            PipelineError::SchemaValidation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::Fetch { .. } => StatusCode::BAD_REQUEST,
            PipelineError::Provider { .. } | PipelineError::BudgetExceeded { .. } => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            error: ApiError::new(error.reason_code().to_ascii_uppercase(), error.to_string()),
        }
    }
}

/// Body of `GET /sessions/:id/ambiguities`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmbiguitiesResponse {
    /// The session.
    pub session_id: String,
    /// Its current state.
    pub state: SessionState,
    /// Ambiguities awaiting a decision.
    pub ambiguities: Vec<PendingAmbiguity>,
}
