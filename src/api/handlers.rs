//! HTTP request handlers for the pipeline API.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::Session;
use crate::pipeline::Artifact;

use super::request::{CreateSessionRequest, ResolutionsRequest};
use super::response::{AmbiguitiesResponse, ApiError, ApiErrorResponse};
use super::state::AppState;

type ApiResult<T> = Result<T, ApiErrorResponse>;

/// Creates the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id/ambiguities", get(get_ambiguities))
        .route("/sessions/:id/resolutions", post(post_resolutions))
        .route("/sessions/:id/abort", post(abort_session))
        .route("/sessions/:id/artifacts/:name", get(get_artifact))
        .with_state(state)
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            let error = match rejection {
                JsonRejection::JsonDataError(err) => {
                    let body_text = err.body_text();
                    if body_text.contains("missing field") || body_text.contains("unknown field") {
                        ApiError::validation_error(body_text)
                    } else {
                        ApiError::malformed_json(body_text)
                    }
                }
                JsonRejection::JsonSyntaxError(err) => {
                    ApiError::malformed_json(format!("Invalid JSON syntax: {}", err))
                }
                JsonRejection::MissingJsonContentType(_) => {
                    ApiError::new("MISSING_CONTENT_TYPE", "Content-Type must be application/json")
                }
                _ => ApiError::malformed_json("Failed to parse request body"),
            };
            warn!(code = %error.code, message = %error.message, "Rejected request body");
            Err(ApiErrorResponse::bad_request(error))
        }
    }
}

/// Handler for `POST /sessions`.
///
/// Creates the session and starts it in the background; the response is
/// the session as created.
async fn create_session(
    State(state): State<AppState>,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Session>)> {
    let correlation_id = Uuid::new_v4();
    let request = json_body(payload)?;
    let orchestrator = Arc::clone(state.orchestrator());
    let options = request
        .options
        .resolve(orchestrator.defaults())
        .map_err(|message| ApiErrorResponse::bad_request(ApiError::validation_error(message)))?;

    let session = orchestrator
        .create_session(&request.reference, options)
        .await?;
    info!(correlation_id = %correlation_id, session_id = %session.id, "Session accepted");

    let session_id = session.id.clone();
    tokio::spawn(async move {
        if let Err(err) = orchestrator.run(&session_id).await {
            error!(session_id = %session_id, error = %err, "Session run aborted");
        }
    });
    Ok((StatusCode::ACCEPTED, Json(session)))
}

/// Handler for `GET /sessions/:id`.
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Session>> {
    Ok(Json(state.orchestrator().session(&id).await?))
}

/// Handler for `GET /sessions/:id/ambiguities`.
async fn get_ambiguities(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AmbiguitiesResponse>> {
    let orchestrator = state.orchestrator();
    let session = orchestrator.session(&id).await?;
    let ambiguities = orchestrator.ambiguities(&id).await?;
    Ok(Json(AmbiguitiesResponse {
        session_id: session.id,
        state: session.state,
        ambiguities,
    }))
}

/// Handler for `POST /sessions/:id/resolutions`.
///
/// Runs the remaining stages before responding.
async fn post_resolutions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ResolutionsRequest>, JsonRejection>,
) -> ApiResult<Json<Session>> {
    let request = json_body(payload)?;
    let session = state
        .orchestrator()
        .resume(&id, request.resolutions)
        .await?;
    Ok(Json(session))
}

/// Handler for `POST /sessions/:id/abort`.
async fn abort_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<Session>)> {
    let session = state.orchestrator().abort(&id).await?;
    Ok((StatusCode::ACCEPTED, Json(session)))
}

/// Handler for `GET /sessions/:id/artifacts/:name`.
async fn get_artifact(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
) -> ApiResult<Response> {
    let artifact = Artifact::from_name(&name)
        .ok_or_else(|| ApiErrorResponse::not_found(ApiError::artifact_not_found(&name)))?;
    let bytes = state
        .orchestrator()
        .artifact(&id, artifact)
        .await?
        .ok_or_else(|| ApiErrorResponse::not_found(ApiError::artifact_not_found(&name)))?;
    Ok(([(header::CONTENT_TYPE, artifact.content_type())], bytes).into_response())
}
