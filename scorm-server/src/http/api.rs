//! REST API handlers

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use scorm_core::{AttemptId, Principal, ResourceId};
use serde::{Deserialize, Serialize};

use super::error_response;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status of the server
    pub status: String,
    /// Server version
    pub version: String,
    /// Seconds since server started
    pub uptime_seconds: i64,
    /// Open ingest WebSocket connections
    pub open_connections: usize,
}

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        open_connections: state.open_connections(),
    })
}

/// Acknowledgement that a background task was started
#[derive(Debug, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub task: String,
    pub target: i64,
}

/// Reporting routes are limited to configured admins
fn require_admin(state: &AppState, principal: &Principal) -> Result<(), Response> {
    match principal.user() {
        None => Err(error_response(
            StatusCode::UNAUTHORIZED,
            "UNAUTHENTICATED",
            "A session is required",
        )),
        Some(user) if state.is_admin(user) => Ok(()),
        Some(user) => {
            tracing::debug!(%user, "Reporting route refused for non-admin");
            Err(error_response(
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Reporting requires an admin session",
            ))
        }
    }
}

/// POST /api/attempts/:attempt_id/report_outcome
///
/// Admin only.
pub async fn report_outcome(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(attempt_id): Path<i64>,
) -> Response {
    if let Err(response) = require_admin(&state, &principal) {
        return response;
    }

    let attempt = AttemptId(attempt_id);
    match state.attempts.attempt(attempt) {
        Ok(Some(_)) => {
            state.tasks.report_outcome(attempt);
            (
                StatusCode::ACCEPTED,
                Json(DispatchResponse {
                    task: "report_outcome".into(),
                    target: attempt_id,
                }),
            )
                .into_response()
        }
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("Attempt not found: {attempt}"),
        ),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string()),
    }
}

/// POST /api/resources/:resource_id/report_scores
///
/// Admin only.
pub async fn report_scores(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(resource_id): Path<i64>,
) -> Response {
    if let Err(response) = require_admin(&state, &principal) {
        return response;
    }

    let resource = ResourceId(resource_id);
    match state.attempts.resource(resource) {
        Ok(Some(_)) => {
            state.tasks.report_scores(resource);
            (
                StatusCode::ACCEPTED,
                Json(DispatchResponse {
                    task: "report_scores".into(),
                    target: resource_id,
                }),
            )
                .into_response()
        }
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("Resource not found: {resource}"),
        ),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string()),
    }
}
