//! HTTP server module

mod api;
mod scorm;

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::middleware::{AuthLayer, auth_middleware};

pub use api::{DispatchResponse, HealthResponse};
pub use scorm::{FallbackResponse, ScormDataResponse};

/// Error body returned by every handler
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

pub(crate) fn error_response(status: StatusCode, code: &str, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
        .into_response()
}

/// Create the HTTP router with all routes configured
pub fn create_router(state: Arc<AppState>, auth: AuthLayer) -> Router {
    Router::new()
        .route("/api/health", get(api::health))
        .route(
            "/api/attempts/:attempt_id/report_outcome",
            post(api::report_outcome),
        )
        .route(
            "/api/resources/:resource_id/report_scores",
            post(api::report_scores),
        )
        .route("/attempt/:attempt_id/scorm_data", get(scorm::scorm_data))
        .route(
            "/attempt/:attempt_id/scorm_api_fallback",
            post(scorm::scorm_api_fallback),
        )
        .route(
            "/websocket/attempt/:attempt_id/scorm_api",
            get(crate::ws::scorm_api_ws),
        )
        .layer(axum::middleware::from_fn(auth_middleware))
        .layer(Extension(auth))
        .with_state(state)
}
