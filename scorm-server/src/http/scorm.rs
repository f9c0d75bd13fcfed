//! SCORM runtime endpoints used by the in-browser API shim

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use scorm_core::ingest::ScormElement;
use scorm_core::{AttemptId, AttemptStatus, Batch, BatchId, BatchOutcome, Principal};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error_response;
use crate::AppState;

/// Materialized data model of an attempt
#[derive(Debug, Serialize, Deserialize)]
pub struct ScormDataResponse {
    pub attempt: AttemptId,
    pub status: AttemptStatus,
    pub data: BTreeMap<String, String>,
}

/// GET /attempt/:attempt_id/scorm_data
pub async fn scorm_data(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(attempt_id): Path<i64>,
) -> Response {
    let attempt = AttemptId(attempt_id);
    let Some(user) = principal.user() else {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "UNAUTHENTICATED",
            "A session is required",
        );
    };

    let record = match state.attempts.attempt(attempt) {
        Ok(Some(record)) => record,
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Attempt not found: {attempt}"),
            );
        }
        Err(e) => {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string());
        }
    };
    if !record.is_owned_by(user) {
        return error_response(
            StatusCode::FORBIDDEN,
            "FORBIDDEN",
            format!("Attempt {attempt} belongs to another user"),
        );
    }

    match state.ledger.current_values(attempt) {
        Ok(data) => Json(ScormDataResponse {
            attempt,
            status: record.status,
            data,
        })
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string()),
    }
}

/// A batch the fallback could not apply
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchError {
    pub batch: BatchId,
    pub error: String,
}

/// Acknowledgement of a fallback submission
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FallbackResponse {
    pub received_batches: Vec<BatchId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<BatchError>,
}

/// POST /attempt/:attempt_id/scorm_api_fallback
///
/// Body maps batch ids to element lists. Batches are applied in ascending id
/// order over a connection that lives for this request only.
pub async fn scorm_api_fallback(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(attempt_id): Path<i64>,
    Json(batches): Json<BTreeMap<u64, Vec<ScormElement>>>,
) -> impl IntoResponse {
    let attempt = AttemptId(attempt_id);
    let connection = state.ingest.connect(principal, attempt);
    debug!(%attempt, batches = batches.len(), "Fallback submission");

    let mut response = FallbackResponse::default();
    for (id, elements) in batches {
        let report = connection.submit(Batch::new(id, elements)).await;
        for outcome in report.outcomes {
            match outcome {
                BatchOutcome::Applied { batch, .. } | BatchOutcome::Duplicate { batch } => {
                    response.received_batches.push(batch)
                }
                BatchOutcome::Failed { batch, reason, .. }
                | BatchOutcome::Rejected { batch, reason } => {
                    response.errors.push(BatchError {
                        batch,
                        error: reason,
                    })
                }
            }
        }
    }

    Json(response)
}
