//! WebSocket message types for the SCORM runtime channel
//!
//! Clients send [`scorm_core::Batch`] frames (`{"id": .., "data": [..]}`).
//! The server answers with the untagged shapes below, which is what the
//! in-browser API shim expects.

use scorm_core::{BatchId, BatchOutcome, CompletionStatus};
use serde::{Deserialize, Serialize};

/// Messages from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// The batch is durable; the client can stop resending it
    Received { received: BatchId },
    /// The batch, or an unparsable frame, was not applied
    Error {
        error: String,
        batch: Option<BatchId>,
    },
    /// The attempt was completed, possibly from another window
    Completion {
        completion_status: CompletionStatus,
    },
}

impl ServerMessage {
    pub fn completed() -> Self {
        Self::Completion {
            completion_status: CompletionStatus::Completed,
        }
    }
}

impl From<BatchOutcome> for ServerMessage {
    fn from(outcome: BatchOutcome) -> Self {
        match outcome {
            BatchOutcome::Applied { batch, .. } | BatchOutcome::Duplicate { batch } => {
                Self::Received { received: batch }
            }
            BatchOutcome::Failed { batch, reason, .. } | BatchOutcome::Rejected { batch, reason } => {
                Self::Error {
                    error: reason,
                    batch: Some(batch),
                }
            }
        }
    }
}
