//! Attempt lifecycle notifications
//!
//! The ingest channel publishes an [`AttemptEvent`] after durably writing a
//! key other parts of the system care about. Publishing never blocks and is
//! best-effort: with no subscribers the event is simply dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::CompletionStatus;
use crate::types::AttemptId;

/// Something that happened to an attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttemptEvent {
    /// A new `cmi.completion_status` value was recorded
    CompletionChanged {
        attempt: AttemptId,
        status: CompletionStatus,
    },
}

impl AttemptEvent {
    pub fn attempt(&self) -> AttemptId {
        match self {
            Self::CompletionChanged { attempt, .. } => *attempt,
        }
    }
}

/// Broadcast hub for [`AttemptEvent`]s
#[derive(Debug, Clone)]
pub struct AttemptEvents {
    tx: broadcast::Sender<AttemptEvent>,
}

impl AttemptEvents {
    /// Create a hub with the given broadcast channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish to live subscribers, returning how many received it
    pub fn publish(&self, event: AttemptEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AttemptEvent> {
        self.tx.subscribe()
    }
}

impl Default for AttemptEvents {
    fn default() -> Self {
        Self::new(1024)
    }
}
