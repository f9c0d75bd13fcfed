//! Client update batches and per-batch outcomes

use serde::{Deserialize, Serialize};

/// Client-chosen batch identifier, echoed back in acknowledgements
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub u64);

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One data model update
///
/// Clients may send extra fields alongside key and value (timestamps,
/// element metadata); they are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScormElement {
    pub key: String,
    pub value: String,
}

impl ScormElement {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One client flush: an ordered list of updates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    #[serde(rename = "data")]
    pub elements: Vec<ScormElement>,
}

impl Batch {
    pub fn new(id: u64, elements: Vec<ScormElement>) -> Self {
        Self {
            id: BatchId(id),
            elements,
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// What happened to one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Every pair was durably written
    Applied { batch: BatchId, written: usize },
    /// A write failed; the first `written` pairs are recorded
    Failed {
        batch: BatchId,
        written: usize,
        reason: String,
    },
    /// Refused before touching the ledger
    Rejected { batch: BatchId, reason: String },
    /// Its sequence slot was already consumed; nothing was written
    Duplicate { batch: BatchId },
}

impl BatchOutcome {
    pub fn batch(&self) -> BatchId {
        match self {
            Self::Applied { batch, .. }
            | Self::Failed { batch, .. }
            | Self::Rejected { batch, .. }
            | Self::Duplicate { batch } => *batch,
        }
    }

    /// Whether the client can stop resending this batch
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, Self::Applied { .. } | Self::Duplicate { .. })
    }
}

/// Result of one submission on a connection
///
/// A submission can complete several batches at once when it fills a gap in
/// the sequence, and none when it is held behind a missing predecessor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub outcomes: Vec<BatchOutcome>,
    /// Batches still waiting for a predecessor
    pub held: usize,
}

impl IngestReport {
    pub fn acknowledged(&self) -> impl Iterator<Item = BatchId> + '_ {
        self.outcomes
            .iter()
            .filter(|o| o.is_acknowledged())
            .map(BatchOutcome::batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_deserializes_from_client_frame() {
        let json = r#"{"id": 7, "data": [
            {"key": "cmi.location", "value": "page-3", "timestamp": "2024-01-01T00:00:00Z"},
            {"key": "cmi.suspend_data", "value": "{}"}
        ]}"#;

        let batch: Batch = serde_json::from_str(json).unwrap();
        assert_eq!(batch.id, BatchId(7));
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.elements[0], ScormElement::new("cmi.location", "page-3"));
    }

    #[test]
    fn acknowledged_covers_applied_and_duplicate() {
        let report = IngestReport {
            outcomes: vec![
                BatchOutcome::Applied {
                    batch: BatchId(1),
                    written: 2,
                },
                BatchOutcome::Rejected {
                    batch: BatchId(2),
                    reason: "nope".into(),
                },
                BatchOutcome::Duplicate { batch: BatchId(3) },
                BatchOutcome::Failed {
                    batch: BatchId(4),
                    written: 0,
                    reason: "disk".into(),
                },
            ],
            held: 0,
        };

        let acked: Vec<_> = report.acknowledged().collect();
        assert_eq!(acked, vec![BatchId(1), BatchId(3)]);
    }
}
