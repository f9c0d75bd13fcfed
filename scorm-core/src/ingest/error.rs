//! Ingest error types

use thiserror::Error;

use crate::ledger::LedgerError;
use crate::types::AttemptId;

/// Reasons a submission is refused or fails
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("connection has no authenticated user")]
    Unauthenticated,

    #[error("attempt {0} not found")]
    AttemptNotFound(AttemptId),

    #[error("attempt {0} belongs to another user")]
    NotOwner(AttemptId),

    #[error("sequence slot {0} already consumed")]
    Duplicate(u64),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl IngestError {
    /// Whether this refusal leaves the ledger untouched by design
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated | Self::AttemptNotFound(_) | Self::NotOwner(_)
        )
    }
}
