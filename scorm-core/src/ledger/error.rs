//! Ledger error types

use thiserror::Error;

use crate::diff::DiffError;
use crate::types::{AttemptId, ElementId, ResourceId};

/// Errors for ledger and attempt store operations
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Attempt not found: {0}")]
    AttemptNotFound(AttemptId),

    #[error("Resource not found: {0}")]
    ResourceNotFound(ResourceId),

    #[error("Broken diff chain at element {element}: {reason}")]
    BrokenChain { element: ElementId, reason: String },

    #[error("Cannot apply diff stored in element {element}: {source}")]
    Diff {
        element: ElementId,
        #[source]
        source: DiffError,
    },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Ledger connection lock poisoned")]
    Poisoned,
}
