//! Error types for scorm-core

use thiserror::Error;

use crate::compaction::CompactionError;
use crate::diff::DiffError;
use crate::ingest::IngestError;
use crate::ledger::LedgerError;
use crate::reporting::{CacheError, ReceiptError, ReportingError};

/// Top-level error type for scorm-core
#[derive(Error, Debug)]
pub enum ScormError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Diff error: {0}")]
    Diff(#[from] DiffError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Compaction error: {0}")]
    Compaction(#[from] CompactionError),

    #[error("Reporting error: {0}")]
    Reporting(#[from] ReportingError),

    #[error("Receipt error: {0}")]
    Receipt(#[from] ReceiptError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}
