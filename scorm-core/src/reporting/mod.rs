//! Outcome reporting to the launching platform
//!
//! Scores are computed on demand from an attempt's materialized data model and
//! handed to a [`GradeReporter`]. Completion receipts and exam cache refreshes
//! are independent collaborators with their own failure handling. Every
//! operation is wrapped by a task function in [`tasks`] that contains its
//! failures and returns a [`TaskOutcome`].

mod cache;
mod http;
mod outcome;
mod pipeline;
pub mod tasks;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::model::{CompletionStatus, SuccessStatus};
use crate::types::{Attempt, AttemptId, ResourceId, UserId};

pub use cache::{CachedExam, HttpExamCache};
pub use http::{
    HttpGradeReporter, HttpReceiptNotifier, LoggingGradeReporter, LoggingReceiptNotifier,
    ReceiptPayload,
};
pub use outcome::Outcome;
pub use pipeline::{ReportingPipeline, ScoresSummary};
pub use tasks::{TaskDispatcher, TaskOutcome};

/// What gets transmitted to the grade endpoint for one attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeSubmission {
    pub attempt: AttemptId,
    pub resource: ResourceId,
    pub user: UserId,
    /// In [0, 1]; absent when the attempt never recorded a usable score
    pub score: Option<f64>,
    pub completion_status: CompletionStatus,
    pub success_status: SuccessStatus,
}

/// Transmits scores to the launching platform
#[async_trait]
pub trait GradeReporter: Send + Sync {
    async fn transmit(&self, submission: &OutcomeSubmission) -> Result<(), ReportingError>;
}

/// Tells the learner an attempt was completed
#[async_trait]
pub trait ReceiptNotifier: Send + Sync {
    async fn notify(&self, attempt: &Attempt) -> Result<(), ReceiptError>;
}

/// Keeps local copies of externally hosted exam definitions
#[async_trait]
pub trait ExamCache: Send + Sync {
    async fn update_cache(&self, link: &str) -> Result<(), CacheError>;
}

/// Errors from outcome and score reporting
#[derive(Error, Debug)]
pub enum ReportingError {
    #[error("grade endpoint rejected outcome: {status} {body}")]
    Rejected { status: u16, body: String },

    #[error("grade endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("grade endpoint timed out")]
    Timeout,

    #[error("attempt {0} not found")]
    AttemptNotFound(AttemptId),

    #[error("resource {0} not found")]
    ResourceNotFound(ResourceId),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl ReportingError {
    /// Whether the grade endpoint itself refused or could not be reached
    pub fn is_transmission_failure(&self) -> bool {
        matches!(
            self,
            Self::Rejected { .. } | Self::Unreachable(_) | Self::Timeout
        )
    }

    pub(crate) fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Unreachable(e.to_string())
        }
    }
}

/// Errors from completion receipts
#[derive(Error, Debug)]
pub enum ReceiptError {
    #[error("receipt endpoint rejected notification: {0}")]
    Rejected(u16),

    #[error("receipt endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("attempt {0} not found")]
    AttemptNotFound(AttemptId),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Errors from exam cache refreshes
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("failed to fetch {link}: {reason}")]
    Fetch { link: String, reason: String },

    #[error("{link} did not return an exam definition: {reason}")]
    Invalid { link: String, reason: String },
}
