//! scorm-core: attempt ledger, compaction and outcome reporting for SCORM content
//!
//! This crate holds everything that does not depend on a transport:
//!
//! - **Ledger** - [`SqliteLedger`] records every data model update an attempt
//!   sends as an append-only [`Element`]
//! - **Ingest** - [`IngestChannel`] applies client batches onto the ledger in
//!   order, one connection at a time
//! - **Compaction** - [`Compactor`] rewrites repeated `cmi.suspend_data` values
//!   as diffs on a fixed schedule
//! - **Reporting** - [`ReportingPipeline`] computes outcomes and hands them to
//!   the launching platform; [`TaskDispatcher`] runs that work in the
//!   background with failures contained
//!
//! # Architecture
//!
//! ```text
//! client batches ──► IngestChannel ──► Ledger ◄── Compactor (periodic)
//!                         │               │
//!                   AttemptEvents         └──► ReportingPipeline ──► GradeReporter
//! ```

pub mod auth;
pub mod clock;
pub mod compaction;
pub mod diff;
pub mod error;
pub mod events;
pub mod ingest;
pub mod ledger;
pub mod model;
pub mod reporting;
pub mod schedule;
pub mod types;

// Re-export key types for convenience
pub use auth::{Principal, SessionResolver, StaticSessions};
pub use clock::{Clock, ManualClock, SystemClock};
pub use compaction::{CompactionConfig, CompactionReport, Compactor};
pub use error::ScormError;
pub use events::{AttemptEvent, AttemptEvents};
pub use ingest::{Batch, BatchId, BatchOutcome, IngestChannel, IngestConnection, IngestReport};
pub use ledger::{AttemptStore, Element, Ledger, LedgerError, SqliteLedger, Timeline};
pub use model::{CompletionStatus, SuccessStatus};
pub use reporting::{
    ExamCache, GradeReporter, OutcomeSubmission, ReceiptNotifier, ReportingPipeline, TaskDispatcher,
    TaskOutcome,
};
pub use schedule::PeriodicTask;
pub use types::{
    Attempt, AttemptId, AttemptStatus, ElementId, GradingMethod, Resource, ResourceId, UserId,
};
