//! Background compaction of repeatedly rewritten fields
//!
//! Content rewrites `cmi.suspend_data` in full on every save, so an attempt's
//! ledger grows with every flush. A compaction pass re-encodes every full value
//! after the first as a diff against its predecessor, leaving every element's
//! materialized value untouched.

mod compactor;
mod lease;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diff::DiffError;
use crate::ledger::LedgerError;
use crate::model::SUSPEND_DATA;
use crate::types::ElementId;

pub use compactor::Compactor;
pub use lease::{Lease, Leases};

/// Compaction schedule and scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionConfig {
    /// Whether the server schedules passes at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Time between the end of one pass and the start of the next
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// A pass starts no new attempt once this much time has elapsed
    #[serde(default = "default_budget", with = "humantime_serde")]
    pub budget: Duration,

    /// Data model key to compact
    #[serde(default = "default_field")]
    pub field: String,
}

fn default_enabled() -> bool {
    true
}

fn default_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_budget() -> Duration {
    Duration::from_secs(10)
}

fn default_field() -> String {
    SUSPEND_DATA.to_string()
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval: default_interval(),
            budget: default_budget(),
            field: default_field(),
        }
    }
}

/// Summary of one compaction pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionReport {
    /// Another pass was already running; nothing was done
    pub run_skipped: bool,
    /// Candidates the pass started on
    pub examined: usize,
    /// Attempts that had at least one element rewritten
    pub compacted: usize,
    /// Elements rewritten as diffs
    pub rewritten: usize,
    /// Attempts whose compaction failed
    pub failed: usize,
    /// Attempts skipped because another worker held their lease
    pub leased: usize,
    /// The pass stopped early because its time budget ran out
    pub budget_exhausted: bool,
    /// Stored bytes saved; negative when diffs outgrew their values
    pub bytes_saved: i64,
}

impl CompactionReport {
    pub(crate) fn skipped() -> Self {
        Self {
            run_skipped: true,
            ..Self::default()
        }
    }
}

/// Errors that abort compaction of one attempt, or a whole pass
#[derive(Error, Debug)]
pub enum CompactionError {
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("diff for element {element} failed to apply: {source}")]
    Diff {
        element: ElementId,
        #[source]
        source: DiffError,
    },

    #[error("diff for element {element} does not reproduce its value")]
    Verification { element: ElementId },
}
