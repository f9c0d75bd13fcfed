//! Shared application state for the scorm server

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use scorm_core::reporting::{HttpExamCache, LoggingGradeReporter, LoggingReceiptNotifier};
use scorm_core::{
    AttemptEvents, AttemptId, AttemptStore, Clock, CompactionConfig, Compactor, ExamCache,
    GradeReporter, IngestChannel, Ledger, ReceiptNotifier, ReportingPipeline, SqliteLedger,
    SystemClock, TaskDispatcher, UserId,
};
use tokio::sync::broadcast;

use crate::ServerError;

/// Timeout for exam definition fetches when no reporting config says otherwise
const DEFAULT_CACHE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// External services the reporting pipeline talks to
#[derive(Clone)]
pub struct Collaborators {
    pub grades: Arc<dyn GradeReporter>,
    pub receipts: Arc<dyn ReceiptNotifier>,
    pub cache: Arc<dyn ExamCache>,
}

impl Collaborators {
    /// Collaborators that log instead of sending anything
    pub fn logging() -> Self {
        Self {
            grades: Arc::new(LoggingGradeReporter),
            receipts: Arc::new(LoggingReceiptNotifier),
            cache: Arc::new(HttpExamCache::new(DEFAULT_CACHE_TIMEOUT)),
        }
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::logging()
    }
}

/// Shared application state accessible by all handlers
#[derive(Clone)]
pub struct AppState {
    /// Element history
    pub ledger: Arc<dyn Ledger>,
    /// Attempts and resources
    pub attempts: Arc<dyn AttemptStore>,
    /// Applies client batches onto the ledger
    pub ingest: Arc<IngestChannel>,
    /// Suspend-data compaction
    pub compactor: Arc<Compactor>,
    /// Reporting operations
    pub reporting: Arc<ReportingPipeline>,
    /// Background reporting tasks
    pub tasks: TaskDispatcher,
    /// Attempt lifecycle events published by the ingest channel
    pub events: AttemptEvents,
    /// Attempts that were just completed, for open WebSocket connections
    pub completions: broadcast::Sender<AttemptId>,
    /// When the server started
    pub started_at: DateTime<Utc>,
    /// Users allowed to dispatch reporting tasks
    admins: Arc<BTreeSet<UserId>>,
    open_connections: Arc<AtomicUsize>,
}

impl AppState {
    /// Create state over a SQLite store with logging collaborators
    pub fn new(store: Arc<SqliteLedger>) -> Self {
        Self::with_components(
            store.clone(),
            store,
            Collaborators::logging(),
            CompactionConfig::default(),
            Arc::new(SystemClock),
        )
    }

    /// Create state with custom components
    pub fn with_components(
        ledger: Arc<dyn Ledger>,
        attempts: Arc<dyn AttemptStore>,
        collaborators: Collaborators,
        compaction: CompactionConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let events = AttemptEvents::default();
        let ingest = Arc::new(IngestChannel::new(
            ledger.clone(),
            attempts.clone(),
            clock.clone(),
            events.clone(),
        ));
        let compactor = Arc::new(Compactor::new(ledger.clone(), clock, compaction));
        let reporting = Arc::new(ReportingPipeline::new(
            ledger.clone(),
            attempts.clone(),
            collaborators.grades,
            collaborators.receipts,
        ));
        let tasks = TaskDispatcher::new(reporting.clone(), collaborators.cache);
        let (completions, _) = broadcast::channel(256);

        Self {
            ledger,
            attempts,
            ingest,
            compactor,
            reporting,
            tasks,
            events,
            completions,
            started_at: Utc::now(),
            admins: Arc::new(BTreeSet::new()),
            open_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Allow these users to dispatch reporting tasks
    #[must_use]
    pub fn with_admins(mut self, admins: impl IntoIterator<Item = UserId>) -> Self {
        self.admins = Arc::new(admins.into_iter().collect());
        self
    }

    pub fn is_admin(&self, user: &UserId) -> bool {
        self.admins.contains(user)
    }

    /// Create state over an in-memory store
    pub fn new_for_testing() -> Result<Self, ServerError> {
        let store = Arc::new(SqliteLedger::open_in_memory()?);
        Ok(Self::new(store))
    }

    /// Returns how long the server has been running
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }

    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }

    pub(crate) fn connection_opened(&self) {
        self.open_connections.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn connection_closed(&self) {
        self.open_connections.fetch_sub(1, Ordering::SeqCst);
    }
}
