//! Ordered application of client batches onto the ledger

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, instrument, warn};

use super::batch::{Batch, BatchOutcome, IngestReport, ScormElement};
use super::error::IngestError;
use super::pipeline::{ConnectionId, IngestContext, IngestPipeline};
use super::sequencer::{Sequencer, Slot};
use crate::auth::Principal;
use crate::clock::Clock;
use crate::events::{AttemptEvent, AttemptEvents};
use crate::ledger::{AttemptStore, Ledger};
use crate::model::{COMPLETION_STATUS, CompletionStatus, SCORE_SCALED};
use crate::types::AttemptId;

/// Characters of a score value that make it into debug logs
const SCORE_LOG_CHARS: usize = 16;

/// Shared entry point that opens ingest connections
pub struct IngestChannel {
    ledger: Arc<dyn Ledger>,
    clock: Arc<dyn Clock>,
    events: AttemptEvents,
    pipeline: IngestPipeline,
}

impl IngestChannel {
    /// Create a channel running the standard pipeline
    pub fn new(
        ledger: Arc<dyn Ledger>,
        attempts: Arc<dyn AttemptStore>,
        clock: Arc<dyn Clock>,
        events: AttemptEvents,
    ) -> Self {
        Self::with_pipeline(ledger, clock, events, IngestPipeline::standard(attempts))
    }

    pub fn with_pipeline(
        ledger: Arc<dyn Ledger>,
        clock: Arc<dyn Clock>,
        events: AttemptEvents,
        pipeline: IngestPipeline,
    ) -> Self {
        Self {
            ledger,
            clock,
            events,
            pipeline,
        }
    }

    pub fn events(&self) -> &AttemptEvents {
        &self.events
    }

    /// Open a connection bound to `principal` and targeting `attempt`
    pub fn connect(self: &Arc<Self>, principal: Principal, attempt: AttemptId) -> IngestConnection {
        let connection = IngestConnection {
            id: ConnectionId::new(),
            principal,
            attempt,
            channel: Arc::clone(self),
            sequencer: Arc::new(Mutex::new(Sequencer::new())),
            arrivals: AtomicU64::new(0),
        };
        debug!(connection = %connection.id, %attempt, "Ingest connection opened");
        connection
    }

    /// Write each pair of a batch in order, stopping at the first failure
    fn apply(&self, attempt: AttemptId, batch: Batch) -> BatchOutcome {
        let mut written = 0;
        for element in &batch.elements {
            let timestamp = self.clock.now();
            if let Err(e) = self
                .ledger
                .append(attempt, &element.key, &element.value, timestamp)
            {
                warn!(%attempt, batch = %batch.id, written, error = %e, "Batch write failed");
                return BatchOutcome::Failed {
                    batch: batch.id,
                    written,
                    reason: e.to_string(),
                };
            }
            written += 1;
            self.observe(attempt, element);
        }

        debug!(%attempt, batch = %batch.id, written, "Batch applied");
        BatchOutcome::Applied {
            batch: batch.id,
            written,
        }
    }

    /// React to a durably written pair
    fn observe(&self, attempt: AttemptId, element: &ScormElement) {
        match element.key.as_str() {
            SCORE_SCALED => {
                let score: String = element.value.chars().take(SCORE_LOG_CHARS).collect();
                debug!(%attempt, %score, "Score recorded");
            }
            COMPLETION_STATUS => {
                let status = CompletionStatus::from_value(&element.value);
                let delivered = self
                    .events
                    .publish(AttemptEvent::CompletionChanged { attempt, status });
                debug!(%attempt, status = status.as_str(), delivered, "Completion status recorded");
            }
            _ => {}
        }
    }
}

/// One client connection to one attempt
///
/// Submissions on a connection are applied strictly in sequence order.
/// Separate connections never wait on each other.
pub struct IngestConnection {
    id: ConnectionId,
    principal: Principal,
    attempt: AttemptId,
    channel: Arc<IngestChannel>,
    sequencer: Arc<Mutex<Sequencer>>,
    arrivals: AtomicU64,
}

impl IngestConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Submit a batch in the next arrival slot
    pub async fn submit(&self, batch: Batch) -> IngestReport {
        let seq = self.arrivals.fetch_add(1, Ordering::SeqCst);
        self.submit_at(seq, batch).await
    }

    /// Submit a batch in an explicit sequence slot
    ///
    /// A batch ahead of a missing predecessor is held and applied by the
    /// submission that fills the gap. Callers outside the crate go through
    /// [`Self::submit`], so held slots never outrun in-flight submissions.
    #[instrument(skip(self, batch), fields(connection = %self.id, attempt = %self.attempt, batch = %batch.id))]
    pub(crate) async fn submit_at(&self, seq: u64, batch: Batch) -> IngestReport {
        let batch_id = batch.id;
        let ctx = IngestContext::new(
            self.id,
            seq,
            self.principal.clone(),
            self.attempt,
            batch,
            Arc::clone(&self.sequencer),
        );

        let mut report = IngestReport::default();
        let mut guard = match self.channel.pipeline.run(ctx).await {
            Ok(mut ctx) => {
                let mut guard = match ctx.sequence_guard.take() {
                    Some(guard) => guard,
                    None => self.lock_sequencer().await,
                };
                if guard.is_consumed(seq) {
                    report.outcomes.push(BatchOutcome::Duplicate { batch: batch_id });
                    report.held = guard.held();
                    return report;
                }
                guard.hold(seq, ctx.batch);
                guard
            }
            Err(IngestError::Duplicate(_)) => {
                debug!(seq, "Duplicate submission ignored");
                report.outcomes.push(BatchOutcome::Duplicate { batch: batch_id });
                report.held = self.sequencer.lock().await.held();
                return report;
            }
            Err(e) => {
                if e.is_rejection() {
                    debug!(seq, error = %e, "Submission rejected");
                } else {
                    warn!(seq, error = %e, "Submission could not be checked");
                }
                let mut guard = self.lock_sequencer().await;
                guard.forfeit(seq);
                report.outcomes.push(BatchOutcome::Rejected {
                    batch: batch_id,
                    reason: e.to_string(),
                });
                guard
            }
        };

        while let Some((_, slot)) = guard.pop_ready() {
            if let Slot::Ready(batch) = slot {
                report.outcomes.push(self.channel.apply(self.attempt, batch));
            }
        }
        report.held = guard.held();
        if report.held > 0 {
            debug!(held = report.held, next = guard.next(), "Batches waiting on a predecessor");
        }
        report
    }

    async fn lock_sequencer(&self) -> OwnedMutexGuard<Sequencer> {
        Arc::clone(&self.sequencer).lock_owned().await
    }
}
