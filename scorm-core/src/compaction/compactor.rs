//! The compaction pass

use std::sync::{Arc, Mutex, TryLockError};

use tracing::{debug, error, info, instrument, warn};

use super::lease::Leases;
use super::{CompactionConfig, CompactionError, CompactionReport};
use crate::clock::Clock;
use crate::diff::{compose, diff};
use crate::ledger::{Ledger, Timeline, apply_stored_diff};
use crate::types::{AttemptId, ElementId};

/// Result of compacting one attempt
#[derive(Debug, Default)]
struct AttemptCompaction {
    rewritten: usize,
    bytes_saved: i64,
}

/// Rewrites redundant full values of one field as diffs
pub struct Compactor {
    ledger: Arc<dyn Ledger>,
    clock: Arc<dyn Clock>,
    config: CompactionConfig,
    leases: Leases,
    running: Mutex<()>,
}

impl Compactor {
    pub fn new(ledger: Arc<dyn Ledger>, clock: Arc<dyn Clock>, config: CompactionConfig) -> Self {
        Self {
            ledger,
            clock,
            config,
            leases: Leases::new(),
            running: Mutex::new(()),
        }
    }

    /// Share a lease set with other workers
    #[must_use]
    pub fn with_leases(mut self, leases: Leases) -> Self {
        self.leases = leases;
        self
    }

    pub fn config(&self) -> &CompactionConfig {
        &self.config
    }

    pub fn leases(&self) -> &Leases {
        &self.leases
    }

    /// Run one pass over every current candidate
    ///
    /// Returns immediately with a skipped report if another pass is running.
    /// The budget is checked before each candidate, so one long attempt can
    /// overrun it.
    #[instrument(skip(self), fields(field = %self.config.field))]
    pub fn run_compaction_pass(&self) -> Result<CompactionReport, CompactionError> {
        let _running = match self.running.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                debug!("Compaction pass already running, skipping");
                return Ok(CompactionReport::skipped());
            }
            Err(TryLockError::Poisoned(poisoned)) => {
                // The guard holds no data, so the lock is safe to reuse
                error!("Previous compaction pass panicked, recovering pass lock");
                let guard = poisoned.into_inner();
                self.running.clear_poison();
                guard
            }
        };

        let budget = chrono::Duration::from_std(self.config.budget)
            .unwrap_or(chrono::Duration::MAX);
        let started = self.clock.now();
        let candidates = self.ledger.candidates_for_compaction(&self.config.field)?;
        let mut report = CompactionReport::default();

        for attempt in candidates {
            if self.clock.now() - started > budget {
                info!(examined = report.examined, "Compaction budget exhausted");
                report.budget_exhausted = true;
                break;
            }

            let Some(_lease) = self.leases.try_acquire(attempt) else {
                debug!(%attempt, "Attempt leased elsewhere, skipping");
                report.leased += 1;
                continue;
            };

            report.examined += 1;
            match self.compact_attempt(attempt) {
                Ok(done) => {
                    if done.rewritten > 0 {
                        report.compacted += 1;
                    }
                    report.rewritten += done.rewritten;
                    report.bytes_saved += done.bytes_saved;
                }
                Err(e) => {
                    warn!(%attempt, error = %e, "Compaction failed for attempt");
                    report.failed += 1;
                }
            }
        }

        info!(
            examined = report.examined,
            compacted = report.compacted,
            rewritten = report.rewritten,
            failed = report.failed,
            leased = report.leased,
            bytes_saved = report.bytes_saved,
            "Compaction pass finished"
        );
        Ok(report)
    }

    /// Walk one attempt's timeline, diffing each full value after the first
    /// against the value immediately before it
    fn compact_attempt(&self, attempt: AttemptId) -> Result<AttemptCompaction, CompactionError> {
        let timeline = Timeline::new(self.ledger.elements(attempt, &self.config.field)?);
        let mut done = AttemptCompaction::default();
        let mut previous: Option<(ElementId, String)> = None;
        let mut seen_base = false;

        for element in timeline.elements() {
            let value = match (element.diff_of, &previous) {
                (None, _) => element.value.clone(),
                (Some(base), Some((prev_id, prev_value))) if base == *prev_id => {
                    apply_stored_diff(element, prev_value)?
                }
                (Some(_), _) => timeline.materialize(element.id)?,
            };

            if !element.is_diff() {
                if let (true, Some((prev_id, prev_value))) = (seen_base, &previous) {
                    let patch = diff(prev_value, &value);
                    let rebuilt = compose(&patch, prev_value).map_err(|source| {
                        CompactionError::Diff {
                            element: element.id,
                            source,
                        }
                    })?;
                    if rebuilt != value {
                        return Err(CompactionError::Verification {
                            element: element.id,
                        });
                    }

                    let encoded = patch.encode();
                    if self
                        .ledger
                        .rewrite_as_diff(element.id, *prev_id, &value, &encoded)?
                    {
                        done.rewritten += 1;
                        done.bytes_saved += value.len() as i64 - encoded.len() as i64;
                    } else {
                        debug!(%attempt, element = %element.id, "Element changed underneath, left as is");
                    }
                }
                seen_base = true;
            }

            previous = Some((element.id, value));
        }

        if done.rewritten > 0 {
            debug!(%attempt, rewritten = done.rewritten, "Attempt compacted");
        }
        Ok(done)
    }
}
