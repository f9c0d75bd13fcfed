//! Outcome and score reporting operations

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::outcome::Outcome;
use super::{GradeReporter, OutcomeSubmission, ReceiptError, ReceiptNotifier, ReportingError};
use crate::ledger::{AttemptStore, Ledger};
use crate::model::{COMPLETION_STATUS, SCORE_SCALED, SUCCESS_STATUS};
use crate::types::{Attempt, AttemptId, GradingMethod, Resource, ResourceId, UserId};

const OUTCOME_KEYS: [&str; 3] = [SCORE_SCALED, COMPLETION_STATUS, SUCCESS_STATUS];

/// Result of reporting every user's score on a resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoresSummary {
    pub sent: Vec<UserId>,
    pub failed: Vec<(UserId, String)>,
}

impl ScoresSummary {
    pub fn users(&self) -> usize {
        self.sent.len() + self.failed.len()
    }
}

/// Reads ledger state and hands results to the reporting collaborators
///
/// Ledger reads finish before any collaborator call starts, so no store lock
/// is held across the network.
pub struct ReportingPipeline {
    ledger: Arc<dyn Ledger>,
    attempts: Arc<dyn AttemptStore>,
    grades: Arc<dyn GradeReporter>,
    receipts: Arc<dyn ReceiptNotifier>,
}

impl ReportingPipeline {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        attempts: Arc<dyn AttemptStore>,
        grades: Arc<dyn GradeReporter>,
        receipts: Arc<dyn ReceiptNotifier>,
    ) -> Self {
        Self {
            ledger,
            attempts,
            grades,
            receipts,
        }
    }

    /// Compute an attempt's outcome from its current data model
    ///
    /// Only the keys an outcome depends on are materialized.
    pub fn outcome(&self, attempt: AttemptId) -> Result<Outcome, ReportingError> {
        let mut values = BTreeMap::new();
        for key in OUTCOME_KEYS {
            if let Some(value) = self.ledger.current(attempt, key)? {
                values.insert(key.to_string(), value);
            }
        }
        Ok(Outcome::from_values(&values))
    }

    /// Compute and transmit one attempt's outcome
    #[instrument(skip(self))]
    pub async fn report_outcome(
        &self,
        attempt: AttemptId,
    ) -> Result<OutcomeSubmission, ReportingError> {
        let record = self
            .attempts
            .attempt(attempt)?
            .ok_or(ReportingError::AttemptNotFound(attempt))?;
        let outcome = self.outcome(attempt)?;

        let submission = OutcomeSubmission {
            attempt,
            resource: record.resource,
            user: record.user,
            score: outcome.score,
            completion_status: outcome.completion_status,
            success_status: outcome.success_status,
        };

        self.grades.transmit(&submission).await?;
        debug!(user = %submission.user, score = ?submission.score, "Outcome reported");
        Ok(submission)
    }

    /// Report the relevant attempt of every user with an attempt on `resource`
    ///
    /// One user's failure does not stop the others.
    #[instrument(skip(self))]
    pub async fn report_scores(
        &self,
        resource: ResourceId,
    ) -> Result<ScoresSummary, ReportingError> {
        let resource = self
            .attempts
            .resource(resource)?
            .ok_or(ReportingError::ResourceNotFound(resource))?;
        let users = self.attempts.users_with_attempts(resource.id)?;

        let mut summary = ScoresSummary::default();
        for user in users {
            let result = match self.relevant_attempt(&resource, &user) {
                Ok(Some(attempt)) => self.report_outcome(attempt.id).await.map(|_| ()),
                Ok(None) => continue,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => summary.sent.push(user),
                Err(e) => {
                    warn!(%user, error = %e, "Failed to report score");
                    summary.failed.push((user, e.to_string()));
                }
            }
        }

        info!(
            resource = %resource.id,
            sent = summary.sent.len(),
            failed = summary.failed.len(),
            "Scores reported"
        );
        Ok(summary)
    }

    /// The attempt whose outcome stands for `user` on `resource`
    pub fn relevant_attempt(
        &self,
        resource: &Resource,
        user: &UserId,
    ) -> Result<Option<Attempt>, ReportingError> {
        // Newest first, so the first maximum is the most recent among ties
        let attempts = self.attempts.attempts_for_user(resource.id, user)?;
        match resource.grading_method {
            GradingMethod::Last => Ok(attempts.into_iter().next()),
            GradingMethod::Highest => {
                let mut best: Option<(f64, Attempt)> = None;
                for attempt in attempts {
                    let rank = self.outcome(attempt.id)?.rank();
                    if best.as_ref().is_none_or(|(top, _)| rank > *top) {
                        best = Some((rank, attempt));
                    }
                }
                Ok(best.map(|(_, attempt)| attempt))
            }
        }
    }

    /// Notify the learner that an attempt was completed
    #[instrument(skip(self))]
    pub async fn send_completion_receipt(&self, attempt: AttemptId) -> Result<(), ReceiptError> {
        let record = self
            .attempts
            .attempt(attempt)?
            .ok_or(ReceiptError::AttemptNotFound(attempt))?;
        self.receipts.notify(&record).await?;
        debug!(user = %record.user, "Completion receipt sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::ledger::{Element, LedgerError, SqliteLedger};
    use crate::model::SUSPEND_DATA;
    use crate::types::ElementId;

    #[derive(Default)]
    struct RecordingReporter {
        sent: Mutex<Vec<OutcomeSubmission>>,
        reject_user: Option<UserId>,
    }

    #[async_trait]
    impl GradeReporter for RecordingReporter {
        async fn transmit(&self, submission: &OutcomeSubmission) -> Result<(), ReportingError> {
            if self.reject_user.as_ref() == Some(&submission.user) {
                return Err(ReportingError::Rejected {
                    status: 400,
                    body: "unknown user".into(),
                });
            }
            self.sent.lock().unwrap().push(submission.clone());
            Ok(())
        }
    }

    struct NoReceipts;

    #[async_trait]
    impl ReceiptNotifier for NoReceipts {
        async fn notify(&self, _attempt: &Attempt) -> Result<(), ReceiptError> {
            Ok(())
        }
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    struct Fixture {
        store: Arc<SqliteLedger>,
        reporter: Arc<RecordingReporter>,
        pipeline: ReportingPipeline,
    }

    fn fixture(reporter: RecordingReporter) -> Fixture {
        let store = Arc::new(SqliteLedger::open_in_memory().unwrap());
        let reporter = Arc::new(reporter);
        let pipeline = ReportingPipeline::new(
            store.clone(),
            store.clone(),
            reporter.clone(),
            Arc::new(NoReceipts),
        );
        Fixture {
            store,
            reporter,
            pipeline,
        }
    }

    fn scored_attempt(
        store: &SqliteLedger,
        resource: ResourceId,
        user: &str,
        created: i64,
        score: &str,
    ) -> AttemptId {
        let attempt = store
            .create_attempt(resource, &UserId::new(user), ts(created))
            .unwrap()
            .id;
        store
            .append(attempt, SCORE_SCALED, score, ts(created + 1))
            .unwrap();
        attempt
    }

    #[tokio::test]
    async fn highest_picks_best_score_and_newest_on_ties() {
        let f = fixture(RecordingReporter::default());
        let resource = f
            .store
            .create_resource("Quiz", GradingMethod::Highest)
            .unwrap();
        scored_attempt(&f.store, resource.id, "alice", 10, "0.4");
        scored_attempt(&f.store, resource.id, "alice", 20, "0.9");
        let newest_tie = scored_attempt(&f.store, resource.id, "alice", 30, "0.9");
        scored_attempt(&f.store, resource.id, "alice", 40, "0.1");

        let chosen = f
            .pipeline
            .relevant_attempt(&resource, &UserId::new("alice"))
            .unwrap()
            .unwrap();
        assert_eq!(chosen.id, newest_tie);
    }

    #[tokio::test]
    async fn last_picks_most_recent_attempt() {
        let f = fixture(RecordingReporter::default());
        let resource = f.store.create_resource("Quiz", GradingMethod::Last).unwrap();
        scored_attempt(&f.store, resource.id, "alice", 10, "0.9");
        let last = scored_attempt(&f.store, resource.id, "alice", 20, "0.2");

        let chosen = f
            .pipeline
            .relevant_attempt(&resource, &UserId::new("alice"))
            .unwrap()
            .unwrap();
        assert_eq!(chosen.id, last);
    }

    #[tokio::test]
    async fn report_scores_sends_once_per_user_and_survives_failures() {
        let f = fixture(RecordingReporter {
            reject_user: Some(UserId::new("bob")),
            ..RecordingReporter::default()
        });
        let resource = f
            .store
            .create_resource("Quiz", GradingMethod::Highest)
            .unwrap();
        scored_attempt(&f.store, resource.id, "alice", 1, "0.5");
        scored_attempt(&f.store, resource.id, "alice", 2, "0.7");
        scored_attempt(&f.store, resource.id, "bob", 3, "0.3");
        scored_attempt(&f.store, resource.id, "carol", 4, "1.0");

        let summary = f.pipeline.report_scores(resource.id).await.unwrap();

        assert_eq!(summary.users(), 3);
        assert_eq!(summary.sent, vec![UserId::new("alice"), UserId::new("carol")]);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, UserId::new("bob"));

        let sent = f.reporter.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].score, Some(0.7));
    }

    /// Ledger that refuses to read suspend data or whole attempts
    struct OutcomeKeysOnly(Arc<SqliteLedger>);

    impl Ledger for OutcomeKeysOnly {
        fn append(
            &self,
            attempt: AttemptId,
            key: &str,
            value: &str,
            timestamp: DateTime<Utc>,
        ) -> Result<Element, LedgerError> {
            self.0.append(attempt, key, value, timestamp)
        }

        fn element(&self, id: ElementId) -> Result<Option<Element>, LedgerError> {
            self.0.element(id)
        }

        fn elements(&self, attempt: AttemptId, key: &str) -> Result<Vec<Element>, LedgerError> {
            if key == SUSPEND_DATA {
                return Err(LedgerError::InvalidData("suspend data read".into()));
            }
            self.0.elements(attempt, key)
        }

        fn current_values(
            &self,
            _attempt: AttemptId,
        ) -> Result<std::collections::BTreeMap<String, String>, LedgerError> {
            Err(LedgerError::InvalidData("full attempt read".into()))
        }

        fn candidates_for_compaction(&self, key: &str) -> Result<Vec<AttemptId>, LedgerError> {
            self.0.candidates_for_compaction(key)
        }

        fn rewrite_as_diff(
            &self,
            element: ElementId,
            diff_of: ElementId,
            expected_value: &str,
            diff: &str,
        ) -> Result<bool, LedgerError> {
            self.0.rewrite_as_diff(element, diff_of, expected_value, diff)
        }
    }

    #[tokio::test]
    async fn outcome_reads_only_outcome_keys() {
        let store = Arc::new(SqliteLedger::open_in_memory().unwrap());
        let resource = store.create_resource("Quiz", GradingMethod::Highest).unwrap();
        let attempt = scored_attempt(&store, resource.id, "alice", 1, "0.8");
        for i in 0..5 {
            let state = format!("{}{}", "x".repeat(4096), i);
            store.append(attempt, SUSPEND_DATA, &state, ts(10 + i)).unwrap();
        }
        store.append(attempt, COMPLETION_STATUS, "completed", ts(20)).unwrap();

        let pipeline = ReportingPipeline::new(
            Arc::new(OutcomeKeysOnly(store.clone())),
            store,
            Arc::new(RecordingReporter::default()),
            Arc::new(NoReceipts),
        );
        let outcome = pipeline.outcome(attempt).unwrap();

        assert_eq!(outcome.score, Some(0.8));
        assert_eq!(outcome.completion_status, crate::model::CompletionStatus::Completed);
    }

    #[tokio::test]
    async fn report_outcome_for_unknown_attempt_fails() {
        let f = fixture(RecordingReporter::default());
        let err = f.pipeline.report_outcome(AttemptId(99)).await.unwrap_err();
        assert!(matches!(err, ReportingError::AttemptNotFound(AttemptId(99))));
        assert!(!err.is_transmission_failure());
    }
}
