//! Task boundary for reporting work
//!
//! Each function here runs one reporting operation to completion and converts
//! its result into a [`TaskOutcome`]. Failures are logged and returned, never
//! propagated, and nothing is retried.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::{ExamCache, ReportingError, ReportingPipeline};
use crate::types::{AttemptId, ResourceId};

/// How a background task ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum TaskOutcome {
    Success,
    /// The external endpoint refused or could not be reached
    ReportingFailure(String),
    /// Anything else went wrong
    Failed(String),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<&ReportingError> for TaskOutcome {
    fn from(e: &ReportingError) -> Self {
        if e.is_transmission_failure() {
            Self::ReportingFailure(e.to_string())
        } else {
            Self::Failed(e.to_string())
        }
    }
}

pub async fn attempt_report_outcome(
    pipeline: &ReportingPipeline,
    attempt: AttemptId,
) -> TaskOutcome {
    match pipeline.report_outcome(attempt).await {
        Ok(_) => TaskOutcome::Success,
        Err(e) => {
            let outcome = TaskOutcome::from(&e);
            warn!(%attempt, error = %e, "report_outcome task failed");
            outcome
        }
    }
}

pub async fn resource_report_scores(
    pipeline: &ReportingPipeline,
    resource: ResourceId,
) -> TaskOutcome {
    match pipeline.report_scores(resource).await {
        Ok(summary) if summary.failed.is_empty() => TaskOutcome::Success,
        Ok(summary) => {
            let reason = format!(
                "{} of {} users not reported",
                summary.failed.len(),
                summary.users()
            );
            warn!(%resource, %reason, "report_scores task incomplete");
            TaskOutcome::ReportingFailure(reason)
        }
        Err(e) => {
            error!(%resource, error = %e, "report_scores task failed");
            TaskOutcome::from(&e)
        }
    }
}

pub async fn send_attempt_completion_receipt(
    pipeline: &ReportingPipeline,
    attempt: AttemptId,
) -> TaskOutcome {
    match pipeline.send_completion_receipt(attempt).await {
        Ok(()) => TaskOutcome::Success,
        Err(e) => {
            warn!(%attempt, error = %e, "completion receipt task failed");
            TaskOutcome::Failed(e.to_string())
        }
    }
}

pub async fn exam_update_cache(cache: &dyn ExamCache, link: &str) -> TaskOutcome {
    match cache.update_cache(link).await {
        Ok(()) => TaskOutcome::Success,
        Err(e) => {
            warn!(%link, error = %e, "update_cache task failed");
            TaskOutcome::Failed(e.to_string())
        }
    }
}

/// Spawns reporting tasks onto the tokio runtime
#[derive(Clone)]
pub struct TaskDispatcher {
    pipeline: Arc<ReportingPipeline>,
    cache: Arc<dyn ExamCache>,
}

impl TaskDispatcher {
    pub fn new(pipeline: Arc<ReportingPipeline>, cache: Arc<dyn ExamCache>) -> Self {
        Self { pipeline, cache }
    }

    pub fn pipeline(&self) -> &Arc<ReportingPipeline> {
        &self.pipeline
    }

    pub fn report_outcome(&self, attempt: AttemptId) -> JoinHandle<TaskOutcome> {
        let pipeline = Arc::clone(&self.pipeline);
        tokio::spawn(async move {
            let outcome = attempt_report_outcome(&pipeline, attempt).await;
            info!(%attempt, ?outcome, "report_outcome task finished");
            outcome
        })
    }

    pub fn report_scores(&self, resource: ResourceId) -> JoinHandle<TaskOutcome> {
        let pipeline = Arc::clone(&self.pipeline);
        tokio::spawn(async move {
            let outcome = resource_report_scores(&pipeline, resource).await;
            info!(%resource, ?outcome, "report_scores task finished");
            outcome
        })
    }

    pub fn send_completion_receipt(&self, attempt: AttemptId) -> JoinHandle<TaskOutcome> {
        let pipeline = Arc::clone(&self.pipeline);
        tokio::spawn(async move { send_attempt_completion_receipt(&pipeline, attempt).await })
    }

    pub fn update_cache(&self, link: String) -> JoinHandle<TaskOutcome> {
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move { exam_update_cache(cache.as_ref(), &link).await })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::ledger::{AttemptStore, SqliteLedger};
    use crate::reporting::{
        CacheError, GradeReporter, LoggingReceiptNotifier, OutcomeSubmission, ReceiptError,
        ReceiptNotifier,
    };
    use crate::types::{Attempt, GradingMethod, UserId};

    struct Unreachable;

    #[async_trait]
    impl GradeReporter for Unreachable {
        async fn transmit(&self, _: &OutcomeSubmission) -> Result<(), ReportingError> {
            Err(ReportingError::Unreachable("connection refused".into()))
        }
    }

    struct Accepting;

    #[async_trait]
    impl GradeReporter for Accepting {
        async fn transmit(&self, _: &OutcomeSubmission) -> Result<(), ReportingError> {
            Ok(())
        }
    }

    struct BrokenReceipts;

    #[async_trait]
    impl ReceiptNotifier for BrokenReceipts {
        async fn notify(&self, _: &Attempt) -> Result<(), ReceiptError> {
            Err(ReceiptError::Rejected(503))
        }
    }

    struct BrokenCache;

    #[async_trait]
    impl ExamCache for BrokenCache {
        async fn update_cache(&self, link: &str) -> Result<(), CacheError> {
            Err(CacheError::Fetch {
                link: link.to_string(),
                reason: "offline".into(),
            })
        }
    }

    fn dispatcher(
        grades: Arc<dyn GradeReporter>,
        receipts: Arc<dyn ReceiptNotifier>,
    ) -> (TaskDispatcher, AttemptId, ResourceId) {
        let store = Arc::new(SqliteLedger::open_in_memory().unwrap());
        let resource = store.create_resource("Quiz", GradingMethod::Last).unwrap();
        let attempt = store
            .create_attempt(resource.id, &UserId::new("alice"), Utc::now())
            .unwrap();
        let pipeline = Arc::new(ReportingPipeline::new(
            store.clone(),
            store,
            grades,
            receipts,
        ));
        (
            TaskDispatcher::new(pipeline, Arc::new(BrokenCache)),
            attempt.id,
            resource.id,
        )
    }

    #[tokio::test]
    async fn reporting_failure_is_contained() {
        let (tasks, attempt, resource) =
            dispatcher(Arc::new(Unreachable), Arc::new(LoggingReceiptNotifier));

        let outcome = tasks.report_outcome(attempt).await.unwrap();
        assert!(matches!(outcome, TaskOutcome::ReportingFailure(_)));

        let outcome = tasks.report_scores(resource).await.unwrap();
        assert_eq!(
            outcome,
            TaskOutcome::ReportingFailure("1 of 1 users not reported".into())
        );
    }

    #[tokio::test]
    async fn missing_attempt_is_a_plain_failure() {
        let (tasks, _, _) = dispatcher(Arc::new(Accepting), Arc::new(LoggingReceiptNotifier));
        let outcome = tasks.report_outcome(AttemptId(404)).await.unwrap();
        assert!(matches!(outcome, TaskOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn receipts_and_cache_fail_independently() {
        let (tasks, attempt, _) = dispatcher(Arc::new(Accepting), Arc::new(BrokenReceipts));

        assert!(tasks.report_outcome(attempt).await.unwrap().is_success());
        assert!(matches!(
            tasks.send_completion_receipt(attempt).await.unwrap(),
            TaskOutcome::Failed(_)
        ));
        assert!(matches!(
            tasks.update_cache("https://exams.example/1".into()).await.unwrap(),
            TaskOutcome::Failed(_)
        ));
    }
}
