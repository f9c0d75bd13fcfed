//! HTTP and logging implementations of the reporting collaborators

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{GradeReporter, OutcomeSubmission, ReceiptError, ReceiptNotifier, ReportingError};
use crate::types::{Attempt, AttemptId, ResourceId, UserId};

fn client_with_timeout(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Posts outcome submissions as JSON
pub struct HttpGradeReporter {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpGradeReporter {
    /// Requests that take longer than `timeout` fail with [`ReportingError::Timeout`]
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http_client: client_with_timeout(timeout),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl GradeReporter for HttpGradeReporter {
    async fn transmit(&self, submission: &OutcomeSubmission) -> Result<(), ReportingError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(submission)
            .send()
            .await
            .map_err(ReportingError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReportingError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(attempt = %submission.attempt, endpoint = %self.endpoint, "Outcome transmitted");
        Ok(())
    }
}

/// Body of a completion receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptPayload {
    pub attempt: AttemptId,
    pub resource: ResourceId,
    pub user: UserId,
    pub started_at: DateTime<Utc>,
}

impl From<&Attempt> for ReceiptPayload {
    fn from(attempt: &Attempt) -> Self {
        Self {
            attempt: attempt.id,
            resource: attempt.resource,
            user: attempt.user.clone(),
            started_at: attempt.created_at,
        }
    }
}

/// Posts completion receipts as JSON
pub struct HttpReceiptNotifier {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpReceiptNotifier {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http_client: client_with_timeout(timeout),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ReceiptNotifier for HttpReceiptNotifier {
    async fn notify(&self, attempt: &Attempt) -> Result<(), ReceiptError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&ReceiptPayload::from(attempt))
            .send()
            .await
            .map_err(|e| ReceiptError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ReceiptError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Logs outcomes instead of sending them, for deployments without a grade endpoint
#[derive(Debug, Default)]
pub struct LoggingGradeReporter;

#[async_trait]
impl GradeReporter for LoggingGradeReporter {
    async fn transmit(&self, submission: &OutcomeSubmission) -> Result<(), ReportingError> {
        info!(
            attempt = %submission.attempt,
            user = %submission.user,
            score = ?submission.score,
            completion = submission.completion_status.as_str(),
            "No grade endpoint configured, outcome not sent"
        );
        Ok(())
    }
}

/// Logs receipts instead of sending them
#[derive(Debug, Default)]
pub struct LoggingReceiptNotifier;

#[async_trait]
impl ReceiptNotifier for LoggingReceiptNotifier {
    async fn notify(&self, attempt: &Attempt) -> Result<(), ReceiptError> {
        info!(attempt = %attempt.id, user = %attempt.user, "No receipt endpoint configured, receipt not sent");
        Ok(())
    }
}
