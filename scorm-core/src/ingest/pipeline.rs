//! Middleware stages every submission passes through before it is applied
//!
//! Each stage takes the [`IngestContext`] by value and hands it back, possibly
//! enriched, or refuses the submission with an [`IngestError`]. The standard
//! pipeline is `Authenticate` → `AuthorizeAttemptOwner` → `EnforceSequence`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use super::batch::Batch;
use super::error::IngestError;
use super::sequencer::Sequencer;
use crate::auth::Principal;
use crate::ledger::AttemptStore;
use crate::types::{Attempt, AttemptId, UserId};

/// Identifies one client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State carried through the pipeline for one submission
#[derive(Debug)]
pub struct IngestContext {
    pub connection: ConnectionId,
    pub seq: u64,
    pub principal: Principal,
    pub attempt: AttemptId,
    pub batch: Batch,
    /// Set by `Authenticate`
    pub user: Option<UserId>,
    /// Set by `AuthorizeAttemptOwner`
    pub attempt_record: Option<Attempt>,
    pub(crate) sequencer: Arc<Mutex<Sequencer>>,
    /// Set by `EnforceSequence`; held until the batch is applied
    pub(crate) sequence_guard: Option<OwnedMutexGuard<Sequencer>>,
}

impl IngestContext {
    pub(crate) fn new(
        connection: ConnectionId,
        seq: u64,
        principal: Principal,
        attempt: AttemptId,
        batch: Batch,
        sequencer: Arc<Mutex<Sequencer>>,
    ) -> Self {
        Self {
            connection,
            seq,
            principal,
            attempt,
            batch,
            user: None,
            attempt_record: None,
            sequencer,
            sequence_guard: None,
        }
    }
}

/// One step of the ingest pipeline
#[async_trait]
pub trait IngestStage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn process(&self, ctx: IngestContext) -> Result<IngestContext, IngestError>;
}

/// Requires an authenticated session
pub struct Authenticate;

#[async_trait]
impl IngestStage for Authenticate {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    async fn process(&self, mut ctx: IngestContext) -> Result<IngestContext, IngestError> {
        let user = ctx
            .principal
            .user()
            .cloned()
            .ok_or(IngestError::Unauthenticated)?;
        ctx.user = Some(user);
        Ok(ctx)
    }
}

/// Requires the session user to own the target attempt
pub struct AuthorizeAttemptOwner {
    attempts: Arc<dyn AttemptStore>,
}

impl AuthorizeAttemptOwner {
    pub fn new(attempts: Arc<dyn AttemptStore>) -> Self {
        Self { attempts }
    }
}

#[async_trait]
impl IngestStage for AuthorizeAttemptOwner {
    fn name(&self) -> &'static str {
        "authorize_attempt_owner"
    }

    async fn process(&self, mut ctx: IngestContext) -> Result<IngestContext, IngestError> {
        let user = ctx.user.as_ref().ok_or(IngestError::Unauthenticated)?;
        let attempt = self
            .attempts
            .attempt(ctx.attempt)?
            .ok_or(IngestError::AttemptNotFound(ctx.attempt))?;

        if !attempt.is_owned_by(user) {
            return Err(IngestError::NotOwner(ctx.attempt));
        }

        ctx.attempt_record = Some(attempt);
        Ok(ctx)
    }
}

/// Claims the connection's sequencer and refuses consumed slots
pub struct EnforceSequence;

#[async_trait]
impl IngestStage for EnforceSequence {
    fn name(&self) -> &'static str {
        "enforce_sequence"
    }

    async fn process(&self, mut ctx: IngestContext) -> Result<IngestContext, IngestError> {
        let guard = ctx.sequencer.clone().lock_owned().await;
        if guard.is_consumed(ctx.seq) {
            return Err(IngestError::Duplicate(ctx.seq));
        }
        ctx.sequence_guard = Some(guard);
        Ok(ctx)
    }
}

/// Ordered list of stages
#[derive(Clone, Default)]
pub struct IngestPipeline {
    stages: Vec<Arc<dyn IngestStage>>,
}

impl IngestPipeline {
    /// An empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// `Authenticate` → `AuthorizeAttemptOwner` → `EnforceSequence`
    pub fn standard(attempts: Arc<dyn AttemptStore>) -> Self {
        Self::new()
            .with_stage(Authenticate)
            .with_stage(AuthorizeAttemptOwner::new(attempts))
            .with_stage(EnforceSequence)
    }

    #[must_use]
    pub fn with_stage(mut self, stage: impl IngestStage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order, stopping at the first refusal
    pub async fn run(&self, mut ctx: IngestContext) -> Result<IngestContext, IngestError> {
        for stage in &self.stages {
            let (connection, seq) = (ctx.connection, ctx.seq);
            ctx = stage.process(ctx).await.inspect_err(|e| {
                debug!(%connection, seq, stage = stage.name(), error = %e, "Submission refused");
            })?;
        }
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::ledger::SqliteLedger;
    use crate::types::GradingMethod;

    fn context(principal: Principal, attempt: AttemptId, seq: u64) -> IngestContext {
        IngestContext::new(
            ConnectionId::new(),
            seq,
            principal,
            attempt,
            Batch::new(seq, Vec::new()),
            Arc::new(Mutex::new(Sequencer::new())),
        )
    }

    fn alice() -> Principal {
        Principal::User {
            user: UserId::new("alice"),
        }
    }

    #[tokio::test]
    async fn authenticate_refuses_anonymous() {
        let err = Authenticate
            .process(context(Principal::Anonymous, AttemptId(1), 0))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Unauthenticated));
    }

    #[tokio::test]
    async fn standard_pipeline_admits_owner() {
        let store = Arc::new(SqliteLedger::open_in_memory().unwrap());
        let resource = store.create_resource("Quiz", GradingMethod::Highest).unwrap();
        let attempt = store
            .create_attempt(resource.id, &UserId::new("alice"), Utc::now())
            .unwrap();

        let pipeline = IngestPipeline::standard(store);
        assert_eq!(
            pipeline.stage_names(),
            vec!["authenticate", "authorize_attempt_owner", "enforce_sequence"]
        );

        let ctx = pipeline.run(context(alice(), attempt.id, 0)).await.unwrap();
        assert_eq!(ctx.user, Some(UserId::new("alice")));
        assert_eq!(ctx.attempt_record.map(|a| a.id), Some(attempt.id));
        assert!(ctx.sequence_guard.is_some());
    }

    #[tokio::test]
    async fn standard_pipeline_refuses_other_users_attempt() {
        let store = Arc::new(SqliteLedger::open_in_memory().unwrap());
        let resource = store.create_resource("Quiz", GradingMethod::Last).unwrap();
        let attempt = store
            .create_attempt(resource.id, &UserId::new("bob"), Utc::now())
            .unwrap();

        let err = IngestPipeline::standard(store)
            .run(context(alice(), attempt.id, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::NotOwner(id) if id == attempt.id));
    }

    #[tokio::test]
    async fn standard_pipeline_refuses_unknown_attempt() {
        let store = Arc::new(SqliteLedger::open_in_memory().unwrap());
        let err = IngestPipeline::standard(store)
            .run(context(alice(), AttemptId(404), 0))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::AttemptNotFound(AttemptId(404))));
    }

    #[tokio::test]
    async fn enforce_sequence_refuses_consumed_slot() {
        let ctx = context(alice(), AttemptId(1), 0);
        ctx.sequencer.lock().await.forfeit(0);

        let err = EnforceSequence.process(ctx).await.unwrap_err();
        assert!(matches!(err, IngestError::Duplicate(0)));
    }
}
