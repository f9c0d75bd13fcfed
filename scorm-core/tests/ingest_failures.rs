//! Ingest behaviour when ledger writes fail partway through a batch

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use scorm_core::ingest::ScormElement;
use scorm_core::{
    AttemptEvents, AttemptId, AttemptStore, Batch, BatchId, BatchOutcome, Element, ElementId,
    GradingMethod, IngestChannel, Ledger, LedgerError, ManualClock, Principal, SqliteLedger,
    UserId,
};

/// Fails the `fail_on`-th append (counting from zero), passes everything else through
struct FlakyLedger {
    inner: Arc<SqliteLedger>,
    appends: AtomicUsize,
    fail_on: usize,
}

impl Ledger for FlakyLedger {
    fn append(
        &self,
        attempt: AttemptId,
        key: &str,
        value: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Element, LedgerError> {
        if self.appends.fetch_add(1, Ordering::SeqCst) == self.fail_on {
            return Err(LedgerError::InvalidData("disk full".into()));
        }
        self.inner.append(attempt, key, value, timestamp)
    }

    fn element(&self, id: ElementId) -> Result<Option<Element>, LedgerError> {
        self.inner.element(id)
    }

    fn elements(&self, attempt: AttemptId, key: &str) -> Result<Vec<Element>, LedgerError> {
        self.inner.elements(attempt, key)
    }

    fn current_values(&self, attempt: AttemptId) -> Result<BTreeMap<String, String>, LedgerError> {
        self.inner.current_values(attempt)
    }

    fn candidates_for_compaction(&self, key: &str) -> Result<Vec<AttemptId>, LedgerError> {
        self.inner.candidates_for_compaction(key)
    }

    fn rewrite_as_diff(
        &self,
        element: ElementId,
        diff_of: ElementId,
        expected_value: &str,
        diff: &str,
    ) -> Result<bool, LedgerError> {
        self.inner
            .rewrite_as_diff(element, diff_of, expected_value, diff)
    }
}

#[tokio::test]
async fn failed_write_leaves_prefix_and_connection_continues() {
    let store = Arc::new(SqliteLedger::open_in_memory().unwrap());
    let resource = store.create_resource("Quiz", GradingMethod::Highest).unwrap();
    let attempt = store
        .create_attempt(resource.id, &UserId::new("alice"), Utc::now())
        .unwrap()
        .id;
    let ledger = Arc::new(FlakyLedger {
        inner: store.clone(),
        appends: AtomicUsize::new(0),
        fail_on: 2,
    });
    let channel = Arc::new(IngestChannel::new(
        ledger,
        store.clone(),
        Arc::new(ManualClock::at_epoch()),
        AttemptEvents::default(),
    ));
    let conn = channel.connect(
        Principal::User {
            user: UserId::new("alice"),
        },
        attempt,
    );

    let report = conn
        .submit(Batch::new(
            1,
            vec![
                ScormElement::new("k1", "a"),
                ScormElement::new("k2", "b"),
                ScormElement::new("k3", "c"),
                ScormElement::new("k4", "d"),
            ],
        ))
        .await;
    assert!(matches!(
        report.outcomes.as_slice(),
        [BatchOutcome::Failed { batch: BatchId(1), written: 2, .. }]
    ));

    let values = store.current_values(attempt).unwrap();
    assert_eq!(values.keys().cloned().collect::<Vec<_>>(), vec!["k1", "k2"]);

    let report = conn
        .submit(Batch::new(2, vec![ScormElement::new("k3", "c")]))
        .await;
    assert_eq!(
        report.outcomes,
        vec![BatchOutcome::Applied {
            batch: BatchId(2),
            written: 1
        }]
    );
    assert_eq!(store.current(attempt, "k3").unwrap().as_deref(), Some("c"));
}
