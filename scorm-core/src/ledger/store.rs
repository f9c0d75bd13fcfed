//! Storage traits for the element ledger and the attempt directory

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::LedgerError;
use super::timeline::{Element, Timeline};
use crate::types::{
    Attempt, AttemptId, AttemptStatus, ElementId, GradingMethod, Resource, ResourceId, UserId,
};

/// Append-only store of per-attempt key/value history
///
/// Writes are never retried here; a failed write is returned to the caller.
pub trait Ledger: Send + Sync {
    /// Record a full value. Each call is its own durable write.
    ///
    /// Timestamps are monotonic per (attempt, key): a `timestamp` at or before
    /// the latest recorded one is stored one microsecond after it instead.
    fn append(
        &self,
        attempt: AttemptId,
        key: &str,
        value: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Element, LedgerError>;

    /// Look up one element as stored (diffs are not materialized)
    fn element(&self, id: ElementId) -> Result<Option<Element>, LedgerError>;

    /// Every element recorded for (attempt, key), in ledger order
    fn elements(&self, attempt: AttemptId, key: &str) -> Result<Vec<Element>, LedgerError>;

    /// Materialized value of every key recorded for an attempt
    fn current_values(&self, attempt: AttemptId) -> Result<BTreeMap<String, String>, LedgerError>;

    /// Attempts with more than one full-value element for `key`, by attempt id
    fn candidates_for_compaction(&self, key: &str) -> Result<Vec<AttemptId>, LedgerError>;

    /// Re-encode a full-value element as a diff against `diff_of`.
    ///
    /// Returns `false` without writing if the element is already a diff or no
    /// longer holds `expected_value`.
    fn rewrite_as_diff(
        &self,
        element: ElementId,
        diff_of: ElementId,
        expected_value: &str,
        diff: &str,
    ) -> Result<bool, LedgerError>;

    /// Materialized value of the most recent element for (attempt, key)
    fn current(&self, attempt: AttemptId, key: &str) -> Result<Option<String>, LedgerError> {
        Timeline::new(self.elements(attempt, key)?).current()
    }
}

/// Attempts and the resources they belong to
pub trait AttemptStore: Send + Sync {
    fn create_resource(
        &self,
        title: &str,
        grading_method: GradingMethod,
    ) -> Result<Resource, LedgerError>;

    fn resource(&self, id: ResourceId) -> Result<Option<Resource>, LedgerError>;

    fn create_attempt(
        &self,
        resource: ResourceId,
        user: &UserId,
        created_at: DateTime<Utc>,
    ) -> Result<Attempt, LedgerError>;

    fn attempt(&self, id: AttemptId) -> Result<Option<Attempt>, LedgerError>;

    fn set_status(&self, id: AttemptId, status: AttemptStatus) -> Result<(), LedgerError>;

    /// Distinct users holding at least one attempt on the resource
    fn users_with_attempts(&self, resource: ResourceId) -> Result<Vec<UserId>, LedgerError>;

    /// A user's attempts on a resource, newest first
    fn attempts_for_user(
        &self,
        resource: ResourceId,
        user: &UserId,
    ) -> Result<Vec<Attempt>, LedgerError>;
}
