//! SQLite-backed ledger and attempt store

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::migrations::Migrator;
use super::store::{AttemptStore, Ledger};
use super::timeline::{Element, Timeline};
use super::LedgerError;
use crate::types::{
    Attempt, AttemptId, AttemptStatus, ElementId, GradingMethod, Resource, ResourceId, UserId,
};

const ELEMENT_COLUMNS: &str = "id, attempt_id, key, value, timestamp, diff_of";
const ATTEMPT_COLUMNS: &str = "id, resource_id, user_id, status, created_at";

/// SQLite-backed ledger; one connection shared behind a mutex
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    /// Open or create database at path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(journal_mode = %mode, "opened ledger database");
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::from_connection(conn)
    }

    /// Open in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, LedgerError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Migrator::new(&conn).migrate()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, LedgerError> {
        self.conn.lock().map_err(|_| LedgerError::Poisoned)
    }

    fn query_elements(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Element>, LedgerError> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, ElementRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(Element::try_from).collect()
    }

    fn query_attempts(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Attempt>, LedgerError> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, AttemptRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(Attempt::try_from).collect()
    }
}

impl Ledger for SqliteLedger {
    fn append(
        &self,
        attempt: AttemptId,
        key: &str,
        value: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Element, LedgerError> {
        let conn = self.conn()?;
        let latest: Option<i64> = conn.query_row(
            "SELECT MAX(timestamp) FROM elements WHERE attempt_id = ?1 AND key = ?2",
            params![attempt.0, key],
            |row| row.get(0),
        )?;
        // Ledger order follows arrival even if the clock steps backwards
        let micros = match latest {
            Some(latest) => timestamp.timestamp_micros().max(latest.saturating_add(1)),
            None => timestamp.timestamp_micros(),
        };
        conn.execute(
            "INSERT INTO elements (attempt_id, key, value, timestamp, diff_of)
             VALUES (?1, ?2, ?3, ?4, NULL)",
            params![attempt.0, key, value, micros],
        )?;
        Ok(Element {
            id: ElementId(conn.last_insert_rowid()),
            attempt,
            key: key.to_string(),
            value: value.to_string(),
            timestamp: parse_micros(micros)?,
            diff_of: None,
        })
    }

    fn element(&self, id: ElementId) -> Result<Option<Element>, LedgerError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {ELEMENT_COLUMNS} FROM elements WHERE id = ?1");
        Self::query_elements(&conn, &sql, [id.0]).map(|mut found| found.pop())
    }

    fn elements(&self, attempt: AttemptId, key: &str) -> Result<Vec<Element>, LedgerError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {ELEMENT_COLUMNS} FROM elements
             WHERE attempt_id = ?1 AND key = ?2
             ORDER BY timestamp, id"
        );
        Self::query_elements(&conn, &sql, params![attempt.0, key])
    }

    fn current_values(&self, attempt: AttemptId) -> Result<BTreeMap<String, String>, LedgerError> {
        let elements = {
            let conn = self.conn()?;
            let sql = format!(
                "SELECT {ELEMENT_COLUMNS} FROM elements
                 WHERE attempt_id = ?1
                 ORDER BY key, timestamp, id"
            );
            Self::query_elements(&conn, &sql, [attempt.0])?
        };

        let mut by_key: BTreeMap<String, Vec<Element>> = BTreeMap::new();
        for element in elements {
            by_key.entry(element.key.clone()).or_default().push(element);
        }

        let mut values = BTreeMap::new();
        for (key, history) in by_key {
            if let Some(value) = Timeline::new(history).current()? {
                values.insert(key, value);
            }
        }
        Ok(values)
    }

    fn candidates_for_compaction(&self, key: &str) -> Result<Vec<AttemptId>, LedgerError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT attempt_id FROM elements
             WHERE key = ?1 AND diff_of IS NULL
             GROUP BY attempt_id
             HAVING COUNT(*) > 1
             ORDER BY attempt_id",
        )?;
        let ids = stmt
            .query_map([key], |row| row.get::<_, i64>(0))?
            .map(|id| id.map(AttemptId))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn rewrite_as_diff(
        &self,
        element: ElementId,
        diff_of: ElementId,
        expected_value: &str,
        diff: &str,
    ) -> Result<bool, LedgerError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE elements SET value = ?1, diff_of = ?2
             WHERE id = ?3
               AND diff_of IS NULL
               AND value = ?4
               AND EXISTS (
                   SELECT 1 FROM elements AS base
                   WHERE base.id = ?2
                     AND base.id != elements.id
                     AND base.attempt_id = elements.attempt_id
                     AND base.key = elements.key
               )",
            params![diff, diff_of.0, element.0, expected_value],
        )?;
        Ok(changed == 1)
    }
}

impl AttemptStore for SqliteLedger {
    fn create_resource(
        &self,
        title: &str,
        grading_method: GradingMethod,
    ) -> Result<Resource, LedgerError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO resources (title, grading_method) VALUES (?1, ?2)",
            params![title, grading_method.as_str()],
        )?;
        Ok(Resource {
            id: ResourceId(conn.last_insert_rowid()),
            title: title.to_string(),
            grading_method,
        })
    }

    fn resource(&self, id: ResourceId) -> Result<Option<Resource>, LedgerError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, title, grading_method FROM resources WHERE id = ?1",
                [id.0],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, title, method)| {
            let grading_method = GradingMethod::parse(&method).ok_or_else(|| {
                LedgerError::InvalidData(format!("invalid grading method: {}", method))
            })?;
            Ok(Resource {
                id: ResourceId(id),
                title,
                grading_method,
            })
        })
        .transpose()
    }

    fn create_attempt(
        &self,
        resource: ResourceId,
        user: &UserId,
        created_at: DateTime<Utc>,
    ) -> Result<Attempt, LedgerError> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM resources WHERE id = ?1)",
            [resource.0],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(LedgerError::ResourceNotFound(resource));
        }

        conn.execute(
            "INSERT INTO attempts (resource_id, user_id, status, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                resource.0,
                user.as_str(),
                AttemptStatus::InProgress.as_str(),
                created_at.timestamp_micros()
            ],
        )?;
        Ok(Attempt {
            id: AttemptId(conn.last_insert_rowid()),
            resource,
            user: user.clone(),
            status: AttemptStatus::InProgress,
            created_at,
        })
    }

    fn attempt(&self, id: AttemptId) -> Result<Option<Attempt>, LedgerError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE id = ?1");
        Self::query_attempts(&conn, &sql, [id.0]).map(|mut found| found.pop())
    }

    fn set_status(&self, id: AttemptId, status: AttemptStatus) -> Result<(), LedgerError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE attempts SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id.0],
        )?;
        if changed == 0 {
            return Err(LedgerError::AttemptNotFound(id));
        }
        Ok(())
    }

    fn users_with_attempts(&self, resource: ResourceId) -> Result<Vec<UserId>, LedgerError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT user_id FROM attempts WHERE resource_id = ?1 ORDER BY user_id",
        )?;
        let users = stmt
            .query_map([resource.0], |row| row.get::<_, String>(0))?
            .map(|user| user.map(UserId))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    fn attempts_for_user(
        &self,
        resource: ResourceId,
        user: &UserId,
    ) -> Result<Vec<Attempt>, LedgerError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts
             WHERE resource_id = ?1 AND user_id = ?2
             ORDER BY created_at DESC, id DESC"
        );
        Self::query_attempts(&conn, &sql, params![resource.0, user.as_str()])
    }
}

fn parse_micros(micros: i64) -> Result<DateTime<Utc>, LedgerError> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| LedgerError::InvalidData(format!("invalid timestamp: {}", micros)))
}

/// Raw element columns, converted after the statement is done
struct ElementRow {
    id: i64,
    attempt_id: i64,
    key: String,
    value: String,
    timestamp: i64,
    diff_of: Option<i64>,
}

impl ElementRow {
    fn from_row(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            attempt_id: row.get(1)?,
            key: row.get(2)?,
            value: row.get(3)?,
            timestamp: row.get(4)?,
            diff_of: row.get(5)?,
        })
    }
}

impl TryFrom<ElementRow> for Element {
    type Error = LedgerError;

    fn try_from(row: ElementRow) -> Result<Self, Self::Error> {
        Ok(Element {
            id: ElementId(row.id),
            attempt: AttemptId(row.attempt_id),
            key: row.key,
            value: row.value,
            timestamp: parse_micros(row.timestamp)?,
            diff_of: row.diff_of.map(ElementId),
        })
    }
}

struct AttemptRow {
    id: i64,
    resource_id: i64,
    user_id: String,
    status: String,
    created_at: i64,
}

impl AttemptRow {
    fn from_row(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            resource_id: row.get(1)?,
            user_id: row.get(2)?,
            status: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

impl TryFrom<AttemptRow> for Attempt {
    type Error = LedgerError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        let status = AttemptStatus::parse(&row.status)
            .ok_or_else(|| LedgerError::InvalidData(format!("invalid status: {}", row.status)))?;
        Ok(Attempt {
            id: AttemptId(row.id),
            resource: ResourceId(row.resource_id),
            user: UserId(row.user_id),
            status,
            created_at: parse_micros(row.created_at)?,
        })
    }
}
