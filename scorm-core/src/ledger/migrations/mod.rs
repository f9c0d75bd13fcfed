//! Schema migrations for the ledger database

use rusqlite::Connection;

use crate::ledger::LedgerError;

/// SQL for each migration version
const MIGRATIONS: &[(&str, &str)] = &[
    ("v001_initial", include_str!("v001_initial.sql")),
    ("v002_undiffed_index", include_str!("v002_undiffed_index.sql")),
];

/// Runs database migrations, tracking progress in `PRAGMA user_version`
pub struct Migrator<'a> {
    conn: &'a Connection,
}

impl<'a> Migrator<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Get current schema version
    pub fn current_version(&self) -> Result<i32, LedgerError> {
        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        Ok(version)
    }

    fn set_version(&self, version: i32) -> Result<(), LedgerError> {
        self.conn.pragma_update(None, "user_version", version)?;
        Ok(())
    }

    /// Run all pending migrations
    pub fn migrate(&self) -> Result<(), LedgerError> {
        let current = self.current_version()?;

        for (idx, (name, sql)) in MIGRATIONS.iter().enumerate() {
            let version = (idx + 1) as i32;
            if version > current {
                tracing::info!("Running ledger migration {}: {}", version, name);
                self.conn
                    .execute_batch(sql)
                    .map_err(|e| LedgerError::Migration(format!("{}: {}", name, e)))?;
                self.set_version(version)?;
            }
        }

        Ok(())
    }

    /// Latest schema version
    pub fn target_version(&self) -> i32 {
        MIGRATIONS.len() as i32
    }
}
