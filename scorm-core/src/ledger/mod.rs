//! Append-only element ledger with SQLite storage
//!
//! Every key/value update an attempt sends is recorded as an [`Element`].
//! Values are never overwritten; the compactor may only re-encode a full
//! value as a diff against an earlier element of the same (attempt, key),
//! which leaves every element's materialized value unchanged.

mod error;
mod migrations;
mod sqlite;
mod store;
mod timeline;

pub use error::LedgerError;
pub use sqlite::SqliteLedger;
pub use store::{AttemptStore, Ledger};
pub use timeline::{DiffChain, Element, Timeline};

pub(crate) use timeline::apply_stored_diff;
