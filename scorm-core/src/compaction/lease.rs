//! Exclusive per-attempt claims

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::types::AttemptId;

/// Set of attempts currently claimed by a compaction worker
#[derive(Debug, Clone, Default)]
pub struct Leases {
    held: Arc<Mutex<HashSet<AttemptId>>>,
}

impl Leases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim an attempt, or `None` if someone else holds it
    pub fn try_acquire(&self, attempt: AttemptId) -> Option<Lease> {
        let mut held = self.held.lock().ok()?;
        if !held.insert(attempt) {
            return None;
        }
        Some(Lease {
            attempt,
            held: Arc::clone(&self.held),
        })
    }

    pub fn is_held(&self, attempt: AttemptId) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(&attempt))
            .unwrap_or(false)
    }
}

/// A held claim, released on drop
#[derive(Debug)]
pub struct Lease {
    attempt: AttemptId,
    held: Arc<Mutex<HashSet<AttemptId>>>,
}

impl Lease {
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Ok(mut held) = self.held.lock() {
            held.remove(&self.attempt);
        }
    }
}
