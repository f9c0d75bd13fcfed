pub mod cache;
pub mod compact;
pub mod config;
pub mod report;
pub mod serve;
pub mod show;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use scorm_core::reporting::{
    HttpExamCache, HttpGradeReporter, HttpReceiptNotifier, LoggingGradeReporter,
    LoggingReceiptNotifier,
};
use scorm_core::{GradeReporter, ReceiptNotifier, SqliteLedger};
use scorm_server::Collaborators;

use crate::config::ReportingConfig;

/// Open the ledger, creating its directory on first use
pub fn open_store(path: &Path) -> Result<Arc<SqliteLedger>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let store = SqliteLedger::open(path)
        .with_context(|| format!("Failed to open ledger at {}", path.display()))?;
    Ok(Arc::new(store))
}

/// HTTP collaborators for configured endpoints, logging ones otherwise
pub fn collaborators(config: &ReportingConfig) -> Collaborators {
    let grades: Arc<dyn GradeReporter> = match &config.grade_endpoint {
        Some(endpoint) => Arc::new(HttpGradeReporter::new(endpoint, config.timeout)),
        None => Arc::new(LoggingGradeReporter),
    };
    let receipts: Arc<dyn ReceiptNotifier> = match &config.receipt_endpoint {
        Some(endpoint) => Arc::new(HttpReceiptNotifier::new(endpoint, config.timeout)),
        None => Arc::new(LoggingReceiptNotifier),
    };

    Collaborators {
        grades,
        receipts,
        cache: Arc::new(HttpExamCache::new(config.timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_store_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("scorm.db");

        open_store(&path).unwrap();
        assert!(path.exists());
    }
}
