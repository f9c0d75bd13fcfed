//! Periodic compaction schedule

use std::sync::Arc;

use scorm_core::PeriodicTask;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::AppState;

/// Run a compaction pass every configured interval until `shutdown` fires
///
/// Returns `None` when compaction is disabled. Passes run on the blocking
/// pool because the ledger is synchronous.
pub fn spawn_compaction(state: &AppState, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
    let config = state.compactor.config();
    if !config.enabled {
        info!("Compaction disabled");
        return None;
    }

    let compactor = Arc::clone(&state.compactor);
    let task = PeriodicTask::new("compaction", config.interval, shutdown);
    Some(task.spawn(move || {
        let compactor = Arc::clone(&compactor);
        async move {
            match tokio::task::spawn_blocking(move || compactor.run_compaction_pass()).await {
                Ok(Ok(report)) if report.run_skipped => debug!("Compaction pass skipped"),
                Ok(Ok(_)) => {}
                Ok(Err(e)) => error!("Compaction pass failed: {}", e),
                Err(e) => error!("Compaction pass panicked: {}", e),
            }
        }
    }))
}
