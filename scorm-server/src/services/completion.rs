//! Reacts to attempts being completed

use scorm_core::{AttemptEvent, AttemptStatus, CompletionStatus};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::AppState;

/// Watch attempt events; when an attempt becomes completed, mark it,
/// dispatch outcome reporting and the receipt, and tell open connections
pub fn spawn_completion_watcher(state: AppState, shutdown: CancellationToken) -> JoinHandle<()> {
    let mut rx = state.events.subscribe();

    tokio::spawn(async move {
        info!("Completion watcher started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = rx.recv() => match event {
                    Ok(AttemptEvent::CompletionChanged { attempt, status: CompletionStatus::Completed }) => {
                        on_completed(&state, attempt);
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Completion watcher lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Attempt event channel closed, stopping completion watcher");
                        break;
                    }
                },
            }
        }
    })
}

fn on_completed(state: &AppState, attempt: scorm_core::AttemptId) {
    match state.attempts.attempt(attempt) {
        Ok(Some(record)) if record.status == AttemptStatus::Completed => {
            debug!(%attempt, "Attempt already completed");
            return;
        }
        Ok(Some(_)) => {}
        Ok(None) => {
            warn!(%attempt, "Completion for unknown attempt");
            return;
        }
        Err(e) => {
            error!(%attempt, "Failed to load attempt: {}", e);
            return;
        }
    }

    if let Err(e) = state.attempts.set_status(attempt, AttemptStatus::Completed) {
        error!(%attempt, "Failed to mark attempt completed: {}", e);
        return;
    }

    info!(%attempt, "Attempt completed");
    state.tasks.report_outcome(attempt);
    state.tasks.send_completion_receipt(attempt);
    let _ = state.completions.send(attempt);
}
