//! Fixed-cadence background jobs

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A job that runs every `period` until cancelled.
///
/// Runs never overlap: each run is awaited before the next tick is taken, and
/// ticks missed while a run was in progress are skipped rather than queued.
pub struct PeriodicTask {
    name: &'static str,
    period: Duration,
    shutdown: CancellationToken,
}

impl PeriodicTask {
    pub fn new(name: &'static str, period: Duration, shutdown: CancellationToken) -> Self {
        Self {
            name,
            period,
            shutdown,
        }
    }

    /// Spawn the job loop; the first run happens one period from now.
    pub fn spawn<F, Fut>(self, mut job: F) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Self {
            name,
            period,
            shutdown,
        } = self;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(task = name, ?period, "periodic task started");

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        debug!(task = name, "periodic task tick");
                        job().await;
                    }
                }
            }

            info!(task = name, "periodic task stopped");
        })
    }
}
