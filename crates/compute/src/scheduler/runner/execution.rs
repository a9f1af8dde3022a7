use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::engine::AlmanacEngine;
use crate::error::ComputeError;
use crate::scheduler::types::{next_fire, Cadence, RunOutcome, Trigger};

use super::Scheduler;

impl Scheduler {
    /// Spawn the cadence loops, plus a full refresh when configured.
    /// Returns immediately; the loops run until [`Scheduler::shutdown`].
    pub async fn start(&self) -> Result<(), ComputeError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ComputeError::AlreadyRunning);
        }
        let mut loops = self.loops.lock().await;

        if self.engine.config().scheduler.startup_refresh {
            let engine = Arc::clone(&self.engine);
            loops.spawn(async move {
                match engine.refresh_all().await {
                    Ok(RunOutcome::Completed(report)) => info!(
                        ran = report.ran,
                        failed = report.failed,
                        "startup refresh complete"
                    ),
                    Ok(RunOutcome::Skipped) => {}
                    Err(e) => warn!(error = %e, "startup refresh failed"),
                }
            });
        }

        for cadence in Cadence::ALL {
            loops.spawn(cadence_loop(
                Arc::clone(&self.engine),
                cadence,
                self.shutdown.subscribe(),
            ));
        }

        info!(
            fields = self.engine.registry().len(),
            scopes = self.engine.registry().scopes().len(),
            "Scheduler started"
        );
        Ok(())
    }
}

/// Sleep until each boundary of `cadence`, then run its group.
///
/// Runs are spawned so a slow one does not push back the next tick; the
/// budget in the engine bounds how many pile up.
async fn cadence_loop(engine: Arc<AlmanacEngine>, cadence: Cadence, mut shutdown: watch::Receiver<bool>) {
    let mut runs = JoinSet::new();
    let mut last_fired = None;

    loop {
        if *shutdown.borrow() {
            break;
        }
        let now = engine.clock().now();
        // A timer waking a little early must not fire the same boundary twice.
        let from = last_fired.map_or(now, |fired| now.max(fired));
        let next = next_fire(cadence, from);
        let wait = (next - now).to_std().unwrap_or_default();

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        last_fired = Some(next);
        debug!(%cadence, at = %next, "tick");
        let engine = Arc::clone(&engine);
        runs.spawn(async move {
            match engine.run_group(Trigger::Tick(cadence)).await {
                Ok(_) => {}
                Err(ComputeError::ShuttingDown) => {}
                Err(e) => warn!(%cadence, error = %e, "group run failed"),
            }
        });
        while runs.try_join_next().is_some() {}
    }

    while runs.join_next().await.is_some() {}
    debug!(%cadence, "cadence loop stopped");
}
