use tracing::{info, warn};

use super::Scheduler;

impl Scheduler {
    /// Stop the loops and wait for in-flight runs, up to the configured
    /// timeout. Stragglers are aborted, then the engine's caches released.
    pub async fn shutdown(&self) {
        info!("Scheduler shutdown requested");
        self.shutdown.send_replace(true);
        self.engine.close();

        let timeout = self.engine.config().scheduler.shutdown_timeout();
        let mut loops = self.loops.lock().await;
        let drained = tokio::time::timeout(timeout, async {
            while loops.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(
                timeout_secs = timeout.as_secs(),
                remaining = loops.len(),
                "in-flight runs did not finish in time, aborting"
            );
            loops.abort_all();
            while loops.join_next().await.is_some() {}
        }

        self.engine.release_caches();
        info!("Scheduler stopped");
    }
}
