use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;

use crate::engine::AlmanacEngine;
use crate::scheduler::metrics::SchedulerMetrics;

/// Drives an [`AlmanacEngine`] from the clock.
pub struct Scheduler {
    pub(super) engine: Arc<AlmanacEngine>,
    /// Cancel signal observed by every cadence loop.
    pub(super) shutdown: watch::Sender<bool>,
    /// Cadence loops plus the startup refresh.
    pub(super) loops: Mutex<JoinSet<()>>,
    pub(super) started: AtomicBool,
}

impl Scheduler {
    pub fn new(engine: Arc<AlmanacEngine>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            engine,
            shutdown,
            loops: Mutex::new(JoinSet::new()),
            started: AtomicBool::new(false),
        }
    }

    pub fn engine(&self) -> &Arc<AlmanacEngine> {
        &self.engine
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !*self.shutdown.borrow()
    }

    /// Get a snapshot of the current scheduler metrics.
    pub fn metrics(&self) -> SchedulerMetrics {
        self.engine.metrics()
    }

    /// A receiver that observes `true` once shutdown was requested.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}
