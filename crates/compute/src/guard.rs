//! At-most-one recompute per field, and a budget on concurrent group runs.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, OwnedSemaphorePermit, Semaphore};

use crate::error::ComputeError;
use crate::registry::FieldId;

/// Held while a field recomputes. Dropping it releases the field, also when
/// the recompute failed or its task was cancelled.
pub type FieldPermit = OwnedMutexGuard<()>;

/// Held for the duration of one group run.
pub type RunPermit = OwnedSemaphorePermit;

pub struct ConcurrencyGuard {
    locks: Mutex<HashMap<FieldId, Arc<AsyncMutex<()>>>>,
    budget: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyGuard {
    pub fn new(pending_budget: usize) -> Self {
        let capacity = pending_budget.max(1);
        Self {
            locks: Mutex::new(HashMap::new()),
            budget: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    fn locks(&self) -> MutexGuard<'_, HashMap<FieldId, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_for(&self, id: &FieldId) -> Arc<AsyncMutex<()>> {
        Arc::clone(self.locks().entry(id.clone()).or_default())
    }

    /// Fails fast if a recompute of `id` is already in flight.
    pub fn try_acquire(&self, id: &FieldId) -> Option<FieldPermit> {
        self.lock_for(id).try_lock_owned().ok()
    }

    /// Waits for an in-flight recompute of `id` to finish.
    pub async fn acquire(&self, id: &FieldId) -> FieldPermit {
        self.lock_for(id).lock_owned().await
    }

    pub fn is_in_flight(&self, id: &FieldId) -> bool {
        self.locks()
            .get(id)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    /// A slot for a group run, or `None` when the budget is exhausted.
    pub fn try_reserve_run(&self) -> Option<RunPermit> {
        Arc::clone(&self.budget).try_acquire_owned().ok()
    }

    /// Waits for a group-run slot. Errors once the guard is closed.
    pub async fn reserve_run(&self) -> Result<RunPermit, ComputeError> {
        Arc::clone(&self.budget)
            .acquire_owned()
            .await
            .map_err(|_| ComputeError::ShuttingDown)
    }

    /// Group runs currently holding a slot.
    pub fn pending_runs(&self) -> usize {
        self.capacity - self.budget.available_permits()
    }

    /// Refuse further group runs. Runs already holding a slot continue.
    pub fn close(&self) {
        self.budget.close();
    }

    /// Forget locks of fields that no longer exist. Locks in use are kept.
    pub fn retain(&self, ids: &HashSet<FieldId>) {
        self.locks()
            .retain(|id, lock| ids.contains(id) || Arc::strong_count(lock) > 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> FieldId {
        FieldId::new("home", name)
    }

    #[test]
    fn second_acquire_fails_fast() {
        let guard = ConcurrencyGuard::new(3);
        let held = guard.try_acquire(&id("a")).unwrap();
        assert!(guard.is_in_flight(&id("a")));
        assert!(guard.try_acquire(&id("a")).is_none());
        assert!(guard.try_acquire(&id("b")).is_some(), "other fields unaffected");
        drop(held);
        assert!(!guard.is_in_flight(&id("a")));
        assert!(guard.try_acquire(&id("a")).is_some());
    }

    #[test]
    fn budget_is_bounded() {
        let guard = ConcurrencyGuard::new(2);
        let a = guard.try_reserve_run().unwrap();
        let _b = guard.try_reserve_run().unwrap();
        assert!(guard.try_reserve_run().is_none());
        assert_eq!(guard.pending_runs(), 2);
        drop(a);
        assert!(guard.try_reserve_run().is_some());
    }

    #[test]
    fn zero_budget_still_allows_one_run() {
        let guard = ConcurrencyGuard::new(0);
        assert!(guard.try_reserve_run().is_some());
    }

    #[tokio::test]
    async fn acquire_waits_for_release() {
        let guard = Arc::new(ConcurrencyGuard::new(3));
        let held = guard.try_acquire(&id("a")).unwrap();
        let waiter = {
            let guard = Arc::clone(&guard);
            tokio::spawn(async move {
                let _permit = guard.acquire(&id("a")).await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        drop(held);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn permit_released_when_task_panics() {
        let guard = Arc::new(ConcurrencyGuard::new(3));
        let task = {
            let guard = Arc::clone(&guard);
            tokio::spawn(async move {
                let _permit = guard.try_acquire(&id("a")).unwrap();
                panic!("recompute blew up");
            })
        };
        assert!(task.await.is_err());
        assert!(guard.try_acquire(&id("a")).is_some());
    }

    #[tokio::test]
    async fn closed_guard_refuses_runs() {
        let guard = ConcurrencyGuard::new(3);
        guard.close();
        assert!(guard.try_reserve_run().is_none());
        assert!(matches!(guard.reserve_run().await, Err(ComputeError::ShuttingDown)));
    }

    #[test]
    fn retain_drops_unused_locks() {
        let guard = ConcurrencyGuard::new(3);
        let _held = guard.try_acquire(&id("busy")).unwrap();
        drop(guard.try_acquire(&id("idle")));
        guard.retain(&HashSet::new());
        assert!(guard.is_in_flight(&id("busy")));
        assert_eq!(guard.locks().len(), 1);
    }
}
