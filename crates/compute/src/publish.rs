//! Hand-off of recomputed field state to the host.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::registry::{FieldId, FieldState};

/// One field's new state, as seen by the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldUpdate {
    pub id: FieldId,
    pub value: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub available: bool,
    pub is_main: bool,
    pub updated_at: Option<NaiveDateTime>,
}

impl FieldUpdate {
    pub fn new(id: FieldId, is_main: bool, state: &FieldState) -> Self {
        Self {
            id,
            value: state.value.clone(),
            attributes: state.attributes.clone(),
            available: state.available,
            is_main,
            updated_at: state.last_updated_at,
        }
    }

    /// The field was torn down and should disappear from the host.
    pub fn retired(id: FieldId, is_main: bool) -> Self {
        Self {
            id,
            value: None,
            attributes: BTreeMap::new(),
            available: false,
            is_main,
            updated_at: None,
        }
    }
}

/// Receives every stored field state. Implementations must not block.
#[async_trait]
pub trait StatePublisher: Send + Sync {
    async fn publish(&self, update: &FieldUpdate);
}

/// Logs updates at debug level. The default when no host is attached.
#[derive(Debug, Default)]
pub struct TracingPublisher;

#[async_trait]
impl StatePublisher for TracingPublisher {
    async fn publish(&self, update: &FieldUpdate) {
        debug!(
            field = %update.id,
            value = update.value.as_deref().unwrap_or(""),
            available = update.available,
            "field published"
        );
    }
}

/// Fans updates out to any number of subscribers. Lagging subscribers lose
/// the oldest updates.
pub struct BroadcastPublisher {
    tx: broadcast::Sender<FieldUpdate>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FieldUpdate> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl StatePublisher for BroadcastPublisher {
    async fn publish(&self, update: &FieldUpdate) {
        // No subscribers is fine.
        let _ = self.tx.send(update.clone());
    }
}
