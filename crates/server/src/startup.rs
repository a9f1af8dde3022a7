//! Engine construction from settings.

use std::sync::Arc;

use almanac_compute::AlmanacEngine;
use almanac_core::SharedClock;
use almanac_notify::Dispatcher;
use tracing::{info, warn};

use crate::settings::Settings;

/// Build the engine and install the configured scopes. Nothing is computed
/// yet; the scheduler's startup refresh (or an explicit `refresh_all`) does
/// the first pass.
pub async fn build_engine(settings: &Settings, clock: SharedClock) -> anyhow::Result<Arc<AlmanacEngine>> {
    let dispatcher = Dispatcher::from_config(&settings.notify)?;
    info!(
        channels = settings.notify.channels.len(),
        title = %dispatcher.title(),
        "Notification dispatcher ready"
    );

    let engine = AlmanacEngine::new(settings.provider.build(), clock, settings.engine_config())
        .with_dispatcher(Arc::new(dispatcher));

    let report = engine.install(settings.scopes.clone()).await?;
    for dropped in &report.dropped {
        warn!(scope = %dropped.scope, entry = %dropped.entry, reason = %dropped.reason, "Entry left out");
    }
    info!(
        generation = report.generation,
        fields = engine.registry().len(),
        scopes = settings.scopes.len(),
        "Field registry installed"
    );
    Ok(Arc::new(engine))
}
