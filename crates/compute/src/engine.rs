//! The engine façade: owns the cache, registry and guard, and runs groups of
//! field recomputes on behalf of the scheduler, date control and reloads.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use almanac_core::{ScopeConfig, SharedClock};
use almanac_notify::{Dispatcher, MessageContext};
use chrono::NaiveDateTime;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::anniversary::AnniversaryResolver;
use crate::cache::{CacheConfig, CacheStats, SnapshotCache};
use crate::error::ComputeError;
use crate::guard::ConcurrencyGuard;
use crate::provider::{AstronomicalProvider, SharedProvider};
use crate::publish::{FieldUpdate, StatePublisher, TracingPublisher};
use crate::registry::{
    self, BuildReport, ExportedField, Field, FieldContext, FieldId, FieldRegistry,
    NotificationRequest, Recorded, Stamp,
};
use crate::scheduler::{GroupReport, RunOutcome, SchedulerConfig, SchedulerMetrics, Trigger};
use crate::simulated::{DateControl, TemporalOverride};

// ── Configuration ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Offset of the civil time the calendar is evaluated in.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: f64,
}

fn default_utc_offset() -> f64 { 8.0 }

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: default_utc_offset(),
        }
    }
}

impl ProviderConfig {
    pub fn build(&self) -> SharedProvider {
        Arc::new(AstronomicalProvider::new(self.utc_offset_hours))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
}

/// Result of a date-control command.
#[derive(Debug, Clone, Serialize)]
pub struct DateControlReport {
    /// The effective instant after the command.
    pub effective: NaiveDateTime,
    pub outcome: RunOutcome,
}

// ── Engine ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldRun {
    Ran,
    Failed,
    InFlight,
    Discarded,
}

pub struct AlmanacEngine {
    clock: SharedClock,
    provider: SharedProvider,
    cache: Arc<SnapshotCache>,
    resolver: Arc<AnniversaryResolver>,
    temporal: TemporalOverride,
    registry: FieldRegistry,
    guard: ConcurrencyGuard,
    publisher: Arc<dyn StatePublisher>,
    dispatcher: Arc<Dispatcher>,
    config: EngineConfig,
    seq: AtomicU64,
    metrics: RwLock<SchedulerMetrics>,
    /// Serializes registry rebuilds.
    reload: tokio::sync::Mutex<()>,
}

impl AlmanacEngine {
    /// An engine with no fields. Call [`Self::install`] or [`Self::reload`]
    /// with the scope configuration.
    pub fn new(provider: SharedProvider, clock: SharedClock, config: EngineConfig) -> Self {
        let cache = SnapshotCache::new(Arc::clone(&provider), Arc::clone(&clock), config.cache.clone());
        let (budget, _) = config.scheduler.resolved_limits();
        Self {
            cache: Arc::new(cache),
            resolver: Arc::new(AnniversaryResolver::new(Arc::clone(&provider))),
            temporal: TemporalOverride::new(Arc::clone(&clock), config.scheduler.override_window()),
            registry: FieldRegistry::new(),
            guard: ConcurrencyGuard::new(budget),
            publisher: Arc::new(TracingPublisher),
            dispatcher: Arc::new(Dispatcher::empty()),
            seq: AtomicU64::new(0),
            metrics: RwLock::new(SchedulerMetrics::default()),
            reload: tokio::sync::Mutex::new(()),
            clock,
            provider,
            config,
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn StatePublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<Dispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn metrics(&self) -> SchedulerMetrics {
        self.metrics.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Group runs currently holding a budget slot.
    pub fn pending_runs(&self) -> usize {
        self.guard.pending_runs()
    }

    /// The instant fields are currently computed for.
    pub fn effective_now(&self) -> NaiveDateTime {
        self.temporal.effective()
    }

    // ── Configuration changes ───────────────────────────────────

    /// Rebuild the registry from `scopes` without recomputing anything.
    pub async fn install(&self, scopes: Vec<ScopeConfig>) -> Result<BuildReport, ComputeError> {
        let _reload = self.reload.lock().await;
        self.install_locked(scopes).await
    }

    /// Rebuild the registry, then refresh the fields the rebuild added or
    /// replaced. Fields that persisted keep their state and are not
    /// recomputed.
    pub async fn reload(&self, scopes: Vec<ScopeConfig>) -> Result<BuildReport, ComputeError> {
        let _reload = self.reload.lock().await;
        let report = self.install_locked(scopes).await?;
        if report.added + report.replaced > 0 {
            let generation = report.generation;
            self.run_selected(Trigger::Forced, |f| f.generation == generation)
                .await?;
        }
        Ok(report)
    }

    async fn install_locked(&self, scopes: Vec<ScopeConfig>) -> Result<BuildReport, ComputeError> {
        let provider = Arc::clone(&self.provider);
        let plan = tokio::task::spawn_blocking(move || registry::build(&scopes, provider.as_ref()))
            .await
            .map_err(|e| ComputeError::Build(format!("build task aborted: {e}")))?;
        let report = self.registry.install(plan);

        let live: HashSet<FieldId> = self
            .registry
            .select(|_| true)
            .into_iter()
            .map(|f| f.id.clone())
            .collect();
        self.guard.retain(&live);
        Ok(report)
    }

    // ── Refresh ─────────────────────────────────────────────────

    /// Recompute the fields `trigger` covers.
    ///
    /// A tick that finds the pending-run budget exhausted is skipped; a
    /// forced run waits for a slot.
    pub async fn run_group(&self, trigger: Trigger) -> Result<RunOutcome, ComputeError> {
        self.run_selected(trigger, |f| trigger.covers(f.cadence)).await
    }

    /// Recompute and publish every field now.
    pub async fn refresh_all(&self) -> Result<RunOutcome, ComputeError> {
        self.run_group(Trigger::Forced).await
    }

    /// Move the simulated date and refresh every field for it.
    pub async fn apply_date_control(&self, control: DateControl) -> Result<DateControlReport, ComputeError> {
        let effective = self.temporal.apply(control);
        info!(?control, %effective, "date control applied");
        let outcome = self.refresh_all().await?;
        Ok(DateControlReport { effective, outcome })
    }

    async fn run_selected(
        &self,
        trigger: Trigger,
        filter: impl Fn(&Field) -> bool,
    ) -> Result<RunOutcome, ComputeError> {
        let _slot = match trigger {
            Trigger::Forced => self.guard.reserve_run().await?,
            Trigger::Tick(_) => match self.guard.try_reserve_run() {
                Some(slot) => slot,
                None => {
                    debug!(trigger = trigger.label(), "pending budget exhausted, tick skipped");
                    self.metrics_mut().record_skip(trigger.label());
                    return Ok(RunOutcome::Skipped);
                }
            },
        };

        let start = Instant::now();
        let resolved = self.temporal.resolve();
        let (now, simulated) = (resolved.instant, resolved.simulated);
        let ctx = FieldContext {
            now,
            simulated,
            epoch: resolved.epoch,
            cache: Arc::clone(&self.cache),
            resolver: Arc::clone(&self.resolver),
        };
        let fields = self.registry.select(filter);
        let wait = matches!(trigger, Trigger::Forced);
        let (_, parallel) = self.config.scheduler.resolved_limits();

        let runs: Vec<FieldRun> = stream::iter(fields)
            .map(|field| self.run_field(field, &ctx, wait))
            .buffer_unordered(parallel)
            .collect()
            .await;

        let mut report = GroupReport {
            trigger: trigger.label().to_string(),
            ..GroupReport::default()
        };
        for run in runs {
            match run {
                FieldRun::Ran => report.ran += 1,
                FieldRun::Failed => report.failed += 1,
                FieldRun::InFlight => report.in_flight += 1,
                FieldRun::Discarded => report.superseded += 1,
            }
        }
        report.duration = start.elapsed();

        debug!(
            trigger = %report.trigger,
            %now,
            simulated,
            ran = report.ran,
            failed = report.failed,
            in_flight = report.in_flight,
            duration_ms = report.duration.as_millis() as u64,
            "group run complete"
        );
        self.metrics_mut().record_run(&report, self.clock.now());
        Ok(RunOutcome::Completed(report))
    }

    async fn run_field(&self, field: Arc<Field>, ctx: &FieldContext, wait: bool) -> FieldRun {
        let _permit = if wait {
            self.guard.acquire(&field.id).await
        } else {
            match self.guard.try_acquire(&field.id) {
                Some(permit) => permit,
                None => {
                    debug!(field = %field.id, "recompute already in flight");
                    return FieldRun::InFlight;
                }
            }
        };
        // A group that waited for this permit may carry an older instant
        // than a result already stored; the stamp orders them.
        let stamp = Stamp {
            epoch: ctx.epoch,
            at: ctx.now,
            seq: self.seq.fetch_add(1, Ordering::SeqCst) + 1,
        };

        let (recorded, failed) = match field.compute(ctx).await {
            Ok(output) => (
                self.registry
                    .record_success(&field, stamp, output, !ctx.simulated),
                false,
            ),
            Err(e) => {
                warn!(field = %field.id, error = %e, "field recompute failed");
                (self.registry.record_failure(&field, stamp), true)
            }
        };

        match recorded {
            Recorded::Stored {
                state,
                notification,
            } => {
                self.publisher
                    .publish(&FieldUpdate::new(field.id.clone(), field.is_main, &state))
                    .await;
                if let Some(request) = notification {
                    self.deliver(&field.id, request);
                }
            }
            Recorded::Retired => {
                info!(field = %field.id, "field retired");
                self.publisher
                    .publish(&FieldUpdate::retired(field.id.clone(), field.is_main))
                    .await;
            }
            Recorded::Superseded | Recorded::Stale => {
                debug!(field = %field.id, seq = stamp.seq, at = %stamp.at, "result discarded");
                return FieldRun::Discarded;
            }
        }
        if failed {
            FieldRun::Failed
        } else {
            FieldRun::Ran
        }
    }

    /// Hand a notification to the dispatcher in the background.
    fn deliver(&self, field: &FieldId, request: NotificationRequest) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let field = field.to_string();
        tokio::spawn(async move {
            let ctx = MessageContext {
                name: request.name,
                days: request.days,
                date: request.date,
            };
            if let Err(e) = dispatcher
                .dispatch(&request.service, &request.template, &ctx)
                .await
            {
                warn!(%field, service = %request.service, error = %e, "notification not sent");
            }
        });
    }

    // ── Queries ─────────────────────────────────────────────────

    /// `{name: {state, attributes}}` for `scope`, or across all scopes.
    pub fn export(&self, scope: Option<&str>) -> Result<BTreeMap<String, ExportedField>, ComputeError> {
        self.registry
            .export(scope)
            .ok_or_else(|| ComputeError::ScopeNotFound(scope.unwrap_or_default().to_string()))
    }

    // ── Shutdown ────────────────────────────────────────────────

    /// Refuse new group runs. Runs holding a slot finish normally.
    pub fn close(&self) {
        self.guard.close();
    }

    /// Drop cached snapshots. Called once in-flight runs are done.
    pub fn release_caches(&self) {
        self.cache.clear();
        info!("snapshot cache released");
    }

    fn metrics_mut(&self) -> std::sync::RwLockWriteGuard<'_, SchedulerMetrics> {
        self.metrics.write().unwrap_or_else(|e| e.into_inner())
    }
}
