use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use almanac_core::ManualClock;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use crate::engine::{AlmanacEngine, EngineConfig};
use crate::error::{ComputeError, FieldError};
use crate::provider::testing::CountingProvider;
use crate::registry::{BuildPlan, FieldCompute, FieldContext, FieldId, FieldOutput, FieldSpec};
use crate::scheduler::runner::Scheduler;
use crate::scheduler::types::{Cadence, Trigger};

/// Mock field counting its recomputes.
struct MockField {
    computed: Arc<AtomicUsize>,
    delay: Duration,
}

impl MockField {
    fn new() -> Self {
        Self {
            computed: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }
}

#[async_trait]
impl FieldCompute for MockField {
    async fn compute(&self, _ctx: &FieldContext) -> Result<FieldOutput, FieldError> {
        self.computed.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(FieldOutput::new("ok"))
    }
}

/// 100ms before the 09:15 quarter-hour boundary.
fn just_before_quarter() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, 1)
        .unwrap()
        .and_hms_milli_opt(9, 14, 59, 900)
        .unwrap()
}

fn scheduler_with(
    fields: Vec<(&str, Cadence, MockField)>,
    config: EngineConfig,
) -> (Scheduler, Vec<Arc<AtomicUsize>>) {
    let clock = Arc::new(ManualClock::new(just_before_quarter()));
    let engine = AlmanacEngine::new(Arc::new(CountingProvider::new()), clock, config);

    let mut counters = Vec::new();
    let specs = fields
        .into_iter()
        .map(|(name, cadence, field)| {
            counters.push(Arc::clone(&field.computed));
            FieldSpec {
                id: FieldId::new("home", name),
                cadence,
                is_main: false,
                signature: name.to_string(),
                compute: Arc::new(field),
            }
        })
        .collect();
    engine.registry().install(BuildPlan {
        scopes: vec!["home".into()],
        specs,
        dropped: Vec::new(),
    });
    (Scheduler::new(Arc::new(engine)), counters)
}

fn no_startup_refresh() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.scheduler.startup_refresh = false;
    config
}

async fn wait_for(counter: &AtomicUsize, at_least: usize) -> bool {
    for _ in 0..100 {
        if counter.load(Ordering::SeqCst) >= at_least {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn start_twice_is_rejected() {
    let (scheduler, _) = scheduler_with(Vec::new(), no_startup_refresh());
    scheduler.start().await.unwrap();
    assert!(scheduler.is_running());
    assert!(matches!(scheduler.start().await, Err(ComputeError::AlreadyRunning)));
    scheduler.shutdown().await;
    assert!(!scheduler.is_running());
}

#[tokio::test]
async fn startup_refresh_covers_every_cadence() {
    let (scheduler, counters) = scheduler_with(
        vec![
            ("a", Cadence::QuarterHour, MockField::new()),
            ("b", Cadence::Hourly, MockField::new()),
            ("c", Cadence::Midnight, MockField::new()),
        ],
        EngineConfig::default(),
    );
    scheduler.start().await.unwrap();
    for counter in &counters {
        assert!(wait_for(counter, 1).await);
    }
    scheduler.shutdown().await;
    assert_eq!(scheduler.metrics().runs["forced"], 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tick_fires_only_its_cadence_group() {
    let (scheduler, counters) = scheduler_with(
        vec![
            ("quarter", Cadence::QuarterHour, MockField::new()),
            ("hourly", Cadence::Hourly, MockField::new()),
        ],
        no_startup_refresh(),
    );
    scheduler.start().await.unwrap();
    assert!(wait_for(&counters[0], 1).await, "quarter-hour tick never fired");
    // The clock is frozen just before 09:15; the next hourly boundary is 10:00.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(counters[0].load(Ordering::SeqCst), 1, "boundary fired twice");
    assert_eq!(counters[1].load(Ordering::SeqCst), 0);
    scheduler.shutdown().await;
    assert_eq!(scheduler.metrics().runs["quarter_hour"], 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_hourly_run_does_not_delay_the_quarter_hour_tick() {
    let mut config = no_startup_refresh();
    config.scheduler.shutdown_timeout_seconds = 1;
    let (scheduler, counters) = scheduler_with(
        vec![
            ("hourly", Cadence::Hourly, MockField::slow(Duration::from_secs(3))),
            ("quarter", Cadence::QuarterHour, MockField::new()),
        ],
        config,
    );

    // An hourly run still computing when the 09:15 boundary arrives.
    let hourly = {
        let engine = Arc::clone(scheduler.engine());
        tokio::spawn(async move { engine.run_group(Trigger::Tick(Cadence::Hourly)).await })
    };
    assert!(wait_for(&counters[0], 1).await);

    let begun = std::time::Instant::now();
    scheduler.start().await.unwrap();
    assert!(wait_for(&counters[1], 1).await, "quarter-hour tick never fired");
    let mut recorded = false;
    for _ in 0..50 {
        if scheduler.metrics().runs.get("quarter_hour") == Some(&1) {
            recorded = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(recorded, "quarter-hour run never completed");
    assert!(
        begun.elapsed() < Duration::from_millis(1500),
        "quarter-hour run waited on the hourly one"
    );
    assert!(!hourly.is_finished(), "hourly run still in flight");
    assert!(scheduler.metrics().runs.get("hourly").is_none());

    scheduler.shutdown().await;
    hourly.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_aborts_runs_past_the_timeout() {
    let mut config = EngineConfig::default();
    config.scheduler.shutdown_timeout_seconds = 1;
    let (scheduler, counters) = scheduler_with(
        vec![("slow", Cadence::Hourly, MockField::slow(Duration::from_secs(30)))],
        config,
    );
    scheduler.start().await.unwrap();
    assert!(wait_for(&counters[0], 1).await);

    let begun = std::time::Instant::now();
    scheduler.shutdown().await;
    assert!(begun.elapsed() < Duration::from_secs(5));
    assert!(scheduler.metrics().runs.get("forced").is_none(), "slow run was aborted");
}

#[tokio::test]
async fn shutdown_before_start_is_harmless() {
    let (scheduler, _) = scheduler_with(Vec::new(), no_startup_refresh());
    scheduler.shutdown().await;
    assert!(!scheduler.is_running());
}
