use std::fmt;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// How often a field group is refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    /// :00, :15, :30 and :45.
    QuarterHour,
    /// On the odd hours that open each two-hour period (23:00, 01:00, ...).
    BiHour,
    /// Top of every hour.
    Hourly,
    /// 00:00. Refreshes every field, not only its own group.
    Midnight,
}

impl Cadence {
    pub const ALL: [Cadence; 4] = [
        Cadence::QuarterHour,
        Cadence::BiHour,
        Cadence::Hourly,
        Cadence::Midnight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::QuarterHour => "quarter_hour",
            Cadence::BiHour => "bi_hour",
            Cadence::Hourly => "hourly",
            Cadence::Midnight => "midnight",
        }
    }

    /// Whether a tick of `self` refreshes a field registered under `field`.
    pub fn covers(&self, field: Cadence) -> bool {
        *self == Cadence::Midnight || *self == field
    }
}

/// The first fire instant of `cadence` strictly after `now`.
pub fn next_fire(cadence: Cadence, now: NaiveDateTime) -> NaiveDateTime {
    let hour_start = now
        .date()
        .and_hms_opt(now.hour(), 0, 0)
        .unwrap_or(now);
    match cadence {
        Cadence::QuarterHour => {
            let quarter = i64::from(now.minute() / 15 + 1);
            hour_start + ChronoDuration::minutes(quarter * 15)
        }
        Cadence::BiHour => {
            // Odd hours open a two-hour period.
            let step = if now.hour() % 2 == 1 { 2 } else { 1 };
            hour_start + ChronoDuration::hours(step)
        }
        Cadence::Hourly => hour_start + ChronoDuration::hours(1),
        Cadence::Midnight => (now.date() + ChronoDuration::days(1)).and_time(chrono::NaiveTime::MIN),
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What caused a group run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// A cadence tick. Fails fast when busy.
    Tick(Cadence),
    /// Startup or a date-control command. Waits for busy fields.
    Forced,
}

impl Trigger {
    pub fn label(&self) -> &'static str {
        match self {
            Trigger::Tick(c) => c.as_str(),
            Trigger::Forced => "forced",
        }
    }

    pub fn covers(&self, field: Cadence) -> bool {
        match self {
            Trigger::Tick(c) => c.covers(field),
            Trigger::Forced => true,
        }
    }
}

/// Result of one group run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupReport {
    pub trigger: String,
    /// Fields recomputed successfully.
    pub ran: usize,
    /// Fields whose recompute failed; they are now unavailable.
    pub failed: usize,
    /// Fields skipped because a recompute was already in flight.
    pub in_flight: usize,
    /// Results discarded because a newer one was already stored.
    pub superseded: usize,
    pub duration: Duration,
}

/// Outcome of asking for a group run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RunOutcome {
    Completed(GroupReport),
    /// The pending-run budget was exhausted; retried on the next tick.
    Skipped,
}

/// Scheduler configuration, parsed from the `[scheduler]` TOML table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Concurrent group runs allowed before ticks are skipped.
    #[serde(default = "default_pending_budget")]
    pub pending_budget: usize,
    /// Fields recomputed in parallel within one group run.
    #[serde(default = "default_max_parallel")]
    pub max_parallel_fields: usize,
    /// How long shutdown waits for in-flight runs.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
    /// Lifetime of a simulated date.
    #[serde(default = "default_override_window")]
    pub override_window_seconds: u64,
    /// Refresh every field once when the scheduler starts.
    #[serde(default = "default_startup_refresh")]
    pub startup_refresh: bool,
}

fn default_pending_budget() -> usize { 3 }
fn default_max_parallel() -> usize { 8 }
fn default_shutdown_timeout() -> u64 { 10 }
fn default_override_window() -> u64 { 60 }
fn default_startup_refresh() -> bool { true }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pending_budget: default_pending_budget(),
            max_parallel_fields: default_max_parallel(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
            override_window_seconds: default_override_window(),
            startup_refresh: default_startup_refresh(),
        }
    }
}

impl SchedulerConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    pub fn override_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.override_window_seconds).unwrap_or(60))
    }

    /// Budget and parallelism, each at least one.
    pub fn resolved_limits(&self) -> (usize, usize) {
        (self.pending_budget.max(1), self.max_parallel_fields.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_config_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.pending_budget, 3);
        assert_eq!(config.max_parallel_fields, 8);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(10));
        assert_eq!(config.override_window(), chrono::Duration::seconds(60));
        assert!(config.startup_refresh);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: SchedulerConfig = toml::from_str("pending_budget = 1").unwrap();
        assert_eq!(config.pending_budget, 1);
        assert_eq!(config.max_parallel_fields, 8);
    }

    #[test]
    fn zero_limits_are_clamped() {
        let config = SchedulerConfig {
            pending_budget: 0,
            max_parallel_fields: 0,
            ..SchedulerConfig::default()
        };
        assert_eq!(config.resolved_limits(), (1, 1));
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2025, 6, 30)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn quarter_hour_fires_on_the_next_quarter() {
        assert_eq!(next_fire(Cadence::QuarterHour, at(10, 0, 0)), at(10, 15, 0));
        assert_eq!(next_fire(Cadence::QuarterHour, at(10, 14, 59)), at(10, 15, 0));
        assert_eq!(next_fire(Cadence::QuarterHour, at(10, 47, 0)), at(11, 0, 0));
    }

    #[test]
    fn bi_hour_fires_on_odd_hours() {
        assert_eq!(next_fire(Cadence::BiHour, at(10, 20, 0)), at(11, 0, 0));
        assert_eq!(next_fire(Cadence::BiHour, at(11, 0, 0)), at(13, 0, 0));
        assert_eq!(next_fire(Cadence::BiHour, at(21, 59, 0)), at(23, 0, 0));
        let after_eleven = next_fire(Cadence::BiHour, at(23, 30, 0));
        assert_eq!(after_eleven.hour(), 1);
        assert_eq!(after_eleven.date(), at(0, 0, 0).date().succ_opt().unwrap());
    }

    #[test]
    fn hourly_and_midnight() {
        assert_eq!(next_fire(Cadence::Hourly, at(10, 0, 0)), at(11, 0, 0));
        let midnight = next_fire(Cadence::Midnight, at(0, 0, 0));
        assert_eq!(midnight.time(), chrono::NaiveTime::MIN);
        assert_eq!(midnight - at(0, 0, 0), ChronoDuration::days(1));
    }

    #[test]
    fn midnight_covers_every_group() {
        for c in Cadence::ALL {
            assert!(Cadence::Midnight.covers(c));
            assert!(Trigger::Forced.covers(c));
        }
        assert!(Cadence::Hourly.covers(Cadence::Hourly));
        assert!(!Cadence::Hourly.covers(Cadence::QuarterHour));
        assert!(!Cadence::QuarterHour.covers(Cadence::Midnight));
    }
}
