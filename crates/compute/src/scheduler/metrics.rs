use std::collections::HashMap;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Serialize;

use super::types::GroupReport;

/// Refresh counters, per trigger label (`quarter_hour`, ..., `forced`).
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerMetrics {
    /// Completed group runs.
    pub runs: HashMap<String, u64>,
    /// Ticks skipped because the pending-run budget was exhausted.
    pub skipped: HashMap<String, u64>,
    /// Field recomputes that failed, across all triggers.
    pub field_failures: u64,
    /// Average group run duration.
    pub avg_run_duration: HashMap<String, Duration>,
    /// Wall-clock time of the last completed run.
    pub last_run: HashMap<String, NaiveDateTime>,
}

impl SchedulerMetrics {
    /// Record a completed group run.
    pub fn record_run(&mut self, report: &GroupReport, at: NaiveDateTime) {
        let label = report.trigger.as_str();
        *self.runs.entry(label.to_string()).or_default() += 1;
        self.field_failures += report.failed as u64;
        self.last_run.insert(label.to_string(), at);

        let count = self.runs[label];
        let prev_avg = self
            .avg_run_duration
            .get(label)
            .copied()
            .unwrap_or_default();

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        let new_avg = if count == 1 {
            report.duration
        } else {
            let prev_nanos = prev_avg.as_nanos() as f64;
            let cur_nanos = report.duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / count as f64;
            Duration::from_nanos(avg_nanos as u64)
        };

        self.avg_run_duration.insert(label.to_string(), new_avg);
    }

    pub fn record_skip(&mut self, label: &str) {
        *self.skipped.entry(label.to_string()).or_default() += 1;
    }
}
