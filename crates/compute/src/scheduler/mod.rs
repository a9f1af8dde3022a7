//! Multi-cadence refresh scheduler.
//!
//! Four independent loops (quarter-hour, bi-hour, hourly, midnight) each
//! sleep until their next boundary on the engine's clock and then ask the
//! engine to recompute the fields of their cadence group. A slow or failing
//! run never delays another loop's tick.

pub mod metrics;
pub mod runner;
pub mod types;

pub use metrics::SchedulerMetrics;
pub use runner::Scheduler;
pub use types::{next_fire, Cadence, GroupReport, RunOutcome, SchedulerConfig, Trigger};
