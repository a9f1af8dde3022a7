//! Derived Chinese-calendar fields, cached and refreshed on four cadences.

pub mod anniversary;
pub mod cache;
pub mod engine;
pub mod error;
pub mod fields;
pub mod guard;
pub mod provider;
pub mod publish;
pub mod registry;
pub mod scheduler;
pub mod simulated;
pub mod solar_term;

pub use anniversary::{AnniversaryAnchor, AnniversaryResolver, ResolveError};
pub use cache::{CacheConfig, CachePolicy, CacheStats, SnapshotCache};
pub use engine::{AlmanacEngine, DateControlReport, EngineConfig, ProviderConfig};
pub use error::{ComputeError, FieldError};
pub use guard::ConcurrencyGuard;
pub use provider::{AstronomicalProvider, CalendarProvider, ProviderError, SharedProvider};
pub use publish::{BroadcastPublisher, FieldUpdate, StatePublisher, TracingPublisher};
pub use registry::{BuildReport, DroppedEntry, ExportedField, FieldId, FieldRegistry, FieldState};
pub use scheduler::{
    Cadence, GroupReport, RunOutcome, Scheduler, SchedulerConfig, SchedulerMetrics, Trigger,
};
pub use simulated::{DateControl, TemporalOverride};
pub use solar_term::TermPosition;
