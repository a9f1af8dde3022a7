//! Calendar providers: turn an instant into a [`LunarSnapshot`].
//!
//! The engine treats a provider as a pure, possibly slow function. Calls are
//! made from blocking threads, never directly on the async runtime.

pub mod astro;
pub mod astronomical;
pub mod lunisolar;
pub mod tables;

use std::sync::Arc;

use almanac_core::LunarSnapshot;
use chrono::NaiveDateTime;

pub use astronomical::AstronomicalProvider;

/// Error type for snapshot derivation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("Year {year} outside supported range {min}..={max}")]
    OutOfRange { year: i32, min: i32, max: i32 },
    #[error("Invalid snapshot for {instant}: {reason}")]
    Invalid {
        instant: NaiveDateTime,
        reason: String,
    },
    #[error("Provider failed: {0}")]
    Failed(String),
}

/// Derives every calendar fact for one instant.
///
/// Implementations must be deterministic for a given instant.
pub trait CalendarProvider: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    fn derive(&self, instant: NaiveDateTime) -> Result<LunarSnapshot, ProviderError>;
}

/// Thread-safe handle to a provider.
pub type SharedProvider = Arc<dyn CalendarProvider>;

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use chrono::NaiveDate;

    use super::*;

    /// Wraps the astronomical provider, counting calls and optionally
    /// failing for chosen dates or sleeping to widen race windows.
    pub struct CountingProvider {
        inner: AstronomicalProvider,
        calls: AtomicUsize,
        active: AtomicUsize,
        peak: AtomicUsize,
        failing: Mutex<HashSet<NaiveDate>>,
        delay: Duration,
    }

    impl CountingProvider {
        pub fn new() -> Self {
            Self::with_delay(Duration::ZERO)
        }

        pub fn with_delay(delay: Duration) -> Self {
            Self {
                inner: AstronomicalProvider::default(),
                calls: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                failing: Mutex::new(HashSet::new()),
                delay,
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Most derivations that ever ran at the same time.
        pub fn peak_concurrency(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }

        pub fn fail_on(&self, date: NaiveDate) {
            self.failing.lock().unwrap().insert(date);
        }

        pub fn recover(&self, date: NaiveDate) {
            self.failing.lock().unwrap().remove(&date);
        }
    }

    impl CalendarProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        fn derive(&self, instant: NaiveDateTime) -> Result<LunarSnapshot, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(active, Ordering::SeqCst);
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            let result = if self.failing.lock().unwrap().contains(&instant.date()) {
                Err(ProviderError::Failed(format!("scripted failure at {instant}")))
            } else {
                self.inner.derive(instant)
            };
            self.active.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }
}
