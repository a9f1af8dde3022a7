//! Next Gregorian date of a recurring lunar anniversary.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use almanac_core::LunarSnapshot;
use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::provider::{ProviderError, SharedProvider};

/// A recurring lunar `(month, day, leap)` date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnniversaryAnchor {
    pub month: u32,
    pub day: u32,
    pub leap: bool,
}

impl AnniversaryAnchor {
    pub fn new(month: u32, day: u32, leap: bool) -> Result<Self, ResolveError> {
        let anchor = Self { month, day, leap };
        if (1..=12).contains(&month) && (1..=30).contains(&day) {
            Ok(anchor)
        } else {
            Err(ResolveError::InvalidAnchor(anchor))
        }
    }

    /// The anchor a snapshot's lunar date falls on.
    pub fn of(snapshot: &LunarSnapshot) -> Self {
        Self {
            month: snapshot.lunar_month,
            day: snapshot.lunar_day,
            leap: snapshot.is_leap_month,
        }
    }

    fn matches(&self, snapshot: &LunarSnapshot) -> bool {
        snapshot.lunar_month == self.month
            && snapshot.lunar_day == self.day
            && snapshot.is_leap_month == self.leap
    }
}

impl fmt::Display for AnniversaryAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let leap = if self.leap { "闰" } else { "" };
        write!(f, "{}{}月{}日", leap, self.month, self.day)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    #[error("No occurrence of {anchor} from {after} within the search window")]
    Exhausted {
        anchor: AnniversaryAnchor,
        after: NaiveDate,
    },
    #[error("Invalid anchor {0}")]
    InvalidAnchor(AnniversaryAnchor),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Bounded forward search for anniversary dates.
///
/// Candidate years are `year(after) - 1 ..= year(after) + 1`. No day of the
/// prior year can be on or after `after`, so the scan runs from `after` to
/// the end of the following year. Results are memoized.
pub struct AnniversaryResolver {
    provider: SharedProvider,
    memo: Mutex<LruCache<(AnniversaryAnchor, NaiveDate), NaiveDate>>,
}

impl AnniversaryResolver {
    pub fn new(provider: SharedProvider) -> Self {
        Self::with_memo_capacity(provider, 256)
    }

    pub fn with_memo_capacity(provider: SharedProvider, capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            provider,
            memo: Mutex::new(LruCache::new(cap)),
        }
    }

    /// First date on or after `after` whose lunar date matches `anchor`.
    pub async fn next_occurrence(
        self: &Arc<Self>,
        anchor: AnniversaryAnchor,
        after: NaiveDate,
    ) -> Result<NaiveDate, ResolveError> {
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || this.next_occurrence_blocking(anchor, after))
            .await
            .map_err(|e| ProviderError::Failed(format!("resolver task aborted: {e}")))?
    }

    /// Blocking variant of [`Self::next_occurrence`].
    pub fn next_occurrence_blocking(
        &self,
        anchor: AnniversaryAnchor,
        after: NaiveDate,
    ) -> Result<NaiveDate, ResolveError> {
        if let Some(hit) = self
            .memo
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(anchor, after))
        {
            return Ok(*hit);
        }

        let found = self.search(anchor, after)?;
        self.memo
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .put((anchor, after), found);
        Ok(found)
    }

    fn search(&self, anchor: AnniversaryAnchor, after: NaiveDate) -> Result<NaiveDate, ResolveError> {
        let exhausted = ResolveError::Exhausted { anchor, after };
        let end = NaiveDate::from_ymd_opt(after.year() + 1, 12, 31).ok_or(exhausted.clone())?;

        let mut day = after;
        let mut lookups = 0u32;
        while day <= end {
            let snapshot = self.provider.derive(day.and_time(NaiveTime::MIN))?;
            lookups += 1;
            if anchor.matches(&snapshot) {
                debug!(%anchor, %after, found = %day, lookups, "anniversary resolved");
                return Ok(day);
            }
            day += Duration::days(skip_days(snapshot.lunar_day, anchor.day));
        }
        debug!(%anchor, %after, lookups, "anniversary search exhausted");
        Err(exhausted)
    }
}

/// A lower bound on the days until the lunar day reads `target` again.
///
/// Lunar months have at least 29 days, so jumping by this never steps over
/// a matching day.
fn skip_days(current: u32, target: u32) -> i64 {
    let skip = if target > current {
        target - current
    } else {
        (29 + target).saturating_sub(current)
    };
    i64::from(skip.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::CountingProvider;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn resolver() -> (Arc<CountingProvider>, Arc<AnniversaryResolver>) {
        let provider = Arc::new(CountingProvider::new());
        let resolver = Arc::new(AnniversaryResolver::new(provider.clone()));
        (provider, resolver)
    }

    #[test]
    fn spring_festival_next_year() {
        let (_, resolver) = resolver();
        let anchor = AnniversaryAnchor::new(1, 1, false).unwrap();
        let found = resolver.next_occurrence_blocking(anchor, ymd(2024, 3, 1)).unwrap();
        assert_eq!(found, ymd(2025, 1, 29));
    }

    #[test]
    fn after_is_inclusive() {
        let (_, resolver) = resolver();
        let anchor = AnniversaryAnchor::new(1, 1, false).unwrap();
        let found = resolver.next_occurrence_blocking(anchor, ymd(2025, 1, 29)).unwrap();
        assert_eq!(found, ymd(2025, 1, 29));
    }

    #[test]
    fn deterministic_and_advances_a_lunar_year() {
        let (provider, resolver) = resolver();
        let anchor = AnniversaryAnchor::new(1, 1, false).unwrap();
        let first = resolver.next_occurrence_blocking(anchor, ymd(2024, 3, 1)).unwrap();
        let calls = provider.calls();
        let again = resolver.next_occurrence_blocking(anchor, ymd(2024, 3, 1)).unwrap();
        assert_eq!(first, again);
        assert_eq!(provider.calls(), calls, "second call served from memo");

        let later = resolver
            .next_occurrence_blocking(anchor, first + Duration::days(1))
            .unwrap();
        assert_eq!(later, ymd(2026, 2, 17));
    }

    #[test]
    fn leap_anchor_skips_years_without_the_leap_month() {
        let (_, resolver) = resolver();
        let anchor = AnniversaryAnchor::new(6, 1, true).unwrap();
        // 2024 has no leap month; 2025 has a leap sixth month.
        let found = resolver.next_occurrence_blocking(anchor, ymd(2024, 1, 1)).unwrap();
        assert_eq!(found, ymd(2025, 7, 25));
    }

    #[test]
    fn leap_anchor_without_match_is_exhausted() {
        let (_, resolver) = resolver();
        let anchor = AnniversaryAnchor::new(6, 1, true).unwrap();
        let err = resolver
            .next_occurrence_blocking(anchor, ymd(2026, 1, 1))
            .unwrap_err();
        assert!(matches!(err, ResolveError::Exhausted { .. }));
    }

    #[test]
    fn day_thirty_is_not_matched_in_short_months() {
        let (_, resolver) = resolver();
        // The only twelfth month in the window, ending 2025-01-28, has 29 days.
        let anchor = AnniversaryAnchor::new(12, 30, false).unwrap();
        let err = resolver
            .next_occurrence_blocking(anchor, ymd(2024, 3, 1))
            .unwrap_err();
        assert!(matches!(err, ResolveError::Exhausted { .. }));
    }

    #[test]
    fn scan_is_far_below_one_lookup_per_day() {
        let (provider, resolver) = resolver();
        let anchor = AnniversaryAnchor::new(8, 15, false).unwrap();
        resolver.next_occurrence_blocking(anchor, ymd(2024, 9, 18)).unwrap();
        assert!(provider.calls() < 60, "{} lookups", provider.calls());
    }

    #[test]
    fn invalid_anchor_rejected() {
        assert!(AnniversaryAnchor::new(13, 1, false).is_err());
        assert!(AnniversaryAnchor::new(1, 31, false).is_err());
    }

    #[test]
    fn skip_never_overshoots() {
        assert_eq!(skip_days(1, 15), 14);
        assert_eq!(skip_days(15, 15), 29);
        assert_eq!(skip_days(20, 1), 10);
        assert_eq!(skip_days(30, 1), 1);
    }

    #[tokio::test]
    async fn async_wrapper_matches_blocking() {
        let (_, resolver) = resolver();
        let anchor = AnniversaryAnchor::new(8, 15, false).unwrap();
        let found = resolver.next_occurrence(anchor, ymd(2024, 1, 1)).await.unwrap();
        assert_eq!(found, ymd(2024, 9, 17));
    }
}
