//! Short-lived "what if it were date X" override of the engine's clock.

use std::sync::Mutex;

use almanac_core::SharedClock;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A date-control command from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "date")]
pub enum DateControl {
    NextDay,
    PreviousDay,
    Today,
    SelectDate(NaiveDate),
}

#[derive(Debug, Clone, Copy)]
struct Simulated {
    instant: NaiveDateTime,
    set_at: NaiveDateTime,
}

#[derive(Debug, Default)]
struct State {
    current: Option<Simulated>,
    /// Bumped whenever the override is set, cleared or lapses.
    epoch: u64,
}

/// The instant a group run computes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub instant: NaiveDateTime,
    pub simulated: bool,
    /// Results from a later epoch replace older ones even when their
    /// instant is earlier.
    pub epoch: u64,
}

/// Holds an optional simulated "now" that lapses after a fixed window.
pub struct TemporalOverride {
    clock: SharedClock,
    window: Duration,
    state: Mutex<State>,
}

impl TemporalOverride {
    pub fn new(clock: SharedClock, window: Duration) -> Self {
        Self {
            clock,
            window,
            state: Mutex::new(State::default()),
        }
    }

    pub fn set(&self, simulated: NaiveDateTime) {
        let set_at = self.clock.now();
        let mut state = self.lock();
        state.current = Some(Simulated {
            instant: simulated,
            set_at,
        });
        state.epoch += 1;
        debug!(%simulated, epoch = state.epoch, "date override set");
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.current = None;
        state.epoch += 1;
    }

    /// The simulated instant while the override is live, else real time.
    /// An expired override is cleared here.
    pub fn effective(&self) -> NaiveDateTime {
        self.resolve().instant
    }

    /// [`Self::effective`], whether it is simulated, and the current epoch.
    pub fn resolve(&self) -> Resolved {
        let now = self.clock.now();
        let mut state = self.lock();
        let instant = match state.current {
            Some(s) if now - s.set_at < self.window => {
                return Resolved {
                    instant: s.instant,
                    simulated: true,
                    epoch: state.epoch,
                }
            }
            Some(_) => {
                state.current = None;
                state.epoch += 1;
                debug!("date override expired");
                now
            }
            None => now,
        };
        Resolved {
            instant,
            simulated: false,
            epoch: state.epoch,
        }
    }

    pub fn is_active(&self) -> bool {
        let now = self.clock.now();
        self.lock()
            .current
            .map_or(false, |s| now - s.set_at < self.window)
    }

    /// Apply a control command and return the new effective instant.
    pub fn apply(&self, control: DateControl) -> NaiveDateTime {
        match control {
            DateControl::NextDay => self.step_days(1),
            DateControl::PreviousDay => self.step_days(-1),
            DateControl::Today => {
                self.clear();
                self.clock.now()
            }
            DateControl::SelectDate(date) => self.jump_to(date),
        }
    }

    fn step_days(&self, days: i64) -> NaiveDateTime {
        let target = self.effective() + Duration::days(days);
        self.set(target);
        target
    }

    /// Jump to `date`, keeping the time of day of the current effective instant.
    fn jump_to(&self, date: NaiveDate) -> NaiveDateTime {
        let target = date.and_time(self.effective().time());
        self.set(target);
        target
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use almanac_core::{Clock, ManualClock};
    use chrono::Timelike;

    use super::*;

    fn real_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, 20)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn setup() -> (Arc<ManualClock>, TemporalOverride) {
        let clock = Arc::new(ManualClock::new(real_now()));
        let ovr = TemporalOverride::new(clock.clone(), Duration::seconds(60));
        (clock, ovr)
    }

    #[test]
    fn override_expires_after_window() {
        let (clock, ovr) = setup();
        let simulated = real_now() - Duration::days(100);
        ovr.set(simulated);

        clock.advance(Duration::seconds(59));
        assert_eq!(ovr.effective(), simulated);
        assert!(ovr.is_active());

        clock.advance(Duration::seconds(2));
        assert_eq!(ovr.effective(), clock.now());
        assert!(!ovr.is_active());

        // Cleared, not merely hidden: rewinding the clock does not revive it.
        clock.set(real_now());
        assert_eq!(ovr.effective(), real_now());
    }

    #[test]
    fn stepping_is_relative_to_the_effective_instant() {
        let (_, ovr) = setup();
        assert_eq!(ovr.apply(DateControl::NextDay), real_now() + Duration::days(1));
        assert_eq!(ovr.apply(DateControl::NextDay), real_now() + Duration::days(2));
        assert_eq!(ovr.apply(DateControl::PreviousDay), real_now() + Duration::days(1));
    }

    #[test]
    fn select_date_keeps_time_of_day() {
        let (_, ovr) = setup();
        let date = NaiveDate::from_ymd_opt(2024, 2, 10).unwrap();
        let target = ovr.apply(DateControl::SelectDate(date));
        assert_eq!(target.date(), date);
        assert_eq!((target.hour(), target.minute()), (9, 30));
    }

    #[test]
    fn today_clears_outright() {
        let (clock, ovr) = setup();
        ovr.apply(DateControl::NextDay);
        assert_eq!(ovr.apply(DateControl::Today), clock.now());
        assert!(!ovr.is_active());
        assert_eq!(ovr.effective(), clock.now());
    }

    #[test]
    fn each_set_restarts_the_window() {
        let (clock, ovr) = setup();
        ovr.apply(DateControl::NextDay);
        clock.advance(Duration::seconds(50));
        let second = ovr.apply(DateControl::NextDay);
        clock.advance(Duration::seconds(50));
        assert_eq!(ovr.effective(), second);
    }

    #[test]
    fn epoch_moves_on_every_override_change() {
        let (clock, ovr) = setup();
        let base = ovr.resolve();
        assert!(!base.simulated);

        ovr.apply(DateControl::PreviousDay);
        let back = ovr.resolve();
        assert!(back.simulated);
        assert!(back.epoch > base.epoch);
        assert_eq!(ovr.resolve().epoch, back.epoch, "reading does not move it");

        clock.advance(Duration::seconds(61));
        let lapsed = ovr.resolve();
        assert!(!lapsed.simulated);
        assert!(lapsed.epoch > back.epoch);

        ovr.apply(DateControl::Today);
        assert!(ovr.resolve().epoch > lapsed.epoch);
    }

    #[test]
    fn control_wire_format() {
        let c: DateControl = serde_json::from_str(r#"{"action":"select_date","date":"2024-02-10"}"#).unwrap();
        assert_eq!(
            c,
            DateControl::SelectDate(NaiveDate::from_ymd_opt(2024, 2, 10).unwrap())
        );
        let c: DateControl = serde_json::from_str(r#"{"action":"next_day"}"#).unwrap();
        assert_eq!(c, DateControl::NextDay);
    }
}
