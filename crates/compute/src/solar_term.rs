//! Locate a date inside the circular solar-term table.

use almanac_core::SolarTermEntry;
use serde::Serialize;

/// The term a date falls in, and the one that follows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermPosition {
    pub current: String,
    pub next: String,
    /// `1月5日` style.
    pub next_date: String,
}

/// Find the bracket containing `(month, day)`.
///
/// The table wraps from December back to January: a date before the first
/// entry belongs to the last entry of the previous cycle, a date after the
/// last entry looks ahead to the first. A date equal to a term's date
/// belongs to that term. Returns `None` for an empty table.
pub fn locate(table: &[SolarTermEntry], month: u32, day: u32) -> Option<TermPosition> {
    let mut sorted: Vec<&SolarTermEntry> = table.iter().collect();
    sorted.sort_by_key(|t| (t.month, t.day));
    let first = *sorted.first()?;
    let last = *sorted.last()?;

    let query = (month, day);
    let idx = sorted.iter().rposition(|t| (t.month, t.day) <= query);

    let (current, next) = match idx {
        None => (last, first),
        Some(i) => (sorted[i], sorted.get(i + 1).copied().unwrap_or(first)),
    };

    Some(TermPosition {
        current: current.name.clone(),
        next: next.name.clone(),
        next_date: next.date_label(),
    })
}
