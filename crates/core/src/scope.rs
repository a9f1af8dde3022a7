//! Per-scope configuration: which almanac fields to derive, and the
//! people and events whose anniversaries are counted down.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::AlmanacError;

/// Most persons tracked per scope.
pub const MAX_PERSONS: usize = 5;
/// Most events tracked per scope.
pub const MAX_EVENTS: usize = 30;

fn default_true() -> bool {
    true
}

fn default_main_fields() -> Vec<String> {
    ["日期", "农历", "八字"].iter().map(|s| s.to_string()).collect()
}

/// One configuration entry. Fields and exports are grouped by scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub almanac_enabled: bool,
    /// Allow-list of almanac field keys. `None` enables all of them.
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    #[serde(default = "default_main_fields")]
    pub main_fields: Vec<String>,
    /// `YYYY-MM-DD` → label, takes precedence over computed holidays.
    #[serde(default)]
    pub holidays: BTreeMap<String, String>,
    /// `YYYY-MM-DD` → label for make-up workdays.
    #[serde(default)]
    pub workdays: BTreeMap<String, String>,
    #[serde(default)]
    pub birthday_enabled: bool,
    #[serde(default)]
    pub persons: Vec<AnniversaryEntry>,
    #[serde(default)]
    pub event_enabled: bool,
    #[serde(default)]
    pub events: Vec<AnniversaryEntry>,
}

impl ScopeConfig {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            almanac_enabled: true,
            fields: None,
            main_fields: default_main_fields(),
            holidays: BTreeMap::new(),
            workdays: BTreeMap::new(),
            birthday_enabled: false,
            persons: Vec::new(),
            event_enabled: false,
            events: Vec::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { &self.id } else { &self.name }
    }

    /// Whether an almanac field key is enabled by the allow-list.
    pub fn field_enabled(&self, key: &str) -> bool {
        self.almanac_enabled
            && self
                .fields
                .as_ref()
                .map_or(true, |allow| allow.iter().any(|f| f == key))
    }

    pub fn is_main(&self, key: &str) -> bool {
        self.main_fields.iter().any(|f| f == key)
    }

    /// Holiday override, then workday label, for a date.
    pub fn holiday_label(&self, date: NaiveDate) -> Option<&str> {
        let key = date.format("%Y-%m-%d").to_string();
        self.holidays
            .get(&key)
            .or_else(|| self.workdays.get(&key))
            .map(String::as_str)
    }
}

/// Where and what to send when a countdown reaches zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationDirective {
    pub service: String,
    #[serde(default)]
    pub message: String,
}

/// A person's birthday or a dated event.
///
/// For persons `date` is always the Gregorian birth instant and the lunar
/// anchor is derived from it. For events with `is_lunar`, the month and day
/// of `date` are a lunar month and day, recurring every lunar year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnniversaryEntry {
    pub name: String,
    pub date: String,
    #[serde(default)]
    pub is_lunar: bool,
    #[serde(default)]
    pub leap_month: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub auto_remove: bool,
    /// Count down to the hour and second instead of whole days.
    #[serde(default)]
    pub full_countdown: bool,
    #[serde(default)]
    pub notification: Option<NotificationDirective>,
}

impl AnniversaryEntry {
    pub fn new(name: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            date: date.into(),
            is_lunar: false,
            leap_month: false,
            description: None,
            auto_remove: false,
            full_countdown: false,
            notification: None,
        }
    }

    pub fn full_countdown(mut self) -> Self {
        self.full_countdown = true;
        self
    }

    pub fn lunar(mut self, leap_month: bool) -> Self {
        self.is_lunar = true;
        self.leap_month = leap_month;
        self
    }

    pub fn with_notification(mut self, service: &str, message: &str) -> Self {
        self.notification = Some(NotificationDirective {
            service: service.to_string(),
            message: message.to_string(),
        });
        self
    }

    fn invalid(&self, reason: impl Into<String>) -> AlmanacError {
        AlmanacError::InvalidAnniversary {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }

    /// The entry's date as a Gregorian instant.
    pub fn gregorian_instant(&self) -> Result<NaiveDateTime, AlmanacError> {
        if self.name.trim().is_empty() {
            return Err(self.invalid("empty name"));
        }
        parse_instant(&self.date).map_err(|e| self.invalid(e.to_string()))
    }

    /// Time of day a full countdown runs to: the entry's hour, else noon.
    pub fn countdown_time(&self) -> NaiveTime {
        let hour = split_date(&self.date).and_then(|p| p.hour).unwrap_or(12);
        NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN)
    }

    /// The entry's date read as lunar `(year, month, day)` numbers.
    pub fn lunar_parts(&self) -> Result<(i32, u32, u32), AlmanacError> {
        if self.name.trim().is_empty() {
            return Err(self.invalid("empty name"));
        }
        let parts = split_date(&self.date).ok_or_else(|| self.invalid("malformed date"))?;
        if !(1..=12).contains(&parts.month) || !(1..=30).contains(&parts.day) {
            return Err(self.invalid(format!(
                "lunar month {} day {} out of range",
                parts.month, parts.day
            )));
        }
        Ok((parts.year, parts.month, parts.day))
    }
}

struct DateParts {
    year: i32,
    month: u32,
    day: u32,
    hour: Option<u32>,
}

fn split_date(value: &str) -> Option<DateParts> {
    let value = value.trim();
    let sep = if value.contains('/') { '/' } else { '-' };
    let mut it = value.split(sep);
    let year = it.next()?.trim().parse().ok()?;
    let month = it.next()?.trim().parse().ok()?;
    let day = it.next()?.trim().parse().ok()?;
    let hour = match it.next() {
        Some(h) if sep == '/' => Some(h.trim().parse().ok()?),
        Some(_) => return None,
        None => None,
    };
    if it.next().is_some() {
        return None;
    }
    Some(DateParts {
        year,
        month,
        day,
        hour,
    })
}

/// Parse `YYYY/MM/DD/HH`, `YYYY/MM/DD` or `YYYY-MM-DD` into an instant.
pub fn parse_instant(value: &str) -> Result<NaiveDateTime, AlmanacError> {
    let invalid = |reason: &str| AlmanacError::InvalidDate {
        value: value.to_string(),
        reason: reason.to_string(),
    };
    let parts = split_date(value).ok_or_else(|| invalid("expected YYYY/MM/DD[/HH] or YYYY-MM-DD"))?;
    let date = NaiveDate::from_ymd_opt(parts.year, parts.month, parts.day)
        .ok_or_else(|| invalid("no such calendar date"))?;
    let time = NaiveTime::from_hms_opt(parts.hour.unwrap_or(0), 0, 0)
        .ok_or_else(|| invalid("hour out of range"))?;
    Ok(date.and_time(time))
}

/// Parse a calendar date (`YYYY-MM-DD` or `YYYY/MM/DD`).
pub fn parse_date(value: &str) -> Result<NaiveDate, AlmanacError> {
    parse_instant(value).map(|i| i.date())
}
