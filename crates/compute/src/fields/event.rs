//! Event countdown fields.

use std::sync::Arc;

use almanac_core::{AnniversaryEntry, ScopeConfig, MAX_EVENTS};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};

use super::{notification_for, signature};
use crate::anniversary::{AnniversaryAnchor, ResolveError};
use crate::error::FieldError;
use crate::registry::{DroppedEntry, FieldCompute, FieldContext, FieldId, FieldOutput, FieldSpec};
use crate::scheduler::Cadence;

/// State of an event whose next date cannot be found.
pub const UNRESOLVABLE: &str = "无法计算下一个日期";

/// How long a full countdown shows `已到时间` before it expires.
const DUE_WINDOW_SECS: i64 = 3600;

#[derive(Debug, Clone, Copy)]
enum When {
    /// A one-off Gregorian date.
    Once(NaiveDate),
    /// A lunar month and day, recurring every lunar year.
    Yearly(AnniversaryAnchor),
}

pub(crate) fn specs(scope: &ScopeConfig, dropped: &mut Vec<DroppedEntry>) -> Vec<FieldSpec> {
    let mut specs = Vec::new();
    for (i, entry) in scope.events.iter().enumerate() {
        if i >= MAX_EVENTS {
            dropped.push(DroppedEntry::new(
                &scope.id,
                &entry.name,
                format!("more than {MAX_EVENTS} events"),
            ));
            continue;
        }
        let when = match parse_when(entry) {
            Ok(when) => when,
            Err(reason) => {
                dropped.push(DroppedEntry::new(&scope.id, &entry.name, reason));
                continue;
            }
        };
        specs.push(FieldSpec {
            id: FieldId::new(&scope.id, &entry.name),
            cadence: if entry.full_countdown {
                Cadence::QuarterHour
            } else {
                Cadence::Hourly
            },
            is_main: true,
            signature: signature("event", entry),
            compute: Arc::new(EventField {
                entry: entry.clone(),
                when,
            }),
        });
    }
    specs
}

fn parse_when(entry: &AnniversaryEntry) -> Result<When, String> {
    if entry.is_lunar {
        let (_, month, day) = entry.lunar_parts().map_err(|e| e.to_string())?;
        AnniversaryAnchor::new(month, day, entry.leap_month)
            .map(When::Yearly)
            .map_err(|e| e.to_string())
    } else {
        entry
            .gregorian_instant()
            .map(|i| When::Once(i.date()))
            .map_err(|e| e.to_string())
    }
}

struct EventField {
    entry: AnniversaryEntry,
    when: When,
}

impl EventField {
    fn attributes(&self, output: FieldOutput) -> FieldOutput {
        let service = self
            .entry
            .notification
            .as_ref()
            .map_or("关闭".to_string(), |n| n.service.clone());
        output
            .attr("描述", self.entry.description.clone().unwrap_or_default())
            .attr("日期", &self.entry.date)
            .attr("自动删除", on_off(self.entry.auto_remove))
            .attr("完整倒计时", on_off(self.entry.full_countdown))
            .attr("通知服务", service)
    }

    /// Whole-day countdown to `date`.
    fn by_day(&self, date: NaiveDate, days: i64) -> FieldOutput {
        match days {
            d if d < -1 && self.entry.auto_remove => FieldOutput::new("已过期").retired(),
            d if d < 0 => FieldOutput::new("已过期"),
            0 => FieldOutput::new("今天").notify(notification_for(&self.entry, 0, date)),
            d => FieldOutput::new(format!("还有{d}天")),
        }
    }

    /// Countdown to the second. `remaining` may be negative.
    fn to_the_second(&self, target: NaiveDateTime, remaining: Duration) -> FieldOutput {
        let secs = remaining.num_seconds();
        let days = secs.div_euclid(86_400);
        if days < -1 && self.entry.auto_remove {
            return FieldOutput::new("已过期").retired();
        }
        match secs {
            s if s <= -DUE_WINDOW_SECS => FieldOutput::new("已过期"),
            s if s <= 0 => {
                FieldOutput::new("已到时间").notify(notification_for(&self.entry, 0, target.date()))
            }
            s => FieldOutput::new(format_countdown(s)),
        }
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag { "开启" } else { "关闭" }
}

/// `N天H时M分S秒`; under a day, only the non-zero units.
pub fn format_countdown(secs: i64) -> String {
    let (days, rest) = (secs.div_euclid(86_400), secs.rem_euclid(86_400));
    let (h, m, s) = (rest / 3600, rest % 3600 / 60, rest % 60);
    if days > 0 {
        return format!("{days}天{h}时{m}分{s}秒");
    }
    let mut out = String::new();
    for (n, unit) in [(h, "时"), (m, "分"), (s, "秒")] {
        if n > 0 {
            out.push_str(&format!("{n}{unit}"));
        }
    }
    if out.is_empty() {
        out.push_str("0秒");
    }
    out
}

#[async_trait]
impl FieldCompute for EventField {
    async fn compute(&self, ctx: &FieldContext) -> Result<FieldOutput, FieldError> {
        let today = ctx.today();
        let time = self.entry.countdown_time();
        let date = match self.when {
            When::Once(date) => date,
            When::Yearly(anchor) => {
                let mut next = ctx.resolver.next_occurrence(anchor, today).await;
                // Today's occurrence is over for a full countdown once its
                // due window has passed.
                let over = matches!(&next, Ok(d) if *d == today)
                    && ctx.now - today.and_time(time) >= Duration::seconds(DUE_WINDOW_SECS);
                if self.entry.full_countdown && over {
                    if let Some(tomorrow) = today.succ_opt() {
                        next = ctx.resolver.next_occurrence(anchor, tomorrow).await;
                    }
                }
                match next {
                    Ok(next) => next,
                    Err(ResolveError::Exhausted { .. }) => {
                        return Ok(self.attributes(FieldOutput::new(UNRESOLVABLE)));
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        let output = if self.entry.full_countdown {
            let target = date.and_time(time);
            self.to_the_second(target, target - ctx.now)
        } else {
            self.by_day(date, (date - today).num_days())
        };
        let output = self.attributes(output);
        Ok(match self.when {
            When::Yearly(_) => output.attr("下次日期", date.format("%Y-%m-%d").to_string()),
            When::Once(_) => output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope_with(events: Vec<AnniversaryEntry>) -> ScopeConfig {
        let mut scope = ScopeConfig::new("home");
        scope.event_enabled = true;
        scope.events = events;
        scope
    }

    #[test]
    fn malformed_entries_are_dropped_and_the_rest_build() {
        let scope = scope_with(vec![
            AnniversaryEntry::new("婚礼", "2025/10/01"),
            AnniversaryEntry::new("坏", "2025/13/01"),
            AnniversaryEntry::new("庙会", "2025/01/31").lunar(false),
            AnniversaryEntry::new("", "2025/10/01"),
        ]);
        let mut dropped = Vec::new();
        let specs = specs(&scope, &mut dropped);
        let names: Vec<_> = specs.iter().map(|s| s.id.name.as_str()).collect();
        assert_eq!(names, vec!["婚礼"]);
        assert_eq!(dropped.len(), 3);
    }

    #[test]
    fn events_beyond_the_limit_are_dropped() {
        let events = (0..MAX_EVENTS + 2)
            .map(|i| AnniversaryEntry::new(format!("e{i}"), "2025/10/01"))
            .collect();
        let mut dropped = Vec::new();
        assert_eq!(specs(&scope_with(events), &mut dropped).len(), MAX_EVENTS);
        assert_eq!(dropped.len(), 2);
    }

    #[test]
    fn full_countdown_runs_on_the_quarter_hour() {
        let mut dropped = Vec::new();
        let specs = specs(
            &scope_with(vec![
                AnniversaryEntry::new("婚礼", "2025/10/01"),
                AnniversaryEntry::new("发布会", "2025/10/01/20").full_countdown(),
            ]),
            &mut dropped,
        );
        assert_eq!(specs[0].cadence, Cadence::Hourly);
        assert_eq!(specs[1].cadence, Cadence::QuarterHour);
    }

    #[test]
    fn countdown_formatting() {
        assert_eq!(format_countdown(2 * 86_400 + 3 * 3600 + 4 * 60 + 5), "2天3时4分5秒");
        assert_eq!(format_countdown(86_400), "1天0时0分0秒");
        assert_eq!(format_countdown(3 * 3600 + 5), "3时5秒");
        assert_eq!(format_countdown(59), "59秒");
        assert_eq!(format_countdown(0), "0秒");
    }

    fn field(entry: AnniversaryEntry) -> EventField {
        let when = parse_when(&entry).unwrap();
        EventField { entry, when }
    }

    #[test]
    fn full_countdown_states_around_the_target() {
        let event = field(
            AnniversaryEntry::new("发布会", "2025/10/01/20")
                .full_countdown()
                .with_notification("wechat", "开始了"),
        );
        let target = NaiveDate::from_ymd_opt(2025, 10, 1)
            .unwrap()
            .and_hms_opt(20, 0, 0)
            .unwrap();
        let state = |secs: i64| event.to_the_second(target, Duration::seconds(secs));

        assert_eq!(state(90_061).value, "1天1时1分1秒");
        assert_eq!(state(1_800).value, "30分");
        let due = state(0);
        assert_eq!(due.value, "已到时间");
        assert!(due.notification.is_some());
        assert_eq!(state(-3_599).value, "已到时间");
        assert_eq!(state(-3_600).value, "已过期");
        assert!(!state(-3 * 86_400).retire);
    }

    #[test]
    fn full_countdown_auto_remove_retires_a_day_past_the_target() {
        let mut entry = AnniversaryEntry::new("发布会", "2025/10/01").full_countdown();
        entry.auto_remove = true;
        let event = field(entry);
        let target = NaiveDate::from_ymd_opt(2025, 10, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert!(!event.to_the_second(target, Duration::hours(-23)).retire);
        assert!(event.to_the_second(target, Duration::hours(-25)).retire);
    }

    #[test]
    fn signature_tracks_configuration() {
        let mut dropped = Vec::new();
        let a = specs(&scope_with(vec![AnniversaryEntry::new("婚礼", "2025/10/01")]), &mut dropped);
        let b = specs(&scope_with(vec![AnniversaryEntry::new("婚礼", "2025/10/02")]), &mut dropped);
        assert_ne!(a[0].signature, b[0].signature);
    }
}
