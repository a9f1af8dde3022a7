//! Per-person birthday fields.

use std::sync::Arc;

use almanac_core::{AnniversaryEntry, LunarSnapshot, ScopeConfig, MAX_PERSONS};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveDateTime};

use super::{fortune, notification_for, signature};
use crate::anniversary::{AnniversaryAnchor, ResolveError};
use crate::error::FieldError;
use crate::provider::tables::{self, ELEMENTS_BY_STEM};
use crate::provider::CalendarProvider;
use crate::registry::{DroppedEntry, FieldCompute, FieldContext, FieldId, FieldOutput, FieldSpec};
use crate::scheduler::Cadence;

/// State of a lunar birthday countdown whose next date cannot be found.
pub const UNRESOLVABLE: &str = "无法计算下一个生日日期";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonField {
    SolarBirthday,
    LunarBirthday,
    EightCharacters,
    LunarCountdown,
    SolarCountdown,
    StarSign,
    LuckyElement,
    DailyFortune,
    DaysAlive,
    Age,
}

impl PersonField {
    pub const ALL: [PersonField; 10] = [
        PersonField::SolarBirthday,
        PersonField::LunarBirthday,
        PersonField::EightCharacters,
        PersonField::LunarCountdown,
        PersonField::SolarCountdown,
        PersonField::StarSign,
        PersonField::LuckyElement,
        PersonField::DailyFortune,
        PersonField::DaysAlive,
        PersonField::Age,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            PersonField::SolarBirthday => "阳历生日",
            PersonField::LunarBirthday => "农历生日",
            PersonField::EightCharacters => "八字",
            PersonField::LunarCountdown => "生日提醒_农",
            PersonField::SolarCountdown => "生日提醒_阳",
            PersonField::StarSign => "星座",
            PersonField::LuckyElement => "喜用神",
            PersonField::DailyFortune => "今日运势",
            PersonField::DaysAlive => "生存天数",
            PersonField::Age => "周岁",
        }
    }

    fn is_diagnostic(&self) -> bool {
        matches!(
            self,
            PersonField::StarSign
                | PersonField::LuckyElement
                | PersonField::DailyFortune
                | PersonField::DaysAlive
                | PersonField::Age
        )
    }

    fn cadence(&self) -> Cadence {
        match self {
            PersonField::LunarCountdown | PersonField::SolarCountdown | PersonField::DailyFortune => {
                Cadence::Midnight
            }
            _ => Cadence::Hourly,
        }
    }
}

/// A person's birth data, derived once per registry build.
struct Person {
    entry: AnniversaryEntry,
    birth: NaiveDateTime,
    birth_snapshot: LunarSnapshot,
    anchor: AnniversaryAnchor,
}

pub(crate) fn specs(
    scope: &ScopeConfig,
    provider: &dyn CalendarProvider,
    dropped: &mut Vec<DroppedEntry>,
) -> Vec<FieldSpec> {
    let mut specs = Vec::new();
    for (i, entry) in scope.persons.iter().enumerate() {
        if i >= MAX_PERSONS {
            dropped.push(DroppedEntry::new(
                &scope.id,
                &entry.name,
                format!("more than {MAX_PERSONS} persons"),
            ));
            continue;
        }
        let birth = match entry.gregorian_instant() {
            Ok(birth) => birth,
            Err(e) => {
                dropped.push(DroppedEntry::new(&scope.id, &entry.name, e.to_string()));
                continue;
            }
        };
        let birth_snapshot = match provider.derive(birth) {
            Ok(s) => s,
            Err(e) => {
                dropped.push(DroppedEntry::new(&scope.id, &entry.name, e.to_string()));
                continue;
            }
        };

        let person = Arc::new(Person {
            entry: entry.clone(),
            birth,
            anchor: AnniversaryAnchor::of(&birth_snapshot),
            birth_snapshot,
        });
        let sig = signature("person", entry);
        for kind in PersonField::ALL {
            specs.push(FieldSpec {
                id: FieldId::new(&scope.id, format!("{}_{}", entry.name, kind.suffix())),
                cadence: kind.cadence(),
                is_main: !kind.is_diagnostic(),
                signature: sig.clone(),
                compute: Arc::new(PersonFieldCompute {
                    kind,
                    person: Arc::clone(&person),
                }),
            });
        }
    }
    specs
}

struct PersonFieldCompute {
    kind: PersonField,
    person: Arc<Person>,
}

#[async_trait]
impl FieldCompute for PersonFieldCompute {
    async fn compute(&self, ctx: &FieldContext) -> Result<FieldOutput, FieldError> {
        let p = &self.person;
        let today = ctx.today();
        let birth_date = p.birth.date();
        let output = match self.kind {
            PersonField::SolarBirthday => FieldOutput::new(p.birth.format("%y年%m月%d日").to_string()),
            PersonField::LunarBirthday => FieldOutput::new(p.birth_snapshot.lunar_date_name()),
            PersonField::EightCharacters => {
                let s = &p.birth_snapshot;
                FieldOutput::new(format!(
                    "{}年{}月{}日{}时",
                    s.year_ganzhi, s.month_ganzhi, s.day_ganzhi, s.hour_ganzhi
                ))
            }
            PersonField::LunarCountdown => {
                match ctx.resolver.next_occurrence(p.anchor, today).await {
                    Ok(next) => {
                        let days = (next - today).num_days();
                        let value = if days == 0 {
                            "今天是生日".to_string()
                        } else {
                            format!("农历生日还有{days}天")
                        };
                        FieldOutput::new(value)
                            .attr("下个生日", format!("阳历：{}", next.format("%Y-%m-%d")))
                            .notify(notification_at_zero(&p.entry, days, next))
                    }
                    Err(ResolveError::Exhausted { .. }) => FieldOutput::new(UNRESOLVABLE),
                    Err(e) => return Err(e.into()),
                }
            }
            PersonField::SolarCountdown => {
                let next = next_solar_birthday(birth_date, today)
                    .ok_or_else(|| FieldError::Failed(format!("no birthday after {today}")))?;
                let days = (next - today).num_days();
                let value = if days == 0 {
                    "今天是生日".to_string()
                } else {
                    format!("阳历生日还有{days}天")
                };
                FieldOutput::new(value)
                    .attr("下个生日", next.format("%Y-%m-%d").to_string())
                    .notify(notification_at_zero(&p.entry, days, next))
            }
            PersonField::StarSign => FieldOutput::new(tables::star_sign(birth_date.month(), birth_date.day())),
            PersonField::LuckyElement => {
                let stem = p.birth_snapshot.day_stem().and_then(tables::stem_index).ok_or_else(|| {
                    FieldError::Failed(format!("malformed day pillar {:?}", p.birth_snapshot.day_ganzhi))
                })?;
                let element = ELEMENTS_BY_STEM[stem];
                FieldOutput::new(format!(
                    "{}，五行：{}({})",
                    lucky_colour(p.birth),
                    element,
                    element_traits(element)
                ))
            }
            PersonField::DailyFortune => {
                let snapshot = ctx.day_snapshot().await?;
                let reading = fortune::read(
                    &p.entry.name,
                    &p.birth_snapshot.day_ganzhi,
                    &snapshot.day_ganzhi,
                    full_years(birth_date, today),
                );
                FieldOutput::new(reading.relation)
                    .attr("运势等级", reading.level)
                    .attr("运势详解", reading.detail)
                    .attr("行动建议", reading.advice)
                    .attr("日元", &p.birth_snapshot.day_ganzhi)
                    .attr("今日天干地支", &snapshot.day_ganzhi)
            }
            PersonField::DaysAlive => {
                FieldOutput::new(format!("您在地球存活了 {} 天", (today - birth_date).num_days()))
            }
            PersonField::Age => FieldOutput::new(format!("{}岁", full_years(birth_date, today))),
        };
        Ok(output)
    }
}

fn notification_at_zero(
    entry: &AnniversaryEntry,
    days: i64,
    date: NaiveDate,
) -> Option<crate::registry::NotificationRequest> {
    if days == 0 {
        notification_for(entry, days, date)
    } else {
        None
    }
}

/// Next Gregorian birthday on or after `today`. Feb 29 falls back to Feb 28
/// in common years.
pub fn next_solar_birthday(birth: NaiveDate, today: NaiveDate) -> Option<NaiveDate> {
    (today.year()..=today.year() + 1)
        .filter_map(|year| {
            NaiveDate::from_ymd_opt(year, birth.month(), birth.day())
                .or_else(|| NaiveDate::from_ymd_opt(year, 2, 28))
        })
        .find(|d| *d >= today)
}

/// Completed years between `birth` and `today`.
pub fn full_years(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    years
}

/// Colour from the digit root of the birth instant's `YYYYMMDDHH` digits.
pub fn lucky_colour(birth: NaiveDateTime) -> &'static str {
    let digits = birth.format("%Y%m%d%H").to_string();
    let mut sum: u32 = digits.chars().filter_map(|c| c.to_digit(10)).sum();
    while sum > 9 {
        sum = sum.to_string().chars().filter_map(|c| c.to_digit(10)).sum();
    }
    match sum {
        1 | 2 => "红色",
        3 | 4 => "绿色",
        5 | 6 => "黄色",
        7 | 8 => "蓝色",
        _ => "白色",
    }
}

fn element_traits(element: &str) -> &'static str {
    match element {
        "木" => "生长、向上、清雅",
        "火" => "温暖、活力、激情",
        "土" => "稳重、包容、务实",
        "金" => "坚毅、果断、正直",
        _ => "智慧、灵活、适应",
    }
}
