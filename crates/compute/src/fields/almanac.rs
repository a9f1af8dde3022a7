//! The daily almanac fields of a scope.

use std::sync::Arc;

use almanac_core::{LunarSnapshot, ScopeConfig};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDateTime};

use super::{double_hour, join_or, moon, signature};
use crate::error::FieldError;
use crate::registry::{DroppedEntry, FieldCompute, FieldContext, FieldId, FieldOutput, FieldSpec};
use crate::scheduler::Cadence;
use crate::solar_term;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlmanacKey {
    Date,
    Lunar,
    WeekDay,
    Holiday,
    WeekNumber,
    EightCharacters,
    SolarTerm,
    Season,
    TwoHourLuck,
    ZodiacClash,
    StarSign,
    PengZu,
    DayOfficer,
    Mansion,
    Nayin,
    GodDirections,
    LuckyGods,
    UnluckyGods,
    DoubleHour,
    SixLuminaries,
    DayFortune,
    MoonPhase,
}

impl AlmanacKey {
    pub const ALL: [AlmanacKey; 22] = [
        AlmanacKey::Date,
        AlmanacKey::Lunar,
        AlmanacKey::WeekDay,
        AlmanacKey::Holiday,
        AlmanacKey::WeekNumber,
        AlmanacKey::EightCharacters,
        AlmanacKey::SolarTerm,
        AlmanacKey::Season,
        AlmanacKey::TwoHourLuck,
        AlmanacKey::ZodiacClash,
        AlmanacKey::StarSign,
        AlmanacKey::PengZu,
        AlmanacKey::DayOfficer,
        AlmanacKey::Mansion,
        AlmanacKey::Nayin,
        AlmanacKey::GodDirections,
        AlmanacKey::LuckyGods,
        AlmanacKey::UnluckyGods,
        AlmanacKey::DoubleHour,
        AlmanacKey::SixLuminaries,
        AlmanacKey::DayFortune,
        AlmanacKey::MoonPhase,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            AlmanacKey::Date => "日期",
            AlmanacKey::Lunar => "农历",
            AlmanacKey::WeekDay => "星期",
            AlmanacKey::Holiday => "今日节日",
            AlmanacKey::WeekNumber => "周数",
            AlmanacKey::EightCharacters => "八字",
            AlmanacKey::SolarTerm => "节气",
            AlmanacKey::Season => "季节",
            AlmanacKey::TwoHourLuck => "时辰凶吉",
            AlmanacKey::ZodiacClash => "生肖冲煞",
            AlmanacKey::StarSign => "星座",
            AlmanacKey::PengZu => "彭祖百忌",
            AlmanacKey::DayOfficer => "十二神",
            AlmanacKey::Mansion => "廿八宿",
            AlmanacKey::Nayin => "纳音",
            AlmanacKey::GodDirections => "吉神方位",
            AlmanacKey::LuckyGods => "今日吉神",
            AlmanacKey::UnluckyGods => "今日凶煞",
            AlmanacKey::DoubleHour => "时辰",
            AlmanacKey::SixLuminaries => "六曜",
            AlmanacKey::DayFortune => "日禄",
            AlmanacKey::MoonPhase => "月相",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.key() == key)
    }

    pub fn cadence(&self) -> Cadence {
        match self {
            AlmanacKey::DoubleHour => Cadence::QuarterHour,
            AlmanacKey::TwoHourLuck => Cadence::BiHour,
            _ => Cadence::Hourly,
        }
    }
}

/// Specs for every enabled almanac key of `scope`.
pub(crate) fn specs(scope: &Arc<ScopeConfig>, dropped: &mut Vec<DroppedEntry>) -> Vec<FieldSpec> {
    if !scope.almanac_enabled {
        return Vec::new();
    }
    if let Some(allow) = &scope.fields {
        for unknown in allow.iter().filter(|k| AlmanacKey::from_key(k).is_none()) {
            dropped.push(DroppedEntry::new(&scope.id, unknown, "unknown almanac field"));
        }
    }

    AlmanacKey::ALL
        .into_iter()
        .filter(|k| scope.field_enabled(k.key()))
        .map(|key| {
            let is_main = scope.is_main(key.key());
            // Only the holiday field reads scope data beyond its key.
            let signature = match key {
                AlmanacKey::Holiday => {
                    signature(key.key(), &(is_main, &scope.holidays, &scope.workdays))
                }
                _ => signature(key.key(), &is_main),
            };
            FieldSpec {
                id: FieldId::new(&scope.id, key.key()),
                cadence: key.cadence(),
                is_main,
                signature,
                compute: Arc::new(AlmanacField {
                    key,
                    scope: Arc::clone(scope),
                }),
            }
        })
        .collect()
}

struct AlmanacField {
    key: AlmanacKey,
    scope: Arc<ScopeConfig>,
}

#[async_trait]
impl FieldCompute for AlmanacField {
    async fn compute(&self, ctx: &FieldContext) -> Result<FieldOutput, FieldError> {
        let snapshot = ctx.snapshot().await?;
        render(self.key, &snapshot, ctx.now, &self.scope)
    }
}

/// Render one almanac field from a snapshot.
pub fn render(
    key: AlmanacKey,
    s: &LunarSnapshot,
    now: NaiveDateTime,
    scope: &ScopeConfig,
) -> Result<FieldOutput, FieldError> {
    let output = match key {
        AlmanacKey::Date => FieldOutput::new(now.format("%Y-%m-%d").to_string()),
        AlmanacKey::Lunar => FieldOutput::new(format!(
            "{}({})年 {}",
            s.year_ganzhi,
            s.zodiac,
            s.lunar_date_name()
        )),
        AlmanacKey::WeekDay => FieldOutput::new(&s.week_day),
        AlmanacKey::Holiday => {
            let value = match scope.holiday_label(now.date()) {
                Some(label) => label.to_string(),
                None => join_or(&s.holidays, "暂无节日"),
            };
            FieldOutput::new(value)
        }
        AlmanacKey::WeekNumber => FieldOutput::new(format!("{}周", now.iso_week().week())),
        AlmanacKey::EightCharacters => FieldOutput::new(s.eight_characters()),
        AlmanacKey::SolarTerm => {
            let pos = solar_term::locate(&s.solar_terms, now.month(), now.day())
                .ok_or_else(|| FieldError::Failed("empty solar-term table".to_string()))?;
            FieldOutput::new(pos.current).attr("下一节气", format!("{} ({})", pos.next, pos.next_date))
        }
        AlmanacKey::Season => FieldOutput::new(&s.season),
        AlmanacKey::TwoHourLuck => two_hour_luck(s, now)?,
        AlmanacKey::ZodiacClash => FieldOutput::new(&s.zodiac_clash),
        AlmanacKey::StarSign => FieldOutput::new(&s.star_sign),
        AlmanacKey::PengZu => FieldOutput::new(s.peng_zu_taboos.join(" ")),
        AlmanacKey::DayOfficer => FieldOutput::new(&s.day_officer),
        AlmanacKey::Mansion => FieldOutput::new(&s.lunar_mansion),
        AlmanacKey::Nayin => FieldOutput::new(&s.nayin),
        AlmanacKey::GodDirections => FieldOutput::new(s.god_directions.join(" ")),
        AlmanacKey::LuckyGods => FieldOutput::new(join_or(&s.lucky_gods, "无")),
        AlmanacKey::UnluckyGods => FieldOutput::new(join_or(&s.unlucky_gods, "无")),
        AlmanacKey::DoubleHour => {
            FieldOutput::new(double_hour::label(now.time())).attr("干支", &s.hour_ganzhi)
        }
        AlmanacKey::SixLuminaries => FieldOutput::new(six_luminaries(s.lunar_month, s.lunar_day)),
        AlmanacKey::DayFortune => {
            let (stem, branch) = s
                .day_stem()
                .zip(s.day_branch())
                .ok_or_else(|| FieldError::Failed(format!("malformed day pillar {:?}", s.day_ganzhi)))?;
            FieldOutput::new(day_fortune(stem, branch))
        }
        AlmanacKey::MoonPhase => moon::render(s),
    };
    Ok(output)
}

fn two_hour_luck(s: &LunarSnapshot, now: NaiveDateTime) -> Result<FieldOutput, FieldError> {
    if s.two_hour_lucky.len() != double_hour::TIME_RANGES.len() {
        return Err(FieldError::Failed(format!(
            "two-hour table has {} entries",
            s.two_hour_lucky.len()
        )));
    }
    let current = double_hour::period_index(now.time());
    let mut output = FieldOutput::new(format!(
        "{} {}",
        double_hour::TIME_RANGES[current],
        s.two_hour_lucky[current]
    ));
    for (range, mark) in double_hour::TIME_RANGES.iter().zip(&s.two_hour_lucky) {
        output = output.attr(*range, mark);
    }
    Ok(output)
}

const SIX_LUMINARIES: [&str; 6] = ["大安", "赤口", "先胜", "友引", "先负", "空亡"];

/// 六曜: 正月初一 is 先胜; each month starts one step further along.
pub fn six_luminaries(lunar_month: u32, lunar_day: u32) -> &'static str {
    SIX_LUMINARIES[((lunar_month + lunar_day) % 6) as usize]
}

/// 日禄: where the day stem's emolument sits relative to the day branch.
pub fn day_fortune(stem: char, branch: char) -> String {
    let (lu, neighbour) = match stem {
        '甲' => ('寅', '卯'),
        '乙' => ('卯', '辰'),
        '丙' | '戊' => ('巳', '午'),
        '丁' | '己' => ('午', '未'),
        '庚' => ('申', '酉'),
        '辛' => ('酉', '戌'),
        '壬' => ('亥', '子'),
        _ => ('子', '丑'),
    };
    if branch == lu {
        format!("{branch}命进禄")
    } else if branch == neighbour {
        format!("{branch}命互禄")
    } else {
        format!("{stem}命进{lu}禄")
    }
}
