use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One solar term boundary within a Gregorian year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolarTermEntry {
    pub name: String,
    pub month: u32,
    pub day: u32,
}

impl SolarTermEntry {
    pub fn new(name: impl Into<String>, month: u32, day: u32) -> Self {
        Self {
            name: name.into(),
            month,
            day,
        }
    }

    /// `1月5日` style label.
    pub fn date_label(&self) -> String {
        format!("{}月{}日", self.month, self.day)
    }
}

/// Every derived calendar fact for one instant.
///
/// Produced by a calendar provider and shared read-only behind an `Arc`.
/// The cache never looks inside; only the field recompute functions do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LunarSnapshot {
    /// The instant this snapshot was derived for (a bucket start).
    pub instant: NaiveDateTime,

    // Stem-branch pairs, two characters each.
    pub year_ganzhi: String,
    pub month_ganzhi: String,
    pub day_ganzhi: String,
    pub hour_ganzhi: String,

    pub lunar_year: i32,
    pub lunar_month: u32,
    pub lunar_day: u32,
    pub is_leap_month: bool,
    /// Days since the preceding new moon.
    #[serde(default)]
    pub moon_age: f64,
    /// `正月`, `闰六月`, `冬月`.
    pub lunar_month_name: String,
    /// `初一`, `十五`, `廿三`.
    pub lunar_day_name: String,

    pub zodiac: String,
    pub week_day: String,
    pub season: String,
    /// `冲狗(庚戌)煞南`.
    pub zodiac_clash: String,
    pub star_sign: String,

    /// Terms of the instant's Gregorian year, in calendar order.
    pub solar_terms: Vec<SolarTermEntry>,
    pub holidays: Vec<String>,

    pub peng_zu_taboos: Vec<String>,
    /// Twelve day officers (建除十二神), e.g. `建日`.
    pub day_officer: String,
    pub lunar_mansion: String,
    pub nayin: String,
    /// `喜神:东北` style entries.
    pub god_directions: Vec<String>,
    pub lucky_gods: Vec<String>,
    pub unlucky_gods: Vec<String>,
    /// Twelve `吉`/`凶` marks, index 0 is the 子 period.
    pub two_hour_lucky: Vec<String>,
}

impl LunarSnapshot {
    /// Heavenly stem of the day.
    pub fn day_stem(&self) -> Option<char> {
        self.day_ganzhi.chars().next()
    }

    /// Earthly branch of the day.
    pub fn day_branch(&self) -> Option<char> {
        self.day_ganzhi.chars().nth(1)
    }

    /// `正月初一`.
    pub fn lunar_date_name(&self) -> String {
        format!("{}{}", self.lunar_month_name, self.lunar_day_name)
    }

    /// Four pillars joined by spaces.
    pub fn eight_characters(&self) -> String {
        format!(
            "{} {} {} {}",
            self.year_ganzhi, self.month_ganzhi, self.day_ganzhi, self.hour_ganzhi
        )
    }

    pub fn term_named(&self, name: &str) -> Option<&SolarTermEntry> {
        self.solar_terms.iter().find(|t| t.name == name)
    }
}
