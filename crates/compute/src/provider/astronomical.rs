use almanac_core::{LunarSnapshot, SolarTermEntry};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

use super::astro::{jdn, julian_day, moon_age, solar_term_dates, sun_longitude};
use super::lunisolar::{solar_to_lunar, LunarDate};
use super::tables::*;
use super::{CalendarProvider, ProviderError};

/// Self-contained provider built on a low-precision ephemeris.
///
/// Civil dates are evaluated at a fixed UTC offset, UTC+8 by default.
#[derive(Debug, Clone)]
pub struct AstronomicalProvider {
    utc_offset_hours: f64,
}

impl Default for AstronomicalProvider {
    fn default() -> Self {
        Self::new(8.0)
    }
}

impl AstronomicalProvider {
    pub const MIN_YEAR: i32 = 1900;
    pub const MAX_YEAR: i32 = 2199;

    pub fn new(utc_offset_hours: f64) -> Self {
        Self { utc_offset_hours }
    }

    fn check_range(year: i32) -> Result<(), ProviderError> {
        if (Self::MIN_YEAR..=Self::MAX_YEAR).contains(&year) {
            Ok(())
        } else {
            Err(ProviderError::OutOfRange {
                year,
                min: Self::MIN_YEAR,
                max: Self::MAX_YEAR,
            })
        }
    }

    fn lunar_date(&self, instant: NaiveDateTime, date: NaiveDate) -> Result<LunarDate, ProviderError> {
        solar_to_lunar(date, self.utc_offset_hours).ok_or_else(|| ProviderError::Invalid {
            instant,
            reason: "lunar conversion out of range".to_string(),
        })
    }
}

/// Indices of the pillars and month used by the rule tables.
struct Pillars {
    year: usize,
    month_stem: usize,
    month_branch: usize,
    day: usize,
    hour_stem: usize,
    hour_branch: usize,
}

fn pillars(instant: NaiveDateTime, sun_lon: f64) -> Pillars {
    let date = instant.date();
    // The pillar year turns at 立春 (315°), not on January 1st.
    let pillar_year = if date.month() <= 2 && (270.0..315.0).contains(&sun_lon) {
        date.year() - 1
    } else {
        date.year()
    };
    let year = (pillar_year - 4).rem_euclid(60) as usize;

    // Month 0 is the 寅 month opening at 立春.
    let month_offset = ((sun_lon - 315.0).rem_euclid(360.0) / 30.0).floor() as usize % 12;
    let month_branch = (2 + month_offset) % 12;
    let month_stem = ((year % 10) % 5 * 2 + 2 + month_offset) % 10;

    let day = (jdn(date) + 49).rem_euclid(60) as usize;

    let hour = instant.hour();
    let hour_branch = ((hour + 1) / 2 % 12) as usize;
    // 23:00 opens the next day's 子 period.
    let hour_day = if hour == 23 { (day + 1) % 60 } else { day };
    let hour_stem = ((hour_day % 10) % 5 * 2 + hour_branch) % 10;

    Pillars {
        year,
        month_stem,
        month_branch,
        day,
        hour_stem,
        hour_branch,
    }
}

fn holidays(
    date: NaiveDate,
    lunar: &LunarDate,
    next_lunar: &LunarDate,
    terms: &[SolarTermEntry],
) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(h) = gregorian_holiday(date.month(), date.day()) {
        out.push(h.to_string());
    }
    if !lunar.leap {
        if let Some(h) = lunar_holiday(lunar.month, lunar.day) {
            out.push(h.to_string());
        }
    }
    if next_lunar.month == 1 && next_lunar.day == 1 && !next_lunar.leap {
        out.push("除夕".to_string());
    }
    if let Some(term) = terms
        .iter()
        .find(|t| t.month == date.month() && t.day == date.day())
    {
        if term.name == "清明" {
            out.push("清明节".to_string());
        } else {
            out.push(term.name.clone());
        }
    }
    out
}

/// Lucky and unlucky gods of the day.
fn day_gods(
    p: &Pillars,
    date: NaiveDate,
    terms: &[SolarTermEntry],
) -> (Vec<String>, Vec<String>) {
    let day_branch = p.day % 12;
    let day_stem = p.day % 10;
    let god = (day_branch + 12 - azure_dragon_start(p.month_branch)) % 12;
    let mut lucky = Vec::new();
    let mut unlucky = Vec::new();
    if god_is_lucky(god) {
        lucky.push(DAY_GODS[god].to_string());
    } else {
        unlucky.push(DAY_GODS[god].to_string());
    }

    // 月德 / 月德合 by the month's triad.
    let (virtue, virtue_combo) = match p.month_branch % 4 {
        2 => (2, 7), // 寅午戌: 丙, 辛
        3 => (0, 5), // 亥卯未: 甲, 己
        0 => (8, 3), // 申子辰: 壬, 丁
        _ => (6, 1), // 巳酉丑: 庚, 乙
    };
    if day_stem == virtue {
        lucky.push("月德".to_string());
    }
    if day_stem == virtue_combo {
        lucky.push("月德合".to_string());
    }

    // 天赦: one stem-branch day per season.
    let pardon = match p.month_branch {
        2..=4 => 14,  // 戊寅
        5..=7 => 30,  // 甲午
        8..=10 => 44, // 戊申
        _ => 0,       // 甲子
    };
    if p.day == pardon {
        lucky.push("天赦".to_string());
    }

    if day_branch == (p.month_branch + 6) % 12 {
        unlucky.push("月破".to_string());
    }

    let tomorrow = date + Duration::days(1);
    for term in terms
        .iter()
        .filter(|t| t.month == tomorrow.month() && t.day == tomorrow.day())
    {
        match term.name.as_str() {
            "春分" | "夏至" | "秋分" | "冬至" => unlucky.push("四离".to_string()),
            "立春" | "立夏" | "立秋" | "立冬" => unlucky.push("四绝".to_string()),
            _ => {}
        }
    }

    (lucky, unlucky)
}

impl CalendarProvider for AstronomicalProvider {
    fn name(&self) -> &str {
        "astronomical"
    }

    fn derive(&self, instant: NaiveDateTime) -> Result<LunarSnapshot, ProviderError> {
        let date = instant.date();
        Self::check_range(date.year())?;
        let tz = self.utc_offset_hours;

        let lunar = self.lunar_date(instant, date)?;
        let next_lunar = self.lunar_date(instant, date + Duration::days(1))?;

        let term_dates = solar_term_dates(date.year(), tz).ok_or_else(|| ProviderError::Invalid {
            instant,
            reason: "solar term search failed".to_string(),
        })?;
        let solar_terms: Vec<SolarTermEntry> = SOLAR_TERMS
            .iter()
            .zip(term_dates)
            .map(|(name, d)| SolarTermEntry::new(*name, d.month(), d.day()))
            .collect();

        let sun_lon = sun_longitude(julian_day(instant, tz));
        let p = pillars(instant, sun_lon);
        let day_stem = p.day % 10;
        let day_branch = p.day % 12;

        let officer = (day_branch + 12 - p.month_branch) % 12;
        let (lucky_gods, unlucky_gods) = day_gods(&p, date, &solar_terms);

        let hour_start = azure_dragon_start(day_branch);
        let two_hour_lucky = (0..12)
            .map(|h| {
                if god_is_lucky((h + 12 - hour_start) % 12) {
                    "吉".to_string()
                } else {
                    "凶".to_string()
                }
            })
            .collect();

        let clash_branch = (day_branch + 6) % 12;
        let clash_stem = (day_stem + 6) % 10;
        let mansion = (jdn(date) + MANSION_JDN_OFFSET).rem_euclid(28) as usize;

        Ok(LunarSnapshot {
            instant,
            year_ganzhi: ganzhi(p.year),
            month_ganzhi: pillar(p.month_stem, p.month_branch),
            day_ganzhi: ganzhi(p.day),
            hour_ganzhi: pillar(p.hour_stem, p.hour_branch),
            lunar_year: lunar.year,
            lunar_month: lunar.month,
            lunar_day: lunar.day,
            is_leap_month: lunar.leap,
            moon_age: moon_age(julian_day(instant, tz)),
            lunar_month_name: month_name(lunar.month, lunar.leap),
            lunar_day_name: day_name(lunar.day),
            zodiac: ZODIAC[p.year % 12].to_string(),
            week_day: WEEK_DAYS[date.weekday().num_days_from_monday() as usize].to_string(),
            season: SEASONS[(lunar.month.clamp(1, 12) - 1) as usize].to_string(),
            zodiac_clash: format!(
                "冲{}({})煞{}",
                ZODIAC[clash_branch],
                pillar(clash_stem, clash_branch),
                sha_direction(day_branch)
            ),
            star_sign: star_sign(date.month(), date.day()).to_string(),
            holidays: holidays(date, &lunar, &next_lunar, &solar_terms),
            solar_terms,
            peng_zu_taboos: vec![
                PENG_ZU_STEM[day_stem].to_string(),
                PENG_ZU_BRANCH[day_branch].to_string(),
            ],
            day_officer: format!("{}日", DAY_OFFICERS[officer]),
            lunar_mansion: MANSIONS[mansion].to_string(),
            nayin: NAYIN[p.day / 2].to_string(),
            god_directions: vec![
                format!("喜神:{}", JOY_GOD[day_stem]),
                format!("财神:{}", WEALTH_GOD[day_stem]),
                format!("福神:{}", FORTUNE_GOD[day_stem]),
            ],
            lucky_gods,
            unlucky_gods,
            two_hour_lucky,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn derive(y: i32, m: u32, d: u32, h: u32) -> LunarSnapshot {
        AstronomicalProvider::default().derive(at(y, m, d, h)).unwrap()
    }

    #[test]
    fn spring_festival_2024() {
        let s = derive(2024, 2, 10, 12);
        assert_eq!(s.lunar_date_name(), "正月初一");
        assert_eq!(s.year_ganzhi, "甲辰");
        assert_eq!(s.zodiac, "龙");
        assert!(s.holidays.iter().any(|h| h == "春节"));
        assert_eq!(s.week_day, "星期六");
    }

    #[test]
    fn known_day_pillar() {
        assert_eq!(derive(2000, 1, 1, 12).day_ganzhi, "戊午");
    }

    #[test]
    fn year_pillar_turns_at_beginning_of_spring() {
        // 立春 2024 fell on February 4th.
        assert_eq!(derive(2024, 2, 3, 12).year_ganzhi, "癸卯");
        assert_eq!(derive(2024, 2, 5, 12).year_ganzhi, "甲辰");
        assert_eq!(derive(2024, 2, 5, 12).month_ganzhi, "丙寅");
        assert_eq!(derive(2025, 1, 10, 12).month_ganzhi, "丁丑");
    }

    #[test]
    fn hour_pillar_uses_odd_hour_periods() {
        let s = derive(2024, 2, 10, 0);
        assert!(s.hour_ganzhi.ends_with('子'));
        let s = derive(2024, 2, 10, 1);
        assert!(s.hour_ganzhi.ends_with('丑'));
        let s = derive(2024, 2, 10, 23);
        assert!(s.hour_ganzhi.ends_with('子'));
    }

    #[test]
    fn lunar_new_year_eve_is_a_holiday() {
        let s = derive(2025, 1, 28, 8);
        assert!(s.holidays.iter().any(|h| h == "除夕"));
    }

    #[test]
    fn terms_are_for_the_gregorian_year() {
        let s = derive(2025, 6, 1, 8);
        assert_eq!(s.solar_terms.len(), 24);
        assert_eq!(s.solar_terms[0].name, "小寒");
        assert_eq!(s.term_named("小寒").unwrap().date_label(), "1月5日");
    }

    #[test]
    fn two_hour_list_has_six_lucky_periods() {
        let s = derive(2025, 3, 3, 8);
        assert_eq!(s.two_hour_lucky.len(), 12);
        assert_eq!(s.two_hour_lucky.iter().filter(|m| *m == "吉").count(), 6);
    }

    #[test]
    fn mansion_matches_weekday() {
        // Sundays always fall on a 日 mansion.
        let s = derive(2025, 3, 2, 8);
        assert_eq!(s.week_day, "星期日");
        assert!(s.lunar_mansion.contains('日'));
    }

    #[test]
    fn out_of_range_years_error() {
        let err = AstronomicalProvider::default()
            .derive(at(1850, 1, 1, 0))
            .unwrap_err();
        assert!(matches!(err, ProviderError::OutOfRange { year: 1850, .. }));
    }
}
