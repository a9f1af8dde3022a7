//! Gregorian to Chinese lunisolar date conversion.
//!
//! Months start on the local day of a new moon. The month holding the
//! winter solstice is month 11. A lunar year spanning 13 months between
//! two such months gets a leap month: the first one without a major term.

use chrono::{Datelike, NaiveDate};

use super::astro::{jdn, new_moon_day, sun_sector, LUNATION_EPOCH, SYNODIC_MONTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LunarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub leap: bool,
}

/// Day number of the start of month 11 of the lunar year ending near `year`.
fn month_eleven_start(year: i32, tz: f64) -> Option<i64> {
    let off = jdn(NaiveDate::from_ymd_opt(year, 12, 31)?) - 2415021;
    let k = (off as f64 / SYNODIC_MONTH).floor() as i64;
    let nm = new_moon_day(k, tz);
    // Sun already past 270° at the new moon: the solstice month began earlier.
    if sun_sector(nm, tz) >= 9 {
        Some(new_moon_day(k - 1, tz))
    } else {
        Some(nm)
    }
}

/// Months after month 11 at which the leap month falls.
fn leap_month_offset(month_eleven: i64, tz: f64) -> i64 {
    let k = ((month_eleven as f64 - LUNATION_EPOCH) / SYNODIC_MONTH + 0.5).floor() as i64;
    let mut i = 1;
    let mut arc = sun_sector(new_moon_day(k + i, tz), tz);
    loop {
        let last = arc;
        i += 1;
        arc = sun_sector(new_moon_day(k + i, tz), tz);
        if arc == last || i >= 14 {
            break;
        }
    }
    i - 1
}

/// Convert a civil date at offset `tz` into its lunar date.
pub fn solar_to_lunar(date: NaiveDate, tz: f64) -> Option<LunarDate> {
    let day_number = jdn(date);
    let k = ((day_number as f64 - LUNATION_EPOCH) / SYNODIC_MONTH).floor() as i64;
    let mut month_start = new_moon_day(k + 1, tz);
    if month_start > day_number {
        month_start = new_moon_day(k, tz);
    }

    let year = date.year();
    let mut a11 = month_eleven_start(year, tz)?;
    let mut b11 = a11;
    let mut lunar_year;
    if a11 >= month_start {
        lunar_year = year;
        a11 = month_eleven_start(year - 1, tz)?;
    } else {
        lunar_year = year + 1;
        b11 = month_eleven_start(year + 1, tz)?;
    }

    let lunar_day = day_number - month_start + 1;
    let diff = (month_start - a11) / 29;
    let mut leap = false;
    let mut lunar_month = diff + 11;
    if b11 - a11 > 365 {
        let leap_diff = leap_month_offset(a11, tz);
        if diff >= leap_diff {
            lunar_month = diff + 10;
            leap = diff == leap_diff;
        }
    }
    if lunar_month > 12 {
        lunar_month -= 12;
    }
    if lunar_month >= 11 && diff < 4 {
        lunar_year -= 1;
    }

    Some(LunarDate {
        year: lunar_year,
        month: u32::try_from(lunar_month).ok()?,
        day: u32::try_from(lunar_day).ok()?,
        leap,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lunar(y: i32, m: u32, d: u32) -> LunarDate {
        solar_to_lunar(NaiveDate::from_ymd_opt(y, m, d).unwrap(), 8.0).unwrap()
    }

    #[test]
    fn spring_festivals() {
        for (y, m, d) in [(2024, 2, 10), (2025, 1, 29), (2026, 2, 17)] {
            let l = lunar(y, m, d);
            assert_eq!((l.month, l.day, l.leap), (1, 1, false), "{y}-{m}-{d}");
            assert_eq!(l.year, y);
        }
    }

    #[test]
    fn eve_belongs_to_previous_lunar_year() {
        let l = lunar(2025, 1, 28);
        assert_eq!(l.year, 2024);
        assert_eq!(l.month, 12);
        assert!(l.day == 29 || l.day == 30);
    }

    #[test]
    fn leap_months() {
        let l = lunar(2023, 3, 22);
        assert_eq!((l.month, l.day, l.leap), (2, 1, true));
        let l = lunar(2025, 7, 25);
        assert_eq!((l.month, l.day, l.leap), (6, 1, true));
        // Day before the leap sixth month is the regular sixth month.
        let l = lunar(2025, 7, 24);
        assert_eq!((l.month, l.leap), (6, false));
    }

    #[test]
    fn mid_autumn() {
        let l = lunar(2024, 9, 17);
        assert_eq!((l.month, l.day, l.leap), (8, 15, false));
    }
}
