//! Low-precision solar and lunar ephemeris.
//!
//! Good to well under an hour for 1900-2199, which is all the day-level
//! calendar needs. Julian days are UT; `tz` is the civil offset in hours.

use std::f64::consts::PI;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

const DR: f64 = PI / 180.0;

/// Mean synodic month in days.
pub const SYNODIC_MONTH: f64 = 29.530588853;

/// Julian day of the first new moon of 1900 used as lunation zero.
pub const LUNATION_EPOCH: f64 = 2415021.076998695;

const JDN_CE_OFFSET: i64 = 1_721_425;

const TROPICAL_YEAR: f64 = 365.2422;

/// Julian day number of a civil date.
pub fn jdn(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce()) + JDN_CE_OFFSET
}

pub fn date_from_jdn(jdn: i64) -> Option<NaiveDate> {
    i32::try_from(jdn - JDN_CE_OFFSET)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
}

/// Julian day (UT) of a civil instant at offset `tz`.
pub fn julian_day(instant: NaiveDateTime, tz: f64) -> f64 {
    let seconds = f64::from(instant.num_seconds_from_midnight());
    jdn(instant.date()) as f64 - 0.5 + seconds / 86_400.0 - tz / 24.0
}

/// Julian day (UT) of the `k`-th new moon after the 1900 epoch.
pub fn new_moon(k: i64) -> f64 {
    let k = k as f64;
    let t = k / 1236.85;
    let t2 = t * t;
    let t3 = t2 * t;

    let mut jd = 2415020.75933 + 29.53058868 * k + 0.0001178 * t2 - 0.000000155 * t3;
    jd += 0.00033 * ((166.56 + 132.87 * t - 0.009173 * t2) * DR).sin();

    // Sun and moon mean anomalies, moon argument of latitude.
    let m = 359.2242 + 29.10535608 * k - 0.0000333 * t2 - 0.00000347 * t3;
    let mpr = 306.0253 + 385.81691806 * k + 0.0107306 * t2 + 0.00001236 * t3;
    let f = 21.2964 + 390.67050646 * k - 0.0016528 * t2 - 0.00000239 * t3;

    let mut c1 = (0.1734 - 0.000393 * t) * (m * DR).sin() + 0.0021 * (2.0 * DR * m).sin();
    c1 = c1 - 0.4068 * (mpr * DR).sin() + 0.0161 * (DR * 2.0 * mpr).sin();
    c1 -= 0.0004 * (DR * 3.0 * mpr).sin();
    c1 = c1 + 0.0104 * (DR * 2.0 * f).sin() - 0.0051 * (DR * (m + mpr)).sin();
    c1 = c1 - 0.0074 * (DR * (m - mpr)).sin() + 0.0004 * (DR * (2.0 * f + m)).sin();
    c1 = c1 - 0.0004 * (DR * (2.0 * f - m)).sin() - 0.0006 * (DR * (2.0 * f + mpr)).sin();
    c1 = c1 + 0.0010 * (DR * (2.0 * f - mpr)).sin() + 0.0005 * (DR * (2.0 * mpr + m)).sin();

    let delta_t = if t < -11.0 {
        0.001 + 0.000839 * t + 0.0002261 * t2 - 0.00000845 * t3 - 0.000000081 * t * t3
    } else {
        -0.000278 + 0.000265 * t + 0.000262 * t2
    };
    jd + c1 - delta_t
}

/// Days since the new moon at or before the UT julian day `jd`.
pub fn moon_age(jd: f64) -> f64 {
    let mut k = ((jd - LUNATION_EPOCH) / SYNODIC_MONTH).floor() as i64;
    while new_moon(k) > jd {
        k -= 1;
    }
    while new_moon(k + 1) <= jd {
        k += 1;
    }
    jd - new_moon(k)
}

/// Apparent geocentric longitude of the sun, degrees in `[0, 360)`.
pub fn sun_longitude(jd: f64) -> f64 {
    let t = (jd - 2451545.0) / 36525.0;
    let t2 = t * t;
    let m = 357.52910 + 35999.05030 * t - 0.0001559 * t2 - 0.00000048 * t * t2;
    let l0 = 280.46645 + 36000.76983 * t + 0.0003032 * t2;
    let mut dl = (1.914600 - 0.004817 * t - 0.000014 * t2) * (DR * m).sin();
    dl += (0.019993 - 0.000101 * t) * (DR * 2.0 * m).sin() + 0.000290 * (DR * 3.0 * m).sin();
    let omega = 125.04 - 1934.136 * t;
    (l0 + dl - 0.00569 - 0.00478 * (DR * omega).sin()).rem_euclid(360.0)
}

/// Which 30° sector the sun is in at local midnight opening day `day_number`.
pub fn sun_sector(day_number: i64, tz: f64) -> i64 {
    (sun_longitude(day_number as f64 - 0.5 - tz / 24.0) / 30.0).floor() as i64
}

/// Local day number on which new moon `k` falls.
pub fn new_moon_day(k: i64, tz: f64) -> i64 {
    (new_moon(k) + 0.5 + tz / 24.0).floor() as i64
}

/// Julian day at which the sun reaches `target` degrees, searching from `estimate`.
pub fn solar_longitude_crossing(target: f64, estimate: f64) -> f64 {
    let mut jd = estimate;
    for _ in 0..10 {
        let diff = (target - sun_longitude(jd) + 540.0).rem_euclid(360.0) - 180.0;
        jd += diff * TROPICAL_YEAR / 360.0;
        if diff.abs() < 1e-7 {
            break;
        }
    }
    jd
}

/// Local civil date containing the UT julian day `jd`.
pub fn local_date(jd: f64, tz: f64) -> Option<NaiveDate> {
    date_from_jdn((jd + 0.5 + tz / 24.0).floor() as i64)
}

/// Dates of the 24 solar terms of a Gregorian year, starting at the one
/// at 285° (early January) and stepping 15°.
pub fn solar_term_dates(year: i32, tz: f64) -> Option<Vec<NaiveDate>> {
    let jan6 = jdn(NaiveDate::from_ymd_opt(year, 1, 6)?) as f64;
    (0..24)
        .map(|i| {
            let target = (285.0 + 15.0 * f64::from(i)).rem_euclid(360.0);
            let estimate = jan6 + f64::from(i) * TROPICAL_YEAR / 24.0;
            local_date(solar_longitude_crossing(target, estimate), tz)
        })
        .collect()
}
