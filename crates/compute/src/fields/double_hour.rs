//! Two-hour periods (时辰) and their quarter marks (刻).
//!
//! A period starts on an odd hour: 子 covers 23:00-01:00, 丑 01:00-03:00,
//! and so on.

use chrono::{NaiveTime, Timelike};

use crate::provider::tables::BRANCHES;

pub const TIME_RANGES: [&str; 12] = [
    "23:00-01:00",
    "01:00-03:00",
    "03:00-05:00",
    "05:00-07:00",
    "07:00-09:00",
    "09:00-11:00",
    "11:00-13:00",
    "13:00-15:00",
    "15:00-17:00",
    "17:00-19:00",
    "19:00-21:00",
    "21:00-23:00",
];

const KE_MARKS: [&str; 8] = ["初", "一", "二", "三", "四", "五", "六", "七"];

/// Index of the period containing `time`, 0 for 子.
pub fn period_index(time: NaiveTime) -> usize {
    ((time.hour() + 1) / 2 % 12) as usize
}

/// Minutes elapsed since the period containing `time` began.
fn minutes_into_period(time: NaiveTime) -> u32 {
    let hours = if time.hour() % 2 == 1 { 0 } else { 1 };
    hours * 60 + time.minute()
}

/// `子时初刻` .. `亥时七刻`.
pub fn label(time: NaiveTime) -> String {
    let ke = (minutes_into_period(time) / 15).min(7) as usize;
    format!("{}时{}刻", BRANCHES[period_index(time)], KE_MARKS[ke])
}
