//! 月相: the moon's phase, with its element, luck and reading.

use std::f64::consts::TAU;

use almanac_core::LunarSnapshot;

use crate::provider::astro::SYNODIC_MONTH;
use crate::registry::FieldOutput;

/// Phase names in cycle order, each with the upper bound of its range on
/// a 28-step cycle. The new moon also covers the tail above 27.5.
const PHASES: [(f64, &str); 8] = [
    (0.5, "朔月"),
    (6.5, "峨眉月"),
    (7.5, "上弦月"),
    (13.5, "渐盈凸月"),
    (14.5, "满月"),
    (20.5, "渐亏凸月"),
    (21.5, "下弦月"),
    (27.5, "残月"),
];

pub fn phase_name(age_days: f64) -> &'static str {
    let step = cycle_fraction(age_days) * 28.0;
    PHASES
        .iter()
        .find(|(bound, _)| step < *bound)
        .map_or("朔月", |(_, name)| name)
}

fn cycle_fraction(age_days: f64) -> f64 {
    (age_days / SYNODIC_MONTH).rem_euclid(1.0)
}

/// Lit fraction of the disc, 0 at new moon and 1 at full.
pub fn illumination(age_days: f64) -> f64 {
    (1.0 - (TAU * cycle_fraction(age_days)).cos()) / 2.0
}

pub fn element(lunar_day: u32) -> &'static str {
    match lunar_day {
        0..=6 => "水",
        7..=11 => "木",
        12..=16 => "火",
        17..=22 => "金",
        _ => "土",
    }
}

pub fn luck(lunar_day: u32) -> &'static str {
    match lunar_day {
        1 | 8 | 15 | 23 => "大吉",
        3 | 7 | 13 | 18 | 22 | 27 => "吉",
        5 | 10 | 20 | 25 => "平",
        4 | 12 | 19 | 26 => "凶",
        _ => "平吉",
    }
}

fn reading(phase: &str) -> &'static str {
    match phase {
        "朔月" => "月亮完全不可见，与太阳位于同一方向，为农历每月初一。道家称此时阴阳相交，万物启始，宜静修存想",
        "峨眉月" => "月亮呈细弧形，傍晚见于西方天空。新生之气开始萌动，道家以为阳气初升，宜修炼内丹",
        "上弦月" => "月亮西侧发亮，呈半圆形，与太阳相距九十度，约在农历初七、初八。阳气上升之象，合于人体小周天",
        "渐盈凸月" => "月亮大半可见，渐近圆形。月相渐盈，阳气渐盛，天地之气由升而合，为采气良时",
        "满月" => "月亮完整可见，约在农历十五、十六，与太阳相对。阴阳交泰，天人合一，宜打坐存想",
        "渐亏凸月" => "月亮开始亏缺，仍近圆形。阳气收敛，阴气渐生，宜炼己修身、收心养性",
        "下弦月" => "月亮东侧发亮，呈半圆形，与太阳相距二百七十度，约在农历廿二、廿三。阴气上升之象，与经脉运行相应",
        _ => "月亮呈细弧形，清晨见于东方天空。月相将尽，天地之气归藏，宜收功打坐，为新月蓄势",
    }
}

/// Render the 月相 field from a snapshot.
pub fn render(s: &LunarSnapshot) -> FieldOutput {
    let phase = phase_name(s.moon_age);
    FieldOutput::new(phase)
        .attr("月龄", s.lunar_day.to_string())
        .attr("月相百分比", format!("{:.1}%", cycle_fraction(s.moon_age) * 100.0))
        .attr("亮面", format!("{:.0}%", illumination(s.moon_age) * 100.0))
        .attr("月相说明", reading(phase))
        .attr("阴阳", if s.lunar_day > 15 { "阴" } else { "阳" })
        .attr("五行", element(s.lunar_day))
        .attr("吉凶", luck(s.lunar_day))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_follow_the_cycle() {
        let day = SYNODIC_MONTH / 28.0;
        assert_eq!(phase_name(0.0), "朔月");
        assert_eq!(phase_name(3.0 * day), "峨眉月");
        assert_eq!(phase_name(7.0 * day), "上弦月");
        assert_eq!(phase_name(10.0 * day), "渐盈凸月");
        assert_eq!(phase_name(14.0 * day), "满月");
        assert_eq!(phase_name(17.0 * day), "渐亏凸月");
        assert_eq!(phase_name(21.0 * day), "下弦月");
        assert_eq!(phase_name(25.0 * day), "残月");
        assert_eq!(phase_name(27.8 * day), "朔月");
    }

    #[test]
    fn illumination_peaks_at_full_moon() {
        assert!(illumination(0.0) < 0.01);
        assert!(illumination(SYNODIC_MONTH / 2.0) > 0.99);
        assert!((illumination(SYNODIC_MONTH / 4.0) - 0.5).abs() < 0.01);
    }

    #[test]
    fn lunar_day_tables() {
        assert_eq!(element(1), "水");
        assert_eq!(element(15), "火");
        assert_eq!(element(30), "土");
        assert_eq!(luck(15), "大吉");
        assert_eq!(luck(4), "凶");
        assert_eq!(luck(2), "平吉");
    }
}
