//! Name tables for the traditional almanac.

pub const STEMS: [&str; 10] = ["甲", "乙", "丙", "丁", "戊", "己", "庚", "辛", "壬", "癸"];

pub const BRANCHES: [&str; 12] = [
    "子", "丑", "寅", "卯", "辰", "巳", "午", "未", "申", "酉", "戌", "亥",
];

pub const ZODIAC: [&str; 12] = [
    "鼠", "牛", "虎", "兔", "龙", "蛇", "马", "羊", "猴", "鸡", "狗", "猪",
];

/// In calendar order, starting at the 285° term.
pub const SOLAR_TERMS: [&str; 24] = [
    "小寒", "大寒", "立春", "雨水", "惊蛰", "春分", "清明", "谷雨", "立夏", "小满", "芒种", "夏至",
    "小暑", "大暑", "立秋", "处暑", "白露", "秋分", "寒露", "霜降", "立冬", "小雪", "大雪", "冬至",
];

pub const MONTH_NAMES: [&str; 12] = [
    "正月", "二月", "三月", "四月", "五月", "六月", "七月", "八月", "九月", "十月", "冬月", "腊月",
];

const DIGITS: [&str; 11] = ["", "一", "二", "三", "四", "五", "六", "七", "八", "九", "十"];

pub const WEEK_DAYS: [&str; 7] = [
    "星期一", "星期二", "星期三", "星期四", "星期五", "星期六", "星期日",
];

pub const SEASONS: [&str; 12] = [
    "孟春", "仲春", "季春", "孟夏", "仲夏", "季夏", "孟秋", "仲秋", "季秋", "孟冬", "仲冬", "季冬",
];

/// One per stem-branch pair of the sexagenary cycle.
pub const NAYIN: [&str; 30] = [
    "海中金", "炉中火", "大林木", "路旁土", "剑锋金", "山头火", "涧下水", "城头土", "白蜡金", "杨柳木",
    "泉中水", "屋上土", "霹雳火", "松柏木", "长流水", "砂中金", "山下火", "平地木", "壁上土", "金箔金",
    "覆灯火", "天河水", "大驿土", "钗钏金", "桑柘木", "大溪水", "沙中土", "天上火", "石榴木", "大海水",
];

pub const PENG_ZU_STEM: [&str; 10] = [
    "甲不开仓财物耗散",
    "乙不栽植千株不长",
    "丙不修灶必见灾殃",
    "丁不剃头头必生疮",
    "戊不受田田主不祥",
    "己不破券二比并亡",
    "庚不经络织机虚张",
    "辛不合酱主人不尝",
    "壬不泱水更难提防",
    "癸不词讼理弱敌强",
];

pub const PENG_ZU_BRANCH: [&str; 12] = [
    "子不问卜自惹祸殃",
    "丑不冠带主不还乡",
    "寅不祭祀神鬼不尝",
    "卯不穿井水泉不香",
    "辰不哭泣必主重丧",
    "巳不远行财物伏藏",
    "午不苫盖屋主更张",
    "未不服药毒气入肠",
    "申不安床鬼祟入房",
    "酉不会客醉坐颠狂",
    "戌不吃犬作怪上床",
    "亥不嫁娶不利新郎",
];

/// 建除十二神.
pub const DAY_OFFICERS: [&str; 12] = [
    "建", "除", "满", "平", "定", "执", "破", "危", "成", "收", "开", "闭",
];

pub fn officer_is_lucky(index: usize) -> bool {
    matches!(DAY_OFFICERS[index % 12], "除" | "定" | "执" | "危" | "成" | "开")
}

/// 黄道/黑道 twelve gods, in rotation order.
pub const DAY_GODS: [&str; 12] = [
    "青龙", "明堂", "天刑", "朱雀", "金匮", "天德", "白虎", "玉堂", "天牢", "玄武", "司命", "勾陈",
];

pub fn god_is_lucky(index: usize) -> bool {
    matches!(
        DAY_GODS[index % 12],
        "青龙" | "明堂" | "金匮" | "天德" | "玉堂" | "司命"
    )
}

/// Branch at which 青龙 starts, given the governing branch (month for days,
/// day for hours).
pub fn azure_dragon_start(branch: usize) -> usize {
    ((branch + 12 - 2) % 6) * 2
}

/// 28 lunar mansions. Index modulo 7 follows the weekday, 0 being Thursday.
pub const MANSIONS: [&str; 28] = [
    "角木蛟", "亢金龙", "氐土貉", "房日兔", "心月狐", "尾火虎", "箕水豹",
    "斗木獬", "牛金牛", "女土蝠", "虚日鼠", "危月燕", "室火猪", "壁水獝",
    "奎木狼", "娄金狗", "胃土雉", "昴日鸡", "毕月乌", "觜火猴", "参水猿",
    "井木犴", "鬼金羊", "柳土獐", "星日马", "张月鹿", "翼火蛇", "轸水蚓",
];

/// Offset aligning the mansion cycle with julian day numbers.
pub const MANSION_JDN_OFFSET: i64 = 11;

/// 喜神 by day stem.
pub const JOY_GOD: [&str; 10] = [
    "东北", "西北", "西南", "正南", "东南", "东北", "西北", "西南", "正南", "东南",
];

/// 财神 by day stem.
pub const WEALTH_GOD: [&str; 10] = [
    "东北", "东北", "西南", "西南", "正北", "正北", "正东", "正东", "正南", "正南",
];

/// 福神 by day stem.
pub const FORTUNE_GOD: [&str; 10] = [
    "东南", "东南", "正东", "正东", "正北", "正南", "西南", "西南", "西北", "西北",
];

/// Sha direction by branch group.
pub fn sha_direction(branch: usize) -> &'static str {
    match branch % 4 {
        0 => "南",
        1 => "东",
        2 => "北",
        _ => "西",
    }
}

pub const ELEMENTS_BY_STEM: [&str; 10] = ["木", "木", "火", "火", "土", "土", "金", "金", "水", "水"];

pub fn stem_index(stem: char) -> Option<usize> {
    STEMS.iter().position(|s| s.starts_with(stem))
}

pub fn branch_index(branch: char) -> Option<usize> {
    BRANCHES.iter().position(|s| s.starts_with(branch))
}

/// Stem-branch pair for a sexagenary index.
pub fn ganzhi(index: usize) -> String {
    format!("{}{}", STEMS[index % 10], BRANCHES[index % 12])
}

pub fn pillar(stem: usize, branch: usize) -> String {
    format!("{}{}", STEMS[stem % 10], BRANCHES[branch % 12])
}

pub fn month_name(month: u32, leap: bool) -> String {
    let base = MONTH_NAMES[(month.clamp(1, 12) - 1) as usize];
    if leap {
        format!("闰{base}")
    } else {
        base.to_string()
    }
}

pub fn day_name(day: u32) -> String {
    let d = day as usize;
    match d {
        1..=10 => format!("初{}", DIGITS[d]),
        11..=19 => format!("十{}", DIGITS[d - 10]),
        20 => "二十".to_string(),
        21..=29 => format!("廿{}", DIGITS[d - 20]),
        30 => "三十".to_string(),
        _ => String::new(),
    }
}

/// Western star sign for a Gregorian month and day.
pub fn star_sign(month: u32, day: u32) -> &'static str {
    const SIGNS: [((u32, u32), (u32, u32), &str); 11] = [
        ((1, 20), (2, 18), "水瓶座"),
        ((2, 19), (3, 20), "双鱼座"),
        ((3, 21), (4, 19), "白羊座"),
        ((4, 20), (5, 20), "金牛座"),
        ((5, 21), (6, 20), "双子座"),
        ((6, 21), (7, 22), "巨蟹座"),
        ((7, 23), (8, 22), "狮子座"),
        ((8, 23), (9, 22), "处女座"),
        ((9, 23), (10, 22), "天秤座"),
        ((10, 23), (11, 21), "天蝎座"),
        ((11, 22), (12, 21), "射手座"),
    ];
    SIGNS
        .iter()
        .find(|((sm, sd), (em, ed), _)| (month == *sm && day >= *sd) || (month == *em && day <= *ed))
        .map_or("摩羯座", |(_, _, sign)| sign)
}

/// Fixed-date Gregorian holidays.
pub fn gregorian_holiday(month: u32, day: u32) -> Option<&'static str> {
    Some(match (month, day) {
        (1, 1) => "元旦",
        (2, 14) => "情人节",
        (3, 8) => "妇女节",
        (3, 12) => "植树节",
        (4, 1) => "愚人节",
        (5, 1) => "劳动节",
        (5, 4) => "青年节",
        (6, 1) => "儿童节",
        (7, 1) => "建党节",
        (8, 1) => "建军节",
        (9, 10) => "教师节",
        (10, 1) => "国庆节",
        (12, 24) => "平安夜",
        (12, 25) => "圣诞节",
        _ => return None,
    })
}

/// Fixed lunar holidays (leap months carry none).
pub fn lunar_holiday(month: u32, day: u32) -> Option<&'static str> {
    Some(match (month, day) {
        (1, 1) => "春节",
        (1, 15) => "元宵节",
        (2, 2) => "龙抬头",
        (5, 5) => "端午节",
        (7, 7) => "七夕节",
        (7, 15) => "中元节",
        (8, 15) => "中秋节",
        (9, 9) => "重阳节",
        (12, 8) => "腊八节",
        (12, 23) => "小年",
        _ => return None,
    })
}
