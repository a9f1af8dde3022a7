//! Daily fortune: how today's day pillar relates to the birth day pillar.

/// Relation between two stems or two branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// 合
    Combine,
    /// 刑
    Punish,
    /// 冲
    Clash,
    /// 平
    Neutral,
}

impl Relation {
    fn mark(&self) -> &'static str {
        match self {
            Relation::Combine => "合",
            Relation::Punish => "刑",
            Relation::Clash => "冲",
            Relation::Neutral => "平",
        }
    }

    fn level(&self) -> &'static str {
        match self {
            Relation::Combine => "吉",
            other => other.mark(),
        }
    }
}

const STEM_PAIRS: [(char, char, Relation); 15] = [
    ('甲', '己', Relation::Combine),
    ('乙', '庚', Relation::Combine),
    ('丙', '辛', Relation::Combine),
    ('丁', '壬', Relation::Combine),
    ('戊', '癸', Relation::Combine),
    ('甲', '庚', Relation::Punish),
    ('乙', '辛', Relation::Punish),
    ('丙', '壬', Relation::Punish),
    ('丁', '癸', Relation::Punish),
    ('戊', '己', Relation::Punish),
    ('甲', '辛', Relation::Clash),
    ('乙', '壬', Relation::Clash),
    ('丙', '癸', Relation::Clash),
    ('丁', '庚', Relation::Clash),
    ('戊', '辛', Relation::Clash),
];

const BRANCH_GROUPS: [(&str, Relation); 16] = [
    ("子午", Relation::Clash),
    ("丑未", Relation::Clash),
    ("寅申", Relation::Clash),
    ("卯酉", Relation::Clash),
    ("辰戌", Relation::Clash),
    ("巳亥", Relation::Clash),
    ("寅巳申亥", Relation::Punish),
    ("子卯未", Relation::Punish),
    ("丑戌未", Relation::Punish),
    ("辰酉午", Relation::Punish),
    ("亥子", Relation::Combine),
    ("寅亥", Relation::Combine),
    ("卯戌", Relation::Combine),
    ("辰酉", Relation::Combine),
    ("巳申", Relation::Combine),
    ("午未", Relation::Combine),
];

fn stem_relation(a: char, b: char) -> Option<Relation> {
    STEM_PAIRS
        .iter()
        .find(|(x, y, _)| (*x == a && *y == b) || (*x == b && *y == a))
        .map(|(_, _, r)| *r)
}

/// Identical branches are not related to each other.
fn branch_relation(a: char, b: char) -> Option<Relation> {
    if a == b {
        return None;
    }
    BRANCH_GROUPS
        .iter()
        .find(|(group, _)| group.contains(a) && group.contains(b))
        .map(|(_, r)| *r)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AgeBand {
    Toddler,
    Child,
    Youth,
    Adult,
    Elderly,
}

impl AgeBand {
    fn of(years: i32) -> Self {
        match years {
            y if y < 3 => AgeBand::Toddler,
            y if y < 7 => AgeBand::Child,
            y if y < 18 => AgeBand::Youth,
            y if y >= 50 => AgeBand::Elderly,
            _ => AgeBand::Adult,
        }
    }
}

/// `(detail, advice)`; `{name}` in the detail is replaced by the person.
fn texts(relation: Relation, band: AgeBand) -> (&'static str, &'static str) {
    use AgeBand::*;
    use Relation::*;
    match (relation, band) {
        (Combine, Toddler) => (
            "今日{name}运势良好，情绪稳定，胃口不错，适合亲子互动与日常体检。",
            "宜：体检、户外、亲子活动\n忌：过度疲劳、剧烈运动",
        ),
        (Combine, Child) => (
            "今日{name}运势良好，上午宜认知学习，下午可适度户外活动，同伴相处融洽。",
            "宜：户外活动、认知学习、同伴交往\n忌：过度劳累、受凉着凉",
        ),
        (Combine, Youth) => (
            "{name}今日运势大吉，思维活跃，体能充沛，团队活动中易获好评。",
            "宜：课业学习、体育活动、团队合作\n忌：过度用眼、熬夜",
        ),
        (Combine, Adult) => (
            "今日贵人相助，诸事顺遂。财运稳中有升，出行顺利，人际与家庭和睦。",
            "把握机会，主动出击",
        ),
        (Combine, Elderly) => (
            "今日运程平顺，气血调和，宜适度运动与进补养生，财务平稳。",
            "宜：居家调养、稳妥处事\n忌：远行冒险、激烈运动",
        ),
        (Punish, Toddler) => (
            "今日{name}运势欠佳，易有不安情绪与挑食，宜保持熟悉环境并加强看护。",
            "宜：调整作息、清淡饮食、保持安静\n忌：环境变动、强迫进食",
        ),
        (Punish, Child) => (
            "今日{name}运势较弱，活动注意安全，情绪可能起伏，宜耐心开导。",
            "宜：室内活动、清淡饮食\n忌：剧烈运动、争执",
        ),
        (Punish, Youth) => (
            "{name}今日运势欠佳，注意力易分散，体育活动以安全为先，人际宜谨慎。",
            "宜：独立学习、充足休息\n忌：剧烈运动、争执",
        ),
        (Punish, Adult) => (
            "易有口舌是非，情绪波动较大。理财需谨慎，不宜远行，言行宜稳。",
            "谨言慎行，避免冲突",
        ),
        (Punish, Elderly) => (
            "今日诸事需谨慎，留意身体不适，防范意外损失，居家注意安全。",
            "宜：居家调养、稳妥处事\n忌：远行冒险、激烈运动",
        ),
        (Clash, Toddler) => (
            "今日{name}运势冲克，睡眠与饮食易受影响，避免远途与嘈杂场所。",
            "宜：规律作息、清淡饮食\n忌：环境剧变、长途奔波",
        ),
        (Clash, Child) => (
            "今日{name}运势不稳，宜以室内活动为主，注意营养与睡眠。",
            "宜：室内活动、早睡、规律饮食\n忌：剧烈运动、情绪激动",
        ),
        (Clash, Youth) => (
            "{name}今日运势波动，学习需要更多耐心，运动量宜适中。",
            "宜：独立学习、充足休息\n忌：过度劳累、人际冲突",
        ),
        (Clash, Adult) => (
            "运势波动较大，诸事需谨慎。不宜大额支出，行程易变，沟通宜缓。",
            "稳妥行事，避免冒险",
        ),
        (Clash, Elderly) => (
            "今日运势波动较大，关注心脑血管与消化系统，不宜远行。",
            "宜：居家休养、保持平静\n忌：奔波劳累、激动争执",
        ),
        (Neutral, Toddler) => (
            "今日{name}运势平稳，适合保持日常作息，按时吃睡。",
            "宜：常规作息、日常活动\n忌：过度刺激、突变环境",
        ),
        (Neutral, Child) => (
            "今日{name}运势平稳，各项活动均可正常开展。",
            "宜：常规活动、正常作息\n忌：过度劳累",
        ),
        (Neutral, Youth) => (
            "{name}今日运势平稳，适合复习巩固，运动以平时标准为宜。",
            "宜：复习功课、常规运动\n忌：标新立异",
        ),
        (Neutral, Adult) => (
            "运势平稳，无突出吉凶。按既定计划行事，家庭和睦。",
            "保持平常心，按部就班",
        ),
        (Neutral, Elderly) => (
            "今日运势平稳，身体状况良好，短途无碍，居家平安。",
            "宜：规律作息、平和处世\n忌：贪图安逸、过度担忧",
        ),
    }
}

/// A daily fortune reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    /// `天干合`, `地支冲`, or `平`.
    pub relation: String,
    pub level: &'static str,
    pub detail: String,
    pub advice: &'static str,
}

/// Compare the birth and today's day pillars. Stem relations take
/// precedence over branch relations.
pub fn read(name: &str, birth_day: &str, today_day: &str, age_years: i32) -> Reading {
    let mut birth = birth_day.chars();
    let mut today = today_day.chars();
    let (bs, bb) = (birth.next(), birth.next());
    let (ts, tb) = (today.next(), today.next());

    let stem = bs.zip(ts).and_then(|(a, b)| stem_relation(a, b));
    let branch = bb.zip(tb).and_then(|(a, b)| branch_relation(a, b));
    let (relation, label) = match (stem, branch) {
        (Some(r), _) => (r, format!("天干{}", r.mark())),
        (None, Some(r)) => (r, format!("地支{}", r.mark())),
        (None, None) => (Relation::Neutral, Relation::Neutral.mark().to_string()),
    };

    let (detail, advice) = texts(relation, AgeBand::of(age_years));
    Reading {
        relation: label,
        level: relation.level(),
        detail: detail.replace("{name}", name),
        advice,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stem_combination_wins() {
        let r = read("小明", "甲子", "己午", 30);
        assert_eq!(r.relation, "天干合");
        assert_eq!(r.level, "吉");
        assert_eq!(r.advice, "把握机会，主动出击");
    }

    #[test]
    fn branch_clash() {
        let r = read("小明", "甲子", "丙午", 60);
        assert_eq!(r.relation, "地支冲");
        assert_eq!(r.level, "冲");
        assert!(r.advice.contains("居家休养"));
    }

    #[test]
    fn same_pillar_is_neutral() {
        let r = read("小明", "甲子", "甲子", 10);
        assert_eq!(r.relation, "平");
        assert!(r.detail.starts_with("小明"));
    }

    #[test]
    fn age_bands() {
        assert_eq!(AgeBand::of(0), AgeBand::Toddler);
        assert_eq!(AgeBand::of(3), AgeBand::Child);
        assert_eq!(AgeBand::of(7), AgeBand::Youth);
        assert_eq!(AgeBand::of(18), AgeBand::Adult);
        assert_eq!(AgeBand::of(50), AgeBand::Elderly);
    }
}
