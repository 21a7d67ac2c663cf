use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 标准 ABO/Rh 血型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloodGroup {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

impl BloodGroup {
    pub const ALL: [BloodGroup; 8] = [
        BloodGroup::APositive,
        BloodGroup::ANegative,
        BloodGroup::BPositive,
        BloodGroup::BNegative,
        BloodGroup::AbPositive,
        BloodGroup::AbNegative,
        BloodGroup::OPositive,
        BloodGroup::ONegative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BloodGroup::APositive => "A+",
            BloodGroup::ANegative => "A-",
            BloodGroup::BPositive => "B+",
            BloodGroup::BNegative => "B-",
            BloodGroup::AbPositive => "AB+",
            BloodGroup::AbNegative => "AB-",
            BloodGroup::OPositive => "O+",
            BloodGroup::ONegative => "O-",
        }
    }

    /// 输血兼容表：可以给当前血型（受血者）供血的血型集合
    /// O- 是万能供血者，AB+ 是万能受血者，每一项都包含自身
    pub fn compatible_donors(self) -> &'static [BloodGroup] {
        use BloodGroup::*;
        match self {
            ONegative => &[ONegative],
            OPositive => &[ONegative, OPositive],
            ANegative => &[ONegative, ANegative],
            APositive => &[ONegative, OPositive, ANegative, APositive],
            BNegative => &[ONegative, BNegative],
            BPositive => &[ONegative, OPositive, BNegative, BPositive],
            AbNegative => &[ONegative, ANegative, BNegative, AbNegative],
            AbPositive => &[
                ONegative, OPositive, ANegative, APositive, BNegative, BPositive, AbNegative,
                AbPositive,
            ],
        }
    }
}

impl fmt::Display for BloodGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloodGroup {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A+" => Ok(BloodGroup::APositive),
            "A-" => Ok(BloodGroup::ANegative),
            "B+" => Ok(BloodGroup::BPositive),
            "B-" => Ok(BloodGroup::BNegative),
            "AB+" => Ok(BloodGroup::AbPositive),
            "AB-" => Ok(BloodGroup::AbNegative),
            "O+" => Ok(BloodGroup::OPositive),
            "O-" => Ok(BloodGroup::ONegative),
            _ => Err(()),
        }
    }
}

/// 按受血者血型查兼容供血血型，返回字符串形式（与存储字段一致）
///
/// 未知血型退化为仅精确匹配，而不是报错：历史数据里存在手填的血型值。
pub fn compatible_donor_groups(raw: &str) -> Vec<String> {
    match raw.parse::<BloodGroup>() {
        Ok(group) => group
            .compatible_donors()
            .iter()
            .map(|donor| donor.as_str().to_string())
            .collect(),
        Err(()) => vec![raw.trim().to_string()],
    }
}

/// 能解析成标准血型的统一成规范写法，手填的未知值原样保留
pub fn canonical_group(raw: &str) -> String {
    match raw.parse::<BloodGroup>() {
        Ok(group) => group.as_str().to_string(),
        Err(()) => raw.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_group_can_receive_its_own_type() {
        for group in BloodGroup::ALL {
            assert!(
                group.compatible_donors().contains(&group),
                "{} should accept itself",
                group
            );
        }
    }

    #[test]
    fn universal_donor_and_recipient() {
        // O- 可以给所有血型供血
        for group in BloodGroup::ALL {
            assert!(group.compatible_donors().contains(&BloodGroup::ONegative));
        }
        // AB+ 可以接受所有血型
        assert_eq!(BloodGroup::AbPositive.compatible_donors().len(), 8);
        // O- 只能接受 O-
        assert_eq!(
            BloodGroup::ONegative.compatible_donors(),
            &[BloodGroup::ONegative]
        );
    }

    #[test]
    fn positive_recipients_accept_both_rh_of_compatible_abo() {
        assert_eq!(
            compatible_donor_groups("A+"),
            vec!["O-", "O+", "A-", "A+"]
        );
        assert_eq!(compatible_donor_groups("B-"), vec!["O-", "B-"]);
    }

    #[test]
    fn a_positive_cannot_donate_to_o_negative() {
        assert!(!compatible_donor_groups("O-").contains(&"A+".to_string()));
    }

    #[test]
    fn unknown_group_degrades_to_exact_match() {
        assert_eq!(compatible_donor_groups("Rh-null"), vec!["Rh-null"]);
    }

    #[test]
    fn parses_lowercase_and_padded_input() {
        assert_eq!("ab+".parse::<BloodGroup>(), Ok(BloodGroup::AbPositive));
        assert_eq!(" o- ".parse::<BloodGroup>(), Ok(BloodGroup::ONegative));
        assert!("C+".parse::<BloodGroup>().is_err());
    }

    #[test]
    fn canonicalizes_known_groups() {
        assert_eq!(canonical_group("ab+"), "AB+");
        assert_eq!(canonical_group(" o- "), "O-");
        assert_eq!(canonical_group("Bombay"), "Bombay");
    }
}
