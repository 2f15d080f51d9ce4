use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 作业类型
///
/// 决定单题评分的打分方式和总分的汇总策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentType {
    /// 实验：每题 0-100 分，总分为有效分数的平均值
    #[serde(alias = "实验", alias = "numeric")]
    Lab,
    /// 理论：每题 A-D 等级，总评取众数
    #[serde(alias = "理论", alias = "categorical")]
    Theory,
}

impl AssignmentType {
    /// 获取中文名称
    pub fn name(self) -> &'static str {
        match self {
            AssignmentType::Lab => "实验",
            AssignmentType::Theory => "理论",
        }
    }
}

impl fmt::Display for AssignmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AssignmentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lab" | "实验" | "numeric" => Ok(AssignmentType::Lab),
            "theory" | "理论" | "categorical" => Ok(AssignmentType::Theory),
            other => Err(format!("未知的作业类型: {}", other)),
        }
    }
}
