use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};

/// 学生身份（从压缩包文件名解析）
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StudentInfo {
    pub student_id: String,
    pub student_name: String,
}

impl StudentInfo {
    /// 从文件名中提取学号和姓名
    ///
    /// 学号取第一段连续数字，姓名取第一段连续汉字；
    /// 找不到汉字时姓名为去掉扩展名后的完整文件名。
    pub fn from_archive_name(file_name: &str) -> Self {
        let stem = Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| file_name.to_string());

        let student_id = Regex::new(r"\d+")
            .ok()
            .and_then(|re| re.find(&stem).map(|m| m.as_str().to_string()))
            .unwrap_or_default();
        let student_name = Regex::new(r"[\u{4e00}-\u{9fa5}]+")
            .ok()
            .and_then(|re| re.find(&stem).map(|m| m.as_str().to_string()))
            .unwrap_or_else(|| stem.clone());

        Self {
            student_id,
            student_name,
        }
    }
}

/// 成功解码的源文件
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub text: String,
    /// 解码成功的编码名称（仅用于诊断）
    pub encoding: &'static str,
}

impl SourceDocument {
    /// 文件名（不含目录）
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// 一道题目对应的文件分组
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionGroup {
    /// 题目标识，只在同一份作业内唯一
    pub question_id: String,
    /// (文件名, 内容)，保持顺序
    pub files: Vec<(String, String)>,
}

impl QuestionGroup {
    pub fn new(question_id: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            files: Vec::new(),
        }
    }

    pub fn file_names(&self) -> Vec<&str> {
        self.files.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// 合并后的代码内容，每个文件前带 `//=== 文件名 ===` 标记
    pub fn merged_content(&self) -> String {
        self.files
            .iter()
            .map(|(name, content)| format!("//=== {} ===\n{}\n\n", name, content))
            .collect()
    }
}

/// 单题解析失败（所有解析策略都失败）
pub const PARSE_FAILURE_SENTINEL: &str = "-1";
/// 单题评分请求传输失败
pub const TRANSPORT_FAILURE_SENTINEL: &str = "-99";

/// 单题评分结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseScore {
    /// 评分模型返回的题号
    pub question_id: String,
    /// 分数记号，可能是数字或等级，不在此层解释
    pub raw_score: String,
    /// 评分模型的原始回复
    pub feedback: String,
}

impl ExerciseScore {
    pub fn parse_failure(feedback: impl Into<String>) -> Self {
        Self {
            question_id: PARSE_FAILURE_SENTINEL.to_string(),
            raw_score: PARSE_FAILURE_SENTINEL.to_string(),
            feedback: feedback.into(),
        }
    }

    pub fn transport_failure(feedback: impl Into<String>) -> Self {
        Self {
            question_id: TRANSPORT_FAILURE_SENTINEL.to_string(),
            raw_score: TRANSPORT_FAILURE_SENTINEL.to_string(),
            feedback: feedback.into(),
        }
    }

    /// 是否为哨兵分数（负数记号）
    pub fn is_sentinel(&self) -> bool {
        self.raw_score
            .trim()
            .parse::<i64>()
            .map(|v| v < 0)
            .unwrap_or(false)
    }
}

/// 一份作业的最终得分
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalScore {
    /// 实验类：有效分数的平均值
    Numeric(i64),
    /// 理论类：等级
    Grade(String),
    /// 得分数量少于题目数量
    Insufficient,
    /// 作业无法处理（无效压缩包、解压失败等）
    Failed,
}

impl FinalScore {
    pub fn is_sentinel(&self) -> bool {
        matches!(self, FinalScore::Insufficient | FinalScore::Failed)
    }
}

impl fmt::Display for FinalScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalScore::Numeric(v) => write!(f, "{}", v),
            FinalScore::Grade(g) => f.write_str(g),
            FinalScore::Insufficient => f.write_str("-2"),
            FinalScore::Failed => f.write_str("-1"),
        }
    }
}

/// 一份作业的最终结果，对应结果表中的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    pub student_id: String,
    pub student_name: String,
    pub final_score: FinalScore,
    pub feedback: String,
}

impl SubmissionResult {
    pub fn new(student: &StudentInfo, final_score: FinalScore, feedback: impl Into<String>) -> Self {
        Self {
            student_id: student.student_id.clone(),
            student_name: student.student_name.clone(),
            final_score,
            feedback: feedback.into(),
        }
    }

    /// 失败的作业：哨兵分数 + 失败原因
    pub fn failed(student: &StudentInfo, reason: impl Into<String>) -> Self {
        Self::new(student, FinalScore::Failed, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_student_info_id_and_name() {
        let info = StudentInfo::from_archive_name("2023123456张三_实验二.zip");
        assert_eq!(info.student_id, "2023123456");
        assert_eq!(info.student_name, "张三");
    }

    #[test]
    fn test_student_info_without_chinese_name() {
        let info = StudentInfo::from_archive_name("alice_homework.zip");
        assert_eq!(info.student_id, "");
        assert_eq!(info.student_name, "alice_homework");
    }

    #[test]
    fn test_merged_content_markers() {
        let group = QuestionGroup {
            question_id: "q1".to_string(),
            files: vec![("a.cpp".to_string(), "int a;".to_string())],
        };
        assert_eq!(group.merged_content(), "//=== a.cpp ===\nint a;\n\n");
    }

    #[test]
    fn test_exercise_score_sentinel() {
        assert!(ExerciseScore::parse_failure("x").is_sentinel());
        assert!(ExerciseScore::transport_failure("x").is_sentinel());
        let ok = ExerciseScore {
            question_id: "1".to_string(),
            raw_score: "B".to_string(),
            feedback: String::new(),
        };
        assert!(!ok.is_sentinel());
    }

    #[test]
    fn test_final_score_display() {
        assert_eq!(FinalScore::Numeric(15).to_string(), "15");
        assert_eq!(FinalScore::Grade("B".to_string()).to_string(), "B");
        assert_eq!(FinalScore::Insufficient.to_string(), "-2");
        assert_eq!(FinalScore::Failed.to_string(), "-1");
    }
}
