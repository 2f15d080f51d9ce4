//! 作业处理上下文
//!
//! 封装"我正在处理第几份作业、是谁交的"这一信息

use crate::models::{StagedArchive, StudentInfo};
use std::fmt::Display;
use std::path::PathBuf;

/// 作业处理上下文
#[derive(Debug, Clone)]
pub struct SubmissionCtx {
    /// 作业序号（从1开始，仅用于日志显示）
    pub index: usize,

    /// 本批作业总数
    pub total: usize,

    /// 压缩包原始文件名
    pub archive_name: String,

    /// 暂存目录中的压缩包路径
    pub staged_path: PathBuf,

    /// 从文件名解析出的学生身份
    pub student: StudentInfo,
}

impl SubmissionCtx {
    /// 创建新的作业上下文
    pub fn new(index: usize, total: usize, archive_name: String, staged_path: PathBuf) -> Self {
        let student = StudentInfo::from_archive_name(&archive_name);
        Self {
            index,
            total,
            archive_name,
            staged_path,
            student,
        }
    }

    /// 从暂存结果创建
    pub fn from_staged(index: usize, total: usize, staged: &StagedArchive) -> Self {
        Self::new(
            index,
            total,
            staged.original_name.clone(),
            staged.staged_path.clone(),
        )
    }
}

impl Display for SubmissionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[作业 {}/{} {}]",
            self.index, self.total, self.archive_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ctx_display_and_student() {
        let ctx = SubmissionCtx::new(
            2,
            5,
            "2023002李四.zip".to_string(),
            PathBuf::from("collected_zips/2023002李四.zip"),
        );
        assert_eq!(ctx.to_string(), "[作业 2/5 2023002李四.zip]");
        assert_eq!(ctx.student.student_id, "2023002");
        assert_eq!(ctx.student.student_name, "李四");
    }
}
