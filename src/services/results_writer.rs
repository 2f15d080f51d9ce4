//! 结果表写入服务 - 业务能力层
//!
//! 结果表为带 BOM 的 UTF-8 CSV，每份作业一行，处理完一份就追加并刷新一行。

use crate::error::FileError;
use crate::models::SubmissionResult;
use chrono::{DateTime, Local};
use csv::Writer;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// 表头
pub const RESULTS_HEADER: [&str; 4] = ["学号", "姓名", "得分", "作业情况"];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// 结果文件名：`grading_results_<YYYYmmdd_HHMMSS>.csv`
pub fn results_file_name(now: DateTime<Local>) -> String {
    format!("grading_results_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

/// 结果表写入服务
pub struct ResultsWriter {
    path: PathBuf,
    writer: Writer<File>,
    rows: usize,
}

impl ResultsWriter {
    /// 创建结果文件并写入 BOM 和表头
    pub fn create(path: &Path) -> Result<Self, FileError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| FileError::write_failed(parent, e))?;
        }

        let mut file = File::create(path).map_err(|e| FileError::write_failed(path, e))?;
        file.write_all(UTF8_BOM)
            .map_err(|e| FileError::write_failed(path, e))?;

        let mut results = Self {
            path: path.to_path_buf(),
            writer: Writer::from_writer(file),
            rows: 0,
        };
        results.write_row(RESULTS_HEADER)?;
        Ok(results)
    }

    /// 在输出目录中按当前时间创建结果文件
    pub fn create_in(output_dir: &Path) -> Result<Self, FileError> {
        Self::create(&output_dir.join(results_file_name(Local::now())))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 已写入的数据行数（不含表头）
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// 追加一行并立即刷新
    pub fn append(&mut self, result: &SubmissionResult) -> Result<(), FileError> {
        let score = result.final_score.to_string();
        self.write_row([
            result.student_id.as_str(),
            result.student_name.as_str(),
            score.as_str(),
            result.feedback.as_str(),
        ])?;
        self.rows += 1;
        Ok(())
    }

    fn write_row(&mut self, record: [&str; 4]) -> Result<(), FileError> {
        self.writer
            .write_record(record)
            .map_err(|source| FileError::CsvFailed {
                path: self.path.clone(),
                source,
            })?;
        self.writer
            .flush()
            .map_err(|e| FileError::write_failed(&self.path, e))
    }

    /// 结束写入
    pub fn finish(mut self) -> Result<PathBuf, FileError> {
        self.writer
            .flush()
            .map_err(|e| FileError::write_failed(&self.path, e))?;
        info!("评分结果已保存至 {}", self.path.display());
        Ok(self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FinalScore, StudentInfo};
    use chrono::TimeZone;

    fn student() -> StudentInfo {
        StudentInfo::from_archive_name("2023001张三.zip")
    }

    #[test]
    fn test_results_file_name() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(results_file_name(now), "grading_results_20240309_140507.csv");
    }

    #[test]
    fn test_bom_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("results.csv");
        let mut writer = ResultsWriter::create(&path).unwrap();
        writer
            .append(&SubmissionResult::new(
                &student(),
                FinalScore::Numeric(88),
                "完成较好，\n注意边界条件",
            ))
            .unwrap();
        writer
            .append(&SubmissionResult::failed(&student(), "无效的ZIP文件"))
            .unwrap();
        assert_eq!(writer.rows(), 2);

        let path = writer.finish().unwrap();
        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));

        let mut reader = csv::Reader::from_reader(&bytes[UTF8_BOM.len()..]);
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), RESULTS_HEADER.to_vec());

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][2], "88");
        assert_eq!(&rows[0][3], "完成较好，\n注意边界条件");
        assert_eq!(&rows[1][2], "-1");
    }

    #[test]
    fn test_rows_visible_before_finish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let mut writer = ResultsWriter::create(&path).unwrap();
        writer
            .append(&SubmissionResult::new(&student(), FinalScore::Insufficient, "x"))
            .unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("2023001,张三,-2,x"));
    }
}
