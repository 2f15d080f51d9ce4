//! 作业处理流程 - 流程层
//!
//! 核心职责：定义"一份作业"的完整处理流程
//!
//! 流程顺序：
//! 1. 压缩包有效性检查 → 解压
//! 2. 读取源文件 → LLM 分组（之后立即删除解压目录）
//! 3. 逐组评分 → 汇总成绩 → LLM 总结
//!
//! 任何一步失败都会生成带哨兵分数的结果，不会中断整批任务。

use std::ffi::OsStr;
use std::path::Path;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::ConfigError;
use crate::models::{ExerciseScore, SourceDocument, SubmissionResult};
use crate::services::archive_collector::is_valid_archive_file;
use crate::services::{
    Evaluator, Extractor, LlmService, ProgressSink, QuestionGrouper, ScoreAggregator,
    SourceReader, Summarizer,
};
use crate::workflow::submission_ctx::SubmissionCtx;

/// 作业处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStage {
    Pending,
    Extracted,
    Read,
    Grouped,
    Evaluated,
    Aggregated,
    Summarized,
    /// 结果已写入结果表（由编排层设置）
    Recorded,
    /// 任一步骤失败后的终止状态
    Error,
}

/// 单份作业的处理结果
#[derive(Debug, Clone)]
pub struct FlowOutcome {
    pub result: SubmissionResult,
    pub last_stage: SubmissionStage,
}

/// 作业处理流程
///
/// - 编排一份作业从解压到总结的完整流程
/// - 决定何时降级为哨兵分数
/// - 只依赖业务能力（services）
pub struct SubmissionFlow {
    extractor: Extractor,
    reader: SourceReader,
    grouper: QuestionGrouper,
    evaluator: Evaluator,
    aggregator: ScoreAggregator,
    summarizer: Summarizer,
    requirements: String,
    source_extensions: Vec<String>,
}

impl SubmissionFlow {
    /// 创建新的作业处理流程
    pub fn new(config: &Config, llm: LlmService) -> Result<Self, ConfigError> {
        Ok(Self {
            extractor: Extractor::new(&config.filename_encoding, config.scratch_root.clone()),
            reader: SourceReader::from_labels(&config.encodings)?,
            grouper: QuestionGrouper::new(llm.clone(), config.preview_chars),
            evaluator: Evaluator::new(llm.clone(), config.assignment_type),
            aggregator: ScoreAggregator::new(config.assignment_type, config.num_questions),
            summarizer: Summarizer::new(llm, config.assignment_type),
            requirements: config.requirements.clone(),
            source_extensions: config
                .source_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
        })
    }

    pub async fn run(&self, ctx: &SubmissionCtx, sink: &dyn ProgressSink) -> FlowOutcome {
        advance(ctx, SubmissionStage::Pending);
        let student = &ctx.student;
        sink.info(format!(
            "学号: {}, 姓名: {}",
            student.student_id, student.student_name
        ));

        // ========== 有效性检查 ==========
        if !is_valid_archive_file(&ctx.staged_path) {
            sink.warning(format!(
                "警告: {} 不是一个有效的ZIP文件，跳过处理",
                ctx.archive_name
            ));
            return fail(ctx, "无效的ZIP文件");
        }

        // ========== 解压 ==========
        let extracted = match self.extractor.extract(&ctx.staged_path) {
            Ok(extracted) => extracted,
            Err(e) => {
                let reason = format!("提取文件失败: {}", e);
                sink.error(reason.clone());
                return fail(ctx, reason);
            }
        };
        sink.info(format!("已提取 {} 个文件", extracted.files().len()));
        debug!("{} 解压目录: {}", ctx, extracted.root().display());
        advance(ctx, SubmissionStage::Extracted);

        // ========== 读取源文件 ==========
        let docs = self.read_sources(extracted.files(), sink);
        advance(ctx, SubmissionStage::Read);

        // ========== 分组 ==========
        let groups = self.grouper.group(&docs, &self.requirements, sink).await;
        drop(extracted);
        sink.info(format!("文件分组完成，共 {} 组", groups.len()));
        advance(ctx, SubmissionStage::Grouped);

        // ========== 逐组评分 ==========
        let mut scores: Vec<ExerciseScore> = Vec::with_capacity(groups.len());
        for group in &groups {
            let score = self
                .evaluator
                .evaluate(group, &self.requirements, sink)
                .await;
            info!(
                "{} 题目 {} -> 题号 {} 得分 {}",
                ctx, group.question_id, score.question_id, score.raw_score
            );
            scores.push(score);
        }
        advance(ctx, SubmissionStage::Evaluated);

        // ========== 汇总 ==========
        let final_score = self.aggregator.aggregate(&scores, sink);
        advance(ctx, SubmissionStage::Aggregated);

        // ========== 总结 ==========
        let feedback = self
            .summarizer
            .summarize(&groups, &scores, &self.requirements, sink)
            .await;
        advance(ctx, SubmissionStage::Summarized);

        sink.info(format!(
            "处理完成: {} - 得分: {}",
            student.student_name, final_score
        ));

        FlowOutcome {
            result: SubmissionResult::new(student, final_score, feedback),
            last_stage: SubmissionStage::Summarized,
        }
    }

    /// 读取所有源文件，读取失败的文件跳过
    fn read_sources(
        &self,
        files: &[std::path::PathBuf],
        sink: &dyn ProgressSink,
    ) -> Vec<SourceDocument> {
        files
            .iter()
            .filter(|path| self.is_source_file(path))
            .filter_map(|path| {
                let doc = self.reader.read(path);
                if doc.is_none() {
                    sink.warning(format!("读取文件内容失败: {}", path.display()));
                }
                doc
            })
            .collect()
    }

    fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.source_extensions.iter().any(|allowed| *allowed == ext)
            })
            .unwrap_or(false)
    }
}

fn advance(ctx: &SubmissionCtx, stage: SubmissionStage) {
    debug!("{} -> {:?}", ctx, stage);
}

fn fail(ctx: &SubmissionCtx, reason: impl Into<String>) -> FlowOutcome {
    advance(ctx, SubmissionStage::Error);
    FlowOutcome {
        result: SubmissionResult::failed(&ctx.student, reason),
        last_stage: SubmissionStage::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{ChatMessage, TextGenerator};
    use crate::error::LlmError;
    use crate::models::{AssignmentType, EventKind, FinalScore};
    use crate::services::RecordingSink;
    use async_trait::async_trait;
    use std::io::{Cursor, Write};
    use std::sync::Arc;
    use std::time::Duration;
    use zip::write::SimpleFileOptions;

    /// 按请求类型回复：分组、评分、总结
    struct RoleAwareGenerator;

    #[async_trait]
    impl TextGenerator for RoleAwareGenerator {
        async fn generate(&self, messages: &[ChatMessage], _: f32) -> Result<String, LlmError> {
            let prompt = &messages[messages.len() - 1].content;
            if prompt.contains("返回分组结果") {
                Ok("[<question>q1</question>, <files>[a.cpp]</files>]\n\
                    [<question>q2</question>, <files>[b.cpp]</files>]"
                    .to_string())
            } else if prompt.contains("批改下面这一道题") {
                if prompt.contains("//=== a.cpp ===") {
                    Ok("[<question>1</question>, <score>90</score>]".to_string())
                } else {
                    Ok("[<question>2</question>, <score>70</score>]".to_string())
                }
            } else {
                Ok("整体完成较好".to_string())
            }
        }

        fn model_name(&self) -> &str {
            "role-aware"
        }
    }

    fn flow(dir: &Path) -> SubmissionFlow {
        let config = Config {
            requirements: "1. 实现 a；2. 实现 b".to_string(),
            num_questions: 2,
            assignment_type: AssignmentType::Lab,
            encodings: vec!["utf-8".to_string(), "gbk".to_string()],
            scratch_root: Some(dir.join("scratch")),
            ..Default::default()
        };
        let llm = LlmService::with_limits(
            Arc::new(RoleAwareGenerator),
            Duration::from_secs(5),
            1,
            Duration::ZERO,
        );
        SubmissionFlow::new(&config, llm).unwrap()
    }

    fn write_zip(path: &Path, files: &[(&str, &str)]) {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in files {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        std::fs::write(path, writer.finish().unwrap().into_inner()).unwrap();
    }

    #[tokio::test]
    async fn test_full_flow() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("2023001张三.zip");
        write_zip(
            &archive,
            &[
                ("a.cpp", "int a() { return 1; }"),
                ("b.CPP", "int b() { return 2; }"),
                ("readme.txt", "ignored"),
            ],
        );
        let ctx = SubmissionCtx::new(1, 1, "2023001张三.zip".to_string(), archive);
        let sink = RecordingSink::new();

        // b.CPP 的 basename 与回复中的 b.cpp 不同，只有 a.cpp 能匹配
        let outcome = flow(dir.path()).run(&ctx, &sink).await;
        assert_eq!(outcome.last_stage, SubmissionStage::Summarized);
        assert_eq!(outcome.result.student_id, "2023001");
        assert_eq!(outcome.result.feedback, "整体完成较好");
        assert_eq!(outcome.result.final_score, FinalScore::Insufficient);

        // 解压目录已删除
        let scratch = dir.path().join("scratch");
        assert_eq!(std::fs::read_dir(&scratch).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_two_exercises_averaged() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("2023001张三.zip");
        write_zip(
            &archive,
            &[("q1/a.cpp", "int a() {}"), ("q2/b.cpp", "int b() {}")],
        );
        let ctx = SubmissionCtx::new(1, 1, "2023001张三.zip".to_string(), archive);
        let sink = RecordingSink::new();

        let outcome = flow(dir.path()).run(&ctx, &sink).await;
        assert_eq!(outcome.result.final_score, FinalScore::Numeric(80));
    }

    #[tokio::test]
    async fn test_invalid_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("2023003王五.zip");
        std::fs::write(&archive, b"garbage").unwrap();
        let ctx = SubmissionCtx::new(1, 1, "2023003王五.zip".to_string(), archive);
        let sink = RecordingSink::new();

        let outcome = flow(dir.path()).run(&ctx, &sink).await;
        assert_eq!(outcome.last_stage, SubmissionStage::Error);
        assert_eq!(outcome.result.final_score, FinalScore::Failed);
        assert_eq!(outcome.result.feedback, "无效的ZIP文件");
        assert_eq!(sink.messages(EventKind::Warning).len(), 1);
    }
}
