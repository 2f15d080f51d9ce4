//! 批量作业处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个批改流程的入口，负责批量作业的调度和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：校验配置、创建 LLM 服务和作业处理流程
//! 2. **收集**：把搜索目录中的压缩包修复、去重后复制到暂存目录
//! 3. **逐份处理**：按发现顺序一次处理一份作业，不并发
//! 4. **结果落盘**：每份作业结束后立即追加一行结果
//! 5. **清理**：删除暂存的压缩包
//! 6. **全局统计**：汇总所有作业的处理结果
//!
//! ## 设计特点
//!
//! - **每个输入一行**：复制失败、无效压缩包、解压失败也会写入哨兵分数
//! - **向下委托**：委托 workflow::SubmissionFlow 处理单份作业

use crate::clients::TextGenerator;
use crate::config::Config;
use crate::error::AppResult;
use crate::models::{CollectEntry, CollectReport, ProgressEvent, StudentInfo, SubmissionResult};
use crate::services::{ArchiveCollector, LlmService, ProgressSink, ResultsWriter};
use crate::utils::logging::{log_startup, log_submission_start, print_final_stats};
use crate::workflow::{SubmissionCtx, SubmissionFlow, SubmissionStage};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error};

/// 复制失败的作业反馈
pub const COPY_FAILED_FEEDBACK: &str = "复制失败";

/// 应用主结构
pub struct App {
    config: Config,
    collector: ArchiveCollector,
    flow: SubmissionFlow,
}

/// 一次批改的结果
#[derive(Debug)]
pub struct BatchReport {
    /// 按处理顺序排列，每个发现的压缩包一行
    pub results: Vec<SubmissionResult>,
    pub output_file: PathBuf,
}

impl BatchReport {
    /// 失败或题目不足的作业数量
    pub fn failed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.final_score.is_sentinel())
            .count()
    }
}

impl App {
    /// 初始化应用
    ///
    /// 配置校验失败时返回错误，此时不会处理任何作业。
    pub fn initialize(config: Config, generator: Arc<dyn TextGenerator>) -> AppResult<Self> {
        config.validate()?;
        log_startup(&config);

        let llm = LlmService::new(generator, &config);
        let flow = SubmissionFlow::new(&config, llm)?;
        let collector = ArchiveCollector::new(&config);

        Ok(Self {
            config,
            collector,
            flow,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self, sink: &dyn ProgressSink) -> AppResult<BatchReport> {
        let staging_dir = self.config.staging_dir.as_path();
        let staging_created = !staging_dir.exists();

        sink.info(format!(
            "开始合并ZIP文件，搜索目录: {}",
            self.config.search_dir.display()
        ));
        let collected = self
            .collector
            .collect(&self.config.search_dir, staging_dir, sink)?;

        let graded = self.grade_all(&collected, sink).await;
        cleanup_staging(staging_dir, staging_created, &collected, sink);
        let report = graded?;

        let output_file = report.output_file.display().to_string();
        sink.emit(
            ProgressEvent::success(format!(
                "批改完成！共处理 {} 份作业，结果已保存至 {}",
                report.results.len(),
                output_file
            ))
            .with_results(report.results.len(), output_file.clone()),
        );

        let failed = report.failed_count();
        print_final_stats(
            report.results.len() - failed,
            failed,
            report.results.len(),
            &output_file,
        );

        Ok(report)
    }

    /// 按发现顺序逐份处理，复制失败的压缩包原位写入失败行
    async fn grade_all(
        &self,
        collected: &CollectReport,
        sink: &dyn ProgressSink,
    ) -> AppResult<BatchReport> {
        let mut writer = ResultsWriter::create_in(&self.config.output_dir)?;
        let total = collected.entries.len();
        let mut results = Vec::with_capacity(total);

        sink.info(format!("开始批改作业，共有 {} 份作业", total));

        for (idx, entry) in collected.entries.iter().enumerate() {
            let result = match entry {
                CollectEntry::Staged(staged) => {
                    let ctx = SubmissionCtx::from_staged(idx + 1, total, staged);
                    log_submission_start(ctx.index, total, &ctx.archive_name);
                    sink.info(format!(
                        "正在处理第 {}/{} 份作业: {}",
                        ctx.index, total, ctx.archive_name
                    ));

                    let outcome = self.flow.run(&ctx, sink).await;
                    debug!("{} {:?} -> {:?}", ctx, outcome.last_stage, SubmissionStage::Recorded);
                    outcome.result
                }
                CollectEntry::CopyFailed(path) => copy_failed_result(path),
            };
            writer.append(&result)?;
            results.push(result);
        }

        let output_file = writer.finish()?;
        Ok(BatchReport {
            results,
            output_file,
        })
    }
}

/// 复制失败的压缩包对应的结果行，身份从文件名解析
fn copy_failed_result(path: &Path) -> SubmissionResult {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    SubmissionResult::failed(&StudentInfo::from_archive_name(&name), COPY_FAILED_FEEDBACK)
}

/// 删除暂存的压缩包：目录由本次运行创建时整个删除，否则只删除本次暂存的文件
fn cleanup_staging(
    staging_dir: &Path,
    created: bool,
    collected: &CollectReport,
    sink: &dyn ProgressSink,
) {
    if created {
        match fs::remove_dir_all(staging_dir) {
            Ok(()) => sink.info(format!("已清理临时文件目录: {}", staging_dir.display())),
            Err(e) => sink.warning(format!("清理临时文件目录失败: {}", e)),
        }
        return;
    }

    let mut failures = 0usize;
    for staged in collected.staged() {
        if let Err(e) = fs::remove_file(&staged.staged_path) {
            error!("删除 {} 失败: {}", staged.staged_path.display(), e);
            failures += 1;
        }
    }
    if failures == 0 {
        sink.info(format!(
            "已清理 {} 个暂存文件: {}",
            collected.copied_count(),
            staging_dir.display()
        ));
    } else {
        sink.warning(format!("有 {} 个暂存文件清理失败", failures));
    }
}
