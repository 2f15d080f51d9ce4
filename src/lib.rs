//! # Homework Grader
//!
//! 一个用于批量批改编程作业压缩包的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 外部能力层（Clients）
//! - `clients/` - 与外部大模型交互的唯一接口
//! - `TextGenerator` - 消息进、文本出、可能失败
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能对一份作业做什么"
//! - `ArchiveCollector` - 收集、修复、去重压缩包
//! - `Extractor` / `SourceReader` - 解压并解码源文件
//! - `QuestionGrouper` / `Evaluator` - LLM 分组与单题评分
//! - `ScoreAggregator` / `Summarizer` - 汇总成绩与生成反馈
//! - `ResultsWriter` / `ProgressSink` - 结果表与进度事件
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一份作业"的完整处理流程
//! - `SubmissionCtx` - 上下文封装（序号 + 学生身份）
//! - `SubmissionFlow` - 流程编排（解压 → 读取 → 分组 → 评分 → 汇总 → 总结）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量作业处理器，管理暂存目录和结果表
//!
//! ## 模块结构

pub mod cli;
pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{OpenAiTextGenerator, TextGenerator};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{AssignmentType, FinalScore, ProgressEvent, SubmissionResult};
pub use orchestrator::{App, BatchReport};
pub use workflow::{SubmissionCtx, SubmissionFlow};
