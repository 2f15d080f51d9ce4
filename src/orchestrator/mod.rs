//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ### `batch_processor` - 批量作业处理器
//! - 管理应用生命周期（初始化、运行、清理）
//! - 收集并暂存所有压缩包（Vec<StagedArchive>）
//! - 按顺序逐份调用 SubmissionFlow
//! - 追加结果行、清理暂存目录、输出全局统计
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<StagedArchive>)
//!     ↓
//! workflow::SubmissionFlow (处理单份作业)
//!     ↓
//! services (能力层：collect / extract / read / group / evaluate / aggregate / summarize)
//!     ↓
//! clients (外部能力：TextGenerator)
//! ```

pub mod batch_processor;

pub use batch_processor::{App, BatchReport};
