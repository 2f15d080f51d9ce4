/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use crate::config::Config;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// 初始化日志
///
/// 日志统一写到 stderr，stdout 留给 JSON 进度事件。
/// `RUST_LOG` 优先；否则 `verbose` 为 true 时输出 debug 级别。
pub fn init(verbose: bool) -> anyhow::Result<()> {
    let default_level = if verbose {
        "homework_grader=debug,info"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))
}

/// 记录程序启动信息
///
/// # 参数
/// - `config`: 本次运行的配置
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 作业批改模式");
    info!("📁 搜索目录: {}", config.search_dir.display());
    info!("📝 作业类型: {} / 题目数量: {}", config.assignment_type, config.num_questions);
    info!("🤖 模型: {}", config.llm_model_name);
    info!("{}", "=".repeat(60));
}

/// 记录单份作业开始处理
pub fn log_submission_start(index: usize, total: usize, name: &str) {
    info!("\n{}", "─".repeat(60));
    info!("📦 正在处理第 {}/{} 份作业: {}", index, total, name);
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `graded`: 正常得到成绩的数量
/// - `failed`: 失败（哨兵分数）的数量
/// - `total`: 总数
/// - `output_file`: 结果文件路径
pub fn print_final_stats(graded: usize, failed: usize, total: usize, output_file: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 已评分: {}/{}", graded, total);
    info!("❌ 失败或题目不足: {}", failed);
    info!("{}", "=".repeat(60));
    info!("\n结果已保存至: {}", output_file);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（字符数）
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
