use crate::config::Config;
use crate::models::AssignmentType;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "homework-grader")]
#[command(about = "批量批改 C++ 编程作业压缩包", long_about = None)]
pub struct Cli {
    /// TOML 配置文件
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// 输出 debug 级别日志
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// 收集、解压、分组、评分并写出结果表
    Grade(GradeArgs),
    /// 只收集并修复压缩包
    Collect {
        /// 搜索目录
        search_dir: PathBuf,
        /// 输出目录，默认为配置中的暂存目录
        output_dir: Option<PathBuf>,
    },
    /// 打印当前生效的配置
    PrintConfig,
}

/// 进度输出方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProgressMode {
    /// 通过日志输出
    Log,
    /// 在 stdout 上逐行输出 JSON 事件
    Json,
}

#[derive(Debug, Args)]
pub struct GradeArgs {
    /// 存放学生作业压缩包的目录
    #[arg(short, long)]
    pub search_dir: Option<PathBuf>,

    /// 作业要求
    #[arg(short, long)]
    pub requirements: Option<String>,

    /// 从文件读取作业要求
    #[arg(long)]
    pub requirements_file: Option<PathBuf>,

    /// 题目数量
    #[arg(short, long)]
    pub num_questions: Option<usize>,

    /// 作业类型：lab（实验）或 theory（理论）
    #[arg(short = 't', long)]
    pub assignment_type: Option<AssignmentType>,

    /// 结果表输出目录
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// 暂存目录
    #[arg(long)]
    pub staging_dir: Option<PathBuf>,

    #[arg(long)]
    pub base_url: Option<String>,

    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub api_key: Option<String>,

    /// 进度输出方式
    #[arg(long, value_enum, default_value_t = ProgressMode::Log)]
    pub progress: ProgressMode,
}

impl GradeArgs {
    /// 用命令行参数覆盖配置
    pub fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.search_dir {
            config.search_dir = dir.clone();
        }
        if let Some(text) = &self.requirements {
            config.requirements = text.clone();
        }
        if let Some(path) = &self.requirements_file {
            config.requirements_file = Some(path.clone());
        }
        if let Some(n) = self.num_questions {
            config.num_questions = n;
        }
        if let Some(kind) = self.assignment_type {
            config.assignment_type = kind;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(dir) = &self.staging_dir {
            config.staging_dir = dir.clone();
        }
        if let Some(url) = &self.base_url {
            config.llm_api_base_url = url.clone();
        }
        if let Some(model) = &self.model {
            config.llm_model_name = model.clone();
        }
        if let Some(key) = &self.api_key {
            config.llm_api_key = key.clone();
        }
    }
}
