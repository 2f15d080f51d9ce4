//! 程序配置
//!
//! 加载顺序（后者覆盖前者）：内置默认值 → TOML 配置文件 → 环境变量 → 命令行参数。

use crate::error::ConfigError;
use crate::models::AssignmentType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// 程序配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 存放学生 ZIP 的搜索目录
    pub search_dir: PathBuf,
    /// 暂存目录（修复/去重后的 ZIP 副本）
    pub staging_dir: PathBuf,
    /// 结果表输出目录
    pub output_dir: PathBuf,
    /// 解压临时目录的父目录，未设置时使用系统临时目录
    pub scratch_root: Option<PathBuf>,
    /// 作业要求
    pub requirements: String,
    /// 作业要求文件（设置后覆盖 requirements）
    pub requirements_file: Option<PathBuf>,
    /// 题目数量
    pub num_questions: usize,
    /// 作业类型
    pub assignment_type: AssignmentType,
    /// 压缩包扩展名（不区分大小写）
    pub archive_extension: String,
    /// 需要排除的系统元数据文件名前缀
    pub metadata_prefixes: Vec<String>,
    /// 需要读取的源文件扩展名
    pub source_extensions: Vec<String>,
    /// 源文件候选编码，按顺序尝试
    pub encodings: Vec<String>,
    /// ZIP 内非 UTF-8 文件名的目标编码
    pub filename_encoding: String,
    /// 分组提示词中每个文件的内容预览长度（字符）
    pub preview_chars: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    /// 单次请求超时（秒）
    pub llm_timeout_secs: u64,
    /// 传输失败时的最大尝试次数
    pub llm_max_attempts: usize,
    /// 使用流式接口
    pub llm_stream: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search_dir: PathBuf::new(),
            staging_dir: PathBuf::from("collected_zips"),
            output_dir: PathBuf::from("."),
            scratch_root: None,
            requirements: String::new(),
            requirements_file: None,
            num_questions: 1,
            assignment_type: AssignmentType::Lab,
            archive_extension: "zip".to_string(),
            metadata_prefixes: vec!["._".to_string()],
            source_extensions: vec!["cpp".to_string(), "h".to_string()],
            encodings: vec![
                "utf-8".to_string(),
                "gbk".to_string(),
                "gb2312".to_string(),
                "latin-1".to_string(),
            ],
            filename_encoding: "gbk".to_string(),
            preview_chars: 200,
            verbose_logging: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string(),
            llm_model_name: "qwen3-235b-a22b".to_string(),
            llm_temperature: 0.1,
            llm_max_tokens: 4096,
            llm_timeout_secs: 180,
            llm_max_attempts: 3,
            llm_stream: false,
        }
    }
}

impl Config {
    /// 从 TOML 文件加载，未提供的字段使用默认值
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::FileLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// 加载配置：可选的配置文件 + 环境变量
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        Ok(base.with_env())
    }

    /// 用环境变量覆盖当前配置
    pub fn with_env(self) -> Self {
        let current = self;
        Self {
            search_dir: env_parse("GRADER_SEARCH_DIR").unwrap_or(current.search_dir),
            staging_dir: env_parse("GRADER_STAGING_DIR").unwrap_or(current.staging_dir),
            output_dir: env_parse("GRADER_OUTPUT_DIR").unwrap_or(current.output_dir),
            scratch_root: env_parse("GRADER_SCRATCH_ROOT").or(current.scratch_root),
            requirements: env_parse("GRADER_REQUIREMENTS").unwrap_or(current.requirements),
            requirements_file: env_parse("GRADER_REQUIREMENTS_FILE").or(current.requirements_file),
            num_questions: env_parse("GRADER_NUM_QUESTIONS").unwrap_or(current.num_questions),
            assignment_type: env_parse("GRADER_ASSIGNMENT_TYPE").unwrap_or(current.assignment_type),
            archive_extension: env_parse("GRADER_ARCHIVE_EXTENSION").unwrap_or(current.archive_extension),
            metadata_prefixes: env_list("GRADER_METADATA_PREFIXES").unwrap_or(current.metadata_prefixes),
            source_extensions: env_list("GRADER_SOURCE_EXTENSIONS").unwrap_or(current.source_extensions),
            encodings: env_list("GRADER_ENCODINGS").unwrap_or(current.encodings),
            filename_encoding: env_parse("GRADER_FILENAME_ENCODING").unwrap_or(current.filename_encoding),
            preview_chars: env_parse("GRADER_PREVIEW_CHARS").unwrap_or(current.preview_chars),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(current.verbose_logging),
            llm_api_key: env_parse("LLM_API_KEY")
                .or_else(|| env_parse("DASHSCOPE_API_KEY"))
                .unwrap_or(current.llm_api_key),
            llm_api_base_url: env_parse("LLM_API_BASE_URL").unwrap_or(current.llm_api_base_url),
            llm_model_name: env_parse("LLM_MODEL_NAME").unwrap_or(current.llm_model_name),
            llm_temperature: env_parse("LLM_TEMPERATURE").unwrap_or(current.llm_temperature),
            llm_max_tokens: env_parse("LLM_MAX_TOKENS").unwrap_or(current.llm_max_tokens),
            llm_timeout_secs: env_parse("LLM_TIMEOUT_SECS").unwrap_or(current.llm_timeout_secs),
            llm_max_attempts: env_parse("LLM_MAX_ATTEMPTS").unwrap_or(current.llm_max_attempts),
            llm_stream: env_parse("LLM_STREAM").unwrap_or(current.llm_stream),
        }
    }

    /// 如果配置了作业要求文件，读取其内容
    pub fn resolve_requirements(&mut self) -> Result<(), ConfigError> {
        if let Some(path) = &self.requirements_file {
            let text = std::fs::read_to_string(path).map_err(|e| ConfigError::FileLoad {
                path: path.clone(),
                message: e.to_string(),
            })?;
            self.requirements = text.trim().to_string();
        }
        Ok(())
    }

    /// 启动前校验，任何错误都会阻止批改开始
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.search_dir.is_dir() {
            return Err(ConfigError::SearchDirNotFound {
                path: self.search_dir.clone(),
            });
        }
        if self.requirements.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "requirements",
            });
        }
        if self.llm_api_key.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "llm_api_key",
            });
        }
        if self.num_questions == 0 {
            return Err(ConfigError::InvalidValue {
                field: "num_questions",
                value: "0".to_string(),
                reason: "题目数量必须大于 0".to_string(),
            });
        }
        if self.llm_max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "llm_max_attempts",
                value: "0".to_string(),
                reason: "至少需要尝试一次".to_string(),
            });
        }
        for label in self.encodings.iter().chain(Some(&self.filename_encoding)) {
            if encoding_rs::Encoding::for_label(label.as_bytes()).is_none() {
                return Err(ConfigError::UnknownEncoding {
                    label: label.clone(),
                });
            }
        }
        Ok(())
    }

    /// 用于展示的 API 密钥（只保留末 4 位）
    pub fn masked_api_key(&self) -> String {
        let chars: Vec<char> = self.llm_api_key.chars().collect();
        if chars.len() <= 4 {
            return "*".repeat(chars.len());
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}{}", "*".repeat(chars.len() - 4), tail)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|v| {
        v.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}
