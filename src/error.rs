//! 错误类型
//!
//! 只有 `ConfigError` 和暂存目录/结果表的 `FileError` 会让整批任务中止；
//! `ArchiveError`、`LlmError` 在最近的组件边界上被转换成哨兵分数或进度事件。

use std::path::{Path, PathBuf};
use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误（启动阶段致命）
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件操作错误（暂存目录、结果表）
    #[error("文件错误: {0}")]
    File(#[from] FileError),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 搜索目录不存在
    #[error("搜索目录不存在: {}", .path.display())]
    SearchDirNotFound { path: PathBuf },
    /// 必填配置缺失
    #[error("缺少必填配置: {field}")]
    MissingField { field: &'static str },
    /// 配置值非法
    #[error("配置 {field} 的值 '{value}' 无效: {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: String,
    },
    /// 未知的编码名称
    #[error("未知的编码: {label}")]
    UnknownEncoding { label: String },
    /// 配置文件读取或解析失败
    #[error("无法加载配置文件 {}: {message}", .path.display())]
    FileLoad { path: PathBuf, message: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件不存在
    #[error("文件不存在: {}", .path.display())]
    NotFound { path: PathBuf },
    /// 读取失败
    #[error("读取文件失败 ({}): {source}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 写入失败
    #[error("写入文件失败 ({}): {source}", .path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// CSV 写入失败
    #[error("写入结果表失败 ({}): {source}", .path.display())]
    CsvFailed {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// 压缩包错误
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// 压缩包不存在
    #[error("ZIP 文件不存在: {}", .path.display())]
    NotFound { path: PathBuf },
    /// 不是有效的 ZIP
    #[error("无法打开 ZIP ({}): {source}", .path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    /// 解压过程中的 IO 错误
    #[error("解压失败 ({}): {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {message}")]
    ApiCallFailed { model: String, message: String },
    /// 请求超时
    #[error("LLM 请求超时 (模型: {model}, {seconds} 秒)")]
    Timeout { model: String, seconds: u64 },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 请求构建失败
    #[error("LLM 请求构建失败: {message}")]
    RequestBuild { message: String },
}

// ========== 便捷构造函数 ==========

impl FileError {
    pub fn read_failed(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            return FileError::NotFound {
                path: path.as_ref().to_path_buf(),
            };
        }
        FileError::ReadFailed {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn write_failed(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        FileError::WriteFailed {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl ArchiveError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        ArchiveError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl LlmError {
    pub fn api_call_failed(model: impl Into<String>, err: impl std::fmt::Display) -> Self {
        LlmError::ApiCallFailed {
            model: model.into(),
            message: err.to_string(),
        }
    }

    pub fn request_build(err: impl std::fmt::Display) -> Self {
        LlmError::RequestBuild {
            message: err.to_string(),
        }
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_failed_maps_not_found() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let file_err = FileError::read_failed("a.cpp", err);
        assert!(matches!(file_err, FileError::NotFound { .. }));
    }

    #[test]
    fn test_config_error_message() {
        let err = AppError::from(ConfigError::MissingField { field: "llm_api_key" });
        assert_eq!(err.to_string(), "配置错误: 缺少必填配置: llm_api_key");
    }
}
