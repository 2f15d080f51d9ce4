//! 源文件读取服务 - 业务能力层
//!
//! 按配置的编码顺序逐个尝试严格解码，第一个成功的编码胜出。

use crate::error::{ConfigError, FileError};
use crate::models::SourceDocument;
use encoding_rs::Encoding;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// 源文件读取服务
#[derive(Debug, Clone)]
pub struct SourceReader {
    encodings: Vec<&'static Encoding>,
}

impl SourceReader {
    pub fn new(encodings: Vec<&'static Encoding>) -> Self {
        Self { encodings }
    }

    /// 从编码名称列表创建（重复的编码只保留第一次出现）
    pub fn from_labels(labels: &[String]) -> Result<Self, ConfigError> {
        let mut encodings: Vec<&'static Encoding> = Vec::with_capacity(labels.len());
        for label in labels {
            let encoding = Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
                ConfigError::UnknownEncoding {
                    label: label.clone(),
                }
            })?;
            if !encodings.contains(&encoding) {
                encodings.push(encoding);
            }
        }
        Ok(Self { encodings })
    }

    /// 依次尝试的编码名称
    pub fn encoding_names(&self) -> Vec<&'static str> {
        self.encodings.iter().map(|e| e.name()).collect()
    }

    /// 读取并解码文件；文件缺失或所有编码都失败时返回 `None`
    pub fn read(&self, path: &Path) -> Option<SourceDocument> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("{}", FileError::read_failed(path, e));
                return None;
            }
        };

        match self.decode(&bytes) {
            Some((text, encoding)) => {
                debug!("使用 {} 编码读取文件: {}", encoding, path.display());
                Some(SourceDocument {
                    path: path.to_path_buf(),
                    text,
                    encoding,
                })
            }
            None => {
                warn!("无法使用任何编码读取文件: {}", path.display());
                None
            }
        }
    }

    /// 按顺序尝试解码
    pub fn decode(&self, bytes: &[u8]) -> Option<(String, &'static str)> {
        self.encodings.iter().find_map(|encoding| {
            decode_strict(*encoding, bytes).map(|text| (text, encoding.name()))
        })
    }
}

/// 严格解码：UTF-8 允许 BOM，其余编码遇到非法字节即失败
fn decode_strict(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    let bytes = if encoding == encoding_rs::UTF_8 {
        bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
    } else {
        bytes
    };
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
}
