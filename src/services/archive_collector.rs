//! 压缩包收集服务 - 业务能力层
//!
//! 递归查找提交的 ZIP，排除系统元数据文件，尽量修复带前缀垃圾数据的压缩包，
//! 去重命名后复制到暂存目录。任何一个文件都不会被静默丢弃。

use crate::config::Config;
use crate::error::FileError;
use crate::models::{CollectEntry, CollectReport, RepairOutcome, StagedArchive};
use crate::services::progress::ProgressSink;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};
use zip::ZipArchive;

/// ZIP 本地文件头签名
pub const ZIP_SIGNATURE: &[u8; 4] = b"PK\x03\x04";

/// macOS 打包时附带的资源目录
const MACOS_RESOURCE_DIR: &str = "__MACOSX";

/// 压缩包收集服务
pub struct ArchiveCollector {
    extension: String,
    metadata_prefixes: Vec<String>,
}

impl ArchiveCollector {
    pub fn new(config: &Config) -> Self {
        Self::with_rules(&config.archive_extension, config.metadata_prefixes.clone())
    }

    pub fn with_rules(extension: &str, metadata_prefixes: Vec<String>) -> Self {
        Self {
            extension: extension.trim_start_matches('.').to_lowercase(),
            metadata_prefixes,
        }
    }

    /// 判断文件名是否是待收集的压缩包
    pub fn is_candidate(&self, file_name: &str) -> bool {
        let has_extension = Path::new(file_name)
            .extension()
            .and_then(OsStr::to_str)
            .map(|ext| ext.to_lowercase() == self.extension)
            .unwrap_or(false);
        let is_metadata = self
            .metadata_prefixes
            .iter()
            .any(|prefix| file_name.starts_with(prefix.as_str()));
        has_extension && !is_metadata
    }

    /// 递归查找所有压缩包（按路径排序，保证发现顺序稳定）
    pub fn find_archives(&self, root: &Path) -> Vec<PathBuf> {
        let mut archives = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_macos_resource_dir(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("遍历目录时出错: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if self.is_candidate(&name) {
                archives.push(entry.into_path());
            }
        }

        archives
    }

    /// 收集所有压缩包到暂存目录
    ///
    /// 只有暂存目录本身无法创建时才返回错误。
    pub fn collect(
        &self,
        root: &Path,
        staging_dir: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<CollectReport, FileError> {
        fs::create_dir_all(staging_dir).map_err(|e| FileError::write_failed(staging_dir, e))?;

        let archives = self.find_archives(root);
        sink.info(format!(
            "在 {} 中找到 {} 个ZIP文件",
            root.display(),
            archives.len()
        ));

        let mut report = CollectReport::default();
        for src in archives {
            match self.stage(&src, staging_dir) {
                Ok(staged) => {
                    match staged.outcome {
                        RepairOutcome::Repaired { offset } => sink.info(format!(
                            "已修复 {}（截去开头 {} 字节）",
                            staged.original_name, offset
                        )),
                        RepairOutcome::RepairRejected { .. } => sink.warning(format!(
                            "{} 修复失败，已按原样复制",
                            staged.original_name
                        )),
                        _ => {}
                    }
                    if !staged.valid {
                        sink.warning(format!(
                            "{} 已复制，但可能无法作为 ZIP 打开",
                            staged.original_name
                        ));
                    }
                    report.entries.push(CollectEntry::Staged(staged));
                }
                Err(e) => {
                    warn!("复制失败 {}: {}", src.display(), e);
                    report.entries.push(CollectEntry::CopyFailed(src));
                }
            }
        }

        sink.info(format!(
            "ZIP文件合并完成，成功处理 {} 个文件",
            report.copied_count()
        ));
        if report.failed_count() > 0 {
            sink.warning(format!("有 {} 个文件处理失败", report.failed_count()));
            for path in report.failed() {
                sink.warning(format!("无法复制: {}", path.display()));
            }
        }

        Ok(report)
    }

    /// 暂存单个压缩包
    pub fn stage(&self, src: &Path, staging_dir: &Path) -> io::Result<StagedArchive> {
        let original_name = src
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let dest = unique_destination(staging_dir, &original_name);
        let (outcome, valid) = repair_if_needed(src, &dest)?;
        debug!(
            "暂存 {} -> {} ({:?}, valid={})",
            src.display(),
            dest.display(),
            outcome,
            valid
        );

        Ok(StagedArchive {
            source_path: src.to_path_buf(),
            staged_path: dest,
            original_name,
            outcome,
            valid,
        })
    }
}

fn is_macos_resource_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name() == MACOS_RESOURCE_DIR
}

/// 在目录中找一个不冲突的文件名：`name.zip`、`name_1.zip`、`name_2.zip`……
pub fn unique_destination(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1usize;
    loop {
        let candidate = dir.join(format!("{}_{}{}", stem, counter, ext));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// 查找 ZIP 签名的位置
pub fn find_signature(data: &[u8]) -> Option<usize> {
    data.windows(ZIP_SIGNATURE.len())
        .position(|window| window == ZIP_SIGNATURE)
}

/// 检查文件能否作为 ZIP 打开
pub fn is_valid_archive_file(path: &Path) -> bool {
    File::open(path)
        .map(|f| ZipArchive::new(BufReader::new(f)).is_ok())
        .unwrap_or(false)
}

/// 修复或原样复制，返回采用的方式以及结果能否作为 ZIP 打开
///
/// 只有原样复制也失败时才返回错误。
pub fn repair_if_needed(src: &Path, dest: &Path) -> io::Result<(RepairOutcome, bool)> {
    let outcome = match try_repair(src, dest) {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("修复 {} 时出错，改为原样复制: {}", src.display(), e);
            fs::copy(src, dest)?;
            RepairOutcome::FallbackCopy
        }
    };
    Ok((outcome, is_valid_archive_file(dest)))
}

fn try_repair(src: &Path, dest: &Path) -> io::Result<RepairOutcome> {
    let data = fs::read(src)?;

    match find_signature(&data) {
        Some(0) => {
            fs::copy(src, dest)?;
            Ok(RepairOutcome::Verbatim)
        }
        Some(offset) => {
            fs::write(dest, &data[offset..])?;
            if is_valid_archive_file(dest) {
                Ok(RepairOutcome::Repaired { offset })
            } else {
                fs::copy(src, dest)?;
                Ok(RepairOutcome::RepairRejected { offset })
            }
        }
        None => {
            fs::copy(src, dest)?;
            Ok(RepairOutcome::NoSignature)
        }
    }
}
