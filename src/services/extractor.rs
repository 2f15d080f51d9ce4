//! 作业解压服务 - 业务能力层
//!
//! 解压一份作业的全部内容，恢复以旧代码页存储的中文文件名，
//! 返回所有普通文件的绝对路径。

use crate::error::ArchiveError;
use encoding_rs::{Encoding, GBK};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

/// 解压后的作业
///
/// 持有临时目录，离开作用域时目录及其内容一起删除。
#[derive(Debug)]
pub struct ExtractedSubmission {
    dir: TempDir,
    files: Vec<PathBuf>,
}

impl ExtractedSubmission {
    /// 所有普通文件的绝对路径（按路径排序）
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

/// 作业解压服务
pub struct Extractor {
    filename_encoding: &'static Encoding,
    scratch_root: Option<PathBuf>,
}

impl Extractor {
    /// `filename_encoding` 为无法识别的标签时退回 GBK
    pub fn new(filename_encoding: &str, scratch_root: Option<PathBuf>) -> Self {
        let encoding = Encoding::for_label(filename_encoding.trim().as_bytes()).unwrap_or_else(|| {
            warn!("未知的文件名编码 {}，改用 GBK", filename_encoding);
            GBK
        });
        Self {
            filename_encoding: encoding,
            scratch_root,
        }
    }

    /// 解压到新建的临时目录
    pub fn extract(&self, archive_path: &Path) -> Result<ExtractedSubmission, ArchiveError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("submission-");
        let created = match &self.scratch_root {
            Some(root) => {
                fs::create_dir_all(root).map_err(|e| ArchiveError::io(root, e))?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        };
        let dir = created.map_err(|e| ArchiveError::io(archive_path, e))?;

        let files = self.extract_to(archive_path, dir.path())?;
        Ok(ExtractedSubmission { dir, files })
    }

    /// 解压到调用方提供的目录，返回所有普通文件的绝对路径
    pub fn extract_to(&self, archive_path: &Path, dest: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
        if !archive_path.exists() {
            return Err(ArchiveError::NotFound {
                path: archive_path.to_path_buf(),
            });
        }

        let file = File::open(archive_path).map_err(|e| ArchiveError::io(archive_path, e))?;
        let mut archive =
            ZipArchive::new(BufReader::new(file)).map_err(|source| ArchiveError::Invalid {
                path: archive_path.to_path_buf(),
                source,
            })?;

        fs::create_dir_all(dest).map_err(|e| ArchiveError::io(dest, e))?;
        let dest = dest
            .canonicalize()
            .map_err(|e| ArchiveError::io(dest, e))?;

        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|source| ArchiveError::Invalid {
                    path: archive_path.to_path_buf(),
                    source,
                })?;

            let name = recover_entry_name(entry.name_raw(), entry.name(), self.filename_encoding);
            if name != entry.name() {
                debug!("文件名已修正: {} -> {}", entry.name(), name);
            }

            let Some(relative) = safe_relative_path(&name) else {
                warn!("跳过路径非法的条目: {}", name);
                continue;
            };
            let target = dest.join(relative);

            if entry.is_dir() || name.ends_with('/') {
                fs::create_dir_all(&target).map_err(|e| ArchiveError::io(&target, e))?;
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
            }
            if target.exists() {
                fs::remove_file(&target).map_err(|e| ArchiveError::io(&target, e))?;
            }

            let mut out = File::create(&target).map_err(|e| ArchiveError::io(&target, e))?;
            io::copy(&mut entry, &mut out).map_err(|e| ArchiveError::io(&target, e))?;
        }

        let mut files: Vec<PathBuf> = WalkDir::new(&dest)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect();
        files.sort();

        debug!("{} 解压出 {} 个文件", archive_path.display(), files.len());
        Ok(files)
    }
}

/// 恢复条目的可读文件名，总能给出一个结果
///
/// 依次尝试：纯 ASCII 或已标记 UTF-8 的名字直接使用；按目标编码严格解码原始字节；
/// 按 UTF-8 解码原始字节；最后使用压缩库给出的名字。
pub fn recover_entry_name(raw: &[u8], native: &str, target: &'static Encoding) -> String {
    let name = if raw.is_ascii() {
        native.to_string()
    } else if std::str::from_utf8(raw).map(|s| s == native).unwrap_or(false) {
        native.to_string()
    } else if let Some(decoded) = target.decode_without_bom_handling_and_without_replacement(raw) {
        decoded.into_owned()
    } else if let Ok(decoded) = std::str::from_utf8(raw) {
        decoded.to_string()
    } else {
        native.to_string()
    };

    name.replace('\\', "/")
}

/// 只接受落在解压目录内的相对路径
fn safe_relative_path(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    let mut relative = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if relative.as_os_str().is_empty() {
        None
    } else {
        Some(relative)
    }
}
