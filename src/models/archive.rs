use std::path::PathBuf;

/// 修复/复制一个压缩包时实际采用的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    /// 文件头位于开头，原样复制
    Verbatim,
    /// 文件头有偏移，截取后验证通过
    Repaired { offset: usize },
    /// 截取后验证失败，回退为原样复制
    RepairRejected { offset: usize },
    /// 找不到文件头，原样复制
    NoSignature,
    /// 处理过程中出现 IO 错误，回退为原样复制
    FallbackCopy,
}

/// 已暂存的压缩包
#[derive(Debug, Clone)]
pub struct StagedArchive {
    /// 原始路径
    pub source_path: PathBuf,
    /// 暂存路径（在暂存目录内唯一）
    pub staged_path: PathBuf,
    /// 原始文件名
    pub original_name: String,
    pub outcome: RepairOutcome,
    /// 暂存后的文件能否作为 ZIP 打开
    pub valid: bool,
}

/// 单个压缩包的收集结果
#[derive(Debug, Clone)]
pub enum CollectEntry {
    Staged(StagedArchive),
    /// 连原样复制都失败的文件（如权限错误）
    CopyFailed(PathBuf),
}

/// 收集结果
#[derive(Debug, Default)]
pub struct CollectReport {
    /// 按发现顺序排列，每个找到的压缩包一项
    pub entries: Vec<CollectEntry>,
}

impl CollectReport {
    pub fn staged(&self) -> impl Iterator<Item = &StagedArchive> {
        self.entries.iter().filter_map(|entry| match entry {
            CollectEntry::Staged(staged) => Some(staged),
            CollectEntry::CopyFailed(_) => None,
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = &PathBuf> {
        self.entries.iter().filter_map(|entry| match entry {
            CollectEntry::CopyFailed(path) => Some(path),
            CollectEntry::Staged(_) => None,
        })
    }

    /// 成功复制的数量（包括可能无法打开的）
    pub fn copied_count(&self) -> usize {
        self.staged().count()
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    /// 复制成功但无法作为 ZIP 打开的数量
    pub fn unopenable_count(&self) -> usize {
        self.staged().filter(|s| !s.valid).count()
    }
}
