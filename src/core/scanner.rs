use crate::core::file_state::{fingerprint_file, FileEntry, FolderState};
use crate::error::{Result, SyncError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// 遇到无法读取的条目时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnreadablePolicy {
    /// 中止扫描并返回错误（源目录）
    Fail,
    /// 记录警告并视为不存在（副本目录）
    Skip,
}

/// 符号链接的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymlinkPolicy {
    /// 解析一次：指向文件时按文件处理，指向目录时跳过（源目录）
    Resolve,
    /// 不解析，作为链接记录下来，由比较器删除或替换（副本目录）
    Record,
}

/// 目录树快照扫描器
#[derive(Debug, Clone)]
pub struct TreeSnapshotter {
    policy: UnreadablePolicy,
    symlinks: SymlinkPolicy,
}

impl TreeSnapshotter {
    pub fn new(policy: UnreadablePolicy, symlinks: SymlinkPolicy) -> Self {
        Self { policy, symlinks }
    }

    /// 源目录扫描器：任何读取失败都会中止
    pub fn strict() -> Self {
        Self::new(UnreadablePolicy::Fail, SymlinkPolicy::Resolve)
    }

    /// 副本目录扫描器：读取失败的条目被跳过，符号链接原样记录
    pub fn lenient() -> Self {
        Self::new(UnreadablePolicy::Skip, SymlinkPolicy::Record)
    }

    /// 递归扫描 `root`，返回快照
    pub fn snapshot(&self, root: &Path) -> Result<FolderState> {
        if !root.is_dir() {
            debug!("目录不存在，返回空快照: {}", root.display());
            return Ok(FolderState::missing());
        }

        let mut state = FolderState::empty();
        let mut skipped = 0usize;

        let mut walker = WalkDir::new(root)
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| io::Error::other("filesystem loop detected"));
                    self.unreadable(path, source)?;
                    skipped += 1;
                    continue;
                }
            };

            let relative = match relative_path(root, entry.path()) {
                Ok(Some(relative)) => relative,
                Ok(None) => continue,
                Err(e) => {
                    // 名称无法表示时整个子树都无法表示
                    if entry.file_type().is_dir() {
                        walker.skip_current_dir();
                    }
                    self.unreadable(entry.path().to_path_buf(), e)?;
                    skipped += 1;
                    continue;
                }
            };

            match self.record(&mut state, &entry, relative) {
                Ok(()) => {}
                Err(e) => {
                    self.reject(e)?;
                    skipped += 1;
                }
            }
        }

        debug!(
            "扫描完成: {} - {} 个目录, {} 个文件, {} 个链接, {} 个被跳过",
            root.display(),
            state.dir_count(),
            state.file_count(),
            state.link_count(),
            skipped
        );

        Ok(state)
    }

    fn record(&self, state: &mut FolderState, entry: &DirEntry, relative: String) -> Result<()> {
        let path = entry.path();
        let file_type = entry.file_type();

        if file_type.is_dir() {
            state.insert_dir(relative);
            return Ok(());
        }

        let metadata = if file_type.is_symlink() {
            if self.symlinks == SymlinkPolicy::Record {
                state.insert_link(relative);
                return Ok(());
            }
            let target = fs::metadata(path).map_err(|e| SyncError::io(path, e))?;
            if target.is_dir() {
                debug!("跳过指向目录的符号链接: {}", path.display());
                return Ok(());
            }
            target
        } else {
            entry.metadata().map_err(|e| {
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::other("metadata unavailable"));
                SyncError::io(path, source)
            })?
        };

        if !metadata.is_file() {
            debug!("跳过特殊文件: {}", path.display());
            return Ok(());
        }

        let fingerprint = fingerprint_file(path).map_err(|e| SyncError::io(path, e))?;
        state.insert_file(
            relative,
            FileEntry {
                fingerprint,
                size: metadata.len(),
            },
        );
        Ok(())
    }

    fn unreadable(&self, path: PathBuf, source: io::Error) -> Result<()> {
        self.reject(SyncError::Io { path, source })
    }

    fn reject(&self, err: SyncError) -> Result<()> {
        match self.policy {
            UnreadablePolicy::Fail => Err(err),
            UnreadablePolicy::Skip => {
                warn!("Skipping unreadable entry: {}", err);
                Ok(())
            }
        }
    }
}

impl Default for TreeSnapshotter {
    fn default() -> Self {
        Self::strict()
    }
}

/// 计算相对路径并统一使用 `/` 分隔
///
/// 路径以字符串保存，名称不是合法 UTF-8 时返回 `InvalidData`。
fn relative_path(root: &Path, path: &Path) -> io::Result<Option<String>> {
    let Ok(relative) = path.strip_prefix(root) else {
        return Ok(None);
    };

    let mut parts = Vec::new();
    for component in relative.components() {
        let part = component.as_os_str().to_str().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "file name is not valid UTF-8")
        })?;
        parts.push(part);
    }

    if parts.is_empty() {
        Ok(None)
    } else {
        Ok(Some(parts.join("/")))
    }
}
