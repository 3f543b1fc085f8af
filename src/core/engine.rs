use crate::core::comparator::{FileComparator, SyncAction, SyncPlan};
use crate::core::scanner::TreeSnapshotter;
use crate::error::{Result, SyncError};
use filetime::{set_file_times, FileTime};
use std::ffi::OsString;
use std::fs::{self, File, Metadata, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// 单轮同步的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub changes_made: bool,
    pub files_added: u64,
    pub files_changed: u64,
    pub files_removed: u64,
    pub dirs_added: u64,
    pub dirs_removed: u64,
    pub bytes_added: u64,
    pub bytes_changed: u64,
    pub bytes_removed: u64,
    /// 执行失败的动作数（失败的动作仍计入上面的计数）
    pub actions_failed: u64,
}

impl SyncStats {
    /// 累加一个已尝试的动作
    pub fn record(&mut self, action: &SyncAction) {
        self.changes_made = true;
        match action {
            SyncAction::AddDir { .. } => self.dirs_added += 1,
            SyncAction::AddFile { size, .. } => {
                self.files_added += 1;
                self.bytes_added += size;
            }
            SyncAction::UpdateFile { size_delta, .. } => {
                self.files_changed += 1;
                self.bytes_changed += size_delta;
            }
            SyncAction::RemoveFile { size, .. } => {
                self.files_removed += 1;
                self.bytes_removed += size;
            }
            SyncAction::RemoveDir { .. } => self.dirs_removed += 1,
        }
    }
}

/// 执行结果：统计与变更描述
#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    pub stats: SyncStats,
    pub changes: Vec<String>,
}

/// 将同步计划应用到文件系统
///
/// 每个动作独立执行，单个失败只记录错误，不影响其余动作。
pub struct Reconciler {
    source_root: PathBuf,
    replica_root: PathBuf,
}

impl Reconciler {
    pub fn new(source_root: impl Into<PathBuf>, replica_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            replica_root: replica_root.into(),
        }
    }

    pub fn apply(&self, plan: &SyncPlan) -> SyncOutcome {
        let mut stats = SyncStats::default();
        let mut changes = Vec::with_capacity(plan.len());

        for action in plan.actions() {
            let mut line = self.describe(action);

            if let Err(e) = self.execute(action) {
                error!("Failed to {}: {}", action.operation(), e);
                stats.actions_failed += 1;
                line.push_str(&format!(" (failed: {})", e));
            }

            stats.record(action);
            changes.push(line);
        }

        SyncOutcome { stats, changes }
    }

    fn source_path(&self, rel: &str) -> PathBuf {
        resolve(&self.source_root, rel)
    }

    fn replica_path(&self, rel: &str) -> PathBuf {
        resolve(&self.replica_root, rel)
    }

    fn execute(&self, action: &SyncAction) -> Result<()> {
        match action {
            SyncAction::AddDir { path } => {
                let dst = self.replica_path(path);
                // 同名文件需要先删除
                if is_file(&dst) {
                    fs::remove_file(&dst).map_err(|e| SyncError::io(&dst, e))?;
                }
                fs::create_dir_all(&dst).map_err(|e| SyncError::io(&dst, e))
            }
            SyncAction::AddFile { path, .. } | SyncAction::UpdateFile { path, .. } => {
                copy_file(&self.source_path(path), &self.replica_path(path))
            }
            SyncAction::RemoveFile { path, .. } => {
                let dst = self.replica_path(path);
                ignore_missing(fs::remove_file(&dst)).map_err(|e| SyncError::io(&dst, e))
            }
            SyncAction::RemoveDir { path } => {
                let dst = self.replica_path(path);
                ignore_missing(fs::remove_dir_all(&dst)).map_err(|e| SyncError::io(&dst, e))
            }
        }
    }

    fn describe(&self, action: &SyncAction) -> String {
        match action {
            SyncAction::AddDir { path } if path.is_empty() => {
                format!(
                    "Created replica directory '{}'.",
                    self.replica_root.display()
                )
            }
            SyncAction::AddDir { path } => {
                format!("Created directory '{}'.", self.replica_path(path).display())
            }
            SyncAction::AddFile { path, size } => format!(
                "Copied file '{}' to '{}' ({} bytes).",
                self.source_path(path).display(),
                self.replica_path(path).display(),
                size
            ),
            SyncAction::UpdateFile {
                path,
                size_delta,
                grew,
                ..
            } => format!(
                "Updated file '{}' with new content ({} bytes {}).",
                self.replica_path(path).display(),
                size_delta,
                if *grew { "added" } else { "removed" }
            ),
            SyncAction::RemoveFile { path, size } => format!(
                "Removed file '{}' ({} bytes).",
                self.replica_path(path).display(),
                size
            ),
            SyncAction::RemoveDir { path } => {
                format!("Removed directory '{}'.", self.replica_path(path).display())
            }
        }
    }
}

fn resolve(root: &Path, rel: &str) -> PathBuf {
    if rel.is_empty() {
        root.to_path_buf()
    } else {
        root.join(rel)
    }
}

fn is_file(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| !m.is_dir())
        .unwrap_or(false)
}

fn is_dir(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

/// 目标已不存在视为删除成功
fn ignore_missing(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// 整文件复制，并保留权限与访问/修改时间
///
/// 先写入同目录下的临时文件再重命名覆盖，目标位置的符号链接或硬链接
/// 只会被替换，不会被写穿。
fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    let metadata = fs::metadata(src).map_err(|e| SyncError::io(src, e))?;

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
    }

    // 同名目录需要先删除
    if is_dir(dst) {
        fs::remove_dir_all(dst).map_err(|e| SyncError::io(dst, e))?;
    }

    let temp = temp_path(dst);
    let result = write_temp(src, &temp, &metadata)
        .and_then(|()| fs::rename(&temp, dst).map_err(|e| SyncError::io(dst, e)));

    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}

/// 复制内容到临时文件并应用源文件的元数据
fn write_temp(src: &Path, temp: &Path, metadata: &Metadata) -> Result<()> {
    // 上次中断留下的临时文件
    ignore_missing(fs::remove_file(temp)).map_err(|e| SyncError::io(temp, e))?;

    let mut reader = File::open(src).map_err(|e| SyncError::io(src, e))?;
    let mut writer = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp)
        .map_err(|e| SyncError::io(temp, e))?;
    io::copy(&mut reader, &mut writer).map_err(|e| SyncError::copy(src, temp, e))?;
    drop(writer);

    fs::set_permissions(temp, metadata.permissions()).map_err(|e| SyncError::io(temp, e))?;
    set_file_times(
        temp,
        FileTime::from_last_access_time(metadata),
        FileTime::from_last_modification_time(metadata),
    )
    .map_err(|e| SyncError::io(temp, e))
}

/// 目标旁边的临时文件：`.<文件名>.mirrorsync-tmp`
fn temp_path(dst: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(dst.file_name().unwrap_or_default());
    name.push(".mirrorsync-tmp");
    dst.with_file_name(name)
}

/// 同步引擎：扫描、比较、执行
#[derive(Debug, Clone)]
pub struct SyncEngine {
    source: PathBuf,
    replica: PathBuf,
    comparator: FileComparator,
}

impl SyncEngine {
    pub fn new(source: impl Into<PathBuf>, replica: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            replica: replica.into(),
            comparator: FileComparator::new(),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn replica(&self) -> &Path {
        &self.replica
    }

    /// 扫描两侧并计算同步计划
    ///
    /// 源目录的任何读取失败都会中止本轮；副本中无法读取的条目视为不存在。
    pub fn plan(&self) -> Result<SyncPlan> {
        let source_state = TreeSnapshotter::strict().snapshot(&self.source)?;
        if !source_state.root_exists() {
            return Err(SyncError::SourceMissing(self.source.clone()));
        }

        let replica_state = TreeSnapshotter::lenient().snapshot(&self.replica)?;

        debug!(
            "扫描完成: 源 {} 文件 ({} 字节), 副本 {} 文件",
            source_state.file_count(),
            source_state.total_bytes(),
            replica_state.file_count()
        );

        let plan = self.comparator.compare_trees(&source_state, &replica_state);
        let summary = plan.summary();
        debug!(
            "比较完成: {} 个操作, {} 个目录创建, {} 个新增, {} 个更新, {} 个文件删除, {} 个目录删除",
            summary.total_actions(),
            summary.add_dirs,
            summary.add_files,
            summary.update_files,
            summary.remove_files,
            summary.remove_dirs
        );

        Ok(plan)
    }

    /// 执行一轮完整同步
    pub fn run_pass(&self) -> Result<SyncOutcome> {
        let plan = self.plan()?;
        Ok(Reconciler::new(&self.source, &self.replica).apply(&plan))
    }
}
