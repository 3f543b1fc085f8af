use crate::core::file_state::FolderState;
use std::cmp::Reverse;

/// 同步动作，路径均为相对路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// 创建目录；空路径表示副本根目录
    AddDir { path: String },
    /// 复制新文件
    AddFile { path: String, size: u64 },
    /// 用源文件覆盖内容不同的副本文件
    UpdateFile {
        path: String,
        size: u64,
        size_delta: u64,
        grew: bool,
    },
    /// 删除副本中多余的文件
    RemoveFile { path: String, size: u64 },
    /// 递归删除副本中多余的目录
    RemoveDir { path: String },
}

impl SyncAction {
    pub fn path(&self) -> &str {
        match self {
            SyncAction::AddDir { path }
            | SyncAction::AddFile { path, .. }
            | SyncAction::UpdateFile { path, .. }
            | SyncAction::RemoveFile { path, .. }
            | SyncAction::RemoveDir { path } => path,
        }
    }

    /// 操作名称（用于错误日志）
    pub fn operation(&self) -> &'static str {
        match self {
            SyncAction::AddDir { .. } => "create directory",
            SyncAction::AddFile { .. } => "copy file",
            SyncAction::UpdateFile { .. } => "update file",
            SyncAction::RemoveFile { .. } => "remove file",
            SyncAction::RemoveDir { .. } => "remove directory",
        }
    }

    pub fn is_removal(&self) -> bool {
        matches!(
            self,
            SyncAction::RemoveFile { .. } | SyncAction::RemoveDir { .. }
        )
    }
}

/// 一次比较得到的有序动作列表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    actions: Vec<SyncAction>,
}

impl SyncPlan {
    pub fn new(actions: Vec<SyncAction>) -> Self {
        Self { actions }
    }

    pub fn actions(&self) -> &[SyncAction] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// 统计各类动作
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();

        for action in &self.actions {
            match action {
                SyncAction::AddDir { .. } => summary.add_dirs += 1,
                SyncAction::AddFile { size, .. } => {
                    summary.add_files += 1;
                    summary.copy_bytes += size;
                }
                SyncAction::UpdateFile { size, .. } => {
                    summary.update_files += 1;
                    summary.copy_bytes += size;
                }
                SyncAction::RemoveFile { .. } => summary.remove_files += 1,
                SyncAction::RemoveDir { .. } => summary.remove_dirs += 1,
            }
        }

        summary
    }
}

impl IntoIterator for SyncPlan {
    type Item = SyncAction;
    type IntoIter = std::vec::IntoIter<SyncAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.into_iter()
    }
}

/// 动作统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub add_dirs: usize,
    pub add_files: usize,
    pub update_files: usize,
    pub remove_files: usize,
    pub remove_dirs: usize,
    /// 需要复制的总字节数
    pub copy_bytes: u64,
}

impl PlanSummary {
    pub fn total_actions(&self) -> usize {
        self.add_dirs + self.add_files + self.update_files + self.remove_files + self.remove_dirs
    }
}

/// 快照比较器
#[derive(Debug, Clone, Default)]
pub struct FileComparator;

impl FileComparator {
    pub fn new() -> Self {
        Self
    }

    /// 比较源与副本快照，返回使副本与源一致的动作列表
    ///
    /// 顺序：根目录创建、目录创建、文件新增/更新、文件删除、目录删除（深度优先）。
    pub fn compare_trees(&self, source: &FolderState, replica: &FolderState) -> SyncPlan {
        let mut actions = Vec::new();

        if !replica.root_exists() {
            actions.push(SyncAction::AddDir {
                path: String::new(),
            });
        }

        // BTreeSet 有序，父目录总在子目录之前
        for dir in source.dirs() {
            if !replica.has_dir(dir) {
                actions.push(SyncAction::AddDir {
                    path: dir.to_string(),
                });
            }
        }

        for (path, src) in source.files() {
            match replica.file(path) {
                None => actions.push(SyncAction::AddFile {
                    path: path.to_string(),
                    size: src.size,
                }),
                Some(dst) if dst.fingerprint != src.fingerprint => {
                    actions.push(SyncAction::UpdateFile {
                        path: path.to_string(),
                        size: src.size,
                        size_delta: src.size.abs_diff(dst.size),
                        grew: src.size > dst.size,
                    })
                }
                Some(_) => {}
            }
        }

        // 被源中同名目录取代的文件由 AddDir 处理
        for (path, dst) in replica.files() {
            if source.has_file(path) || source.has_dir(path) || shadowed_by_file(path, source) {
                continue;
            }
            actions.push(SyncAction::RemoveFile {
                path: path.to_string(),
                size: dst.size,
            });
        }

        // 副本中的符号链接不保留；被源中同名条目取代的由新增动作处理
        for link in replica.links() {
            if source.has_file(link) || source.has_dir(link) || shadowed_by_file(link, source) {
                continue;
            }
            actions.push(SyncAction::RemoveFile {
                path: link.to_string(),
                size: 0,
            });
        }

        // 被源中同名文件取代的目录由 AddFile 处理
        let mut stale_dirs: Vec<&str> = replica
            .dirs()
            .filter(|dir| {
                !source.has_dir(dir) && !source.has_file(dir) && !shadowed_by_file(dir, source)
            })
            .collect();
        stale_dirs.sort_by_key(|dir| (Reverse(dir.len()), *dir));

        actions.extend(stale_dirs.into_iter().map(|dir| SyncAction::RemoveDir {
            path: dir.to_string(),
        }));

        SyncPlan::new(actions)
    }
}

/// 路径的某个上级目录在源中是普通文件
fn shadowed_by_file(path: &str, source: &FolderState) -> bool {
    path.match_indices('/')
        .any(|(idx, _)| source.has_file(&path[..idx]))
}
