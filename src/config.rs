//! 运行配置

use crate::cli::Cli;
use crate::error::{Result, SyncError};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// 解析后的同步配置（只读，供调度器和命令监听器共享）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub source: PathBuf,
    pub replica: PathBuf,
    pub log_file: PathBuf,
    pub interval: Duration,
}

impl SyncSettings {
    /// 从命令行参数构建，相对路径基于当前目录
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().map_err(|e| SyncError::io(".", e))?;
        Self::resolve(cli, &cwd)
    }

    /// 以 `base` 为基准解析路径并校验
    pub fn resolve(cli: &Cli, base: &Path) -> Result<Self> {
        if cli.interval == 0 {
            return Err(SyncError::Config(
                "synchronization interval must be at least 1 second".to_string(),
            ));
        }

        let source = absolutize(&cli.source, base);
        let replica = absolutize(&cli.replica, base);

        if source == replica {
            return Err(SyncError::Config(format!(
                "source and replica are the same folder: '{}'",
                source.display()
            )));
        }
        if replica.starts_with(&source) || source.starts_with(&replica) {
            return Err(SyncError::Config(format!(
                "source '{}' and replica '{}' must not be nested inside each other",
                source.display(),
                replica.display()
            )));
        }

        Ok(Self {
            source,
            replica,
            log_file: absolutize(&cli.log_file, base),
            interval: Duration::from_secs(cli.interval),
        })
    }
}

/// 转为绝对路径并消除 `.` 和 `..`（不访问文件系统）
fn absolutize(path: &Path, base: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
