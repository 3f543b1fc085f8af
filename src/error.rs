//! 错误类型

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 同步过程中的错误
#[derive(Debug, Error)]
pub enum SyncError {
    /// 读写、权限或路径缺失等 I/O 失败
    #[error("I/O error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 源文件与副本临时文件之间的字节复制失败
    #[error("failed to copy '{}' to '{}': {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 执行同步时源目录不存在
    #[error("source directory '{}' does not exist", .0.display())]
    SourceMissing(PathBuf),

    /// 启动参数无效
    #[error("configuration error: {0}")]
    Config(String),

    #[error("sync worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl SyncError {
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        SyncError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn copy(from: impl AsRef<Path>, to: impl AsRef<Path>, source: io::Error) -> Self {
        SyncError::Copy {
            from: from.as_ref().to_path_buf(),
            to: to.as_ref().to_path_buf(),
            source,
        }
    }

    /// 是否为 NotFound 类型的 I/O 错误
    pub fn is_not_found(&self) -> bool {
        match self {
            SyncError::Io { source, .. } | SyncError::Copy { source, .. } => {
                source.kind() == io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
