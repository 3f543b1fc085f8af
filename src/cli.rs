//! 命令行参数解析

use clap::Parser;
use std::path::PathBuf;

/// Periodically mirror a source folder onto a replica folder
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "mirrorsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Source folder path
    #[arg(default_value = "source")]
    pub source: PathBuf,

    /// Replica folder path
    #[arg(default_value = "replica")]
    pub replica: PathBuf,

    /// Log file path
    #[arg(default_value = "sync_output.log")]
    pub log_file: PathBuf,

    /// Synchronization interval in seconds
    #[arg(default_value_t = 15)]
    pub interval: u64,

    /// Optional JSON settings file (log level, log size limit)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}
