//! 日志模块 - 同时输出到日志文件和标准输出，并限制日志文件大小

use crate::core::scheduler::ReportSink;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// 同步报告使用的 tracing target
pub const REPORT_TARGET: &str = "mirrorsync::report";

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// 是否写入日志文件（标准输出始终开启）
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 最大日志文件大小（MB），0 表示不限制
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u32,
    /// 日志级别: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_enabled() -> bool {
    true
}

fn default_max_size_mb() -> u32 {
    5 // 默认 5MB
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_size_mb: default_max_size_mb(),
            level: default_level(),
        }
    }
}

impl LogConfig {
    /// 从配置文件的 `log` 部分加载，文件缺失或格式错误时使用默认值
    pub fn load(config_file: Option<&Path>) -> Self {
        config_file
            .and_then(|path| fs::read_to_string(path).ok())
            .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
            .and_then(|config| config.get("log").cloned())
            .and_then(|log| serde_json::from_value::<LogConfig>(log).ok())
            .unwrap_or_default()
    }

    /// 将配置的日志级别转换为 tracing Level
    pub fn tracing_level(&self) -> tracing::Level {
        match self.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }
}

/// 带大小限制的日志写入器，超过限制时轮转为 `<文件名>.old`
pub struct SizeRotatingWriter {
    file_path: PathBuf,
    max_size: u64,
    written: u64,
    writer: BufWriter<File>,
}

impl SizeRotatingWriter {
    pub fn new(file_path: &Path, max_size_mb: u32) -> io::Result<Self> {
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let max_size = (max_size_mb as u64) * 1024 * 1024;
        let (writer, written) = Self::open_file(file_path, max_size)?;

        Ok(Self {
            file_path: file_path.to_path_buf(),
            max_size,
            written,
            writer,
        })
    }

    fn open_file(file_path: &Path, max_size: u64) -> io::Result<(BufWriter<File>, u64)> {
        // 检查现有文件大小，如果超过限制则轮转
        let existing = fs::metadata(file_path).map(|m| m.len()).unwrap_or(0);
        let existing = if max_size > 0 && existing > max_size {
            Self::rotate_log(file_path)?;
            0
        } else {
            existing
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;

        Ok((BufWriter::new(file), existing))
    }

    fn backup_path(file_path: &Path) -> PathBuf {
        let mut name = file_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".old");
        file_path.with_file_name(name)
    }

    /// 轮转日志文件
    fn rotate_log(file_path: &Path) -> io::Result<()> {
        let backup_path = Self::backup_path(file_path);

        if backup_path.exists() {
            fs::remove_file(&backup_path)?;
        }

        fs::rename(file_path, &backup_path)
    }

    fn check_and_rotate(&mut self) -> io::Result<()> {
        if self.max_size == 0 || self.written <= self.max_size {
            return Ok(());
        }

        self.writer.flush()?;
        Self::rotate_log(&self.file_path)?;
        let (writer, written) = Self::open_file(&self.file_path, self.max_size)?;
        self.writer = writer;
        self.written = written;
        Ok(())
    }
}

impl Write for SizeRotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.writer.write(buf)?;
        self.writer.flush()?;
        self.written += written as u64;
        self.check_and_rotate()?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// 初始化日志：标准输出 + 日志文件，只输出消息本身
///
/// 返回的 guard 需要保持到进程退出，以便刷新尚未写入的日志。
pub fn init_logging(log_file: &Path, config: &LogConfig) -> io::Result<Option<WorkerGuard>> {
    let mut env_filter =
        EnvFilter::from_default_env().add_directive(config.tracing_level().into());
    // 同步报告不受日志级别影响
    if let Ok(directive) = format!("{}=info", REPORT_TARGET).parse() {
        env_filter = env_filter.add_directive(directive);
    }

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .without_time()
        .with_level(false)
        .with_target(false);

    let (file_layer, guard) = if config.enabled {
        let writer = SizeRotatingWriter::new(log_file, config.max_size_mb)?;
        let (non_blocking, guard) = tracing_appender::non_blocking(writer);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .without_time()
            .with_level(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer);

    // 重复初始化时保留已有的 subscriber
    let _ = tracing::subscriber::set_global_default(subscriber);

    Ok(guard)
}

/// 通过 tracing 输出同步报告
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReportSink;

impl ReportSink for TracingReportSink {
    fn publish(&self, message: &str) {
        tracing::info!(target: REPORT_TARGET, "{}", message.trim_end());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_config_defaults_when_missing() {
        assert_eq!(LogConfig::load(None), LogConfig::default());

        let temp = TempDir::new().unwrap();
        assert_eq!(
            LogConfig::load(Some(&temp.path().join("absent.json"))),
            LogConfig::default()
        );
    }

    #[test]
    fn test_log_config_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        fs::write(&path, r#"{"log": {"level": "debug", "maxSizeMb": 1}}"#).unwrap();

        let config = LogConfig::load(Some(&path));
        assert!(config.enabled);
        assert_eq!(config.max_size_mb, 1);
        assert_eq!(config.tracing_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_log_config_malformed_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(LogConfig::load(Some(&path)), LogConfig::default());
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        let config = LogConfig {
            level: "loud".to_string(),
            ..Default::default()
        };
        assert_eq!(config.tracing_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_writer_appends() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("logs").join("sync_output.log");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "earlier\n").unwrap();

        let mut writer = SizeRotatingWriter::new(&path, 5).unwrap();
        writer.write_all(b"later\n").unwrap();
        writer.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "earlier\nlater\n");
    }

    #[test]
    fn test_writer_rotates_when_limit_exceeded() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sync_output.log");

        let mut writer = SizeRotatingWriter::new(&path, 1).unwrap();
        let chunk = vec![b'x'; 600 * 1024];
        writer.write_all(&chunk).unwrap();
        writer.write_all(&chunk).unwrap();
        writer.write_all(b"fresh\n").unwrap();
        writer.flush().unwrap();

        let backup = temp.path().join("sync_output.log.old");
        assert_eq!(fs::metadata(&backup).unwrap().len(), 1200 * 1024);
        assert_eq!(fs::read_to_string(&path).unwrap(), "fresh\n");
    }
}
