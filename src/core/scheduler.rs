//! 定时同步调度
//!
//! 按固定间隔串行执行同步，每轮结束后把报告交给 [`ReportSink`]，
//! 直到取消令牌被触发。

use crate::core::engine::{SyncEngine, SyncOutcome, SyncStats};
use crate::error::{Result, SyncError};
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// 接收每轮同步报告
pub trait ReportSink: Send + Sync {
    fn publish(&self, message: &str);
}

/// 同步调度器
pub struct Scheduler {
    engine: Arc<SyncEngine>,
    interval: Duration,
    sink: Arc<dyn ReportSink>,
}

impl Scheduler {
    pub fn new(engine: Arc<SyncEngine>, interval: Duration, sink: Arc<dyn ReportSink>) -> Self {
        Self {
            engine,
            interval,
            sink,
        }
    }

    /// 循环执行同步，直到 `cancel` 被触发，返回执行的轮数
    ///
    /// 正在进行的一轮总会完成；等待间隔期间的取消会立即生效。
    pub async fn run(&self, cancel: CancellationToken) -> Result<u64> {
        let mut passes = 0u64;

        while !cancel.is_cancelled() {
            let started_at = Local::now();
            let started = Instant::now();

            let engine = self.engine.clone();
            let outcome = run_blocking(move || engine.run_pass()).await;
            let elapsed = started.elapsed();
            passes += 1;

            if let Err(e) = &outcome {
                error!("Synchronization pass failed: {}", e);
            }

            let message = format_report(
                started_at,
                self.engine.source(),
                self.engine.replica(),
                &outcome,
                elapsed,
            );
            self.sink.publish(&message);

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        debug!("调度器已停止，共执行 {} 轮同步", passes);
        Ok(passes)
    }
}

/// 在阻塞线程池中执行一轮同步；工作线程 panic 视为本轮失败
async fn run_blocking<F>(pass: F) -> Result<SyncOutcome>
where
    F: FnOnce() -> Result<SyncOutcome> + Send + 'static,
{
    tokio::task::spawn_blocking(pass)
        .await
        .unwrap_or_else(|e| Err(SyncError::Join(e)))
}

/// 渲染单轮同步报告
pub fn format_report(
    started_at: DateTime<Local>,
    source: &Path,
    replica: &Path,
    outcome: &Result<SyncOutcome, SyncError>,
    elapsed: Duration,
) -> String {
    let mut message = format!(
        "[{}] -> Synchronizing folder '{}' with folder '{}'..\n",
        started_at.format("%Y-%m-%d %H:%M:%S"),
        basename(replica),
        basename(source)
    );

    match outcome {
        Ok(SyncOutcome { stats, changes }) if stats.changes_made => {
            message.push_str("Changes:\n");
            for change in changes {
                let _ = writeln!(message, "- {}", change);
            }
            let _ = writeln!(message, "{}", format_summary(stats));
        }
        Ok(_) => message.push_str("No changes were made. Folders are synchronized.\n"),
        Err(e) => {
            let _ = writeln!(message, "Synchronization failed: {}", e);
        }
    }

    let _ = writeln!(
        message,
        "Synchronization completed in {:.2} seconds.",
        elapsed.as_secs_f64()
    );
    message
}

fn format_summary(stats: &SyncStats) -> String {
    let mut summary = format!(
        "Summary: {} files added ({} bytes), {} files changed ({} bytes), \
         {} files removed ({} bytes), {} directories added, {} directories removed.",
        stats.files_added,
        stats.bytes_added,
        stats.files_changed,
        stats.bytes_changed,
        stats.files_removed,
        stats.bytes_removed,
        stats.dirs_added,
        stats.dirs_removed
    );
    if stats.actions_failed > 0 {
        let _ = write!(summary, " {} operations failed.", stats.actions_failed);
    }
    summary
}

/// 路径最后一段，没有时返回完整路径
fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// 收集报告，达到指定数量后触发取消
    struct CollectingSink {
        reports: Mutex<Vec<String>>,
        cancel_after: usize,
        cancel: CancellationToken,
    }

    impl CollectingSink {
        fn new(cancel_after: usize, cancel: CancellationToken) -> Self {
            Self {
                reports: Mutex::new(Vec::new()),
                cancel_after,
                cancel,
            }
        }

        fn reports(&self) -> Vec<String> {
            self.reports.lock().unwrap().clone()
        }
    }

    impl ReportSink for CollectingSink {
        fn publish(&self, message: &str) {
            let mut reports = self.reports.lock().unwrap();
            reports.push(message.to_string());
            if reports.len() >= self.cancel_after {
                self.cancel.cancel();
            }
        }
    }

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 17, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_format_report_without_changes() {
        let report = format_report(
            fixed_time(),
            Path::new("/data/source"),
            Path::new("/backup/replica"),
            &Ok(SyncOutcome::default()),
            Duration::from_millis(1234),
        );

        assert_eq!(
            report,
            "[2024-05-17 09:30:00] -> Synchronizing folder 'replica' with folder 'source'..\n\
             No changes were made. Folders are synchronized.\n\
             Synchronization completed in 1.23 seconds.\n"
        );
    }

    #[test]
    fn test_format_report_with_changes() {
        let outcome = SyncOutcome {
            stats: SyncStats {
                changes_made: true,
                files_added: 1,
                bytes_added: 2,
                dirs_removed: 1,
                ..Default::default()
            },
            changes: vec![
                "Copied file 'source/a.txt' to 'replica/a.txt' (2 bytes).".to_string(),
                "Removed directory 'replica/sub'.".to_string(),
            ],
        };

        let report = format_report(
            fixed_time(),
            Path::new("source"),
            Path::new("replica"),
            &Ok(outcome),
            Duration::from_millis(50),
        );

        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[1], "Changes:");
        assert_eq!(
            lines[2],
            "- Copied file 'source/a.txt' to 'replica/a.txt' (2 bytes)."
        );
        assert_eq!(lines[3], "- Removed directory 'replica/sub'.");
        assert_eq!(
            lines[4],
            "Summary: 1 files added (2 bytes), 0 files changed (0 bytes), \
             0 files removed (0 bytes), 0 directories added, 1 directories removed."
        );
        assert_eq!(lines[5], "Synchronization completed in 0.05 seconds.");
    }

    #[test]
    fn test_format_report_mentions_failures() {
        let outcome = SyncOutcome {
            stats: SyncStats {
                changes_made: true,
                files_added: 1,
                bytes_added: 3,
                actions_failed: 1,
                ..Default::default()
            },
            changes: vec!["Copied file 'a' to 'b' (3 bytes). (failed: boom)".to_string()],
        };

        let report = format_report(
            fixed_time(),
            Path::new("s"),
            Path::new("r"),
            &Ok(outcome),
            Duration::ZERO,
        );
        assert!(report.contains("directories removed. 1 operations failed.\n"));
    }

    #[test]
    fn test_format_report_for_failed_pass() {
        let report = format_report(
            fixed_time(),
            Path::new("/data/source"),
            Path::new("/data/replica"),
            &Err(SyncError::SourceMissing("/data/source".into())),
            Duration::ZERO,
        );

        assert!(report
            .contains("Synchronization failed: source directory '/data/source' does not exist\n"));
        assert!(!report.contains("Summary:"));
    }

    #[tokio::test]
    async fn test_run_stops_when_cancelled_during_sleep() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("a.txt"), b"hi").unwrap();
        let replica = temp.path().join("replica");

        let cancel = CancellationToken::new();
        let sink = Arc::new(CollectingSink::new(1, cancel.clone()));
        let scheduler = Scheduler::new(
            Arc::new(SyncEngine::new(&source, &replica)),
            Duration::from_secs(3600),
            sink.clone(),
        );

        let passes = tokio::time::timeout(Duration::from_secs(10), scheduler.run(cancel))
            .await
            .expect("scheduler should stop promptly")
            .unwrap();

        assert_eq!(passes, 1);
        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].contains("Copied file"));
        assert!(replica.join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_run_repeats_until_cancelled() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("a.txt"), b"hi").unwrap();
        let replica = temp.path().join("replica");

        let cancel = CancellationToken::new();
        let sink = Arc::new(CollectingSink::new(2, cancel.clone()));
        let scheduler = Scheduler::new(
            Arc::new(SyncEngine::new(&source, &replica)),
            Duration::from_millis(10),
            sink.clone(),
        );

        let passes = tokio::time::timeout(Duration::from_secs(10), scheduler.run(cancel))
            .await
            .expect("scheduler should stop promptly")
            .unwrap();

        assert_eq!(passes, 2);
        let reports = sink.reports();
        assert!(reports[0].contains("Changes:"));
        assert!(reports[1].contains("No changes were made."));
    }

    #[tokio::test]
    async fn test_run_with_cancelled_token_does_nothing() {
        let temp = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let sink = Arc::new(CollectingSink::new(usize::MAX, cancel.clone()));
        let scheduler = Scheduler::new(
            Arc::new(SyncEngine::new(temp.path(), temp.path().join("replica"))),
            Duration::from_secs(1),
            sink.clone(),
        );

        assert_eq!(scheduler.run(cancel).await.unwrap(), 0);
        assert!(sink.reports().is_empty());
        assert!(!temp.path().join("replica").exists());
    }

    #[tokio::test]
    async fn test_panicking_pass_is_reported_as_failure() {
        let outcome = run_blocking(|| panic!("worker exploded")).await;
        assert!(matches!(outcome, Err(SyncError::Join(_))));

        let report = format_report(
            fixed_time(),
            Path::new("source"),
            Path::new("replica"),
            &outcome,
            Duration::ZERO,
        );
        assert!(report.contains("Synchronization failed: sync worker failed:"));

        let ok = run_blocking(|| Ok(SyncOutcome::default())).await;
        assert!(ok.unwrap().changes.is_empty());
    }

    #[tokio::test]
    async fn test_failed_pass_keeps_scheduler_running() {
        let temp = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let sink = Arc::new(CollectingSink::new(2, cancel.clone()));
        let scheduler = Scheduler::new(
            Arc::new(SyncEngine::new(
                temp.path().join("missing"),
                temp.path().join("replica"),
            )),
            Duration::from_millis(10),
            sink.clone(),
        );

        let passes = tokio::time::timeout(Duration::from_secs(10), scheduler.run(cancel))
            .await
            .expect("scheduler should stop promptly")
            .unwrap();

        assert_eq!(passes, 2);
        assert!(sink
            .reports()
            .iter()
            .all(|r| r.contains("Synchronization failed")));
    }
}
