use anyhow::Context;
use clap::Parser;
use mirrorsync_lib::cli::Cli;
use mirrorsync_lib::commands::{listen, print_command_menu, print_intro};
use mirrorsync_lib::logging::{init_logging, LogConfig, TracingReportSink};
use mirrorsync_lib::{Scheduler, SyncEngine, SyncSettings};
use std::io::{self, Write};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = SyncSettings::from_cli(&cli)?;

    let log_config = LogConfig::load(cli.config.as_deref());
    // guard 必须存活到退出，保证日志写完
    let _log_guard = init_logging(&settings.log_file, &log_config).with_context(|| {
        format!("failed to open log file '{}'", settings.log_file.display())
    })?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let result = runtime.block_on(run(settings));

    // 标准输入的阻塞读取不会自行结束，不等待它
    runtime.shutdown_background();
    result
}

async fn run(settings: SyncSettings) -> anyhow::Result<()> {
    {
        let mut stdout = io::stdout().lock();
        print_intro(&mut stdout)?;
        print_command_menu(&mut stdout)?;
        stdout.flush()?;
    }

    let cancel = CancellationToken::new();

    let listener = {
        let cancel = cancel.clone();
        let settings = settings.clone();
        tokio::spawn(async move {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            if let Err(e) = listen(stdin, io::stdout(), &settings, &cancel).await {
                warn!("Command listener stopped: {}", e);
            }
        })
    };

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("收到 Ctrl-C，停止同步");
                cancel.cancel();
            }
        });
    }

    let engine = Arc::new(SyncEngine::new(&settings.source, &settings.replica));
    let scheduler = Scheduler::new(engine, settings.interval, Arc::new(TracingReportSink));
    let passes = scheduler.run(cancel).await?;

    listener.abort();
    debug!("同步结束，共执行 {} 轮", passes);
    Ok(())
}
