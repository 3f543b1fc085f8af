//! 交互式命令（标准输入）

use crate::config::SyncSettings;
use std::io::{self, Write};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// 控制台命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Help,
    Info,
    Exit,
    Unknown(String),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Self {
        let command = line.trim().to_lowercase();
        match command.as_str() {
            "?" | "help" => ConsoleCommand::Help,
            "info" => ConsoleCommand::Info,
            "exit" => ConsoleCommand::Exit,
            _ => ConsoleCommand::Unknown(command),
        }
    }
}

pub fn print_intro(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "\n=============================")?;
    writeln!(out, "Folder Synchronization System")?;
    writeln!(out, "=============================")
}

pub fn print_command_menu(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "\nCommand Menu:")?;
    writeln!(out, "  '?' or 'help' - Show command menu")?;
    writeln!(out, "  'info' - Show info menu")?;
    writeln!(out, "  'exit' - Exit the program\n")
}

pub fn print_info_menu(out: &mut impl Write, settings: &SyncSettings) -> io::Result<()> {
    writeln!(out, "\nInfo Menu:")?;
    writeln!(out, "  Source folder: {}", settings.source.display())?;
    writeln!(out, "  Replica folder: {}", settings.replica.display())?;
    writeln!(out, "  Log file path: {}", settings.log_file.display())?;
    writeln!(
        out,
        "  Synchronization interval: {} seconds\n",
        settings.interval.as_secs()
    )
}

/// 逐行读取命令，直到收到 `exit`、输入结束或 `cancel` 被触发
///
/// `exit` 会触发 `cancel`；输入结束只停止监听。
pub async fn listen<R, W>(
    input: R,
    mut out: W,
    settings: &SyncSettings,
    cancel: &CancellationToken,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            debug!("标准输入已关闭，停止监听命令");
            return Ok(());
        };

        match ConsoleCommand::parse(&line) {
            ConsoleCommand::Help => print_command_menu(&mut out)?,
            ConsoleCommand::Info => print_info_menu(&mut out, settings)?,
            ConsoleCommand::Exit => {
                writeln!(out, "Exiting program...")?;
                out.flush()?;
                cancel.cancel();
                return Ok(());
            }
            ConsoleCommand::Unknown(_) => writeln!(
                out,
                "Unknown command. Type '?' or 'help' for a list of commands."
            )?,
        }
        out.flush()?;
    }
}
