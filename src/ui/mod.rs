//! User Interface module
//!
//! Renders outbound messages on the console, either as coloured text for a
//! person or as JSON lines for a chat adapter reading our stdout.

/// Plain console formatting
pub mod cli;

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::io::{self, Write};

use crate::cli::Cli;
use crate::config::Config;
use crate::notify::OutboundMessage;
use crate::session::UserId;

/// Output format for the console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Local console notice in JSON mode
#[derive(Serialize)]
struct ConsoleNotice<'a> {
    console: &'a str,
    text: &'a str,
}

/// Writes outbound messages and console notices to stdout
#[derive(Debug, Clone)]
pub struct ConsoleRenderer {
    mode: OutputMode,
}

impl ConsoleRenderer {
    pub fn new(json: bool) -> Self {
        Self {
            mode: if json {
                OutputMode::Json
            } else {
                OutputMode::Human
            },
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Render one outbound message
    pub fn render(&self, message: &OutboundMessage) -> Result<()> {
        let line = match self.mode {
            OutputMode::Human => cli::format_message(message),
            OutputMode::Json => {
                cli::format_json(message).context("Failed to encode outbound message")?
            }
        };
        write_line(&line)
    }

    pub fn display_info(&self, text: &str) -> Result<()> {
        match self.mode {
            OutputMode::Human => write_line(&format!("{} {}", "ℹ".blue(), text)),
            OutputMode::Json => self.write_notice("info", text),
        }
    }

    pub fn display_error(&self, text: &str) -> Result<()> {
        match self.mode {
            OutputMode::Human => write_line(&format!("{} {}", "✗".red().bold(), text.red())),
            OutputMode::Json => self.write_notice("error", text),
        }
    }

    pub fn display_help(&self, lines: &[&str]) -> Result<()> {
        match self.mode {
            OutputMode::Human => write_line(&lines.join("\n")),
            OutputMode::Json => self.write_notice("help", &lines.join("\n")),
        }
    }

    /// Display welcome page
    pub fn display_welcome_page(&self, user_id: UserId) -> Result<()> {
        if self.mode == OutputMode::Json {
            return self.write_notice("info", &format!("toolbridge ready, acting as user {}", user_id));
        }

        let lines = [
            "┌─ Toolbridge ───────────────────────────────────────────────────────┐".to_string(),
            "│                                                                     │".to_string(),
            "│   Chat with an interactive command-line tool, one session per user │".to_string(),
            "│                                                                     │".to_string(),
            format!("│   Acting as user {:<50} │", user_id),
            "│   Type /start to launch the tool and /help for all commands        │".to_string(),
            "│                                                                     │".to_string(),
            "└────────────────────────────────────────────────────────────────────┘".to_string(),
        ];
        write_line(&lines.join("\n").bold().to_string())
    }

    /// Display dry-run configuration
    pub fn display_dry_run(&self, cli: &Cli, config: &Config) -> Result<()> {
        let summary = format!(
            "Dry-run mode configuration:\nConfig file: {}\nLog level: {}\nTool: {} {}\nEntry point: {}\nFlush after: {}ms idle (checked every {}ms)\nJournal: {}",
            cli.config_file,
            cli.effective_log_level(config),
            config.tool.program,
            config.tool.args.join(" "),
            config
                .tool
                .entry_point
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string()),
            config.buffer.flush_idle_ms,
            config.buffer.poll_interval_ms,
            if config.journal.enabled {
                config.journal.dir.display().to_string()
            } else {
                "disabled".to_string()
            },
        );

        match self.mode {
            OutputMode::Human => write_line(&summary),
            OutputMode::Json => self.write_notice("info", &summary),
        }
    }

    fn write_notice(&self, kind: &str, text: &str) -> Result<()> {
        let line = serde_json::to_string(&ConsoleNotice {
            console: kind,
            text,
        })
        .context("Failed to encode console notice")?;
        write_line(&line)
    }
}

fn write_line(line: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", line).context("Failed to write to stdout")?;
    stdout.flush().context("Failed to flush stdout")
}
