//! Command Line Interface module
//!
//! Implements the CLI commands and argument parsing for Toolbridge.

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::session::UserId;

#[derive(Parser, Debug, Clone)]
#[command(name = "toolbridge")]
#[command(about = "Toolbridge: chat sessions for interactive command-line tools")]
#[command(
    long_about = "Runs one interactive tool process per user and relays its output as chat messages"
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    #[arg(long, default_value = "config.toml")]
    pub config_file: String,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    pub log_level: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Dry-run mode: show welcome page and configuration without starting the console
    #[arg(long)]
    pub dry_run: bool,

    /// Print outbound messages as JSON lines
    #[arg(long)]
    pub json: bool,

    /// User id console input is sent as
    #[arg(long, default_value_t = 1)]
    pub user: UserId,
}

#[derive(Subcommand, Debug, Clone, Default)]
pub enum Commands {
    /// Run the console bridge
    #[default]
    Run,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Reset configuration to defaults
    Reset,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the actual command, using default if none provided
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or_default()
    }

    /// Log level after applying the verbose flag and the config file's setting
    pub fn effective_log_level(&self, config: &Config) -> String {
        if self.verbose {
            "debug".to_string()
        } else {
            self.log_level
                .clone()
                .unwrap_or_else(|| config.log_level.clone())
        }
    }

    /// Check if we're running in dry-run mode
    pub fn is_dry_run_mode(&self) -> bool {
        self.dry_run
    }
}
