//! Configuration management module
//!
//! Handles loading, validation, and management of application configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::notify::DEFAULT_MAX_MESSAGE_CHARS;
use crate::stream::DEFAULT_PROMPT_KEYWORDS;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Logging level
    pub log_level: String,

    /// File-based logging configuration
    pub log: LogConfig,

    /// The interactive tool every session runs
    pub tool: ToolConfig,

    /// Output buffering and flush policy
    pub buffer: BufferConfig,

    /// Output classification settings
    pub stream: StreamConfig,

    /// Per-user event journal
    pub journal: JournalConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Program to execute (interpreter or binary)
    pub program: String,

    /// Arguments passed before the entry point
    pub args: Vec<String>,

    /// Script or file the tool is started with; must exist for `start` to succeed
    pub entry_point: Option<PathBuf>,

    /// Working directory; defaults to the entry point's directory
    pub working_dir: Option<PathBuf>,

    /// Directories prepended to `search_path_var`
    pub search_paths: Vec<PathBuf>,

    /// Name of the path-list variable augmented with `search_paths`
    pub search_path_var: String,

    /// Grace period between the termination request and a forced kill
    pub stop_grace_ms: u64,

    /// Extra environment variables for the child
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Quiet time after the last output before buffered output is sent
    pub flush_idle_ms: u64,

    /// How often the flush scheduler checks the idle time
    pub poll_interval_ms: u64,

    /// Maximum characters per outbound message
    pub max_message_chars: usize,

    /// Bytes requested per read from the tool's output
    pub read_chunk_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Words that mark a line as a prompt
    pub prompt_keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Write per-user event journals
    pub enabled: bool,

    /// Directory holding `<user_id>.log` files
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// Absolute or relative path to the application log file
    pub file_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log: LogConfig::default(),
            tool: ToolConfig::default(),
            buffer: BufferConfig::default(),
            stream: StreamConfig::default(),
            journal: JournalConfig::default(),
        }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        let mut env = BTreeMap::new();
        env.insert("PYTHONUNBUFFERED".to_string(), "1".to_string());

        Self {
            program: "python3".to_string(),
            args: Vec::new(),
            entry_point: Some(PathBuf::from("tool/main.py")),
            working_dir: None,
            env,
            search_paths: Vec::new(),
            search_path_var: "PYTHONPATH".to_string(),
            stop_grace_ms: 3000,
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            flush_idle_ms: 5000,
            poll_interval_ms: 500,
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
            read_chunk_size: 1024,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            prompt_keywords: DEFAULT_PROMPT_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("bot_logs"),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file_path: "logs/toolbridge.log".to_string(),
        }
    }
}

impl ToolConfig {
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

impl BufferConfig {
    pub fn flush_idle(&self) -> Duration {
        Duration::from_millis(self.flush_idle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Load configuration from file with environment variable overrides
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply overrides from any key lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // TOOLBRIDGE_LOG_LEVEL - logging level
        if let Some(log_level) = lookup("TOOLBRIDGE_LOG_LEVEL") {
            self.log_level = log_level;
        }

        // TOOLBRIDGE_LOG_FILE_PATH - logging destination file
        if let Some(file_path) = lookup("TOOLBRIDGE_LOG_FILE_PATH") {
            if !file_path.trim().is_empty() {
                self.log.file_path = file_path;
            }
        }

        // TOOLBRIDGE_TOOL_PROGRAM - program to run
        if let Some(program) = lookup("TOOLBRIDGE_TOOL_PROGRAM") {
            if !program.trim().is_empty() {
                self.tool.program = program;
            }
        }

        // TOOLBRIDGE_TOOL_ENTRY_POINT - entry script; empty disables the check
        if let Some(entry) = lookup("TOOLBRIDGE_TOOL_ENTRY_POINT") {
            self.tool.entry_point = if entry.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(entry))
            };
        }

        // TOOLBRIDGE_TOOL_WORKING_DIR - working directory
        if let Some(dir) = lookup("TOOLBRIDGE_TOOL_WORKING_DIR") {
            if !dir.trim().is_empty() {
                self.tool.working_dir = Some(PathBuf::from(dir));
            }
        }

        // TOOLBRIDGE_FLUSH_IDLE_MS - idle threshold before a flush
        if let Some(idle) = lookup("TOOLBRIDGE_FLUSH_IDLE_MS") {
            if let Ok(value) = idle.parse::<u64>() {
                self.buffer.flush_idle_ms = value;
            }
        }

        // TOOLBRIDGE_POLL_INTERVAL_MS - flush scheduler interval
        if let Some(interval) = lookup("TOOLBRIDGE_POLL_INTERVAL_MS") {
            if let Ok(value) = interval.parse::<u64>() {
                self.buffer.poll_interval_ms = value;
            }
        }

        // TOOLBRIDGE_MAX_MESSAGE_CHARS - outbound message size limit
        if let Some(max) = lookup("TOOLBRIDGE_MAX_MESSAGE_CHARS") {
            if let Ok(value) = max.parse::<usize>() {
                self.buffer.max_message_chars = value;
            }
        }

        // TOOLBRIDGE_PROMPT_KEYWORDS - comma-separated prompt keywords
        if let Some(keywords) = lookup("TOOLBRIDGE_PROMPT_KEYWORDS") {
            self.stream.prompt_keywords = keywords
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // TOOLBRIDGE_JOURNAL_DIR - journal directory
        if let Some(dir) = lookup("TOOLBRIDGE_JOURNAL_DIR") {
            if !dir.trim().is_empty() {
                self.journal.dir = PathBuf::from(dir);
            }
        }

        // TOOLBRIDGE_JOURNAL_ENABLED - toggle journaling
        if let Some(enabled) = lookup("TOOLBRIDGE_JOURNAL_ENABLED") {
            self.journal.enabled = enabled.parse().unwrap_or(self.journal.enabled);
        }
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load_from_file(path).unwrap_or_else(|err| {
            tracing::warn!("Failed to load config: {:#}, using defaults", err);
            let mut config = Self::default();
            config.apply_env_overrides();
            config
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.tool.program.trim().is_empty() {
            anyhow::bail!("tool.program must not be empty");
        }

        if self.buffer.poll_interval_ms == 0 {
            anyhow::bail!("buffer.poll_interval_ms must be greater than 0");
        }

        if self.buffer.max_message_chars == 0 {
            anyhow::bail!("buffer.max_message_chars must be greater than 0");
        }

        if self.buffer.read_chunk_size == 0 {
            anyhow::bail!("buffer.read_chunk_size must be greater than 0");
        }

        if self.log.file_path.trim().is_empty() {
            anyhow::bail!("Log file path must not be empty");
        }

        if self.tool.search_path_var.trim().is_empty() && !self.tool.search_paths.is_empty() {
            anyhow::bail!("tool.search_path_var must be set when tool.search_paths is used");
        }

        Ok(())
    }

    /// Display formatted configuration
    pub fn display(&self) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        println!("Current configuration:");
        println!("{}", content);
        Ok(())
    }

    /// Display configuration management help
    pub fn display_help() -> Result<()> {
        println!("Configuration management commands:");
        println!("  toolbridge config show    - Show current configuration");
        println!("  toolbridge config reset   - Write the default configuration");
        Ok(())
    }

    /// Handle configuration command
    pub fn handle_command<P: AsRef<Path>>(
        action: &Option<crate::cli::ConfigAction>,
        path: P,
    ) -> Result<()> {
        match action {
            Some(crate::cli::ConfigAction::Show) => {
                let config = Config::load_or_default(&path);
                config.display()?;
            }
            Some(crate::cli::ConfigAction::Reset) => {
                let default_config = Config::default();
                default_config.save_to_file(&path)?;
                println!("Default configuration written to {}", path.as_ref().display());
                default_config.display()?;
            }
            None => {
                Config::display_help()?;
            }
        }
        Ok(())
    }
}
