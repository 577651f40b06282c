//! Per-user event journal
//!
//! An append-only text log of everything that crosses the bridge for one user:
//! tool output, routed input, detected prompts, menus, flushes and automatic
//! continues. The bridge only ever writes to it.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use tracing::debug;

use crate::session::UserId;

/// Category tag written in front of every journal line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalTag {
    Output,
    Input,
    Prompt,
    Menu,
    Send,
    AutoContinue,
    Info,
}

impl JournalTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalTag::Output => "OUT",
            JournalTag::Input => "IN",
            JournalTag::Prompt => "PROMPT",
            JournalTag::Menu => "MENU",
            JournalTag::Send => "SEND",
            JournalTag::AutoContinue => "AUTO",
            JournalTag::Info => "INFO",
        }
    }
}

impl fmt::Display for JournalTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Writer for per-user journal files under one directory
#[derive(Debug, Clone)]
pub struct EventJournal {
    /// `None` disables journaling entirely.
    dir: Option<PathBuf>,
}

impl EventJournal {
    /// Journal into `<dir>/<user_id>.log`, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = fs::create_dir_all(&dir) {
            debug!("Failed to create journal directory {}: {}", dir.display(), e);
        }
        Self { dir: Some(dir) }
    }

    /// A journal that drops every record
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    /// Path of the journal file for a user
    pub fn path_for(&self, user_id: UserId) -> Option<PathBuf> {
        self.dir
            .as_deref()
            .map(|dir| dir.join(format!("{}.log", user_id)))
    }

    /// Append one record. Failures are logged and otherwise ignored.
    pub fn record(&self, user_id: UserId, tag: JournalTag, message: &str) {
        let Some(path) = self.path_for(user_id) else {
            return;
        };

        if let Err(e) = append_line(&path, tag, message) {
            debug!(user_id, "Failed to write journal {}: {}", path.display(), e);
        }
    }
}

fn append_line(path: &Path, tag: JournalTag, message: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    writeln!(file, "{} [{}] {}", timestamp, tag, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_records_are_appended_per_user() {
        let dir = TempDir::new().unwrap();
        let journal = EventJournal::new(dir.path().join("logs"));

        journal.record(1, JournalTag::Output, "hello");
        journal.record(1, JournalTag::AutoContinue, "sent enter");
        journal.record(2, JournalTag::Input, "42");

        let first = fs::read_to_string(journal.path_for(1).unwrap()).unwrap();
        let lines: Vec<_> = first.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[OUT] hello"));
        assert!(lines[1].ends_with("[AUTO] sent enter"));

        let second = fs::read_to_string(journal.path_for(2).unwrap()).unwrap();
        assert!(second.trim_end().ends_with("[IN] 42"));
    }

    #[test]
    fn test_disabled_journal_writes_nothing() {
        let journal = EventJournal::disabled();
        assert!(journal.path_for(1).is_none());
        journal.record(1, JournalTag::Info, "ignored");
    }
}
