//! Buffered tool output and message composition
//!
//! Plain lines and menu entries are collected between flushes and turned into
//! one combined chat message when the flush scheduler decides the tool has gone
//! quiet.

use crate::menu::{MenuEntry, MenuMarkup};

/// Heading placed above the menu block of a combined message
pub const MENU_HEADING: &str = "📋 Menu:";

/// Output collected since the last flush
#[derive(Debug, Default, Clone)]
pub struct OutputBuffer {
    lines: Vec<String>,
    menu: Vec<MenuEntry>,
}

/// A flushed message ready to be delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMessage {
    pub text: String,
    pub markup: Option<MenuMarkup>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plain output line
    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Record a menu entry in discovery order
    pub fn push_menu_entry(&mut self, entry: MenuEntry) {
        self.menu.push(entry);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn menu(&self) -> &[MenuEntry] {
        &self.menu
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.menu.is_empty()
    }

    /// Drop menu entries only
    pub fn clear_menu(&mut self) {
        self.menu.clear();
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.menu.clear();
    }

    /// Drain both buffers together and compose the outbound message.
    ///
    /// Returns `None` when there is nothing worth sending.
    pub fn drain(&mut self) -> Option<ComposedMessage> {
        let lines = std::mem::take(&mut self.lines);
        let menu = std::mem::take(&mut self.menu);
        compose(&lines, &menu)
    }
}

/// Compose plain lines and menu entries into a single message
pub fn compose(lines: &[String], menu: &[MenuEntry]) -> Option<ComposedMessage> {
    let text = lines.join("\n");
    let text = text.trim();

    if menu.is_empty() {
        if text.is_empty() {
            return None;
        }
        return Some(ComposedMessage {
            text: text.to_string(),
            markup: None,
        });
    }

    let menu_text = menu
        .iter()
        .map(|entry| format!("{}. {}", entry.code, entry.label))
        .collect::<Vec<_>>()
        .join("\n");

    let full = if text.is_empty() {
        format!("{}\n{}", MENU_HEADING, menu_text)
    } else {
        format!("{}\n\n{}\n{}", text, MENU_HEADING, menu_text)
    };

    Some(ComposedMessage {
        text: full,
        markup: Some(MenuMarkup::from_entries(menu)),
    })
}

/// Split text into chunks of at most `max_chars` characters.
///
/// When a chunk has to be cut, the cut is moved back to just after the last
/// newline inside it, so lines are not broken unless a single line is longer
/// than the limit. Concatenating the chunks yields the original text.
pub fn split_chunks(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let limit = match rest.char_indices().nth(max_chars) {
            Some((idx, _)) => idx,
            None => {
                chunks.push(rest);
                break;
            }
        };

        let end = match rest[..limit].rfind('\n') {
            Some(nl) if nl > 0 => nl + 1,
            _ => limit,
        };

        let (chunk, tail) = rest.split_at(end);
        chunks.push(chunk);
        rest = tail;
    }

    chunks
}
