//! Menu entry normalization and selection markup
//!
//! Tools print numbered menus such as `01. Login` or `99. Back`. Codes are
//! canonicalized before they are shown on a button and before they are sent
//! back to the tool, so what the user sees is exactly what the tool receives.

use serde::Serialize;

/// Code used when a menu offers nothing better to go back with
pub const DEFAULT_BACK_CODE: &str = "99";

/// Longest label shown on a button before it is cut
const MAX_BUTTON_LABEL_CHARS: usize = 28;
const CUT_BUTTON_LABEL_CHARS: usize = 25;
const BUTTONS_PER_ROW: usize = 2;

const BACK_KEYWORDS: [&str; 6] = ["kemb", "kembali", "utama", "back", "return", "parent"];

/// A numbered line parsed out of tool output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuEntry {
    pub code: String,
    pub label: String,
}

impl MenuEntry {
    pub fn new(code: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            label: label.into(),
        }
    }
}

/// Canonicalize a raw menu code.
///
/// `01`..`09` lose their leading zero, `00` is kept verbatim and every other
/// code passes through trimmed but otherwise untouched.
pub fn normalize_choice(code: &str) -> String {
    let code = code.trim();
    if code == "00" {
        return code.to_string();
    }
    if code.len() == 2 && code.starts_with('0') {
        if let Ok(value) = code.parse::<u32>() {
            return value.to_string();
        }
    }
    code.to_string()
}

/// Resolve the code that takes the tool back to its parent menu
pub fn find_back_code(entries: &[MenuEntry]) -> String {
    if let Some(entry) = entries.iter().find(|entry| {
        let label = entry.label.to_lowercase();
        BACK_KEYWORDS.iter().any(|keyword| label.contains(keyword))
    }) {
        return entry.code.clone();
    }

    if let Some(entry) = entries.iter().find(|e| e.code == "00" || e.code == "0") {
        return entry.code.clone();
    }

    if let Some(entry) = entries.iter().find(|e| e.code == "99") {
        return entry.code.clone();
    }

    entries
        .first()
        .map(|entry| entry.code.clone())
        .unwrap_or_else(|| DEFAULT_BACK_CODE.to_string())
}

/// One selectable button of a menu
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuButton {
    pub caption: String,
    pub code: String,
}

/// Interactive affordance attached to a flushed menu
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuMarkup {
    pub rows: Vec<Vec<MenuButton>>,
    pub back_code: String,
}

impl MenuMarkup {
    /// Build the button layout for a set of discovered entries
    pub fn from_entries(entries: &[MenuEntry]) -> Self {
        let buttons: Vec<MenuButton> = entries
            .iter()
            .map(|entry| {
                let code = normalize_choice(&entry.code);
                MenuButton {
                    caption: format!("{}. {}", code, shorten_label(&entry.label)),
                    code,
                }
            })
            .collect();

        let rows = buttons
            .chunks(BUTTONS_PER_ROW)
            .map(|row| row.to_vec())
            .collect();

        Self {
            rows,
            back_code: normalize_choice(&find_back_code(entries)),
        }
    }

    /// Iterate over every button in display order
    pub fn buttons(&self) -> impl Iterator<Item = &MenuButton> {
        self.rows.iter().flatten()
    }
}

fn shorten_label(label: &str) -> String {
    if label.chars().count() <= MAX_BUTTON_LABEL_CHARS {
        label.to_string()
    } else {
        let cut: String = label.chars().take(CUT_BUTTON_LABEL_CHARS).collect();
        format!("{}...", cut)
    }
}
