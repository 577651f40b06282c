//! Line classification strategies.
//!
//! A classifier looks at one line of tool output and decides what the bridge
//! should do with it: answer it, turn it into a menu button, or buffer it.

use regex::Regex;

use crate::menu::MenuEntry;

/// Prompt keywords recognised out of the box.
pub const DEFAULT_PROMPT_KEYWORDS: [&str; 12] = [
    "pilih", "enter", "family", "kode", "otp", "nomor", "number", "pin", "masuk", "choose",
    "code", "login",
];

/// What a single line of output means to the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    /// The tool is waiting for a bare Enter; answer it and drop the line.
    ControlContinue,
    /// A numbered menu line.
    MenuEntry(MenuEntry),
    /// Ordinary output.
    PlainOutput(String),
    /// Output that looks like the tool is waiting for input.
    Prompt(String),
}

/// Trait for line classification - pattern based by default, swappable for tests
/// or tools with a known output grammar.
pub trait Classifier: Send + Sync {
    /// Classify a line. `partial` is set when the text arrived without a line
    /// terminator.
    fn classify(&self, line: &str, partial: bool) -> Unit;

    /// Check whether an unterminated fragment should be treated as a prompt
    /// right away instead of waiting for the rest of its line.
    fn looks_like_prompt(&self, text: &str) -> bool;
}

/// Regex-based classifier (the default implementation).
#[derive(Debug, Clone)]
pub struct PatternClassifier {
    continue_pattern: Regex,
    menu_item: Regex,
    ends_with_colon: Regex,
    only_digits: Regex,
    /// `None` when no keywords are configured.
    prompt_keywords: Option<Regex>,
}

impl PatternClassifier {
    /// Create a classifier recognising the given prompt keywords.
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Result<Self, regex::Error> {
        let escaped: Vec<String> = keywords
            .iter()
            .map(|k| k.as_ref().trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();

        let prompt_keywords = if escaped.is_empty() {
            None
        } else {
            Some(Regex::new(&format!(r"(?i)\b(?:{})\b", escaped.join("|")))?)
        };

        Ok(Self {
            continue_pattern: Regex::new(r"(?i)press (?:enter|any key) to continue")?,
            menu_item: Regex::new(r"^\s*(\d+)\.\s*(.+)$")?,
            ends_with_colon: Regex::new(r".+:\s*$")?,
            only_digits: Regex::new(r"^\d{1,8}$")?,
            prompt_keywords,
        })
    }

    fn contains_keyword(&self, text: &str) -> bool {
        self.prompt_keywords
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(text))
    }
}

impl Default for PatternClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_PROMPT_KEYWORDS.as_slice()).expect("built-in classifier patterns are valid")
    }
}

impl Classifier for PatternClassifier {
    fn classify(&self, line: &str, partial: bool) -> Unit {
        if self.continue_pattern.is_match(line) {
            return Unit::ControlContinue;
        }

        if let Some(caps) = self.menu_item.captures(line) {
            let code = caps.get(1).map_or("", |m| m.as_str()).trim();
            let label = caps.get(2).map_or("", |m| m.as_str()).trim();
            return Unit::MenuEntry(MenuEntry::new(code, label));
        }

        if partial || self.looks_like_prompt(line) {
            Unit::Prompt(line.to_string())
        } else {
            Unit::PlainOutput(line.to_string())
        }
    }

    fn looks_like_prompt(&self, text: &str) -> bool {
        self.ends_with_colon.is_match(text)
            || self.contains_keyword(text)
            || self.only_digits.is_match(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continue_pattern_any_case() {
        let classifier = PatternClassifier::default();
        assert_eq!(
            classifier.classify("Press ENTER to continue...", false),
            Unit::ControlContinue
        );
        assert_eq!(
            classifier.classify("press any key to continue", true),
            Unit::ControlContinue
        );
    }

    #[test]
    fn test_menu_entry() {
        let classifier = PatternClassifier::default();
        assert_eq!(
            classifier.classify("  01.  Beli paket  ", false),
            Unit::MenuEntry(MenuEntry::new("01", "Beli paket"))
        );
        // no space after the dot is still a menu line
        assert_eq!(
            classifier.classify("3.Exit", false),
            Unit::MenuEntry(MenuEntry::new("3", "Exit"))
        );
    }

    #[test]
    fn test_prompt_detection() {
        let classifier = PatternClassifier::default();
        assert_eq!(
            classifier.classify("Masukkan nomor:", false),
            Unit::Prompt("Masukkan nomor:".into())
        );
        assert_eq!(
            classifier.classify("Enter your PIN", false),
            Unit::Prompt("Enter your PIN".into())
        );
        assert_eq!(classifier.classify("12345", false), Unit::Prompt("12345".into()));
        assert_eq!(
            classifier.classify("anything at all", true),
            Unit::Prompt("anything at all".into())
        );
    }

    #[test]
    fn test_plain_output() {
        let classifier = PatternClassifier::default();
        assert_eq!(
            classifier.classify("Balance: 10 GB remaining", false),
            Unit::PlainOutput("Balance: 10 GB remaining".into())
        );
        // keywords only count as whole words
        assert_eq!(
            classifier.classify("spinning up", false),
            Unit::PlainOutput("spinning up".into())
        );
        assert_eq!(
            classifier.classify("123456789", false),
            Unit::PlainOutput("123456789".into())
        );
    }

    #[test]
    fn test_custom_keywords() {
        let classifier = PatternClassifier::new(&["password"]).unwrap();
        assert!(classifier.looks_like_prompt("Type password"));
        assert!(!classifier.looks_like_prompt("enter"));

        let classifier = PatternClassifier::new::<&str>(&[]).unwrap();
        assert!(!classifier.looks_like_prompt("pilih"));
        assert!(classifier.looks_like_prompt("pilih:"));
    }
}
