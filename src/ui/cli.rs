//! Plain console formatting of outbound messages

use colored::Colorize;

use crate::notify::{Markup, OutboundMessage};

/// Labels of the main control buttons, in display order
pub const CONTROL_BUTTONS: [(&str, &str); 5] = [
    ("▶️ Run", "/run"),
    ("📊 Status", "/status"),
    ("📋 Sessions", "/sessions"),
    ("🛑 Stop", "/stop"),
    ("♻️ Reset", "/reset"),
];

/// Format a message for a human reading the console
pub fn format_message(message: &OutboundMessage) -> String {
    let mut out = String::new();
    let header = format!("[chat {}]", message.chat_id);
    out.push_str(&format!("{} ", header.cyan().bold()));

    let mut lines = message.text.lines();
    if let Some(first) = lines.next() {
        out.push_str(first);
    }
    for line in lines {
        out.push('\n');
        out.push_str("   ");
        out.push_str(line);
    }

    if let Some(markup) = &message.markup {
        out.push('\n');
        out.push_str(&format_markup(markup));
    }

    out
}

/// Format buttons as `[caption]` rows
pub fn format_markup(markup: &Markup) -> String {
    match markup {
        Markup::Controls => {
            let buttons: Vec<String> = CONTROL_BUTTONS
                .iter()
                .map(|(caption, command)| format!("[{} {}]", caption, command))
                .collect();
            format!("   {}", buttons.join(" ").dimmed())
        }
        Markup::Menu(menu) => {
            let mut rows: Vec<String> = menu
                .rows
                .iter()
                .map(|row| {
                    let buttons: Vec<String> = row
                        .iter()
                        .map(|button| format!("[{}]", button.caption))
                        .collect();
                    format!("   {}", buttons.join(" ").green())
                })
                .collect();
            rows.push(format!(
                "   {}",
                format!(
                    "[⬅️ Back to main menu /back {}] [❌ Cancel /cancel]",
                    menu.back_code
                )
                .yellow()
            ));
            rows.join("\n")
        }
    }
}

/// Format a message as one JSON line
pub fn format_json(message: &OutboundMessage) -> serde_json::Result<String> {
    serde_json::to_string(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::{MenuEntry, MenuMarkup};

    #[test]
    fn test_human_format_indents_continuation_lines() {
        colored::control::set_override(false);
        let message = OutboundMessage {
            chat_id: 3,
            text: "first\nsecond".into(),
            markup: None,
        };
        assert_eq!(format_message(&message), "[chat 3] first\n   second");
    }

    #[test]
    fn test_menu_markup_lists_buttons_and_back_row() {
        colored::control::set_override(false);
        let markup = Markup::Menu(MenuMarkup::from_entries(&[
            MenuEntry::new("01", "Login"),
            MenuEntry::new("02", "Cek kuota"),
            MenuEntry::new("00", "Kembali"),
        ]));

        let text = format_markup(&markup);
        let rows: Vec<_> = text.lines().collect();
        assert_eq!(rows[0], "   [1. Login] [2. Cek kuota]");
        assert_eq!(rows[1], "   [00. Kembali]");
        assert_eq!(
            rows[2],
            "   [⬅️ Back to main menu /back 00] [❌ Cancel /cancel]"
        );
    }

    #[test]
    fn test_json_line_is_single_line() {
        let message = OutboundMessage {
            chat_id: 1,
            text: "a\nb".into(),
            markup: Some(Markup::Controls),
        };
        let line = format_json(&message).unwrap();
        assert!(!line.contains('\n'));
        assert!(line.contains(r#""kind":"controls""#));
    }
}
