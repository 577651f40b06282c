//! Command Router for console input

use anyhow::Result;

use super::UserId;
use super::action_channel::BridgeAction;

/// Commands typed at the console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractiveCommand {
    /// Forward an action for the current user
    Bridge(BridgeAction),
    /// Act as another user from now on
    SwitchUser { user_id: UserId },
    /// Show the current user
    WhoAmI,
    /// Show the command list
    Help,
    /// Quit the application
    Quit,
}

/// Parser for console input
pub struct CommandRouter;

impl CommandRouter {
    /// Parse one console line.
    ///
    /// Lines starting with `/` are commands, `//` escapes a literal slash, and
    /// anything else is free text for the tool.
    pub fn parse_interactive_command(input: &str) -> Result<Option<InteractiveCommand>> {
        let input = input.trim();

        if input.is_empty() {
            return Ok(None);
        }

        if let Some(escaped) = input.strip_prefix("//") {
            return Ok(Some(InteractiveCommand::Bridge(BridgeAction::Text {
                text: format!("/{}", escaped),
            })));
        }

        if !input.starts_with('/') {
            return Ok(Some(InteractiveCommand::Bridge(BridgeAction::Text {
                text: input.to_string(),
            })));
        }

        let parts: Vec<&str> = input.split_whitespace().collect();
        let bridge = |action| Ok(Some(InteractiveCommand::Bridge(action)));

        match parts[0] {
            "/start" | "/run" => bridge(BridgeAction::Start),
            "/stop" => bridge(BridgeAction::Stop),
            "/reset" => bridge(BridgeAction::Reset),
            "/status" => bridge(BridgeAction::Status),
            "/sessions" => bridge(BridgeAction::ListSessions),
            "/cancel" => bridge(BridgeAction::MenuCancel),
            "/pick" => {
                if parts.len() != 2 {
                    return Err(anyhow::anyhow!("Usage: /pick <code>"));
                }
                bridge(BridgeAction::MenuChoice {
                    code: parts[1].to_string(),
                })
            }
            "/back" => {
                if parts.len() != 2 {
                    return Err(anyhow::anyhow!("Usage: /back <code>"));
                }
                bridge(BridgeAction::MenuBack {
                    code: parts[1].to_string(),
                })
            }
            "/as" => {
                let user_id = parts
                    .get(1)
                    .and_then(|id| id.parse::<UserId>().ok())
                    .ok_or_else(|| anyhow::anyhow!("Usage: /as <user id>"))?;
                Ok(Some(InteractiveCommand::SwitchUser { user_id }))
            }
            "/whoami" => Ok(Some(InteractiveCommand::WhoAmI)),
            "/help" | "/?" => Ok(Some(InteractiveCommand::Help)),
            "/quit" | "/exit" | "/q" => Ok(Some(InteractiveCommand::Quit)),
            _ => Err(anyhow::anyhow!(
                "Unknown command: {}. Type /help for available commands.",
                parts[0]
            )),
        }
    }

    /// Console command help
    pub fn help_lines() -> &'static [&'static str] {
        &[
            "Toolbridge Commands:",
            "  /start, /run        - Start the tool",
            "  /stop               - Stop the tool",
            "  /reset              - Stop the tool and clear buffered output",
            "  /status             - Show session status",
            "  /sessions           - List all sessions",
            "  /pick <code>        - Choose a menu entry",
            "  /back <code>        - Go back to the main menu",
            "  /cancel             - Close the current menu",
            "  /as <user id>       - Act as another user",
            "  /whoami             - Show the current user",
            "  /help               - Show this help",
            "  /quit               - Exit the application",
            "  anything else       - Sent to the tool as text (use // for a leading /)",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Option<InteractiveCommand> {
        CommandRouter::parse_interactive_command(input).unwrap()
    }

    #[test]
    fn test_bridge_commands() {
        assert_eq!(
            parse("/run"),
            Some(InteractiveCommand::Bridge(BridgeAction::Start))
        );
        assert_eq!(
            parse("  /sessions "),
            Some(InteractiveCommand::Bridge(BridgeAction::ListSessions))
        );
        assert_eq!(
            parse("/pick 01"),
            Some(InteractiveCommand::Bridge(BridgeAction::MenuChoice {
                code: "01".into()
            }))
        );
        assert_eq!(
            parse("/back 00"),
            Some(InteractiveCommand::Bridge(BridgeAction::MenuBack {
                code: "00".into()
            }))
        );
    }

    #[test]
    fn test_free_text_and_escape() {
        assert_eq!(
            parse("0812 3456"),
            Some(InteractiveCommand::Bridge(BridgeAction::Text {
                text: "0812 3456".into()
            }))
        );
        assert_eq!(
            parse("//start"),
            Some(InteractiveCommand::Bridge(BridgeAction::Text {
                text: "/start".into()
            }))
        );
        assert_eq!(parse("   "), None);
    }

    #[test]
    fn test_identity_commands() {
        assert_eq!(
            parse("/as 42"),
            Some(InteractiveCommand::SwitchUser { user_id: 42 })
        );
        assert_eq!(parse("/whoami"), Some(InteractiveCommand::WhoAmI));
        assert!(CommandRouter::parse_interactive_command("/as bob").is_err());
    }

    #[test]
    fn test_usage_errors() {
        assert!(CommandRouter::parse_interactive_command("/pick").is_err());
        assert!(CommandRouter::parse_interactive_command("/frobnicate").is_err());
    }
}
