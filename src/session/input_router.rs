//! Forwarding user input into the tool's stdin

use std::io;

use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::state::{InputState, Session};
use crate::error::{BridgeError, BridgeResult};
use crate::journal::JournalTag;
use crate::menu::normalize_choice;

/// Where a piece of input came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    /// Free text typed by the user
    Text,
    /// A menu button
    MenuChoice,
    /// The "back to main menu" button
    MenuBack,
}

impl InputSource {
    fn label(&self) -> &'static str {
        match self {
            InputSource::Text => "text",
            InputSource::MenuChoice => "choice",
            InputSource::MenuBack => "back",
        }
    }
}

impl Session {
    /// Send one line of input to the tool.
    ///
    /// Menu codes are normalized and free text is trimmed before writing. On
    /// success the session stops awaiting input.
    pub async fn route_input(&self, payload: &str, source: InputSource) -> BridgeResult<()> {
        let payload = match source {
            InputSource::Text => payload.trim().to_string(),
            InputSource::MenuChoice | InputSource::MenuBack => normalize_choice(payload),
        };

        let mut line = payload.clone().into_bytes();
        line.push(b'\n');
        self.write_input(&line).await?;

        {
            let mut state = self.state.lock().await;
            state.input_state = InputState::Idle;
            state.counters.inputs_routed += 1;
        }

        debug!(user_id = self.user_id(), source = source.label(), "input routed");
        self.journal(
            JournalTag::Input,
            &format!("{} -> {}", source.label(), payload),
        );
        Ok(())
    }

    /// Write raw bytes to the tool's stdin and flush them.
    ///
    /// A tool that stops reading its input fails the write after the stop grace
    /// period instead of holding up the user's later requests.
    pub(crate) async fn write_input(&self, bytes: &[u8]) -> BridgeResult<()> {
        let limit = self.ctx.config.tool.stop_grace();
        let mut input = self.input.lock().await;
        let stdin = input.as_mut().ok_or(BridgeError::NotRunning)?;

        let write = async {
            stdin.write_all(bytes).await?;
            stdin.flush().await
        };
        let result = match timeout(limit, write).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "tool is not reading its input",
            )),
        };

        result.map_err(|e| {
            warn!(user_id = self.user_id(), "Failed to write tool input: {}", e);
            BridgeError::InputWrite(e)
        })
    }
}
