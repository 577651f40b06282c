//! Outbound notification sink
//!
//! Everything the bridge wants to tell a user goes through a [`Notifier`]. The
//! notifier only queues messages; whoever owns the receiving end (the console
//! front end, or an adapter for a real chat platform) renders and delivers them.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::DeliveryError;
use crate::menu::MenuMarkup;
use crate::output::split_chunks;
use crate::session::ChatId;

/// Maximum characters per outbound message, matching common chat platform limits
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 3800;

/// Interactive affordance attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Markup {
    /// The bridge's own controls: run, status, sessions, stop, reset
    Controls,
    /// Buttons for a menu the tool printed, plus back and cancel
    Menu(MenuMarkup),
}

/// A single message for the chat side
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub chat_id: ChatId,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markup: Option<Markup>,
}

/// Cloneable handle for queueing outbound messages
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<OutboundMessage>,
    max_chars: usize,
}

impl Notifier {
    /// Create a notifier and the receiver its messages arrive on
    pub fn channel(max_chars: usize) -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                max_chars: max_chars.max(1),
            },
            rx,
        )
    }

    /// Queue one message as-is
    pub fn send(&self, message: OutboundMessage) -> Result<(), DeliveryError> {
        self.tx
            .send(message)
            .map_err(|_| DeliveryError::ChannelClosed)
    }

    /// Queue a short notice
    pub fn notify(
        &self,
        chat_id: ChatId,
        text: impl Into<String>,
        markup: Option<Markup>,
    ) -> Result<(), DeliveryError> {
        self.send(OutboundMessage {
            chat_id,
            text: text.into(),
            markup,
        })
    }

    /// Queue text of any length, split into chunks that fit the size limit.
    ///
    /// Only the first chunk carries the markup. Returns the number of chunks sent.
    pub fn send_long(
        &self,
        chat_id: ChatId,
        text: &str,
        markup: Option<Markup>,
    ) -> Result<usize, DeliveryError> {
        let mut markup = markup;
        let mut sent = 0;

        for chunk in split_chunks(text, self.max_chars) {
            self.send(OutboundMessage {
                chat_id,
                text: chunk.to_string(),
                markup: markup.take(),
            })?;
            sent += 1;
        }

        debug!(chat_id, chunks = sent, "queued outbound text");
        Ok(sent)
    }
}
