//! Action Channel for inbound chat events

use anyhow::Result;
use tokio::sync::mpsc;

use super::{ChatId, UserId};

/// What a user asked the bridge to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeAction {
    /// Start the tool
    Start,
    /// Stop the tool
    Stop,
    /// Stop the tool and clear buffered state
    Reset,
    /// Report the session status
    Status,
    /// List all known sessions
    ListSessions,
    /// A menu button was pressed
    MenuChoice { code: String },
    /// The "back to main menu" button was pressed
    MenuBack { code: String },
    /// The menu was dismissed
    MenuCancel,
    /// Free text for the tool
    Text { text: String },
}

/// An action together with who sent it and where replies go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub action: BridgeAction,
}

impl InboundEvent {
    pub fn new(user_id: UserId, chat_id: ChatId, action: BridgeAction) -> Self {
        Self {
            user_id,
            chat_id,
            action,
        }
    }
}

/// Action channel for inbound event processing
pub struct ActionChannel {
    /// Event sender
    event_tx: mpsc::UnboundedSender<InboundEvent>,
    /// Event receiver
    event_rx: Option<mpsc::UnboundedReceiver<InboundEvent>>,
}

impl Clone for ActionChannel {
    fn clone(&self) -> Self {
        Self {
            event_tx: self.event_tx.clone(),
            event_rx: None, // Receivers cannot be cloned
        }
    }
}

impl ActionChannel {
    /// Create a new ActionChannel
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Self {
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Send event to channel
    pub fn send_event(&self, event: InboundEvent) -> Result<()> {
        self.event_tx
            .send(event)
            .map_err(|e| anyhow::anyhow!("Failed to send event: {}", e))
    }

    /// Send an action on behalf of a user
    pub fn send_action(&self, user_id: UserId, chat_id: ChatId, action: BridgeAction) -> Result<()> {
        self.send_event(InboundEvent::new(user_id, chat_id, action))
    }

    /// Get next event from channel
    pub async fn next_event(&mut self) -> Option<InboundEvent> {
        if let Some(event_rx) = &mut self.event_rx {
            event_rx.recv().await
        } else {
            None
        }
    }

    /// Take an already queued event without waiting
    pub fn try_next_event(&mut self) -> Option<InboundEvent> {
        self.event_rx.as_mut()?.try_recv().ok()
    }
}

impl Default for ActionChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let mut channel = ActionChannel::new();
        let sender = channel.clone();

        sender.send_action(1, 10, BridgeAction::Start).unwrap();
        sender
            .send_action(1, 10, BridgeAction::Text { text: "hi".into() })
            .unwrap();

        assert_eq!(
            channel.next_event().await,
            Some(InboundEvent::new(1, 10, BridgeAction::Start))
        );
        assert_eq!(
            channel.next_event().await.map(|e| e.action),
            Some(BridgeAction::Text { text: "hi".into() })
        );
    }

    #[tokio::test]
    async fn test_clone_has_no_receiver() {
        let channel = ActionChannel::new();
        let mut clone = channel.clone();
        assert_eq!(clone.next_event().await, None);
    }
}
