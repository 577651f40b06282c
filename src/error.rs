//! Error types for bridge operations

use std::path::PathBuf;

/// Errors raised by session lifecycle and input routing
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("tool is already running")]
    AlreadyRunning,
    #[error("tool executable not found: {}", .0.display())]
    ToolNotFound(PathBuf),
    #[error("failed to spawn tool: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("tool is not running")]
    NotRunning,
    #[error("failed to write to tool input: {0}")]
    InputWrite(#[source] std::io::Error),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Errors raised when an outbound message cannot reach the chat side
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("notification channel closed")]
    ChannelClosed,
}

pub type BridgeResult<T> = Result<T, BridgeError>;
