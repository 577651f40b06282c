//! Per-user tool sessions
//!
//! This module provides the core components for bridging chat users to their
//! own interactive tool process: the session registry, process supervision,
//! output reading and flushing, input routing, and the host that dispatches
//! inbound events.

pub mod action_channel;
pub mod command_router;
pub mod input_router;
pub mod reader;
pub mod registry;
pub mod scheduler;
pub mod session_manager;
pub mod state;
pub mod supervisor;

/// Identity of a chat user
pub type UserId = i64;

/// Address outbound messages for a user are delivered to
pub type ChatId = i64;

pub use action_channel::{ActionChannel, BridgeAction, InboundEvent};
pub use command_router::{CommandRouter, InteractiveCommand};
pub use input_router::InputSource;
pub use registry::{SessionContext, SessionRegistry, SessionSummary};
pub use session_manager::{ManagerState, SessionDispatcher, SessionManager};
pub use state::{InputState, Session, SessionCounters, SessionStatus};
pub use supervisor::StopOutcome;
