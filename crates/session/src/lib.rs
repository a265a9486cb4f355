//! Conversation session management
//!
//! Per-user bounded multiplexing of concurrent dialogs. Each user holds at
//! most `max_concurrent` active conversations, each with an isolated
//! append-only message log, plus one foreground conversation receiving
//! their voice input. Messages landing in any other conversation raise an
//! inactive-conversation alert.

mod error;
mod manager;
mod session;

pub use error::SessionError;
pub use manager::ConversationManager;
pub use session::{Message, Participant, SessionSnapshot, SessionStatus};
