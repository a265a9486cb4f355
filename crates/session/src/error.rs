//! Session errors

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the conversation manager
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The owner already holds the maximum number of active conversations
    #[error("maximum {0} concurrent conversations reached")]
    CapExceeded(usize),

    /// Unknown session, or one the user does not take part in
    #[error("conversation {0} not found")]
    NotFound(Uuid),

    /// The user has no foreground conversation selected
    #[error("no active conversation selected")]
    NoForeground,

    /// The conversation is no longer active
    #[error("conversation {0} is not active")]
    InactiveSession(Uuid),

    /// A terminal status cannot change to a different terminal status
    #[error("conversation {0} already ended with a different status")]
    TerminalStatus(Uuid),

    /// The requested final status is not terminal
    #[error("final status must be completed or abandoned")]
    InvalidFinalStatus,

    /// A conversation needs at least two participants
    #[error("a conversation requires at least one counterparty")]
    NoCounterparty,
}
