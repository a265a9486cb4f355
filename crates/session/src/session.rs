//! Conversation types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mandi_voice_core::Language;

/// A user taking part in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    /// Name used in voice announcements
    pub display_name: String,
}

impl Participant {
    pub fn new(id: Uuid, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

/// Conversation lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Abandoned,
}

impl SessionStatus {
    /// Terminal statuses can never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Abandoned)
    }
}

/// One message in a conversation log. Immutable after insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub session_id: Uuid,
    pub sender_id: Uuid,
    pub text: String,
    pub language: Language,
    pub received_at: DateTime<Utc>,
}

/// Internal conversation state, guarded by the manager's per-session lock
#[derive(Debug)]
pub(crate) struct SessionState {
    pub id: Uuid,
    pub owner: Uuid,
    pub participants: Vec<Participant>,
    pub commodity: Option<String>,
    pub status: SessionStatus,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    /// Display name of the first participant other than `user`
    pub fn counterparty_name(&self, user: Uuid) -> String {
        self.participants
            .iter()
            .find(|p| p.id != user)
            .map(|p| p.display_name.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// Display name of a specific participant
    pub fn participant_name(&self, user: Uuid) -> String {
        self.participants
            .iter()
            .find(|p| p.id == user)
            .map(|p| p.display_name.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    pub fn is_participant(&self, user: Uuid) -> bool {
        self.participants.iter().any(|p| p.id == user)
    }
}

/// Read-only view of a conversation
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub owner: Uuid,
    pub participants: Vec<Participant>,
    pub commodity: Option<String>,
    pub status: SessionStatus,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&SessionState> for SessionSnapshot {
    fn from(state: &SessionState) -> Self {
        Self {
            id: state.id,
            owner: state.owner,
            participants: state.participants.clone(),
            commodity: state.commodity.clone(),
            status: state.status,
            message_count: state.messages.len(),
            created_at: state.created_at,
            updated_at: state.updated_at,
        }
    }
}
