//! Conversation manager
//!
//! State is partitioned per user and per session behind a pair of keyed
//! maps. Lock order is always user state before session state; the inbound
//! message path takes them one at a time and never nests them, so it cannot
//! block a user's foreground operations beyond the log append itself.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use mandi_voice_config::SessionSettings;
use mandi_voice_core::{EventSink, Language, PlatformEvent, SwitchEvent};

use crate::error::SessionError;
use crate::session::{Message, Participant, SessionSnapshot, SessionState, SessionStatus};

/// Default cap on concurrent active conversations per user
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Per-user state: foreground pointer plus the set of owned active sessions
#[derive(Debug, Default)]
struct UserState {
    foreground: Option<Uuid>,
    owned_active: HashSet<Uuid>,
}

/// Manages concurrent conversations for all users
pub struct ConversationManager {
    max_concurrent: usize,
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<SessionState>>>>,
    users: RwLock<HashMap<Uuid, Arc<Mutex<UserState>>>>,
    events: EventSink,
}

impl ConversationManager {
    pub fn new(max_concurrent: usize, events: EventSink) -> Self {
        Self {
            max_concurrent,
            sessions: RwLock::new(HashMap::new()),
            users: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn with_settings(settings: &SessionSettings, events: EventSink) -> Self {
        Self::new(settings.max_concurrent, events)
    }

    /// Event sink this manager reports into
    pub fn events(&self) -> &EventSink {
        &self.events
    }

    fn user_state(&self, user: Uuid) -> Arc<Mutex<UserState>> {
        if let Some(state) = self.users.read().get(&user) {
            return Arc::clone(state);
        }
        let mut users = self.users.write();
        Arc::clone(users.entry(user).or_default())
    }

    fn session(&self, session_id: Uuid) -> Result<Arc<Mutex<SessionState>>, SessionError> {
        self.sessions
            .read()
            .get(&session_id)
            .cloned()
            .ok_or(SessionError::NotFound(session_id))
    }

    /// Open a new conversation owned by `owner`.
    ///
    /// Fails with [`SessionError::CapExceeded`] when the owner already holds
    /// the maximum number of active conversations.
    pub fn open_session(
        &self,
        owner: &Participant,
        counterparties: Vec<Participant>,
        commodity: Option<String>,
    ) -> Result<Uuid, SessionError> {
        if counterparties.is_empty() {
            return Err(SessionError::NoCounterparty);
        }

        let user_arc = self.user_state(owner.id);
        let mut user = user_arc.lock();

        if user.owned_active.len() >= self.max_concurrent {
            tracing::warn!(
                owner = %owner.id,
                active = user.owned_active.len(),
                "conversation cap reached"
            );
            return Err(SessionError::CapExceeded(self.max_concurrent));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut participants = Vec::with_capacity(counterparties.len() + 1);
        participants.push(owner.clone());
        participants.extend(counterparties);

        let state = SessionState {
            id,
            owner: owner.id,
            participants,
            commodity: commodity.clone(),
            status: SessionStatus::Active,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        self.sessions.write().insert(id, Arc::new(Mutex::new(state)));
        user.owned_active.insert(id);

        tracing::info!(
            session_id = %id,
            owner = %owner.id,
            commodity = commodity.as_deref().unwrap_or("-"),
            "opened conversation"
        );
        Ok(id)
    }

    /// Make `session_id` the user's foreground conversation.
    ///
    /// Returns the switch event used for the voice announcement. Unknown
    /// sessions, ended sessions, and sessions the user does not take part in
    /// all report [`SessionError::NotFound`].
    pub fn switch_to(&self, user: Uuid, session_id: Uuid) -> Result<SwitchEvent, SessionError> {
        let session_arc = self.session(session_id)?;
        let user_arc = self.user_state(user);

        let mut user_state = user_arc.lock();
        let session = session_arc.lock();

        if !session.is_participant(user) || session.status != SessionStatus::Active {
            return Err(SessionError::NotFound(session_id));
        }

        let previous = user_state.foreground.replace(session_id);
        let event = SwitchEvent {
            previous_session_id: previous,
            new_session_id: session_id,
            counterparty: session.counterparty_name(user),
            commodity: session.commodity.clone(),
            message_count: session.messages.len(),
        };

        tracing::info!(
            user = %user,
            session_id = %session_id,
            counterparty = %event.counterparty,
            "switched foreground conversation"
        );
        self.events.emit(PlatformEvent::SessionSwitched(event.clone()));
        Ok(event)
    }

    /// Append a message to the user's foreground conversation
    pub fn append(
        &self,
        user: Uuid,
        text: impl Into<String>,
        language: Language,
    ) -> Result<Message, SessionError> {
        let user_arc = self.user_state(user);
        let user_state = user_arc.lock();
        let session_id = user_state.foreground.ok_or(SessionError::NoForeground)?;

        let session_arc = self.session(session_id)?;
        let mut session = session_arc.lock();
        if session.status != SessionStatus::Active {
            return Err(SessionError::InactiveSession(session_id));
        }

        let message = Message {
            id: Uuid::new_v4(),
            session_id,
            sender_id: user,
            text: text.into(),
            language,
            received_at: Utc::now(),
        };
        session.messages.push(message.clone());
        session.updated_at = message.received_at;
        Ok(message)
    }

    /// Append a message from a counterparty, regardless of foreground.
    ///
    /// Every other participant whose foreground is elsewhere gets one
    /// inactive-conversation alert.
    pub fn append_inbound(
        &self,
        session_id: Uuid,
        sender: Uuid,
        text: impl Into<String>,
        language: Language,
    ) -> Result<Message, SessionError> {
        let session_arc = self.session(session_id)?;

        let (message, sender_name, recipients) = {
            let mut session = session_arc.lock();
            if !session.is_participant(sender) {
                return Err(SessionError::NotFound(session_id));
            }
            if session.status != SessionStatus::Active {
                return Err(SessionError::InactiveSession(session_id));
            }

            let message = Message {
                id: Uuid::new_v4(),
                session_id,
                sender_id: sender,
                text: text.into(),
                language,
                received_at: Utc::now(),
            };
            session.messages.push(message.clone());
            session.updated_at = message.received_at;

            let sender_name = session.participant_name(sender);
            let recipients: Vec<Uuid> = session
                .participants
                .iter()
                .map(|p| p.id)
                .filter(|&id| id != sender)
                .collect();
            (message, sender_name, recipients)
        };

        // Alert recipients who are looking at another conversation. The
        // session lock is released first; this path never nests locks.
        for recipient in recipients {
            let user_arc = self.user_state(recipient);
            let foreground = user_arc.lock().foreground;
            if foreground != Some(session_id) {
                tracing::debug!(
                    owner = %recipient,
                    session_id = %session_id,
                    counterparty = %sender_name,
                    "message arrived in inactive conversation"
                );
                self.events.emit(PlatformEvent::InactiveAlert {
                    owner: recipient,
                    session_id,
                    counterparty: sender_name.clone(),
                });
            }
        }

        Ok(message)
    }

    /// End a conversation with a terminal status.
    ///
    /// Idempotent on the same status; changing one terminal status to
    /// another is an error.
    pub fn end_session(
        &self,
        owner: Uuid,
        session_id: Uuid,
        final_status: SessionStatus,
    ) -> Result<(), SessionError> {
        if !final_status.is_terminal() {
            return Err(SessionError::InvalidFinalStatus);
        }

        let session_arc = self.session(session_id)?;
        let user_arc = self.user_state(owner);

        let mut user_state = user_arc.lock();
        let mut session = session_arc.lock();

        if session.owner != owner {
            return Err(SessionError::NotFound(session_id));
        }
        if session.status == final_status {
            return Ok(());
        }
        if session.status.is_terminal() {
            return Err(SessionError::TerminalStatus(session_id));
        }

        session.status = final_status;
        session.updated_at = Utc::now();
        user_state.owned_active.remove(&session_id);
        if user_state.foreground == Some(session_id) {
            user_state.foreground = None;
        }

        tracing::info!(
            session_id = %session_id,
            owner = %owner,
            status = ?final_status,
            "ended conversation"
        );
        Ok(())
    }

    /// Messages of a conversation, in insertion order
    pub fn context(&self, session_id: Uuid) -> Result<Vec<Message>, SessionError> {
        let session_arc = self.session(session_id)?;
        let session = session_arc.lock();
        Ok(session.messages.clone())
    }

    /// Read-only view of a conversation
    pub fn snapshot(&self, session_id: Uuid) -> Result<SessionSnapshot, SessionError> {
        let session_arc = self.session(session_id)?;
        let session = session_arc.lock();
        Ok(SessionSnapshot::from(&*session))
    }

    /// Number of active conversations the user owns
    pub fn active_session_count(&self, owner: Uuid) -> usize {
        self.users
            .read()
            .get(&owner)
            .map(|state| state.lock().owned_active.len())
            .unwrap_or(0)
    }

    /// The user's current foreground conversation, if any
    pub fn foreground(&self, user: Uuid) -> Option<Uuid> {
        self.users
            .read()
            .get(&user)
            .and_then(|state| state.lock().foreground)
    }
}
