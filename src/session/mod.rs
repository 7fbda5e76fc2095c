//! Persona session store
//!
//! Keeps one ordered transcript per persona key and tracks which persona is active.

use std::sync::Mutex;

use dashmap::DashMap;

use crate::types::message::{Role, Turn};

/// Key used when a caller supplies an empty or whitespace key
pub const DEFAULT_PERSONA_KEY: &str = "default";

/// System prompt for personas activated without one
pub const FALLBACK_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Lifecycle of a single persona's conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NonExistent,
    /// Ready for a user turn
    Seeded,
    /// A user turn is waiting for its assistant reply
    AwaitingReply,
}

pub fn normalize_key(key: &str) -> String {
    if key.trim().is_empty() {
        DEFAULT_PERSONA_KEY.to_string()
    } else {
        key.to_string()
    }
}

pub struct SessionStore {
    sessions: DashMap<String, Vec<Turn>>,
    active: Mutex<Option<String>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            active: Mutex::new(None),
        }
    }

    /// Create the session if needed and mark it active. An existing transcript is left untouched.
    pub fn activate_persona(&self, key: &str, system_prompt: &str) -> String {
        let key = normalize_key(key);
        self.sessions
            .entry(key.clone())
            .or_insert_with(|| vec![Turn::system(system_prompt)]);
        self.set_active(&key);
        key
    }

    /// Replace the transcript with a single system turn and mark it active
    pub fn reset_conversation(&self, key: &str, system_prompt: &str) -> String {
        let key = normalize_key(key);
        self.sessions
            .insert(key.clone(), vec![Turn::system(system_prompt)]);
        self.set_active(&key);
        tracing::debug!("Conversation reset for persona '{}'", key);
        key
    }

    pub fn active_key(&self) -> Option<String> {
        self.active.lock().expect("active key mutex poisoned").clone()
    }

    fn set_active(&self, key: &str) {
        *self.active.lock().expect("active key mutex poisoned") = Some(key.to_string());
    }

    pub fn transcript(&self, key: &str) -> Option<Vec<Turn>> {
        self.sessions.get(key).map(|turns| turns.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.sessions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn state(&self, key: &str) -> SessionState {
        match self.sessions.get(key) {
            None => SessionState::NonExistent,
            Some(turns) => match turns.last() {
                Some(turn) if turn.role == Role::User => SessionState::AwaitingReply,
                _ => SessionState::Seeded,
            },
        }
    }

    /// Append a user turn. Returns false when no session exists for `key`.
    pub fn append_user(&self, key: &str, content: &str) -> bool {
        self.append(key, Turn::user(content))
    }

    /// Append an assistant turn. Returns false when no session exists for `key`.
    pub fn append_assistant(&self, key: &str, content: &str) -> bool {
        self.append(key, Turn::assistant(content))
    }

    fn append(&self, key: &str, turn: Turn) -> bool {
        match self.sessions.get_mut(key) {
            Some(mut turns) => {
                turns.push(turn);
                true
            }
            None => {
                tracing::warn!("No session for persona '{}', dropping {:?} turn", key, turn.role);
                false
            }
        }
    }

    /// Remove a trailing user turn whose reply never arrived
    pub fn pop_pending_user(&self, key: &str) -> Option<Turn> {
        let mut turns = self.sessions.get_mut(key)?;
        if turns.last().map(|turn| turn.role) == Some(Role::User) {
            turns.pop()
        } else {
            None
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
