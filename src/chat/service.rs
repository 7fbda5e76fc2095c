//! Chat service
//!
//! Owned entry point for persona conversations: activates personas, serializes
//! generation requests through the gate and relays streamed fragments.

use std::sync::Arc;

use thiserror::Error;

use crate::chat::gate::GenerationGate;
use crate::chat::relay::LiveReplyRelay;
use crate::inference::CompletionClient;
use crate::session::{normalize_key, SessionStore, FALLBACK_SYSTEM_PROMPT};
use crate::storage::settings::AppSettings;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Another generation is in flight; nothing was changed
    #[error("LLM is busy, please wait")]
    Busy,
}

pub struct ChatService {
    sessions: Arc<SessionStore>,
    client: CompletionClient,
    gate: GenerationGate,
    relay: LiveReplyRelay,
}

impl ChatService {
    pub fn new(settings: &AppSettings) -> Self {
        let sessions = Arc::new(SessionStore::new());
        Self {
            client: CompletionClient::new(settings, Arc::clone(&sessions)),
            sessions,
            gate: GenerationGate::new(),
            relay: LiveReplyRelay::new(),
        }
    }

    pub fn activate_persona(&self, key: &str, system_prompt: &str) -> String {
        self.sessions.activate_persona(key, system_prompt)
    }

    /// Restart a persona's conversation. Rejected while a reply is being generated.
    pub fn reset_conversation(&self, key: &str, system_prompt: &str) -> Result<String, ChatError> {
        let _guard = self.gate.try_acquire().ok_or(ChatError::Busy)?;
        Ok(self.sessions.reset_conversation(key, system_prompt))
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn relay(&self) -> &LiveReplyRelay {
        &self.relay
    }

    pub fn gate(&self) -> &GenerationGate {
        &self.gate
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    /// Send `question` to the persona at `key`, streaming fragments into the relay.
    ///
    /// Fails with [`ChatError::Busy`] without side effects while another request
    /// runs. Transport failures are returned as an `Error: ...` reply.
    pub async fn send_message(&self, key: &str, question: &str) -> Result<String, ChatError> {
        let _guard = self.gate.try_acquire().ok_or(ChatError::Busy)?;

        let key = normalize_key(key);
        self.sessions.activate_persona(&key, FALLBACK_SYSTEM_PROMPT);
        self.relay.clear(&key);

        tracing::debug!("Generating reply for persona '{}'", key);
        let relay = &self.relay;
        let reply = self
            .client
            .chat(question, |fragment| relay.append(&key, fragment))
            .await;
        relay.finish(&key);

        Ok(reply)
    }
}
