//! Transcript types
//!
//! Defines role-tagged conversation turns.

use serde::{Deserialize, Serialize};

/// Role of a transcript turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Persona instructions, always the first turn
    System,
    /// Message from the student
    User,
    /// Reply generated by the model
    Assistant,
}

impl Role {
    /// Literal delimiter the backing model was tuned on
    pub fn marker(self) -> &'static str {
        match self {
            Role::System => "<|system|>",
            Role::User => "<|user|>",
            Role::Assistant => "<|assistant|>",
        }
    }

    /// All role markers, used as the stop list of a completion request
    pub fn all_markers() -> [&'static str; 3] {
        [
            Role::User.marker(),
            Role::System.marker(),
            Role::Assistant.marker(),
        ]
    }
}

/// A single transcript turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Seconds since the Unix epoch
    pub timestamp: u64,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_creation() {
        let turn = Turn::user("What does the system need to do?");
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.content, "What does the system need to do?");
        assert!(turn.timestamp > 0);
    }

    #[test]
    fn test_stop_markers() {
        assert_eq!(
            Role::all_markers(),
            ["<|user|>", "<|system|>", "<|assistant|>"]
        );
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
