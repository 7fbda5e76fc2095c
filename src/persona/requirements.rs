//! Requirements notebook
//!
//! Draft requirements the user writes while interviewing stakeholders, kept per
//! scenario. The notebook can be turned into a review request for the senior
//! engineer or exported as plain text.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Local};
use dashmap::DashMap;
use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequirementKind {
    Functional,
    NonFunctional,
}

impl fmt::Display for RequirementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequirementKind::Functional => write!(f, "Functional"),
            RequirementKind::NonFunctional => write!(f, "Non-Functional"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown requirement type '{0}', expected functional or non-functional")]
pub struct UnknownKind(pub String);

impl FromStr for RequirementKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "functional" | "f" => Ok(RequirementKind::Functional),
            "non-functional" | "nonfunctional" | "nf" => Ok(RequirementKind::NonFunctional),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRequirement {
    pub kind: RequirementKind,
    pub description: String,
}

/// Drafted requirements keyed by scenario name
#[derive(Debug, Default)]
pub struct RequirementsNotebook {
    drafts: DashMap<String, Vec<DraftRequirement>>,
}

impl RequirementsNotebook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a draft; blank descriptions are ignored
    pub fn add(&self, scenario: &str, kind: RequirementKind, description: &str) -> bool {
        let description = description.trim();
        if description.is_empty() {
            return false;
        }

        self.drafts
            .entry(scenario.to_string())
            .or_default()
            .push(DraftRequirement {
                kind,
                description: description.to_string(),
            });
        true
    }

    /// Remove the draft at `index` (0-based)
    pub fn remove(&self, scenario: &str, index: usize) -> Option<DraftRequirement> {
        let mut drafts = self.drafts.get_mut(scenario)?;
        (index < drafts.len()).then(|| drafts.remove(index))
    }

    pub fn list(&self, scenario: &str) -> Vec<DraftRequirement> {
        self.drafts
            .get(scenario)
            .map(|drafts| drafts.clone())
            .unwrap_or_default()
    }

    /// Chat message asking for a review of every draft, `None` when there are none
    pub fn review_message(&self, scenario: &str) -> Option<String> {
        let drafts = self.list(scenario);
        if drafts.is_empty() {
            return None;
        }

        let mut message = String::from("Here are my requirements:");
        for draft in &drafts {
            message.push_str(&format!("\r\n- [{}] {}", draft.kind, draft.description));
        }
        Some(message)
    }

    pub fn export_text(&self, scenario: &str, exported_at: DateTime<Local>) -> String {
        let mut lines = vec![
            format!("Scenario: {}", scenario),
            String::new(),
            "Requirements List".to_string(),
            "-".repeat(18),
        ];
        lines.extend(
            self.list(scenario)
                .iter()
                .map(|draft| format!("[{}] {}", draft.kind, draft.description)),
        );
        lines.push(String::new());
        lines.push(format!(
            "Exported on {}",
            exported_at.format("%Y-%m-%d %H:%M:%S")
        ));

        lines.join("\n")
    }

    pub fn export_to_file(&self, scenario: &str, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.export_text(scenario, Local::now()))?;
        tracing::info!("Exported requirements for '{}' to {:?}", scenario, path);
        Ok(())
    }
}
