//! Personas and scenarios
//!
//! Scenario and stakeholder records supplied by the scenario store, the persona
//! key derived from them, and the system prompts that set up each role-play.

pub mod prompts;
pub mod requirements;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use prompts::build_persona_system_prompt;

const NO_SCENARIO: &str = "(no-scenario)";
const NO_PERSONA: &str = "(no-persona)";

/// A simulated conversational participant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Stakeholder {
    pub name: String,
    pub role: String,
    pub personality: String,
}

impl Stakeholder {
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        personality: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            personality: personality.into(),
        }
    }

    fn is_complete(&self) -> bool {
        !self.name.trim().is_empty()
            && !self.role.trim().is_empty()
            && !self.personality.trim().is_empty()
    }
}

/// The reviewer persona present in every scenario
pub fn senior_software_engineer() -> Stakeholder {
    Stakeholder::new(
        "Alex Riemann",
        "Senior Software Engineer",
        "Experienced, professional and detailed-oriented",
    )
}

/// Whether `persona` is the built-in senior engineer (names compared case-insensitively)
pub fn is_senior_engineer(persona: &Stakeholder) -> bool {
    let sse = senior_software_engineer();
    let name = persona.name.trim();
    !name.is_empty() && name.eq_ignore_ascii_case(sse.name.trim())
}

/// A requirements-elicitation exercise
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    pub prompt: String,
    pub list_stakeholders: Vec<Stakeholder>,
    pub functional_requirements: Vec<String>,
    pub non_functional_requirements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScenarioError {
    #[error("Scenario name is incomplete")]
    MissingName,
    #[error("Scenario description is incomplete")]
    MissingDescription,
    #[error("One or more stakeholder details are incomplete")]
    IncompleteStakeholder,
    #[error("Scenario and stakeholder names must not contain '|'")]
    SeparatorInName,
}

impl Scenario {
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.name.trim().is_empty() {
            return Err(ScenarioError::MissingName);
        }
        if self.description.trim().is_empty() {
            return Err(ScenarioError::MissingDescription);
        }
        if !self.list_stakeholders.iter().all(Stakeholder::is_complete) {
            return Err(ScenarioError::IncompleteStakeholder);
        }
        if self.name.contains('|') || self.list_stakeholders.iter().any(|s| s.name.contains('|')) {
            return Err(ScenarioError::SeparatorInName);
        }
        Ok(())
    }
}

/// Session and relay lookup key for a (scenario, persona) pair.
///
/// Names are joined with `|` unescaped, so a `|` inside either name can make two
/// different pairs share a key, and a scenario literally named `(no-scenario)`
/// keys the same as a missing one. Scenario and stakeholder names must not
/// contain `|`.
pub fn persona_key(scenario: Option<&Scenario>, persona: Option<&Stakeholder>) -> String {
    format!(
        "{}|{}",
        scenario.map_or(NO_SCENARIO, |s| s.name.as_str()),
        persona.map_or(NO_PERSONA, |p| p.name.as_str())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(name: &str) -> Scenario {
        Scenario {
            name: name.to_string(),
            description: "A walk-in clinic wants online booking.".to_string(),
            list_stakeholders: vec![Stakeholder::new("Dana", "Receptionist", "Busy, friendly")],
            ..Scenario::default()
        }
    }

    #[test]
    fn test_persona_key_is_deterministic() {
        let s = scenario("Clinic");
        let p = Stakeholder::new("Dana", "Receptionist", "");
        assert_eq!(persona_key(Some(&s), Some(&p)), "Clinic|Dana");
        assert_eq!(
            persona_key(Some(&s), Some(&p)),
            persona_key(Some(&s.clone()), Some(&p.clone()))
        );
    }

    #[test]
    fn test_persona_key_changes_with_either_identity() {
        let clinic = scenario("Clinic");
        let library = scenario("Library");
        let dana = Stakeholder::new("Dana", "", "");
        let omar = Stakeholder::new("Omar", "", "");

        let base = persona_key(Some(&clinic), Some(&dana));
        assert_ne!(base, persona_key(Some(&library), Some(&dana)));
        assert_ne!(base, persona_key(Some(&clinic), Some(&omar)));
    }

    #[test]
    fn test_persona_key_sentinels() {
        let s = scenario("Clinic");
        assert_eq!(persona_key(None, None), "(no-scenario)|(no-persona)");
        assert_eq!(persona_key(Some(&s), None), "Clinic|(no-persona)");
        assert_eq!(
            persona_key(None, Some(&senior_software_engineer())),
            "(no-scenario)|Alex Riemann"
        );
    }

    #[test]
    fn test_persona_key_separator_is_not_escaped() {
        let a = Stakeholder::new("b|c", "", "");
        let b = Stakeholder::new("c", "", "");
        assert_eq!(
            persona_key(Some(&scenario("a")), Some(&a)),
            persona_key(Some(&scenario("a|b")), Some(&b))
        );
        assert_eq!(
            persona_key(Some(&scenario("(no-scenario)")), None),
            persona_key(None, None)
        );
    }

    #[test]
    fn test_scenario_validation() {
        assert_eq!(scenario("Clinic").validate(), Ok(()));
        assert_eq!(scenario("  ").validate(), Err(ScenarioError::MissingName));

        let mut s = scenario("Clinic");
        s.list_stakeholders.push(Stakeholder::new("Omar", "", "Calm"));
        assert_eq!(s.validate(), Err(ScenarioError::IncompleteStakeholder));

        assert_eq!(scenario("Clinic|East").validate(), Err(ScenarioError::SeparatorInName));
        let mut s = scenario("Clinic");
        s.list_stakeholders.push(Stakeholder::new("Omar|Haddad", "Owner", "Calm"));
        assert_eq!(s.validate(), Err(ScenarioError::SeparatorInName));
    }

    #[test]
    fn test_senior_engineer_detection() {
        assert!(is_senior_engineer(&senior_software_engineer()));
        assert!(is_senior_engineer(&Stakeholder::new(" alex riemann ", "", "")));
        assert!(!is_senior_engineer(&Stakeholder::new("Dana", "", "")));
    }

    #[test]
    fn test_scenario_json_uses_pascal_case() {
        let json = r#"{
            "Name": "Clinic",
            "Description": "Booking",
            "ListStakeholders": [{"Name": "Dana", "Role": "Receptionist", "Personality": "Busy"}],
            "FunctionalRequirements": ["Book online"]
        }"#;
        let s: Scenario = serde_json::from_str(json).unwrap();
        assert_eq!(s.list_stakeholders[0].role, "Receptionist");
        assert_eq!(s.functional_requirements, vec!["Book online"]);
        assert!(s.non_functional_requirements.is_empty());
    }
}
