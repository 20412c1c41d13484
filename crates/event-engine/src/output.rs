//! What the engine hands back to the host.
//!
//! Every engine call ends in an [`EventReport`]. Patrols stop halfway with a
//! [`PendingPatrol`] so the player can choose how to proceed.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use clan_state::{CatId, EventFamily};

use crate::effects::EffectSummary;
use crate::participants::Bindings;
use crate::template::EventTemplate;

/// Stages an event moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Candidate,
    FilteredEligible,
    Selected,
    ParticipantsResolved,
    OutcomeDetermined,
    EffectsApplied,
    FutureScheduled,
    /// Terminal: the patrol was turned down before any outcome
    Declined,
}

impl Lifecycle {
    pub fn as_str(self) -> &'static str {
        match self {
            Lifecycle::Candidate => "candidate",
            Lifecycle::FilteredEligible => "filtered_eligible",
            Lifecycle::Selected => "selected",
            Lifecycle::ParticipantsResolved => "participants_resolved",
            Lifecycle::OutcomeDetermined => "outcome_determined",
            Lifecycle::EffectsApplied => "effects_applied",
            Lifecycle::FutureScheduled => "future_scheduled",
            Lifecycle::Declined => "declined",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Lifecycle::EffectsApplied | Lifecycle::FutureScheduled | Lifecycle::Declined
        )
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of one fired (or declined) event.
#[derive(Debug, Clone, Serialize)]
pub struct EventReport {
    pub event_id: String,
    pub family: EventFamily,
    /// Terminal state
    pub lifecycle: Lifecycle,
    /// Every state passed through, terminal state last
    pub trace: Vec<Lifecycle>,
    pub bindings: Bindings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_clan: Option<String>,
    /// `None` when declined
    pub success: Option<bool>,
    /// Final success chance, when a roll was made
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chance: Option<f32>,
    pub text: String,
    pub effects: EffectSummary,
}

impl EventReport {
    /// Cat bound to the primary role.
    pub fn primary(&self) -> Option<&CatId> {
        self.bindings.get(&clan_state::Role::Primary)
    }

    pub fn passed(&self, state: Lifecycle) -> bool {
        self.trace.contains(&state)
    }

    /// Serializes the report for logs or a debug overlay.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Who goes on a patrol and what kind of patrol it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatrolRequest {
    pub group: Vec<CatId>,
    pub sub_types: Vec<String>,
}

impl PatrolRequest {
    pub fn new(group: Vec<CatId>) -> Self {
        Self {
            group,
            sub_types: Vec::new(),
        }
    }

    pub fn with_sub_type(mut self, sub_type: impl Into<String>) -> Self {
        self.sub_types.push(sub_type.into());
        self
    }
}

/// The player's answer to a patrol's intro.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatrolAction {
    Proceed,
    /// Use the antagonize outcome pools when the template has them
    Antagonize,
    Decline,
}

/// A patrol that has been selected and bound but not yet resolved.
#[derive(Debug, Clone)]
pub struct PendingPatrol {
    pub(crate) template: Arc<EventTemplate>,
    pub(crate) bindings: Bindings,
    pub(crate) group: Vec<CatId>,
    pub(crate) other_clan: Option<String>,
    pub(crate) intro: String,
    pub(crate) trace: Vec<Lifecycle>,
}

impl PendingPatrol {
    pub fn event_id(&self) -> &str {
        &self.template.id
    }

    pub fn intro_text(&self) -> &str {
        &self.intro
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn group(&self) -> &[CatId] {
        &self.group
    }

    pub fn other_clan(&self) -> Option<&str> {
        self.other_clan.as_deref()
    }

    /// Whether the template authored antagonize outcomes.
    pub fn can_antagonize(&self) -> bool {
        !self.template.antag_success.is_empty()
    }

    pub fn is_romance(&self) -> bool {
        self.template.is_romance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_order() {
        assert!(Lifecycle::Candidate < Lifecycle::Selected);
        assert!(Lifecycle::OutcomeDetermined < Lifecycle::EffectsApplied);
        assert!(Lifecycle::Declined.is_terminal());
        assert!(!Lifecycle::ParticipantsResolved.is_terminal());
    }

    #[test]
    fn test_report_serializes_role_tokens() {
        let mut bindings = Bindings::new();
        bindings.insert(clan_state::Role::Primary, CatId::from("c1"));
        let report = EventReport {
            event_id: "gen_hunt".to_string(),
            family: EventFamily::Patrol,
            lifecycle: Lifecycle::EffectsApplied,
            trace: vec![Lifecycle::Selected, Lifecycle::EffectsApplied],
            bindings,
            other_clan: None,
            success: Some(true),
            chance: Some(62.5),
            text: "Firestar catches a mouse.".to_string(),
            effects: EffectSummary::default(),
        };

        let json = report.to_json().unwrap();
        assert!(json.contains(r#""m_c": "c1""#));
        assert!(json.contains(r#""lifecycle": "effects_applied""#));
        assert!(!json.contains("other_clan"));
        assert_eq!(report.primary(), Some(&CatId::from("c1")));
    }
}
