//! History records.
//!
//! Plain serializable entries written by event effects. The clan keeps a
//! chronological log; each cat keeps its own death, scar and life records
//! plus "possible" histories registered ahead of a death that may follow.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cat::CatId;

/// Kind of history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    /// The cat took part in an event
    Event,
    Death,
    LostLife,
    Scar,
    Injury,
    Lost,
    NewCat,
}

/// One line of history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Clan age in moons when this happened
    pub moon: u32,
    pub event_id: String,
    pub cat: CatId,
    pub kind: HistoryKind,
    pub text: String,
    /// Other cat involved (killer, rescuer, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub involved: Option<CatId>,
}

impl HistoryEntry {
    pub fn new(
        moon: u32,
        event_id: impl Into<String>,
        cat: CatId,
        kind: HistoryKind,
        text: impl Into<String>,
    ) -> Self {
        Self {
            moon,
            event_id: event_id.into(),
            cat,
            kind,
            text: text.into(),
            involved: None,
        }
    }

    pub fn with_involved(mut self, involved: Option<CatId>) -> Self {
        self.involved = involved;
        self
    }
}

/// Death and scar text registered when a condition was inflicted, used if
/// that condition later kills or scars the cat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PossibleHistory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub death_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scar_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub involved: Option<CatId>,
    pub moon: u32,
}

/// A cat's personal history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatHistory {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub died_by: Vec<HistoryEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lost_lives: Vec<HistoryEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scars: Vec<HistoryEntry>,
    /// Condition name -> pre-registered text
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub possible: BTreeMap<String, PossibleHistory>,
    /// Ids of events this cat took part in
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<String>,
}

impl CatHistory {
    /// Registers text for a condition, replacing any earlier registration.
    pub fn register_possible(&mut self, condition: impl Into<String>, possible: PossibleHistory) {
        self.possible.insert(condition.into(), possible);
    }

    /// Removes and returns the registration for a condition.
    pub fn take_possible(&mut self, condition: &str) -> Option<PossibleHistory> {
        self.possible.remove(condition)
    }

    pub fn record(&mut self, entry: HistoryEntry) {
        match entry.kind {
            HistoryKind::Death => self.died_by.push(entry),
            HistoryKind::LostLife => self.lost_lives.push(entry),
            HistoryKind::Scar => self.scars.push(entry),
            _ => {
                if !self.events.contains(&entry.event_id) {
                    self.events.push(entry.event_id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_possible_history_is_consumed() {
        let mut history = CatHistory::default();
        history.register_possible(
            "claw-wound",
            PossibleHistory {
                death_text: Some("m_c died of an infected claw wound.".to_string()),
                scar_text: None,
                involved: None,
                moon: 4,
            },
        );

        let taken = history.take_possible("claw-wound").unwrap();
        assert!(taken.death_text.unwrap().contains("claw wound"));
        assert!(history.take_possible("claw-wound").is_none());
    }

    #[test]
    fn test_record_routes_by_kind() {
        let mut history = CatHistory::default();
        let cat = CatId::from("c1");
        history.record(HistoryEntry::new(3, "evt_a", cat.clone(), HistoryKind::Death, "fell"));
        history.record(HistoryEntry::new(3, "evt_b", cat.clone(), HistoryKind::Event, "hunted"));
        history.record(HistoryEntry::new(3, "evt_b", cat, HistoryKind::Injury, "sprained"));

        assert_eq!(history.died_by.len(), 1);
        assert_eq!(history.events, vec!["evt_b".to_string()]);
    }
}
