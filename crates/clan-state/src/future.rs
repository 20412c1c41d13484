//! Delayed events and repeat-avoidance records.
//!
//! Both are plain records persisted with the clan between sessions.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::cat::CatId;
use crate::role::{EventFamily, Role};

/// Candidates a future event draws from when it fires.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuturePool {
    /// Requested sub-types; empty means "ignore sub-typing"
    #[serde(default)]
    pub sub_types: Vec<String>,
    /// Allowed event ids; empty means "any"
    #[serde(default)]
    pub event_ids: Vec<String>,
}

/// An event scheduled by an earlier outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FutureEvent {
    pub parent_event: String,
    pub family: EventFamily,
    #[serde(default)]
    pub pool: FuturePool,
    pub moons_remaining: u32,
    /// Bindings captured when the event was scheduled
    #[serde(default)]
    pub roles: BTreeMap<Role, CatId>,
}

impl FutureEvent {
    /// Counts down one moon. Returns true once the event is due.
    pub fn tick(&mut self) -> bool {
        self.moons_remaining = self.moons_remaining.saturating_sub(1);
        self.moons_remaining == 0
    }
}

/// Event ids already fired this play session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsedEvents {
    ids: BTreeSet<String>,
}

impl UsedEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.ids.contains(event_id)
    }

    /// Returns false if the id was already present.
    pub fn mark(&mut self, event_id: impl Into<String>) -> bool {
        self.ids.insert(event_id.into())
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.ids.iter()
    }
}
