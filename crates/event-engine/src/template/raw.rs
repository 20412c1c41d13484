//! Serde shapes of authored content files.
//!
//! These mirror the JSON exactly and carry no validation. Effect blocks
//! that may be individually malformed stay as [`serde_json::Value`] so a
//! bad block can be dropped without losing the rest of the template.

use serde::Deserialize;
use std::collections::BTreeMap;

/// One template as written in a content file.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTemplate {
    pub event_id: String,
    #[serde(default)]
    pub sub_type: Vec<String>,
    #[serde(default)]
    pub location: Vec<String>,
    #[serde(default)]
    pub season: Vec<String>,
    #[serde(default)]
    pub camp: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub weight: Option<i64>,
    #[serde(default)]
    pub min_cats: Option<usize>,
    #[serde(default)]
    pub max_cats: Option<usize>,
    /// Rank category -> [min, max]
    #[serde(default)]
    pub min_max_status: BTreeMap<String, (u32, u32)>,
    #[serde(default)]
    pub relationship_constraint: Vec<String>,
    #[serde(default)]
    pub m_c: Option<RawRoleConstraint>,
    #[serde(default)]
    pub r_c: Option<RawRoleConstraint>,
    #[serde(default)]
    pub outsider: Option<RawStanding>,
    #[serde(default)]
    pub other_clan: Option<RawStanding>,
    #[serde(default)]
    pub supplies: Vec<RawSupply>,
    #[serde(default)]
    pub chance_of_success: Option<f32>,
    #[serde(default)]
    pub intro_text: String,
    #[serde(default)]
    pub decline_text: String,
    #[serde(default)]
    pub success_outcomes: Vec<RawOutcome>,
    #[serde(default)]
    pub fail_outcomes: Vec<RawOutcome>,
    #[serde(default)]
    pub antag_success_outcomes: Vec<RawOutcome>,
    #[serde(default)]
    pub antag_fail_outcomes: Vec<RawOutcome>,
    #[serde(default)]
    pub future_event: Vec<RawFutureEvent>,
    /// Short events write their single outcome inline
    #[serde(flatten)]
    pub inline: RawOutcome,
}

/// Constraints on the cat filling `m_c` or `r_c`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRoleConstraint {
    #[serde(default)]
    pub age: Vec<String>,
    #[serde(default)]
    pub status: Vec<String>,
    #[serde(default)]
    pub skill: Vec<String>,
    #[serde(default)]
    pub not_skill: Vec<String>,
    #[serde(default, rename = "trait")]
    pub traits: Vec<String>,
    #[serde(default)]
    pub not_trait: Vec<String>,
    #[serde(default)]
    pub backstory: Vec<String>,
    #[serde(default)]
    pub relationship_status: Vec<String>,
    #[serde(default)]
    pub injury: Vec<String>,
    #[serde(default)]
    pub dies: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStanding {
    #[serde(default)]
    pub current_rep: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSupply {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub trigger: Vec<String>,
    #[serde(default)]
    pub adjust: Option<String>,
}

/// One outcome block, or the inline outcome of a short event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawOutcome {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub exp: u32,
    #[serde(default)]
    pub weight: Option<i64>,
    #[serde(default)]
    pub stat_skill: Vec<String>,
    #[serde(default)]
    pub stat_trait: Vec<String>,
    #[serde(default)]
    pub can_have_stat: Vec<String>,
    #[serde(default)]
    pub dead_cats: Vec<String>,
    #[serde(default)]
    pub lost_cats: Vec<String>,
    #[serde(default)]
    pub all_lives: bool,
    #[serde(default)]
    pub death_cause: Option<String>,
    #[serde(default)]
    pub injury: Vec<serde_json::Value>,
    #[serde(default)]
    pub history_text: Option<RawHistoryText>,
    #[serde(default)]
    pub relationships: Vec<serde_json::Value>,
    #[serde(default)]
    pub outsider_rep: i32,
    #[serde(default)]
    pub other_clan_rep: i32,
    #[serde(default)]
    pub prey: Vec<String>,
    #[serde(default)]
    pub herbs: Vec<String>,
    #[serde(default)]
    pub supplies: Vec<RawSupply>,
    #[serde(default)]
    pub new_accessory: Vec<String>,
    #[serde(default)]
    pub gender_change: Vec<String>,
    #[serde(default)]
    pub new_cat: Vec<RawNewCat>,
    #[serde(default)]
    pub disaster: Option<RawDisaster>,
    #[serde(default)]
    pub future_event: Vec<RawFutureEvent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawHistoryText {
    #[serde(default)]
    pub reg_death: Option<String>,
    #[serde(default)]
    pub leader_death: Option<String>,
    #[serde(default)]
    pub scar: Option<String>,
    #[serde(default)]
    pub lost: Option<String>,
}

/// Injury block; every field but `scars` is required.
#[derive(Debug, Clone, Deserialize)]
pub struct RawInjury {
    pub cats: Vec<String>,
    pub injuries: Vec<String>,
    #[serde(default)]
    pub scars: Vec<String>,
}

/// Relationship block; every field but `mutual` is required.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRelationship {
    pub cats_from: Vec<String>,
    pub cats_to: Vec<String>,
    pub values: Vec<String>,
    pub amount: i32,
    #[serde(default)]
    pub mutual: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNewCat {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rank: Option<String>,
    #[serde(default)]
    pub age: Option<String>,
    #[serde(default)]
    pub moons: Option<u32>,
    #[serde(default)]
    pub backstory: Option<String>,
    #[serde(default)]
    pub pronouns: Option<String>,
    /// Role whose cat becomes the new cat's parent
    #[serde(default)]
    pub parent: Option<String>,
    /// Role whose cat becomes the new cat's mate
    #[serde(default)]
    pub mate: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawDisaster {
    pub name: String,
    #[serde(default = "default_disaster_duration")]
    pub duration: (u32, u32),
}

fn default_disaster_duration() -> (u32, u32) {
    (1, 3)
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawFutureEvent {
    pub event_type: String,
    #[serde(default)]
    pub pool: RawFuturePool,
    #[serde(default = "default_moon_delay")]
    pub moon_delay: (u32, u32),
    /// Future role -> current role
    #[serde(default)]
    pub involved_cats: BTreeMap<String, String>,
}

fn default_moon_delay() -> (u32, u32) {
    (1, 1)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFuturePool {
    #[serde(default)]
    pub subtype: Vec<String>,
    #[serde(default)]
    pub event_id: Vec<String>,
}
