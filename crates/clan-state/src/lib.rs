//! Shared clan state for the event engine.
//!
//! This crate contains pure data structures with no engine logic: the
//! clan snapshot, its cats and relationships, history records, and the
//! future-event and used-event records persisted between sessions.

pub mod cat;
pub mod clan;
pub mod error;
pub mod future;
pub mod history;
pub mod names;
pub mod relationship;
pub mod role;
pub mod season;
pub mod supplies;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

// Re-export cat types
pub use cat::{
    AgeBracket, Cat, CatId, CatState, Personality, Pronouns, Rank, RankCategory, Skill, SkillPath,
    SkillRequirement, SkillSet,
};

// Re-export clan types
pub use clan::{
    ActiveDisaster, Clan, ClanStanding, OtherClan, OutsiderStanding, War, MAX_CLAN_RELATION,
    MAX_REPUTATION,
};

pub use error::ParseError;
pub use future::{FutureEvent, FuturePool, UsedEvents};
pub use history::{CatHistory, HistoryEntry, HistoryKind, PossibleHistory};
pub use names::{generate_cat_id, generate_name};
pub use relationship::{Relationship, RelationshipAxis, RelationshipGraph, MAX_AXIS_VALUE};
pub use role::{EventFamily, Role, MAX_APPRENTICE_SLOTS};
pub use season::{Biome, GameMode, Season, MOONS_PER_SEASON};
pub use supplies::{Supplies, SupplyLevel};
