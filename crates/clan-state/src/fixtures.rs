//! Sample data fixtures for testing.
//!
//! This module provides a ready-made clan for other crates to use.
//! Enable the `test-fixtures` feature to access these helpers.
//!
//! # Example
//!
//! ```ignore
//! // In your Cargo.toml:
//! // [dev-dependencies]
//! // clan-state = { path = "../clan-state", features = ["test-fixtures"] }
//!
//! use clan_state::fixtures;
//!
//! let clan = fixtures::sample_clan();
//! let leader = fixtures::sample_cat("c1");
//! ```

use crate::{Cat, CatId, Clan};

/// Returns the sample clan from the fixtures file.
///
/// Contains 8 cats in a forest clan, 24 moons old, during greenleaf:
/// - Firestar (leader, 9 lives, bold hunter)
/// - Graystripe (deputy) and Silverstream (warrior), mates
/// - Sandstorm (warrior), mentor of Ashpaw
/// - Ashpaw (apprentice) and Brackenkit (kitten), children of the mates
/// - Cinderpelt (medicine cat) and Mousefur (elder)
pub fn sample_clan() -> Clan {
    let json = include_str!("../tests/fixtures/sample_clan.json");
    serde_json::from_str(json).expect("Failed to parse sample_clan.json")
}

/// Returns a specific cat by ID from the sample clan.
pub fn sample_cat(id: &str) -> Cat {
    sample_clan()
        .cats
        .remove(&CatId::from(id))
        .unwrap_or_else(|| panic!("Cat {} should exist in fixtures", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Rank, RelationshipAxis};

    #[test]
    fn test_sample_clan_loads() {
        let clan = sample_clan();
        assert_eq!(clan.cats.len(), 8);
        assert_eq!(clan.active_count(), 8);
        assert_eq!(clan.other_clans.len(), 2);
    }

    #[test]
    fn test_sample_cat_helper() {
        let leader = sample_cat("c1");
        assert_eq!(leader.rank, Rank::Leader);
        assert_eq!(leader.lives, 9);
        assert_eq!(leader.trait_name(), "bold");
    }

    #[test]
    fn test_fixture_ties_are_consistent() {
        let clan = sample_clan();
        let gray = clan.cat(&CatId::from("c2")).unwrap();
        let silver = clan.cat(&CatId::from("c3")).unwrap();
        let ash = clan.cat(&CatId::from("c5")).unwrap();
        let sand = clan.cat(&CatId::from("c4")).unwrap();

        assert!(gray.is_mate_of(silver) && silver.is_mate_of(gray));
        assert!(gray.is_parent_of(ash));
        assert!(sand.is_mentor_of(ash));
        assert_eq!(
            clan.relationships
                .value(&gray.id, &silver.id, RelationshipAxis::Romantic),
            70
        );
    }
}
