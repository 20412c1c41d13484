//! Weighted selection and the romance preemption gate.

use rand::Rng;

use clan_state::{Cat, Clan, RelationshipAxis};

use crate::config::RomanceConfig;

/// Picks an index with probability proportional to its weight.
///
/// Returns `None` for an empty slice or when every weight is zero.
pub fn weighted_index<R: Rng>(rng: &mut R, weights: &[u32]) -> Option<usize> {
    let total: u64 = weights.iter().map(|w| *w as u64).sum();
    if total == 0 {
        return None;
    }

    // Roll in [0, total) and walk down the list
    let mut roll = rng.gen_range(0..total);
    for (index, weight) in weights.iter().enumerate() {
        let weight = *weight as u64;
        if roll < weight {
            return Some(index);
        }
        roll -= weight;
    }

    // Unreachable with a roll below the total
    weights.iter().rposition(|w| *w > 0)
}

/// Weighted choice over arbitrary items.
pub fn choose_weighted<'a, T, R, F>(rng: &mut R, items: &'a [T], weight: F) -> Option<&'a T>
where
    R: Rng,
    F: Fn(&T) -> u32,
{
    let weights: Vec<u32> = items.iter().map(weight).collect();
    weighted_index(rng, &weights).map(|i| &items[i])
}

/// Romance preemption odds for a pair, as "one in N".
///
/// Lower N means the romance candidate is likelier to preempt. Compatible
/// or mated pairs start lower; every positive axis over the threshold
/// (in either direction) nudges N down, every negative one nudges it up.
pub fn romance_odds(a: &Cat, b: &Cat, clan: &Clan, config: &RomanceConfig) -> i32 {
    let mut odds = config.base_odds;

    if a.is_mate_of(b) || b.is_mate_of(a) || a.personality.is_compatible(&b.personality) {
        odds -= config.compatible_adjust;
    } else {
        odds += config.compatible_adjust;
    }

    let edges = [
        clan.relationships.get(&a.id, &b.id),
        clan.relationships.get(&b.id, &a.id),
    ];
    for relationship in edges.iter().flatten() {
        for axis in RelationshipAxis::all() {
            if relationship.get(*axis) <= config.affinity_threshold {
                continue;
            }
            if axis.is_negative() {
                odds += config.negative_step;
            } else {
                odds -= config.positive_step;
            }
        }
    }

    odds.max(1)
}

/// Draws against "one in `odds`".
pub fn romance_preempts<R: Rng>(rng: &mut R, odds: i32) -> bool {
    let odds = odds.max(1) as u32;
    rng.gen_range(0..odds) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use clan_state::fixtures::sample_clan;
    use clan_state::{CatId, Personality};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_weighted_index_ratio() {
        let mut rng = SmallRng::seed_from_u64(12345);
        let weights = [10, 90];

        let mut counts = [0u32; 2];
        for _ in 0..10_000 {
            counts[weighted_index(&mut rng, &weights).unwrap()] += 1;
        }

        // Expect ~1000 vs ~9000
        assert!(counts[0] > 800 && counts[0] < 1200, "got {:?}", counts);
    }

    #[test]
    fn test_weighted_index_degenerate() {
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(weighted_index(&mut rng, &[]), None);
        assert_eq!(weighted_index(&mut rng, &[0, 0]), None);
        assert_eq!(weighted_index(&mut rng, &[0, 5, 0]), Some(1));
    }

    #[test]
    fn test_mated_pair_has_lower_odds() {
        let clan = sample_clan();
        let config = RomanceConfig::default();
        let gray = clan.cat(&CatId::from("c2")).unwrap();
        let silver = clan.cat(&CatId::from("c3")).unwrap();

        // Clashing personality so only the mate tie differs
        let cold = Personality::new("cold").with_facets(0, 0, 16, 0);
        let mut mated_gray = gray.clone();
        mated_gray.personality = cold.clone();
        let mut unmated_gray = mated_gray.clone();
        unmated_gray.mates.clear();
        let mut unmated_silver = silver.clone();
        unmated_silver.mates.clear();

        let mated = romance_odds(&mated_gray, silver, &clan, &config);
        let unmated = romance_odds(&unmated_gray, &unmated_silver, &clan, &config);
        assert!(mated < unmated, "mated {} vs unmated {}", mated, unmated);
    }

    #[test]
    fn test_odds_never_below_one() {
        let mut clan = sample_clan();
        let a = CatId::from("c2");
        let b = CatId::from("c3");
        for axis in [
            RelationshipAxis::Romantic,
            RelationshipAxis::Platonic,
            RelationshipAxis::Admiration,
            RelationshipAxis::Comfortable,
            RelationshipAxis::Trust,
        ] {
            clan.relationships.ensure(&a, &b).set(axis, 90);
            clan.relationships.ensure(&b, &a).set(axis, 90);
        }
        let config = RomanceConfig {
            base_odds: 2,
            ..RomanceConfig::default()
        };

        let odds = romance_odds(clan.cat(&a).unwrap(), clan.cat(&b).unwrap(), &clan, &config);
        assert_eq!(odds, 1);

        let mut rng = SmallRng::seed_from_u64(9);
        assert!((0..20).all(|_| romance_preempts(&mut rng, odds)));
    }

    #[test]
    fn test_negative_axes_raise_odds() {
        let mut clan = sample_clan();
        let config = RomanceConfig::default();
        let a = CatId::from("c4");
        let b = CatId::from("c6");
        let before = romance_odds(clan.cat(&a).unwrap(), clan.cat(&b).unwrap(), &clan, &config);

        clan.relationships.ensure(&a, &b).set(RelationshipAxis::Dislike, 60);
        clan.relationships.ensure(&a, &b).set(RelationshipAxis::Jealousy, 60);
        let after = romance_odds(clan.cat(&a).unwrap(), clan.cat(&b).unwrap(), &clan, &config);

        assert_eq!(after, before + 2 * config.negative_step);
    }
}
