//! Name generation for cats created by events.
//!
//! A name is a prefix plus a suffix. Kits, apprentices and leaders take
//! the suffix of their rank; everyone else draws one from the list.

use rand::Rng;

use crate::cat::Rank;

const PREFIXES: &[&str] = &[
    "Ash", "Bramble", "Briar", "Cedar", "Cinder", "Cloud", "Dawn", "Dusk", "Ember", "Fern",
    "Finch", "Flint", "Frost", "Hawk", "Hazel", "Holly", "Jay", "Juniper", "Lark", "Leaf",
    "Lichen", "Mist", "Moss", "Moth", "Nettle", "Oak", "Pebble", "Pine", "Poppy", "Rain",
    "Reed", "Rowan", "Sage", "Sedge", "Shade", "Sloe", "Sorrel", "Sparrow", "Storm", "Thistle",
    "Thorn", "Wren", "Willow", "Yarrow",
];

const SUFFIXES: &[&str] = &[
    "fur", "pelt", "tail", "claw", "whisker", "heart", "stripe", "leaf", "fall", "storm",
    "breeze", "fang", "foot", "nose", "shade", "song", "step", "wing", "cloud", "frost",
];

/// Generates an id for the `seq`th cat created in a clan.
pub fn generate_cat_id(seq: u32) -> String {
    format!("cat_{:04}", seq)
}

/// Generates a full name appropriate for `rank`.
pub fn generate_name<R: Rng>(rank: Rank, rng: &mut R) -> String {
    let prefix = PREFIXES[rng.gen_range(0..PREFIXES.len())];
    let suffix = match rank {
        Rank::Newborn | Rank::Kitten => "kit",
        r if r.is_apprentice() => "paw",
        Rank::Leader => "star",
        _ => SUFFIXES[rng.gen_range(0..SUFFIXES.len())],
    };
    format!("{}{}", prefix, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_rank_suffixes() {
        let mut rng = SmallRng::seed_from_u64(7);
        assert!(generate_name(Rank::Kitten, &mut rng).ends_with("kit"));
        assert!(generate_name(Rank::MediatorApprentice, &mut rng).ends_with("paw"));
        assert!(generate_name(Rank::Leader, &mut rng).ends_with("star"));

        let warrior = generate_name(Rank::Warrior, &mut rng);
        assert!(SUFFIXES.iter().any(|s| warrior.ends_with(s)));
    }

    #[test]
    fn test_deterministic_with_seed() {
        let mut a = SmallRng::seed_from_u64(42);
        let mut b = SmallRng::seed_from_u64(42);
        assert_eq!(
            generate_name(Rank::Warrior, &mut a),
            generate_name(Rank::Warrior, &mut b)
        );
    }

    #[test]
    fn test_cat_id_format() {
        assert_eq!(generate_cat_id(12), "cat_0012");
    }
}
