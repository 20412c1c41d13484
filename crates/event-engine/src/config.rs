//! Configuration loading for the event engine.
//!
//! All tunable constants are loaded from a TOML configuration file. Every
//! section falls back to defaults, so a file only needs the keys it changes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use clan_state::GameMode;

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Success chance model
    #[serde(default)]
    pub outcome: OutcomeConfig,
    /// Weighted selection settings
    #[serde(default)]
    pub selection: SelectionConfig,
    /// Specificity bonuses added to template weights
    #[serde(default)]
    pub weights: WeightConfig,
    /// Eligibility filter thresholds
    #[serde(default)]
    pub filter: FilterConfig,
    /// Romance preemption gate
    #[serde(default)]
    pub romance: RomanceConfig,
    /// Effect magnitudes
    #[serde(default)]
    pub effects: EffectsConfig,
    /// Death reaction settings
    #[serde(default)]
    pub reactions: ReactionConfig,
}

impl EngineConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Serializes this configuration as a TOML string.
    pub fn to_toml(&self) -> Result<String, TomlSerializeError> {
        toml::to_string_pretty(self).map_err(TomlSerializeError)
    }
}

/// Per game mode difficulty divisors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyConfig {
    pub classic: f32,
    pub expanded: f32,
    pub cruel_season: f32,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            classic: 1.0,
            expanded: 2.5,
            cruel_season: 3.0,
        }
    }
}

/// Success chance model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutcomeConfig {
    pub difficulty: DifficultyConfig,
    /// Added per success stat hit
    pub win_stat_modifier: f32,
    /// Subtracted per failure stat hit
    pub fail_stat_modifier: f32,
    /// Cap applied after the experience term, before stat modifiers
    pub pre_stat_cap: f32,
    /// Cap on the final chance
    pub final_cap: f32,
    /// The roll is drawn from `0..roll_range`
    pub roll_range: u32,
    /// Chance used when a template declares none
    pub default_success_chance: f32,
}

impl Default for OutcomeConfig {
    fn default() -> Self {
        Self {
            difficulty: DifficultyConfig::default(),
            win_stat_modifier: 10.0,
            fail_stat_modifier: 20.0,
            pre_stat_cap: 90.0,
            final_cap: 115.0,
            roll_range: 120,
            default_success_chance: 50.0,
        }
    }
}

impl OutcomeConfig {
    pub fn difficulty_for(&self, mode: GameMode) -> f32 {
        let value = match mode {
            GameMode::Classic => self.difficulty.classic,
            GameMode::Expanded => self.difficulty.expanded,
            GameMode::CruelSeason => self.difficulty.cruel_season,
        };
        value.max(f32::EPSILON)
    }
}

/// Weighted selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Weight for templates that declare none
    pub default_weight: u32,
    /// Skip events already fired this session
    pub repeat_avoidance: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            default_weight: 20,
            repeat_avoidance: true,
        }
    }
}

/// Bonuses that make narrowly scoped templates compete with generic ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightConfig {
    pub location: u32,
    pub season: u32,
    pub camp: u32,
    /// Per declared role-constraint field
    pub role_field: u32,
    /// Per group relationship constraint
    pub relationship: u32,
    /// Per rank-count bound
    pub rank_count: u32,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            location: 5,
            season: 5,
            camp: 2,
            role_field: 1,
            relationship: 2,
            rank_count: 1,
        }
    }
}

/// Eligibility filter thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Tags held back until the clan is old enough
    pub high_drama_tags: Vec<String>,
    pub min_clan_age_high_drama: u32,
    /// Age at which old-age deaths become possible
    pub old_age_start_moons: u32,
    /// Chance (percent) to skip a non-old-age death for a cat past that age
    pub old_age_skip_percent: u32,
    /// Events taking every life of a leader pass one time in this many
    pub all_lives_one_in: u32,
    pub min_clan_age_for_supply_events: u32,
    pub freshkill_per_cat: f32,
    pub herbs_per_cat: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            high_drama_tags: vec![
                "murder".to_string(),
                "war".to_string(),
                "disaster".to_string(),
                "clan_wide".to_string(),
            ],
            min_clan_age_high_drama: 10,
            old_age_start_moons: 150,
            old_age_skip_percent: 75,
            all_lives_one_in: 10,
            min_clan_age_for_supply_events: 5,
            freshkill_per_cat: 3.0,
            herbs_per_cat: 1.0,
        }
    }
}

/// Romance preemption gate. Odds are "one in N"; lower N is likelier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RomanceConfig {
    pub base_odds: i32,
    /// Subtracted for compatible or mated pairs, added otherwise
    pub compatible_adjust: i32,
    /// Axis value above which an axis counts
    pub affinity_threshold: u8,
    /// Subtracted per positive axis over the threshold
    pub positive_step: i32,
    /// Added per negative axis over the threshold
    pub negative_step: i32,
}

impl Default for RomanceConfig {
    fn default() -> Self {
        Self {
            base_odds: 16,
            compatible_adjust: 10,
            affinity_threshold: 20,
            positive_step: 1,
            negative_step: 2,
        }
    }
}

/// Effect magnitudes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsConfig {
    /// Moons an inflicted injury lasts
    pub injury_moons: u32,
    /// Pool name -> injuries drawn from it
    pub injury_pools: BTreeMap<String, Vec<String>>,
    /// Prey size -> fresh-kill per patrol cat
    pub prey_amounts: BTreeMap<String, f32>,
    /// Herbs gathered per patrol cat
    pub herb_amount_per_cat: u32,
    /// Percent of the clan reached by `some_clan` relationship effects
    pub some_clan_percent: u32,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        let mut injury_pools = BTreeMap::new();
        injury_pools.insert(
            "battle_injury".to_string(),
            vec!["claw-wound".to_string(), "bite-wound".to_string(), "mangled leg".to_string()],
        );
        injury_pools.insert(
            "minor_injury".to_string(),
            vec!["sprain".to_string(), "bruises".to_string(), "scrapes".to_string()],
        );
        injury_pools.insert(
            "blunt_force_injury".to_string(),
            vec!["broken bone".to_string(), "head damage".to_string()],
        );

        let prey_amounts = [
            ("very_small", 1.0),
            ("small", 2.0),
            ("medium", 3.0),
            ("large", 4.0),
            ("huge", 5.0),
        ]
        .iter()
        .map(|(size, amount)| (size.to_string(), *amount))
        .collect();

        Self {
            injury_moons: 3,
            injury_pools,
            prey_amounts,
            herb_amount_per_cat: 1,
            some_clan_percent: 50,
        }
    }
}

/// Death reaction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactionConfig {
    /// Any axis at or above this towards the deceased triggers a reaction
    pub threshold: u8,
    pub max_reactions: usize,
}

impl Default for ReactionConfig {
    fn default() -> Self {
        Self {
            threshold: 30,
            max_reactions: 3,
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Error that can occur during TOML serialization.
#[derive(Debug, Error)]
#[error("TOML serialize error: {0}")]
pub struct TomlSerializeError(#[source] pub toml::ser::Error);

/// Generates a default configuration file content.
pub fn default_config_toml() -> String {
    r#"# Event Engine Configuration

[outcome]
win_stat_modifier = 10.0
fail_stat_modifier = 20.0
pre_stat_cap = 90.0
final_cap = 115.0
roll_range = 120
default_success_chance = 50.0

[outcome.difficulty]
classic = 1.0
expanded = 2.5
cruel_season = 3.0

[selection]
default_weight = 20
repeat_avoidance = true

[weights]
location = 5
season = 5
camp = 2
role_field = 1
relationship = 2
rank_count = 1

[filter]
high_drama_tags = ["murder", "war", "disaster", "clan_wide"]
min_clan_age_high_drama = 10
old_age_start_moons = 150
old_age_skip_percent = 75
all_lives_one_in = 10
min_clan_age_for_supply_events = 5
freshkill_per_cat = 3.0
herbs_per_cat = 1.0

[romance]
base_odds = 16
compatible_adjust = 10
affinity_threshold = 20
positive_step = 1
negative_step = 2

[effects]
injury_moons = 3
herb_amount_per_cat = 1
some_clan_percent = 50

[effects.injury_pools]
battle_injury = ["claw-wound", "bite-wound", "mangled leg"]
minor_injury = ["sprain", "bruises", "scrapes"]
blunt_force_injury = ["broken bone", "head damage"]

[effects.prey_amounts]
very_small = 1.0
small = 2.0
medium = 3.0
large = 4.0
huge = 5.0

[reactions]
threshold = 30
max_reactions = 3
"#
    .to_string()
}
