//! Season, biome and game mode.
//!
//! The clan advances one moon per turn; seasons change every three moons.
//!
//! # Example
//!
//! ```
//! use clan_state::Season;
//!
//! let season: Season = "leaf-fall".parse().unwrap();
//! assert_eq!(season.next(), Season::LeafBare);
//! assert_eq!(season.to_string(), "leaf-fall");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Number of moons in each season.
pub const MOONS_PER_SEASON: u32 = 3;

/// Season of the year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Season {
    #[serde(rename = "newleaf")]
    Newleaf,
    #[serde(rename = "greenleaf")]
    Greenleaf,
    #[serde(rename = "leaf-fall")]
    LeafFall,
    #[serde(rename = "leaf-bare")]
    LeafBare,
}

impl Season {
    /// Returns the next season in order.
    pub fn next(self) -> Self {
        match self {
            Season::Newleaf => Season::Greenleaf,
            Season::Greenleaf => Season::LeafFall,
            Season::LeafFall => Season::LeafBare,
            Season::LeafBare => Season::Newleaf,
        }
    }

    /// Returns all seasons in calendar order.
    pub fn all() -> &'static [Season] {
        &[
            Season::Newleaf,
            Season::Greenleaf,
            Season::LeafFall,
            Season::LeafBare,
        ]
    }

    /// Name used in content file paths and templates.
    pub fn as_str(self) -> &'static str {
        match self {
            Season::Newleaf => "newleaf",
            Season::Greenleaf => "greenleaf",
            Season::LeafFall => "leaf-fall",
            Season::LeafBare => "leaf-bare",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Season {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(' ', "-").as_str() {
            "newleaf" => Ok(Season::Newleaf),
            "greenleaf" => Ok(Season::Greenleaf),
            "leaf-fall" | "leaffall" => Ok(Season::LeafFall),
            "leaf-bare" | "leafbare" => Ok(Season::LeafBare),
            _ => Err(ParseError::InvalidSeason(s.to_string())),
        }
    }
}

/// Territory type the clan lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Biome {
    Forest,
    Mountainous,
    Plains,
    Beach,
    Wetlands,
    Desert,
}

impl Biome {
    /// Name used in content file paths and templates.
    pub fn as_str(self) -> &'static str {
        match self {
            Biome::Forest => "forest",
            Biome::Mountainous => "mountainous",
            Biome::Plains => "plains",
            Biome::Beach => "beach",
            Biome::Wetlands => "wetlands",
            Biome::Desert => "desert",
        }
    }

    pub fn all() -> &'static [Biome] {
        &[
            Biome::Forest,
            Biome::Mountainous,
            Biome::Plains,
            Biome::Beach,
            Biome::Wetlands,
            Biome::Desert,
        ]
    }
}

impl fmt::Display for Biome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Biome {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Biome::all()
            .iter()
            .copied()
            .find(|b| b.as_str() == s.to_lowercase())
            .ok_or_else(|| ParseError::InvalidBiome(s.to_string()))
    }
}

/// Difficulty setting chosen when the clan was founded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    #[default]
    Classic,
    Expanded,
    CruelSeason,
}

impl GameMode {
    /// Tag used by content to restrict an event to this mode.
    pub fn tag(self) -> &'static str {
        match self {
            GameMode::Classic => "classic",
            GameMode::Expanded => "expanded",
            GameMode::CruelSeason => "cruel_season",
        }
    }

    pub fn all() -> &'static [GameMode] {
        &[GameMode::Classic, GameMode::Expanded, GameMode::CruelSeason]
    }
}
