//! Parse errors for string-encoded state values.

use thiserror::Error;

/// Error returned when a content or save string does not name a known value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid season: {0}")]
    InvalidSeason(String),
    #[error("invalid biome: {0}")]
    InvalidBiome(String),
    #[error("invalid rank: {0}")]
    InvalidRank(String),
    #[error("invalid age bracket: {0}")]
    InvalidAge(String),
    #[error("invalid skill requirement: {0}")]
    InvalidSkill(String),
    #[error("invalid relationship axis: {0}")]
    InvalidAxis(String),
    #[error("invalid role: {0}")]
    InvalidRole(String),
    #[error("invalid event family: {0}")]
    InvalidFamily(String),
}
