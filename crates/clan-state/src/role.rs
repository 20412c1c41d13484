//! Participant roles and event families.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Highest apprentice slot a template can address (`app1`..`app6`).
pub const MAX_APPRENTICE_SLOTS: u8 = 6;

/// A participant slot in an event, bound to a concrete cat at resolution time.
///
/// Roles serialize as the token used in template text: `m_c` (alias `p_l`),
/// `r_c`, `s_c`, `app1`..`app6`, `n_c:0`...
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    /// Main cat / patrol leader
    Primary,
    /// Random cat / second named participant
    Secondary,
    /// Cat whose skill or trait drives the outcome text
    StatCat,
    /// Nth apprentice in the group (1-based)
    Apprentice(u8),
    /// Nth cat created by the event (0-based)
    NewCat(u8),
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Primary => f.write_str("m_c"),
            Role::Secondary => f.write_str("r_c"),
            Role::StatCat => f.write_str("s_c"),
            Role::Apprentice(n) => write!(f, "app{}", n),
            Role::NewCat(n) => write!(f, "n_c:{}", n),
        }
    }
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        match token {
            "m_c" | "p_l" => return Ok(Role::Primary),
            "r_c" => return Ok(Role::Secondary),
            "s_c" => return Ok(Role::StatCat),
            _ => {}
        }
        if let Some(index) = token.strip_prefix("app") {
            if let Ok(n) = index.parse::<u8>() {
                if (1..=MAX_APPRENTICE_SLOTS).contains(&n) {
                    return Ok(Role::Apprentice(n));
                }
            }
        }
        if let Some(index) = token.strip_prefix("n_c:") {
            if let Ok(n) = index.parse::<u8>() {
                return Ok(Role::NewCat(n));
            }
        }
        Err(ParseError::InvalidRole(s.to_string()))
    }
}

impl TryFrom<String> for Role {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.to_string()
    }
}

/// Groups of event content, each stored in its own directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventFamily {
    /// Group outings: hunting, border, training, herb gathering
    Patrol,
    /// Per-cat moon events: deaths, injuries, arrivals, misc
    Short,
    /// Multi-moon disasters
    Ongoing,
    Ceremony,
    DeathReaction,
}

impl EventFamily {
    pub fn all() -> &'static [EventFamily] {
        &[
            EventFamily::Patrol,
            EventFamily::Short,
            EventFamily::Ongoing,
            EventFamily::Ceremony,
            EventFamily::DeathReaction,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventFamily::Patrol => "patrol",
            EventFamily::Short => "short",
            EventFamily::Ongoing => "ongoing",
            EventFamily::Ceremony => "ceremony",
            EventFamily::DeathReaction => "death_reaction",
        }
    }
}

impl fmt::Display for EventFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventFamily {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(' ', "_");
        EventFamily::all()
            .iter()
            .copied()
            .find(|f| f.as_str() == normalized)
            .ok_or_else(|| ParseError::InvalidFamily(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_tokens() {
        assert_eq!("p_l".parse::<Role>().unwrap(), Role::Primary);
        assert_eq!("m_c".parse::<Role>().unwrap(), Role::Primary);
        assert_eq!("app3".parse::<Role>().unwrap(), Role::Apprentice(3));
        assert_eq!("n_c:1".parse::<Role>().unwrap(), Role::NewCat(1));
        assert!("app9".parse::<Role>().is_err());
        assert!("patrol".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serializes_as_token() {
        assert_eq!(serde_json::to_string(&Role::Secondary).unwrap(), r#""r_c""#);
        let parsed: Role = serde_json::from_str(r#""app2""#).unwrap();
        assert_eq!(parsed, Role::Apprentice(2));
        assert!(serde_json::from_str::<Role>(r#""bystander""#).is_err());
    }

    #[test]
    fn test_family_parse() {
        assert_eq!(
            "death reaction".parse::<EventFamily>().unwrap(),
            EventFamily::DeathReaction
        );
        assert_eq!(EventFamily::Patrol.to_string(), "patrol");
    }
}
