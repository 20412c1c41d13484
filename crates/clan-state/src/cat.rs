//! Cat records: rank, age, skills, personality and family ties.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::history::CatHistory;

/// Unique identifier for a cat.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatId(pub String);

impl CatId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CatId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A cat's position in the clan hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    Newborn,
    Kitten,
    Apprentice,
    MedicineCatApprentice,
    MediatorApprentice,
    Warrior,
    Mediator,
    MedicineCat,
    Deputy,
    Leader,
    Elder,
}

impl Rank {
    pub fn all() -> &'static [Rank] {
        &[
            Rank::Newborn,
            Rank::Kitten,
            Rank::Apprentice,
            Rank::MedicineCatApprentice,
            Rank::MediatorApprentice,
            Rank::Warrior,
            Rank::Mediator,
            Rank::MedicineCat,
            Rank::Deputy,
            Rank::Leader,
            Rank::Elder,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rank::Newborn => "newborn",
            Rank::Kitten => "kitten",
            Rank::Apprentice => "apprentice",
            Rank::MedicineCatApprentice => "medicine_cat_apprentice",
            Rank::MediatorApprentice => "mediator_apprentice",
            Rank::Warrior => "warrior",
            Rank::Mediator => "mediator",
            Rank::MedicineCat => "medicine_cat",
            Rank::Deputy => "deputy",
            Rank::Leader => "leader",
            Rank::Elder => "elder",
        }
    }

    /// Any of the three apprentice ranks.
    pub fn is_apprentice(self) -> bool {
        matches!(
            self,
            Rank::Apprentice | Rank::MedicineCatApprentice | Rank::MediatorApprentice
        )
    }

    /// Warriors and the cats who lead them.
    pub fn is_normal_adult(self) -> bool {
        matches!(self, Rank::Warrior | Rank::Deputy | Rank::Leader)
    }

    pub fn is_healer(self) -> bool {
        matches!(self, Rank::MedicineCat | Rank::MedicineCatApprentice)
    }

    /// Default age in moons for a freshly created cat of this rank.
    pub fn default_moons(self) -> u32 {
        match self {
            Rank::Newborn => 0,
            Rank::Kitten => 3,
            Rank::Apprentice | Rank::MedicineCatApprentice | Rank::MediatorApprentice => 7,
            Rank::Elder => 130,
            _ => 24,
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rank {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(' ', "_");
        let normalized = match normalized.as_str() {
            "healer" => "medicine_cat".to_string(),
            "healer_apprentice" => "medicine_cat_apprentice".to_string(),
            _ => normalized,
        };
        Rank::all()
            .iter()
            .copied()
            .find(|r| r.as_str() == normalized)
            .ok_or_else(|| ParseError::InvalidRank(s.to_string()))
    }
}

/// A rank or a named group of ranks, used by per-rank count bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RankCategory {
    Rank(Rank),
    AllApprentices,
    NormalAdult,
    HealerCats,
}

impl RankCategory {
    pub fn contains(self, rank: Rank) -> bool {
        match self {
            RankCategory::Rank(r) => r == rank,
            RankCategory::AllApprentices => rank.is_apprentice(),
            RankCategory::NormalAdult => rank.is_normal_adult(),
            RankCategory::HealerCats => rank.is_healer(),
        }
    }
}

impl fmt::Display for RankCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankCategory::Rank(r) => write!(f, "{}", r),
            RankCategory::AllApprentices => f.write_str("all apprentices"),
            RankCategory::NormalAdult => f.write_str("normal adult"),
            RankCategory::HealerCats => f.write_str("healer cats"),
        }
    }
}

impl FromStr for RankCategory {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', " ").as_str() {
            "all apprentices" => Ok(RankCategory::AllApprentices),
            "normal adult" => Ok(RankCategory::NormalAdult),
            "healer cats" => Ok(RankCategory::HealerCats),
            _ => s.parse().map(RankCategory::Rank),
        }
    }
}

/// Life stage derived from a cat's age in moons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeBracket {
    Newborn,
    Kitten,
    Adolescent,
    YoungAdult,
    Adult,
    SeniorAdult,
    Senior,
}

impl AgeBracket {
    pub fn from_moons(moons: u32) -> Self {
        match moons {
            0 => AgeBracket::Newborn,
            1..=5 => AgeBracket::Kitten,
            6..=11 => AgeBracket::Adolescent,
            12..=47 => AgeBracket::YoungAdult,
            48..=95 => AgeBracket::Adult,
            96..=119 => AgeBracket::SeniorAdult,
            _ => AgeBracket::Senior,
        }
    }

    /// Representative age for a freshly created cat in this bracket.
    pub fn typical_moons(self) -> u32 {
        match self {
            AgeBracket::Newborn => 0,
            AgeBracket::Kitten => 3,
            AgeBracket::Adolescent => 8,
            AgeBracket::YoungAdult => 20,
            AgeBracket::Adult => 60,
            AgeBracket::SeniorAdult => 100,
            AgeBracket::Senior => 125,
        }
    }
}

impl FromStr for AgeBracket {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(' ', "_").as_str() {
            "newborn" => Ok(AgeBracket::Newborn),
            "kitten" => Ok(AgeBracket::Kitten),
            "adolescent" => Ok(AgeBracket::Adolescent),
            "young_adult" => Ok(AgeBracket::YoungAdult),
            "adult" => Ok(AgeBracket::Adult),
            "senior_adult" => Ok(AgeBracket::SeniorAdult),
            "senior" => Ok(AgeBracket::Senior),
            _ => Err(ParseError::InvalidAge(s.to_string())),
        }
    }
}

/// Skill paths a cat can develop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkillPath {
    Teacher,
    Hunter,
    Fighter,
    Runner,
    Climber,
    Swimmer,
    Speaker,
    Mediator,
    Clever,
    Insightful,
    Sense,
    Kit,
    Story,
    Lore,
    Camp,
    Healer,
    Star,
    Dark,
    Omen,
    Dream,
    Clairvoyant,
    Prophet,
    Ghost,
}

impl SkillPath {
    pub fn all() -> &'static [SkillPath] {
        &[
            SkillPath::Teacher,
            SkillPath::Hunter,
            SkillPath::Fighter,
            SkillPath::Runner,
            SkillPath::Climber,
            SkillPath::Swimmer,
            SkillPath::Speaker,
            SkillPath::Mediator,
            SkillPath::Clever,
            SkillPath::Insightful,
            SkillPath::Sense,
            SkillPath::Kit,
            SkillPath::Story,
            SkillPath::Lore,
            SkillPath::Camp,
            SkillPath::Healer,
            SkillPath::Star,
            SkillPath::Dark,
            SkillPath::Omen,
            SkillPath::Dream,
            SkillPath::Clairvoyant,
            SkillPath::Prophet,
            SkillPath::Ghost,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SkillPath::Teacher => "TEACHER",
            SkillPath::Hunter => "HUNTER",
            SkillPath::Fighter => "FIGHTER",
            SkillPath::Runner => "RUNNER",
            SkillPath::Climber => "CLIMBER",
            SkillPath::Swimmer => "SWIMMER",
            SkillPath::Speaker => "SPEAKER",
            SkillPath::Mediator => "MEDIATOR",
            SkillPath::Clever => "CLEVER",
            SkillPath::Insightful => "INSIGHTFUL",
            SkillPath::Sense => "SENSE",
            SkillPath::Kit => "KIT",
            SkillPath::Story => "STORY",
            SkillPath::Lore => "LORE",
            SkillPath::Camp => "CAMP",
            SkillPath::Healer => "HEALER",
            SkillPath::Star => "STAR",
            SkillPath::Dark => "DARK",
            SkillPath::Omen => "OMEN",
            SkillPath::Dream => "DREAM",
            SkillPath::Clairvoyant => "CLAIRVOYANT",
            SkillPath::Prophet => "PROPHET",
            SkillPath::Ghost => "GHOST",
        }
    }
}

impl FromStr for SkillPath {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        SkillPath::all()
            .iter()
            .copied()
            .find(|p| p.as_str() == upper)
            .ok_or_else(|| ParseError::InvalidSkill(s.to_string()))
    }
}

/// A skill path at a tier (1-3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Skill {
    pub path: SkillPath,
    pub tier: u8,
}

impl Skill {
    pub fn new(path: SkillPath, tier: u8) -> Self {
        Self { path, tier }
    }
}

/// A cat's primary and secondary skill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillSet {
    #[serde(default)]
    pub primary: Option<Skill>,
    #[serde(default)]
    pub secondary: Option<Skill>,
}

impl SkillSet {
    pub fn new(primary: Option<Skill>, secondary: Option<Skill>) -> Self {
        Self { primary, secondary }
    }

    pub fn single(skill: Skill) -> Self {
        Self {
            primary: Some(skill),
            secondary: None,
        }
    }

    /// True if either skill meets the requirement.
    pub fn meets(&self, requirement: &SkillRequirement) -> bool {
        [self.primary, self.secondary]
            .iter()
            .flatten()
            .any(|skill| skill.path == requirement.path && skill.tier >= requirement.min_tier)
    }

    /// Number of requirements in the list this skill set meets.
    pub fn hits(&self, requirements: &[SkillRequirement]) -> usize {
        requirements.iter().filter(|req| self.meets(req)).count()
    }
}

/// A content-side skill requirement, written `"PATH,TIER"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SkillRequirement {
    pub path: SkillPath,
    pub min_tier: u8,
}

impl FromStr for SkillRequirement {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(',');
        let path = parts
            .next()
            .ok_or_else(|| ParseError::InvalidSkill(s.to_string()))?
            .parse::<SkillPath>()
            .map_err(|_| ParseError::InvalidSkill(s.to_string()))?;
        let min_tier = match parts.next() {
            Some(tier) => tier
                .trim()
                .parse::<u8>()
                .map_err(|_| ParseError::InvalidSkill(s.to_string()))?,
            None => 1,
        };
        if parts.next().is_some() || !(1..=3).contains(&min_tier) {
            return Err(ParseError::InvalidSkill(s.to_string()));
        }
        Ok(Self { path, min_tier })
    }
}

/// Personality trait plus the four facets it is built from (0-16 each).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Personality {
    pub trait_name: String,
    #[serde(default = "default_facet")]
    pub lawfulness: u8,
    #[serde(default = "default_facet")]
    pub sociability: u8,
    #[serde(default = "default_facet")]
    pub aggression: u8,
    #[serde(default = "default_facet")]
    pub stability: u8,
}

fn default_facet() -> u8 {
    8
}

impl Default for Personality {
    fn default() -> Self {
        Self::new("calm")
    }
}

impl Personality {
    /// Creates a personality with neutral facets.
    pub fn new(trait_name: impl Into<String>) -> Self {
        Self {
            trait_name: trait_name.into(),
            lawfulness: default_facet(),
            sociability: default_facet(),
            aggression: default_facet(),
            stability: default_facet(),
        }
    }

    pub fn with_facets(mut self, lawfulness: u8, sociability: u8, aggression: u8, stability: u8) -> Self {
        self.lawfulness = lawfulness.min(16);
        self.sociability = sociability.min(16);
        self.aggression = aggression.min(16);
        self.stability = stability.min(16);
        self
    }

    fn facets(&self) -> [u8; 4] {
        [self.lawfulness, self.sociability, self.aggression, self.stability]
    }

    /// Two personalities get along when they share a trait, or when at least
    /// three facets sit within 4 points of each other and none are 10+ apart.
    pub fn is_compatible(&self, other: &Personality) -> bool {
        if self.trait_name == other.trait_name {
            return true;
        }
        let diffs: Vec<u8> = self
            .facets()
            .iter()
            .zip(other.facets().iter())
            .map(|(a, b)| a.abs_diff(*b))
            .collect();
        let close = diffs.iter().filter(|d| **d <= 4).count();
        let clashing = diffs.iter().any(|d| *d >= 10);
        close >= 3 && !clashing
    }
}

/// Pronoun set used by the text renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pronouns {
    pub subject: String,
    pub object: String,
    pub poss: String,
    pub inposs: String,
    #[serde(rename = "self")]
    pub reflexive: String,
    /// Takes plural verb agreement ("they were")
    #[serde(default)]
    pub plural: bool,
}

impl Pronouns {
    pub fn she() -> Self {
        Self::build("she", "her", "her", "hers", "herself", false)
    }

    pub fn he() -> Self {
        Self::build("he", "him", "his", "his", "himself", false)
    }

    pub fn they() -> Self {
        Self::build("they", "them", "their", "theirs", "themself", true)
    }

    fn build(subject: &str, object: &str, poss: &str, inposs: &str, reflexive: &str, plural: bool) -> Self {
        Self {
            subject: subject.to_string(),
            object: object.to_string(),
            poss: poss.to_string(),
            inposs: inposs.to_string(),
            reflexive: reflexive.to_string(),
            plural,
        }
    }
}

impl Default for Pronouns {
    fn default() -> Self {
        Self::they()
    }
}

/// Whether a cat is still part of the clan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CatState {
    #[default]
    Active,
    Dead,
    Lost,
}

/// A single cat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cat {
    pub id: CatId,
    pub name: String,
    #[serde(default)]
    pub pronouns: Pronouns,
    pub rank: Rank,
    pub moons: u32,
    #[serde(default)]
    pub experience: u32,
    #[serde(default)]
    pub skills: SkillSet,
    #[serde(default)]
    pub personality: Personality,
    #[serde(default)]
    pub backstory: String,
    #[serde(default)]
    pub state: CatState,
    /// Remaining lives; only leaders have more than one
    #[serde(default = "default_lives")]
    pub lives: u8,
    /// Injury name -> moons until healed
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub injuries: BTreeMap<String, u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scars: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accessories: Vec<String>,
    #[serde(default)]
    pub gender_alignment: String,
    #[serde(default)]
    pub gender_changed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<CatId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mates: Vec<CatId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentor: Option<CatId>,
    #[serde(default)]
    pub history: CatHistory,
}

fn default_lives() -> u8 {
    1
}

impl Cat {
    /// Creates an active cat with default skills and personality.
    pub fn new(id: impl Into<String>, name: impl Into<String>, rank: Rank, moons: u32) -> Self {
        Self {
            id: CatId::new(id),
            name: name.into(),
            pronouns: Pronouns::default(),
            rank,
            moons,
            experience: 0,
            skills: SkillSet::default(),
            personality: Personality::default(),
            backstory: String::new(),
            state: CatState::Active,
            lives: 1,
            injuries: BTreeMap::new(),
            scars: Vec::new(),
            accessories: Vec::new(),
            gender_alignment: String::new(),
            gender_changed: false,
            parents: Vec::new(),
            mates: Vec::new(),
            mentor: None,
            history: CatHistory::default(),
        }
    }

    pub fn with_pronouns(mut self, pronouns: Pronouns) -> Self {
        self.pronouns = pronouns;
        self
    }

    pub fn with_skill(mut self, skill: Skill) -> Self {
        if self.skills.primary.is_none() {
            self.skills.primary = Some(skill);
        } else {
            self.skills.secondary = Some(skill);
        }
        self
    }

    pub fn with_trait(mut self, trait_name: impl Into<String>) -> Self {
        self.personality.trait_name = trait_name.into();
        self
    }

    pub fn with_personality(mut self, personality: Personality) -> Self {
        self.personality = personality;
        self
    }

    pub fn with_experience(mut self, experience: u32) -> Self {
        self.experience = experience;
        self
    }

    pub fn with_backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = backstory.into();
        self
    }

    pub fn with_lives(mut self, lives: u8) -> Self {
        self.lives = lives;
        self
    }

    pub fn with_parents(mut self, parents: Vec<CatId>) -> Self {
        self.parents = parents;
        self
    }

    pub fn with_mentor(mut self, mentor: CatId) -> Self {
        self.mentor = Some(mentor);
        self
    }

    pub fn age(&self) -> AgeBracket {
        AgeBracket::from_moons(self.moons)
    }

    pub fn is_active(&self) -> bool {
        self.state == CatState::Active
    }

    pub fn is_dead(&self) -> bool {
        self.state == CatState::Dead
    }

    pub fn trait_name(&self) -> &str {
        &self.personality.trait_name
    }

    pub fn has_injury(&self, injury: &str) -> bool {
        self.injuries.contains_key(injury)
    }

    pub fn is_mate_of(&self, other: &Cat) -> bool {
        self.mates.contains(&other.id)
    }

    pub fn is_parent_of(&self, other: &Cat) -> bool {
        other.parents.contains(&self.id)
    }

    pub fn is_mentor_of(&self, other: &Cat) -> bool {
        other.mentor.as_ref() == Some(&self.id)
    }

    /// Cats sharing at least one parent.
    pub fn is_sibling_of(&self, other: &Cat) -> bool {
        self.id != other.id && self.parents.iter().any(|p| other.parents.contains(p))
    }

    /// Any blood or mate tie in either direction.
    pub fn is_family_of(&self, other: &Cat) -> bool {
        self.is_mate_of(other)
            || other.is_mate_of(self)
            || self.is_parent_of(other)
            || other.is_parent_of(self)
            || self.is_sibling_of(other)
    }
}
