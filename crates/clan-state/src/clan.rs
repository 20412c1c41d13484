//! The clan: roster, setting, standing and stores.
//!
//! This is the world snapshot the event engine reads during filtering and
//! mutates during effect application.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cat::{Cat, CatId, CatState};
use crate::future::FutureEvent;
use crate::history::HistoryEntry;
use crate::names::generate_cat_id;
use crate::relationship::RelationshipGraph;
use crate::season::{Biome, GameMode, Season, MOONS_PER_SEASON};
use crate::supplies::{Supplies, SupplyLevel};

/// Upper bound for outsider reputation.
pub const MAX_REPUTATION: u8 = 100;
/// Upper bound for relations with another clan.
pub const MAX_CLAN_RELATION: u8 = 30;

/// How outsiders (loners, rogues, kittypets) see the clan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutsiderStanding {
    Hostile,
    Neutral,
    Welcoming,
}

impl OutsiderStanding {
    pub fn from_reputation(reputation: u8) -> Self {
        match reputation {
            0..=30 => OutsiderStanding::Hostile,
            31..=70 => OutsiderStanding::Neutral,
            _ => OutsiderStanding::Welcoming,
        }
    }
}

/// How a neighbouring clan sees this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClanStanding {
    Hostile,
    Neutral,
    Ally,
}

impl ClanStanding {
    pub fn from_relation(relation: u8) -> Self {
        match relation {
            0..=9 => ClanStanding::Hostile,
            10..=20 => ClanStanding::Neutral,
            _ => ClanStanding::Ally,
        }
    }
}

/// A neighbouring clan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherClan {
    pub name: String,
    /// 0-30
    pub relation: u8,
}

impl OtherClan {
    pub fn new(name: impl Into<String>, relation: u8) -> Self {
        Self {
            name: name.into(),
            relation: relation.min(MAX_CLAN_RELATION),
        }
    }

    pub fn standing(&self) -> ClanStanding {
        ClanStanding::from_relation(self.relation)
    }
}

/// An ongoing war with a neighbouring clan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct War {
    pub enemy: String,
    pub started_moon: u32,
}

/// A disaster the clan is living through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveDisaster {
    pub name: String,
    /// Event that started it
    pub event_id: String,
    pub moons_remaining: u32,
    pub started_moon: u32,
}

/// The clan and everything the event engine reads or writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clan {
    pub name: String,
    /// Moons since the clan was founded
    pub age_moons: u32,
    pub season: Season,
    pub biome: Biome,
    #[serde(default = "default_camp")]
    pub camp: String,
    #[serde(default)]
    pub game_mode: GameMode,
    #[serde(default)]
    pub cats: BTreeMap<CatId, Cat>,
    #[serde(default)]
    pub relationships: RelationshipGraph,
    #[serde(default = "default_reputation")]
    pub outsider_reputation: u8,
    #[serde(default)]
    pub other_clans: Vec<OtherClan>,
    #[serde(default)]
    pub war: Option<War>,
    #[serde(default)]
    pub supplies: Supplies,
    #[serde(default)]
    pub disasters: Vec<ActiveDisaster>,
    #[serde(default)]
    pub future_events: Vec<FutureEvent>,
    /// Clan-wide history, oldest first
    #[serde(default)]
    pub log: Vec<HistoryEntry>,
    #[serde(default)]
    pub next_cat_seq: u32,
}

fn default_camp() -> String {
    "camp1".to_string()
}

fn default_reputation() -> u8 {
    50
}

impl Clan {
    pub fn new(name: impl Into<String>, biome: Biome, season: Season) -> Self {
        Self {
            name: name.into(),
            age_moons: 0,
            season,
            biome,
            camp: default_camp(),
            game_mode: GameMode::default(),
            cats: BTreeMap::new(),
            relationships: RelationshipGraph::new(),
            outsider_reputation: default_reputation(),
            other_clans: Vec::new(),
            war: None,
            supplies: Supplies::default(),
            disasters: Vec::new(),
            future_events: Vec::new(),
            log: Vec::new(),
            next_cat_seq: 0,
        }
    }

    pub fn with_age(mut self, age_moons: u32) -> Self {
        self.age_moons = age_moons;
        self
    }

    pub fn with_game_mode(mut self, game_mode: GameMode) -> Self {
        self.game_mode = game_mode;
        self
    }

    pub fn with_camp(mut self, camp: impl Into<String>) -> Self {
        self.camp = camp.into();
        self
    }

    pub fn with_other_clan(mut self, other: OtherClan) -> Self {
        self.other_clans.push(other);
        self
    }

    /// Adds a cat to the roster, replacing any cat with the same id.
    pub fn add_cat(&mut self, cat: Cat) -> CatId {
        let id = cat.id.clone();
        self.cats.insert(id.clone(), cat);
        id
    }

    /// Allocates an id no cat in the roster uses yet.
    pub fn next_cat_id(&mut self) -> CatId {
        loop {
            let id = CatId::new(generate_cat_id(self.next_cat_seq));
            self.next_cat_seq += 1;
            if !self.cats.contains_key(&id) {
                return id;
            }
        }
    }

    pub fn cat(&self, id: &CatId) -> Option<&Cat> {
        self.cats.get(id)
    }

    pub fn cat_mut(&mut self, id: &CatId) -> Option<&mut Cat> {
        self.cats.get_mut(id)
    }

    pub fn is_active(&self, id: &CatId) -> bool {
        self.cats.get(id).map(|c| c.is_active()).unwrap_or(false)
    }

    /// Living cats still in the clan, in id order.
    pub fn active_cats(&self) -> impl Iterator<Item = &Cat> {
        self.cats.values().filter(|c| c.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.active_cats().count()
    }

    pub fn outsider_standing(&self) -> OutsiderStanding {
        OutsiderStanding::from_reputation(self.outsider_reputation)
    }

    pub fn adjust_outsider_reputation(&mut self, delta: i32) {
        self.outsider_reputation =
            (self.outsider_reputation as i32 + delta).clamp(0, MAX_REPUTATION as i32) as u8;
    }

    pub fn other_clan(&self, name: &str) -> Option<&OtherClan> {
        self.other_clans.iter().find(|c| c.name == name)
    }

    pub fn adjust_other_clan(&mut self, name: &str, delta: i32) -> Option<u8> {
        let other = self.other_clans.iter_mut().find(|c| c.name == name)?;
        other.relation = (other.relation as i32 + delta).clamp(0, MAX_CLAN_RELATION as i32) as u8;
        Some(other.relation)
    }

    pub fn at_war(&self) -> bool {
        self.war.is_some()
    }

    pub fn has_active_disaster(&self) -> bool {
        !self.disasters.is_empty()
    }

    pub fn start_disaster(&mut self, name: impl Into<String>, event_id: impl Into<String>, moons: u32) {
        self.disasters.push(ActiveDisaster {
            name: name.into(),
            event_id: event_id.into(),
            moons_remaining: moons.max(1),
            started_moon: self.age_moons,
        });
    }

    /// Ticks every disaster down one moon and returns the ones that ended.
    pub fn advance_disasters(&mut self) -> Vec<ActiveDisaster> {
        for disaster in &mut self.disasters {
            disaster.moons_remaining = disaster.moons_remaining.saturating_sub(1);
        }
        let (ended, ongoing): (Vec<_>, Vec<_>) = self
            .disasters
            .drain(..)
            .partition(|d| d.moons_remaining == 0);
        self.disasters = ongoing;
        ended
    }

    /// Fresh-kill needed to feed the active clan for a moon.
    pub fn freshkill_level(&self, per_cat: f32) -> SupplyLevel {
        let required = self.active_count() as f32 * per_cat;
        SupplyLevel::classify(self.supplies.freshkill, required)
    }

    /// Herb level, judged on the best stocked herb (`worst == false`)
    /// or the worst stocked one.
    pub fn herb_level(&self, per_cat: f32, worst: bool) -> SupplyLevel {
        let required = self.active_count() as f32 * per_cat;
        let amount = if worst {
            self.supplies.least_stocked_herb()
        } else {
            self.supplies.most_stocked_herb()
        };
        SupplyLevel::classify(amount as f32, required)
    }

    pub fn herb_level_of(&self, herb: &str, per_cat: f32) -> SupplyLevel {
        let required = self.active_count() as f32 * per_cat;
        SupplyLevel::classify(self.supplies.herb(herb) as f32, required)
    }

    /// Appends to the clan log and to the named cat's own history.
    pub fn record_history(&mut self, entry: HistoryEntry) {
        if let Some(cat) = self.cats.get_mut(&entry.cat) {
            cat.history.record(entry.clone());
        }
        self.log.push(entry);
    }

    pub fn set_state(&mut self, id: &CatId, state: CatState) -> bool {
        match self.cats.get_mut(id) {
            Some(cat) => {
                cat.state = state;
                true
            }
            None => false,
        }
    }

    /// Advances the calendar one moon: ages cats, heals injuries and
    /// ticks disasters. Returns disasters that ended.
    pub fn advance_moon(&mut self) -> Vec<ActiveDisaster> {
        self.age_moons += 1;
        if self.age_moons % MOONS_PER_SEASON == 0 {
            self.season = self.season.next();
        }
        for cat in self.cats.values_mut().filter(|c| c.is_active()) {
            cat.moons += 1;
            for moons in cat.injuries.values_mut() {
                *moons = moons.saturating_sub(1);
            }
            cat.injuries.retain(|_, moons| *moons > 0);
        }
        self.advance_disasters()
    }
}
