//! Outcome blocks and the effects they declare.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use clan_state::{
    AgeBracket, Cat, EventFamily, FuturePool, Pronouns, Rank, RelationshipAxis, Role,
    SkillRequirement,
};
use tracing::warn;

use crate::error::ContentError;
use crate::template::constraint::{parse_list, SupplyKind};
use crate::template::raw::{
    RawDisaster, RawFutureEvent, RawHistoryText, RawInjury, RawNewCat, RawOutcome, RawRelationship,
    RawSupply,
};

/// Who an effect applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Target {
    Role(Role),
    /// Every cat in the event group
    Patrol,
    /// Every active cat
    Clan,
    /// A random share of the active clan
    SomeClan,
}

impl FromStr for Target {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "patrol" => Ok(Target::Patrol),
            "clan" => Ok(Target::Clan),
            "some_clan" => Ok(Target::SomeClan),
            other => other
                .parse::<Role>()
                .map(Target::Role)
                .map_err(|_| ContentError::field("cats", s)),
        }
    }
}

/// Who may act as the stat cat for an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatCatRule {
    Primary,
    Secondary,
    Apprentice,
    /// Any non-apprentice, non-kit
    Adult,
    Healer,
    NotPrimaryOrSecondary,
    Any,
}

impl FromStr for StatCatRule {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "p_l" | "m_c" => Ok(StatCatRule::Primary),
            "r_c" => Ok(StatCatRule::Secondary),
            "app" => Ok(StatCatRule::Apprentice),
            "adult" => Ok(StatCatRule::Adult),
            "healer" => Ok(StatCatRule::Healer),
            "not_pl_rc" => Ok(StatCatRule::NotPrimaryOrSecondary),
            "any" => Ok(StatCatRule::Any),
            _ => Err(ContentError::field("can_have_stat", s)),
        }
    }
}

impl StatCatRule {
    /// `role` is the role the cat already fills, if any.
    pub fn allows(self, cat: &Cat, role: Option<Role>) -> bool {
        match self {
            StatCatRule::Primary => role == Some(Role::Primary),
            StatCatRule::Secondary => role == Some(Role::Secondary),
            StatCatRule::Apprentice => cat.rank.is_apprentice(),
            StatCatRule::Adult => {
                !cat.rank.is_apprentice() && !matches!(cat.rank, Rank::Newborn | Rank::Kitten)
            }
            StatCatRule::Healer => cat.rank.is_healer(),
            StatCatRule::NotPrimaryOrSecondary => {
                !matches!(role, Some(Role::Primary) | Some(Role::Secondary))
            }
            StatCatRule::Any => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InjuryEffect {
    pub cats: Vec<Target>,
    /// Injury names or pool names
    pub injuries: Vec<String>,
    pub scars: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipEffect {
    pub from: Vec<Target>,
    pub to: Vec<Target>,
    pub axes: Vec<RelationshipAxis>,
    pub amount: i32,
    pub mutual: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryText {
    pub reg_death: Option<String>,
    pub leader_death: Option<String>,
    pub scar: Option<String>,
    pub lost: Option<String>,
}

impl From<&RawHistoryText> for HistoryText {
    fn from(raw: &RawHistoryText) -> Self {
        Self {
            reg_death: raw.reg_death.clone(),
            leader_death: raw.leader_death.clone(),
            scar: raw.scar.clone(),
            lost: raw.lost.clone(),
        }
    }
}

/// Change to a supply when the outcome applies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SupplyAdjust {
    ReduceHalf,
    ReduceQuarter,
    ReduceEighth,
    ReduceFull,
    Increase(u32),
}

impl SupplyAdjust {
    /// Factor applied by the reduce variants.
    pub fn factor(self) -> Option<f32> {
        match self {
            SupplyAdjust::ReduceHalf => Some(0.5),
            SupplyAdjust::ReduceQuarter => Some(0.75),
            SupplyAdjust::ReduceEighth => Some(0.875),
            SupplyAdjust::ReduceFull => Some(0.0),
            SupplyAdjust::Increase(_) => None,
        }
    }
}

impl FromStr for SupplyAdjust {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "reduce_half" => Ok(SupplyAdjust::ReduceHalf),
            "reduce_quarter" => Ok(SupplyAdjust::ReduceQuarter),
            "reduce_eighth" => Ok(SupplyAdjust::ReduceEighth),
            "reduce_full" => Ok(SupplyAdjust::ReduceFull),
            other => other
                .strip_prefix("increase_")
                .and_then(|n| n.parse::<u32>().ok())
                .map(SupplyAdjust::Increase)
                .ok_or_else(|| ContentError::field("supplies.adjust", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SupplyChange {
    pub kind: SupplyKind,
    pub adjust: SupplyAdjust,
}

impl SupplyChange {
    /// Converts a supply entry carrying `adjust`; entries without one are
    /// pure triggers and yield `None`.
    pub(crate) fn from_raw(raw: &RawSupply) -> Result<Option<Self>, ContentError> {
        let Some(adjust) = raw.adjust.as_deref() else {
            return Ok(None);
        };
        Ok(Some(Self {
            kind: raw.kind.parse()?,
            adjust: adjust.parse()?,
        }))
    }
}

/// A cat created by an outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCatSpec {
    pub name: Option<String>,
    pub rank: Rank,
    pub moons: u32,
    pub backstory: String,
    pub pronouns: Pronouns,
    pub parent: Option<Role>,
    pub mate: Option<Role>,
}

impl NewCatSpec {
    fn from_raw(raw: &RawNewCat) -> Result<Self, ContentError> {
        let rank = match raw.rank.as_deref() {
            Some(rank) => rank.parse::<Rank>().map_err(|_| ContentError::field("new_cat.rank", rank))?,
            None => Rank::Warrior,
        };
        let moons = match (raw.moons, raw.age.as_deref()) {
            (Some(moons), _) => moons,
            (None, Some(age)) => age
                .parse::<AgeBracket>()
                .map_err(|_| ContentError::field("new_cat.age", age))?
                .typical_moons(),
            (None, None) => rank.default_moons(),
        };
        let pronouns = match raw.pronouns.as_deref() {
            Some("she") => Pronouns::she(),
            Some("he") => Pronouns::he(),
            Some("they") | None => Pronouns::they(),
            Some(other) => return Err(ContentError::field("new_cat.pronouns", other)),
        };
        let role = |field: &str, value: &Option<String>| -> Result<Option<Role>, ContentError> {
            value
                .as_deref()
                .map(|r| r.parse::<Role>().map_err(|_| ContentError::field(field, r)))
                .transpose()
        };
        Ok(Self {
            name: raw.name.clone(),
            rank,
            moons,
            backstory: raw.backstory.clone().unwrap_or_else(|| "loner".to_string()),
            pronouns,
            parent: role("new_cat.parent", &raw.parent)?,
            mate: role("new_cat.mate", &raw.mate)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisasterSpec {
    pub name: String,
    pub min_moons: u32,
    pub max_moons: u32,
}

impl From<&RawDisaster> for DisasterSpec {
    fn from(raw: &RawDisaster) -> Self {
        let (a, b) = raw.duration;
        Self {
            name: raw.name.clone(),
            min_moons: a.min(b).max(1),
            max_moons: a.max(b).max(1),
        }
    }
}

/// A follow-up event to schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FutureSpec {
    pub family: EventFamily,
    pub pool: FuturePool,
    pub min_delay: u32,
    pub max_delay: u32,
    /// Future role -> role in the scheduling event. Empty carries every
    /// bound role over unchanged.
    pub involved: BTreeMap<Role, Role>,
}

impl FutureSpec {
    pub(crate) fn from_raw(raw: &RawFutureEvent) -> Result<Self, ContentError> {
        let family = raw
            .event_type
            .parse::<EventFamily>()
            .map_err(|_| ContentError::field("future_event.event_type", raw.event_type.as_str()))?;
        let mut involved = BTreeMap::new();
        for (future_role, current_role) in &raw.involved_cats {
            let future = future_role
                .parse::<Role>()
                .map_err(|_| ContentError::field("future_event.involved_cats", future_role.as_str()))?;
            let current = current_role
                .parse::<Role>()
                .map_err(|_| ContentError::field("future_event.involved_cats", current_role.as_str()))?;
            involved.insert(future, current);
        }
        let (a, b) = raw.moon_delay;
        Ok(Self {
            family,
            pool: FuturePool {
                sub_types: raw.pool.subtype.clone(),
                event_ids: raw.pool.event_id.clone(),
            },
            min_delay: a.min(b).max(1),
            max_delay: a.max(b).max(1),
            involved,
        })
    }
}

/// One weighted resolution of an event.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeBlock {
    pub text: String,
    pub exp: u32,
    pub weight: u32,
    pub stat_skill: Vec<SkillRequirement>,
    pub stat_trait: BTreeSet<String>,
    pub can_have_stat: Vec<StatCatRule>,
    pub dead: Vec<Target>,
    pub lost: Vec<Target>,
    /// A dying leader loses every life instead of one
    pub all_lives: bool,
    /// Condition whose registered history text describes the death
    pub death_cause: Option<String>,
    pub injuries: Vec<InjuryEffect>,
    pub history: HistoryText,
    pub relationships: Vec<RelationshipEffect>,
    pub outsider_rep: i32,
    pub other_clan_rep: i32,
    /// Prey sizes caught
    pub prey: Vec<String>,
    /// Herbs gathered
    pub herbs: Vec<String>,
    pub supplies: Vec<SupplyChange>,
    pub accessories: Vec<String>,
    pub gender_change: Vec<Role>,
    pub new_cats: Vec<NewCatSpec>,
    pub disaster: Option<DisasterSpec>,
    pub future: Vec<FutureSpec>,
}

impl OutcomeBlock {
    /// Converts a raw block. Malformed injury and relationship blocks are
    /// dropped with a warning; anything else malformed is an error.
    pub(crate) fn from_raw(event_id: &str, raw: &RawOutcome, default_weight: u32) -> Result<Self, ContentError> {
        let text = raw.text.clone().ok_or_else(|| ContentError::InvalidTemplate {
            event_id: event_id.to_string(),
            reason: "outcome without text".to_string(),
        })?;

        let injuries = raw
            .injury
            .iter()
            .filter_map(|value| match injury_from_value(value) {
                Ok(effect) => Some(effect),
                Err(e) => {
                    warn!("Skipping injury block in {}: {}", event_id, e);
                    None
                }
            })
            .collect();

        let relationships = raw
            .relationships
            .iter()
            .filter_map(|value| match relationship_from_value(value) {
                Ok(effect) => Some(effect),
                Err(e) => {
                    warn!("Skipping relationship block in {}: {}", event_id, e);
                    None
                }
            })
            .collect();

        let supplies = raw
            .supplies
            .iter()
            .map(SupplyChange::from_raw)
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect();

        Ok(Self {
            text,
            exp: raw.exp,
            weight: normalize_weight(raw.weight, default_weight),
            stat_skill: parse_list("stat_skill", &raw.stat_skill)?,
            stat_trait: raw.stat_trait.iter().cloned().collect(),
            can_have_stat: parse_list("can_have_stat", &raw.can_have_stat)?,
            dead: parse_list("dead_cats", &raw.dead_cats)?,
            lost: parse_list("lost_cats", &raw.lost_cats)?,
            all_lives: raw.all_lives,
            death_cause: raw.death_cause.clone(),
            injuries,
            history: raw.history_text.as_ref().map(HistoryText::from).unwrap_or_default(),
            relationships,
            outsider_rep: raw.outsider_rep,
            other_clan_rep: raw.other_clan_rep,
            prey: raw.prey.clone(),
            herbs: raw.herbs.clone(),
            supplies,
            accessories: raw.new_accessory.clone(),
            gender_change: parse_list("gender_change", &raw.gender_change)?,
            new_cats: raw
                .new_cat
                .iter()
                .map(NewCatSpec::from_raw)
                .collect::<Result<_, _>>()?,
            disaster: raw.disaster.as_ref().map(DisasterSpec::from),
            future: raw
                .future_event
                .iter()
                .map(FutureSpec::from_raw)
                .collect::<Result<_, _>>()?,
        })
    }

    /// Whether this outcome needs a skilled or traited stat cat.
    pub fn needs_stat_cat(&self) -> bool {
        !self.stat_skill.is_empty() || !self.stat_trait.is_empty()
    }

    /// Whether the outcome text or effects name a stat cat at all.
    pub fn uses_stat_cat(&self) -> bool {
        self.needs_stat_cat() || self.referenced_roles().contains(&Role::StatCat)
    }

    /// Whether `cat`, filling `role`, may be this outcome's stat cat.
    pub fn accepts_stat_cat(&self, cat: &Cat, role: Option<Role>) -> bool {
        let rule_ok = self.can_have_stat.is_empty()
            || self.can_have_stat.iter().any(|rule| rule.allows(cat, role));
        if !rule_ok {
            return false;
        }
        !self.needs_stat_cat()
            || cat.skills.hits(&self.stat_skill) > 0
            || self.stat_trait.contains(cat.trait_name())
    }

    /// Every role this outcome mentions, in text, history text or effects.
    pub fn referenced_roles(&self) -> BTreeSet<Role> {
        let mut roles: BTreeSet<Role> = crate::text::role_tokens(&self.text).collect();
        let history = [
            &self.history.reg_death,
            &self.history.leader_death,
            &self.history.scar,
            &self.history.lost,
        ];
        for text in history.into_iter().flatten() {
            roles.extend(crate::text::role_tokens(text));
        }
        let targets = self
            .dead
            .iter()
            .chain(self.lost.iter())
            .chain(self.injuries.iter().flat_map(|i| i.cats.iter()))
            .chain(self.relationships.iter().flat_map(|r| r.from.iter().chain(r.to.iter())));
        for target in targets {
            if let Target::Role(role) = target {
                roles.insert(*role);
            }
        }
        roles.extend(self.gender_change.iter().copied());
        roles.extend(self.new_cats.iter().filter_map(|n| n.parent.or(n.mate)));
        roles
    }
}

/// Raises non-positive or missing weights to the floor of one.
pub(crate) fn normalize_weight(weight: Option<i64>, default_weight: u32) -> u32 {
    match weight {
        Some(w) if w >= 1 => w.min(u32::MAX as i64) as u32,
        Some(_) => 1,
        None => default_weight.max(1),
    }
}

fn injury_from_value(value: &serde_json::Value) -> Result<InjuryEffect, ContentError> {
    let raw: RawInjury = serde_json::from_value(value.clone())
        .map_err(|e| ContentError::field("injury", e.to_string()))?;
    if raw.cats.is_empty() || raw.injuries.is_empty() {
        return Err(ContentError::field("injury", value.to_string()));
    }
    Ok(InjuryEffect {
        cats: parse_list("injury.cats", &raw.cats)?,
        injuries: raw.injuries,
        scars: raw.scars,
    })
}

fn relationship_from_value(value: &serde_json::Value) -> Result<RelationshipEffect, ContentError> {
    let raw: RawRelationship = serde_json::from_value(value.clone())
        .map_err(|e| ContentError::field("relationships", e.to_string()))?;
    if raw.cats_from.is_empty() || raw.cats_to.is_empty() || raw.values.is_empty() {
        return Err(ContentError::field("relationships", value.to_string()));
    }
    Ok(RelationshipEffect {
        from: parse_list("relationships.cats_from", &raw.cats_from)?,
        to: parse_list("relationships.cats_to", &raw.cats_to)?,
        axes: raw
            .values
            .iter()
            .map(|v| {
                v.parse::<RelationshipAxis>()
                    .map_err(|_| ContentError::field("relationships.values", v.as_str()))
            })
            .collect::<Result<_, _>>()?,
        amount: raw.amount,
        mutual: raw.mutual,
    })
}
