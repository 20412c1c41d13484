//! Event templates: the typed, validated form of authored content.
//!
//! Raw JSON shapes live in [`raw`]. [`EventTemplate::from_raw`] converts
//! them, rejecting unknown ranks, ages, skills, roles and axes, and derives
//! the selection weight from how narrowly the template is scoped.

pub mod constraint;
pub mod outcome;
pub mod raw;

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use clan_state::{Biome, ClanStanding, EventFamily, OutsiderStanding, RankCategory, Role, Season};

use crate::config::EngineConfig;
use crate::error::ContentError;

pub use constraint::{RankBound, RelationRule, RoleConstraint, SupplyKind, SupplyTrigger};
pub use outcome::{
    DisasterSpec, FutureSpec, HistoryText, InjuryEffect, NewCatSpec, OutcomeBlock,
    RelationshipEffect, StatCatRule, SupplyAdjust, SupplyChange, Target,
};

use constraint::{parse_clan_standing, parse_list, parse_outsider_standing, parse_supply_level};
use outcome::normalize_weight;
use raw::{RawOutcome, RawTemplate};

/// Default participant bounds when a template declares none.
pub const DEFAULT_MIN_CATS: usize = 1;
pub const DEFAULT_MAX_CATS: usize = 6;

/// An applicability set: either the `"any"` wildcard or explicit values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope<T: Ord> {
    Any,
    Only(BTreeSet<T>),
}

impl<T: Ord> Default for Scope<T> {
    fn default() -> Self {
        Scope::Any
    }
}

impl<T: Ord + FromStr> Scope<T> {
    /// An empty list or one containing `"any"` is the wildcard.
    pub(crate) fn parse(field: &str, values: &[String]) -> Result<Self, ContentError> {
        if values.is_empty() || values.iter().any(|v| v.eq_ignore_ascii_case("any")) {
            return Ok(Scope::Any);
        }
        let set = values
            .iter()
            .map(|v| v.parse::<T>().map_err(|_| ContentError::field(field, v.as_str())))
            .collect::<Result<BTreeSet<T>, _>>()?;
        Ok(Scope::Only(set))
    }
}

impl<T: Ord> Scope<T> {
    pub fn allows(&self, value: &T) -> bool {
        match self {
            Scope::Any => true,
            Scope::Only(set) => set.contains(value),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Scope::Any)
    }
}

/// One candidate event, immutable after load.
#[derive(Debug, Clone, PartialEq)]
pub struct EventTemplate {
    pub id: String,
    pub family: EventFamily,
    pub sub_types: BTreeSet<String>,
    pub location: Scope<Biome>,
    pub season: Scope<Season>,
    pub camp: Scope<String>,
    pub tags: BTreeSet<String>,
    /// Selection weight after the specificity bonus, always at least 1
    pub weight: u32,
    pub primary: Option<RoleConstraint>,
    pub secondary: Option<RoleConstraint>,
    pub min_cats: usize,
    pub max_cats: usize,
    pub rank_bounds: Vec<RankBound>,
    pub relations: Vec<RelationRule>,
    pub outsider: BTreeSet<OutsiderStanding>,
    pub other_clan: BTreeSet<ClanStanding>,
    pub supply_triggers: Vec<SupplyTrigger>,
    pub chance_of_success: Option<f32>,
    pub intro_text: String,
    pub decline_text: String,
    pub success: Vec<OutcomeBlock>,
    pub failure: Vec<OutcomeBlock>,
    pub antag_success: Vec<OutcomeBlock>,
    pub antag_failure: Vec<OutcomeBlock>,
    /// Follow-ups scheduled whenever this event fires
    pub future: Vec<FutureSpec>,
}

impl EventTemplate {
    pub fn from_raw(raw: &RawTemplate, family: EventFamily, config: &EngineConfig) -> Result<Self, ContentError> {
        let id = raw.event_id.trim().to_string();
        if id.is_empty() {
            return Err(ContentError::InvalidTemplate {
                event_id: raw.event_id.clone(),
                reason: "empty event_id".to_string(),
            });
        }
        let invalid = |reason: String| ContentError::InvalidTemplate {
            event_id: id.clone(),
            reason,
        };

        let default_weight = config.selection.default_weight;
        let outcomes = |pool: &[RawOutcome]| -> Result<Vec<OutcomeBlock>, ContentError> {
            pool.iter()
                .map(|o| OutcomeBlock::from_raw(&id, o, default_weight))
                .collect()
        };

        let mut success = outcomes(&raw.success_outcomes)?;
        let failure = outcomes(&raw.fail_outcomes)?;
        let antag_success = outcomes(&raw.antag_success_outcomes)?;
        let antag_failure = outcomes(&raw.antag_fail_outcomes)?;

        // Short events write their one outcome at the top level
        if raw.inline.text.is_some() {
            success.push(OutcomeBlock::from_raw(&id, &raw.inline, default_weight)?);
        }
        if success.is_empty() {
            return Err(invalid("no success outcome".to_string()));
        }

        let primary = raw.m_c.as_ref().map(RoleConstraint::from_raw).transpose()?;
        let secondary = raw.r_c.as_ref().map(RoleConstraint::from_raw).transpose()?;

        let dying: Vec<Role> = [(Role::Primary, &primary), (Role::Secondary, &secondary)]
            .into_iter()
            .filter(|(_, c)| c.as_ref().map(|c| c.dies).unwrap_or(false))
            .map(|(role, _)| role)
            .collect();

        let mut supply_triggers = Vec::new();
        let mut supply_changes = Vec::new();
        for supply in &raw.supplies {
            let kind: SupplyKind = supply.kind.parse()?;
            if !supply.trigger.is_empty() {
                let levels = supply
                    .trigger
                    .iter()
                    .map(|t| parse_supply_level(t))
                    .collect::<Result<BTreeSet<_>, _>>()?;
                supply_triggers.push(SupplyTrigger {
                    kind: kind.clone(),
                    levels,
                });
            }
            if let Some(change) = SupplyChange::from_raw(supply)? {
                supply_changes.push(change);
            }
        }

        for block in &mut success {
            for role in &dying {
                if !block.dead.contains(&Target::Role(*role)) {
                    block.dead.push(Target::Role(*role));
                }
            }
            block.supplies.extend(supply_changes.iter().cloned());
        }

        let mut rank_bounds = Vec::new();
        for (category, (min, max)) in &raw.min_max_status {
            let category = category
                .parse::<RankCategory>()
                .map_err(|_| ContentError::field("min_max_status", category.as_str()))?;
            if min > max {
                return Err(invalid(format!("rank bound {} > {}", min, max)));
            }
            rank_bounds.push(RankBound {
                category,
                min: *min,
                max: *max,
            });
        }

        let min_cats = raw.min_cats.unwrap_or(DEFAULT_MIN_CATS);
        let max_cats = raw.max_cats.unwrap_or(DEFAULT_MAX_CATS.max(min_cats));
        if min_cats > max_cats {
            return Err(invalid(format!("min_cats {} > max_cats {}", min_cats, max_cats)));
        }

        let outsider = match &raw.outsider {
            Some(standing) => standing
                .current_rep
                .iter()
                .filter(|v| !v.eq_ignore_ascii_case("any"))
                .map(|v| parse_outsider_standing(v))
                .collect::<Result<_, _>>()?,
            None => BTreeSet::new(),
        };
        let other_clan = match &raw.other_clan {
            Some(standing) => standing
                .current_rep
                .iter()
                .filter(|v| !v.eq_ignore_ascii_case("any"))
                .map(|v| parse_clan_standing(v))
                .collect::<Result<_, _>>()?,
            None => BTreeSet::new(),
        };

        let mut template = Self {
            id: id.clone(),
            family,
            sub_types: raw.sub_type.iter().map(|s| s.trim().to_string()).collect(),
            location: Scope::parse("location", &raw.location)?,
            season: Scope::parse("season", &raw.season)?,
            camp: Scope::parse("camp", &raw.camp)?,
            tags: raw.tags.iter().map(|t| t.trim().to_string()).collect(),
            weight: 1,
            primary,
            secondary,
            min_cats,
            max_cats,
            rank_bounds,
            relations: parse_list("relationship_constraint", &raw.relationship_constraint)?,
            outsider,
            other_clan,
            supply_triggers,
            chance_of_success: raw.chance_of_success,
            intro_text: raw.intro_text.clone(),
            decline_text: raw.decline_text.clone(),
            success,
            failure,
            antag_success,
            antag_failure,
            future: raw
                .future_event
                .iter()
                .map(FutureSpec::from_raw)
                .collect::<Result<_, _>>()?,
        };
        template.weight = template.derive_weight(raw.weight, config);
        Ok(template)
    }

    /// Base weight raised to at least 1, plus a bonus per declared
    /// constraint so narrow templates compete with generic ones.
    fn derive_weight(&self, declared: Option<i64>, config: &EngineConfig) -> u32 {
        let bonus = &config.weights;
        let mut weight = normalize_weight(declared, config.selection.default_weight);
        if !self.location.is_any() {
            weight += bonus.location;
        }
        if !self.season.is_any() {
            weight += bonus.season;
        }
        if !self.camp.is_any() {
            weight += bonus.camp;
        }
        let fields: u32 = [&self.primary, &self.secondary]
            .iter()
            .filter_map(|c| c.as_ref())
            .map(|c| c.field_count())
            .sum();
        weight += fields * bonus.role_field;
        weight += self.relations.len() as u32 * bonus.relationship;
        weight += self.rank_bounds.len() as u32 * bonus.rank_count;
        weight.max(1)
    }

    /// Every outcome pool, normal and antagonize.
    pub fn all_outcomes(&self) -> impl Iterator<Item = &OutcomeBlock> {
        self.success
            .iter()
            .chain(self.failure.iter())
            .chain(self.antag_success.iter())
            .chain(self.antag_failure.iter())
    }

    /// Roles that must be bound before outcome resolution: those named by
    /// constraints, text, effects or future-event carries. The stat cat and
    /// new cats are bound later and never appear here.
    pub fn required_roles(&self) -> BTreeSet<Role> {
        let mut roles: BTreeSet<Role> = BTreeSet::new();
        roles.insert(Role::Primary);
        if self.secondary.is_some() {
            roles.insert(Role::Secondary);
        }
        roles.extend(crate::text::role_tokens(&self.intro_text));
        roles.extend(crate::text::role_tokens(&self.decline_text));
        for block in self.all_outcomes() {
            roles.extend(block.referenced_roles());
        }
        let futures = self
            .future
            .iter()
            .chain(self.all_outcomes().flat_map(|b| b.future.iter()));
        for future in futures {
            roles.extend(future.involved.values().copied());
        }
        roles.retain(|r| !matches!(r, Role::StatCat | Role::NewCat(_)));
        roles
    }

    pub fn needs_secondary(&self) -> bool {
        self.required_roles().contains(&Role::Secondary)
    }

    /// Apprentice slots the template addresses, in slot order.
    pub fn apprentice_slots(&self) -> Vec<u8> {
        self.required_roles()
            .into_iter()
            .filter_map(|r| match r {
                Role::Apprentice(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    pub fn is_romance(&self) -> bool {
        self.tags.contains("romance") || self.tags.contains("romantic")
    }

    /// Whether firing this template reads or changes supplies.
    pub fn touches_supplies(&self) -> bool {
        !self.supply_triggers.is_empty() || self.all_outcomes().any(|b| !b.supplies.is_empty())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Outcome pools for the chosen patrol action. Antagonize pools fall
    /// back to the normal ones when a template does not author them.
    pub fn pools(&self, antagonize: bool) -> (&[OutcomeBlock], &[OutcomeBlock]) {
        if antagonize && !self.antag_success.is_empty() {
            let failure = if self.antag_failure.is_empty() {
                &self.failure
            } else {
                &self.antag_failure
            };
            (&self.antag_success, failure)
        } else {
            (&self.success, &self.failure)
        }
    }
}

/// Parses a content file's templates, skipping (and returning the errors
/// of) any that fail to deserialize or validate.
pub fn parse_templates(
    values: Vec<serde_json::Value>,
    family: EventFamily,
    config: &EngineConfig,
) -> (Vec<EventTemplate>, Vec<ContentError>) {
    let mut templates = Vec::new();
    let mut errors = Vec::new();
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();

    for value in values {
        let id = value
            .get("event_id")
            .and_then(|v| v.as_str())
            .unwrap_or("<unnamed>")
            .to_string();
        let raw: RawTemplate = match serde_json::from_value(value) {
            Ok(raw) => raw,
            Err(e) => {
                errors.push(ContentError::InvalidTemplate {
                    event_id: id,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        match EventTemplate::from_raw(&raw, family, config) {
            Ok(template) => {
                if let Some(index) = seen.get(&template.id) {
                    errors.push(ContentError::InvalidTemplate {
                        event_id: template.id.clone(),
                        reason: format!("duplicate id, keeping entry {}", index),
                    });
                    continue;
                }
                seen.insert(template.id.clone(), templates.len());
                templates.push(template);
            }
            Err(e) => errors.push(e),
        }
    }
    (templates, errors)
}
