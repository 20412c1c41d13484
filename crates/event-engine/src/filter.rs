//! The eligibility filter pipeline.
//!
//! Every candidate runs through ten named stages in a fixed order and stops
//! at the first one it fails. The cheap setting checks come first and the
//! group relationship checks come last. A rejection carries the stage and a
//! short reason code, so debug tooling can explain why an event never fires.

use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use clan_state::{Cat, CatId, Clan, EventFamily, GameMode, Role};

use crate::config::EngineConfig;
use crate::participants::pairings;
use crate::session::Session;
use crate::template::{EventTemplate, SupplyKind};

/// What the caller is asking the engine to pick an event for.
#[derive(Debug, Clone)]
pub struct SelectionRequest {
    pub family: EventFamily,
    /// Templates must declare exactly this sub-type set
    pub sub_types: BTreeSet<String>,
    pub ignore_sub_types: bool,
    /// The acting group (a patrol, or the single cat of a moon event)
    pub group: Vec<CatId>,
    /// Roles fixed by the caller before resolution
    pub bound: BTreeMap<Role, CatId>,
    /// Let the secondary come from the whole clan rather than the group
    pub recruit_from_clan: bool,
    /// Rival clan in play for `o_c_n` and diplomacy checks
    pub other_clan: Option<String>,
    /// Restrict candidates to these ids (future-event pools)
    pub allow_ids: Option<BTreeSet<String>>,
    /// Whether repeat avoidance applies and the pick is marked used
    pub track_used: bool,
}

impl SelectionRequest {
    pub fn new(family: EventFamily) -> Self {
        Self {
            family,
            sub_types: BTreeSet::new(),
            ignore_sub_types: false,
            group: Vec::new(),
            bound: BTreeMap::new(),
            recruit_from_clan: false,
            other_clan: None,
            allow_ids: None,
            track_used: true,
        }
    }

    pub fn with_sub_types<I, S>(mut self, sub_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sub_types = sub_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn ignoring_sub_types(mut self) -> Self {
        self.ignore_sub_types = true;
        self
    }

    pub fn with_group(mut self, group: Vec<CatId>) -> Self {
        self.group = group;
        self
    }

    pub fn bind(mut self, role: Role, cat: CatId) -> Self {
        self.bound.insert(role, cat);
        self
    }

    pub fn recruiting(mut self) -> Self {
        self.recruit_from_clan = true;
        self
    }

    pub fn with_other_clan(mut self, name: impl Into<String>) -> Self {
        self.other_clan = Some(name.into());
        self
    }

    pub fn allow_only(mut self, ids: BTreeSet<String>) -> Self {
        self.allow_ids = Some(ids);
        self
    }

    pub fn untracked(mut self) -> Self {
        self.track_used = false;
        self
    }
}

/// Filter stages, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterStage {
    AllowList,
    SubType,
    Setting,
    Tags,
    RoleConstraints,
    Standing,
    Supplies,
    Counts,
    RepeatAvoidance,
    Relations,
}

impl FilterStage {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterStage::AllowList => "allow_list",
            FilterStage::SubType => "sub_type",
            FilterStage::Setting => "setting",
            FilterStage::Tags => "tags",
            FilterStage::RoleConstraints => "role_constraints",
            FilterStage::Standing => "standing",
            FilterStage::Supplies => "supplies",
            FilterStage::Counts => "counts",
            FilterStage::RepeatAvoidance => "repeat_avoidance",
            FilterStage::Relations => "relations",
        }
    }
}

impl fmt::Display for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a candidate was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub event_id: String,
    pub stage: FilterStage,
    pub reason: &'static str,
}

/// Result of one filter run.
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub eligible: Vec<Arc<EventTemplate>>,
    pub rejections: Vec<Rejection>,
    /// The used set was cleared and the pool filtered again
    pub used_reset: bool,
}

/// Reduces a candidate pool to what the request can legally trigger.
pub struct EligibilityFilter<'a> {
    config: &'a EngineConfig,
    clan: &'a Clan,
    request: &'a SelectionRequest,
}

impl<'a> EligibilityFilter<'a> {
    pub fn new(config: &'a EngineConfig, clan: &'a Clan, request: &'a SelectionRequest) -> Self {
        Self { config, clan, request }
    }

    /// Filters `candidates`. If the pool comes back empty because of repeat
    /// avoidance, the used set is cleared and the pool filtered once more.
    pub fn run(&self, candidates: &[Arc<EventTemplate>], session: &mut Session) -> FilterOutcome {
        let first = self.pass(candidates, session);
        let blocked_by_repeats = first
            .rejections
            .iter()
            .any(|r| r.stage == FilterStage::RepeatAvoidance);
        if !first.eligible.is_empty() || !blocked_by_repeats {
            return first;
        }

        info!(
            "No eligible {} events left, clearing {} used events and retrying",
            self.request.family.as_str(),
            session.used.len()
        );
        session.used.clear();
        let mut retry = self.pass(candidates, session);
        retry.used_reset = true;
        retry
    }

    fn pass(&self, candidates: &[Arc<EventTemplate>], session: &mut Session) -> FilterOutcome {
        let mut outcome = FilterOutcome::default();
        for template in candidates {
            match self.check(template, session) {
                Ok(()) => outcome.eligible.push(Arc::clone(template)),
                Err(rejection) => {
                    debug!(
                        "Rejected {} at {}: {}",
                        rejection.event_id, rejection.stage, rejection.reason
                    );
                    outcome.rejections.push(rejection);
                }
            }
        }
        outcome
    }

    /// Runs every stage against one template.
    pub fn check(&self, template: &EventTemplate, session: &mut Session) -> Result<(), Rejection> {
        let reject = |stage: FilterStage, reason: &'static str| Rejection {
            event_id: template.id.clone(),
            stage,
            reason,
        };

        self.allow_list(template, session)
            .map_err(|r| reject(FilterStage::AllowList, r))?;
        self.sub_type(template)
            .map_err(|r| reject(FilterStage::SubType, r))?;
        self.setting(template)
            .map_err(|r| reject(FilterStage::Setting, r))?;
        self.tags(template, session)
            .map_err(|r| reject(FilterStage::Tags, r))?;
        if pairings(template, self.request, self.clan, false).is_empty() {
            return Err(reject(FilterStage::RoleConstraints, "no_fitting_cats"));
        }
        self.standing(template)
            .map_err(|r| reject(FilterStage::Standing, r))?;
        self.supplies(template)
            .map_err(|r| reject(FilterStage::Supplies, r))?;
        self.counts(template)
            .map_err(|r| reject(FilterStage::Counts, r))?;
        self.repeats(template, session)
            .map_err(|r| reject(FilterStage::RepeatAvoidance, r))?;
        if !template.relations.is_empty() && pairings(template, self.request, self.clan, true).is_empty() {
            return Err(reject(FilterStage::Relations, "group_relations"));
        }
        Ok(())
    }

    fn allow_list(&self, template: &EventTemplate, session: &Session) -> Result<(), &'static str> {
        if let Some(allow) = &session.debug.allow_list {
            if !allow.contains(&template.id) {
                return Err("debug_allow_list");
            }
        }
        if session.debug.exclude_list.contains(&template.id) {
            return Err("debug_exclude_list");
        }
        if let Some(allow) = &self.request.allow_ids {
            if !allow.contains(&template.id) {
                return Err("not_in_pool");
            }
        }
        Ok(())
    }

    fn sub_type(&self, template: &EventTemplate) -> Result<(), &'static str> {
        if self.request.ignore_sub_types || template.sub_types == self.request.sub_types {
            Ok(())
        } else {
            Err("sub_type_mismatch")
        }
    }

    fn setting(&self, template: &EventTemplate) -> Result<(), &'static str> {
        if !template.location.allows(&self.clan.biome) {
            return Err("location");
        }
        if !template.season.allows(&self.clan.season) {
            return Err("season");
        }
        if !template.camp.allows(&self.clan.camp) {
            return Err("camp");
        }
        Ok(())
    }

    fn tags(&self, template: &EventTemplate, session: &mut Session) -> Result<(), &'static str> {
        let filter = &self.config.filter;
        let clan = self.clan;

        let mode_tagged = GameMode::all().iter().any(|mode| template.has_tag(mode.tag()));
        if mode_tagged && !template.has_tag(clan.game_mode.tag()) {
            return Err("game_mode");
        }

        if clan.age_moons < filter.min_clan_age_high_drama
            && filter.high_drama_tags.iter().any(|tag| template.has_tag(tag))
        {
            return Err("clan_too_young");
        }

        if template.has_tag("war") && !clan.at_war() {
            return Err("not_at_war");
        }
        if template.has_tag("peace") && clan.at_war() {
            return Err("at_war");
        }
        if template.has_tag("disaster") && clan.has_active_disaster() {
            return Err("disaster_active");
        }
        if template.has_tag("during_disaster") && !clan.has_active_disaster() {
            return Err("no_disaster");
        }

        if let Some(primary) = self.bound_primary() {
            if primary.gender_changed && changes_gender(template) {
                return Err("already_transitioned");
            }

            let elderly = primary.moons >= filter.old_age_start_moons;
            let old_age = template.sub_types.contains("old_age");
            if old_age && !elderly {
                return Err("too_young_for_old_age");
            }
            if elderly
                && !old_age
                && template.sub_types.contains("death")
                && session.rng.gen_range(0..100) < filter.old_age_skip_percent
            {
                return Err("old_age_throttle");
            }
        }

        if takes_all_lives(template)
            && !template.has_tag("murder")
            && session.rng.gen_range(0..filter.all_lives_one_in.max(1)) != 0
        {
            return Err("all_lives_throttle");
        }

        Ok(())
    }

    fn standing(&self, template: &EventTemplate) -> Result<(), &'static str> {
        if !template.outsider.is_empty() && !template.outsider.contains(&self.clan.outsider_standing()) {
            return Err("outsider_reputation");
        }
        if !template.other_clan.is_empty() {
            let other = self
                .request
                .other_clan
                .as_deref()
                .and_then(|name| self.clan.other_clan(name));
            match other {
                Some(other) if template.other_clan.contains(&other.standing()) => {}
                Some(_) => return Err("other_clan_standing"),
                None => return Err("no_other_clan"),
            }
        }
        Ok(())
    }

    fn supplies(&self, template: &EventTemplate) -> Result<(), &'static str> {
        if !template.touches_supplies() {
            return Ok(());
        }
        let filter = &self.config.filter;
        if self.clan.age_moons < filter.min_clan_age_for_supply_events {
            return Err("clan_too_young_for_supplies");
        }

        for trigger in &template.supply_triggers {
            if trigger.levels.is_empty() {
                continue;
            }
            let level = match &trigger.kind {
                SupplyKind::Freshkill => self.clan.freshkill_level(filter.freshkill_per_cat),
                SupplyKind::AnyHerb => self.clan.herb_level(filter.herbs_per_cat, false),
                SupplyKind::AllHerb => self.clan.herb_level(filter.herbs_per_cat, true),
                SupplyKind::Herb(name) => self.clan.herb_level_of(name, filter.herbs_per_cat),
            };
            if !trigger.levels.contains(&level) {
                return Err("supply_level");
            }
        }
        Ok(())
    }

    fn counts(&self, template: &EventTemplate) -> Result<(), &'static str> {
        let group: Vec<&Cat> = self
            .request
            .group
            .iter()
            .filter_map(|id| self.clan.cat(id))
            .filter(|cat| cat.is_active())
            .collect();
        if group.len() < template.min_cats || group.len() > template.max_cats {
            return Err("group_size");
        }
        if !template.rank_bounds.iter().all(|bound| bound.allows(&group)) {
            return Err("rank_count");
        }
        Ok(())
    }

    fn repeats(&self, template: &EventTemplate, session: &Session) -> Result<(), &'static str> {
        if !self.config.selection.repeat_avoidance || !self.request.track_used {
            return Ok(());
        }
        if session.debug.ensure_event.as_deref() == Some(template.id.as_str()) {
            return Ok(());
        }
        if session.used.contains(&template.id) {
            return Err("already_used");
        }
        Ok(())
    }

    fn bound_primary(&self) -> Option<&'a Cat> {
        self.request
            .bound
            .get(&Role::Primary)
            .and_then(|id| self.clan.cat(id))
    }
}

fn changes_gender(template: &EventTemplate) -> bool {
    template.has_tag("gender_change")
        || template
            .all_outcomes()
            .any(|block| block.gender_change.contains(&Role::Primary))
}

fn takes_all_lives(template: &EventTemplate) -> bool {
    template.has_tag("all_lives") || template.all_outcomes().any(|block| block.all_lives)
}
