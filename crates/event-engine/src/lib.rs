//! Event selection and outcome engine for a clan life-sim.
//!
//! Given a [`Clan`] snapshot, the engine picks a weighted-random eligible
//! event from authored content, binds cats to its roles, rolls for success
//! and writes the chosen outcome back onto the clan.
//!
//! The pipeline, leaf first:
//! - [`catalog`]: loads, validates and caches templates per bucket
//! - [`filter`]: staged eligibility checks with reason codes
//! - [`select`]: weighted choice and the romance preemption gate
//! - [`participants`]: binds roles to concrete cats
//! - [`outcome`]: success chance and outcome block choice
//! - [`effects`]: applies an outcome to the clan
//! - [`text`]: placeholder substitution
//!
//! [`EventEngine`] drives one event through all of them. Randomness and
//! the used-event set live in a [`Session`] passed into every call.

pub mod catalog;
pub mod config;
pub mod effects;
pub mod error;
pub mod filter;
pub mod outcome;
pub mod output;
pub mod participants;
pub mod select;
pub mod session;
pub mod template;
pub mod text;

// Re-export commonly used types
pub use catalog::{BucketKey, Catalog, DirectorySource, MemorySource, TemplateSource};
pub use config::{
    default_config_toml, ConfigError, DifficultyConfig, EffectsConfig, EngineConfig, FilterConfig,
    OutcomeConfig, ReactionConfig, RomanceConfig, SelectionConfig, TomlSerializeError, WeightConfig,
};
pub use effects::{AppliedEvent, EffectApplicator, EffectSummary};
pub use error::{ContentError, EngineError, Result};
pub use filter::{EligibilityFilter, FilterOutcome, FilterStage, Rejection, SelectionRequest};
pub use outcome::{success_chance, OutcomeResolver, ResolvedOutcome};
pub use output::{EventReport, Lifecycle, PatrolAction, PatrolRequest, PendingPatrol};
pub use participants::{Bindings, Pairing};
pub use select::{choose_weighted, romance_odds, romance_preempts, weighted_index};
pub use session::{DebugOverrides, Session};
pub use template::{EventTemplate, OutcomeBlock, RoleConstraint};
pub use text::{render, Snippets, TextContext};

use rand::seq::SliceRandom;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use clan_state::{CatId, Clan, EventFamily, FutureEvent, RelationshipAxis, Role};

/// One template drawn from a pool, with its roles bound.
struct Draw {
    template: Arc<EventTemplate>,
    bindings: Bindings,
    /// Chosen through the debug ensure override
    forced: bool,
}

/// A selected event waiting for outcome resolution.
struct Bound {
    template: Arc<EventTemplate>,
    bindings: Bindings,
    group: Vec<CatId>,
    other_clan: Option<String>,
    trace: Vec<Lifecycle>,
}

/// Drives events from candidate pool to applied effects.
///
/// The engine owns the content catalog and configuration. It never owns the
/// clan: filtering and resolution read it, effect application writes it.
pub struct EventEngine<S: TemplateSource> {
    catalog: Catalog<S>,
    config: EngineConfig,
}

impl<S: TemplateSource> EventEngine<S> {
    /// Creates an engine reading content from `source`.
    pub fn new(source: S, config: EngineConfig) -> Self {
        Self {
            catalog: Catalog::new(source, config.clone()),
            config,
        }
    }

    /// Creates an engine with settings from a TOML file.
    pub fn from_config_file(source: S, path: &Path) -> Result<Self> {
        let config = EngineConfig::from_file(path)?;
        Ok(Self::new(source, config))
    }

    pub fn with_defaults(source: S) -> Self {
        Self::new(source, EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog<S> {
        &self.catalog
    }

    /// Drops cached content so edited files are picked up.
    pub fn reload_content(&mut self) {
        debug!("Dropping {} cached content buckets", self.catalog.cached_buckets());
        self.catalog.clear_cache();
    }

    /// Runs the eligibility filter for `request` without selecting
    /// anything. Debug tooling uses the rejections to explain why an event
    /// never fires.
    pub fn eligible(&mut self, clan: &Clan, session: &mut Session, request: &SelectionRequest) -> FilterOutcome {
        if session.debug.is_active() {
            debug!("Debug overrides active for {} selection: {:?}", request.family, session.debug);
        }
        let ensure = session.debug.ensure_event.clone();
        let candidates = self
            .catalog
            .query(request.family, clan.biome, clan.season, ensure.as_deref());
        EligibilityFilter::new(&self.config, clan, request).run(&candidates, session)
    }

    /// Selects a patrol for `patrol.group` and renders its intro.
    ///
    /// Romance patrols are drawn from their own pool and replace the
    /// ordinary pick only when the romance gate lets them through.
    pub fn start_patrol(&mut self, clan: &Clan, session: &mut Session, patrol: PatrolRequest) -> Result<PendingPatrol> {
        if let Some(id) = patrol.group.iter().find(|id| clan.cat(id).is_none()) {
            return Err(EngineError::UnknownCat(id.clone()));
        }

        let request = SelectionRequest::new(EventFamily::Patrol)
            .with_sub_types(patrol.sub_types)
            .with_group(patrol.group);
        let bound = self.select(clan, session, request, true)?;
        let intro = self.render_text(&bound.template.intro_text, clan, &bound, session);

        Ok(PendingPatrol {
            template: bound.template,
            bindings: bound.bindings,
            group: bound.group,
            other_clan: bound.other_clan,
            intro,
            trace: bound.trace,
        })
    }

    /// Finishes a patrol started with [`EventEngine::start_patrol`].
    ///
    /// Declining renders the decline text and leaves the clan untouched.
    pub fn resolve_patrol(
        &mut self,
        clan: &mut Clan,
        session: &mut Session,
        pending: PendingPatrol,
        action: PatrolAction,
    ) -> Result<EventReport> {
        let bound = Bound {
            template: pending.template,
            bindings: pending.bindings,
            group: pending.group,
            other_clan: pending.other_clan,
            trace: pending.trace,
        };

        if action != PatrolAction::Decline {
            return self.fire(clan, session, bound, action == PatrolAction::Antagonize);
        }

        let text = self.render_text(&bound.template.decline_text, clan, &bound, session);
        info!("Patrol {} declined", bound.template.id);
        let mut trace = bound.trace;
        trace.push(Lifecycle::Declined);
        Ok(EventReport {
            event_id: bound.template.id.clone(),
            family: bound.template.family,
            lifecycle: Lifecycle::Declined,
            trace,
            bindings: bound.bindings,
            other_clan: bound.other_clan,
            success: None,
            chance: None,
            text,
            effects: EffectSummary::default(),
        })
    }

    /// Fires one moon event centred on `cat`. The secondary, if the
    /// template wants one, may be any active cat in the clan.
    pub fn generate_moon_event(
        &mut self,
        clan: &mut Clan,
        session: &mut Session,
        cat: &CatId,
        sub_types: &[&str],
    ) -> Result<EventReport> {
        if !clan.is_active(cat) {
            return Err(EngineError::UnknownCat(cat.clone()));
        }

        let request = SelectionRequest::new(EventFamily::Short)
            .with_sub_types(sub_types.iter().copied())
            .with_group(vec![cat.clone()])
            .bind(Role::Primary, cat.clone())
            .recruiting();
        let bound = self.select(clan, session, request, false)?;
        self.fire(clan, session, bound, false)
    }

    /// Counts every scheduled follow-up down by one moon and fires those
    /// that are due.
    ///
    /// Cats no longer in the clan are dropped from the frozen bindings. A
    /// follow-up with nobody left, or with no eligible event, is dropped
    /// with a log line and never fails the call.
    pub fn advance_future_events(&mut self, clan: &mut Clan, session: &mut Session) -> Vec<EventReport> {
        let mut due = Vec::new();
        let mut waiting = Vec::new();
        for mut future in std::mem::take(&mut clan.future_events) {
            if future.tick() {
                due.push(future);
            } else {
                waiting.push(future);
            }
        }
        // Follow-ups scheduled while firing land after the survivors
        clan.future_events = waiting;

        let mut reports = Vec::new();
        for future in due {
            let parent = future.parent_event.clone();
            match self.fire_future(clan, session, future) {
                Ok(Some(report)) => reports.push(report),
                Ok(None) => {}
                Err(e) => warn!("Follow-up of {} failed: {}", parent, e),
            }
        }
        reports
    }

    /// Reactions of living cats close to `deceased`.
    ///
    /// A cat reacts when any relationship axis towards the deceased reaches
    /// the configured threshold, or when the two are family or mates.
    /// Reactions never count as used events.
    pub fn death_reactions(
        &mut self,
        clan: &mut Clan,
        session: &mut Session,
        deceased: &CatId,
    ) -> Result<Vec<EventReport>> {
        let dead = clan
            .cat(deceased)
            .ok_or_else(|| EngineError::UnknownCat(deceased.clone()))?;
        let threshold = self.config.reactions.threshold;
        let reactors: Vec<CatId> = clan
            .active_cats()
            .filter(|cat| cat.id != *deceased)
            .filter(|cat| {
                let close = clan
                    .relationships
                    .get(&cat.id, deceased)
                    .map_or(false, |r| RelationshipAxis::all().iter().any(|axis| r.get(*axis) >= threshold));
                close || cat.is_family_of(dead)
            })
            .map(|cat| cat.id.clone())
            .collect();

        let mut reports = Vec::new();
        for reactor in reactors {
            if reports.len() >= self.config.reactions.max_reactions {
                break;
            }
            let request = SelectionRequest::new(EventFamily::DeathReaction)
                .ignoring_sub_types()
                .with_group(vec![reactor.clone()])
                .bind(Role::Primary, reactor.clone())
                .bind(Role::Secondary, deceased.clone())
                .untracked();
            match self.select(clan, session, request, false) {
                Ok(bound) => reports.push(self.fire(clan, session, bound, false)?),
                Err(EngineError::ExhaustedPool { .. }) => {
                    debug!("No reaction for {} to the death of {}", reactor, deceased)
                }
                Err(e) => return Err(e),
            }
        }
        Ok(reports)
    }

    /// Text for `cat`'s ceremony, e.g. `"apprentice"` or `"warrior"`. The
    /// cat's mentor, if any, is bound as the secondary.
    pub fn ceremony_text(
        &mut self,
        clan: &mut Clan,
        session: &mut Session,
        cat: &CatId,
        ceremony: &str,
    ) -> Result<EventReport> {
        let subject = clan.cat(cat).ok_or_else(|| EngineError::UnknownCat(cat.clone()))?;
        let mut request = SelectionRequest::new(EventFamily::Ceremony)
            .with_sub_types([ceremony])
            .with_group(vec![cat.clone()])
            .bind(Role::Primary, cat.clone())
            .untracked();
        if let Some(mentor) = subject.mentor.clone().filter(|m| clan.cat(m).is_some()) {
            request = request.bind(Role::Secondary, mentor);
        }

        let bound = self.select(clan, session, request, false)?;
        self.fire(clan, session, bound, false)
    }

    /// Filters, draws and binds one event.
    ///
    /// Candidates whose roles cannot be cast are removed and the draw
    /// repeated. The pool is exhausted only when every eligible template
    /// fails to cast.
    fn select(
        &mut self,
        clan: &Clan,
        session: &mut Session,
        mut request: SelectionRequest,
        with_romance: bool,
    ) -> Result<Bound> {
        if request.other_clan.is_none() {
            if let Some(other) = clan.other_clans.choose(&mut session.rng) {
                request.other_clan = Some(other.name.clone());
            }
        }

        let mut trace = vec![Lifecycle::Candidate];
        let filtered = self.eligible(clan, session, &request);
        if filtered.eligible.is_empty() {
            return Err(exhausted(&request));
        }
        trace.push(Lifecycle::FilteredEligible);
        debug!(
            "{} {} events eligible, {} rejected",
            filtered.eligible.len(),
            request.family,
            filtered.rejections.len()
        );

        if let Some(id) = &session.debug.ensure_event {
            if !filtered.eligible.iter().any(|t| &t.id == id) {
                debug!("Debug override {} is not eligible", id);
            }
        }

        let (romance, ordinary): (Vec<_>, Vec<_>) = if with_romance {
            filtered.eligible.into_iter().partition(|t| t.is_romance())
        } else {
            (Vec::new(), filtered.eligible)
        };
        let ordinary = self.draw(ordinary, clan, &request, session);
        let romance = self.draw(romance, clan, &request, session);

        let draw = match (ordinary, romance) {
            (Some(ordinary), Some(romance))
                if !ordinary.forced && (romance.forced || self.romance_wins(clan, &romance, session)) =>
            {
                romance
            }
            (Some(ordinary), _) => ordinary,
            (None, romance) => romance.ok_or_else(|| exhausted(&request))?,
        };
        trace.push(Lifecycle::Selected);
        trace.push(Lifecycle::ParticipantsResolved);

        if request.track_used && self.config.selection.repeat_avoidance && !draw.forced {
            session.used.mark(draw.template.id.clone());
        }
        debug!("Selected {} event {}", request.family, draw.template.id);

        Ok(Bound {
            template: draw.template,
            bindings: draw.bindings,
            group: request.group,
            other_clan: request.other_clan,
            trace,
        })
    }

    /// Weighted draw from `pool`, falling back to the next pick whenever a
    /// template's roles cannot be cast or none of its outcomes can.
    fn draw(
        &self,
        mut pool: Vec<Arc<EventTemplate>>,
        clan: &Clan,
        request: &SelectionRequest,
        session: &mut Session,
    ) -> Option<Draw> {
        if let Some(id) = session.debug.ensure_event.clone() {
            if let Some(index) = pool.iter().position(|t| t.id == id) {
                let template = pool.remove(index);
                match self.cast(&template, clan, request, session) {
                    Some(bindings) => {
                        debug!("Debug override forced {}", id);
                        return Some(Draw {
                            template,
                            bindings,
                            forced: true,
                        });
                    }
                    None => debug!("Debug override {} could not be cast", id),
                }
            }
        }

        while !pool.is_empty() {
            let weights: Vec<u32> = pool.iter().map(|t| t.weight).collect();
            let index = weighted_index(&mut session.rng, &weights)?;
            let template = pool.remove(index);
            match self.cast(&template, clan, request, session) {
                Some(bindings) => {
                    return Some(Draw {
                        template,
                        bindings,
                        forced: false,
                    })
                }
                None => debug!("{} cannot be cast, drawing again", template.id),
            }
        }
        None
    }

    /// Binds the template's roles, or `None` when no cats fit or no
    /// outcome could be resolved with the cats that do.
    fn cast(
        &self,
        template: &EventTemplate,
        clan: &Clan,
        request: &SelectionRequest,
        session: &mut Session,
    ) -> Option<Bindings> {
        let bindings = participants::resolve(template, request, clan, &mut session.rng)?;
        let forced = session.debug.force_outcome;
        if OutcomeResolver::new(&self.config, clan).can_resolve(template, false, &bindings, &request.group, forced) {
            Some(bindings)
        } else {
            debug!("No outcome of {} fits the cast cats", template.id);
            None
        }
    }

    fn romance_wins(&self, clan: &Clan, draw: &Draw, session: &mut Session) -> bool {
        let pair = draw
            .bindings
            .get(&Role::Primary)
            .zip(draw.bindings.get(&Role::Secondary))
            .and_then(|(a, b)| clan.cat(a).zip(clan.cat(b)));
        let odds = match pair {
            Some((a, b)) => romance_odds(a, b, clan, &self.config.romance),
            None => self.config.romance.base_odds,
        };
        let wins = romance_preempts(&mut session.rng, odds);
        debug!(
            "Romance candidate {} at one in {}: {}",
            draw.template.id,
            odds,
            if wins { "preempts" } else { "passed over" }
        );
        wins
    }

    /// Resolves the outcome of a bound event and applies it.
    fn fire(&mut self, clan: &mut Clan, session: &mut Session, bound: Bound, antagonize: bool) -> Result<EventReport> {
        let Bound {
            template,
            mut bindings,
            group,
            other_clan,
            mut trace,
        } = bound;

        // 1. Decide success and pick the outcome block
        let resolved = OutcomeResolver::new(&self.config, clan).resolve(&template, antagonize, &bindings, &group, session)?;
        if let Some(stat_cat) = &resolved.stat_cat {
            bindings.insert(Role::StatCat, stat_cat.clone());
        }
        trace.push(Lifecycle::OutcomeDetermined);

        // 2. Apply effects
        let snippets = self.catalog.snippets();
        let event = AppliedEvent {
            template: &template,
            block: resolved.block,
            success: resolved.success,
            group: &group,
            other_clan: other_clan.as_deref(),
        };
        let effects = EffectApplicator::new(&self.config, &snippets).apply(clan, &event, &mut bindings, &mut session.rng);
        trace.push(Lifecycle::EffectsApplied);

        // 3. Render against the updated clan so new cats have names
        let ctx = TextContext {
            clan: &*clan,
            bindings: &bindings,
            other_clan: other_clan.as_deref(),
            snippets: &snippets,
        };
        let text = render(&resolved.block.text, &ctx, &mut session.rng);

        let lifecycle = if effects.scheduled.is_empty() {
            Lifecycle::EffectsApplied
        } else {
            trace.push(Lifecycle::FutureScheduled);
            Lifecycle::FutureScheduled
        };
        info!(
            "Fired {} event {} ({})",
            template.family,
            template.id,
            if resolved.success { "success" } else { "failure" }
        );

        Ok(EventReport {
            event_id: template.id.clone(),
            family: template.family,
            lifecycle,
            trace,
            bindings,
            other_clan,
            success: Some(resolved.success),
            chance: resolved.chance,
            text,
            effects,
        })
    }

    fn fire_future(&mut self, clan: &mut Clan, session: &mut Session, future: FutureEvent) -> Result<Option<EventReport>> {
        let had_roles = !future.roles.is_empty();
        let mut bindings = Bindings::new();
        for (role, id) in future.roles {
            if role == Role::StatCat {
                continue;
            }
            if clan.is_active(&id) {
                bindings.insert(role, id);
            } else {
                debug!(
                    "Dropping {} from the follow-up of {}: {} is no longer in the clan",
                    role, future.parent_event, id
                );
            }
        }
        if had_roles && bindings.is_empty() {
            debug!("Follow-up of {} has nobody left, dropping it", future.parent_event);
            return Ok(None);
        }

        let mut group: Vec<CatId> = Vec::new();
        for id in bindings.values() {
            if !group.contains(id) {
                group.push(id.clone());
            }
        }
        if group.is_empty() {
            group = clan.active_cats().map(|c| c.id.clone()).collect();
        }

        // Missing roles are never recast from the wider clan
        let mut request = SelectionRequest::new(future.family)
            .with_group(group)
            .untracked();
        for (role, id) in bindings {
            request = request.bind(role, id);
        }
        request = if future.pool.sub_types.is_empty() {
            request.ignoring_sub_types()
        } else {
            request.with_sub_types(future.pool.sub_types)
        };
        if !future.pool.event_ids.is_empty() {
            request = request.allow_only(future.pool.event_ids.into_iter().collect());
        }

        match self.select(clan, session, request, false) {
            Ok(bound) => self.fire(clan, session, bound, false).map(Some),
            Err(EngineError::ExhaustedPool { .. }) => {
                warn!(
                    "No {} event left for the follow-up of {}, dropping it",
                    future.family, future.parent_event
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn render_text(&mut self, text: &str, clan: &Clan, bound: &Bound, session: &mut Session) -> String {
        let snippets = self.catalog.snippets();
        let ctx = TextContext {
            clan,
            bindings: &bound.bindings,
            other_clan: bound.other_clan.as_deref(),
            snippets: &snippets,
        };
        render(text, &ctx, &mut session.rng)
    }
}

fn exhausted(request: &SelectionRequest) -> EngineError {
    EngineError::ExhaustedPool {
        family: request.family,
        sub_types: request.sub_types.iter().cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clan_state::fixtures::sample_clan;
    use clan_state::{CatState, FuturePool, HistoryKind};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn engine(family: EventFamily, templates: Vec<serde_json::Value>) -> EventEngine<MemorySource> {
        let source = MemorySource::new().with_templates(BucketKey::new(family, None, None), templates);
        EventEngine::with_defaults(source)
    }

    fn ids(ids: &[&str]) -> Vec<CatId> {
        ids.iter().map(|id| CatId::from(*id)).collect()
    }

    fn hunt() -> serde_json::Value {
        json!({
            "event_id": "gen_hunt_mouse",
            "intro_text": "p_l leads the patrol into the trees.",
            "decline_text": "p_l decides to head home.",
            "success_outcomes": [{"text": "p_l catches a mouse.", "exp": 20}],
            "fail_outcomes": [{"text": "p_l scares the mouse away."}]
        })
    }

    #[test]
    fn test_patrol_proceed_applies_outcome() {
        let mut clan = sample_clan();
        let mut session = Session::seeded(42);
        session.force_outcome(true);
        let mut engine = engine(EventFamily::Patrol, vec![hunt()]);

        let pending = engine
            .start_patrol(&clan, &mut session, PatrolRequest::new(ids(&["c1", "c4"])))
            .unwrap();
        assert_eq!(pending.event_id(), "gen_hunt_mouse");
        assert!(pending.intro_text().ends_with(" leads the patrol into the trees."));

        let report = engine
            .resolve_patrol(&mut clan, &mut session, pending, PatrolAction::Proceed)
            .unwrap();
        assert_eq!(report.success, Some(true));
        assert_eq!(report.lifecycle, Lifecycle::EffectsApplied);
        assert!(report.text.ends_with(" catches a mouse."));
        assert_eq!(report.effects.experience.len(), 2);
        assert_eq!(clan.cat(&CatId::from("c4")).unwrap().experience, 60);
        assert!(session.used.contains("gen_hunt_mouse"));
    }

    #[test]
    fn test_patrol_decline_touches_nothing() {
        let mut clan = sample_clan();
        let before = clan.clone();
        let mut session = Session::seeded(3);
        let mut engine = engine(EventFamily::Patrol, vec![hunt()]);

        let pending = engine
            .start_patrol(&clan, &mut session, PatrolRequest::new(ids(&["c4"])))
            .unwrap();
        let report = engine
            .resolve_patrol(&mut clan, &mut session, pending, PatrolAction::Decline)
            .unwrap();

        assert_eq!(report.lifecycle, Lifecycle::Declined);
        assert_eq!(report.success, None);
        assert_eq!(report.text, "Sandstorm decides to head home.");
        assert!(!report.passed(Lifecycle::OutcomeDetermined));
        assert_eq!(report.effects, EffectSummary::default());
        assert_eq!(
            serde_json::to_value(&clan).unwrap(),
            serde_json::to_value(&before).unwrap()
        );
    }

    #[test]
    fn test_unknown_cat_in_patrol() {
        let clan = sample_clan();
        let mut session = Session::seeded(1);
        let mut engine = engine(EventFamily::Patrol, vec![hunt()]);

        let result = engine.start_patrol(&clan, &mut session, PatrolRequest::new(ids(&["c1", "c99"])));
        assert!(matches!(result, Err(EngineError::UnknownCat(id)) if id == CatId::from("c99")));
    }

    #[test]
    fn test_exhausted_pool_is_an_error() {
        let clan = sample_clan();
        let mut session = Session::seeded(1);
        let mut engine = engine(EventFamily::Patrol, vec![hunt()]);

        let result = engine.start_patrol(
            &clan,
            &mut session,
            PatrolRequest::new(ids(&["c1"])).with_sub_type("border"),
        );
        assert!(matches!(result, Err(EngineError::ExhaustedPool { family: EventFamily::Patrol, .. })));
    }

    #[test]
    fn test_uncastable_candidate_never_selected() {
        let clan = sample_clan();
        let mut session = Session::seeded(8);
        let training = json!({
            "event_id": "gen_train_app",
            "weight": 1000,
            "success_outcomes": [{"text": "p_l watches app1 stalk a beetle."}]
        });
        let mut engine = engine(EventFamily::Patrol, vec![training, hunt()]);

        // No apprentice in the group, so only the hunt can be cast
        for _ in 0..10 {
            let pending = engine
                .start_patrol(&clan, &mut session, PatrolRequest::new(ids(&["c1", "c4"])))
                .unwrap();
            assert_eq!(pending.event_id(), "gen_hunt_mouse");
        }
    }

    fn swim_only() -> serde_json::Value {
        json!({
            "event_id": "gen_swim_only",
            "weight": 50,
            "success_outcomes": [{"text": "s_c swims out for the trout.", "stat_trait": ["no_such_trait"]}]
        })
    }

    #[test]
    fn test_template_without_stat_cat_falls_back() {
        let mut clan = sample_clan();
        let mut engine = engine(EventFamily::Patrol, vec![swim_only(), hunt()]);

        for seed in 0..40 {
            let mut session = Session::seeded(seed);
            let pending = engine
                .start_patrol(&clan, &mut session, PatrolRequest::new(ids(&["c1", "c4"])))
                .unwrap();
            assert_eq!(pending.event_id(), "gen_hunt_mouse");
            assert!(!session.used.contains("gen_swim_only"));

            let report = engine
                .resolve_patrol(&mut clan, &mut session, pending, PatrolAction::Proceed)
                .unwrap();
            assert_eq!(report.event_id, "gen_hunt_mouse");
        }
    }

    #[test]
    fn test_no_resolvable_template_is_exhausted() {
        let clan = sample_clan();
        let mut session = Session::seeded(3);
        let mut engine = engine(EventFamily::Patrol, vec![swim_only()]);

        let result = engine.start_patrol(&clan, &mut session, PatrolRequest::new(ids(&["c1", "c4"])));
        assert!(matches!(result, Err(EngineError::ExhaustedPool { .. })));
        assert!(session.used.is_empty());
    }

    #[test]
    fn test_forced_failure_skips_success_only_template() {
        let mut clan = sample_clan();
        let sunny = json!({
            "event_id": "gen_sunny_walk",
            "weight": 1000,
            "success_outcomes": [{"text": "p_l enjoys the sun."}]
        });
        let mut engine = engine(EventFamily::Patrol, vec![sunny, hunt()]);

        for seed in 0..10 {
            let mut session = Session::seeded(seed);
            session.force_outcome(false);
            let pending = engine
                .start_patrol(&clan, &mut session, PatrolRequest::new(ids(&["c4"])))
                .unwrap();
            let report = engine
                .resolve_patrol(&mut clan, &mut session, pending, PatrolAction::Proceed)
                .unwrap();
            assert_eq!(report.event_id, "gen_hunt_mouse");
            assert_eq!(report.success, Some(false));
            assert_eq!(report.text, "Sandstorm scares the mouse away.");
        }
    }

    #[test]
    fn test_moon_event_kills_primary() {
        let mut clan = sample_clan();
        let mut session = Session::seeded(9);
        let mut engine = engine(
            EventFamily::Short,
            vec![json!({
                "event_id": "gen_old_age_death",
                "m_c": {"age": ["senior"], "dies": true},
                "text": "m_c falls asleep and never wakes.",
                "history_text": {"reg_death": "m_c died in m_c's sleep."}
            })],
        );

        let report = engine
            .generate_moon_event(&mut clan, &mut session, &CatId::from("c7"), &[])
            .unwrap();
        assert_eq!(report.text, "Mousefur falls asleep and never wakes.");
        assert_eq!(report.effects.died, ids(&["c7"]));
        let elder = clan.cat(&CatId::from("c7")).unwrap();
        assert_eq!(elder.state, CatState::Dead);
        assert!(clan
            .log
            .iter()
            .any(|e| e.cat == CatId::from("c7") && e.kind == HistoryKind::Death));
    }

    #[test]
    fn test_moon_event_for_missing_cat() {
        let mut clan = sample_clan();
        let mut session = Session::seeded(1);
        let mut engine = engine(EventFamily::Short, vec![]);

        let result = engine.generate_moon_event(&mut clan, &mut session, &CatId::from("c42"), &[]);
        assert!(matches!(result, Err(EngineError::UnknownCat(_))));
    }

    #[test]
    fn test_future_event_fires_with_frozen_roles() {
        let mut clan = sample_clan();
        let mut session = Session::seeded(21);
        let mut engine = engine(
            EventFamily::Short,
            vec![json!({
                "event_id": "gen_fox_returns",
                "sub_type": ["fox_return"],
                "text": "The fox comes back for m_c and app1."
            })],
        );

        let mut roles = BTreeMap::new();
        roles.insert(Role::Primary, CatId::from("c4"));
        roles.insert(Role::Apprentice(1), CatId::from("c5"));
        clan.future_events.push(FutureEvent {
            parent_event: "gen_fox_den".to_string(),
            family: EventFamily::Short,
            pool: FuturePool {
                sub_types: vec!["fox_return".to_string()],
                event_ids: vec![],
            },
            moons_remaining: 2,
            roles: roles.clone(),
        });

        assert!(engine.advance_future_events(&mut clan, &mut session).is_empty());
        let reports = engine.advance_future_events(&mut clan, &mut session);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].text, "The fox comes back for Sandstorm and Ashpaw.");
        assert_eq!(reports[0].bindings[&Role::Primary], CatId::from("c4"));
        assert_eq!(reports[0].bindings[&Role::Apprentice(1)], CatId::from("c5"));
        assert!(clan.future_events.is_empty());
    }

    #[test]
    fn test_future_event_dropped_when_cats_gone() {
        let mut clan = sample_clan();
        let mut session = Session::seeded(4);
        let mut engine = engine(
            EventFamily::Short,
            vec![json!({"event_id": "gen_follow_up", "text": "m_c remembers."})],
        );

        let mut roles = BTreeMap::new();
        roles.insert(Role::Primary, CatId::from("c7"));
        clan.future_events.push(FutureEvent {
            parent_event: "gen_elder_story".to_string(),
            family: EventFamily::Short,
            pool: FuturePool::default(),
            moons_remaining: 1,
            roles,
        });
        clan.set_state(&CatId::from("c7"), CatState::Dead);

        assert!(engine.advance_future_events(&mut clan, &mut session).is_empty());
        assert!(clan.future_events.is_empty());
    }

    #[test]
    fn test_death_reactions_from_close_cats() {
        let mut clan = sample_clan();
        let mut session = Session::seeded(17);
        let mut engine = engine(
            EventFamily::DeathReaction,
            vec![json!({
                "event_id": "gen_grief",
                "text": "m_c grieves for r_c."
            })],
        );
        clan.set_state(&CatId::from("c2"), CatState::Dead);

        let reports = engine
            .death_reactions(&mut clan, &mut session, &CatId::from("c2"))
            .unwrap();

        // Silverstream (mate, romantic 65), Ashpaw and Brackenkit (children)
        let reactors: Vec<&CatId> = reports.iter().filter_map(|r| r.primary()).collect();
        assert_eq!(reactors, vec![&CatId::from("c3"), &CatId::from("c5"), &CatId::from("c8")]);
        assert_eq!(reports[0].text, "Silverstream grieves for Graystripe.");
        assert!(session.used.is_empty());
    }

    #[test]
    fn test_death_reactions_capped() {
        let mut clan = sample_clan();
        let mut session = Session::seeded(17);
        let mut config = EngineConfig::default();
        config.reactions.max_reactions = 1;
        let source = MemorySource::new().with_templates(
            BucketKey::new(EventFamily::DeathReaction, None, None),
            vec![json!({"event_id": "gen_grief", "text": "m_c grieves for r_c."})],
        );
        let mut engine = EventEngine::new(source, config);
        clan.set_state(&CatId::from("c2"), CatState::Dead);

        let reports = engine
            .death_reactions(&mut clan, &mut session, &CatId::from("c2"))
            .unwrap();
        assert_eq!(reports.len(), 1);
    }

    #[test]
    fn test_ceremony_binds_mentor() {
        let mut clan = sample_clan();
        let mut session = Session::seeded(2);
        let mut engine = engine(
            EventFamily::Ceremony,
            vec![
                json!({
                    "event_id": "ceremony_warrior",
                    "sub_type": ["warrior"],
                    "text": "r_c proudly watches m_c take a warrior name."
                }),
                json!({
                    "event_id": "ceremony_elder",
                    "sub_type": ["elder"],
                    "text": "m_c retires to the elders' den."
                }),
            ],
        );

        let report = engine
            .ceremony_text(&mut clan, &mut session, &CatId::from("c5"), "warrior")
            .unwrap();
        assert_eq!(report.event_id, "ceremony_warrior");
        assert_eq!(report.text, "Sandstorm proudly watches Ashpaw take a warrior name.");
        assert!(session.used.is_empty());
    }

    #[test]
    fn test_ensure_override_is_not_marked_used() {
        let clan = sample_clan();
        let mut session = Session::seeded(5);
        session.ensure_event("gen_rare");
        let rare = json!({
            "event_id": "gen_rare",
            "weight": 1,
            "success_outcomes": [{"text": "p_l finds a strange stone."}]
        });
        let common = json!({
            "event_id": "gen_common",
            "weight": 1000,
            "success_outcomes": [{"text": "p_l walks the border."}]
        });
        let mut engine = engine(EventFamily::Patrol, vec![common, rare]);

        for _ in 0..5 {
            let pending = engine
                .start_patrol(&clan, &mut session, PatrolRequest::new(ids(&["c1"])))
                .unwrap();
            assert_eq!(pending.event_id(), "gen_rare");
        }
        assert!(session.used.is_empty());
    }
}
