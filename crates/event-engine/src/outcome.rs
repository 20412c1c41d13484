//! Outcome resolution: success chance, the success roll and the outcome
//! block that gets applied.
//!
//! Both pools are filtered once for outcomes the bound cats can carry, and
//! that is also where each outcome picks its stat cat. One block is drawn
//! from each pool before the roll so whichever branch wins has its block
//! ready.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use clan_state::{Cat, CatId, Clan, GameMode, Role};

use crate::config::{EngineConfig, OutcomeConfig};
use crate::error::{EngineError, Result};
use crate::participants::Bindings;
use crate::select::choose_weighted;
use crate::session::Session;
use crate::template::{EventTemplate, OutcomeBlock};

/// The branch and block chosen for a resolved event.
#[derive(Debug, Clone)]
pub struct ResolvedOutcome<'t> {
    pub success: bool,
    pub block: &'t OutcomeBlock,
    pub stat_cat: Option<CatId>,
    /// Chance the roll was made against, if there was a roll
    pub chance: Option<f32>,
}

/// An outcome that passed role validation, with its stat cat.
#[derive(Debug, Clone)]
struct Candidate<'t> {
    block: &'t OutcomeBlock,
    stat_cat: Option<CatId>,
}

/// Every cat taking part: bound roles first, then the rest of the group.
pub fn participants(bindings: &Bindings, group: &[CatId]) -> Vec<CatId> {
    let mut cats: Vec<CatId> = Vec::new();
    let bound = bindings
        .iter()
        .filter(|(role, _)| !matches!(role, Role::NewCat(_) | Role::StatCat))
        .map(|(_, id)| id);
    for id in bound.chain(group.iter()) {
        if !cats.contains(id) {
            cats.push(id.clone());
        }
    }
    cats
}

/// Success chance for a group, clamped to `[0, final_cap]`.
///
/// The experience term lifts `base` and is capped at `pre_stat_cap`. Each
/// participant then adds `win_stat_modifier` per skill or trait hit on the
/// success block and loses `fail_stat_modifier` per hit on the failure block.
pub fn success_chance(
    base: f32,
    group: &[&Cat],
    success: Option<&OutcomeBlock>,
    failure: Option<&OutcomeBlock>,
    mode: GameMode,
    config: &OutcomeConfig,
) -> f32 {
    let mut chance = base;

    let size = group.len() as f32;
    if size > 0.0 {
        let experience: f32 = group.iter().map(|c| c.experience as f32).sum();
        let difficulty = config.difficulty_for(mode);
        chance += (1.0 + 0.10 * size) * experience / (size * difficulty * 2.0);
    }
    chance = chance.min(config.pre_stat_cap);

    for cat in group {
        if let Some(block) = success {
            chance += config.win_stat_modifier * cat.skills.hits(&block.stat_skill) as f32;
            if block.stat_trait.contains(cat.trait_name()) {
                chance += config.win_stat_modifier;
            }
        }
        if let Some(block) = failure {
            chance -= config.fail_stat_modifier * cat.skills.hits(&block.stat_skill) as f32;
            if block.stat_trait.contains(cat.trait_name()) {
                chance -= config.fail_stat_modifier;
            }
        }
    }

    chance.clamp(0.0, config.final_cap)
}

/// Resolves the outcome of a template whose roles are already bound.
pub struct OutcomeResolver<'a> {
    config: &'a EngineConfig,
    clan: &'a Clan,
}

impl<'a> OutcomeResolver<'a> {
    pub fn new(config: &'a EngineConfig, clan: &'a Clan) -> Self {
        Self { config, clan }
    }

    /// Whether `template` can resolve with these bindings: some outcome
    /// has every role it names bound and finds a stat cat if it needs one.
    /// With a forced outcome only that branch counts.
    pub fn can_resolve(&self, template: &EventTemplate, antagonize: bool, bindings: &Bindings, group: &[CatId], forced: Option<bool>) -> bool {
        let cats = participants(bindings, group);
        let (success_pool, failure_pool) = template.pools(antagonize);
        let usable = |pool: &[OutcomeBlock]| pool.iter().any(|block| self.is_usable(block, bindings, &cats));
        match forced {
            Some(true) => usable(success_pool),
            Some(false) => usable(failure_pool),
            None => usable(success_pool) || usable(failure_pool),
        }
    }

    pub fn resolve<'t>(
        &self,
        template: &'t EventTemplate,
        antagonize: bool,
        bindings: &Bindings,
        group: &[CatId],
        session: &mut Session,
    ) -> Result<ResolvedOutcome<'t>> {
        let forced = session.debug.force_outcome;
        let antagonize = if antagonize && !self.can_resolve(template, true, bindings, group, forced) {
            debug!("Antagonize outcomes of {} cannot be cast, using the normal ones", template.id);
            false
        } else {
            antagonize
        };

        let cats = participants(bindings, group);
        let (success_pool, failure_pool) = template.pools(antagonize);

        let success_valid = self.valid_outcomes(success_pool, bindings, &cats, session);
        let failure_valid = self.valid_outcomes(failure_pool, bindings, &cats, session);
        let success_pick = choose_weighted(&mut session.rng, &success_valid, |c| c.block.weight).cloned();
        let failure_pick = choose_weighted(&mut session.rng, &failure_valid, |c| c.block.weight).cloned();

        let (success, chance) = match (forced, &success_pick, &failure_pick) {
            (Some(forced), _, _) => {
                debug!("Forcing {} outcome for {}", if forced { "success" } else { "failure" }, template.id);
                let chance = match (&success_pick, &failure_pick) {
                    (Some(s), Some(f)) => Some(self.chance(template, &cats, s.block, f.block)),
                    _ => None,
                };
                (forced, chance)
            }
            (None, None, None) => {
                return Err(EngineError::NoValidOutcome {
                    event_id: template.id.clone(),
                })
            }
            (None, Some(_), None) => (true, None),
            (None, None, Some(_)) => (false, None),
            (None, Some(s), Some(f)) => {
                let chance = self.chance(template, &cats, s.block, f.block);
                let roll = session.rng.gen_range(0..self.config.outcome.roll_range.max(1));
                ((roll as f32) < chance, Some(chance))
            }
        };

        let chosen = if success { success_pick } else { failure_pick };
        match chosen {
            Some(candidate) => Ok(ResolvedOutcome {
                success,
                block: candidate.block,
                stat_cat: candidate.stat_cat,
                chance,
            }),
            None => Err(EngineError::NoValidOutcome {
                event_id: template.id.clone(),
            }),
        }
    }

    fn chance(&self, template: &EventTemplate, cats: &[CatId], success: &OutcomeBlock, failure: &OutcomeBlock) -> f32 {
        let group_cats: Vec<&Cat> = cats.iter().filter_map(|id| self.clan.cat(id)).collect();
        let base = template
            .chance_of_success
            .unwrap_or(self.config.outcome.default_success_chance);
        success_chance(
            base,
            &group_cats,
            Some(success),
            Some(failure),
            self.clan.game_mode,
            &self.config.outcome,
        )
    }

    /// Cats `block` may take as its stat cat, or `None` when it names a
    /// role nobody is bound to.
    fn stat_candidates<'c>(&self, block: &OutcomeBlock, bindings: &Bindings, cats: &'c [CatId]) -> Option<Vec<&'c CatId>> {
        let unbound = block
            .referenced_roles()
            .into_iter()
            .filter(|role| !matches!(role, Role::StatCat | Role::NewCat(_)))
            .find(|role| !bindings.contains_key(role));
        if let Some(role) = unbound {
            debug!("Skipping outcome with unbound role {}", role);
            return None;
        }
        if !block.uses_stat_cat() {
            return Some(Vec::new());
        }
        let eligible = cats
            .iter()
            .filter(|id| {
                let role = bindings.iter().find(|(_, bound)| bound == id).map(|(role, _)| *role);
                self.clan
                    .cat(id)
                    .map_or(false, |cat| block.accepts_stat_cat(cat, role))
            })
            .collect();
        Some(eligible)
    }

    fn is_usable(&self, block: &OutcomeBlock, bindings: &Bindings, cats: &[CatId]) -> bool {
        match self.stat_candidates(block, bindings, cats) {
            Some(candidates) => !block.uses_stat_cat() || !candidates.is_empty(),
            None => false,
        }
    }

    /// Outcomes whose referenced roles are all bound and that found a stat
    /// cat if they need one.
    fn valid_outcomes<'t>(
        &self,
        pool: &'t [OutcomeBlock],
        bindings: &Bindings,
        cats: &[CatId],
        session: &mut Session,
    ) -> Vec<Candidate<'t>> {
        let mut valid = Vec::new();
        for block in pool {
            let eligible = match self.stat_candidates(block, bindings, cats) {
                Some(eligible) => eligible,
                None => continue,
            };
            if !block.uses_stat_cat() {
                valid.push(Candidate { block, stat_cat: None });
            } else if let Some(stat_cat) = eligible.choose(&mut session.rng) {
                valid.push(Candidate {
                    block,
                    stat_cat: Some((*stat_cat).clone()),
                });
            }
        }
        valid
    }
}
