//! Effect application: writing a resolved outcome back onto the clan.
//!
//! Effects run in a fixed order inside one call:
//!
//! 0. New cats join and are bound as `n_c:N`
//! 1. Injuries, scars, deaths and lost cats
//! 2. History entries for every participant
//! 3. Relationship changes
//! 4. Reputation, diplomacy and supplies
//! 5. Experience (successful outcomes only)
//! 6. Accessories, gender changes and disasters
//! 7. Future events
//!
//! Fields touched: cat state, lives, injuries, scars, accessories, gender,
//! experience, family links and history; the relationship graph; outsider
//! reputation, other-clan relations, supplies, disasters, the future-event
//! queue and the clan log. Nothing else on the clan is written.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use clan_state::{
    Cat, CatId, CatState, Clan, FutureEvent, HistoryEntry, HistoryKind, PossibleHistory, Rank, Role,
    Supplies,
};

use crate::config::EngineConfig;
use crate::outcome::participants;
use crate::participants::Bindings;
use crate::template::{
    EventTemplate, InjuryEffect, OutcomeBlock, SupplyAdjust, SupplyChange, SupplyKind, Target,
};
use crate::text::{render, Snippets, TextContext};

/// What an outcome changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EffectSummary {
    pub died: Vec<CatId>,
    /// Leaders who lost a life but are still alive
    pub lost_lives: Vec<CatId>,
    pub lost: Vec<CatId>,
    /// Cat -> injury inflicted
    pub injuries: Vec<(CatId, String)>,
    pub scars: Vec<(CatId, String)>,
    /// Directed edge adjustments made
    pub relationship_changes: usize,
    pub outsider_rep: i32,
    pub other_clan_rep: i32,
    pub freshkill_delta: f32,
    /// Herb -> net change
    pub herb_deltas: BTreeMap<String, i64>,
    /// Experience gained per cat
    pub experience: BTreeMap<CatId, u32>,
    pub accessories: Vec<(CatId, String)>,
    pub gender_changes: Vec<CatId>,
    pub new_cats: Vec<CatId>,
    pub disaster: Option<String>,
    pub scheduled: Vec<FutureEvent>,
}

/// The event an outcome belongs to.
pub struct AppliedEvent<'a> {
    pub template: &'a EventTemplate,
    pub block: &'a OutcomeBlock,
    pub success: bool,
    pub group: &'a [CatId],
    pub other_clan: Option<&'a str>,
}

/// Applies outcome blocks to a clan.
pub struct EffectApplicator<'a> {
    config: &'a EngineConfig,
    snippets: &'a Snippets,
}

impl<'a> EffectApplicator<'a> {
    pub fn new(config: &'a EngineConfig, snippets: &'a Snippets) -> Self {
        Self { config, snippets }
    }

    /// Applies every effect of `event.block`. New cats are added to
    /// `bindings` so the outcome text can name them afterwards.
    pub fn apply<R: Rng>(
        &self,
        clan: &mut Clan,
        event: &AppliedEvent<'_>,
        bindings: &mut Bindings,
        rng: &mut R,
    ) -> EffectSummary {
        let mut summary = EffectSummary::default();
        let block = event.block;

        self.add_new_cats(clan, event, bindings, rng, &mut summary);
        let cats = participants(bindings, event.group)
            .into_iter()
            .filter(|id| clan.cat(id).is_some())
            .collect::<Vec<_>>();

        // 1. Harm
        self.apply_injuries(clan, event, bindings, &cats, rng, &mut summary);
        for id in self.targets(clan, &block.dead, bindings, &cats, rng) {
            self.kill(clan, event, &id, bindings, rng, &mut summary);
        }
        for id in self.targets(clan, &block.lost, bindings, &cats, rng) {
            if !clan.is_active(&id) {
                continue;
            }
            let text = block.history.lost.as_deref().unwrap_or("m_c went missing.");
            let text = self.render_about(clan, text, &id, bindings, event.other_clan, rng);
            clan.set_state(&id, CatState::Lost);
            clan.record_history(self.entry(clan, event, &id, HistoryKind::Lost, text));
            summary.lost.push(id);
        }

        // 2. History
        let text = self.render_with(clan, &block.text, bindings, event.other_clan, rng);
        for id in &cats {
            clan.record_history(self.entry(clan, event, id, HistoryKind::Event, text.clone()));
        }

        // 3. Relationships
        for effect in &block.relationships {
            let from = self.targets(clan, &effect.from, bindings, &cats, rng);
            let to = self.targets(clan, &effect.to, bindings, &cats, rng);
            for a in &from {
                for b in to.iter().filter(|b| *b != a) {
                    for axis in &effect.axes {
                        clan.relationships.adjust(a, b, *axis, effect.amount);
                        summary.relationship_changes += 1;
                        if effect.mutual {
                            clan.relationships.adjust(b, a, *axis, effect.amount);
                            summary.relationship_changes += 1;
                        }
                    }
                }
            }
        }

        // 4. Standing and supplies
        if block.outsider_rep != 0 {
            clan.adjust_outsider_reputation(block.outsider_rep);
            summary.outsider_rep = block.outsider_rep;
        }
        if block.other_clan_rep != 0 {
            match event.other_clan {
                Some(name) if clan.adjust_other_clan(name, block.other_clan_rep).is_some() => {
                    summary.other_clan_rep = block.other_clan_rep;
                }
                _ => warn!("{} changes other-clan relations with no clan in play", event.template.id),
            }
        }
        self.apply_supplies(clan, event, cats.len(), rng, &mut summary);

        // 5. Experience
        if event.success && block.exp > 0 {
            let difficulty = self.config.outcome.difficulty_for(clan.game_mode);
            let gain = (block.exp as f32 / difficulty).round() as u32;
            for id in &cats {
                if let Some(cat) = clan.cat_mut(id).filter(|c| c.is_active()) {
                    cat.experience += gain;
                    summary.experience.insert(id.clone(), gain);
                }
            }
        }

        // 6. Grants and world changes
        if let Some(primary) = bindings.get(&Role::Primary) {
            if let Some(cat) = clan.cat_mut(primary) {
                for accessory in &block.accessories {
                    if !cat.accessories.contains(accessory) {
                        cat.accessories.push(accessory.clone());
                        summary.accessories.push((primary.clone(), accessory.clone()));
                    }
                }
            }
        }
        for role in &block.gender_change {
            let Some(cat) = bindings.get(role).and_then(|id| clan.cat_mut(id)) else {
                continue;
            };
            if cat.gender_changed {
                continue;
            }
            cat.gender_alignment = match cat.gender_alignment.as_str() {
                "male" => "trans female".to_string(),
                "female" => "trans male".to_string(),
                _ => "nonbinary".to_string(),
            };
            cat.gender_changed = true;
            summary.gender_changes.push(cat.id.clone());
        }
        if let Some(disaster) = &block.disaster {
            let moons = rng.gen_range(disaster.min_moons..=disaster.max_moons);
            clan.start_disaster(&disaster.name, &event.template.id, moons);
            summary.disaster = Some(disaster.name.clone());
        }

        // 7. Future events
        for plan in event.template.future.iter().chain(block.future.iter()) {
            let roles: BTreeMap<Role, CatId> = if plan.involved.is_empty() {
                // Stat cats and newcomers belong to this outcome only
                bindings
                    .iter()
                    .filter(|(role, _)| matches!(role, Role::Primary | Role::Secondary | Role::Apprentice(_)))
                    .map(|(role, id)| (*role, id.clone()))
                    .collect()
            } else {
                plan.involved
                    .iter()
                    .filter_map(|(future, current)| bindings.get(current).map(|id| (*future, id.clone())))
                    .collect()
            };
            let future = FutureEvent {
                parent_event: event.template.id.clone(),
                family: plan.family,
                pool: plan.pool.clone(),
                moons_remaining: rng.gen_range(plan.min_delay..=plan.max_delay),
                roles,
            };
            debug!(
                "Scheduled {} follow-up of {} in {} moons",
                future.family, future.parent_event, future.moons_remaining
            );
            clan.future_events.push(future.clone());
            summary.scheduled.push(future);
        }

        summary
    }

    fn add_new_cats<R: Rng>(
        &self,
        clan: &mut Clan,
        event: &AppliedEvent<'_>,
        bindings: &mut Bindings,
        rng: &mut R,
        summary: &mut EffectSummary,
    ) {
        for (index, newcomer) in event.block.new_cats.iter().enumerate() {
            let id = clan.next_cat_id();
            let name = newcomer
                .name
                .clone()
                .unwrap_or_else(|| clan_state::generate_name(newcomer.rank, rng));
            let mut cat = Cat::new(id.as_str(), name, newcomer.rank, newcomer.moons)
                .with_pronouns(newcomer.pronouns.clone())
                .with_backstory(newcomer.backstory.clone());

            if let Some(parent) = newcomer.parent.and_then(|role| bindings.get(&role)) {
                cat.parents.push(parent.clone());
            }
            if let Some(mate) = newcomer.mate.and_then(|role| bindings.get(&role)).cloned() {
                if let Some(existing) = clan.cat_mut(&mate) {
                    existing.mates.push(id.clone());
                    cat.mates.push(mate);
                }
            }

            let text = format!("{} joined {}Clan.", cat.name, clan.name);
            clan.add_cat(cat);
            clan.record_history(self.entry(clan, event, &id, HistoryKind::NewCat, text));
            bindings.insert(Role::NewCat(index as u8), id.clone());
            summary.new_cats.push(id);
        }
    }

    fn apply_injuries<R: Rng>(
        &self,
        clan: &mut Clan,
        event: &AppliedEvent<'_>,
        bindings: &Bindings,
        cats: &[CatId],
        rng: &mut R,
        summary: &mut EffectSummary,
    ) {
        for injury in &event.block.injuries {
            for id in self.targets(clan, &injury.cats, bindings, cats, rng) {
                if !clan.is_active(&id) {
                    continue;
                }
                if let Some((name, scar)) = self.injure(clan, event, injury, &id, bindings, rng) {
                    summary.injuries.push((id.clone(), name));
                    if let Some(scar) = scar {
                        summary.scars.push((id.clone(), scar));
                    }
                }
            }
        }
    }

    /// Inflicts one injury, and maybe a scar, on one cat. Returns what was
    /// inflicted. An outcome with death text registers it against the
    /// injury for a later death.
    fn injure<R: Rng>(
        &self,
        clan: &mut Clan,
        event: &AppliedEvent<'_>,
        injury: &InjuryEffect,
        id: &CatId,
        bindings: &Bindings,
        rng: &mut R,
    ) -> Option<(String, Option<String>)> {
        let history = &event.block.history;
        let name = self.pick_injury(&injury.injuries, rng)?;

        let mut possible = None;
        if let Some(death) = history.reg_death.as_deref() {
            let death_text = self.render_about(clan, death, id, bindings, event.other_clan, rng);
            let scar_text = match history.scar.as_deref() {
                Some(scar) => Some(self.render_about(clan, scar, id, bindings, event.other_clan, rng)),
                None => None,
            };
            possible = Some(PossibleHistory {
                death_text: Some(death_text),
                scar_text,
                involved: bindings.get(&Role::Secondary).filter(|other| *other != id).cloned(),
                moon: clan.age_moons,
            });
        }

        let injury_moons = self.config.effects.injury_moons;
        if let Some(cat) = clan.cat_mut(id) {
            cat.injuries.insert(name.clone(), injury_moons);
            if let Some(possible) = possible {
                cat.history.register_possible(name.clone(), possible);
            }
        }
        clan.record_history(self.entry(clan, event, id, HistoryKind::Injury, name.clone()));

        let scar = injury.scars.choose(rng).cloned();
        if let Some(scar) = &scar {
            let text = match history.scar.as_deref() {
                Some(text) => self.render_about(clan, text, id, bindings, event.other_clan, rng),
                None => scar.clone(),
            };
            if let Some(cat) = clan.cat_mut(id) {
                cat.scars.push(scar.clone());
            }
            clan.record_history(self.entry(clan, event, id, HistoryKind::Scar, text));
        }
        Some((name, scar))
    }

    /// Draws an injury, expanding pool names into a member of the pool.
    fn pick_injury<R: Rng>(&self, injuries: &[String], rng: &mut R) -> Option<String> {
        let picked = injuries.choose(rng)?;
        match self.config.effects.injury_pools.get(picked) {
            Some(pool) => pool.choose(rng).cloned(),
            None => Some(picked.clone()),
        }
    }

    /// Kills a cat, or takes lives from a leader.
    fn kill<R: Rng>(
        &self,
        clan: &mut Clan,
        event: &AppliedEvent<'_>,
        id: &CatId,
        bindings: &Bindings,
        rng: &mut R,
        summary: &mut EffectSummary,
    ) {
        let block = event.block;
        let Some(cat) = clan.cat(id).filter(|c| c.is_active()) else {
            return;
        };
        let is_leader = cat.rank == Rank::Leader;
        let lives = cat.lives.max(1);

        let possible = block
            .death_cause
            .as_deref()
            .and_then(|cause| clan.cat_mut(id).and_then(|c| c.history.take_possible(cause)));
        let involved = possible.as_ref().and_then(|p| p.involved.clone());
        let registered = possible.and_then(|p| p.death_text);
        let text = match registered {
            Some(text) => text,
            None => {
                let template = if is_leader {
                    block.history.leader_death.as_deref().or(block.history.reg_death.as_deref())
                } else {
                    block.history.reg_death.as_deref()
                };
                let template = template.unwrap_or("m_c died.");
                self.render_about(clan, template, id, bindings, event.other_clan, rng)
            }
        };

        let remaining = if is_leader && !block.all_lives { lives - 1 } else { 0 };
        if is_leader {
            let taken = lives - remaining;
            clan.record_history(
                self.entry(clan, event, id, HistoryKind::LostLife, text.clone())
                    .with_involved(involved.clone()),
            );
            debug!("{} lost {} of {} lives", id, taken, lives);
        }
        if let Some(cat) = clan.cat_mut(id) {
            cat.lives = remaining;
        }
        if remaining > 0 {
            summary.lost_lives.push(id.clone());
            return;
        }

        clan.set_state(id, CatState::Dead);
        clan.record_history(self.entry(clan, event, id, HistoryKind::Death, text).with_involved(involved));
        summary.died.push(id.clone());
    }

    fn apply_supplies<R: Rng>(
        &self,
        clan: &mut Clan,
        event: &AppliedEvent<'_>,
        group_size: usize,
        rng: &mut R,
        summary: &mut EffectSummary,
    ) {
        let block = event.block;
        let effects = &self.config.effects;
        let freshkill_before = clan.supplies.freshkill;
        let herbs_before = clan.supplies.herbs.clone();

        for size in &block.prey {
            match effects.prey_amounts.get(size) {
                Some(amount) => clan.supplies.add_freshkill(amount * group_size as f32),
                None => warn!("Unknown prey size {} in {}", size, event.template.id),
            }
        }
        for herb in &block.herbs {
            clan.supplies
                .add_herb(herb, effects.herb_amount_per_cat * group_size as u32);
        }
        for change in &block.supplies {
            apply_supply_change(&mut clan.supplies, change, rng);
        }

        summary.freshkill_delta = clan.supplies.freshkill - freshkill_before;
        for (herb, count) in &clan.supplies.herbs {
            let before = herbs_before.get(herb).copied().unwrap_or(0);
            if *count != before {
                summary
                    .herb_deltas
                    .insert(herb.clone(), *count as i64 - before as i64);
            }
        }
    }

    /// Resolves effect targets to cats, in declaration order without
    /// duplicates.
    fn targets<R: Rng>(
        &self,
        clan: &Clan,
        targets: &[Target],
        bindings: &Bindings,
        cats: &[CatId],
        rng: &mut R,
    ) -> Vec<CatId> {
        let mut resolved: Vec<CatId> = Vec::new();
        let mut push = |id: &CatId| {
            if !resolved.contains(id) {
                resolved.push(id.clone());
            }
        };
        for target in targets {
            match target {
                Target::Role(role) => match bindings.get(role) {
                    Some(id) => push(id),
                    None => debug!("Effect target {} is not bound", role),
                },
                Target::Patrol => cats.iter().for_each(&mut push),
                Target::Clan => clan.active_cats().for_each(|c| push(&c.id)),
                Target::SomeClan => {
                    let percent = self.config.effects.some_clan_percent;
                    for cat in clan.active_cats() {
                        if rng.gen_range(0..100) < percent {
                            push(&cat.id);
                        }
                    }
                }
            }
        }
        resolved
    }

    fn entry(&self, clan: &Clan, event: &AppliedEvent<'_>, id: &CatId, kind: HistoryKind, text: String) -> HistoryEntry {
        HistoryEntry::new(clan.age_moons, event.template.id.as_str(), id.clone(), kind, text)
    }

    fn render_with<R: Rng>(
        &self,
        clan: &Clan,
        text: &str,
        bindings: &Bindings,
        other_clan: Option<&str>,
        rng: &mut R,
    ) -> String {
        let ctx = TextContext {
            clan,
            bindings,
            other_clan,
            snippets: self.snippets,
        };
        render(text, &ctx, rng)
    }

    /// Renders history text with `m_c` naming the cat it is about.
    fn render_about<R: Rng>(
        &self,
        clan: &Clan,
        text: &str,
        id: &CatId,
        bindings: &Bindings,
        other_clan: Option<&str>,
        rng: &mut R,
    ) -> String {
        let mut about = bindings.clone();
        about.insert(Role::Primary, id.clone());
        self.render_with(clan, text, &about, other_clan, rng)
    }
}

fn apply_supply_change<R: Rng>(supplies: &mut Supplies, change: &SupplyChange, rng: &mut R) {
    let random_herb = |rng: &mut R, herbs: &BTreeMap<String, u32>| -> Option<String> {
        let names: Vec<&String> = herbs.keys().collect();
        names.choose(rng).map(|name| (*name).clone())
    };

    match (&change.kind, change.adjust) {
        (SupplyKind::Freshkill, SupplyAdjust::Increase(amount)) => supplies.add_freshkill(amount as f32),
        (SupplyKind::Herb(name), SupplyAdjust::Increase(amount)) => supplies.add_herb(name, amount),
        (SupplyKind::AllHerb, SupplyAdjust::Increase(amount)) => {
            let names: Vec<String> = supplies.herbs.keys().cloned().collect();
            for name in names {
                supplies.add_herb(&name, amount);
            }
        }
        (SupplyKind::AnyHerb, SupplyAdjust::Increase(amount)) => {
            if let Some(name) = random_herb(rng, &supplies.herbs) {
                supplies.add_herb(&name, amount);
            }
        }
        (kind, adjust) => {
            let Some(factor) = adjust.factor() else {
                return;
            };
            match kind {
                SupplyKind::Freshkill => supplies.scale_freshkill(factor),
                SupplyKind::Herb(name) => supplies.scale_herb(name, factor),
                SupplyKind::AllHerb => supplies.scale_all_herbs(factor),
                SupplyKind::AnyHerb => {
                    if let Some(name) = random_herb(rng, &supplies.herbs) {
                        supplies.scale_herb(&name, factor);
                    }
                }
            }
        }
    }
}
