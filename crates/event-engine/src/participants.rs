//! Participant resolution: binding a template's abstract roles to cats.
//!
//! Roles are bound in order: primary, then secondary, then apprentice
//! slots. A cat bound to one role is removed from the pool before the next
//! role is filled. When no cat fits a role the template fails resolution
//! and the caller moves on to another candidate.

use std::collections::{BTreeMap, BTreeSet};

use rand::seq::SliceRandom;
use rand::Rng;

use clan_state::{Cat, CatId, Clan, Role};

use crate::filter::SelectionRequest;
use crate::template::EventTemplate;

/// Concrete cat per role.
pub type Bindings = BTreeMap<Role, CatId>;

/// A primary and optional secondary that together satisfy a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub primary: CatId,
    pub secondary: Option<CatId>,
}

/// Every primary/secondary combination the template accepts.
///
/// Group relationship constraints are only checked with `with_relations`,
/// so the filter can report role failures and relation failures as
/// separate stages.
pub fn pairings(
    template: &EventTemplate,
    request: &SelectionRequest,
    clan: &Clan,
    with_relations: bool,
) -> Vec<Pairing> {
    let group: Vec<&Cat> = request.group.iter().filter_map(|id| clan.cat(id)).collect();
    let primary_ok = |cat: &Cat| template.primary.as_ref().map_or(true, |c| c.accepts(cat));

    let primaries: Vec<&Cat> = match request.bound.get(&Role::Primary) {
        Some(id) => clan.cat(id).into_iter().filter(|c| primary_ok(*c)).collect(),
        None => group
            .iter()
            .copied()
            .filter(|c| c.is_active() && primary_ok(*c))
            .collect(),
    };

    let needs_secondary = template.needs_secondary();
    let bound_secondary = request.bound.get(&Role::Secondary).and_then(|id| clan.cat(id));
    let max_slot = template.apprentice_slots().into_iter().max().unwrap_or(0) as usize;

    let mut result = Vec::new();
    for primary in primaries {
        let secondaries: Vec<&Cat> = match bound_secondary {
            Some(cat) => vec![cat],
            None if needs_secondary => secondary_pool(request, clan, &group, primary),
            None => Vec::new(),
        };

        if secondaries.is_empty() {
            if !needs_secondary
                && fits(template, request, clan, &group, primary, None, with_relations)
                && apprentices_for(&group, primary, None).len() >= max_slot
            {
                result.push(Pairing {
                    primary: primary.id.clone(),
                    secondary: None,
                });
            }
            continue;
        }

        for secondary in secondaries {
            if secondary.id == primary.id {
                continue;
            }
            if !fits(template, request, clan, &group, primary, Some(secondary), with_relations) {
                continue;
            }
            if apprentices_for(&group, primary, Some(secondary)).len() < max_slot {
                continue;
            }
            result.push(Pairing {
                primary: primary.id.clone(),
                secondary: Some(secondary.id.clone()),
            });
        }
    }
    result
}

/// Binds every required role, or returns `None` if the template cannot be
/// satisfied by the cats on offer.
pub fn resolve<R: Rng>(
    template: &EventTemplate,
    request: &SelectionRequest,
    clan: &Clan,
    rng: &mut R,
) -> Option<Bindings> {
    let options = pairings(template, request, clan, true);
    let pairing = options.choose(rng)?;

    let mut bindings = request.bound.clone();
    bindings.insert(Role::Primary, pairing.primary.clone());
    if let Some(secondary) = &pairing.secondary {
        bindings.insert(Role::Secondary, secondary.clone());
    }

    let group: Vec<&Cat> = request.group.iter().filter_map(|id| clan.cat(id)).collect();
    let primary = clan.cat(&pairing.primary)?;
    let secondary = pairing.secondary.as_ref().and_then(|id| clan.cat(id));
    let taken: BTreeSet<&CatId> = bindings.values().collect();
    let apprentices: Vec<CatId> = apprentices_for(&group, primary, secondary)
        .into_iter()
        .filter(|c| !taken.contains(&c.id))
        .map(|c| c.id.clone())
        .collect();

    for slot in template.apprentice_slots() {
        let role = Role::Apprentice(slot);
        if bindings.contains_key(&role) {
            continue;
        }
        let cat = apprentices.get(slot as usize - 1)?;
        bindings.insert(role, cat.clone());
    }

    Some(bindings)
}

/// Cats the secondary may be drawn from.
fn secondary_pool<'a>(request: &SelectionRequest, clan: &'a Clan, group: &[&'a Cat], primary: &Cat) -> Vec<&'a Cat> {
    let taken: BTreeSet<&CatId> = request.bound.values().collect();
    let pool: Vec<&'a Cat> = if request.recruit_from_clan {
        clan.active_cats().collect()
    } else {
        group.iter().copied().filter(|c| c.is_active()).collect()
    };
    pool.into_iter()
        .filter(|c| c.id != primary.id && !taken.contains(&c.id))
        .collect()
}

/// Apprentices in the group other than the primary and secondary, in
/// group order.
fn apprentices_for<'a>(group: &[&'a Cat], primary: &Cat, secondary: Option<&Cat>) -> Vec<&'a Cat> {
    group
        .iter()
        .copied()
        .filter(|c| c.is_active() && c.rank.is_apprentice())
        .filter(|c| c.id != primary.id && secondary.map_or(true, |s| s.id != c.id))
        .collect()
}

fn fits(
    template: &EventTemplate,
    request: &SelectionRequest,
    clan: &Clan,
    group: &[&Cat],
    primary: &Cat,
    secondary: Option<&Cat>,
    with_relations: bool,
) -> bool {
    if let Some(cat) = secondary {
        if let Some(constraint) = &template.secondary {
            if !constraint.accepts(cat) || !constraint.accepts_partner(cat, Some(primary), clan) {
                return false;
            }
        }
    }
    if let Some(constraint) = &template.primary {
        if !constraint.accepts_partner(primary, secondary, clan) {
            return false;
        }
    }

    if !with_relations || template.relations.is_empty() {
        return true;
    }

    let mut members: Vec<&Cat> = Vec::new();
    let bound = request.bound.values().filter_map(|id| clan.cat(id));
    let extra = std::iter::once(primary).chain(secondary);
    for cat in group.iter().copied().chain(bound).chain(extra) {
        if !members.iter().any(|m| m.id == cat.id) {
            members.push(cat);
        }
    }
    let pair = secondary.map(|s| (primary, s));
    template
        .relations
        .iter()
        .all(|rule| rule.holds_for_group(&members, pair, clan))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::template::raw::RawTemplate;
    use clan_state::fixtures::sample_clan;
    use clan_state::EventFamily;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn template(json: serde_json::Value) -> EventTemplate {
        let raw: RawTemplate = serde_json::from_value(json).unwrap();
        EventTemplate::from_raw(&raw, EventFamily::Patrol, &EngineConfig::default()).unwrap()
    }

    fn ids(ids: &[&str]) -> Vec<CatId> {
        ids.iter().map(|id| CatId::from(*id)).collect()
    }

    #[test]
    fn test_primary_bound_by_trait() {
        let clan = sample_clan();
        let t = template(serde_json::json!({
            "event_id": "gen_hunt_bold",
            "m_c": {"trait": ["bold"]},
            "success_outcomes": [{"text": "p_l leaps first."}]
        }));
        let request = SelectionRequest::new(EventFamily::Patrol).with_group(ids(&["c4", "c1"]));
        let mut rng = SmallRng::seed_from_u64(5);

        for _ in 0..20 {
            let bindings = resolve(&t, &request, &clan, &mut rng).unwrap();
            assert_eq!(bindings[&Role::Primary], CatId::from("c1"));
        }
    }

    #[test]
    fn test_one_cat_never_fills_two_roles() {
        let clan = sample_clan();
        let t = template(serde_json::json!({
            "event_id": "gen_train",
            "success_outcomes": [{"text": "p_l and r_c watch app1 practice."}]
        }));
        let request = SelectionRequest::new(EventFamily::Patrol).with_group(ids(&["c4", "c5", "c2"]));
        let mut rng = SmallRng::seed_from_u64(11);

        for _ in 0..20 {
            let bindings = resolve(&t, &request, &clan, &mut rng).unwrap();
            let unique: BTreeSet<&CatId> = bindings.values().collect();
            assert_eq!(unique.len(), bindings.len());
            assert_eq!(bindings[&Role::Apprentice(1)], CatId::from("c5"));
        }
    }

    #[test]
    fn test_missing_apprentice_fails_resolution() {
        let clan = sample_clan();
        let t = template(serde_json::json!({
            "event_id": "gen_train",
            "success_outcomes": [{"text": "p_l watches app1 practice."}]
        }));
        let request = SelectionRequest::new(EventFamily::Patrol).with_group(ids(&["c4", "c2"]));
        let mut rng = SmallRng::seed_from_u64(1);

        assert!(resolve(&t, &request, &clan, &mut rng).is_none());
    }

    #[test]
    fn test_secondary_recruited_from_clan() {
        let clan = sample_clan();
        let t = template(serde_json::json!({
            "event_id": "gen_mates_walk",
            "r_c": {"relationship_status": ["mates"]},
            "success_outcomes": [{"text": "m_c walks with r_c."}]
        }));
        let request = SelectionRequest::new(EventFamily::Short)
            .with_group(ids(&["c2"]))
            .bind(Role::Primary, CatId::from("c2"))
            .recruiting();
        let mut rng = SmallRng::seed_from_u64(2);

        let bindings = resolve(&t, &request, &clan, &mut rng).unwrap();
        assert_eq!(bindings[&Role::Secondary], CatId::from("c3"));
    }

    #[test]
    fn test_relations_checked_only_on_request() {
        let clan = sample_clan();
        let t = template(serde_json::json!({
            "event_id": "gen_sibling_patrol",
            "relationship_constraint": ["siblings"],
            "success_outcomes": [{"text": "p_l leads."}]
        }));
        let request = SelectionRequest::new(EventFamily::Patrol).with_group(ids(&["c1", "c4"]));

        assert!(!pairings(&t, &request, &clan, false).is_empty());
        assert!(pairings(&t, &request, &clan, true).is_empty());
    }
}
