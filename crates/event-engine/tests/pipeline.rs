//! End-to-end tests for the event engine.
//!
//! Content comes from `tests/fixtures/content`, laid out the way a game
//! ships it, and the clan from the shared sample fixture.

use std::collections::BTreeSet;
use std::io::Write;

use clan_state::fixtures::sample_clan;
use clan_state::{CatId, CatState, EventFamily, HistoryKind, Personality, Role};
use event_engine::{
    romance_odds, Catalog, DirectorySource, EngineConfig, EngineError, EventEngine, FilterStage,
    Lifecycle, PatrolAction, PatrolRequest, SelectionRequest, Session,
};
use tempfile::NamedTempFile;

const CONTENT: &str = "tests/fixtures/content";

fn engine() -> EventEngine<DirectorySource> {
    EventEngine::with_defaults(DirectorySource::new(CONTENT))
}

fn ids(ids: &[&str]) -> Vec<CatId> {
    ids.iter().map(|id| CatId::from(*id)).collect()
}

fn patrol(group: &[&str], sub_type: &str) -> PatrolRequest {
    PatrolRequest::new(ids(group)).with_sub_type(sub_type)
}

/// Test that every loaded template has a usable weight and bad content
/// is skipped without taking the rest of the family down.
#[test]
fn test_loaded_weights_are_positive() {
    let mut catalog = Catalog::new(DirectorySource::new(CONTENT), EngineConfig::default());
    let clan = sample_clan();

    let mut seen = BTreeSet::new();
    for family in EventFamily::all() {
        for template in catalog.query(*family, clan.biome, clan.season, None) {
            assert!(template.weight >= 1, "{} has weight {}", template.id, template.weight);
            seen.insert(template.id.clone());
        }
    }

    assert!(seen.contains("gen_hunt_zero"));
    assert!(seen.contains("gen_hunt_negative"));
    assert!(seen.contains("forest_greenleaf_berries"));
    assert!(!seen.contains("forest_bad_rank"));
    assert!(!seen.contains("forest_broken"));

    let patrols = catalog.query(EventFamily::Patrol, clan.biome, clan.season, None);
    let weight = |id: &str| patrols.iter().find(|t| t.id == id).map(|t| t.weight);
    assert_eq!(weight("gen_hunt_zero"), Some(1));
    assert_eq!(weight("gen_hunt_negative"), Some(1));
    assert_eq!(weight("gen_hunt_quiet"), Some(10));
    // Default weight plus location and season bonuses
    assert_eq!(weight("forest_greenleaf_berries"), Some(30));
}

/// Test that buckets are parsed once and then served from cache.
#[test]
fn test_catalog_caches_buckets() {
    let mut catalog = Catalog::new(DirectorySource::new(CONTENT), EngineConfig::default());
    let clan = sample_clan();

    let first = catalog.query(EventFamily::Patrol, clan.biome, clan.season, None);
    let cached = catalog.cached_buckets();
    let second = catalog.query(EventFamily::Patrol, clan.biome, clan.season, None);

    assert_eq!(cached, 4);
    assert_eq!(catalog.cached_buckets(), cached);
    let first: Vec<&str> = first.iter().map(|t| t.id.as_str()).collect();
    let second: Vec<&str> = second.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(first, second);
}

/// Test that a selected patrol always passed the filter for the clan it
/// was selected under.
#[test]
fn test_selected_patrols_are_eligible() {
    let clan = sample_clan();
    let mut engine = engine();

    for seed in 0..40 {
        let mut session = Session::seeded(seed);
        let pending = engine
            .start_patrol(&clan, &mut session, patrol(&["c2", "c3", "c4"], "hunting"))
            .unwrap();

        let request = SelectionRequest::new(EventFamily::Patrol)
            .with_sub_types(["hunting"])
            .with_group(ids(&["c2", "c3", "c4"]))
            .untracked();
        let eligible = engine.eligible(&clan, &mut Session::seeded(seed), &request);
        assert!(
            eligible.eligible.iter().any(|t| t.id == pending.event_id()),
            "{} was selected but is not eligible",
            pending.event_id()
        );
    }
}

/// Test that narrowing a template's location or raising a relationship
/// threshold never grows the eligible pool.
#[test]
fn test_tightening_never_grows_pool() {
    use event_engine::{BucketKey, MemorySource};
    use serde_json::json;

    let clan = sample_clan();
    let variants = [
        vec![json!({"event_id": "a", "success_outcomes": [{"text": "p_l waits."}]})],
        vec![json!({"event_id": "a", "location": ["forest", "beach"], "success_outcomes": [{"text": "p_l waits."}]})],
        vec![json!({"event_id": "a", "location": ["beach"], "success_outcomes": [{"text": "p_l waits."}]})],
    ];
    let thresholds = [0, 40, 60, 80];

    let mut previous = usize::MAX;
    for templates in variants {
        let source = MemorySource::new().with_templates(BucketKey::new(EventFamily::Patrol, None, None), templates);
        let mut engine = EventEngine::with_defaults(source);
        let request = SelectionRequest::new(EventFamily::Patrol).with_group(ids(&["c2", "c3"]));
        let size = engine.eligible(&clan, &mut Session::seeded(1), &request).eligible.len();
        assert!(size <= previous);
        previous = size;
    }

    let mut previous = usize::MAX;
    for min in thresholds {
        let template = json!({
            "event_id": "b",
            "relationship_constraint": [format!("romantic_{}", min)],
            "success_outcomes": [{"text": "p_l and r_c walk together."}]
        });
        let source = MemorySource::new().with_templates(BucketKey::new(EventFamily::Patrol, None, None), vec![template]);
        let mut engine = EventEngine::with_defaults(source);
        let request = SelectionRequest::new(EventFamily::Patrol).with_group(ids(&["c2", "c3"]));
        let size = engine.eligible(&clan, &mut Session::seeded(1), &request).eligible.len();
        assert!(size <= previous, "romantic_{} grew the pool", min);
        previous = size;
    }
    // 70 and 65 pass 60 but not 80
    assert_eq!(previous, 0);
}

/// Test that a trait-constrained primary is only ever the matching cat.
#[test]
fn test_bold_primary_bound_to_bold_cat() {
    let clan = sample_clan();
    let mut engine = engine();

    for seed in 0..20 {
        let mut session = Session::seeded(seed);
        let pending = engine
            .start_patrol(&clan, &mut session, patrol(&["c4", "c1"], "bold_hunt"))
            .unwrap();
        assert_eq!(pending.event_id(), "gen_hunt_bold");
        assert_eq!(pending.bindings()[&Role::Primary], CatId::from("c1"));
        assert_eq!(pending.intro_text(), "Firestar leads a fast hunt through the undergrowth.");
    }
}

/// Test that selection frequency follows template weight.
#[test]
fn test_selection_follows_weights() {
    let clan = sample_clan();
    let mut config = EngineConfig::default();
    config.selection.repeat_avoidance = false;
    let mut engine = EventEngine::new(DirectorySource::new(CONTENT), config);
    let mut session = Session::seeded(12345);

    let mut quiet = 0;
    let mut long = 0;
    for _ in 0..10_000 {
        let pending = engine
            .start_patrol(&clan, &mut session, patrol(&["c4"], "hunting"))
            .unwrap();
        match pending.event_id() {
            "gen_hunt_quiet" => quiet += 1,
            "gen_hunt_long" => long += 1,
            other => panic!("unexpected patrol {}", other),
        }
    }

    // Expect ~1000 vs ~9000
    assert!(quiet > 850 && quiet < 1150, "quiet hunts: {}", quiet);
    assert_eq!(quiet + long, 10_000);
}

/// Test that a failed border patrol kills the secondary and records it.
#[test]
fn test_death_outcome_marks_cat_dead() {
    let mut clan = sample_clan();
    let mut session = Session::seeded(7);
    session.force_outcome(false);
    let mut engine = engine();

    let pending = engine
        .start_patrol(&clan, &mut session, patrol(&["c4", "c3"], "border"))
        .unwrap();
    let victim = pending.bindings()[&Role::Secondary].clone();
    let report = engine
        .resolve_patrol(&mut clan, &mut session, pending, PatrolAction::Proceed)
        .unwrap();

    assert_eq!(report.success, Some(false));
    assert_eq!(report.effects.died, vec![victim.clone()]);
    assert_eq!(clan.cat(&victim).unwrap().state, CatState::Dead);
    let death = clan
        .log
        .iter()
        .find(|e| e.cat == victim && e.kind == HistoryKind::Death)
        .expect("death recorded");
    assert!(death.text.ends_with(" was killed by a fox on the border."));
}

/// Test that follow-ups fire with the cats captured when they were
/// scheduled.
#[test]
fn test_future_event_round_trip() {
    let mut clan = sample_clan();
    let mut session = Session::seeded(11);
    session.force_outcome(true);
    let mut engine = engine();

    let pending = engine
        .start_patrol(&clan, &mut session, patrol(&["c4", "c3"], "border"))
        .unwrap();
    let report = engine
        .resolve_patrol(&mut clan, &mut session, pending, PatrolAction::Proceed)
        .unwrap();
    assert_eq!(report.lifecycle, Lifecycle::FutureScheduled);
    assert_eq!(clan.future_events.len(), 1);
    let frozen = clan.future_events[0].roles.clone();
    assert_eq!(frozen[&Role::Primary], report.bindings[&Role::Primary]);
    assert_eq!(frozen[&Role::Secondary], report.bindings[&Role::Secondary]);

    // Survives a save
    let saved = serde_json::to_string(&clan).unwrap();
    let mut clan: clan_state::Clan = serde_json::from_str(&saved).unwrap();

    assert!(engine.advance_future_events(&mut clan, &mut session).is_empty());
    let fired = engine.advance_future_events(&mut clan, &mut session);
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].family, EventFamily::Short);
    assert_eq!(fired[0].bindings, frozen);
    assert!(clan.future_events.is_empty());
}

/// Test that a follow-up drops a cat who left rather than recasting the
/// role.
#[test]
fn test_future_event_drops_missing_cat() {
    let mut clan = sample_clan();
    let mut session = Session::seeded(13);
    session.force_outcome(true);
    let mut engine = engine();

    let pending = engine
        .start_patrol(&clan, &mut session, patrol(&["c4", "c3"], "border"))
        .unwrap();
    let report = engine
        .resolve_patrol(&mut clan, &mut session, pending, PatrolAction::Proceed)
        .unwrap();
    let primary = report.bindings[&Role::Primary].clone();
    let secondary = report.bindings[&Role::Secondary].clone();
    clan.set_state(&secondary, CatState::Lost);

    engine.advance_future_events(&mut clan, &mut session);
    let fired = engine.advance_future_events(&mut clan, &mut session);

    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].event_id, "gen_fox_gone");
    assert_eq!(fired[0].bindings.len(), 1);
    assert_eq!(fired[0].bindings[&Role::Primary], primary);
}

/// Test that a used template comes back after the used set is reset.
#[test]
fn test_used_template_selectable_after_reset() {
    let clan = sample_clan();
    let mut session = Session::seeded(3);
    session.used.mark("gen_hunt_bold");
    let mut engine = engine();

    let request = SelectionRequest::new(EventFamily::Patrol)
        .with_sub_types(["bold_hunt"])
        .with_group(ids(&["c1"]));
    let outcome = engine.eligible(&clan, &mut session, &request);
    assert!(outcome.used_reset);
    assert_eq!(outcome.eligible.len(), 1);
    assert!(session.used.is_empty());

    session.used.mark("gen_hunt_bold");
    let pending = engine
        .start_patrol(&clan, &mut session, patrol(&["c1"], "bold_hunt"))
        .unwrap();
    assert_eq!(pending.event_id(), "gen_hunt_bold");
    assert!(session.used.contains("gen_hunt_bold"));
}

/// Test that a mated pair gets better romance odds than the same pair
/// unmated.
#[test]
fn test_mated_pair_romance_odds_lower() {
    let mut clan = sample_clan();
    let a = CatId::from("c2");
    let b = CatId::from("c3");
    clan.cat_mut(&a).unwrap().personality = Personality::new("stubborn").with_facets(0, 0, 0, 0);
    clan.cat_mut(&b).unwrap().personality = Personality::new("flighty").with_facets(16, 16, 16, 16);
    let config = EngineConfig::default();

    let mated = romance_odds(clan.cat(&a).unwrap(), clan.cat(&b).unwrap(), &clan, &config.romance);

    let mut unmated = clan.clone();
    unmated.cat_mut(&a).unwrap().mates.clear();
    unmated.cat_mut(&b).unwrap().mates.clear();
    let single = romance_odds(unmated.cat(&a).unwrap(), unmated.cat(&b).unwrap(), &unmated, &config.romance);

    assert!(mated < single, "mated {} vs unmated {}", mated, single);
}

/// Test that supply events wait until the clan is old enough.
#[test]
fn test_young_clan_skips_supply_events() {
    let mut clan = sample_clan();
    clan.age_moons = 3;
    let mut engine = engine();
    let request = SelectionRequest::new(EventFamily::Patrol)
        .with_sub_types(["herb"])
        .with_group(ids(&["c6"]));

    let outcome = engine.eligible(&clan, &mut Session::seeded(1), &request);
    assert!(outcome.eligible.is_empty());
    let rejection = outcome
        .rejections
        .iter()
        .find(|r| r.event_id == "gen_herb_gathering")
        .unwrap();
    assert_eq!(rejection.stage, FilterStage::Supplies);

    clan.age_moons = 24;
    let outcome = engine.eligible(&clan, &mut Session::seeded(1), &request);
    assert_eq!(outcome.eligible.len(), 1);
}

/// Test that a declined patrol leaves no trace on the clan.
#[test]
fn test_declined_patrol() {
    let mut clan = sample_clan();
    let before = serde_json::to_value(&clan).unwrap();
    let mut session = Session::seeded(5);
    let mut engine = engine();

    let pending = engine
        .start_patrol(&clan, &mut session, patrol(&["c1", "c4"], "border"))
        .unwrap();
    let report = engine
        .resolve_patrol(&mut clan, &mut session, pending, PatrolAction::Decline)
        .unwrap();

    assert_eq!(report.lifecycle, Lifecycle::Declined);
    assert!(report.text.ends_with(" decides the scent is too old to follow."));
    assert_eq!(
        report.trace,
        vec![
            Lifecycle::Candidate,
            Lifecycle::FilteredEligible,
            Lifecycle::Selected,
            Lifecycle::ParticipantsResolved,
            Lifecycle::Declined,
        ]
    );
    assert!(clan.future_events.is_empty());
    assert_eq!(serde_json::to_value(&clan).unwrap(), before);
}

/// Test that other-clan standing is checked against the clan in play.
#[test]
fn test_other_clan_standing() {
    let clan = sample_clan();
    let mut engine = engine();
    let request = |other: &str| {
        SelectionRequest::new(EventFamily::Short)
            .with_sub_types(["diplomacy"])
            .with_group(ids(&["c1"]))
            .bind(Role::Primary, CatId::from("c1"))
            .with_other_clan(other)
    };

    let river = engine.eligible(&clan, &mut Session::seeded(1), &request("River"));
    assert_eq!(river.eligible.len(), 1);

    let shadow = engine.eligible(&clan, &mut Session::seeded(1), &request("Shadow"));
    assert!(shadow.eligible.is_empty());
    let rejection = shadow
        .rejections
        .iter()
        .find(|r| r.event_id == "gen_river_gift")
        .unwrap();
    assert_eq!(rejection.stage, FilterStage::Standing);
}

/// Test a moon event that injures its cat.
#[test]
fn test_moon_event_injury() {
    let mut clan = sample_clan();
    let mut session = Session::seeded(2);
    let mut engine = engine();

    let report = engine
        .generate_moon_event(&mut clan, &mut session, &CatId::from("c7"), &["injury"])
        .unwrap();

    assert_eq!(report.event_id, "gen_elder_cough");
    assert_eq!(report.text, "Mousefur wakes up coughing.");
    assert!(clan.cat(&CatId::from("c7")).unwrap().has_injury("whitecough"));

    let result = engine.generate_moon_event(&mut clan, &mut session, &CatId::from("c4"), &["injury"]);
    assert!(matches!(result, Err(EngineError::ExhaustedPool { .. })));
}

/// Test the reactions to a death.
#[test]
fn test_death_reactions() {
    let mut clan = sample_clan();
    let mut session = Session::seeded(19);
    let mut engine = engine();
    clan.set_state(&CatId::from("c2"), CatState::Dead);

    let reports = engine
        .death_reactions(&mut clan, &mut session, &CatId::from("c2"))
        .unwrap();
    let texts: Vec<&str> = reports.iter().map(|r| r.text.as_str()).collect();

    assert_eq!(
        texts,
        vec![
            "Silverstream sits vigil beside Graystripe all night.",
            "Ashpaw cannot believe Graystripe is gone.",
            "Brackenkit cannot believe Graystripe is gone.",
        ]
    );
    assert!(session.used.is_empty());
}

/// Test the ceremony text for an apprentice with a mentor.
#[test]
fn test_warrior_ceremony() {
    let mut clan = sample_clan();
    let mut session = Session::seeded(23);
    let mut engine = engine();

    let report = engine
        .ceremony_text(&mut clan, &mut session, &CatId::from("c5"), "warrior")
        .unwrap();
    assert_eq!(report.text, "Sandstorm watches proudly as Ashpaw is given a warrior name.");
}

/// Test that the engine can be built from a partial TOML file.
#[test]
fn test_engine_from_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[reactions]\nmax_reactions = 1\n\n[romance]\nbase_odds = 30").unwrap();

    let engine = EventEngine::from_config_file(DirectorySource::new(CONTENT), file.path()).unwrap();
    assert_eq!(engine.config().reactions.max_reactions, 1);
    assert_eq!(engine.config().romance.base_odds, 30);
    assert_eq!(engine.config().reactions.threshold, 30);
    assert_eq!(engine.config().outcome.roll_range, 120);
}

/// Test that the same seed replays the same moon.
#[test]
fn test_same_seed_same_moon() {
    let run = |seed: u64| {
        let mut clan = sample_clan();
        let mut session = Session::seeded(seed);
        let mut engine = engine();
        let mut texts = Vec::new();
        for sub_type in ["hunting", "odd_weights", "hunting", "odd_weights"] {
            let pending = engine
                .start_patrol(&clan, &mut session, patrol(&["c2", "c3", "c4"], sub_type))
                .unwrap();
            let report = engine
                .resolve_patrol(&mut clan, &mut session, pending, PatrolAction::Proceed)
                .unwrap();
            texts.push(report.text);
        }
        (texts, serde_json::to_value(&clan).unwrap())
    };

    assert_eq!(run(99), run(99));
}
