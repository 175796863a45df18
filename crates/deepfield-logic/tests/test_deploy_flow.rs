//! Integration tests for the deploy flow.
//!
//! Exercises: DeploySession → DeployEngine (unlocks → quota → allocation
//! → commit) → NotificationOutbox, against the in-memory store.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use deepfield_logic::allocation::allocate;
use deepfield_logic::catalog::{
    AnomalyCategory, AutomatonKind, CatalogedAnomaly, CategoryPool, DeploymentType, Unlocks,
    UpgradeTag,
};
use deepfield_logic::config::{DeployConfig, HARD_TARGET_CAP};
use deepfield_logic::error::DeployError;
use deepfield_logic::memory::{MemoryStore, SharedStore};
use deepfield_logic::pipeline::{DeployEngine, DeployRequest};
use deepfield_logic::recorder::DeploymentRecorder;
use deepfield_logic::sector::{Direction, SectorCoordinate};
use deepfield_logic::seeded::SeedScheme;
use deepfield_logic::session::{DeploySession, SessionPhase};
use deepfield_logic::store::{CatalogSource, StoreError, UserId};
use deepfield_logic::time::{Timestamp, MICROS_PER_DAY};

// ── Helpers ────────────────────────────────────────────────────────────

const NOW: Timestamp = Timestamp::from_micros(1_700_000_000_000_000);

fn later(days: i64) -> Timestamp {
    Timestamp::from_micros(NOW.micros() + days * MICROS_PER_DAY)
}

fn planets_and_asteroids() -> MemoryStore {
    let mut store = MemoryStore::new();
    store.add_anomalies((1..=10).map(|id| CatalogedAnomaly::new(id, "telescope-tess")));
    store.add_anomalies((11..=15).map(|id| CatalogedAnomaly::new(id, "telescope-minorPlanet")));
    store
}

fn planetary(user: &UserId, sector: SectorCoordinate, now: Timestamp) -> DeployRequest<'_> {
    DeployRequest {
        user,
        deployment_type: DeploymentType::Planetary,
        sector,
        now,
    }
}

// ── End-to-end ─────────────────────────────────────────────────────────

#[test]
fn ten_planets_and_five_asteroids_split_evenly() {
    let mut store = planets_and_asteroids();
    let mut engine = DeployEngine::new(DeployConfig::default());
    let user = UserId::new("explorer");

    let outcome = engine
        .deploy(planetary(&user, SectorCoordinate::new(0, 0), NOW), &mut store)
        .unwrap();

    let ids: Vec<u64> = outcome.report.linked.clone();
    assert_eq!(ids.len(), 4);
    assert_eq!(ids.iter().filter(|&&id| id <= 10).count(), 2);
    assert_eq!(ids.iter().filter(|&&id| id > 10).count(), 2);
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 4);
    assert_eq!(store.links().len(), 4);
}

#[test]
fn session_drives_a_full_deploy() {
    let mut store = planets_and_asteroids();
    let mut engine = DeployEngine::new(DeployConfig::default());
    let user = UserId::new("explorer");
    let mut session = DeploySession::new();

    let catalog = store
        .fetch_anomalies(&DeploymentType::Planetary.tags_to_fetch(&Unlocks::default()))
        .unwrap();
    session
        .choose_type(DeploymentType::Planetary, engine.resolver(), &catalog)
        .unwrap();
    session
        .step(Direction::Down, engine.resolver(), &catalog)
        .unwrap();
    session.select_sector().unwrap();

    let ticket = session.begin_deploy().unwrap();
    let result = engine.deploy(
        DeployRequest {
            user: &user,
            deployment_type: ticket.deployment_type,
            sector: ticket.sector,
            now: NOW,
        },
        &mut store,
    );
    match result {
        Ok(outcome) => session.complete(outcome.message).unwrap(),
        Err(e) => session.fail(&e).unwrap(),
    }
    assert_eq!(session.phase(), SessionPhase::Deployed);
    assert!(session.last_message().unwrap().contains("4 planetary targets"));

    // A second attempt in the same week fails and leaves the sector selected.
    session.change_type().unwrap();
    session
        .choose_type(DeploymentType::Stellar, engine.resolver(), &catalog)
        .unwrap();
    session.select_sector().unwrap();
    let ticket = session.begin_deploy().unwrap();
    let err = engine
        .deploy(
            DeployRequest {
                user: &user,
                deployment_type: ticket.deployment_type,
                sector: ticket.sector,
                now: NOW,
            },
            &mut store,
        )
        .unwrap_err();
    session.fail(&err).unwrap();
    assert_eq!(session.phase(), SessionPhase::SectorSelected);
    assert!(session
        .last_error()
        .unwrap()
        .contains("Telescope has already been deployed this week"));
}

#[test]
fn empty_catalog_surfaces_exhausted_pool() {
    let mut store = MemoryStore::new();
    let mut engine = DeployEngine::new(DeployConfig::default());
    let user = UserId::new("explorer");

    let err = engine
        .deploy(planetary(&user, SectorCoordinate::new(5, 5), NOW), &mut store)
        .unwrap_err();
    assert_eq!(err, DeployError::ExhaustedPool);
    assert!(!err.is_retryable());
    assert!(store.links().is_empty());
    assert!(engine.outbox().is_empty());
}

#[test]
fn catalog_outage_is_distinct_from_empty_catalog() {
    let mut store = planets_and_asteroids();
    store.fail_catalog(Some(StoreError::Unavailable("catalog offline".into())));
    let mut engine = DeployEngine::new(DeployConfig::default());
    let user = UserId::new("explorer");

    let err = engine
        .deploy(planetary(&user, SectorCoordinate::new(0, 0), NOW), &mut store)
        .unwrap_err();
    assert!(matches!(err, DeployError::Store(StoreError::Unavailable(_))));
    assert_ne!(err, DeployError::ExhaustedPool);
}

#[test]
fn quota_reopens_after_the_window_rolls() {
    let mut store = planets_and_asteroids();
    let mut engine = DeployEngine::new(DeployConfig::default());
    let user = UserId::new("explorer");
    let sector = SectorCoordinate::new(1, 1);

    engine.deploy(planetary(&user, sector, NOW), &mut store).unwrap();
    assert!(engine
        .deploy(planetary(&user, sector, later(3)), &mut store)
        .is_err());

    let outcome = engine
        .deploy(planetary(&user, sector, later(8)), &mut store)
        .unwrap();
    assert_eq!(outcome.report.linked.len(), 4);
}

#[test]
fn community_credit_allows_a_redeploy() {
    let mut store = planets_and_asteroids();
    let mut engine = DeployEngine::new(DeployConfig::default());
    let user = UserId::new("explorer");
    let neighbour = UserId::new("neighbour");

    engine
        .deploy(planetary(&user, SectorCoordinate::new(0, 0), NOW), &mut store)
        .unwrap();

    let theirs = store.add_classification(&neighbour, "planet");
    store.add_comment(&user, theirs, later(1));

    let decision = engine
        .quota(&user, DeploymentType::Planetary, later(1), &store)
        .unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.total_allowed_deploys, 5);

    let outcome = engine
        .deploy(planetary(&user, SectorCoordinate::new(4, 0), later(1)), &mut store)
        .unwrap();
    assert_eq!(outcome.report.linked.len(), 4);
    assert_eq!(store.links().len(), 8);
}

#[test]
fn earned_redeploy_to_the_same_sector_links_new_rows() {
    let mut store = planets_and_asteroids();
    let mut engine = DeployEngine::new(DeployConfig::default());
    let user = UserId::new("explorer");
    let neighbour = UserId::new("neighbour");
    let sector = SectorCoordinate::new(0, 0);

    let first = engine.deploy(planetary(&user, sector, NOW), &mut store).unwrap();

    let theirs = store.add_classification(&neighbour, "planet");
    store.add_comment(&user, theirs, later(1));

    // Same sector and catalog give the same selection, but the rows are new.
    let second = engine
        .deploy(planetary(&user, sector, later(1)), &mut store)
        .unwrap();
    assert_eq!(second.report.linked, first.report.linked);
    assert_eq!(store.links().len(), 8);
    assert_eq!(engine.outbox().len(), 2);

    // The comment still counts, so a third deploy lands too.
    let third = engine
        .deploy(planetary(&user, sector, later(2)), &mut store)
        .unwrap();
    assert_eq!(third.report.linked.len(), 4);
    assert_eq!(store.links().len(), 12);

    let decision = engine
        .quota(&user, DeploymentType::Planetary, later(2), &store)
        .unwrap();
    assert_eq!(decision.quota.consumed_count, 12);
}

#[test]
fn short_window_reopens_before_a_calendar_week() {
    let config = DeployConfig {
        window_days: 2,
        ..Default::default()
    };
    let mut store = planets_and_asteroids();
    let mut engine = DeployEngine::new(config);
    let user = UserId::new("explorer");
    let sector = SectorCoordinate::new(2, 2);

    engine.deploy(planetary(&user, sector, NOW), &mut store).unwrap();
    let err = engine
        .deploy(planetary(&user, sector, later(1)), &mut store)
        .unwrap_err();
    assert!(matches!(err, DeployError::QuotaDenied { .. }));

    let decision = engine
        .quota(&user, DeploymentType::Planetary, later(3), &store)
        .unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.quota.consumed_count, 0);

    let outcome = engine
        .deploy(planetary(&user, sector, later(3)), &mut store)
        .unwrap();
    assert_eq!(outcome.report.linked.len(), 4);
    assert_eq!(store.links().len(), 8);

    // And again once the next window has rolled.
    engine
        .deploy(planetary(&user, sector, later(6)), &mut store)
        .unwrap();
    assert_eq!(store.links().len(), 12);
}

#[test]
fn comments_on_own_work_earn_nothing() {
    let mut store = planets_and_asteroids();
    let mut engine = DeployEngine::new(DeployConfig::default());
    let user = UserId::new("explorer");

    engine
        .deploy(planetary(&user, SectorCoordinate::new(0, 0), NOW), &mut store)
        .unwrap();
    let mine = store.add_classification(&user, "planet");
    store.add_comment(&user, mine, later(1));
    for _ in 0..3 {
        store.add_vote(&user, mine, true, later(1));
    }

    let err = engine
        .deploy(planetary(&user, SectorCoordinate::new(2, 0), later(1)), &mut store)
        .unwrap_err();
    assert!(matches!(err, DeployError::QuotaDenied { .. }));
}

#[test]
fn unlocked_pools_join_planetary_allocation() {
    let mut store = planets_and_asteroids();
    store.add_anomalies((30..=35).map(|id| CatalogedAnomaly::new(id, "active-asteroids")));
    store.add_anomalies((40..=45).map(|id| CatalogedAnomaly::new(id, "telescope-ngts")));
    let user = UserId::new("explorer");
    store.add_classification(&user, "telescope-minorPlanet");
    store.add_classification(&user, "telescope-minorPlanet");
    store.grant_upgrade(&user, UpgradeTag::NgtsAccess);
    store.grant_upgrade(&user, UpgradeTag::ProbeReceptors);

    let mut engine = DeployEngine::new(DeployConfig::default());
    let outcome = engine
        .deploy(planetary(&user, SectorCoordinate::new(0, 0), NOW), &mut store)
        .unwrap();
    assert_eq!(outcome.report.linked.len(), HARD_TARGET_CAP);
}

#[test]
fn partial_commit_can_be_completed_later() {
    let mut store = planets_and_asteroids();
    let mut engine = DeployEngine::new(DeployConfig::default());
    let user = UserId::new("explorer");

    let sector = SectorCoordinate::new(0, 0);

    // Work out the selection up front and fail the first two inserts.
    let pools = [
        CategoryPool {
            category: AnomalyCategory::Planet,
            items: (1..=10).map(|id| CatalogedAnomaly::new(id, "telescope-tess")).collect(),
        },
        CategoryPool {
            category: AnomalyCategory::MinorPlanet,
            items: (11..=15)
                .map(|id| CatalogedAnomaly::new(id, "telescope-minorPlanet"))
                .collect(),
        },
    ];
    let expected = allocate(&pools, 4, engine.resolver().seed(sector));
    store.fail_inserts_for(&[expected[0].id, expected[1].id]);

    let outcome = engine
        .deploy(planetary(&user, sector, NOW), &mut store)
        .unwrap();
    assert!(outcome.report.is_partial());
    assert_eq!(outcome.report.missing, vec![expected[0].id, expected[1].id]);
    assert_eq!(outcome.targets.len(), 2);
    assert_eq!(store.links().len(), 2);

    store.fail_inserts_for(&[]);
    let healed = engine.retry(&outcome.report, &mut store).unwrap();
    assert!(!healed.is_partial());
    assert_eq!(store.links().len(), 4);
}

#[test]
fn failed_notification_does_not_undo_deploy() {
    let mut store = planets_and_asteroids();
    let mut engine = DeployEngine::new(DeployConfig::default());
    let user = UserId::new("explorer");
    engine
        .deploy(planetary(&user, SectorCoordinate::new(0, 0), NOW), &mut store)
        .unwrap();

    store.fail_notifications(Some(StoreError::Timeout { operation: "notify" }));
    let summary = engine.dispatch_notifications(&mut store);
    assert_eq!(summary.dropped, 1);
    assert!(engine.outbox().is_empty());
    assert_eq!(store.links().len(), 4);
}

// ── Concurrency ────────────────────────────────────────────────────────

#[test]
fn concurrent_deploys_from_the_same_state_land_once() {
    for round in 0..20 {
        let shared = SharedStore::new(planets_and_asteroids());
        let user = UserId::new("explorer");

        let results: Vec<Result<_, DeployError>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|i| {
                    let mut store = shared.clone();
                    let user = &user;
                    s.spawn(move || {
                        let mut engine = DeployEngine::new(DeployConfig::default());
                        engine.deploy(
                            planetary(user, SectorCoordinate::new(i, round), NOW),
                            &mut store,
                        )
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("deploy thread panicked"))
                .collect()
        });

        let landed = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(landed, 1, "round {round}: {results:?}");
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(
                matches!(
                    err,
                    DeployError::AlreadyClaimed | DeployError::QuotaDenied { .. }
                ),
                "round {round}: unexpected {err:?}"
            );
        }
        assert_eq!(shared.lock().unwrap().links().len(), 4);
    }
}

#[test]
fn losing_the_claim_then_reissuing_reads_fresh_state() {
    let mut store = planets_and_asteroids();
    let mut engine = DeployEngine::new(DeployConfig::default());
    let user = UserId::new("explorer");
    let neighbour = UserId::new("neighbour");
    let sector = SectorCoordinate::new(0, 0);

    // A decision read before another action commits goes stale.
    let stale = engine
        .quota(&user, DeploymentType::Planetary, NOW, &store)
        .unwrap();
    engine.deploy(planetary(&user, sector, NOW), &mut store).unwrap();

    let err = DeploymentRecorder::new()
        .commit(
            &user,
            &[CatalogedAnomaly::new(1, "telescope-tess")],
            AutomatonKind::Telescope,
            &stale,
            NOW,
            &mut store,
        )
        .unwrap_err();
    assert_eq!(err, DeployError::AlreadyClaimed);
    assert!(err.is_retryable());
    assert_eq!(store.links().len(), 4);

    // Reissuing is judged by the quota, not the old claim.
    let denied = engine
        .deploy(planetary(&user, sector, NOW), &mut store)
        .unwrap_err();
    assert!(matches!(denied, DeployError::QuotaDenied { .. }));

    let theirs = store.add_classification(&neighbour, "planet");
    store.add_comment(&user, theirs, NOW);
    engine.deploy(planetary(&user, sector, NOW), &mut store).unwrap();
    assert_eq!(store.links().len(), 8);
}

// ── Allocation properties ──────────────────────────────────────────────

#[test]
fn allocation_never_exceeds_cap_or_duplicates() {
    let mut rng = StdRng::seed_from_u64(0xdee9);
    let categories = [
        (AnomalyCategory::Planet, "telescope-tess"),
        (AnomalyCategory::MinorPlanet, "telescope-minorPlanet"),
        (AnomalyCategory::ActiveAsteroid, "active-asteroids"),
        (AnomalyCategory::Ngts, "telescope-ngts"),
    ];

    for _ in 0..500 {
        let mut next_id = 1u64;
        let pools: Vec<CategoryPool> = categories
            .iter()
            .take(rng.gen_range(1..=categories.len()))
            .map(|&(category, tag)| {
                let n = rng.gen_range(0..20);
                let items = (0..n)
                    .map(|_| {
                        next_id += 1;
                        CatalogedAnomaly::new(next_id, tag)
                    })
                    .collect();
                CategoryPool { category, items }
            })
            .collect();
        let target = if rng.gen_bool(0.5) { 6 } else { 4 };
        let seed = rng.gen_range(-1_000_000.0..1_000_000.0);

        let picked = allocate(&pools, target, seed);
        let total: usize = pools.iter().map(|p| p.items.len()).sum();
        assert!(picked.len() <= HARD_TARGET_CAP);
        assert_eq!(picked.len(), target.min(total));
        let unique: HashSet<u64> = picked.iter().map(|a| a.id).collect();
        assert_eq!(unique.len(), picked.len());
        assert_eq!(allocate(&pools, target, seed), picked);
    }
}

#[test]
fn mixed_seed_scheme_separates_far_sectors() {
    let config = DeployConfig {
        seed_scheme: SeedScheme::Mixed,
        ..Default::default()
    };
    let engine = DeployEngine::new(config);
    let r = engine.resolver();
    assert_ne!(
        r.seed(SectorCoordinate::new(0, 1000)),
        r.seed(SectorCoordinate::new(1, 0))
    );
}
