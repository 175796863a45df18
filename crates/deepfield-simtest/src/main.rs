//! Deepfield Headless Deployment Harness
//!
//! Validates the deployment logic and shipped data without SpacetimeDB.
//! Runs entirely in-process against the in-memory store.
//!
//! Usage:
//!   cargo run -p deepfield-simtest
//!   cargo run -p deepfield-simtest -- --verbose
//!   RUST_LOG=deepfield_logic=debug cargo run -p deepfield-simtest

use std::collections::HashSet;

use deepfield_logic::allocation::allocate;
use deepfield_logic::catalog::{
    partition_pools, AnomalyCategory, AutomatonKind, CatalogedAnomaly, DeploymentType, Unlocks,
    UpgradeTag,
};
use deepfield_logic::config::{DeployConfig, HARD_TARGET_CAP};
use deepfield_logic::error::DeployError;
use deepfield_logic::memory::{MemoryStore, SharedStore};
use deepfield_logic::pipeline::{DeployEngine, DeployRequest, SatelliteRequest};
use deepfield_logic::satellite::InvestigationMode;
use deepfield_logic::quota::{evaluate_counts, QuotaCounts};
use deepfield_logic::sector::{Direction, SectorCoordinate, SectorResolver};
use deepfield_logic::session::{DeploySession, SessionError, SessionPhase};
use deepfield_logic::store::UserId;
use deepfield_logic::time::{Timestamp, MICROS_PER_DAY};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ── Shipped data (same JSON the server is seeded from) ──────────────────
const CATALOG_JSON: &str = include_str!("../../../data/catalog.json");
const CONFIG_JSON: &str = include_str!("../../../data/deploy_config.json");

const NOW: Timestamp = Timestamp::from_micros(1_700_000_000_000_000);

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn check(name: &str, passed: bool, detail: impl Into<String>) -> TestResult {
    TestResult {
        name: name.into(),
        passed,
        detail: detail.into(),
    }
}

fn main() {
    let verbose = std::env::args().any(|a| a == "--verbose");
    // RUST_LOG wins; otherwise --verbose shows the engine's info lines.
    let default_level = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
    println!("=== Deepfield Deployment Harness ===\n");

    let (config, catalog, mut results) = load_data();
    if results.iter().any(|r| !r.passed) {
        report(&results, verbose);
        return;
    }

    // 1. Sector determinism sweep
    results.extend(validate_sectors(&config, &catalog));

    // 2. Allocation property sweep
    results.extend(validate_allocation(&catalog));

    // 3. Quota rule table
    results.extend(validate_quota(&config));

    // 4. Deploy scenarios
    results.extend(validate_deploys(&config, &catalog));

    // 5. Concurrent deploys
    results.extend(validate_concurrency(&config, &catalog));

    // 6. Session walk-through
    results.extend(validate_session(&config, &catalog));

    // 7. Planet-focused satellites
    results.extend(validate_satellite(&config, &catalog));

    report(&results, verbose);
}

fn report(results: &[TestResult], verbose: bool) {
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.len() - passed;

    for r in results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed,
        results.len(),
        failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 0. Data ─────────────────────────────────────────────────────────────

fn load_data() -> (DeployConfig, Vec<CatalogedAnomaly>, Vec<TestResult>) {
    println!("--- Data ---");
    let mut results = Vec::new();

    let config = match DeployConfig::from_json(CONFIG_JSON) {
        Ok(c) => {
            results.push(check("config_parse", true, format!("{:?}", c.seed_scheme)));
            c
        }
        Err(e) => {
            results.push(check("config_parse", false, e.to_string()));
            DeployConfig::default()
        }
    };

    let catalog: Vec<CatalogedAnomaly> = match serde_json::from_str(CATALOG_JSON) {
        Ok(c) => c,
        Err(e) => {
            results.push(check("catalog_parse", false, format!("JSON parse error: {}", e)));
            return (config, Vec::new(), results);
        }
    };
    log::info!("catalog.json: {} anomalies", catalog.len());
    results.push(check(
        "catalog_not_empty",
        !catalog.is_empty(),
        format!("{} anomalies loaded", catalog.len()),
    ));

    let unknown: Vec<_> = catalog.iter().filter(|a| a.category().is_err()).collect();
    results.push(check(
        "catalog_tags_known",
        unknown.is_empty(),
        if unknown.is_empty() {
            "every set tag maps to a category".to_string()
        } else {
            format!("{} anomalies with unknown tags", unknown.len())
        },
    ));

    let ids: HashSet<u64> = catalog.iter().map(|a| a.id).collect();
    results.push(check(
        "catalog_ids_unique",
        ids.len() == catalog.len(),
        format!("{} unique ids", ids.len()),
    ));

    let all = Unlocks {
        active_asteroids: true,
        ngts: true,
        probe_receptors: true,
    };
    for t in [
        DeploymentType::Stellar,
        DeploymentType::Planetary,
        DeploymentType::Weather,
    ] {
        let covered = t
            .categories(&all)
            .into_iter()
            .filter(|c| catalog.iter().any(|a| a.category() == Ok(*c)))
            .count();
        results.push(check(
            &format!("catalog_covers_{}", t.as_str()),
            covered > 0,
            format!("{} of {} pools stocked", covered, t.categories(&all).len()),
        ));
    }

    (config, catalog, results)
}

// ── 1. Sectors ──────────────────────────────────────────────────────────

fn validate_sectors(config: &DeployConfig, catalog: &[CatalogedAnomaly]) -> Vec<TestResult> {
    println!("--- Sectors ---");
    let resolver = SectorResolver::new(config);
    let mut mismatches = 0;
    let mut over_cap = 0;
    let mut visited = 0;

    for x in -20..=20 {
        for y in -20..=20 {
            let c = SectorCoordinate::new(x, y);
            let a = resolver.resolve(c, catalog);
            let b = resolver.resolve(c, catalog);
            match (a, b) {
                (Ok(a), Ok(b)) => {
                    if a != b {
                        mismatches += 1;
                    }
                    if a.candidates.len() > config.sector_display_cap {
                        over_cap += 1;
                    }
                }
                _ => mismatches += 1,
            }
            visited += 1;
        }
    }

    vec![
        check(
            "sector_resolve_deterministic",
            mismatches == 0,
            format!("{} sectors, {} mismatches", visited, mismatches),
        ),
        check(
            "sector_display_cap",
            over_cap == 0,
            format!("{} sectors over cap {}", over_cap, config.sector_display_cap),
        ),
        check(
            "sector_star_count",
            resolver.star_field(SectorCoordinate::new(3, 4)).len() == config.star_count,
            format!("{} stars per sector", config.star_count),
        ),
    ]
}

// ── 2. Allocation ───────────────────────────────────────────────────────

fn validate_allocation(catalog: &[CatalogedAnomaly]) -> Vec<TestResult> {
    println!("--- Allocation ---");
    let mut rng = StdRng::seed_from_u64(42);
    let mut violations = Vec::new();
    let runs = 2000;

    for run in 0..runs {
        let deployment_type = match rng.gen_range(0..3) {
            0 => DeploymentType::Stellar,
            1 => DeploymentType::Planetary,
            _ => DeploymentType::Weather,
        };
        let unlocks = Unlocks {
            active_asteroids: rng.gen_bool(0.5),
            ngts: rng.gen_bool(0.5),
            probe_receptors: rng.gen_bool(0.5),
        };
        // Random slice of the catalog so pool sizes vary.
        let subset: Vec<CatalogedAnomaly> = catalog
            .iter()
            .filter(|_| rng.gen_bool(0.6))
            .cloned()
            .collect();
        let pools = match partition_pools(deployment_type, &unlocks, &subset) {
            Ok(p) => p,
            Err(e) => {
                violations.push(format!("run {}: {}", run, e));
                continue;
            }
        };
        let target = if unlocks.probe_receptors { 6 } else { 4 };
        let seed = rng.gen_range(-1_000_000.0..1_000_000.0);
        let picked = allocate(&pools, target, seed);

        let unique: HashSet<u64> = picked.iter().map(|a| a.id).collect();
        if picked.len() > HARD_TARGET_CAP || unique.len() != picked.len() {
            violations.push(format!("run {}: {} picked, {} unique", run, picked.len(), unique.len()));
        }
        if allocate(&pools, target, seed) != picked {
            violations.push(format!("run {}: not deterministic", run));
        }
    }

    let empty = allocate(&[], 6, 1.0);
    vec![
        check(
            "allocation_bounded_unique_deterministic",
            violations.is_empty(),
            if violations.is_empty() {
                format!("{} random allocations clean", runs)
            } else {
                violations.join("; ")
            },
        ),
        check(
            "allocation_empty_pools",
            empty.is_empty(),
            format!("{} picked from no pools", empty.len()),
        ),
    ]
}

// ── 3. Quota ────────────────────────────────────────────────────────────

fn validate_quota(config: &DeployConfig) -> Vec<TestResult> {
    println!("--- Quota ---");
    // (linked, comments, upvotes, expected allowed)
    let table = [
        (0, 0, 0, true),
        (1, 0, 2, false),
        (1, 1, 0, true),
        (1, 0, 3, true),
        (4, 0, 0, false),
        (24, 1, 0, true),
    ];
    table
        .iter()
        .map(|&(linked, comments, upvotes, expected)| {
            let d = evaluate_counts(
                &QuotaCounts {
                    linked,
                    comments,
                    upvotes,
                },
                config,
                AutomatonKind::Telescope,
            );
            check(
                &format!("quota_l{}_c{}_v{}", linked, comments, upvotes),
                d.allowed == expected,
                format!(
                    "allowed={} total={} earned={}",
                    d.allowed, d.total_allowed_deploys, d.quota.earned_allowance
                ),
            )
        })
        .collect()
}

// ── 4. Deploy scenarios ─────────────────────────────────────────────────

fn seeded_store(catalog: &[CatalogedAnomaly]) -> MemoryStore {
    let mut store = MemoryStore::new();
    store.add_anomalies(catalog.iter().cloned());
    store
}

fn request(user: &UserId, deployment_type: DeploymentType, x: i64, days: i64) -> DeployRequest<'_> {
    DeployRequest {
        user,
        deployment_type,
        sector: SectorCoordinate::new(x, 0),
        now: Timestamp::from_micros(NOW.micros() + days * MICROS_PER_DAY),
    }
}

fn validate_deploys(config: &DeployConfig, catalog: &[CatalogedAnomaly]) -> Vec<TestResult> {
    println!("--- Deploys ---");
    let mut results = Vec::new();
    let mut store = seeded_store(catalog);
    let mut engine = DeployEngine::new(config.clone());
    let user = UserId::new("simtest-user");
    let other = UserId::new("simtest-neighbour");

    let first = engine.deploy(request(&user, DeploymentType::Planetary, 0, 0), &mut store);
    results.push(check(
        "deploy_fresh_user",
        matches!(&first, Ok(o) if o.report.linked.len() == 4),
        match &first {
            Ok(o) => o.message.clone(),
            Err(e) => e.to_string(),
        },
    ));

    let second = engine.deploy(request(&user, DeploymentType::Stellar, 1, 1), &mut store);
    results.push(check(
        "deploy_denied_same_week",
        matches!(second, Err(DeployError::QuotaDenied { .. })),
        format!("{:?}", second.err()),
    ));

    let weather = engine.deploy(request(&user, DeploymentType::Weather, 2, 1), &mut store);
    results.push(check(
        "deploy_weather_independent",
        weather.is_ok(),
        match &weather {
            Ok(o) => o.targets.join(", "),
            Err(e) => e.to_string(),
        },
    ));

    let theirs = store.add_classification(&other, "planet");
    store.add_comment(&user, theirs, Timestamp::from_micros(NOW.micros() + MICROS_PER_DAY));
    let earned = engine.deploy(request(&user, DeploymentType::Stellar, 3, 2), &mut store);
    results.push(check(
        "deploy_earned_redeploy",
        earned.is_ok(),
        match &earned {
            Ok(o) => o.message.clone(),
            Err(e) => e.to_string(),
        },
    ));

    let before = store.links().len();
    let again = engine.deploy(request(&user, DeploymentType::Planetary, 0, 2), &mut store);
    let added = store.links().len() - before;
    results.push(check(
        "deploy_same_sector_adds_rows",
        matches!(&again, Ok(o) if !o.report.linked.is_empty() && added == o.report.linked.len()),
        format!("{} new rows", added),
    ));

    let rolled = engine.deploy(request(&other, DeploymentType::Planetary, 0, 9), &mut store);
    results.push(check(
        "deploy_other_user",
        rolled.is_ok(),
        format!("{} links total", store.links().len()),
    ));

    let mut upgraded = seeded_store(catalog);
    upgraded.grant_upgrade(&user, UpgradeTag::ProbeReceptors);
    let six = engine.deploy(request(&user, DeploymentType::Planetary, 5, 0), &mut upgraded);
    results.push(check(
        "deploy_probe_receptors_six",
        matches!(&six, Ok(o) if o.report.linked.len() == 6),
        format!("{:?}", six.map(|o| o.report.linked)),
    ));

    let mut empty = MemoryStore::new();
    let none = engine.deploy(request(&user, DeploymentType::Planetary, 0, 0), &mut empty);
    results.push(check(
        "deploy_exhausted_pool",
        matches!(none, Err(DeployError::ExhaustedPool)),
        format!("{:?}", none.err()),
    ));

    let summary = engine.dispatch_notifications(&mut store);
    results.push(check(
        "notifications_delivered",
        summary.dropped == 0 && summary.delivered == store.sent_notifications().len(),
        format!("{} delivered, {} dropped", summary.delivered, summary.dropped),
    ));

    results
}

// ── 5. Concurrency ──────────────────────────────────────────────────────

fn validate_concurrency(config: &DeployConfig, catalog: &[CatalogedAnomaly]) -> Vec<TestResult> {
    println!("--- Concurrency ---");
    let rounds = 50;
    let mut double_lands = 0;

    for round in 0..rounds {
        let shared = SharedStore::new(seeded_store(catalog));
        let user = UserId::new("racer");
        let landed = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let mut store = shared.clone();
                    let user = &user;
                    let config = config.clone();
                    s.spawn(move || {
                        let mut engine = DeployEngine::new(config);
                        engine
                            .deploy(
                                request(user, DeploymentType::Planetary, i + round, 0),
                                &mut store,
                            )
                            .is_ok()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or(false))
                .filter(|ok| *ok)
                .count()
        });
        if landed != 1 {
            log::warn!("round {}: {} concurrent deploys landed", round, landed);
            double_lands += 1;
        }
    }

    vec![check(
        "concurrent_deploys_land_once",
        double_lands == 0,
        format!("{} of {} rounds landed other than once", double_lands, rounds),
    )]
}

// ── 6. Session ──────────────────────────────────────────────────────────

fn walk(
    session: &mut DeploySession,
    resolver: &SectorResolver,
    catalog: &[CatalogedAnomaly],
) -> Result<(), SessionError> {
    session.choose_type(DeploymentType::Planetary, resolver, catalog)?;
    session.step(Direction::Right, resolver, catalog)?;
    session.step(Direction::Up, resolver, catalog)?;
    session.select_sector()?;
    Ok(())
}

fn validate_session(config: &DeployConfig, catalog: &[CatalogedAnomaly]) -> Vec<TestResult> {
    println!("--- Session ---");
    let resolver = SectorResolver::new(config);
    let mut session = DeploySession::new();

    let walked = walk(&mut session, &resolver, catalog);

    let mut results = vec![check(
        "session_browse_and_select",
        walked.is_ok() && session.phase() == SessionPhase::SectorSelected,
        format!("at {:?} in {:?}", session.coordinate(), session.phase()),
    )];

    let blocked = session.step(Direction::Left, &resolver, catalog).is_err();
    results.push(check(
        "session_no_pan_when_selected",
        blocked,
        "navigation rejected while a sector is selected",
    ));

    let reset = session.change_type().is_ok()
        && session.phase() == SessionPhase::TypeSelection
        && session.sector().is_none();
    results.push(check(
        "session_change_type_resets",
        reset,
        format!("{:?}", session.phase()),
    ));

    let categories: HashSet<AnomalyCategory> =
        catalog.iter().filter_map(|a| a.category().ok()).collect();
    results.push(check(
        "catalog_category_spread",
        categories.len() >= 8,
        format!("{} categories present", categories.len()),
    ));

    results
}

// ── 7. Satellite ────────────────────────────────────────────────────────

fn validate_satellite(config: &DeployConfig, catalog: &[CatalogedAnomaly]) -> Vec<TestResult> {
    println!("--- Satellite ---");
    let mut results = Vec::new();
    let mut store = seeded_store(catalog);
    let mut engine = DeployEngine::new(config.clone());
    let user = UserId::new("satellite-user");

    let focus = engine.planet_focus(&user, &store);
    results.push(check(
        "satellite_community_fallback",
        matches!(&focus, Ok(f) if f.is_community() && !f.planets().is_empty()),
        match &focus {
            Ok(f) => format!("{} planets on offer", f.planets().len()),
            Err(e) => e.to_string(),
        },
    ));

    // Park over the planet with the most clouds.
    let planet = catalog
        .iter()
        .filter_map(|a| a.parent_anomaly)
        .max_by_key(|p| catalog.iter().filter(|a| a.parent_anomaly == Some(*p)).count());
    let Some(planet) = planet else {
        results.push(check("satellite_clouds_present", false, "no parented clouds in catalog"));
        return results;
    };

    let outcome = engine.deploy_satellite(
        SatelliteRequest {
            user: &user,
            planet,
            mode: InvestigationMode::Weather,
            now: NOW,
        },
        &mut store,
    );
    let scoped = match &outcome {
        Ok(o) => o.report.linked.iter().all(|id| {
            catalog
                .iter()
                .any(|a| a.id == *id && a.parent_anomaly == Some(planet))
        }),
        Err(_) => false,
    };
    results.push(check(
        "satellite_clouds_scoped_to_planet",
        scoped,
        match &outcome {
            Ok(o) => format!("planet {}: {:?}", planet, o.report.linked),
            Err(e) => e.to_string(),
        },
    ));

    let watcher = UserId::new("satellite-watcher");
    let watched = engine.deploy_satellite(
        SatelliteRequest {
            user: &watcher,
            planet,
            mode: InvestigationMode::Planets,
            now: NOW,
        },
        &mut store,
    );
    results.push(check(
        "satellite_planets_mode",
        matches!(&watched, Ok(o) if o.report.linked == vec![planet]),
        format!("{:?}", watched.map(|o| o.report.linked)),
    ));

    results
}
