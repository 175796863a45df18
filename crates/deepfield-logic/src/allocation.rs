//! Allocation engine: picks which anomalies a deployment links.
//!
//! Given the category pools of a deployment type, draws a bounded,
//! duplicate-free selection with the seeded shuffle:
//!
//! 1. `target = 4` (or 6 with the probe receptor upgrade), clamped to
//!    [`HARD_TARGET_CAP`].
//! 2. With N non-empty pools, take `ceil(target / N)` from each.
//! 3. Fill any shortfall from the union of everything not yet picked.
//! 4. Trim to `min(target, HARD_TARGET_CAP)`.
//!
//! Empty pools are skipped; all pools empty yields an empty selection, which
//! callers treat as the "no targets" state rather than an error.
//!
//! ```
//! use deepfield_logic::allocation::allocate;
//! use deepfield_logic::catalog::{AnomalyCategory, CatalogedAnomaly, CategoryPool};
//!
//! let planets = CategoryPool {
//!     category: AnomalyCategory::Planet,
//!     items: (1..=10).map(|id| CatalogedAnomaly::new(id, "telescope-tess")).collect(),
//! };
//! let asteroids = CategoryPool {
//!     category: AnomalyCategory::MinorPlanet,
//!     items: (11..=15).map(|id| CatalogedAnomaly::new(id, "telescope-minorPlanet")).collect(),
//! };
//! let picked = allocate(&[planets, asteroids], 4, 2998.0);
//! assert_eq!(picked.len(), 4);
//! ```

use std::collections::HashSet;

use crate::catalog::{AnomalyId, CatalogedAnomaly, CategoryPool};
use crate::config::{DeployConfig, HARD_TARGET_CAP};
use crate::seeded::shuffle_and_pick;

/// Seeded shuffle-and-slice, clamped to the hard cap and the pool size.
fn draw(items: &[CatalogedAnomaly], seed: f64, count: usize) -> Vec<CatalogedAnomaly> {
    let safe = count.min(HARD_TARGET_CAP).min(items.len());
    shuffle_and_pick(items, seed, safe)
}

/// Select up to `target_count` anomalies from `pools`.
pub fn allocate(pools: &[CategoryPool], target_count: usize, seed: f64) -> Vec<CatalogedAnomaly> {
    let target = target_count.min(HARD_TARGET_CAP);
    if target == 0 {
        return Vec::new();
    }

    let active: Vec<&CategoryPool> = pools.iter().filter(|p| !p.items.is_empty()).collect();
    let mut selected: Vec<CatalogedAnomaly> = Vec::with_capacity(HARD_TARGET_CAP);
    let mut taken: HashSet<AnomalyId> = HashSet::new();

    match active.len() {
        0 => return Vec::new(),
        1 => push_unique(&mut selected, &mut taken, draw(&active[0].items, seed, target)),
        n => {
            let per_pool = target.div_ceil(n);
            for pool in &active {
                push_unique(&mut selected, &mut taken, draw(&pool.items, seed, per_pool));
            }

            let shortfall = target.saturating_sub(selected.len());
            if shortfall > 0 {
                let mut seen = taken.clone();
                let leftovers: Vec<CatalogedAnomaly> = active
                    .iter()
                    .flat_map(|p| p.items.iter())
                    .filter(|a| seen.insert(a.id))
                    .cloned()
                    .collect();
                push_unique(&mut selected, &mut taken, draw(&leftovers, seed, shortfall));
            }
        }
    }

    selected.truncate(target.min(HARD_TARGET_CAP));
    log::debug!(
        "allocated {} of target {} from {} active pools",
        selected.len(),
        target,
        active.len()
    );
    selected
}

fn push_unique(
    selected: &mut Vec<CatalogedAnomaly>,
    taken: &mut HashSet<AnomalyId>,
    picks: Vec<CatalogedAnomaly>,
) {
    for a in picks {
        if taken.insert(a.id) {
            selected.push(a);
        }
    }
}

/// Config-aware front end to [`allocate`].
#[derive(Debug, Clone)]
pub struct Allocator<'c> {
    config: &'c DeployConfig,
}

impl<'c> Allocator<'c> {
    pub fn new(config: &'c DeployConfig) -> Self {
        Self { config }
    }

    pub fn target_count(&self, upgrade_unlocked: bool) -> usize {
        self.config.target_count(upgrade_unlocked)
    }

    pub fn allocate(
        &self,
        pools: &[CategoryPool],
        upgrade_unlocked: bool,
        seed: f64,
    ) -> Vec<CatalogedAnomaly> {
        allocate(pools, self.target_count(upgrade_unlocked), seed)
    }
}
