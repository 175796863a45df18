//! Sector grid: names, star fields, and per-sector anomaly candidates.
//!
//! The sky is an unbounded integer grid. Nothing about a sector is stored:
//! its name, decorative stars, and the anomalies "visible" there are all
//! recomputed from the coordinate and the catalog snapshot on every visit.
//!
//! ```
//! use deepfield_logic::catalog::CatalogedAnomaly;
//! use deepfield_logic::config::DeployConfig;
//! use deepfield_logic::sector::{SectorCoordinate, SectorResolver};
//!
//! let config = DeployConfig::default();
//! let resolver = SectorResolver::new(&config);
//! let catalog: Vec<_> = (1..=40).map(|id| CatalogedAnomaly::new(id, "telescope-tess")).collect();
//!
//! let a = resolver.resolve(SectorCoordinate::new(2, -3), &catalog).unwrap();
//! let b = resolver.resolve(SectorCoordinate::new(2, -3), &catalog).unwrap();
//! assert_eq!(a, b);
//! assert!(a.candidates.len() <= 8);
//! ```

use serde::{Deserialize, Serialize};

use crate::catalog::{AnomalyCategory, CatalogedAnomaly, MarkerStyle, UnknownCategoryTag};
use crate::config::DeployConfig;
use crate::seeded::{seeded_random, SeedScheme};

/// A cell of the sector grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SectorCoordinate {
    pub x: i64,
    pub y: i64,
}

impl SectorCoordinate {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// The neighbouring sector in `dir`. Screen convention: up is `y - 1`.
    pub fn step(self, dir: Direction) -> Self {
        match dir {
            Direction::Up => Self::new(self.x, self.y - 1),
            Direction::Down => Self::new(self.x, self.y + 1),
            Direction::Left => Self::new(self.x - 1, self.y),
            Direction::Right => Self::new(self.x + 1, self.y),
        }
    }

    /// Pan by a pointer drag. Returns the new sector once either axis of the
    /// drag exceeds [`DRAG_THRESHOLD`]; the view moves against the drag.
    pub fn drag(self, dx: f64, dy: f64) -> Option<Self> {
        if dx.abs() <= DRAG_THRESHOLD && dy.abs() <= DRAG_THRESHOLD {
            return None;
        }
        Some(Self::new(self.x - sign(dx), self.y - sign(dy)))
    }
}

/// Pointer travel (screen units) needed to pan one sector.
pub const DRAG_THRESHOLD: f64 = 50.0;

fn sign(v: f64) -> i64 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// A decorative background star. Purely cosmetic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Star {
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub brightness: f64,
    pub twinkle_speed: f64,
}

/// An anomaly as drawn inside one sector. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorAnomalyView {
    pub anomaly: CatalogedAnomaly,
    pub category: AnomalyCategory,
    /// Position inside the sector viewport, 10..90 on both axes.
    pub x: f64,
    pub y: f64,
    pub brightness: f64,
    pub size: f64,
    pub pulse_speed: f64,
    pub glow_intensity: f64,
    pub style: MarkerStyle,
    pub sector: String,
}

/// Everything shown for one sector visit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSector {
    pub coordinate: SectorCoordinate,
    pub name: String,
    pub stars: Vec<Star>,
    pub candidates: Vec<SectorAnomalyView>,
}

static NAME_STEMS: &[&str] = &[
    "Andromeda", "Aquila", "Ara", "Auriga", "Carina", "Cassiopeia", "Centaurus", "Cepheus",
    "Cetus", "Columba", "Corvus", "Crux", "Cygnus", "Dorado", "Draco", "Eridanus", "Fornax",
    "Grus", "Hydra", "Lacerta", "Lupus", "Lyra", "Musca", "Norma", "Octans", "Orion", "Pavo",
    "Perseus", "Phoenix", "Pictor", "Puppis", "Pyxis", "Sagitta", "Scutum", "Tucana", "Vela",
    "Volans", "Vulpecula",
];

static GREEK: &[&str] = &[
    "Alpha", "Beta", "Gamma", "Delta", "Epsilon", "Zeta", "Eta", "Theta", "Iota", "Kappa",
    "Lambda", "Sigma",
];

const NAME_SALT: f64 = 7919.0;
const STAR_SALT_BASE: f64 = 100.0;
const STAR_SALTS_PER_STAR: usize = 5;

/// Resolves sectors against a catalog snapshot.
#[derive(Debug, Clone)]
pub struct SectorResolver {
    scheme: SeedScheme,
    display_cap: usize,
    threshold: u32,
    star_count: usize,
}

impl SectorResolver {
    pub fn new(config: &DeployConfig) -> Self {
        Self {
            scheme: config.seed_scheme,
            display_cap: config.sector_display_cap,
            threshold: config.candidate_threshold,
            star_count: config.star_count,
        }
    }

    pub fn seed(&self, coord: SectorCoordinate) -> f64 {
        self.scheme.sector_seed(coord)
    }

    /// Human-readable sector label, e.g. `"Lyra Gamma-482"`.
    ///
    /// Names are a pure function of the seed. Two far-apart sectors may share
    /// a name; use the coordinate for identity.
    pub fn name(&self, coord: SectorCoordinate) -> String {
        let seed = self.seed(coord);
        let stem = pick(NAME_STEMS, seeded_random(seed, NAME_SALT));
        let letter = pick(GREEK, seeded_random(seed, NAME_SALT + 1.0));
        let number = 100 + (seeded_random(seed, NAME_SALT + 2.0) * 900.0) as u32;
        format!("{stem} {letter}-{number}")
    }

    pub fn star_field(&self, coord: SectorCoordinate) -> Vec<Star> {
        let seed = self.seed(coord);
        (0..self.star_count)
            .map(|i| {
                let base = STAR_SALT_BASE + (i * STAR_SALTS_PER_STAR) as f64;
                Star {
                    x: seeded_random(seed, base) * 100.0,
                    y: seeded_random(seed, base + 1.0) * 100.0,
                    size: seeded_random(seed, base + 2.0) * 2.0 + 0.5,
                    brightness: seeded_random(seed, base + 3.0) * 0.7 + 0.3,
                    twinkle_speed: seeded_random(seed, base + 4.0) * 3.0 + 1.0,
                }
            })
            .collect()
    }

    /// Catalog entries visible in `coord`, in catalog order, capped for display.
    ///
    /// Entry `i` is visible when `floor(rand(seed + i, 0) * 10) < threshold`
    /// (about 30% with the default threshold of 3).
    pub fn candidate_anomalies<'a>(
        &self,
        coord: SectorCoordinate,
        catalog: &'a [CatalogedAnomaly],
    ) -> Vec<&'a CatalogedAnomaly> {
        let seed = self.seed(coord);
        catalog
            .iter()
            .enumerate()
            .filter(|(i, _)| {
                let roll = (seeded_random(seed + *i as f64, 0.0) * 10.0).floor() as u32;
                roll < self.threshold
            })
            .map(|(_, a)| a)
            .take(self.display_cap)
            .collect()
    }

    /// Place one anomaly inside a sector.
    pub fn view(
        &self,
        anomaly: &CatalogedAnomaly,
        coord: SectorCoordinate,
    ) -> Result<SectorAnomalyView, UnknownCategoryTag> {
        let category = anomaly.category()?;
        let seed = anomaly.id as f64 + self.seed(coord);
        Ok(SectorAnomalyView {
            anomaly: anomaly.clone(),
            category,
            x: seeded_random(seed, 1.0) * 80.0 + 10.0,
            y: seeded_random(seed, 2.0) * 80.0 + 10.0,
            brightness: seeded_random(seed, 3.0) * 0.7 + 0.5,
            size: seeded_random(seed, 4.0) * 0.8 + 0.6,
            pulse_speed: seeded_random(seed, 5.0) * 2.0 + 1.0,
            glow_intensity: seeded_random(seed, 6.0) * 0.5 + 0.3,
            style: category.style(),
            sector: self.name(coord),
        })
    }

    /// Name, stars, and candidate views for one sector visit.
    pub fn resolve(
        &self,
        coord: SectorCoordinate,
        catalog: &[CatalogedAnomaly],
    ) -> Result<ResolvedSector, UnknownCategoryTag> {
        let candidates = self
            .candidate_anomalies(coord, catalog)
            .into_iter()
            .map(|a| self.view(a, coord))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ResolvedSector {
            coordinate: coord,
            name: self.name(coord),
            stars: self.star_field(coord),
            candidates,
        })
    }
}

fn pick(table: &[&'static str], r: f64) -> &'static str {
    let idx = ((r * table.len() as f64) as usize).min(table.len() - 1);
    table[idx]
}
