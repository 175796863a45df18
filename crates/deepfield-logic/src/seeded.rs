//! Seeded generator: deterministic pseudo-random values for sector layout.
//!
//! Every procedural value in Deepfield (star placement, candidate presence,
//! allocation shuffles) comes from one sinusoidal hash:
//!
//! ```text
//! rand(seed, salt) = frac(sin(seed + salt) * 10000)
//! ```
//!
//! It is fast and decorrelated enough at sector-grid scale. It is NOT a
//! cryptographic generator and must never be used where unpredictability
//! matters.
//!
//! ```
//! use deepfield_logic::seeded::seeded_random;
//!
//! let a = seeded_random(42.0, 3.0);
//! assert_eq!(a, seeded_random(42.0, 3.0));
//! assert!((0.0..1.0).contains(&a));
//! ```

use serde::{Deserialize, Serialize};

use crate::sector::SectorCoordinate;

/// Multiplier applied to the sine before taking the fractional part.
const SINE_SCALE: f64 = 10_000.0;

/// Row stride of the legacy sector seed (`x * 1000 + y`).
pub const LEGACY_ROW_STRIDE: i64 = 1000;

/// Deterministic value in `[0, 1)` for a `(seed, salt)` pair.
pub fn seeded_random(seed: f64, salt: f64) -> f64 {
    let x = (seed + salt).sin() * SINE_SCALE;
    let r = x - x.floor();
    // frac() of a tiny negative number rounds up to exactly 1.0
    if r >= 1.0 {
        0.0
    } else {
        r
    }
}

/// How a sector coordinate is folded into a generator seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedScheme {
    /// `x * 1000 + y`. Distinct for every pair of sectors with `|y| < 1000`,
    /// and reproduces seeds recorded by earlier deployments.
    #[default]
    Legacy,
    /// SplitMix64 over both full axes, folded to 31 bits. Distinct sectors
    /// only share a seed by hash collision, never by stride or truncation.
    /// Not compatible with legacy seeds.
    Mixed,
}

impl SeedScheme {
    /// Seed for a sector under this scheme.
    pub fn sector_seed(self, coord: SectorCoordinate) -> f64 {
        match self {
            Self::Legacy => coord
                .x
                .wrapping_mul(LEGACY_ROW_STRIDE)
                .wrapping_add(coord.y) as f64,
            Self::Mixed => {
                let h = mix64(mix64(coord.x as u64) ^ coord.y as u64);
                // Keep the seed well inside f64's exact-integer range so that
                // `seed + index` stays distinct.
                (h >> 33) as f64
            }
        }
    }
}

/// SplitMix64 finalizer.
fn mix64(mut h: u64) -> u64 {
    h = h.wrapping_add(0x9e37_79b9_7f4a_7c15);
    h = (h ^ (h >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    h = (h ^ (h >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    h ^ (h >> 31)
}

/// Order `items` by `seeded_random(seed, index)` ascending and keep the first
/// `count`. The index is the item's position in the input slice, so the result
/// depends only on the slice order and the seed.
pub fn shuffle_and_pick<T: Clone>(items: &[T], seed: f64, count: usize) -> Vec<T> {
    if items.is_empty() || count == 0 {
        return Vec::new();
    }
    let mut keyed: Vec<(f64, usize)> = (0..items.len())
        .map(|i| (seeded_random(seed, i as f64), i))
        .collect();
    // Stable on equal keys: ties keep input order.
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    keyed
        .into_iter()
        .take(count)
        .map(|(_, i)| items[i].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_in_half_open_unit_range() {
        for seed in -500..500 {
            for salt in 0..8 {
                let r = seeded_random(seed as f64, salt as f64);
                assert!((0.0..1.0).contains(&r), "seed {seed} salt {salt} gave {r}");
            }
        }
    }

    #[test]
    fn same_inputs_same_output() {
        assert_eq!(seeded_random(1234.0, 5.0), seeded_random(1234.0, 5.0));
        assert_eq!(seeded_random(-7.0, 0.0), seeded_random(-7.0, 0.0));
    }

    #[test]
    fn salt_changes_output() {
        let distinct: std::collections::HashSet<u64> = (0..20)
            .map(|salt| seeded_random(99.0, salt as f64).to_bits())
            .collect();
        assert!(distinct.len() > 15);
    }

    #[test]
    fn legacy_seed_matches_row_stride() {
        let coord = SectorCoordinate::new(3, -2);
        assert_eq!(SeedScheme::Legacy.sector_seed(coord), 2998.0);
    }

    #[test]
    fn legacy_seed_collides_past_row_stride() {
        // The documented limitation: (0, 1000) and (1, 0) share a seed.
        let a = SeedScheme::Legacy.sector_seed(SectorCoordinate::new(0, 1000));
        let b = SeedScheme::Legacy.sector_seed(SectorCoordinate::new(1, 0));
        assert_eq!(a, b);
    }

    #[test]
    fn mixed_seed_separates_legacy_collisions() {
        let a = SeedScheme::Mixed.sector_seed(SectorCoordinate::new(0, 1000));
        let b = SeedScheme::Mixed.sector_seed(SectorCoordinate::new(1, 0));
        assert_ne!(a, b);
        assert!(a < (1u64 << 31) as f64);
    }

    #[test]
    fn mixed_seed_uses_the_high_bits_of_x() {
        let far = 1i64 << 32;
        let pairs = [
            (SectorCoordinate::new(0, 5), SectorCoordinate::new(far, 5)),
            (SectorCoordinate::new(-1, 0), SectorCoordinate::new(far - 1, 0)),
            (SectorCoordinate::new(3, 0), SectorCoordinate::new(0, 3)),
        ];
        for (a, b) in pairs {
            assert_ne!(
                SeedScheme::Mixed.sector_seed(a),
                SeedScheme::Mixed.sector_seed(b),
                "{a:?} vs {b:?}"
            );
        }
    }

    #[test]
    fn shuffle_and_pick_is_deterministic_and_bounded() {
        let items: Vec<u32> = (0..10).collect();
        let a = shuffle_and_pick(&items, 77.0, 4);
        let b = shuffle_and_pick(&items, 77.0, 4);
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);

        let all = shuffle_and_pick(&items, 77.0, 50);
        assert_eq!(all.len(), 10);
        let mut sorted = all.clone();
        sorted.sort();
        assert_eq!(sorted, items);
    }

    #[test]
    fn shuffle_and_pick_empty() {
        let empty: Vec<u32> = Vec::new();
        assert!(shuffle_and_pick(&empty, 1.0, 3).is_empty());
        assert!(shuffle_and_pick(&[1, 2, 3], 1.0, 0).is_empty());
    }
}
