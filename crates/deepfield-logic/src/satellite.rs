//! Planet-focused weather satellite deployments.
//!
//! Besides sweeping a sector, a weather satellite can be parked over a single
//! planet. The planets on offer are the ones the user has classified, or
//! every catalogued planet when they have none yet. Cloud records belong to
//! a planet through [`CatalogedAnomaly::parent_anomaly`].
//!
//! | Mode | Links |
//! |------|-------|
//! | Weather | up to the target count of the planet's clouds, lowest ids first |
//! | Planets | the planet itself |

use serde::{Deserialize, Serialize};

use crate::catalog::{AnomalyId, CatalogedAnomaly};
use crate::config::HARD_TARGET_CAP;
use crate::sector::{Direction, DRAG_THRESHOLD};

/// Clouds shown for one focused planet.
pub const CLOUDS_PER_PLANET: usize = 10;

/// Classification type that puts a planet on the user's own list.
pub const PLANET_CLASSIFICATION: &str = "planet";

/// What the satellite watches once parked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestigationMode {
    #[default]
    Weather,
    Planets,
}

impl InvestigationMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "weather" => Some(Self::Weather),
            "planets" => Some(Self::Planets),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::Planets => "planets",
        }
    }

    /// Plural noun used in notifications.
    pub fn target_noun(self) -> &'static str {
        match self {
            Self::Weather => "atmospheric anomalies",
            Self::Planets => "planets under observation",
        }
    }
}

/// The planet list and which planet is in focus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanetFocus {
    planets: Vec<CatalogedAnomaly>,
    index: usize,
    community: bool,
}

impl PlanetFocus {
    /// `planets` is the catalog's planet set, `classified` the planet ids the
    /// user has classified. Falls back to the whole set when the user has
    /// classified none of them.
    pub fn new(mut planets: Vec<CatalogedAnomaly>, classified: &[AnomalyId]) -> Self {
        planets.sort_by_key(|p| p.id);
        let own: Vec<CatalogedAnomaly> = planets
            .iter()
            .filter(|p| classified.contains(&p.id))
            .cloned()
            .collect();
        let community = own.is_empty();
        Self {
            planets: if community { planets } else { own },
            index: 0,
            community,
        }
    }

    pub fn planets(&self) -> &[CatalogedAnomaly] {
        &self.planets
    }

    /// Whether the list is the community fallback rather than the user's own.
    pub fn is_community(&self) -> bool {
        self.community
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn focused(&self) -> Option<&CatalogedAnomaly> {
        self.planets.get(self.index)
    }

    /// Jump to a planet by id. `false` if it is not on the list.
    pub fn focus(&mut self, id: AnomalyId) -> bool {
        match self.planets.iter().position(|p| p.id == id) {
            Some(i) => {
                self.index = i;
                true
            }
            None => false,
        }
    }

    /// D-pad: left and right move through the list and stop at its ends.
    /// Up and down do nothing.
    pub fn step(&mut self, dir: Direction) -> Option<&CatalogedAnomaly> {
        match dir {
            Direction::Left => self.index = self.index.saturating_sub(1),
            Direction::Right if self.index + 1 < self.planets.len() => self.index += 1,
            _ => {}
        }
        self.focused()
    }

    /// Horizontal drag. Past the threshold a rightward drag focuses the
    /// previous planet and a leftward one the next. Returns whether the
    /// focus moved.
    pub fn drag(&mut self, dx: f64) -> bool {
        if dx.abs() <= DRAG_THRESHOLD {
            return false;
        }
        let before = self.index;
        self.step(if dx > 0.0 {
            Direction::Left
        } else {
            Direction::Right
        });
        self.index != before
    }
}

/// Weather records parented to `planet`, lowest ids first, at most
/// [`CLOUDS_PER_PLANET`].
pub fn clouds_for(planet: AnomalyId, catalog: &[CatalogedAnomaly]) -> Vec<CatalogedAnomaly> {
    let mut clouds: Vec<CatalogedAnomaly> = catalog
        .iter()
        .filter(|a| a.parent_anomaly == Some(planet))
        .filter(|a| a.category().is_ok_and(|c| c.is_weather()))
        .cloned()
        .collect();
    clouds.sort_by_key(|a| a.id);
    clouds.truncate(CLOUDS_PER_PLANET);
    clouds
}

/// What a planet-focused deployment links.
pub fn satellite_targets(
    mode: InvestigationMode,
    planet: &CatalogedAnomaly,
    clouds: &[CatalogedAnomaly],
    target_count: usize,
) -> Vec<CatalogedAnomaly> {
    match mode {
        InvestigationMode::Planets => vec![planet.clone()],
        InvestigationMode::Weather => clouds
            .iter()
            .take(target_count.min(HARD_TARGET_CAP))
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planets(ids: &[u64]) -> Vec<CatalogedAnomaly> {
        ids.iter()
            .map(|&id| CatalogedAnomaly::new(id, "telescope-tess"))
            .collect()
    }

    #[test]
    fn own_planets_come_first() {
        let focus = PlanetFocus::new(planets(&[4, 1, 9]), &[9, 4, 77]);
        assert!(!focus.is_community());
        let ids: Vec<u64> = focus.planets().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![4, 9]);
    }

    #[test]
    fn no_classifications_falls_back_to_community() {
        let focus = PlanetFocus::new(planets(&[3, 1, 2]), &[]);
        assert!(focus.is_community());
        assert_eq!(focus.planets().len(), 3);
        assert_eq!(focus.focused().map(|p| p.id), Some(1));
    }

    #[test]
    fn dpad_clamps_at_both_ends() {
        let mut focus = PlanetFocus::new(planets(&[1, 2, 3]), &[]);
        assert_eq!(focus.step(Direction::Left).map(|p| p.id), Some(1));
        focus.step(Direction::Right);
        focus.step(Direction::Right);
        assert_eq!(focus.step(Direction::Right).map(|p| p.id), Some(3));
        assert_eq!(focus.step(Direction::Up).map(|p| p.id), Some(3));
    }

    #[test]
    fn drag_moves_one_planet_past_threshold() {
        let mut focus = PlanetFocus::new(planets(&[1, 2, 3]), &[]);
        assert!(!focus.drag(-30.0));
        assert!(focus.drag(-60.0));
        assert_eq!(focus.index(), 1);
        assert!(focus.drag(60.0));
        assert_eq!(focus.index(), 0);
        assert!(!focus.drag(60.0));
    }

    #[test]
    fn focus_by_id() {
        let mut focus = PlanetFocus::new(planets(&[1, 2, 3]), &[]);
        assert!(focus.focus(3));
        assert_eq!(focus.index(), 2);
        assert!(!focus.focus(40));
        assert_eq!(focus.index(), 2);
    }

    #[test]
    fn clouds_are_scoped_to_the_planet_and_capped() {
        let mut catalog: Vec<CatalogedAnomaly> = (100..115)
            .rev()
            .map(|id| CatalogedAnomaly::new(id, "cloudspottingOnMars").with_parent(1))
            .collect();
        catalog.push(CatalogedAnomaly::new(50, "lidar-jovianVortexHunter").with_parent(2));
        catalog.push(CatalogedAnomaly::new(51, "balloon-marsCloudShapes"));
        // A planet parented to a planet is not a cloud.
        catalog.push(CatalogedAnomaly::new(52, "telescope-tess").with_parent(1));

        let clouds = clouds_for(1, &catalog);
        assert_eq!(clouds.len(), CLOUDS_PER_PLANET);
        assert_eq!(clouds[0].id, 100);
        assert!(clouds.iter().all(|c| c.parent_anomaly == Some(1)));

        assert_eq!(clouds_for(2, &catalog).len(), 1);
        assert!(clouds_for(3, &catalog).is_empty());
    }

    #[test]
    fn targets_follow_the_mode() {
        let planet = CatalogedAnomaly::new(1, "telescope-tess");
        let clouds: Vec<CatalogedAnomaly> = (10..16)
            .map(|id| CatalogedAnomaly::new(id, "cloudspottingOnMars").with_parent(1))
            .collect();

        let weather = satellite_targets(InvestigationMode::Weather, &planet, &clouds, 4);
        assert_eq!(
            weather.iter().map(|a| a.id).collect::<Vec<_>>(),
            vec![10, 11, 12, 13]
        );
        let upgraded = satellite_targets(InvestigationMode::Weather, &planet, &clouds, 40);
        assert_eq!(upgraded.len(), HARD_TARGET_CAP);

        let watch = satellite_targets(InvestigationMode::Planets, &planet, &clouds, 4);
        assert_eq!(watch, vec![planet]);
    }

    #[test]
    fn modes_parse() {
        assert_eq!(InvestigationMode::parse("planets"), Some(InvestigationMode::Planets));
        assert_eq!(InvestigationMode::parse("clouds"), None);
        assert_eq!(InvestigationMode::default().as_str(), "weather");
    }
}
