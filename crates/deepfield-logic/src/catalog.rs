//! Catalogued anomalies, their categories, and deployment types.
//!
//! The external catalog labels each record with a free-form set tag
//! (`"telescope-tess"`, `"diskDetective"`, ...). At the allocation boundary
//! those tags are mapped onto the closed [`AnomalyCategory`] enum through
//! [`CATEGORY_TAGS`]. A tag missing from that table is an error, never a
//! default branch.
//!
//! # Deployment types
//!
//! | Type | Automaton | Category pools |
//! |------|-----------|----------------|
//! | Stellar | Telescope | disk detective, superWASP variables |
//! | Planetary | Telescope | TESS planets, minor planets, active asteroids\*, NGTS\* |
//! | Weather | WeatherSatellite | Jovian vortices, Mars clouds, Mars cloud shapes |
//!
//! \* only when the user has unlocked them (see [`Unlocks`]).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Catalog record id.
pub type AnomalyId = u64;

/// A record from the external anomaly catalog. Read-only to this engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogedAnomaly {
    pub id: AnomalyId,
    /// Catalog set tag, e.g. `"telescope-tess"`.
    pub anomaly_set: String,
    /// Planet a cloud record was observed on.
    #[serde(default)]
    pub parent_anomaly: Option<AnomalyId>,
    /// Display content (usually a target name).
    #[serde(default)]
    pub content: Option<String>,
    /// Raw configuration blob, passed through untouched.
    #[serde(default)]
    pub configuration: serde_json::Value,
}

impl CatalogedAnomaly {
    pub fn new(id: AnomalyId, anomaly_set: impl Into<String>) -> Self {
        Self {
            id,
            anomaly_set: anomaly_set.into(),
            parent_anomaly: None,
            content: None,
            configuration: serde_json::Value::Null,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_parent(mut self, parent: AnomalyId) -> Self {
        self.parent_anomaly = Some(parent);
        self
    }

    /// Resolve the set tag to a category.
    pub fn category(&self) -> Result<AnomalyCategory, UnknownCategoryTag> {
        AnomalyCategory::from_tag(&self.anomaly_set)
    }

    /// Human-facing label: the content if present, else `PREFIX-007`.
    pub fn label(&self, deployment_type: DeploymentType) -> String {
        match &self.content {
            Some(c) if !c.is_empty() => c.clone(),
            _ => format!("{}-{:03}", deployment_type.label_prefix(), self.id),
        }
    }
}

/// A catalog tag with no entry in [`CATEGORY_TAGS`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown anomaly set tag {tag:?}")]
pub struct UnknownCategoryTag {
    pub tag: String,
}

/// Internal anomaly categories. Each category is one allocation pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum AnomalyCategory {
    /// TESS transit candidates.
    Planet = 0,
    /// Minor planets (asteroids).
    MinorPlanet = 1,
    /// Active asteroids (unlock: 2+ minor planet classifications).
    ActiveAsteroid = 2,
    /// NGTS transit candidates (unlock: `ngtsAccess` research).
    Ngts = 3,
    /// Disk Detective circumstellar disks.
    DiskDetective = 4,
    /// SuperWASP variable stars.
    SuperWaspVariable = 5,
    /// Jovian vortex lidar scans.
    JovianVortex = 6,
    /// Cloudspotting on Mars.
    MarsCloud = 7,
    /// Mars cloud shapes from balloon imagery.
    MarsCloudShape = 8,
}

/// External catalog tag → internal category.
pub const CATEGORY_TAGS: &[(&str, AnomalyCategory)] = &[
    ("telescope-tess", AnomalyCategory::Planet),
    ("telescope-minorPlanet", AnomalyCategory::MinorPlanet),
    ("active-asteroids", AnomalyCategory::ActiveAsteroid),
    ("telescope-ngts", AnomalyCategory::Ngts),
    ("diskDetective", AnomalyCategory::DiskDetective),
    ("superwasp-variable", AnomalyCategory::SuperWaspVariable),
    ("telescope-superwasp-variable", AnomalyCategory::SuperWaspVariable),
    ("lidar-jovianVortexHunter", AnomalyCategory::JovianVortex),
    ("cloudspottingOnMars", AnomalyCategory::MarsCloud),
    ("balloon-marsCloudShapes", AnomalyCategory::MarsCloudShape),
];

impl AnomalyCategory {
    pub fn from_tag(tag: &str) -> Result<Self, UnknownCategoryTag> {
        CATEGORY_TAGS
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, c)| *c)
            .ok_or_else(|| UnknownCategoryTag {
                tag: tag.to_string(),
            })
    }

    /// Every catalog tag that maps to this category.
    pub fn tags(self) -> impl Iterator<Item = &'static str> {
        CATEGORY_TAGS
            .iter()
            .filter(move |(_, c)| *c == self)
            .map(|(t, _)| *t)
    }

    /// Cloud and vortex categories, the weather satellite's targets.
    pub fn is_weather(self) -> bool {
        matches!(
            self,
            Self::JovianVortex | Self::MarsCloud | Self::MarsCloudShape
        )
    }

    /// Render style used by sector views.
    pub fn style(self) -> MarkerStyle {
        match self {
            Self::Planet | Self::Ngts => MarkerStyle {
                color: "#78cce2",
                shape: MarkerShape::Circle,
            },
            Self::MinorPlanet | Self::ActiveAsteroid => MarkerStyle {
                color: "#f2c572",
                shape: MarkerShape::Triangle,
            },
            Self::DiskDetective | Self::SuperWaspVariable => MarkerStyle {
                color: "#e4eff0",
                shape: MarkerShape::Star,
            },
            Self::JovianVortex | Self::MarsCloud | Self::MarsCloudShape => MarkerStyle {
                color: "#a8d8ea",
                shape: MarkerShape::Cloud,
            },
        }
    }
}

/// Marker shape of a sector anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerShape {
    Circle,
    Triangle,
    Star,
    Cloud,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarkerStyle {
    pub color: &'static str,
    pub shape: MarkerShape,
}

/// Independent quota pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AutomatonKind {
    Telescope,
    WeatherSatellite,
}

impl AutomatonKind {
    /// Tag stored on linkage rows.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Telescope => "Telescope",
            Self::WeatherSatellite => "WeatherSatellite",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Telescope" => Some(Self::Telescope),
            "WeatherSatellite" => Some(Self::WeatherSatellite),
            _ => None,
        }
    }

    fn display_name(self) -> &'static str {
        match self {
            Self::Telescope => "Telescope",
            Self::WeatherSatellite => "Weather satellite",
        }
    }
}

impl fmt::Display for AutomatonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Mission type chosen at the start of a deploy session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentType {
    Stellar,
    Planetary,
    Weather,
}

impl DeploymentType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stellar" => Some(Self::Stellar),
            "planetary" => Some(Self::Planetary),
            "weather" => Some(Self::Weather),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stellar => "stellar",
            Self::Planetary => "planetary",
            Self::Weather => "weather",
        }
    }

    pub fn automaton(self) -> AutomatonKind {
        match self {
            Self::Stellar | Self::Planetary => AutomatonKind::Telescope,
            Self::Weather => AutomatonKind::WeatherSatellite,
        }
    }

    /// Category pools for this type, in allocation order.
    pub fn categories(self, unlocks: &Unlocks) -> Vec<AnomalyCategory> {
        match self {
            Self::Stellar => vec![
                AnomalyCategory::DiskDetective,
                AnomalyCategory::SuperWaspVariable,
            ],
            Self::Planetary => {
                let mut cats = vec![AnomalyCategory::Planet, AnomalyCategory::MinorPlanet];
                if unlocks.active_asteroids {
                    cats.push(AnomalyCategory::ActiveAsteroid);
                }
                if unlocks.ngts {
                    cats.push(AnomalyCategory::Ngts);
                }
                cats
            }
            Self::Weather => vec![
                AnomalyCategory::JovianVortex,
                AnomalyCategory::MarsCloud,
                AnomalyCategory::MarsCloudShape,
            ],
        }
    }

    /// Catalog tags to request for this type.
    pub fn tags_to_fetch(self, unlocks: &Unlocks) -> Vec<&'static str> {
        self.categories(unlocks)
            .into_iter()
            .flat_map(AnomalyCategory::tags)
            .collect()
    }

    /// Prefix for unnamed targets.
    pub fn label_prefix(self) -> &'static str {
        match self {
            Self::Stellar => "DSK",
            Self::Planetary => "TESS",
            Self::Weather => "CLD",
        }
    }

    /// Plural noun used in notifications.
    pub fn target_noun(self) -> &'static str {
        match self {
            Self::Stellar => "stellar objects",
            Self::Planetary => "exoplanet candidates",
            Self::Weather => "atmospheric anomalies",
        }
    }
}

/// Research tags that change what a deployment can reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpgradeTag {
    /// Raises the target count from 4 to 6.
    ProbeReceptors,
    /// Adds the NGTS pool to planetary deployments.
    NgtsAccess,
}

impl UpgradeTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProbeReceptors => "probereceptors",
            Self::NgtsAccess => "ngtsAccess",
        }
    }
}

/// Per-user unlock state resolved before a deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unlocks {
    pub active_asteroids: bool,
    pub ngts: bool,
    pub probe_receptors: bool,
}

/// Minor planet classifications needed before active asteroids appear.
pub const ACTIVE_ASTEROID_UNLOCK_CLASSIFICATIONS: u32 = 2;

/// One allocation pool: a category and its catalog entries in catalog order.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryPool {
    pub category: AnomalyCategory,
    pub items: Vec<CatalogedAnomaly>,
}

/// Split a fetched catalog into the pools of `deployment_type`.
///
/// Pools come back in the type's category order, including empty ones.
/// Records whose category belongs to a different deployment type are skipped
/// with a warning. Unknown tags are an error.
pub fn partition_pools(
    deployment_type: DeploymentType,
    unlocks: &Unlocks,
    catalog: &[CatalogedAnomaly],
) -> Result<Vec<CategoryPool>, UnknownCategoryTag> {
    let mut pools: Vec<CategoryPool> = deployment_type
        .categories(unlocks)
        .into_iter()
        .map(|category| CategoryPool {
            category,
            items: Vec::new(),
        })
        .collect();

    for anomaly in catalog {
        let category = anomaly.category()?;
        match pools.iter_mut().find(|p| p.category == category) {
            Some(pool) => pool.items.push(anomaly.clone()),
            None => log::warn!(
                "anomaly {} ({:?}) is not part of a {} deployment, skipping",
                anomaly.id,
                category,
                deployment_type.as_str()
            ),
        }
    }
    Ok(pools)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tag_round_trips_to_its_category() {
        for (tag, cat) in CATEGORY_TAGS {
            assert_eq!(AnomalyCategory::from_tag(tag), Ok(*cat));
            assert!(cat.tags().any(|t| t == *tag));
        }
    }

    #[test]
    fn unknown_tag_fails_loudly() {
        let err = AnomalyCategory::from_tag("telescope-sunspot").unwrap_err();
        assert_eq!(err.tag, "telescope-sunspot");
    }

    #[test]
    fn superwasp_has_two_tags() {
        let tags: Vec<_> = AnomalyCategory::SuperWaspVariable.tags().collect();
        assert_eq!(tags, vec!["superwasp-variable", "telescope-superwasp-variable"]);
    }

    #[test]
    fn planetary_pools_follow_unlocks() {
        let none = Unlocks::default();
        assert_eq!(
            DeploymentType::Planetary.categories(&none),
            vec![AnomalyCategory::Planet, AnomalyCategory::MinorPlanet]
        );

        let all = Unlocks {
            active_asteroids: true,
            ngts: true,
            probe_receptors: true,
        };
        assert_eq!(DeploymentType::Planetary.categories(&all).len(), 4);
        assert!(DeploymentType::Planetary
            .tags_to_fetch(&all)
            .contains(&"telescope-ngts"));
    }

    #[test]
    fn stellar_and_planetary_share_the_telescope() {
        assert_eq!(DeploymentType::Stellar.automaton(), AutomatonKind::Telescope);
        assert_eq!(DeploymentType::Planetary.automaton(), AutomatonKind::Telescope);
        assert_eq!(
            DeploymentType::Weather.automaton(),
            AutomatonKind::WeatherSatellite
        );
    }

    #[test]
    fn partition_keeps_catalog_order_and_empty_pools() {
        let catalog = vec![
            CatalogedAnomaly::new(5, "telescope-tess"),
            CatalogedAnomaly::new(2, "telescope-tess"),
            CatalogedAnomaly::new(9, "diskDetective"),
        ];
        let pools =
            partition_pools(DeploymentType::Planetary, &Unlocks::default(), &catalog).unwrap();
        assert_eq!(pools.len(), 2);
        assert_eq!(
            pools[0].items.iter().map(|a| a.id).collect::<Vec<_>>(),
            vec![5, 2]
        );
        assert!(pools[1].items.is_empty());
    }

    #[test]
    fn partition_rejects_unknown_tags() {
        let catalog = vec![CatalogedAnomaly::new(1, "mystery-set")];
        assert!(partition_pools(DeploymentType::Stellar, &Unlocks::default(), &catalog).is_err());
    }

    #[test]
    fn label_falls_back_to_padded_id() {
        let a = CatalogedAnomaly::new(7, "diskDetective");
        assert_eq!(a.label(DeploymentType::Stellar), "DSK-007");
        let b = CatalogedAnomaly::new(7, "telescope-tess").with_content("TIC 1234");
        assert_eq!(b.label(DeploymentType::Planetary), "TIC 1234");
    }
}
