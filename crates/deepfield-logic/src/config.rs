//! Tunable deployment parameters.
//!
//! Everything here can be overridden from JSON; missing fields fall back to
//! [`DeployConfig::default`]. The global hard cap on targets per deployment
//! is deliberately not configurable, see [`HARD_TARGET_CAP`].
//!
//! ```
//! use deepfield_logic::config::DeployConfig;
//!
//! let config = DeployConfig::from_json(r#"{ "window_days": 14 }"#).unwrap();
//! assert_eq!(config.window_days, 14);
//! assert_eq!(config.base_target_count, 4);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::seeded::SeedScheme;

/// No deployment ever links more than this many anomalies.
pub const HARD_TARGET_CAP: usize = 6;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid deploy config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid deploy config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Length of the rolling quota window in days.
    pub window_days: u32,
    /// Up-votes needed for one earned deploy.
    pub votes_per_deploy: u32,
    /// Targets per deployment without the probe receptor upgrade.
    pub base_target_count: usize,
    /// Targets per deployment with the probe receptor upgrade.
    pub upgraded_target_count: usize,
    /// Candidates shown per sector.
    pub sector_display_cap: usize,
    /// An item is a sector candidate when `floor(rand * 10) < threshold`.
    pub candidate_threshold: u32,
    /// Decorative stars generated per sector.
    pub star_count: usize,
    /// How sector coordinates become generator seeds.
    pub seed_scheme: SeedScheme,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
            votes_per_deploy: 3,
            base_target_count: 4,
            upgraded_target_count: 6,
            sector_display_cap: 8,
            candidate_threshold: 3,
            star_count: 60,
            seed_scheme: SeedScheme::Legacy,
        }
    }
}

impl DeployConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_days == 0 {
            return Err(ConfigError::Invalid("window_days must be positive".into()));
        }
        if self.votes_per_deploy == 0 {
            return Err(ConfigError::Invalid(
                "votes_per_deploy must be positive".into(),
            ));
        }
        if self.base_target_count == 0 || self.upgraded_target_count == 0 {
            return Err(ConfigError::Invalid("target counts must be positive".into()));
        }
        if self.candidate_threshold > 10 {
            return Err(ConfigError::Invalid(
                "candidate_threshold is out of 10 and cannot exceed it".into(),
            ));
        }
        Ok(())
    }

    /// Target count for a deployment, clamped to [`HARD_TARGET_CAP`].
    pub fn target_count(&self, upgrade_unlocked: bool) -> usize {
        let requested = if upgrade_unlocked {
            self.upgraded_target_count
        } else {
            self.base_target_count
        };
        requested.min(HARD_TARGET_CAP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_classic_rules() {
        let c = DeployConfig::default();
        assert_eq!(c.target_count(false), 4);
        assert_eq!(c.target_count(true), 6);
        assert_eq!(c.sector_display_cap, 8);
        assert_eq!(c.votes_per_deploy, 3);
    }

    #[test]
    fn target_count_never_exceeds_hard_cap() {
        let c = DeployConfig {
            upgraded_target_count: 40,
            base_target_count: 12,
            ..Default::default()
        };
        assert_eq!(c.target_count(true), HARD_TARGET_CAP);
        assert_eq!(c.target_count(false), HARD_TARGET_CAP);
    }

    #[test]
    fn seed_scheme_parses_from_json() {
        let c = DeployConfig::from_json(r#"{ "seed_scheme": "mixed" }"#).unwrap();
        assert_eq!(c.seed_scheme, SeedScheme::Mixed);
    }

    #[test]
    fn rejects_zero_vote_divisor() {
        assert!(matches!(
            DeployConfig::from_json(r#"{ "votes_per_deploy": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            DeployConfig::from_json("{ window_days"),
            Err(ConfigError::Parse(_))
        ));
    }
}
