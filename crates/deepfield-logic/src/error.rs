//! Deployment error taxonomy.

use thiserror::Error;

use crate::catalog::{AnomalyId, UnknownCategoryTag};
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeployError {
    /// No candidates in any active category. A terminal "no targets" state.
    #[error("no anomalies found in the selected sector")]
    ExhaustedPool,

    /// Weekly quota used up. Recoverable by waiting or earning credit.
    #[error("{message}")]
    QuotaDenied { message: String },

    /// A deploy from the same observed quota state already holds the claim.
    /// Issuing the deploy again reads fresh quota state, so it either lands
    /// under a new claim or is denied by the quota.
    #[error("a deployment from this quota state is already in progress")]
    AlreadyClaimed,

    /// Every linkage insert failed; nothing was written.
    #[error("deployment commit failed: {0}")]
    CommitFailed(#[source] StoreError),

    /// A selection larger than the hard cap reached the commit step.
    #[error("selection of {size} anomalies exceeds the hard cap of {cap}")]
    InvariantViolation { size: usize, cap: usize },

    /// The planet is not on the user's list for a planet-focused deploy.
    #[error("planet {0} is not available for satellite deployment")]
    UnknownPlanet(AnomalyId),

    /// Catalog or history read failed. Retryable.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    UnknownCategory(#[from] UnknownCategoryTag),
}

impl DeployError {
    /// Whether retrying the same action later could succeed without any
    /// change on the user's side.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Store(_) | Self::CommitFailed(_) | Self::AlreadyClaimed
        )
    }
}
