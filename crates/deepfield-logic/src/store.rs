//! Collaborator interfaces: catalog, interaction history, linkage, upgrades,
//! notifications.
//!
//! The engine never talks to a database directly. Hosts implement these
//! traits: the SpacetimeDB module over its tables, tests and the simtest
//! harness over [`crate::memory::MemoryStore`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{AnomalyId, AutomatonKind, CatalogedAnomaly, UpgradeTag};
use crate::time::Timestamp;

/// Opaque user identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failure talking to an external collaborator. Always retryable from the
/// engine's point of view; never converted into an empty result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{operation} timed out")]
    Timeout { operation: &'static str },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store rejected write: {0}")]
    Rejected(String),
}

/// Read-only anomaly catalog.
pub trait CatalogSource {
    /// All records whose set tag is in `tags`.
    fn fetch_anomalies(&self, tags: &[&str]) -> Result<Vec<CatalogedAnomaly>, StoreError>;
}

/// Community interactions that earn extra deploys.
pub trait InteractionHistory {
    /// Comments by `user` since `since`. With `exclude_self`, comments on the
    /// user's own classifications are not counted.
    fn count_comments(
        &self,
        user: &UserId,
        since: Timestamp,
        exclude_self: bool,
    ) -> Result<u32, StoreError>;

    /// Up-votes cast by `user` since `since`, same self-exclusion rule.
    fn count_upvotes(
        &self,
        user: &UserId,
        since: Timestamp,
        exclude_self: bool,
    ) -> Result<u32, StoreError>;

    /// All-time classifications of `classification_type` by `user`.
    fn count_classifications(
        &self,
        user: &UserId,
        classification_type: &str,
    ) -> Result<u32, StoreError>;

    /// Anomalies `user` has classified as `classification_type`, each once.
    fn classified_anomalies(
        &self,
        user: &UserId,
        classification_type: &str,
    ) -> Result<Vec<AnomalyId>, StoreError>;
}

/// Research unlocks.
pub trait UpgradeFlags {
    fn has_upgrade(&self, user: &UserId, tag: UpgradeTag) -> Result<bool, StoreError>;
}

/// A linkage row to be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLink {
    pub user: UserId,
    pub anomaly_id: AnomalyId,
    pub automaton: AutomatonKind,
    pub at: Timestamp,
    /// Key of the [`DeployClaim`] the writing deploy holds.
    pub action: String,
}

impl NewLink {
    /// Idempotency key: one row per deploy action and anomaly. Retrying the
    /// same action finds its own rows; a new action always writes new ones.
    pub fn key(&self) -> String {
        format!("{}:{}", self.action, self.anomaly_id)
    }
}

/// Result of an idempotent link insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row with the same [`NewLink::key`] already exists; nothing written.
    AlreadyPresent,
}

/// Guard against two deploy actions committing from the same observed state.
///
/// Keyed on the user's all-time linkage count for the automaton as read by
/// the quota check. Linkage rows are append-only, so every committed action
/// moves the count and a later action never sees an earlier one's key. Two
/// actions that read the same count cannot both take the claim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeployClaim {
    pub user: UserId,
    pub automaton: AutomatonKind,
    pub observed_total: u32,
}

impl DeployClaim {
    pub fn key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.user,
            self.automaton.as_str(),
            self.observed_total
        )
    }
}

/// Append-only deployment linkage rows.
pub trait LinkageStore {
    /// Rows for `(user, automaton)` with timestamp at or after `since`.
    fn count_links(
        &self,
        user: &UserId,
        automaton: AutomatonKind,
        since: Timestamp,
    ) -> Result<u32, StoreError>;

    /// Write one row unless an identical key exists.
    fn insert_link(&mut self, link: &NewLink) -> Result<InsertOutcome, StoreError>;

    /// Conditional insert of a claim. `Ok(false)` means another deploy already
    /// holds it.
    fn try_claim(&mut self, claim: &DeployClaim) -> Result<bool, StoreError>;

    /// Drop a claim whose commit wrote nothing, so the same state can retry.
    fn release_claim(&mut self, claim: &DeployClaim) -> Result<(), StoreError>;
}

/// Best-effort user notifications.
pub trait NotificationSink {
    fn notify(&mut self, user: &UserId, title: &str, body: &str) -> Result<(), StoreError>;
}
