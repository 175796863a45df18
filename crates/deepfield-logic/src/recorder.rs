//! Deployment recorder: the only writer of linkage rows.
//!
//! A commit:
//! 1. refuses denied quotas, empty selections, and selections over the hard cap;
//! 2. takes the deploy claim for the quota state it was checked against;
//! 3. writes one linkage row per anomaly, keyed by the claim so only a retry
//!    of the same action can find a row already present.
//!
//! Some rows failing is reported as a partial commit ([`CommitReport::missing`]),
//! which [`DeploymentRecorder::retry_missing`] can complete. All rows failing
//! is an error.

use serde::{Deserialize, Serialize};

use crate::catalog::{AnomalyId, AutomatonKind, CatalogedAnomaly};
use crate::config::HARD_TARGET_CAP;
use crate::error::DeployError;
use crate::quota::QuotaDecision;
use crate::store::{DeployClaim, InsertOutcome, LinkageStore, NewLink, StoreError, UserId};
use crate::time::Timestamp;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReport {
    pub user: UserId,
    pub automaton: AutomatonKind,
    pub at: Timestamp,
    /// Claim key of the action that wrote these rows.
    pub action: String,
    /// Anomalies this action linked to the user.
    pub linked: Vec<AnomalyId>,
    /// Anomalies whose insert failed.
    pub missing: Vec<AnomalyId>,
}

impl CommitReport {
    /// Degraded success: some rows are missing.
    pub fn is_partial(&self) -> bool {
        !self.missing.is_empty()
    }
}

/// Dedup by id keeping first occurrence.
fn unique_ids(selection: &[CatalogedAnomaly]) -> Vec<AnomalyId> {
    let mut ids: Vec<AnomalyId> = Vec::with_capacity(selection.len());
    for a in selection {
        if !ids.contains(&a.id) {
            ids.push(a.id);
        }
    }
    ids
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeploymentRecorder;

impl DeploymentRecorder {
    pub fn new() -> Self {
        Self
    }

    pub fn commit<L: LinkageStore + ?Sized>(
        &self,
        user: &UserId,
        selection: &[CatalogedAnomaly],
        automaton: AutomatonKind,
        decision: &QuotaDecision,
        now: Timestamp,
        store: &mut L,
    ) -> Result<CommitReport, DeployError> {
        if !decision.allowed {
            return Err(DeployError::QuotaDenied {
                message: decision
                    .message
                    .clone()
                    .unwrap_or_else(|| "deployment quota exhausted".to_string()),
            });
        }
        if selection.is_empty() {
            return Err(DeployError::ExhaustedPool);
        }
        let ids = unique_ids(selection);
        if ids.len() > HARD_TARGET_CAP {
            log::error!(
                "refusing to commit {} anomalies for {user}: over hard cap",
                ids.len()
            );
            return Err(DeployError::InvariantViolation {
                size: ids.len(),
                cap: HARD_TARGET_CAP,
            });
        }

        let claim = DeployClaim {
            user: user.clone(),
            automaton,
            observed_total: decision.quota.lifetime_linked,
        };
        if !store.try_claim(&claim)? {
            log::warn!("deploy claim {} already taken", claim.key());
            return Err(DeployError::AlreadyClaimed);
        }

        let action = claim.key();
        let report = match self.write_links(user, &ids, automaton, now, &action, store) {
            Ok(r) => r,
            Err(e) => {
                if let Err(release) = store.release_claim(&claim) {
                    log::warn!("could not release claim {}: {}", claim.key(), release);
                }
                return Err(e);
            }
        };
        if report.is_partial() {
            log::warn!(
                "partial deployment for {user} {}: linked {:?}, missing {:?}",
                automaton.as_str(),
                report.linked,
                report.missing
            );
        } else {
            log::info!(
                "deployed {} {} targets for {user}",
                report.linked.len(),
                automaton.as_str()
            );
        }
        Ok(report)
    }

    /// Re-insert the ids a partial commit missed. Rows that made it in the
    /// meantime come back as already present, so this is safe to repeat.
    pub fn retry_missing<L: LinkageStore + ?Sized>(
        &self,
        report: &CommitReport,
        store: &mut L,
    ) -> Result<CommitReport, DeployError> {
        if !report.is_partial() {
            return Ok(report.clone());
        }
        let retried = self.write_links(
            &report.user,
            &report.missing,
            report.automaton,
            report.at,
            &report.action,
            store,
        )?;
        let mut linked = report.linked.clone();
        linked.extend(retried.linked);
        Ok(CommitReport {
            linked,
            missing: retried.missing,
            ..report.clone()
        })
    }

    fn write_links<L: LinkageStore + ?Sized>(
        &self,
        user: &UserId,
        ids: &[AnomalyId],
        automaton: AutomatonKind,
        at: Timestamp,
        action: &str,
        store: &mut L,
    ) -> Result<CommitReport, DeployError> {
        let mut linked = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        let mut last_error: Option<StoreError> = None;

        for &anomaly_id in ids {
            let link = NewLink {
                user: user.clone(),
                anomaly_id,
                automaton,
                at,
                action: action.to_string(),
            };
            match store.insert_link(&link) {
                Ok(InsertOutcome::Inserted) => linked.push(anomaly_id),
                Ok(InsertOutcome::AlreadyPresent) => {
                    log::debug!("link {} already present", link.key());
                    linked.push(anomaly_id);
                }
                Err(e) => {
                    missing.push(anomaly_id);
                    last_error = Some(e);
                }
            }
        }

        if linked.is_empty() {
            if let Some(e) = last_error {
                return Err(DeployError::CommitFailed(e));
            }
        }
        Ok(CommitReport {
            user: user.clone(),
            automaton,
            at,
            action: action.to_string(),
            linked,
            missing,
        })
    }
}
