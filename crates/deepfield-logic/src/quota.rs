//! Weekly deployment quota with earned community credit.
//!
//! Over a rolling window (7 days by default) a user may deploy each automaton
//! once. Commenting on or up-voting other users' classifications earns extra
//! deploys:
//!
//! ```text
//! earned  = floor(votes / 3) + comments
//! total   = linked + earned
//! allowed = linked == 0 || total > linked
//! ```
//!
//! `linked` counts linkage rows (one per anomaly), not deploy actions, and
//! `total > linked` reduces to `earned > 0`. Any earned credit re-opens the
//! automaton for the rest of the window, no matter how many deploys already
//! happened. The tests below pin this.
//!
//! ```
//! use deepfield_logic::catalog::AutomatonKind;
//! use deepfield_logic::config::DeployConfig;
//! use deepfield_logic::quota::{evaluate_counts, QuotaCounts};
//!
//! let config = DeployConfig::default();
//! let counts = QuotaCounts { linked: 1, comments: 1, upvotes: 0 };
//! let decision = evaluate_counts(&counts, &config, AutomatonKind::Telescope);
//! assert!(decision.allowed);
//! assert_eq!(decision.total_allowed_deploys, 2);
//! ```

use serde::{Deserialize, Serialize};

use crate::catalog::AutomatonKind;
use crate::config::DeployConfig;
use crate::store::{InteractionHistory, LinkageStore, StoreError, UserId};
use crate::time::{Timestamp, Window};

/// Deploy actions available to a user who has not deployed this window.
pub const BASE_ALLOWANCE: u32 = 1;

/// Raw counts read from the collaborators for one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaCounts {
    /// Linkage rows for (user, automaton) in the window.
    pub linked: u32,
    /// Comments on other users' classifications in the window.
    pub comments: u32,
    /// Up-votes on other users' classifications in the window.
    pub upvotes: u32,
}

/// Derived quota state for (user, automaton, window).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentQuota {
    pub base_allowance: u32,
    pub earned_allowance: u32,
    pub consumed_count: u32,
    /// All-time linkage rows for (user, automaton) when the check ran. Keys
    /// the deploy claim.
    pub lifetime_linked: u32,
}

/// Outcome of a quota check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub message: Option<String>,
    pub total_allowed_deploys: u32,
    pub quota: DeploymentQuota,
    pub window: Window,
}

/// Which branch of the ledger produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaStanding {
    /// Nothing deployed in the window.
    Fresh,
    /// Already deployed, but earned credit re-opens deployment.
    Earned,
    /// Already deployed and no credit earned.
    Exhausted,
}

impl QuotaDecision {
    pub fn standing(&self) -> QuotaStanding {
        if self.quota.consumed_count == 0 {
            QuotaStanding::Fresh
        } else if self.allowed {
            QuotaStanding::Earned
        } else {
            QuotaStanding::Exhausted
        }
    }
}

/// `floor(upvotes / votes_per_deploy) + comments`.
pub fn earned_allowance(counts: &QuotaCounts, config: &DeployConfig) -> u32 {
    counts.upvotes / config.votes_per_deploy.max(1) + counts.comments
}

/// Decide from already-fetched counts. Window bounds are left at zero and the
/// window count stands in for the lifetime count; use
/// [`QuotaLedger::evaluate`] for a full decision.
pub fn evaluate_counts(
    counts: &QuotaCounts,
    config: &DeployConfig,
    automaton: AutomatonKind,
) -> QuotaDecision {
    let zero = Timestamp::from_micros(0);
    decide(
        counts,
        counts.linked,
        config,
        automaton,
        Window {
            since: zero,
            until: zero,
        },
    )
}

fn decide(
    counts: &QuotaCounts,
    lifetime_linked: u32,
    config: &DeployConfig,
    automaton: AutomatonKind,
    window: Window,
) -> QuotaDecision {
    let earned = earned_allowance(counts, config);
    let total = counts.linked.saturating_add(earned);
    let allowed = counts.linked == 0 || total > counts.linked;

    let message = if counts.linked == 0 {
        None
    } else if allowed {
        Some(
            "You have earned additional deploys by interacting with the community this week!"
                .to_string(),
        )
    } else {
        Some(format!(
            "{automaton} has already been deployed this week. Recalibrate & search again next week."
        ))
    };

    QuotaDecision {
        allowed,
        message,
        total_allowed_deploys: total,
        quota: DeploymentQuota {
            base_allowance: BASE_ALLOWANCE,
            earned_allowance: earned,
            consumed_count: counts.linked,
            lifetime_linked,
        },
        window,
    }
}

/// Reads counts from the collaborators and applies the quota rule.
#[derive(Debug, Clone)]
pub struct QuotaLedger<'c> {
    config: &'c DeployConfig,
}

impl<'c> QuotaLedger<'c> {
    pub fn new(config: &'c DeployConfig) -> Self {
        Self { config }
    }

    /// Fetch the window's counts. Fails on the first collaborator error.
    pub fn counts<L, H>(
        &self,
        user: &UserId,
        automaton: AutomatonKind,
        window: Window,
        linkage: &L,
        history: &H,
    ) -> Result<QuotaCounts, StoreError>
    where
        L: LinkageStore + ?Sized,
        H: InteractionHistory + ?Sized,
    {
        Ok(QuotaCounts {
            linked: linkage.count_links(user, automaton, window.since)?,
            comments: history.count_comments(user, window.since, true)?,
            upvotes: history.count_upvotes(user, window.since, true)?,
        })
    }

    pub fn evaluate<L, H>(
        &self,
        user: &UserId,
        automaton: AutomatonKind,
        now: Timestamp,
        linkage: &L,
        history: &H,
    ) -> Result<QuotaDecision, StoreError>
    where
        L: LinkageStore + ?Sized,
        H: InteractionHistory + ?Sized,
    {
        let window = Window::trailing(now, self.config.window_days);
        let counts = self.counts(user, automaton, window, linkage, history)?;
        let lifetime = linkage.count_links(user, automaton, Timestamp::MIN)?;
        let decision = decide(&counts, lifetime, self.config, automaton, window);
        log::info!(
            "quota {user} {}: linked={} comments={} upvotes={} earned={} total={} allowed={}",
            automaton.as_str(),
            counts.linked,
            counts.comments,
            counts.upvotes,
            decision.quota.earned_allowance,
            decision.total_allowed_deploys,
            decision.allowed
        );
        Ok(decision)
    }
}
