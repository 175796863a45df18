//! SpacetimeDB table definitions for deployments.
//!
//! The catalog and interaction tables mirror what the logic crate reads
//! through its collaborator traits; linkage, claims, and notifications are
//! what a deploy writes.

use spacetimedb::{table, Identity, Timestamp};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Identities allowed to change configuration and the catalog. The module
/// publisher is added by `init`.
#[table(name = admin)]
pub struct Admin {
    #[primary_key]
    pub identity: Identity,
}

/// Deploy configuration singleton (id always 0), stored as JSON
#[table(name = deploy_config, public)]
#[derive(Clone)]
pub struct DeployConfigRow {
    #[primary_key]
    pub id: u32,
    pub json: String,
}

// ============================================================================
// CATALOG
// ============================================================================

/// Externally catalogued anomaly. Read-only to deploys.
#[table(name = anomaly, public)]
#[derive(Clone)]
pub struct Anomaly {
    #[primary_key]
    pub id: u64,
    #[index(btree)]
    pub anomaly_set: String,
    /// Planet a cloud record belongs to
    pub parent_anomaly: Option<u64>,
    pub content: Option<String>,
    /// Raw configuration blob as JSON text
    pub configuration: String,
}

// ============================================================================
// COMMUNITY
// ============================================================================

#[table(name = classification, public)]
pub struct Classification {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub author: Identity,
    pub classification_type: String,
    /// Classified anomaly, if the classification is about one
    pub anomaly: Option<u64>,
    pub created_at: Timestamp,
}

#[table(name = comment, public)]
pub struct Comment {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub author: Identity,
    pub classification_id: u64,
    pub body: String,
    pub created_at: Timestamp,
}

#[table(name = vote, public)]
pub struct Vote {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub voter: Identity,
    pub classification_id: u64,
    pub upvote: bool,
    pub created_at: Timestamp,
}

/// Completed research (`"probereceptors"`, `"ngtsAccess"`, ...)
#[table(name = researched, public)]
pub struct Researched {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub user: Identity,
    pub tech_type: String,
}

// ============================================================================
// DEPLOYMENTS
// ============================================================================

/// One anomaly linked to a user by a deployment.
#[table(name = linked_anomaly, public)]
pub struct LinkedAnomaly {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    /// deploy claim key plus anomaly id, makes retries idempotent
    #[unique]
    pub link_key: String,
    pub author: Identity,
    pub anomaly_id: u64,
    pub automaton: String,
    pub date: Timestamp,
}

/// Held by the deploy that committed from a given observed quota state.
#[table(name = deploy_claim)]
pub struct DeployClaimRow {
    #[primary_key]
    pub claim_key: String,
    pub user: Identity,
    pub created_at: Timestamp,
}

/// Summary of a finished deployment, for the client's result screen.
#[table(name = deployment, public)]
pub struct Deployment {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub user: Identity,
    pub deployment_type: String,
    pub sector_x: i64,
    pub sector_y: i64,
    /// Focused planet of a planet-focused satellite deploy
    pub planet_id: Option<u64>,
    pub sector_name: String,
    /// JSON array of target labels
    pub targets: String,
    pub message: String,
    pub created_at: Timestamp,
}

#[table(name = notification, public)]
pub struct Notification {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub user: Identity,
    pub title: String,
    pub body: String,
    pub created_at: Timestamp,
    pub acknowledged: bool,
}
