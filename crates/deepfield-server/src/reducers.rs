//! Client-facing reducers for the catalog, community activity, and deploys.
//!
//! `deploy` and `deploy_satellite` return `Err` for every failure, including a
//! partial commit, so the host rolls the whole transaction back: no partial
//! linkage set and no stale claim survives. Configuration and catalog
//! reducers are admin only.

use deepfield_logic::catalog::{AnomalyCategory, DeploymentType};
use deepfield_logic::config::DeployConfig;
use deepfield_logic::pipeline::{DeployEngine, DeployOutcome, DeployRequest, SatelliteRequest};
use deepfield_logic::satellite::InvestigationMode;
use deepfield_logic::sector::SectorCoordinate;
use spacetimedb::{reducer, Identity, ReducerContext, Table};

use crate::store::{to_logic_time, user_id, TableStore};
use crate::tables::*;

// ============================================================================
// SETUP
// ============================================================================

#[reducer(init)]
pub fn init(ctx: &ReducerContext) {
    if ctx.db.admin().identity().find(ctx.sender).is_none() {
        ctx.db.admin().insert(Admin {
            identity: ctx.sender,
        });
        log::info!("Admin {} registered", ctx.sender);
    }
    if ctx.db.deploy_config().id().find(0).is_some() {
        return;
    }
    match serde_json::to_string(&DeployConfig::default()) {
        Ok(json) => {
            ctx.db.deploy_config().insert(DeployConfigRow { id: 0, json });
            log::info!("Deploy config initialized with defaults");
        }
        Err(e) => log::warn!("Could not serialize default deploy config: {}", e),
    }
}

/// Admin-only guard shared by the configuration and catalog reducers.
fn check_admin(sender: Identity, admins: impl IntoIterator<Item = Identity>) -> Result<(), String> {
    if admins.into_iter().any(|a| a == sender) {
        Ok(())
    } else {
        Err(format!("{} is not an admin", sender))
    }
}

fn require_admin(ctx: &ReducerContext) -> Result<(), String> {
    check_admin(ctx.sender, ctx.db.admin().iter().map(|a| a.identity))
}

/// Let another identity administer the module. Admin only.
#[reducer]
pub fn grant_admin(ctx: &ReducerContext, identity: Identity) -> Result<(), String> {
    require_admin(ctx)?;
    if ctx.db.admin().identity().find(identity).is_none() {
        ctx.db.admin().insert(Admin { identity });
        log::info!("{} granted admin to {}", ctx.sender, identity);
    }
    Ok(())
}

/// Replace the deploy configuration. Admin only; rejected if it does not
/// validate.
#[reducer]
pub fn set_deploy_config(ctx: &ReducerContext, json: String) -> Result<(), String> {
    require_admin(ctx)?;
    DeployConfig::from_json(&json).map_err(|e| e.to_string())?;
    if ctx.db.deploy_config().id().find(0).is_some() {
        ctx.db.deploy_config().id().update(DeployConfigRow { id: 0, json });
    } else {
        ctx.db.deploy_config().insert(DeployConfigRow { id: 0, json });
    }
    log::info!("Deploy config updated by {}", ctx.sender);
    Ok(())
}

fn load_config(ctx: &ReducerContext) -> Result<DeployConfig, String> {
    match ctx.db.deploy_config().id().find(0) {
        Some(row) => DeployConfig::from_json(&row.json).map_err(|e| e.to_string()),
        None => Ok(DeployConfig::default()),
    }
}

// ============================================================================
// CATALOG
// ============================================================================

/// Add a catalog entry. Admin only.
#[reducer]
pub fn add_anomaly(
    ctx: &ReducerContext,
    id: u64,
    anomaly_set: String,
    parent_anomaly: Option<u64>,
    content: Option<String>,
    configuration: String,
) -> Result<(), String> {
    require_admin(ctx)?;
    AnomalyCategory::from_tag(&anomaly_set).map_err(|e| e.to_string())?;
    if ctx.db.anomaly().id().find(id).is_some() {
        return Err(format!("anomaly {} already exists", id));
    }
    if let Some(parent) = parent_anomaly {
        if ctx.db.anomaly().id().find(parent).is_none() {
            return Err(format!("parent anomaly {} not found", parent));
        }
    }
    ctx.db.anomaly().insert(Anomaly {
        id,
        anomaly_set,
        parent_anomaly,
        content,
        configuration,
    });
    Ok(())
}

// ============================================================================
// COMMUNITY
// ============================================================================

#[reducer]
pub fn classify(
    ctx: &ReducerContext,
    classification_type: String,
    anomaly: Option<u64>,
) -> Result<(), String> {
    if let Some(id) = anomaly {
        if ctx.db.anomaly().id().find(id).is_none() {
            return Err(format!("anomaly {} not found", id));
        }
    }
    let row = ctx.db.classification().insert(Classification {
        id: 0,
        author: ctx.sender,
        classification_type,
        anomaly,
        created_at: ctx.timestamp,
    });
    log::info!("Classification {} by {}", row.id, ctx.sender);
    Ok(())
}

#[reducer]
pub fn post_comment(ctx: &ReducerContext, classification_id: u64, body: String) -> Result<(), String> {
    if ctx.db.classification().id().find(classification_id).is_none() {
        return Err(format!("classification {} not found", classification_id));
    }
    ctx.db.comment().insert(Comment {
        id: 0,
        author: ctx.sender,
        classification_id,
        body,
        created_at: ctx.timestamp,
    });
    Ok(())
}

#[reducer]
pub fn cast_vote(ctx: &ReducerContext, classification_id: u64, upvote: bool) -> Result<(), String> {
    if ctx.db.classification().id().find(classification_id).is_none() {
        return Err(format!("classification {} not found", classification_id));
    }
    ctx.db.vote().insert(Vote {
        id: 0,
        voter: ctx.sender,
        classification_id,
        upvote,
        created_at: ctx.timestamp,
    });
    Ok(())
}

#[reducer]
pub fn complete_research(ctx: &ReducerContext, tech_type: String) {
    let already = ctx
        .db
        .researched()
        .iter()
        .any(|r| r.user == ctx.sender && r.tech_type == tech_type);
    if already {
        log::warn!("{} already researched {}", ctx.sender, tech_type);
        return;
    }
    ctx.db.researched().insert(Researched {
        id: 0,
        user: ctx.sender,
        tech_type,
    });
}

// ============================================================================
// DEPLOYMENT
// ============================================================================

/// Deploy the automaton for `deployment_type` into sector `(x, y)`.
#[reducer]
pub fn deploy(ctx: &ReducerContext, deployment_type: String, x: i64, y: i64) -> Result<(), String> {
    let Some(kind) = DeploymentType::parse(&deployment_type) else {
        return Err(format!("unknown deployment type {:?}", deployment_type));
    };
    let config = load_config(ctx)?;
    let mut engine = DeployEngine::new(config);
    let mut store = TableStore::new(ctx);
    let user = user_id(ctx.sender);
    let sector = SectorCoordinate::new(x, y);

    let outcome = engine
        .deploy(
            DeployRequest {
                user: &user,
                deployment_type: kind,
                sector,
                now: to_logic_time(ctx.timestamp),
            },
            &mut store,
        )
        .map_err(|e| {
            log::warn!("Deploy by {} failed: {}", ctx.sender, e);
            e.to_string()
        })?;

    record_deployment(ctx, &mut engine, &mut store, &outcome, (x, y), None)
}

/// Park a weather satellite over `planet_id`. `mode` is `"weather"` (link the
/// planet's clouds) or `"planets"` (link the planet itself).
#[reducer]
pub fn deploy_satellite(ctx: &ReducerContext, planet_id: u64, mode: String) -> Result<(), String> {
    let Some(investigation) = InvestigationMode::parse(&mode) else {
        return Err(format!("unknown investigation mode {:?}", mode));
    };
    let config = load_config(ctx)?;
    let mut engine = DeployEngine::new(config);
    let mut store = TableStore::new(ctx);
    let user = user_id(ctx.sender);

    let outcome = engine
        .deploy_satellite(
            SatelliteRequest {
                user: &user,
                planet: planet_id,
                mode: investigation,
                now: to_logic_time(ctx.timestamp),
            },
            &mut store,
        )
        .map_err(|e| {
            log::warn!("Satellite deploy by {} failed: {}", ctx.sender, e);
            e.to_string()
        })?;

    record_deployment(ctx, &mut engine, &mut store, &outcome, (0, 0), Some(planet_id))
}

/// Roll back partial commits; otherwise store the summary row and send the
/// queued notifications.
fn record_deployment(
    ctx: &ReducerContext,
    engine: &mut DeployEngine,
    store: &mut TableStore<'_>,
    outcome: &DeployOutcome,
    (sector_x, sector_y): (i64, i64),
    planet_id: Option<u64>,
) -> Result<(), String> {
    if outcome.report.is_partial() {
        log::warn!(
            "Rolling back partial deploy by {}: missing {:?}",
            ctx.sender,
            outcome.report.missing
        );
        return Err(format!(
            "deployment incomplete, {} targets could not be linked",
            outcome.report.missing.len()
        ));
    }

    let targets = serde_json::to_string(&outcome.targets).map_err(|e| e.to_string())?;
    ctx.db.deployment().insert(Deployment {
        id: 0,
        user: ctx.sender,
        deployment_type: outcome.deployment_type.as_str().to_string(),
        sector_x,
        sector_y,
        planet_id,
        sector_name: outcome.sector_name.clone(),
        targets,
        message: outcome.message.clone(),
        created_at: ctx.timestamp,
    });

    let summary = engine.dispatch_notifications(store);
    log::info!(
        "{} ({} notification(s) sent, {} dropped)",
        outcome.message,
        summary.delivered,
        summary.dropped
    );
    Ok(())
}

/// Mark one of the caller's notifications as read.
#[reducer]
pub fn acknowledge_notification(ctx: &ReducerContext, id: u64) -> Result<(), String> {
    let Some(mut n) = ctx.db.notification().id().find(id) else {
        return Err(format!("notification {} not found", id));
    };
    if n.user != ctx.sender {
        return Err("not your notification".to_string());
    }
    n.acknowledged = true;
    ctx.db.notification().id().update(n);
    Ok(())
}
