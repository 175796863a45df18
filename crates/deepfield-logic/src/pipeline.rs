//! The deploy action end to end.
//!
//! One call to [`DeployEngine::deploy`] runs, in order:
//! unlocks → catalog fetch → quota → pools → allocation → commit → outbox.
//! The quota is read once at the start; the commit's claim guards against a
//! second action that read the same state. Notification delivery is a
//! separate [`DeployEngine::dispatch_notifications`] step.
//!
//! [`DeployEngine::deploy_satellite`] is the planet-focused variant for
//! weather satellites: same quota, commit, and outbox, but targets come from
//! the focused planet instead of a sector.

use serde::Serialize;

use crate::allocation::Allocator;
use crate::catalog::{
    partition_pools, AnomalyCategory, AnomalyId, AutomatonKind, CatalogedAnomaly, DeploymentType,
    Unlocks, UpgradeTag, ACTIVE_ASTEROID_UNLOCK_CLASSIFICATIONS,
};
use crate::config::{DeployConfig, HARD_TARGET_CAP};
use crate::error::DeployError;
use crate::outbox::{DispatchSummary, NotificationOutbox, PendingNotification};
use crate::quota::{QuotaDecision, QuotaLedger};
use crate::recorder::{CommitReport, DeploymentRecorder};
use crate::satellite::{
    clouds_for, satellite_targets, InvestigationMode, PlanetFocus, PLANET_CLASSIFICATION,
};
use crate::sector::{ResolvedSector, SectorCoordinate, SectorResolver};
use crate::store::{
    CatalogSource, InteractionHistory, LinkageStore, NotificationSink, StoreError, UpgradeFlags,
    UserId,
};
use crate::time::Timestamp;

/// Classification type whose count unlocks active asteroids.
const MINOR_PLANET_CLASSIFICATION: &str = "telescope-minorPlanet";

/// Everything a deploy reads from and writes to.
pub trait DeployBackend: CatalogSource + InteractionHistory + UpgradeFlags + LinkageStore {}

impl<T: ?Sized> DeployBackend for T where
    T: CatalogSource + InteractionHistory + UpgradeFlags + LinkageStore
{
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployRequest<'a> {
    pub user: &'a UserId,
    pub deployment_type: DeploymentType,
    pub sector: SectorCoordinate,
    pub now: Timestamp,
}

/// A weather satellite parked over one planet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SatelliteRequest<'a> {
    pub user: &'a UserId,
    pub planet: AnomalyId,
    pub mode: InvestigationMode,
    pub now: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployOutcome {
    pub report: CommitReport,
    pub deployment_type: DeploymentType,
    pub sector_name: String,
    /// Display labels of the linked targets.
    pub targets: Vec<String>,
    pub message: String,
}

#[derive(Debug)]
pub struct DeployEngine {
    config: DeployConfig,
    resolver: SectorResolver,
    recorder: DeploymentRecorder,
    outbox: NotificationOutbox,
}

impl DeployEngine {
    pub fn new(config: DeployConfig) -> Self {
        let resolver = SectorResolver::new(&config);
        Self {
            config,
            resolver,
            recorder: DeploymentRecorder::new(),
            outbox: NotificationOutbox::new(),
        }
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    pub fn resolver(&self) -> &SectorResolver {
        &self.resolver
    }

    pub fn outbox(&self) -> &NotificationOutbox {
        &self.outbox
    }

    pub fn unlocks<B: DeployBackend + ?Sized>(
        &self,
        user: &UserId,
        backend: &B,
    ) -> Result<Unlocks, StoreError> {
        Ok(Unlocks {
            active_asteroids: backend.count_classifications(user, MINOR_PLANET_CLASSIFICATION)?
                >= ACTIVE_ASTEROID_UNLOCK_CLASSIFICATIONS,
            ngts: backend.has_upgrade(user, UpgradeTag::NgtsAccess)?,
            probe_receptors: backend.has_upgrade(user, UpgradeTag::ProbeReceptors)?,
        })
    }

    /// Resolve a sector against the catalog slice this user can deploy to.
    pub fn browse<B: DeployBackend + ?Sized>(
        &self,
        user: &UserId,
        deployment_type: DeploymentType,
        coord: SectorCoordinate,
        backend: &B,
    ) -> Result<ResolvedSector, DeployError> {
        let unlocks = self.unlocks(user, backend)?;
        let catalog = backend.fetch_anomalies(&deployment_type.tags_to_fetch(&unlocks))?;
        Ok(self.resolver.resolve(coord, &catalog)?)
    }

    pub fn quota<B: DeployBackend + ?Sized>(
        &self,
        user: &UserId,
        deployment_type: DeploymentType,
        now: Timestamp,
        backend: &B,
    ) -> Result<QuotaDecision, StoreError> {
        QuotaLedger::new(&self.config).evaluate(
            user,
            deployment_type.automaton(),
            now,
            backend,
            backend,
        )
    }

    pub fn deploy<B: DeployBackend + ?Sized>(
        &mut self,
        request: DeployRequest<'_>,
        backend: &mut B,
    ) -> Result<DeployOutcome, DeployError> {
        let DeployRequest {
            user,
            deployment_type,
            sector,
            now,
        } = request;
        let automaton = deployment_type.automaton();

        let unlocks = self.unlocks(user, &*backend)?;
        let catalog = backend.fetch_anomalies(&deployment_type.tags_to_fetch(&unlocks))?;

        let decision = self.quota(user, deployment_type, now, &*backend)?;
        if !decision.allowed {
            return Err(DeployError::QuotaDenied {
                message: decision.message.clone().unwrap_or_default(),
            });
        }

        let pools = partition_pools(deployment_type, &unlocks, &catalog)?;
        let seed = self.resolver.seed(sector);
        let selection = Allocator::new(&self.config).allocate(&pools, unlocks.probe_receptors, seed);
        if selection.len() > HARD_TARGET_CAP {
            return Err(DeployError::InvariantViolation {
                size: selection.len(),
                cap: HARD_TARGET_CAP,
            });
        }
        log::debug!(
            "{user} {}: allocated {} of {} catalog entries across {} pools",
            deployment_type.as_str(),
            selection.len(),
            catalog.len(),
            pools.len()
        );

        let report = self
            .recorder
            .commit(user, &selection, automaton, &decision, now, backend)?;

        let sector_name = self.resolver.name(sector);
        let targets = selection
            .iter()
            .filter(|a| report.linked.contains(&a.id))
            .map(|a| a.label(deployment_type))
            .collect();
        Ok(self.finish(
            report,
            deployment_type,
            sector_name,
            targets,
            deployment_type.target_noun(),
            deployment_type.as_str(),
        ))
    }

    /// Planets a weather satellite can be parked over: the user's classified
    /// planets, or every catalogued planet if they have none.
    pub fn planet_focus<B: DeployBackend + ?Sized>(
        &self,
        user: &UserId,
        backend: &B,
    ) -> Result<PlanetFocus, DeployError> {
        let tags: Vec<&str> = AnomalyCategory::Planet.tags().collect();
        let planets = backend.fetch_anomalies(&tags)?;
        let classified = backend.classified_anomalies(user, PLANET_CLASSIFICATION)?;
        Ok(PlanetFocus::new(planets, &classified))
    }

    /// Clouds catalogued on `planet`, as shown while it is in focus.
    pub fn planet_clouds<B: DeployBackend + ?Sized>(
        &self,
        planet: AnomalyId,
        backend: &B,
    ) -> Result<Vec<CatalogedAnomaly>, DeployError> {
        let catalog =
            backend.fetch_anomalies(&DeploymentType::Weather.tags_to_fetch(&Unlocks::default()))?;
        Ok(clouds_for(planet, &catalog))
    }

    pub fn deploy_satellite<B: DeployBackend + ?Sized>(
        &mut self,
        request: SatelliteRequest<'_>,
        backend: &mut B,
    ) -> Result<DeployOutcome, DeployError> {
        let SatelliteRequest {
            user,
            planet: planet_id,
            mode,
            now,
        } = request;

        let unlocks = self.unlocks(user, &*backend)?;
        let focus = self.planet_focus(user, &*backend)?;
        let Some(planet) = focus.planets().iter().find(|p| p.id == planet_id).cloned() else {
            return Err(DeployError::UnknownPlanet(planet_id));
        };

        let decision = self.quota(user, DeploymentType::Weather, now, &*backend)?;
        if !decision.allowed {
            return Err(DeployError::QuotaDenied {
                message: decision.message.clone().unwrap_or_default(),
            });
        }

        let clouds = self.planet_clouds(planet.id, &*backend)?;
        let target = self.config.target_count(unlocks.probe_receptors);
        let selection = satellite_targets(mode, &planet, &clouds, target);
        log::debug!(
            "{user} satellite over {}: {} mode, {} of {} clouds",
            planet.id,
            mode.as_str(),
            selection.len(),
            clouds.len()
        );

        let report = self.recorder.commit(
            user,
            &selection,
            AutomatonKind::WeatherSatellite,
            &decision,
            now,
            backend,
        )?;

        let targets = selection
            .iter()
            .filter(|a| report.linked.contains(&a.id))
            .map(|a| {
                if a.id == planet.id {
                    a.label(DeploymentType::Planetary)
                } else {
                    a.label(DeploymentType::Weather)
                }
            })
            .collect();
        Ok(self.finish(
            report,
            DeploymentType::Weather,
            planet.label(DeploymentType::Planetary),
            targets,
            mode.target_noun(),
            mode.as_str(),
        ))
    }

    /// Queue the success notification and build the outcome.
    fn finish(
        &mut self,
        report: CommitReport,
        deployment_type: DeploymentType,
        sector_name: String,
        targets: Vec<String>,
        noun: &str,
        kind: &str,
    ) -> DeployOutcome {
        let automaton = report.automaton;
        let count = report.linked.len();
        self.outbox.enqueue(PendingNotification {
            user: report.user.clone(),
            title: format!("{} Deployed Successfully", title_case(&automaton.to_string())),
            body: format!("{count} {noun} discovered in {sector_name}"),
        });

        DeployOutcome {
            message: format!("{automaton} deployed! {count} {kind} targets are now active."),
            report,
            deployment_type,
            sector_name,
            targets,
        }
    }

    /// Finish a partial deploy. Nothing is re-allocated.
    pub fn retry<L: LinkageStore + ?Sized>(
        &self,
        report: &CommitReport,
        store: &mut L,
    ) -> Result<CommitReport, DeployError> {
        self.recorder.retry_missing(report, store)
    }

    pub fn dispatch_notifications<S: NotificationSink + ?Sized>(
        &mut self,
        sink: &mut S,
    ) -> DispatchSummary {
        self.outbox.dispatch(sink)
    }
}

/// `"Weather satellite"` → `"Weather Satellite"`.
fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
