//! Per-user deploy session.
//!
//! ```text
//! TypeSelection ──choose_type──▶ SectorBrowsing ◀─┐ navigate / step / drag
//!                                   │  ▲          │
//!                        select_sector  deselect ─┘
//!                                   ▼  │
//!                               SectorSelected ◀──── fail
//!                                   │                 ▲
//!                              begin_deploy           │
//!                                   ▼                 │
//!                               Deploying ───────────┘
//!                                   │
//!                                complete
//!                                   ▼
//!                               Deployed
//! ```
//!
//! `change_type` returns to `TypeSelection` from any later phase and forgets
//! the resolved sector. Everything else not drawn above is an
//! [`SessionError::InvalidTransition`].

use serde::Serialize;
use thiserror::Error;

use crate::catalog::{CatalogedAnomaly, DeploymentType, UnknownCategoryTag};
use crate::error::DeployError;
use crate::sector::{Direction, ResolvedSector, SectorCoordinate, SectorResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    TypeSelection,
    SectorBrowsing,
    SectorSelected,
    Deploying,
    Deployed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("cannot {action} while in {from:?}")]
    InvalidTransition {
        from: SessionPhase,
        action: &'static str,
    },
    #[error(transparent)]
    UnknownCategory(#[from] UnknownCategoryTag),
}

/// What `begin_deploy` hands to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployTicket {
    pub deployment_type: DeploymentType,
    pub sector: SectorCoordinate,
}

#[derive(Debug, Clone)]
pub struct DeploySession {
    phase: SessionPhase,
    deployment_type: Option<DeploymentType>,
    coordinate: SectorCoordinate,
    sector: Option<ResolvedSector>,
    last_error: Option<String>,
    last_message: Option<String>,
}

impl Default for DeploySession {
    fn default() -> Self {
        Self::new()
    }
}

impl DeploySession {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::TypeSelection,
            deployment_type: None,
            coordinate: SectorCoordinate::default(),
            sector: None,
            last_error: None,
            last_message: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn deployment_type(&self) -> Option<DeploymentType> {
        self.deployment_type
    }

    pub fn coordinate(&self) -> SectorCoordinate {
        self.coordinate
    }

    /// The sector currently on screen, if one has been resolved.
    pub fn sector(&self) -> Option<&ResolvedSector> {
        self.sector.as_ref()
    }

    /// Error from the last failed deploy, cleared on the next attempt.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Success message of the last deploy.
    pub fn last_message(&self) -> Option<&str> {
        self.last_message.as_deref()
    }

    fn require(&self, phase: SessionPhase, action: &'static str) -> Result<(), SessionError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                from: self.phase,
                action,
            })
        }
    }

    /// Pick a mission type and start browsing at the origin sector.
    pub fn choose_type(
        &mut self,
        deployment_type: DeploymentType,
        resolver: &SectorResolver,
        catalog: &[CatalogedAnomaly],
    ) -> Result<&ResolvedSector, SessionError> {
        self.require(SessionPhase::TypeSelection, "choose a mission type")?;
        let origin = SectorCoordinate::default();
        let resolved = resolver.resolve(origin, catalog)?;
        self.deployment_type = Some(deployment_type);
        self.phase = SessionPhase::SectorBrowsing;
        Ok(self.show(origin, resolved))
    }

    /// Jump to any sector.
    pub fn navigate(
        &mut self,
        coord: SectorCoordinate,
        resolver: &SectorResolver,
        catalog: &[CatalogedAnomaly],
    ) -> Result<&ResolvedSector, SessionError> {
        self.require(SessionPhase::SectorBrowsing, "navigate")?;
        let resolved = resolver.resolve(coord, catalog)?;
        Ok(self.show(coord, resolved))
    }

    /// D-pad move to the neighbouring sector.
    pub fn step(
        &mut self,
        dir: Direction,
        resolver: &SectorResolver,
        catalog: &[CatalogedAnomaly],
    ) -> Result<&ResolvedSector, SessionError> {
        let next = self.coordinate.step(dir);
        self.navigate(next, resolver, catalog)
    }

    /// Pointer drag. Below the threshold nothing moves and `Ok(None)` is
    /// returned.
    pub fn drag(
        &mut self,
        dx: f64,
        dy: f64,
        resolver: &SectorResolver,
        catalog: &[CatalogedAnomaly],
    ) -> Result<Option<&ResolvedSector>, SessionError> {
        self.require(SessionPhase::SectorBrowsing, "pan")?;
        match self.coordinate.drag(dx, dy) {
            Some(next) => self.navigate(next, resolver, catalog).map(Some),
            None => Ok(None),
        }
    }

    fn show(&mut self, coord: SectorCoordinate, resolved: ResolvedSector) -> &ResolvedSector {
        self.coordinate = coord;
        self.sector.insert(resolved)
    }

    pub fn select_sector(&mut self) -> Result<SectorCoordinate, SessionError> {
        self.require(SessionPhase::SectorBrowsing, "select a sector")?;
        self.phase = SessionPhase::SectorSelected;
        Ok(self.coordinate)
    }

    /// Back to browsing. Only possible before a deploy has started.
    pub fn deselect(&mut self) -> Result<(), SessionError> {
        self.require(SessionPhase::SectorSelected, "deselect")?;
        self.phase = SessionPhase::SectorBrowsing;
        Ok(())
    }

    pub fn begin_deploy(&mut self) -> Result<DeployTicket, SessionError> {
        self.require(SessionPhase::SectorSelected, "deploy")?;
        let deployment_type = self
            .deployment_type
            .ok_or(SessionError::InvalidTransition {
                from: self.phase,
                action: "deploy without a mission type",
            })?;
        self.phase = SessionPhase::Deploying;
        self.last_error = None;
        Ok(DeployTicket {
            deployment_type,
            sector: self.coordinate,
        })
    }

    pub fn complete(&mut self, message: impl Into<String>) -> Result<(), SessionError> {
        self.require(SessionPhase::Deploying, "complete a deploy")?;
        self.phase = SessionPhase::Deployed;
        self.last_message = Some(message.into());
        Ok(())
    }

    /// A failed deploy returns to the selected sector with the error shown.
    pub fn fail(&mut self, error: &DeployError) -> Result<(), SessionError> {
        self.require(SessionPhase::Deploying, "fail a deploy")?;
        self.phase = SessionPhase::SectorSelected;
        self.last_error = Some(error.to_string());
        Ok(())
    }

    pub fn change_type(&mut self) -> Result<(), SessionError> {
        if self.phase == SessionPhase::TypeSelection {
            return Err(SessionError::InvalidTransition {
                from: self.phase,
                action: "change mission type",
            });
        }
        *self = Self::new();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeployConfig;

    fn setup() -> (SectorResolver, Vec<CatalogedAnomaly>) {
        let resolver = SectorResolver::new(&DeployConfig::default());
        let catalog = (1..=40)
            .map(|id| CatalogedAnomaly::new(id, "telescope-tess"))
            .collect();
        (resolver, catalog)
    }

    #[test]
    fn happy_path() {
        let (r, cat) = setup();
        let mut s = DeploySession::new();
        s.choose_type(DeploymentType::Planetary, &r, &cat).unwrap();
        s.step(Direction::Right, &r, &cat).unwrap();
        assert_eq!(s.coordinate(), SectorCoordinate::new(1, 0));
        assert_eq!(s.select_sector().unwrap(), SectorCoordinate::new(1, 0));

        let ticket = s.begin_deploy().unwrap();
        assert_eq!(ticket.deployment_type, DeploymentType::Planetary);
        assert_eq!(s.phase(), SessionPhase::Deploying);

        s.complete("done").unwrap();
        assert_eq!(s.phase(), SessionPhase::Deployed);
        assert_eq!(s.last_message(), Some("done"));
    }

    #[test]
    fn failure_returns_to_selected_with_message() {
        let (r, cat) = setup();
        let mut s = DeploySession::new();
        s.choose_type(DeploymentType::Stellar, &r, &cat).unwrap();
        s.select_sector().unwrap();
        s.begin_deploy().unwrap();
        s.fail(&DeployError::ExhaustedPool).unwrap();
        assert_eq!(s.phase(), SessionPhase::SectorSelected);
        assert!(s.last_error().unwrap().contains("no anomalies"));

        // Retrying clears the stale error.
        s.begin_deploy().unwrap();
        assert_eq!(s.last_error(), None);
    }

    #[test]
    fn cannot_navigate_once_selected() {
        let (r, cat) = setup();
        let mut s = DeploySession::new();
        s.choose_type(DeploymentType::Weather, &r, &cat).unwrap();
        s.select_sector().unwrap();
        let err = s.step(Direction::Up, &r, &cat).unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransition { .. }));

        s.deselect().unwrap();
        s.step(Direction::Up, &r, &cat).unwrap();
        assert_eq!(s.coordinate(), SectorCoordinate::new(0, -1));
    }

    #[test]
    fn no_deselect_after_deploy_started() {
        let (r, cat) = setup();
        let mut s = DeploySession::new();
        s.choose_type(DeploymentType::Planetary, &r, &cat).unwrap();
        s.select_sector().unwrap();
        s.begin_deploy().unwrap();
        assert!(s.deselect().is_err());
    }

    #[test]
    fn small_drag_does_not_move() {
        let (r, cat) = setup();
        let mut s = DeploySession::new();
        s.choose_type(DeploymentType::Planetary, &r, &cat).unwrap();
        assert!(s.drag(10.0, 10.0, &r, &cat).unwrap().is_none());
        assert!(s.drag(80.0, 0.0, &r, &cat).unwrap().is_some());
        assert_eq!(s.coordinate(), SectorCoordinate::new(-1, 0));
    }

    #[test]
    fn change_type_clears_state() {
        let (r, cat) = setup();
        let mut s = DeploySession::new();
        assert!(s.change_type().is_err());

        s.choose_type(DeploymentType::Planetary, &r, &cat).unwrap();
        s.navigate(SectorCoordinate::new(7, 7), &r, &cat).unwrap();
        s.select_sector().unwrap();
        s.change_type().unwrap();
        assert_eq!(s.phase(), SessionPhase::TypeSelection);
        assert!(s.sector().is_none());
        assert_eq!(s.deployment_type(), None);
        assert_eq!(s.coordinate(), SectorCoordinate::default());
    }

    #[test]
    fn actions_out_of_order_are_rejected() {
        let mut s = DeploySession::new();
        assert!(s.select_sector().is_err());
        assert!(s.begin_deploy().is_err());
        assert!(s.complete("x").is_err());
    }
}
