//! Civic: governance engine for decentralized organizations
//!
//! The [`Dao`] facade wires the components together from a
//! [`CivicConfig`]: one event log and one snapshot clock shared by the
//! influence engine, the controller and the proposal engine.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

pub use civic_common::{Address, Context, ErrorKind, Event, EventLog, ParamsHash, ProposalId, ProposalState};
pub use civic_config::{AddressConfig, CivicConfig, ConfigError};
pub use civic_controller::{Avatar, CallOutcome, Controller, ControllerError, ReputationToken};
pub use civic_governance::{GovernanceError, ProposalEngine, Relay};
pub use civic_influence::{InfluenceEngine, InfluenceError, VotingPowerHook};
pub use civic_snapshot::{SnapshotClock, SnapshotError, SnapshotId};

/// Errors surfaced by the facade
#[derive(Error, Debug)]
pub enum DaoError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Influence(#[from] InfluenceError),

    #[error(transparent)]
    Controller(#[from] ControllerError),

    #[error(transparent)]
    Governance(#[from] GovernanceError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DaoError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            DaoError::Config(e) => e.kind(),
            DaoError::Influence(e) => e.kind(),
            DaoError::Controller(e) => e.kind(),
            DaoError::Governance(e) => e.kind(),
            DaoError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for facade operations
pub type Result<T> = std::result::Result<T, DaoError>;

/// External systems a [`Dao`] talks to
pub struct Collaborators {
    pub avatar: Arc<dyn Avatar>,
    pub reputation: Arc<dyn ReputationToken>,
    pub relay: Arc<dyn Relay>,
    pub voting_power_hook: Option<Arc<dyn VotingPowerHook>>,
}

/// A fully wired organization
pub struct Dao {
    config: CivicConfig,
    events: EventLog,
    clock: SnapshotClock,
    influence: Arc<RwLock<InfluenceEngine>>,
    controller: Arc<Controller>,
    proposals: ProposalEngine,
}

impl Dao {
    /// Build every component from `config`
    pub fn new(config: CivicConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let events = EventLog::new();
        let clock = SnapshotClock::new();

        let mut influence = InfluenceEngine::new(config.addresses.influence_owner, &config.influence, clock.clone())?;
        if let Some(hook) = collaborators.voting_power_hook {
            influence = influence.with_voting_power(hook);
        }
        let influence = Arc::new(RwLock::new(influence));

        let controller = Arc::new(Controller::new(
            config.addresses.initial_scheme,
            ParamsHash::default(),
            collaborators.avatar,
            collaborators.reputation,
            events.clone(),
        ));

        let proposals = ProposalEngine::new(
            config.proposals.clone(),
            config.addresses.governance,
            influence.clone(),
            collaborators.relay,
            controller.clone(),
            events.clone(),
        )?;

        info!(
            initial_scheme = %config.addresses.initial_scheme,
            scheme = %config.addresses.governance.scheme,
            "DAO assembled"
        );
        Ok(Self {
            config,
            events,
            clock,
            influence,
            controller,
            proposals,
        })
    }

    pub fn config(&self) -> &CivicConfig {
        &self.config
    }

    /// Ordered audit log shared by every component
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn clock(&self) -> &SnapshotClock {
        &self.clock
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn proposals(&self) -> &ProposalEngine {
        &self.proposals
    }

    /// Read access to the influence engine
    pub fn influence(&self) -> Result<RwLockReadGuard<'_, InfluenceEngine>> {
        self.influence
            .read()
            .map_err(|_| DaoError::Internal("Failed to acquire read lock on influence".to_string()))
    }

    /// Write access to the influence engine
    pub fn influence_mut(&self) -> Result<RwLockWriteGuard<'_, InfluenceEngine>> {
        self.influence
            .write()
            .map_err(|_| DaoError::Internal("Failed to acquire write lock on influence".to_string()))
    }

    /// Stake `amount` for `account`
    pub fn mint(&self, ctx: &Context, account: Address, amount: Decimal, time_commitment: u64) -> Result<SnapshotId> {
        Ok(self.influence_mut()?.mint(ctx, account, amount, time_commitment)?)
    }

    /// Remove a stake of `amount` from `account`
    pub fn burn(&self, ctx: &Context, account: Address, amount: Decimal, time_commitment: u64) -> Result<SnapshotId> {
        Ok(self.influence_mut()?.burn(ctx, account, amount, time_commitment)?)
    }

    /// Current influence of `account`
    pub fn balance_of(&self, account: &Address) -> Result<Decimal> {
        Ok(self.influence()?.balance_of(account)?)
    }

    /// Influence of `account` at snapshot `id`
    pub fn balance_of_at(&self, account: &Address, id: SnapshotId) -> Result<Decimal> {
        Ok(self.influence()?.balance_of_at(account, id)?)
    }
}
