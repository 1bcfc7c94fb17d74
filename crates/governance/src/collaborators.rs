//! Boundaries of the systems the proposal engine reads from and dispatches to.

use std::sync::RwLock;

use rust_decimal::Decimal;

use civic_common::Address;
use civic_controller::Controller;
use civic_influence::{InfluenceEngine, InfluenceError};
use civic_snapshot::SnapshotId;

use crate::multisend::Operation;

/// Module-call relay of the avatar
#[cfg_attr(test, mockall::automock)]
pub trait Relay: Send + Sync {
    /// Execute `data` against `to` on behalf of the avatar
    fn exec_transaction_from_module(&self, to: Address, value: u128, data: &[u8], operation: Operation) -> bool;
}

/// Historical voting power
#[cfg_attr(test, mockall::automock)]
pub trait VotingPowerSource: Send + Sync {
    /// Most recent snapshot id
    fn current_snapshot_id(&self) -> SnapshotId;

    /// Total voting power at `id`
    fn total_supply_at(&self, id: SnapshotId) -> Decimal;

    /// Voting power of `account` at `id`
    fn balance_of_at(&self, account: &Address, id: SnapshotId) -> Result<Decimal, InfluenceError>;
}

impl VotingPowerSource for InfluenceEngine {
    fn current_snapshot_id(&self) -> SnapshotId {
        InfluenceEngine::current_snapshot_id(self)
    }

    fn total_supply_at(&self, id: SnapshotId) -> Decimal {
        InfluenceEngine::total_supply_at(self, id)
    }

    fn balance_of_at(&self, account: &Address, id: SnapshotId) -> Result<Decimal, InfluenceError> {
        InfluenceEngine::balance_of_at(self, account, id)
    }
}

impl VotingPowerSource for RwLock<InfluenceEngine> {
    fn current_snapshot_id(&self) -> SnapshotId {
        match self.read() {
            Ok(engine) => engine.current_snapshot_id(),
            Err(poisoned) => poisoned.into_inner().current_snapshot_id(),
        }
    }

    fn total_supply_at(&self, id: SnapshotId) -> Decimal {
        match self.read() {
            Ok(engine) => engine.total_supply_at(id),
            Err(poisoned) => poisoned.into_inner().total_supply_at(id),
        }
    }

    fn balance_of_at(&self, account: &Address, id: SnapshotId) -> Result<Decimal, InfluenceError> {
        match self.read() {
            Ok(engine) => engine.balance_of_at(account, id),
            Err(poisoned) => poisoned.into_inner().balance_of_at(account, id),
        }
    }
}

/// Registration status of schemes
#[cfg_attr(test, mockall::automock)]
pub trait SchemeDirectory: Send + Sync {
    /// Whether `scheme` is currently registered
    fn is_registered(&self, scheme: &Address) -> bool;
}

impl SchemeDirectory for Controller {
    fn is_registered(&self, scheme: &Address) -> bool {
        self.is_scheme_registered(scheme)
    }
}
