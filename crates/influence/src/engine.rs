use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use civic_common::{Address, Context};
use civic_snapshot::{SnapshotClock, SnapshotId, SnapshotLedger};

use crate::error::{InfluenceError, Result};
use crate::formula::{calculate_influence, CumulativeStake, FormulaConfig, FormulaMultipliers, DECIMALS};
use crate::hook::VotingPowerHook;

/// Stake-weighted influence tracker with point-in-time history.
///
/// Account stakes, the global aggregate, the formula and the stored total
/// influence are four ledgers on one shared clock, so every mutation is
/// recorded under a single snapshot id.
pub struct InfluenceEngine {
    owner: Address,
    exponent: Decimal,
    clock: SnapshotClock,
    stakes: SnapshotLedger<Address, CumulativeStake>,
    total_stake: SnapshotLedger<(), CumulativeStake>,
    formula: SnapshotLedger<(), FormulaMultipliers>,
    total_influence: SnapshotLedger<(), Decimal>,
    voting_power: Option<Arc<dyn VotingPowerHook>>,
}

impl fmt::Debug for InfluenceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluenceEngine")
            .field("owner", &self.owner)
            .field("exponent", &self.exponent)
            .field("current_snapshot_id", &self.clock.current())
            .field("voting_power", &self.voting_power.is_some())
            .finish()
    }
}

impl InfluenceEngine {
    /// Create an engine owned by `owner` and record the initial formula
    pub fn new(owner: Address, config: &FormulaConfig, clock: SnapshotClock) -> Result<Self> {
        config.validate()?;

        let mut engine = Self {
            owner,
            exponent: config.exponent,
            stakes: SnapshotLedger::with_clock(clock.clone()),
            total_stake: SnapshotLedger::with_clock(clock.clone()),
            formula: SnapshotLedger::with_clock(clock.clone()),
            total_influence: SnapshotLedger::with_clock(clock.clone()),
            clock,
            voting_power: None,
        };

        let id = engine.formula.record(&(), config.multipliers());
        engine.total_influence.record_at(&(), id, Decimal::ZERO)?;

        info!(%owner, exponent = %config.exponent, id, "Influence engine initialized");
        Ok(engine)
    }

    /// Attach the voting-power collaborator notified after every change
    pub fn with_voting_power(mut self, hook: Arc<dyn VotingPowerHook>) -> Self {
        self.voting_power = Some(hook);
        self
    }

    /// Stake `amount` for `account` committed for `time_commitment`
    pub fn mint(
        &mut self,
        ctx: &Context,
        account: Address,
        amount: Decimal,
        time_commitment: u64,
    ) -> Result<SnapshotId> {
        self.ensure_owner(ctx, "mint")?;
        let terms = self.stake_terms(amount, time_commitment)?;

        let account_stake = self.stakes.latest(&account).checked_add(&terms)?;
        let total_stake = self.total_stake.latest(&()).checked_add(&terms)?;

        let id = self.commit(account, account_stake, total_stake)?;
        info!(%account, %amount, time_commitment, id, "Minted influence");
        Ok(id)
    }

    /// Remove a stake of `amount` committed for `time_commitment`
    pub fn burn(
        &mut self,
        ctx: &Context,
        account: Address,
        amount: Decimal,
        time_commitment: u64,
    ) -> Result<SnapshotId> {
        self.ensure_owner(ctx, "burn")?;
        let terms = self.stake_terms(amount, time_commitment)?;

        let account_stake = self.stakes.latest(&account).checked_sub(&terms)?;
        let total_stake = self.total_stake.latest(&()).checked_sub(&terms)?;

        let id = self.commit(account, account_stake, total_stake)?;
        info!(%account, %amount, time_commitment, id, "Burned influence");
        Ok(id)
    }

    /// Move a stake of `amount` from `old_time` to `new_time`.
    ///
    /// An unchanged time commitment records nothing and returns the
    /// current snapshot id.
    pub fn update_time(
        &mut self,
        ctx: &Context,
        account: Address,
        amount: Decimal,
        old_time: u64,
        new_time: u64,
    ) -> Result<SnapshotId> {
        self.ensure_owner(ctx, "update_time")?;
        let old_terms = self.stake_terms(amount, old_time)?;
        if old_time == new_time {
            debug!(%account, old_time, "Time commitment unchanged");
            return Ok(self.clock.current());
        }
        let new_terms = self.stake_terms(amount, new_time)?;

        let account_stake = self
            .stakes
            .latest(&account)
            .checked_sub(&old_terms)?
            .checked_add(&new_terms)?;
        let total_stake = self
            .total_stake
            .latest(&())
            .checked_sub(&old_terms)?
            .checked_add(&new_terms)?;

        let id = self.commit(account, account_stake, total_stake)?;
        info!(%account, %amount, old_time, new_time, id, "Updated time commitment");
        Ok(id)
    }

    /// Replace the formula multipliers.
    ///
    /// Historical reads keep using the formula that was in force at their
    /// snapshot; current reads switch immediately.
    pub fn change_formula(
        &mut self,
        ctx: &Context,
        linear_multiplier: Decimal,
        exponential_multiplier: Decimal,
    ) -> Result<SnapshotId> {
        self.ensure_owner(ctx, "change_formula")?;

        let formula = FormulaMultipliers::new(linear_multiplier, exponential_multiplier);
        let total = calculate_influence(&self.total_stake.latest(&()), &formula)?;

        let id = self.formula.record(&(), formula);
        self.total_influence.record_at(&(), id, total)?;
        self.notify();

        info!(%linear_multiplier, %exponential_multiplier, id, "Formula changed");
        Ok(id)
    }

    /// Hand the owner role to `new_owner`
    pub fn transfer_ownership(&mut self, ctx: &Context, new_owner: Address) -> Result<()> {
        self.ensure_owner(ctx, "transfer_ownership")?;
        info!(old_owner = %self.owner, %new_owner, "Influence ownership transferred");
        self.owner = new_owner;
        Ok(())
    }

    /// Current influence: latest stake under the latest formula
    pub fn balance_of(&self, account: &Address) -> Result<Decimal> {
        let stake = self.stakes.latest(account);
        let formula = self.formula.latest(&());
        calculate_influence(&stake, &formula)
    }

    /// Influence at `id`: the stake at `id` under the formula at `id`
    pub fn balance_of_at(&self, account: &Address, id: SnapshotId) -> Result<Decimal> {
        let stake = self.stakes.value_at(account, id);
        let formula = self.formula.value_at(&(), id);
        calculate_influence(&stake, &formula)
    }

    /// Stored total influence at the latest snapshot
    pub fn total_supply(&self) -> Decimal {
        self.total_influence.latest(&())
    }

    /// Stored total influence at `id`
    pub fn total_supply_at(&self, id: SnapshotId) -> Decimal {
        self.total_influence.value_at(&(), id)
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn exponent(&self) -> Decimal {
        self.exponent
    }

    pub fn formula(&self) -> FormulaMultipliers {
        self.formula.latest(&())
    }

    pub fn formula_at(&self, id: SnapshotId) -> FormulaMultipliers {
        self.formula.value_at(&(), id)
    }

    pub fn cumulative_stake(&self, account: &Address) -> CumulativeStake {
        self.stakes.latest(account)
    }

    pub fn cumulative_stake_at(&self, account: &Address, id: SnapshotId) -> CumulativeStake {
        self.stakes.value_at(account, id)
    }

    pub fn total_cumulative_stake(&self) -> CumulativeStake {
        self.total_stake.latest(&())
    }

    pub fn total_cumulative_stake_at(&self, id: SnapshotId) -> CumulativeStake {
        self.total_stake.value_at(&(), id)
    }

    /// Most recent id issued by the shared clock
    pub fn current_snapshot_id(&self) -> SnapshotId {
        self.clock.current()
    }

    /// Accounts that have ever held a stake
    pub fn accounts(&self) -> Vec<Address> {
        self.stakes.subjects().copied().collect()
    }

    /// Ids at which `account`'s stake changed
    pub fn account_snapshots(&self, account: &Address) -> Vec<SnapshotId> {
        self.stakes.timeline(account)
    }

    fn ensure_owner(&self, ctx: &Context, operation: &str) -> Result<()> {
        if ctx.sender != self.owner {
            warn!(sender = %ctx.sender, operation, "Rejected influence mutation from non-owner");
            return Err(InfluenceError::PermissionDenied(format!(
                "{} may not {}",
                ctx.sender, operation
            )));
        }
        Ok(())
    }

    fn stake_terms(&self, amount: Decimal, time_commitment: u64) -> Result<CumulativeStake> {
        if amount <= Decimal::ZERO {
            return Err(InfluenceError::InvalidInput(format!(
                "amount must be positive, got {}",
                amount
            )));
        }
        let terms = CumulativeStake::from_stake(amount.round_dp(DECIMALS), time_commitment, self.exponent)?;
        debug!(%amount, time_commitment, ?terms, "Computed formula terms");
        Ok(terms)
    }

    /// Record a new account stake and aggregate under one fresh id.
    ///
    /// Everything fallible is evaluated before the clock advances.
    fn commit(
        &mut self,
        account: Address,
        account_stake: CumulativeStake,
        total_stake: CumulativeStake,
    ) -> Result<SnapshotId> {
        let total = calculate_influence(&total_stake, &self.formula.latest(&()))?;

        let id = self.clock.advance();
        self.stakes.record_at(&account, id, account_stake)?;
        self.total_stake.record_at(&(), id, total_stake)?;
        self.total_influence.record_at(&(), id, total)?;
        self.notify();

        debug!(%account, id, total_influence = %total, "Committed stake snapshot");
        Ok(id)
    }

    fn notify(&self) {
        if let Some(hook) = &self.voting_power {
            hook.callback();
        }
    }
}
