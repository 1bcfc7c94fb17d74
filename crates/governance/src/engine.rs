use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use civic_common::{Address, Context, Event, EventLog, ProposalId, ProposalState, Selector};
use civic_influence::DECIMALS;

use crate::collaborators::{Relay, SchemeDirectory, VotingPowerSource};
use crate::config::{ProposalConfig, SchemeAddresses, SchemeVariant, MAX_BPS};
use crate::error::{GovernanceError, Result};
use crate::multisend::{encode_batch, encode_multisend_call, MultisendCall, Operation};
use crate::permissions::{check_erc20_limits, set_erc20_balances, set_eth_permission_used};
use crate::proposal::{CastVote, Proposal};

#[derive(Debug, Default)]
struct ProposalBook {
    proposals: BTreeMap<ProposalId, Proposal>,
    next_id: u64,
    active_count: u64,
}

/// Clears the executing flag when resolution returns, on every path
struct ExecutionGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ExecutionGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Outcome decided for a proposal whose voting period has ended
enum Resolution {
    Terminal(ProposalState, Option<u32>),
    Execute(u32),
}

/// Multi-option proposal engine.
///
/// Proposals freeze a voting-power snapshot at creation, collect one vote
/// per voter, and on resolution execute the winning option's calls as a
/// single permission-checked multisend batch through the relay.
pub struct ProposalEngine {
    config: ProposalConfig,
    addresses: SchemeAddresses,
    voting_power: Arc<dyn VotingPowerSource>,
    relay: Arc<dyn Relay>,
    schemes: Arc<dyn SchemeDirectory>,
    events: EventLog,
    book: RwLock<ProposalBook>,
    executing: AtomicBool,
}

impl fmt::Debug for ProposalEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProposalEngine")
            .field("config", &self.config)
            .field("addresses", &self.addresses)
            .field("executing", &self.executing)
            .finish_non_exhaustive()
    }
}

impl ProposalEngine {
    /// Create an engine
    pub fn new(
        config: ProposalConfig,
        addresses: SchemeAddresses,
        voting_power: Arc<dyn VotingPowerSource>,
        relay: Arc<dyn Relay>,
        schemes: Arc<dyn SchemeDirectory>,
        events: EventLog,
    ) -> Result<Self> {
        config.validate()?;
        addresses.validate()?;

        info!(scheme = %addresses.scheme, variant = ?config.variant, "Proposal engine initialized");
        Ok(Self {
            config,
            addresses,
            voting_power,
            relay,
            schemes,
            events,
            book: RwLock::new(ProposalBook::default()),
            executing: AtomicBool::new(false),
        })
    }

    /// Create a proposal whose options split `to`, `call_data` and `value`
    /// into `total_options - 1` equal slices
    #[allow(clippy::too_many_arguments)]
    pub fn propose_calls(
        &self,
        ctx: &Context,
        mut to: Vec<Address>,
        mut call_data: Vec<Vec<u8>>,
        mut value: Vec<u128>,
        mut total_options: u32,
        title: String,
        description_hash: String,
    ) -> Result<ProposalId> {
        if to.len() != call_data.len() || to.len() != value.len() {
            return Err(GovernanceError::InvalidProposal(format!(
                "mismatched call lists: {} targets, {} payloads, {} values",
                to.len(),
                call_data.len(),
                value.len()
            )));
        }
        if total_options < 2 {
            return Err(GovernanceError::InvalidProposal(format!(
                "a proposal needs at least 2 options, got {}",
                total_options
            )));
        }
        let actions = total_options as usize - 1;
        if to.is_empty() || to.len() % actions != 0 {
            return Err(GovernanceError::InvalidProposal(format!(
                "{} calls cannot be split across {} options",
                to.len(),
                actions
            )));
        }

        if self.config.variant == SchemeVariant::EnforcedBinary {
            let per_option = to.len() / actions;
            to.extend(std::iter::repeat(Address::ZERO).take(per_option));
            call_data.extend(std::iter::repeat(Vec::new()).take(per_option));
            value.extend(std::iter::repeat(0).take(per_option));
            total_options = total_options
                .checked_add(1)
                .ok_or_else(|| GovernanceError::InvalidProposal("too many options".to_string()))?;
        }

        let end_time = ctx
            .now
            .checked_add(self.config.voting_period)
            .ok_or_else(|| GovernanceError::InvalidProposal("voting period overflows".to_string()))?;
        let execution_deadline = end_time
            .checked_add(self.config.time_for_execution)
            .ok_or_else(|| GovernanceError::InvalidProposal("execution window overflows".to_string()))?;

        let snapshot_id = self.voting_power.current_snapshot_id();
        let quorum_threshold = self.quorum_at(snapshot_id)?;

        let mut book = self.write_book()?;
        book.next_id += 1;
        let id = ProposalId(book.next_id);
        book.proposals.insert(
            id,
            Proposal {
                id,
                proposer: ctx.sender,
                title,
                description_hash,
                to,
                call_data,
                value,
                total_options,
                votes_per_option: vec![Decimal::ZERO; total_options as usize],
                voters: BTreeMap::new(),
                state: ProposalState::Active,
                submitted_at: ctx.now,
                end_time,
                execution_deadline,
                snapshot_id,
                quorum_threshold,
                winning_option: None,
            },
        );
        book.active_count += 1;
        drop(book);

        info!(
            %id,
            proposer = %ctx.sender,
            total_options,
            snapshot_id,
            %quorum_threshold,
            end_time,
            "Proposal created"
        );
        self.events.emit(Event::NewProposal {
            proposal_id: id,
            proposer: ctx.sender,
        });
        self.events.emit(Event::ProposalStateChanged {
            proposal_id: id,
            state: ProposalState::Active,
        });
        Ok(id)
    }

    /// Vote for `option` with the caller's influence at the proposal snapshot
    pub fn vote(&self, ctx: &Context, proposal_id: ProposalId, option: u32) -> Result<Decimal> {
        let (snapshot_id, total_options, end_time) = {
            let book = self.read_book()?;
            let proposal = Self::find(&book, proposal_id)?;
            if !proposal.is_active() {
                return Err(GovernanceError::ProposalAlreadyResolved(format!(
                    "{} is {}",
                    proposal_id, proposal.state
                )));
            }
            (proposal.snapshot_id, proposal.total_options, proposal.end_time)
        };

        if ctx.now >= end_time {
            return Err(GovernanceError::InvalidVote(format!(
                "voting on {} closed at {}",
                proposal_id, end_time
            )));
        }
        if option >= total_options {
            return Err(GovernanceError::InvalidVote(format!(
                "{} has {} options, got option {}",
                proposal_id, total_options, option
            )));
        }

        let weight = self.voting_power.balance_of_at(&ctx.sender, snapshot_id)?;
        if weight <= Decimal::ZERO {
            warn!(voter = %ctx.sender, %proposal_id, snapshot_id, "Vote without voting power");
            return Err(GovernanceError::InvalidVote(format!(
                "{} had no voting power at snapshot {}",
                ctx.sender, snapshot_id
            )));
        }

        let mut book = self.write_book()?;
        let proposal = book
            .proposals
            .get_mut(&proposal_id)
            .ok_or_else(|| GovernanceError::ProposalNotFound(proposal_id.to_string()))?;
        if !proposal.is_active() {
            return Err(GovernanceError::ProposalAlreadyResolved(proposal_id.to_string()));
        }
        if proposal.voters.contains_key(&ctx.sender) {
            return Err(GovernanceError::InvalidVote(format!(
                "{} already voted on {}",
                ctx.sender, proposal_id
            )));
        }

        let tally = &mut proposal.votes_per_option[option as usize];
        *tally = tally
            .checked_add(weight)
            .ok_or_else(|| GovernanceError::InvalidVote("vote total overflows".to_string()))?;
        proposal.voters.insert(ctx.sender, CastVote { option, weight });
        drop(book);

        debug!(voter = %ctx.sender, %proposal_id, option, %weight, "Vote recorded");
        self.events.emit(Event::VoteCast {
            proposal_id,
            voter: ctx.sender,
            option,
            weight,
        });
        Ok(weight)
    }

    /// Resolve a proposal whose voting period has ended
    pub fn end_proposal(&self, ctx: &Context, proposal_id: ProposalId) -> Result<ProposalState> {
        let _guard = ExecutionGuard::acquire(&self.executing).ok_or_else(|| {
            warn!(%proposal_id, "Rejected re-entrant proposal resolution");
            GovernanceError::ReentrantCall(format!("{} resolved while a batch is executing", proposal_id))
        })?;

        let proposal = {
            let book = self.read_book()?;
            Self::find(&book, proposal_id)?.clone()
        };
        if !proposal.is_active() {
            return Err(GovernanceError::ProposalAlreadyResolved(format!(
                "{} is {}",
                proposal_id, proposal.state
            )));
        }
        if ctx.now < proposal.end_time {
            return Err(GovernanceError::ProposalNotReady(format!(
                "{} voting ends at {}, now is {}",
                proposal_id, proposal.end_time, ctx.now
            )));
        }

        let (state, winning_option) = match self.resolve(ctx, &proposal) {
            Resolution::Terminal(state, winning_option) => (state, winning_option),
            Resolution::Execute(winner) => {
                self.dispatch(&proposal, winner)?;
                (ProposalState::Executed, Some(winner))
            }
        };

        self.finish(proposal_id, state, winning_option)?;
        Ok(state)
    }

    pub fn proposal(&self, id: ProposalId) -> Option<Proposal> {
        self.book
            .read()
            .ok()
            .and_then(|book| book.proposals.get(&id).cloned())
    }

    pub fn proposal_ids(&self) -> Vec<ProposalId> {
        self.book
            .read()
            .map(|book| book.proposals.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Proposals not yet in a terminal state
    pub fn active_proposals_count(&self) -> u64 {
        self.book.read().map(|book| book.active_count).unwrap_or_default()
    }

    /// The vote `voter` cast on `id`, if any
    pub fn votes_of(&self, id: ProposalId, voter: &Address) -> Option<CastVote> {
        self.book
            .read()
            .ok()
            .and_then(|book| book.proposals.get(&id).and_then(|p| p.voters.get(voter).copied()))
    }

    /// Whether a batch is currently being dispatched
    pub fn is_executing_proposal(&self) -> bool {
        self.executing.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &ProposalConfig {
        &self.config
    }

    pub fn addresses(&self) -> &SchemeAddresses {
        &self.addresses
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Build the permission-checked batch executing `option` of `proposal`
    pub fn build_batch(&self, proposal: &Proposal, option: u32) -> Result<Vec<MultisendCall>> {
        let registry = self.addresses.permission_registry;
        let avatar = self.addresses.avatar;

        let mut calls = vec![MultisendCall::call(registry, 0, set_erc20_balances())];
        let mut total_value: u128 = 0;

        for index in proposal.option_calls(option) {
            let to = proposal.to[index];
            let data = &proposal.call_data[index];
            let value = proposal.value[index];
            // empty entries pad "no action" slices
            if to.is_zero() && value == 0 && data.is_empty() {
                continue;
            }

            calls.push(MultisendCall::call(
                registry,
                0,
                set_eth_permission_used(avatar, to, Selector::of_call_data(data), value),
            ));
            calls.push(MultisendCall::call(to, value, data.clone()));
            total_value = total_value
                .checked_add(value)
                .ok_or_else(|| GovernanceError::InvalidProposal("total call value overflows".to_string()))?;
        }

        calls.push(MultisendCall::call(registry, 0, check_erc20_limits(avatar)));
        debug!(proposal_id = %proposal.id, option, records = calls.len(), total_value, "Built batch");
        Ok(calls)
    }

    fn resolve(&self, ctx: &Context, proposal: &Proposal) -> Resolution {
        let losing_state = match self.config.variant {
            SchemeVariant::OptionsCanFail => ProposalState::Failed,
            SchemeVariant::Standard | SchemeVariant::EnforcedBinary => ProposalState::Rejected,
        };

        let winner = proposal.leading_option();
        let always_no = self.config.variant == SchemeVariant::EnforcedBinary
            && winner == proposal.total_options - 1;

        if winner == 0 || always_no {
            debug!(proposal_id = %proposal.id, winner, "No executable option won");
            return Resolution::Terminal(losing_state, (winner != 0).then_some(winner));
        }
        if ctx.now > proposal.execution_deadline {
            warn!(
                proposal_id = %proposal.id,
                deadline = proposal.execution_deadline,
                now = ctx.now,
                "Execution window elapsed"
            );
            return Resolution::Terminal(ProposalState::Failed, Some(winner));
        }
        if !self.schemes.is_registered(&self.addresses.scheme) {
            warn!(proposal_id = %proposal.id, scheme = %self.addresses.scheme, "Scheme no longer registered");
            return Resolution::Terminal(ProposalState::Failed, Some(winner));
        }
        Resolution::Execute(winner)
    }

    fn dispatch(&self, proposal: &Proposal, winner: u32) -> Result<()> {
        let batch = encode_batch(&self.build_batch(proposal, winner)?);
        let payload = encode_multisend_call(&batch);

        info!(proposal_id = %proposal.id, winner, bytes = payload.len(), "Dispatching batch");
        let success = self.relay.exec_transaction_from_module(
            self.addresses.multisend,
            0,
            &payload,
            Operation::DelegateCall,
        );
        if !success {
            warn!(proposal_id = %proposal.id, winner, "Relay rejected batch");
            return Err(GovernanceError::RelayFailure(format!(
                "batch for option {} of {} failed",
                winner, proposal.id
            )));
        }
        Ok(())
    }

    fn finish(&self, proposal_id: ProposalId, state: ProposalState, winning_option: Option<u32>) -> Result<()> {
        let mut book = self.write_book()?;
        let proposal = book
            .proposals
            .get_mut(&proposal_id)
            .ok_or_else(|| GovernanceError::ProposalNotFound(proposal_id.to_string()))?;
        proposal.state = state;
        proposal.winning_option = winning_option;
        book.active_count = book.active_count.saturating_sub(1);
        drop(book);

        info!(%proposal_id, %state, ?winning_option, "Proposal resolved");
        self.events.emit(Event::ProposalStateChanged { proposal_id, state });
        Ok(())
    }

    fn quorum_at(&self, snapshot_id: u64) -> Result<Decimal> {
        let total = self.voting_power.total_supply_at(snapshot_id);
        let quorum = total
            .checked_mul(Decimal::from(self.config.quorum_bps))
            .and_then(|scaled| scaled.checked_div(Decimal::from(MAX_BPS)))
            .ok_or_else(|| GovernanceError::InvalidProposal("quorum overflows".to_string()))?;
        Ok(quorum.round_dp(DECIMALS))
    }

    fn find(book: &ProposalBook, id: ProposalId) -> Result<&Proposal> {
        book.proposals
            .get(&id)
            .ok_or_else(|| GovernanceError::ProposalNotFound(id.to_string()))
    }

    fn read_book(&self) -> Result<RwLockReadGuard<'_, ProposalBook>> {
        self.book
            .read()
            .map_err(|_| GovernanceError::Internal("Failed to acquire read lock on proposals".to_string()))
    }

    fn write_book(&self) -> Result<RwLockWriteGuard<'_, ProposalBook>> {
        self.book
            .write()
            .map_err(|_| GovernanceError::Internal("Failed to acquire write lock on proposals".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{MockRelay, MockSchemeDirectory, MockVotingPowerSource};
    use civic_common::ErrorKind;

    const PROPOSER: Address = Address::repeat_byte(0x50);
    const ALICE: Address = Address::repeat_byte(0xa1);
    const BOB: Address = Address::repeat_byte(0xb0);
    const NOBODY: Address = Address::repeat_byte(0xee);
    const TARGET: Address = Address::repeat_byte(0x70);

    fn addresses() -> SchemeAddresses {
        SchemeAddresses {
            scheme: Address::repeat_byte(0x5c),
            avatar: Address::repeat_byte(0xa7),
            multisend: Address::repeat_byte(0x3d),
            permission_registry: Address::repeat_byte(0x9e),
        }
    }

    fn config(variant: SchemeVariant) -> ProposalConfig {
        ProposalConfig {
            voting_period: 100,
            time_for_execution: 50,
            quorum_bps: 2_000,
            variant,
        }
    }

    fn voting_power() -> MockVotingPowerSource {
        let mut power = MockVotingPowerSource::new();
        power.expect_current_snapshot_id().return_const(7u64);
        power.expect_total_supply_at().returning(|_| Decimal::from(100));
        power.expect_balance_of_at().returning(|account, _| {
            Ok(match *account {
                ALICE => Decimal::from(30),
                BOB => Decimal::from(25),
                _ => Decimal::ZERO,
            })
        });
        power
    }

    fn registered(yes: bool) -> MockSchemeDirectory {
        let mut schemes = MockSchemeDirectory::new();
        schemes.expect_is_registered().return_const(yes);
        schemes
    }

    fn engine_with(variant: SchemeVariant, relay: MockRelay, schemes: MockSchemeDirectory) -> ProposalEngine {
        ProposalEngine::new(
            config(variant),
            addresses(),
            Arc::new(voting_power()),
            Arc::new(relay),
            Arc::new(schemes),
            EventLog::new(),
        )
        .unwrap()
    }

    fn engine(variant: SchemeVariant) -> ProposalEngine {
        engine_with(variant, MockRelay::new(), registered(true))
    }

    fn at(sender: Address, now: u64) -> Context {
        Context::new(sender, now)
    }

    fn propose(engine: &ProposalEngine, options: u32) -> ProposalId {
        let calls = options as usize - 1;
        engine
            .propose_calls(
                &at(PROPOSER, 0),
                vec![TARGET; calls],
                vec![vec![0xca, 0xfe, 0x00, 0x01]; calls],
                vec![0; calls],
                options,
                "Fund the garden".to_string(),
                "QmHash".to_string(),
            )
            .unwrap()
    }

    #[test]
    fn test_propose_freezes_snapshot_and_quorum() {
        let engine = engine(SchemeVariant::Standard);
        let id = propose(&engine, 3);
        let proposal = engine.proposal(id).unwrap();

        assert_eq!(proposal.snapshot_id, 7);
        assert_eq!(proposal.quorum_threshold, Decimal::from(20));
        assert_eq!(proposal.end_time, 100);
        assert_eq!(proposal.execution_deadline, 150);
        assert_eq!(proposal.votes_per_option.len(), 3);
        assert_eq!(engine.active_proposals_count(), 1);
        assert_eq!(engine.proposal_ids(), vec![id]);
    }

    #[test]
    fn test_propose_validates_call_lists() {
        let engine = engine(SchemeVariant::Standard);
        let ctx = at(PROPOSER, 0);

        let mismatched = engine.propose_calls(&ctx, vec![TARGET], vec![], vec![0], 2, String::new(), String::new());
        assert_eq!(mismatched.unwrap_err().kind(), ErrorKind::InvalidInput);

        let one_option = engine.propose_calls(&ctx, vec![TARGET], vec![vec![]], vec![0], 1, String::new(), String::new());
        assert!(one_option.is_err());

        let uneven = engine.propose_calls(
            &ctx,
            vec![TARGET; 3],
            vec![vec![]; 3],
            vec![0; 3],
            3,
            String::new(),
            String::new(),
        );
        assert!(uneven.is_err());

        let empty = engine.propose_calls(&ctx, vec![], vec![], vec![], 2, String::new(), String::new());
        assert!(empty.is_err());
        assert_eq!(engine.active_proposals_count(), 0);
    }

    #[test]
    fn test_enforced_binary_appends_no_action_slice() {
        let engine = engine(SchemeVariant::EnforcedBinary);
        let id = propose(&engine, 2);
        let proposal = engine.proposal(id).unwrap();

        assert_eq!(proposal.total_options, 3);
        assert_eq!(proposal.to, vec![TARGET, Address::ZERO]);
        assert_eq!(proposal.call_data[1], Vec::<u8>::new());
        assert_eq!(proposal.value, vec![0, 0]);
    }

    #[test]
    fn test_vote_rules() {
        let engine = engine(SchemeVariant::Standard);
        let id = propose(&engine, 3);

        assert_eq!(engine.vote(&at(ALICE, 10), id, 1).unwrap(), Decimal::from(30));
        assert_eq!(
            engine.votes_of(id, &ALICE),
            Some(CastVote {
                option: 1,
                weight: Decimal::from(30)
            })
        );

        let again = engine.vote(&at(ALICE, 11), id, 2).unwrap_err();
        assert!(matches!(again, GovernanceError::InvalidVote(_)));

        let bad_option = engine.vote(&at(BOB, 10), id, 3).unwrap_err();
        assert!(matches!(bad_option, GovernanceError::InvalidVote(_)));

        let powerless = engine.vote(&at(NOBODY, 10), id, 1).unwrap_err();
        assert!(matches!(powerless, GovernanceError::InvalidVote(_)));

        let closed = engine.vote(&at(BOB, 100), id, 1).unwrap_err();
        assert!(matches!(closed, GovernanceError::InvalidVote(_)));

        let missing = engine.vote(&at(BOB, 10), ProposalId(99), 1).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let proposal = engine.proposal(id).unwrap();
        assert_eq!(proposal.votes_per_option[1], Decimal::from(30));
        assert_eq!(proposal.voters.len(), 1);
    }

    #[test]
    fn test_end_proposal_before_end_time() {
        let engine = engine(SchemeVariant::Standard);
        let id = propose(&engine, 2);
        let err = engine.end_proposal(&at(BOB, 99), id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProposalNotReady);
        assert!(!engine.is_executing_proposal());
    }

    #[test]
    fn test_no_votes_rejects_and_cannot_resolve_twice() {
        let engine = engine(SchemeVariant::Standard);
        let id = propose(&engine, 2);

        assert_eq!(engine.end_proposal(&at(BOB, 100), id).unwrap(), ProposalState::Rejected);
        assert_eq!(engine.active_proposals_count(), 0);

        let err = engine.end_proposal(&at(BOB, 101), id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProposalAlreadyResolved);
        let err = engine.vote(&at(ALICE, 50), id, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProposalAlreadyResolved);
    }

    #[test]
    fn test_options_can_fail_variant_fails_losing_proposal() {
        let engine = engine(SchemeVariant::OptionsCanFail);
        let id = propose(&engine, 2);
        engine.vote(&at(ALICE, 1), id, 0).unwrap();

        assert_eq!(engine.end_proposal(&at(BOB, 100), id).unwrap(), ProposalState::Failed);
        assert_eq!(engine.proposal(id).unwrap().winning_option, None);
    }

    #[test]
    fn test_winner_executes_through_relay() {
        let mut relay = MockRelay::new();
        relay
            .expect_exec_transaction_from_module()
            .withf(|to, value, _, operation| {
                *to == Address::repeat_byte(0x3d) && *value == 0 && *operation == Operation::DelegateCall
            })
            .times(1)
            .return_const(true);
        let engine = engine_with(SchemeVariant::Standard, relay, registered(true));
        let id = propose(&engine, 3);
        engine.vote(&at(ALICE, 1), id, 2).unwrap();

        assert_eq!(engine.end_proposal(&at(BOB, 120), id).unwrap(), ProposalState::Executed);
        let proposal = engine.proposal(id).unwrap();
        assert_eq!(proposal.winning_option, Some(2));
        assert_eq!(engine.active_proposals_count(), 0);
    }

    #[test]
    fn test_unregistered_scheme_fails_without_dispatch() {
        let engine = engine_with(SchemeVariant::Standard, MockRelay::new(), registered(false));
        let id = propose(&engine, 2);
        engine.vote(&at(ALICE, 1), id, 1).unwrap();

        assert_eq!(engine.end_proposal(&at(BOB, 100), id).unwrap(), ProposalState::Failed);
    }

    #[test]
    fn test_relay_failure_keeps_proposal_active() {
        let mut relay = MockRelay::new();
        relay.expect_exec_transaction_from_module().times(1).return_const(false);
        let engine = engine_with(SchemeVariant::Standard, relay, registered(true));
        let id = propose(&engine, 2);
        engine.vote(&at(ALICE, 1), id, 1).unwrap();

        let err = engine.end_proposal(&at(BOB, 100), id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RelayFailure);
        assert!(engine.proposal(id).unwrap().is_active());
        assert_eq!(engine.active_proposals_count(), 1);
        assert!(!engine.is_executing_proposal());
    }

    #[test]
    fn test_batch_brackets_calls_with_permission_checks() {
        let engine = engine(SchemeVariant::Standard);
        let id = engine
            .propose_calls(
                &at(PROPOSER, 0),
                vec![TARGET, Address::ZERO],
                vec![vec![0xca, 0xfe, 0x00, 0x01, 0xff], vec![]],
                vec![5, 0],
                2,
                String::new(),
                String::new(),
            )
            .unwrap();
        let proposal = engine.proposal(id).unwrap();
        let registry = addresses().permission_registry;
        let avatar = addresses().avatar;

        let batch = engine.build_batch(&proposal, 1).unwrap();
        assert_eq!(
            batch,
            vec![
                MultisendCall::call(registry, 0, set_erc20_balances()),
                MultisendCall::call(
                    registry,
                    0,
                    set_eth_permission_used(avatar, TARGET, Selector::new([0xca, 0xfe, 0x00, 0x01]), 5)
                ),
                MultisendCall::call(TARGET, 5, vec![0xca, 0xfe, 0x00, 0x01, 0xff]),
                MultisendCall::call(registry, 0, check_erc20_limits(avatar)),
            ]
        );
    }

    #[test]
    fn test_batch_keeps_zero_target_calls_with_payload() {
        let engine = engine(SchemeVariant::Standard);
        let id = engine
            .propose_calls(
                &at(PROPOSER, 0),
                vec![Address::ZERO],
                vec![vec![0xde, 0xad, 0xbe, 0xef]],
                vec![500],
                2,
                String::new(),
                String::new(),
            )
            .unwrap();
        let proposal = engine.proposal(id).unwrap();
        let registry = addresses().permission_registry;
        let avatar = addresses().avatar;

        let batch = engine.build_batch(&proposal, 1).unwrap();
        assert_eq!(batch.len(), 4);
        assert_eq!(
            batch[1],
            MultisendCall::call(
                registry,
                0,
                set_eth_permission_used(avatar, Address::ZERO, Selector::new([0xde, 0xad, 0xbe, 0xef]), 500)
            )
        );
        assert_eq!(batch[2], MultisendCall::call(Address::ZERO, 500, vec![0xde, 0xad, 0xbe, 0xef]));
    }

    #[test]
    fn test_batch_skips_no_action_padding() {
        let engine = engine(SchemeVariant::EnforcedBinary);
        let id = propose(&engine, 2);
        let proposal = engine.proposal(id).unwrap();

        let batch = engine.build_batch(&proposal, 2).unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_propose_records_active_state_change() {
        let engine = engine(SchemeVariant::Standard);
        let id = propose(&engine, 2);

        let events = engine.events().events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::NewProposal { proposal_id, proposer } if proposal_id == id && proposer == PROPOSER));
        assert_eq!(
            events[1],
            Event::ProposalStateChanged {
                proposal_id: id,
                state: ProposalState::Active
            }
        );
    }
}
