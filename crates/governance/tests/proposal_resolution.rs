//! Proposal resolution against a real influence engine

use std::sync::{Arc, Mutex, RwLock, Weak};

use civic_common::{Address, Context, ErrorKind, Event, EventLog, ProposalId, ProposalState, Selector};
use civic_governance::multisend::{decode_batch, decode_multisend_call};
use civic_governance::permissions::{check_erc20_limits, set_erc20_balances, set_eth_permission_used};
use civic_governance::{
    GovernanceError, MultisendCall, Operation, ProposalConfig, ProposalEngine, Relay, SchemeAddresses,
    SchemeDirectory, SchemeVariant,
};
use civic_influence::{FormulaConfig, InfluenceEngine};
use civic_snapshot::SnapshotClock;
use rust_decimal::Decimal;

const DAO: Address = Address::repeat_byte(0x0d);
const ALICE: Address = Address::repeat_byte(0xa1);
const BOB: Address = Address::repeat_byte(0xb0);
const CAROL: Address = Address::repeat_byte(0xc0);
const GARDEN: Address = Address::repeat_byte(0x61);
const LIBRARY: Address = Address::repeat_byte(0x11);

fn addresses() -> SchemeAddresses {
    SchemeAddresses {
        scheme: Address::repeat_byte(0x5c),
        avatar: Address::repeat_byte(0xa7),
        multisend: Address::repeat_byte(0x3d),
        permission_registry: Address::repeat_byte(0x9e),
    }
}

#[derive(Default)]
struct RecordingRelay {
    calls: Mutex<Vec<(Address, u128, Vec<u8>, Operation)>>,
    succeed: bool,
}

impl RecordingRelay {
    fn succeeding() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            succeed: true,
        }
    }

    fn failing() -> Self {
        Self::default()
    }

    fn calls(&self) -> Vec<(Address, u128, Vec<u8>, Operation)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Relay for RecordingRelay {
    fn exec_transaction_from_module(&self, to: Address, value: u128, data: &[u8], operation: Operation) -> bool {
        self.calls.lock().unwrap().push((to, value, data.to_vec(), operation));
        self.succeed
    }
}

struct Registered;

impl SchemeDirectory for Registered {
    fn is_registered(&self, _scheme: &Address) -> bool {
        true
    }
}

struct Fixture {
    influence: Arc<RwLock<InfluenceEngine>>,
    engine: Arc<ProposalEngine>,
}

fn fixture(quorum_bps: u32, variant: SchemeVariant, relay: Arc<dyn Relay>) -> Fixture {
    let config = FormulaConfig {
        exponent: Decimal::from(2),
        linear_multiplier: Decimal::ONE,
        exponential_multiplier: Decimal::ZERO,
    };
    let influence = Arc::new(RwLock::new(
        InfluenceEngine::new(DAO, &config, SnapshotClock::new()).unwrap(),
    ));
    {
        let mut engine = influence.write().unwrap();
        let ctx = Context::new(DAO, 0);
        engine.mint(&ctx, ALICE, Decimal::from(40), 1).unwrap();
        engine.mint(&ctx, BOB, Decimal::from(61), 1).unwrap();
    }

    let proposals = ProposalConfig {
        voting_period: 100,
        time_for_execution: 50,
        quorum_bps,
        variant,
    };
    let engine = ProposalEngine::new(
        proposals,
        addresses(),
        influence.clone(),
        relay,
        Arc::new(Registered),
        EventLog::new(),
    )
    .unwrap();

    Fixture {
        influence,
        engine: Arc::new(engine),
    }
}

fn propose_two_grants(engine: &ProposalEngine) -> ProposalId {
    engine
        .propose_calls(
            &Context::new(CAROL, 10),
            vec![GARDEN, LIBRARY],
            vec![vec![0xa9, 0x05, 0x9c, 0xbb, 0x01], vec![0xa9, 0x05, 0x9c, 0xbb, 0x02]],
            vec![100, 200],
            3,
            "Community grants".to_string(),
            "QmGrants".to_string(),
        )
        .unwrap()
}

#[test_log::test]
fn option_with_61_percent_wins_when_it_meets_quorum() {
    let relay = Arc::new(RecordingRelay::succeeding());
    let f = fixture(6_000, SchemeVariant::Standard, relay.clone());
    let id = propose_two_grants(&f.engine);

    // quorum is 60% of 101
    let proposal = f.engine.proposal(id).unwrap();
    assert_eq!(proposal.quorum_threshold, Decimal::new(606, 1));

    f.engine.vote(&Context::new(ALICE, 20), id, 1).unwrap();
    f.engine.vote(&Context::new(BOB, 21), id, 2).unwrap();

    let state = f.engine.end_proposal(&Context::new(CAROL, 110), id).unwrap();
    assert_eq!(state, ProposalState::Executed);
    assert_eq!(f.engine.proposal(id).unwrap().winning_option, Some(2));

    let calls = relay.calls();
    assert_eq!(calls.len(), 1);
    let (to, value, payload, operation) = &calls[0];
    assert_eq!(*to, addresses().multisend);
    assert_eq!(*value, 0);
    assert_eq!(*operation, Operation::DelegateCall);

    let registry = addresses().permission_registry;
    let avatar = addresses().avatar;
    let batch = decode_batch(&decode_multisend_call(payload).unwrap()).unwrap();
    assert_eq!(
        batch,
        vec![
            MultisendCall::call(registry, 0, set_erc20_balances()),
            MultisendCall::call(
                registry,
                0,
                set_eth_permission_used(avatar, LIBRARY, Selector::new([0xa9, 0x05, 0x9c, 0xbb]), 200)
            ),
            MultisendCall::call(LIBRARY, 200, vec![0xa9, 0x05, 0x9c, 0xbb, 0x02]),
            MultisendCall::call(registry, 0, check_erc20_limits(avatar)),
        ]
    );
}

#[test_log::test]
fn option_below_quorum_is_rejected() {
    let relay = Arc::new(RecordingRelay::succeeding());
    let f = fixture(7_000, SchemeVariant::Standard, relay.clone());
    let id = propose_two_grants(&f.engine);

    f.engine.vote(&Context::new(ALICE, 20), id, 1).unwrap();
    f.engine.vote(&Context::new(BOB, 21), id, 2).unwrap();

    let state = f.engine.end_proposal(&Context::new(CAROL, 110), id).unwrap();
    assert_eq!(state, ProposalState::Rejected);
    assert!(relay.calls().is_empty());
}

#[test_log::test]
fn winner_past_grace_window_fails_without_dispatch() {
    let relay = Arc::new(RecordingRelay::succeeding());
    let f = fixture(1_000, SchemeVariant::Standard, relay.clone());
    let id = propose_two_grants(&f.engine);
    f.engine.vote(&Context::new(BOB, 21), id, 1).unwrap();

    // end_time = 110, execution deadline = 160
    let state = f.engine.end_proposal(&Context::new(CAROL, 161), id).unwrap();
    assert_eq!(state, ProposalState::Failed);
    assert!(relay.calls().is_empty());
    assert_eq!(f.engine.active_proposals_count(), 0);
}

#[test_log::test]
fn relay_failure_leaves_proposal_retryable() {
    let relay = Arc::new(RecordingRelay::failing());
    let f = fixture(1_000, SchemeVariant::Standard, relay.clone());
    let id = propose_two_grants(&f.engine);
    f.engine.vote(&Context::new(BOB, 21), id, 1).unwrap();

    let err = f.engine.end_proposal(&Context::new(CAROL, 110), id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RelayFailure);
    assert_eq!(f.engine.proposal(id).unwrap().state, ProposalState::Active);
    assert_eq!(f.engine.active_proposals_count(), 1);

    // a second attempt dispatches again
    assert!(f.engine.end_proposal(&Context::new(CAROL, 111), id).is_err());
    assert_eq!(relay.calls().len(), 2);
    assert!(!f
        .engine
        .events()
        .events()
        .iter()
        .any(|event| matches!(event, Event::ProposalStateChanged { state, .. } if *state != ProposalState::Active)));
}

#[test_log::test]
fn voting_power_is_frozen_at_proposal_snapshot() {
    let relay = Arc::new(RecordingRelay::succeeding());
    let f = fixture(1_000, SchemeVariant::Standard, relay);
    let id = propose_two_grants(&f.engine);

    f.influence
        .write()
        .unwrap()
        .mint(&Context::new(DAO, 15), CAROL, Decimal::from(500), 1)
        .unwrap();

    let err = f.engine.vote(&Context::new(CAROL, 20), id, 1).unwrap_err();
    assert!(matches!(err, GovernanceError::InvalidVote(_)));
    assert_eq!(f.engine.vote(&Context::new(ALICE, 20), id, 1).unwrap(), Decimal::from(40));
}

#[test_log::test]
fn enforced_binary_no_action_option_rejects() {
    let relay = Arc::new(RecordingRelay::succeeding());
    let f = fixture(1_000, SchemeVariant::EnforcedBinary, relay.clone());
    let id = f
        .engine
        .propose_calls(
            &Context::new(CAROL, 10),
            vec![GARDEN],
            vec![vec![0x01]],
            vec![0],
            2,
            "Plant trees".to_string(),
            String::new(),
        )
        .unwrap();
    assert_eq!(f.engine.proposal(id).unwrap().total_options, 3);

    f.engine.vote(&Context::new(ALICE, 20), id, 1).unwrap();
    f.engine.vote(&Context::new(BOB, 20), id, 2).unwrap();

    let state = f.engine.end_proposal(&Context::new(CAROL, 110), id).unwrap();
    assert_eq!(state, ProposalState::Rejected);
    assert!(relay.calls().is_empty());
}

/// Relay that tries to resolve the proposal again while dispatching
struct ReentrantRelay {
    engine: Mutex<Weak<ProposalEngine>>,
    proposal: Mutex<Option<ProposalId>>,
    observed: Mutex<Vec<(bool, Result<ProposalState, GovernanceError>)>>,
}

impl Relay for ReentrantRelay {
    fn exec_transaction_from_module(&self, _to: Address, _value: u128, _data: &[u8], _operation: Operation) -> bool {
        let engine = self.engine.lock().unwrap().upgrade();
        let proposal = *self.proposal.lock().unwrap();
        if let (Some(engine), Some(id)) = (engine, proposal) {
            let executing = engine.is_executing_proposal();
            let result = engine.end_proposal(&Context::new(CAROL, 120), id);
            self.observed.lock().unwrap().push((executing, result));
        }
        true
    }
}

#[test_log::test]
fn reentrant_resolution_is_rejected() {
    let relay = Arc::new(ReentrantRelay {
        engine: Mutex::new(Weak::new()),
        proposal: Mutex::new(None),
        observed: Mutex::new(Vec::new()),
    });
    let f = fixture(1_000, SchemeVariant::Standard, relay.clone());
    let id = propose_two_grants(&f.engine);
    *relay.engine.lock().unwrap() = Arc::downgrade(&f.engine);
    *relay.proposal.lock().unwrap() = Some(id);

    f.engine.vote(&Context::new(BOB, 21), id, 1).unwrap();
    let state = f.engine.end_proposal(&Context::new(CAROL, 110), id).unwrap();
    assert_eq!(state, ProposalState::Executed);
    assert!(!f.engine.is_executing_proposal());

    let observed = relay.observed.lock().unwrap();
    assert_eq!(observed.len(), 1);
    let (executing, result) = &observed[0];
    assert!(*executing);
    assert_eq!(result.as_ref().unwrap_err().kind(), ErrorKind::ReentrantCall);
}
