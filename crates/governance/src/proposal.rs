use std::collections::BTreeMap;
use std::ops::Range;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use civic_common::{Address, ProposalId, ProposalState, Timestamp};
use civic_snapshot::SnapshotId;

/// A recorded vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastVote {
    pub option: u32,
    pub weight: Decimal,
}

/// A multi-option proposal.
///
/// The call list is split into `total_options - 1` equal slices; option
/// `i` (for `i >= 1`) executes slice `i - 1`. Option 0 rejects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub proposer: Address,
    pub title: String,
    pub description_hash: String,
    pub to: Vec<Address>,
    pub call_data: Vec<Vec<u8>>,
    pub value: Vec<u128>,
    pub total_options: u32,
    pub votes_per_option: Vec<Decimal>,
    pub voters: BTreeMap<Address, CastVote>,
    pub state: ProposalState,
    pub submitted_at: Timestamp,
    pub end_time: Timestamp,
    pub execution_deadline: Timestamp,
    /// Snapshot at which voting power is read
    pub snapshot_id: SnapshotId,
    /// Votes an option needs to win
    pub quorum_threshold: Decimal,
    pub winning_option: Option<u32>,
}

impl Proposal {
    /// Number of calls each option executes
    pub fn calls_per_option(&self) -> usize {
        match self.total_options {
            0 | 1 => 0,
            n => self.to.len() / (n as usize - 1),
        }
    }

    /// Indices of the calls `option` executes; empty for option 0
    pub fn option_calls(&self, option: u32) -> Range<usize> {
        if option == 0 || option >= self.total_options {
            return 0..0;
        }
        let per_option = self.calls_per_option();
        let start = (option as usize - 1) * per_option;
        start..start + per_option
    }

    /// Option with the strictly greatest total that meets the quorum and
    /// beats option 0. Ties keep the earlier option; `0` when nothing wins.
    pub fn leading_option(&self) -> u32 {
        let mut winner = 0u32;
        let mut max = self.votes_per_option.first().copied().unwrap_or_default();

        for (option, votes) in self.votes_per_option.iter().enumerate().skip(1) {
            if *votes >= self.quorum_threshold && *votes > max {
                winner = option as u32;
                max = *votes;
            }
        }
        winner
    }

    pub fn is_active(&self) -> bool {
        self.state == ProposalState::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal(votes: &[i64], quorum: i64, calls: usize) -> Proposal {
        Proposal {
            id: ProposalId(1),
            proposer: Address::ZERO,
            title: String::new(),
            description_hash: String::new(),
            to: vec![Address::repeat_byte(9); calls],
            call_data: vec![Vec::new(); calls],
            value: vec![0; calls],
            total_options: votes.len() as u32,
            votes_per_option: votes.iter().map(|v| Decimal::from(*v)).collect(),
            voters: BTreeMap::new(),
            state: ProposalState::Active,
            submitted_at: 0,
            end_time: 10,
            execution_deadline: 20,
            snapshot_id: 1,
            quorum_threshold: Decimal::from(quorum),
            winning_option: None,
        }
    }

    #[test]
    fn test_option_slices() {
        let p = proposal(&[0, 0, 0, 0], 0, 6);
        assert_eq!(p.calls_per_option(), 2);
        assert_eq!(p.option_calls(0), 0..0);
        assert_eq!(p.option_calls(1), 0..2);
        assert_eq!(p.option_calls(3), 4..6);
        assert_eq!(p.option_calls(4), 0..0);
    }

    #[test]
    fn test_greatest_total_above_quorum_wins() {
        assert_eq!(proposal(&[0, 40, 61], 50, 2).leading_option(), 2);
        assert_eq!(proposal(&[0, 40, 61], 62, 2).leading_option(), 0);
    }

    #[test]
    fn test_tie_keeps_earlier_option() {
        assert_eq!(proposal(&[0, 30, 30], 10, 2).leading_option(), 1);
    }

    #[test]
    fn test_must_beat_reject_total() {
        assert_eq!(proposal(&[50, 50, 0], 10, 2).leading_option(), 0);
        assert_eq!(proposal(&[50, 51, 0], 10, 2).leading_option(), 1);
    }

    #[test]
    fn test_quorum_filters_options() {
        assert_eq!(proposal(&[0, 20, 25], 26, 2).leading_option(), 0);
        assert_eq!(proposal(&[0, 20, 25], 21, 2).leading_option(), 2);
        assert_eq!(proposal(&[0, 25, 20], 21, 2).leading_option(), 1);
    }
}
