//! Stake tally collaborator.
//!
//! The engine only fixes the contract: every method must be deterministic
//! and pure given the snapshot, so all nodes agree. [`StakeTally`] is the
//! reference implementation used by the node and the tests.

use super::{
    error::{DposError, DposResult},
    extra::{HeaderExtra, Vote},
    snapshot::Snapshot,
};
use crate::primitives::Header;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tally state carried inside every snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyState {
    /// Latest vote of each voter.
    pub votes: BTreeMap<Address, Vote>,
    /// Total stake behind each candidate.
    pub stakes: BTreeMap<Address, U256>,
    /// Number of slots each signer has missed.
    pub punished: BTreeMap<Address, u64>,
}

impl TallyState {
    /// Record `vote`, replacing any earlier vote of the same voter.
    pub fn cast(&mut self, vote: Vote) {
        if let Some(previous) = self.votes.remove(&vote.voter) {
            self.uncast(&previous);
        }
        *self.stakes.entry(vote.candidate).or_default() += vote.stake;
        self.votes.insert(vote.voter, vote);
    }

    fn uncast(&mut self, vote: &Vote) {
        if let Some(stake) = self.stakes.get_mut(&vote.candidate) {
            *stake = stake.saturating_sub(vote.stake);
            if stake.is_zero() {
                self.stakes.remove(&vote.candidate);
            }
        }
    }

    /// Count one missed slot for each entry of `missing`.
    pub fn punish(&mut self, missing: &[Address]) {
        for signer in missing {
            *self.punished.entry(*signer).or_default() += 1;
        }
    }
}

/// Roster election and slot ownership.
pub trait Tally: Send + Sync {
    /// Tally state of the genesis snapshot.
    fn genesis(&self, votes: &[Vote]) -> TallyState;

    /// Elect the roster for the loop following `snap`.
    fn create_signer_queue(&self, snap: &Snapshot) -> DposResult<Vec<Address>>;

    /// Whether `queue` is the roster this tally would elect after `snap`.
    fn verify_new_roster(&self, snap: &Snapshot, queue: &[Address]) -> bool;

    /// Whether `signer` owns the slot containing `time`.
    fn in_turn(&self, snap: &Snapshot, signer: Address, time: u64) -> bool;

    /// Fold one header's payload into the tally state.
    fn apply_extra(&self, snap: Snapshot, header: &Header, extra: &HeaderExtra) -> DposResult<Snapshot>;
}

/// Stake-weighted reference tally.
///
/// The roster is the top `max_signer_count` candidates by stake, ties broken
/// by address, repeated to fill every slot. Without any staked candidate the
/// current roster is kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct StakeTally;

impl Tally for StakeTally {
    fn genesis(&self, votes: &[Vote]) -> TallyState {
        let mut state = TallyState::default();
        for vote in votes {
            state.cast(vote.clone());
        }
        state
    }

    fn create_signer_queue(&self, snap: &Snapshot) -> DposResult<Vec<Address>> {
        let slots = snap.config.max_signer_count as usize;

        let mut candidates: Vec<(Address, U256)> =
            snap.tally.stakes.iter().map(|(candidate, stake)| (*candidate, *stake)).collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let elected: Vec<Address> = if candidates.is_empty() {
            snap.signers.clone()
        } else {
            candidates.into_iter().take(slots).map(|(candidate, _)| candidate).collect()
        };
        if elected.is_empty() {
            return Err(DposError::SignerQueueEmpty);
        }

        Ok(elected.iter().cycle().take(slots).copied().collect())
    }

    fn verify_new_roster(&self, snap: &Snapshot, queue: &[Address]) -> bool {
        self.create_signer_queue(snap).map(|expected| expected == queue).unwrap_or(false)
    }

    fn in_turn(&self, snap: &Snapshot, signer: Address, time: u64) -> bool {
        if snap.config.period == 0 {
            return snap.is_signer(&signer);
        }
        snap.scheduled_signer(time) == Some(signer)
    }

    fn apply_extra(&self, mut snap: Snapshot, _header: &Header, extra: &HeaderExtra) -> DposResult<Snapshot> {
        for vote in &extra.current_block_votes {
            snap.tally.cast(vote.clone());
        }
        snap.tally.punish(&extra.signer_missing);
        Ok(snap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::dpos::config::RotationParams;
    use alloy_primitives::B256;

    fn addr(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    fn vote(voter: u8, candidate: u8, stake: u64) -> Vote {
        Vote { voter: addr(voter), candidate: addr(candidate), stake: U256::from(stake) }
    }

    fn snapshot(tally: TallyState) -> Snapshot {
        Snapshot::new(
            RotationParams { period: 10, max_signer_count: 3 },
            B256::ZERO,
            0,
            &[addr(1), addr(2), addr(3)],
            tally,
        )
        .unwrap()
    }

    #[test]
    fn test_recast_moves_stake() {
        let mut state = TallyState::default();
        state.cast(vote(0x10, 1, 100));
        state.cast(vote(0x11, 1, 50));
        assert_eq!(state.stakes[&addr(1)], U256::from(150));

        state.cast(vote(0x10, 2, 100));
        assert_eq!(state.stakes[&addr(1)], U256::from(50));
        assert_eq!(state.stakes[&addr(2)], U256::from(100));

        state.cast(vote(0x11, 2, 50));
        assert!(!state.stakes.contains_key(&addr(1)));
    }

    #[test]
    fn test_create_signer_queue_orders_by_stake() {
        let tally = StakeTally;
        let state = tally.genesis(&[vote(0x10, 7, 10), vote(0x11, 8, 30), vote(0x12, 9, 10), vote(0x13, 6, 5)]);
        let snap = snapshot(state);

        let queue = tally.create_signer_queue(&snap).unwrap();
        assert_eq!(queue, vec![addr(8), addr(7), addr(9)]);
        assert!(tally.verify_new_roster(&snap, &queue));
        assert!(!tally.verify_new_roster(&snap, &[addr(7), addr(8), addr(9)]));
    }

    #[test]
    fn test_create_signer_queue_fills_and_falls_back() {
        let tally = StakeTally;

        let single = snapshot(tally.genesis(&[vote(0x10, 7, 10)]));
        assert_eq!(tally.create_signer_queue(&single).unwrap(), vec![addr(7); 3]);

        let empty = snapshot(TallyState::default());
        assert_eq!(tally.create_signer_queue(&empty).unwrap(), empty.signers);
    }

    #[test]
    fn test_in_turn_by_slot() {
        let tally = StakeTally;
        let snap = snapshot(TallyState::default());

        // (25 - 0) / 10 mod 3 = 2
        assert!(tally.in_turn(&snap, addr(3), 25));
        assert!(!tally.in_turn(&snap, addr(2), 25));
    }

    #[test]
    fn test_apply_extra_punishes_missing() {
        let tally = StakeTally;
        let extra = HeaderExtra {
            current_block_votes: vec![vote(0x10, 4, 1)],
            signer_missing: vec![addr(2), addr(3), addr(2)],
            ..Default::default()
        };
        let snap = tally.apply_extra(snapshot(TallyState::default()), &Header::default(), &extra).unwrap();

        assert_eq!(snap.tally.punished[&addr(2)], 2);
        assert_eq!(snap.tally.punished[&addr(3)], 1);
        assert_eq!(snap.tally.stakes[&addr(4)], U256::from(1));
    }
}
