//! DPoS snapshot - the authorization state valid right after a given header.

use super::{
    config::RotationParams,
    error::{DposError, DposResult},
    extra::ExtraCodec,
    rotation::RotationGuard,
    tally::{Tally, TallyState},
};
use crate::primitives::Header;
use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Snapshot is the state of the signer rotation at a given point in time.
///
/// Snapshots are never mutated once built: folding headers onto one yields
/// a new value and leaves the source untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Rotation parameters, re-attached from the engine config on load.
    #[serde(skip)]
    pub config: RotationParams,

    /// Block number where the snapshot was created.
    pub number: u64,

    /// Block hash where the snapshot was created.
    pub hash: B256,

    /// Start time of the current loop.
    pub loop_start_time: u64,

    /// Roster of the current loop, in slot order.
    pub signers: Vec<Address>,

    /// Highest block number reported as confirmed.
    pub confirmed_number: u64,

    /// Stake tally state, owned by the [`Tally`] implementation.
    pub tally: TallyState,
}

impl Snapshot {
    /// Create the genesis snapshot.
    ///
    /// The roster is the configured signer list repeated until it fills
    /// `max_signer_count` slots.
    pub fn new(
        config: RotationParams,
        hash: B256,
        loop_start_time: u64,
        signers: &[Address],
        tally: TallyState,
    ) -> DposResult<Self> {
        if signers.is_empty() || config.max_signer_count == 0 {
            return Err(DposError::SignerQueueEmpty);
        }
        let signers =
            signers.iter().cycle().take(config.max_signer_count as usize).copied().collect();

        Ok(Self { config, number: 0, hash, loop_start_time, signers, confirmed_number: 0, tally })
    }

    /// Index into the roster of the slot containing `time`.
    pub fn slot_index(&self, time: u64) -> Option<usize> {
        if self.signers.is_empty() || self.config.period == 0 {
            return None;
        }
        let slot = time.saturating_sub(self.loop_start_time) / self.config.period;
        Some((slot % self.signers.len() as u64) as usize)
    }

    /// The roster member scheduled for the slot containing `time`.
    pub fn scheduled_signer(&self, time: u64) -> Option<Address> {
        self.slot_index(time).map(|index| self.signers[index])
    }

    /// Check if an address is on the current roster.
    pub fn is_signer(&self, address: &Address) -> bool {
        self.signers.contains(address)
    }

    /// Fold `headers` (ascending, starting at `self.number + 1`) onto this
    /// snapshot.
    ///
    /// Loop-closing headers install their roster and loop start time; every
    /// header's payload is then handed to the tally.
    pub fn apply<T: Tally + ?Sized>(
        &self,
        headers: &[Header],
        codec: &ExtraCodec,
        tally: &T,
    ) -> DposResult<Snapshot> {
        if headers.is_empty() {
            return Ok(self.clone());
        }

        // Sanity check that headers can be applied
        for pair in headers.windows(2) {
            if pair[1].number != pair[0].number + 1 {
                return Err(DposError::InvalidVotingChain);
            }
        }
        if headers[0].number != self.number + 1 {
            return Err(DposError::InvalidVotingChain);
        }

        let guard = RotationGuard::new(self.config);
        let mut snap = self.clone();

        for header in headers {
            let extra = codec.decode_header(header)?;

            if guard.is_loop_end(header.number) {
                guard.verify_new_roster(&extra.signer_queue)?;
                snap.signers = extra.signer_queue.clone();
                snap.loop_start_time = extra.loop_start_time;
            }
            snap.confirmed_number = snap.confirmed_number.max(extra.confirmed_block_number);

            snap = tally.apply_extra(snap, header, &extra)?;
            snap.number = header.number;
            snap.hash = header.hash();

            trace!(
                target: "dpos::snapshot",
                number = header.number,
                signer = ?header.coinbase,
                missing = extra.signer_missing.len(),
                "Folded header into snapshot"
            );
        }

        Ok(snap)
    }
}
