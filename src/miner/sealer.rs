//! Block Sealing Module
//!
//! Signs locally produced headers and hands them to the block sink once
//! their slot time arrives.
//!
//! # Flow
//!
//! ```text
//! seal(block)
//!   ├── gate: genesis / empty block on a zero-period chain
//!   ├── read lock: signer identity
//!   │     ├── snapshot(parent) + in-turn check
//!   │     └── sign seal encoding, write [r | s | v] into extra_data
//!   └── spawn: wait(delay) or cancel → try_send(block)
//! ```
//!
//! Delivery is best effort: a full or closed sink drops the block with a
//! warning and sealing for that slot is over.

use crate::{
    consensus::dpos::{unix_now, ChainHeaderReader, Dpos, DposError, DposResult, KeyValueStore, Tally},
    miner::signer::{AccountSigner, SignerIdentity, MIMETYPE_DPOS},
    primitives::Block,
};
use alloy_primitives::Address;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Delay until `header_time`, zero if it has already passed.
pub fn calculate_seal_delay(header_time: u64, now: u64) -> Duration {
    Duration::from_secs(header_time.saturating_sub(now))
}

impl<DB: KeyValueStore, T: Tally> Dpos<DB, T> {
    /// Install the local signing identity, replacing any previous one.
    pub fn authorize(&self, address: Address, signer: Arc<dyn AccountSigner>) {
        *self.signer.write() = Some(SignerIdentity { address, signer });
        info!(target: "dpos::sealer", %address, "Authorized local signer");
    }

    /// Sign `block` and deliver it to `results` once its slot time arrives.
    ///
    /// Errors are returned before any signing happens, except for a
    /// failing signer callback. Cancelling `stop` before the delay elapses
    /// suppresses delivery.
    pub fn seal<C: ChainHeaderReader + ?Sized>(
        &self,
        chain: &C,
        block: Block,
        results: mpsc::Sender<Block>,
        stop: CancellationToken,
    ) -> DposResult<()> {
        let mut header = block.header;
        let number = header.number;

        // Sealing the genesis block is not supported
        if number == 0 {
            return Err(DposError::UnknownBlock);
        }
        // For 0-period chains, refuse to seal empty blocks
        if self.config.period == 0 && block.transactions.is_empty() {
            return Err(DposError::WaitTransactions);
        }

        {
            let identity = self.signer.read();
            let identity = identity.as_ref().ok_or(DposError::SignFailed {
                message: "no local signer authorized".to_string(),
            })?;

            let snap = self.snapshot(chain, number - 1, header.parent_hash, &[])?;
            let in_turn = if self.config.side_chain {
                let authority = self.side_chain.as_ref().ok_or(DposError::SideChainUnsupported)?;
                authority.in_turn(&snap, identity.address, header.time)
            } else {
                self.tally.in_turn(&snap, identity.address, header.time)
            };
            if !in_turn {
                return Err(DposError::Unauthorized { signer: identity.address });
            }

            let signature =
                identity.signer.sign_hash(identity.address, MIMETYPE_DPOS, &header.seal_encoding())?;
            if !header.set_signature(&signature) {
                return Err(DposError::MissingSignature);
            }
        }

        let delay = calculate_seal_delay(header.time, unix_now());
        debug!(target: "dpos::sealer", number, ?delay, "Sealed block, waiting for slot");

        let sealed = Block { header, transactions: block.transactions, uncles: block.uncles };
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = stop.cancelled() => {
                    debug!(target: "dpos::sealer", number, "Seal cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            let hash = sealed.hash();
            match results.try_send(sealed) {
                Ok(()) => info!(target: "dpos::sealer", number, %hash, "Delivered sealed block"),
                Err(TrySendError::Full(_)) => {
                    warn!(target: "dpos::sealer", number, %hash, "Sealing result is not read by miner")
                }
                Err(TrySendError::Closed(_)) => {
                    warn!(target: "dpos::sealer", number, %hash, "Sealing result sink closed")
                }
            }
        });

        Ok(())
    }
}
