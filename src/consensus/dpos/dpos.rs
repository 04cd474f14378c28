//! Delegated proof-of-stake consensus engine implementation.

use super::{
    cache::{LruSnapshotCache, SnapshotCache},
    chain::ChainHeaderReader,
    config::{DposConfig, ProtocolPolicy, RotationAlgorithm},
    database::{KeyValueStore, SnapshotDatabase},
    error::{DposError, DposResult},
    extra::{check_extra_framing, ExtraCodec, HeaderExtra, Vote},
    rotation::{MissingContext, RotationGuard},
    snapshot::Snapshot,
    tally::{StakeTally, Tally},
    CHECKPOINT_INTERVAL, INMEMORY_SIGNATURES, INMEMORY_SNAPSHOTS,
};
use crate::{
    miner::{public_key_address, SignerIdentity},
    primitives::{Block, Header, EMPTY_UNCLE_HASH, EXTRA_VANITY},
};
use alloy_primitives::{Address, Bytes, B256};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    Message, Secp256k1,
};
use std::{
    num::NonZeroUsize,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Seal checks for side chains, owned by the cross-chain module.
pub trait SideChainAuthority: Send + Sync {
    /// Verify the seal of a side-chain header signed by `signer`.
    fn verify_seal(&self, snap: &Snapshot, header: &Header, signer: Address) -> DposResult<()>;

    /// Whether `signer` may seal a side-chain block at `time`.
    fn in_turn(&self, snap: &Snapshot, signer: Address, time: u64) -> bool;
}

/// Delegated proof-of-stake consensus engine.
pub struct Dpos<DB: KeyValueStore, T: Tally = StakeTally> {
    /// Consensus engine configuration.
    pub(crate) config: DposConfig,

    /// Extra-data codec for the configured schema heights.
    pub(crate) codec: ExtraCodec,

    /// Roster and missed-slot checks.
    guard: RotationGuard,

    /// Database to store and retrieve snapshot checkpoints.
    db: Arc<DB>,

    /// Roster election collaborator.
    pub(crate) tally: T,

    /// Snapshots for recent blocks to speed up reorgs.
    recents: Box<dyn SnapshotCache>,

    /// Signers of recent blocks keyed by header hash.
    signatures: Mutex<LruCache<B256, Address>>,

    /// Local signing identity, replaced by `authorize`.
    pub(crate) signer: RwLock<Option<SignerIdentity>>,

    /// Cross-chain seal checks, required when running as a side chain.
    pub(crate) side_chain: Option<Arc<dyn SideChainAuthority>>,

    /// Blocks between persisted snapshots.
    checkpoint_interval: u64,

    secp: Secp256k1<secp256k1::VerifyOnly>,
}

impl<DB: KeyValueStore> Dpos<DB, StakeTally> {
    /// Create an engine with the reference stake tally.
    pub fn new(config: DposConfig, db: Arc<DB>) -> Self {
        Self::with_tally(config, db, StakeTally)
    }
}

impl<DB: KeyValueStore, T: Tally> Dpos<DB, T> {
    /// Create an engine with a custom tally.
    pub fn with_tally(config: DposConfig, db: Arc<DB>, tally: T) -> Self {
        let signatures = NonZeroUsize::new(INMEMORY_SIGNATURES).unwrap_or(NonZeroUsize::MIN);
        Self {
            codec: ExtraCodec::new(&config),
            guard: RotationGuard::new(config.params()),
            config,
            db,
            tally,
            recents: Box::new(LruSnapshotCache::new(INMEMORY_SNAPSHOTS)),
            signatures: Mutex::new(LruCache::new(signatures)),
            signer: RwLock::new(None),
            side_chain: None,
            checkpoint_interval: CHECKPOINT_INTERVAL,
            secp: Secp256k1::verification_only(),
        }
    }

    /// Replace the snapshot cache.
    pub fn with_cache(mut self, cache: Box<dyn SnapshotCache>) -> Self {
        self.recents = cache;
        self
    }

    /// Install the cross-chain seal authority used on side chains.
    pub fn with_side_chain_authority(mut self, authority: Arc<dyn SideChainAuthority>) -> Self {
        self.side_chain = Some(authority);
        self
    }

    /// Persist snapshots every `interval` blocks instead of the default.
    pub fn with_checkpoint_interval(mut self, interval: u64) -> Self {
        self.checkpoint_interval = interval.max(1);
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &DposConfig {
        &self.config
    }

    /// Get the extra-data codec.
    pub fn codec(&self) -> &ExtraCodec {
        &self.codec
    }

    /// Get the tally collaborator.
    pub fn tally(&self) -> &T {
        &self.tally
    }

    /// Get the current local signer address.
    pub fn signer(&self) -> Option<Address> {
        self.signer.read().as_ref().map(|identity| identity.address)
    }

    /// Extract the signer address from a sealed header.
    pub fn ecrecover(&self, header: &Header) -> DposResult<Address> {
        let hash = header.hash();

        if let Some(address) = self.signatures.lock().get(&hash) {
            return Ok(*address);
        }

        let signature = header.signature().ok_or(DposError::MissingSignature)?;
        let address = self.recover_address(&header.seal_hash(), signature)?;

        self.signatures.lock().put(hash, address);
        Ok(address)
    }

    /// Address of the block producer.
    pub fn author(&self, header: &Header) -> DposResult<Address> {
        self.ecrecover(header)
    }

    fn recover_address(&self, hash: &B256, signature: &[u8]) -> DposResult<Address> {
        let recovery_failed = |message: String| DposError::SignatureRecoveryFailed { message };

        // Accept both 0/1 and 27/28 recovery ids
        let v = signature[64];
        let recovery_id = RecoveryId::try_from(i32::from(if v >= 27 { v - 27 } else { v }))
            .map_err(|e| recovery_failed(format!("invalid recovery id {v}: {e}")))?;
        let sig = RecoverableSignature::from_compact(&signature[..64], recovery_id)
            .map_err(|e| recovery_failed(e.to_string()))?;

        let message = Message::from_digest(hash.0);
        let pubkey =
            self.secp.recover_ecdsa(&message, &sig).map_err(|e| recovery_failed(e.to_string()))?;

        Ok(public_key_address(&pubkey))
    }

    /// Retrieve the snapshot valid right after block `(number, hash)`.
    ///
    /// `parents` are headers not yet committed to the chain, in ascending
    /// order; they are preferred over the chain when walking back.
    pub fn snapshot<C: ChainHeaderReader + ?Sized>(
        &self,
        chain: &C,
        number: u64,
        hash: B256,
        parents: &[Header],
    ) -> DposResult<Arc<Snapshot>> {
        let mut headers: Vec<Header> = Vec::new();
        let mut current_number = number;
        let mut current_hash = hash;

        let base = loop {
            // Check in-memory cache
            if let Some(snap) = self.recents.get(&current_hash) {
                break snap;
            }

            // Check on-disk checkpoint
            if current_number % self.checkpoint_interval == 0 {
                if let Some(snap) = self.db.load_snapshot(self.config.params(), current_hash)? {
                    debug!(target: "dpos::snapshot", number = current_number, hash = ?current_hash, "Loaded snapshot from disk");
                    let snap = Arc::new(snap);
                    self.recents.insert(snap.clone());
                    break snap;
                }
            }

            // At genesis, build the snapshot from the configured signers
            if current_number == 0 {
                let genesis = chain
                    .get_header_by_number(0)
                    .filter(|genesis| genesis.hash() == current_hash)
                    .ok_or(DposError::UnknownAncestor)?;
                self.verify_header_inner(chain, &genesis, &[], false)?;

                let snap = Arc::new(self.genesis_snapshot(&genesis)?);
                self.db.store_snapshot(&snap)?;
                info!(target: "dpos::snapshot", hash = ?snap.hash, signers = snap.signers.len(), "Stored genesis snapshot");
                self.recents.insert(snap.clone());
                break snap;
            }

            // No snapshot found, gather header and move backward
            let header = find_header(chain, parents, current_hash, current_number)
                .ok_or(DposError::UnknownAncestor)?;
            current_hash = header.parent_hash;
            current_number -= 1;
            headers.push(header);
        };

        if headers.is_empty() {
            return Ok(base);
        }

        // Apply headers in ascending order
        headers.reverse();
        let snap = Arc::new(base.apply(&headers, &self.codec, &self.tally)?);
        self.recents.insert(snap.clone());

        if snap.number % self.checkpoint_interval == 0 {
            self.db.store_snapshot(&snap)?;
            info!(target: "dpos::snapshot", number = snap.number, hash = ?snap.hash, "Stored snapshot to disk");
        }

        Ok(snap)
    }

    fn genesis_snapshot(&self, genesis: &Header) -> DposResult<Snapshot> {
        let loop_start = self.config.genesis_timestamp.unwrap_or(genesis.time);
        Snapshot::new(
            self.config.params(),
            genesis.hash(),
            loop_start,
            &self.config.self_vote_signers,
            self.tally.genesis(&self.config.genesis_votes),
        )
    }

    /// Decoded payload of `header`; genesis carries none, so its roster and
    /// loop start come from the genesis snapshot.
    fn header_extra<C: ChainHeaderReader + ?Sized>(
        &self,
        chain: &C,
        header: &Header,
        parents: &[Header],
    ) -> DposResult<HeaderExtra> {
        if header.number == 0 {
            let snap = self.snapshot(chain, 0, header.hash(), parents)?;
            return Ok(HeaderExtra {
                loop_start_time: snap.loop_start_time,
                signer_queue: snap.signers.clone(),
                ..Default::default()
            });
        }
        self.codec.decode_header(header)
    }

    /// Verify a header conforms to consensus rules.
    pub fn verify_header<C: ChainHeaderReader + ?Sized>(
        &self,
        chain: &C,
        header: &Header,
        parents: &[Header],
    ) -> DposResult<()> {
        self.verify_header_inner(chain, header, parents, true)
    }

    fn verify_header_inner<C: ChainHeaderReader + ?Sized>(
        &self,
        chain: &C,
        header: &Header,
        parents: &[Header],
        seal: bool,
    ) -> DposResult<()> {
        // Don't waste time checking blocks from the future
        let now = unix_now();
        if header.time > now {
            return Err(DposError::FutureBlock { block_time: header.time, current_time: now });
        }

        check_extra_framing(header)?;

        if header.mix_digest != B256::ZERO {
            return Err(DposError::InvalidMixDigest);
        }
        if header.uncle_hash != EMPTY_UNCLE_HASH {
            return Err(DposError::InvalidUncleHash);
        }

        self.verify_cascading_fields(chain, header, parents, seal)
    }

    /// Verify fields that depend on the parent and the snapshot.
    fn verify_cascading_fields<C: ChainHeaderReader + ?Sized>(
        &self,
        chain: &C,
        header: &Header,
        parents: &[Header],
        seal: bool,
    ) -> DposResult<()> {
        let number = header.number;

        // Genesis block is always valid
        if number == 0 {
            return Ok(());
        }

        let parent = match parents.last() {
            Some(parent) => Some(parent.clone()),
            None => chain.get_header(header.parent_hash, number - 1),
        }
        .filter(|parent| parent.number == number - 1 && parent.hash() == header.parent_hash)
        .ok_or(DposError::UnknownAncestor)?;

        if parent.time > header.time {
            return Err(DposError::InvalidTimestamp { parent_time: parent.time, block_time: header.time });
        }

        let snap = self.snapshot(chain, number - 1, header.parent_hash, parents)?;

        if !seal {
            return Ok(());
        }
        self.verify_seal(chain, &snap, header, &parent, parents)
    }

    /// Verify the signature and rotation fields of a header.
    ///
    /// Every header must carry the loop start time derived from its parent.
    /// Roster succession and the missed-slot list are only checked past the
    /// first loop, so the first loop-end header (`number == max_signer_count`)
    /// passes with the structural roster check run by the snapshot fold, and
    /// its `signer_missing` reaches the tally unchecked.
    fn verify_seal<C: ChainHeaderReader + ?Sized>(
        &self,
        chain: &C,
        snap: &Snapshot,
        header: &Header,
        parent: &Header,
        parents: &[Header],
    ) -> DposResult<()> {
        let number = header.number;

        let signer = self.ecrecover(header)?;
        let policy = ProtocolPolicy::at(&self.config, number);

        if policy.require_coinbase_signer && signer != header.coinbase {
            return Err(DposError::Unauthorized { signer });
        }

        if self.config.side_chain {
            let authority = self.side_chain.as_ref().ok_or(DposError::SideChainUnsupported)?;
            return authority.verify_seal(snap, header, signer);
        }

        let parent_extra = self.header_extra(chain, parent, parents)?;
        let current_extra = self.codec.decode_header(header)?;
        self.guard.verify_loop_start(
            number,
            parent_extra.loop_start_time,
            current_extra.loop_start_time,
        )?;

        if number > self.config.max_signer_count {
            if self.guard.is_loop_end(number) {
                self.guard.verify_new_roster(&current_extra.signer_queue)?;
                if !self.tally.verify_new_roster(snap, &current_extra.signer_queue) {
                    return Err(DposError::InvalidSignerQueue);
                }
            } else {
                self.guard
                    .verify_unchanged_roster(&parent_extra.signer_queue, &current_extra.signer_queue)?;
                if signer == parent.coinbase && header.time - parent.time < self.config.period {
                    return Err(DposError::InvalidNeighborSigner { signer });
                }
            }

            let grand_parent_queue = self.grand_parent_queue(chain, &policy, header, parent, parents)?;
            let expected = self.guard.compute_missing(
                &policy,
                &MissingContext {
                    header,
                    parent,
                    parent_extra: &parent_extra,
                    grand_parent_queue: grand_parent_queue.as_deref(),
                },
            )?;
            self.guard.verify_missing(&expected, &current_extra.signer_missing)?;
        }

        if !self.tally.in_turn(snap, signer, header.time) {
            return Err(DposError::Unauthorized { signer });
        }
        Ok(())
    }

    /// Roster of the grandparent, needed by Trantor on the first slot of a
    /// loop.
    fn grand_parent_queue<C: ChainHeaderReader + ?Sized>(
        &self,
        chain: &C,
        policy: &ProtocolPolicy,
        header: &Header,
        parent: &Header,
        parents: &[Header],
    ) -> DposResult<Option<Vec<Address>>> {
        if policy.rotation != RotationAlgorithm::Trantor
            || !self.guard.is_loop_start(header.number)
        {
            return Ok(None);
        }
        let number = parent.number.checked_sub(1).ok_or(DposError::UnknownAncestor)?;
        let grand_parent =
            find_header(chain, parents, parent.parent_hash, number).ok_or(DposError::UnknownAncestor)?;
        Ok(Some(self.header_extra(chain, &grand_parent, parents)?.signer_queue))
    }

    /// Verify a batch of headers in order on a background task.
    ///
    /// Each header may use the headers before it as in-flight parents.
    /// Results stream back in input order; dropping the returned handle or
    /// calling [`BatchVerification::abort`] stops the task before its next
    /// send.
    pub fn verify_headers<C>(self: &Arc<Self>, chain: Arc<C>, headers: Vec<Header>) -> BatchVerification
    where
        C: ChainHeaderReader + 'static,
        DB: 'static,
        T: 'static,
    {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(headers.len().max(1));

        let engine = Arc::clone(self);
        let token = cancel.clone();
        tokio::task::spawn_blocking(move || {
            for (index, header) in headers.iter().enumerate() {
                let result = engine.verify_header(chain.as_ref(), header, &headers[..index]);
                if let Err(err) = &result {
                    debug!(target: "dpos::verify", number = header.number, %err, "Rejected header");
                }
                if token.is_cancelled() || tx.blocking_send(result).is_err() {
                    return;
                }
            }
        });

        BatchVerification { cancel, results: rx }
    }

    /// Blocks with uncles are never valid.
    pub fn verify_uncles(&self, block: &Block) -> DposResult<()> {
        if !block.uncles.is_empty() {
            return Err(DposError::UnclesNotAllowed);
        }
        Ok(())
    }

    /// Build the extra-data payload for a new header on top of its parent.
    ///
    /// `header.number`, `parent_hash`, `time` and `coinbase` must be set.
    /// Runs the same rotation functions verifiers run, so the embedded
    /// missed-slot list is reproducible.
    pub fn prepare_extra<C: ChainHeaderReader + ?Sized>(
        &self,
        chain: &C,
        header: &Header,
    ) -> DposResult<HeaderExtra> {
        let number = header.number;
        if number == 0 {
            return Err(DposError::UnknownBlock);
        }

        let parent =
            chain.get_header(header.parent_hash, number - 1).ok_or(DposError::UnknownAncestor)?;
        let snap = self.snapshot(chain, number - 1, header.parent_hash, &[])?;
        let parent_extra = self.header_extra(chain, &parent, &[])?;
        let policy = ProtocolPolicy::at(&self.config, number);

        let mut extra = HeaderExtra {
            loop_start_time: self.guard.expected_loop_start(number, parent_extra.loop_start_time),
            signer_queue: parent_extra.signer_queue.clone(),
            confirmed_block_number: parent_extra.confirmed_block_number,
            ..Default::default()
        };

        if number > self.config.max_signer_count {
            let grand_parent_queue = self.grand_parent_queue(chain, &policy, header, &parent, &[])?;
            extra.signer_missing = self.guard.compute_missing(
                &policy,
                &MissingContext {
                    header,
                    parent: &parent,
                    parent_extra: &parent_extra,
                    grand_parent_queue: grand_parent_queue.as_deref(),
                },
            )?;
        }

        if self.guard.is_loop_end(number) {
            extra.signer_queue = self.tally.create_signer_queue(&snap)?;
        }

        Ok(extra)
    }

    /// Fill in the consensus fields of a header about to be sealed.
    ///
    /// Keeps the first [`EXTRA_VANITY`] bytes already present in
    /// `extra_data` and leaves a zeroed seal for [`Dpos::seal`].
    pub fn finalize<C: ChainHeaderReader + ?Sized>(
        &self,
        chain: &C,
        header: &mut Header,
        votes: Vec<Vote>,
        economic: Bytes,
    ) -> DposResult<()> {
        let mut extra = self.prepare_extra(chain, header)?;
        extra.current_block_votes = votes;
        extra.economic = economic;

        let vanity = &header.extra_data[..header.extra_data.len().min(EXTRA_VANITY)];
        header.extra_data = self.codec.assemble(vanity, header.number, &extra);
        header.mix_digest = B256::ZERO;
        header.uncle_hash = EMPTY_UNCLE_HASH;
        Ok(())
    }
}

/// Handle to a running batch verification.
#[derive(Debug)]
pub struct BatchVerification {
    cancel: CancellationToken,
    results: mpsc::Receiver<DposResult<()>>,
}

impl BatchVerification {
    /// Next result, in input order. `None` once the batch is done or aborted.
    pub async fn next(&mut self) -> Option<DposResult<()>> {
        self.results.recv().await
    }

    /// Stop verifying; results already sent stay readable.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    /// Token observed by the verification task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for BatchVerification {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Look up a header among in-flight parents first, then on the chain.
fn find_header<C: ChainHeaderReader + ?Sized>(
    chain: &C,
    parents: &[Header],
    hash: B256,
    number: u64,
) -> Option<Header> {
    parents
        .iter()
        .rev()
        .find(|header| header.number == number && header.hash() == hash)
        .cloned()
        .or_else(|| chain.get_header(hash, number))
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        consensus::dpos::{MemoryChain, MemoryDatabase},
        miner::{AccountSigner, LocalSigner, MIMETYPE_DPOS},
        primitives::EXTRA_SEAL,
    };

    struct RejectAll;

    impl SideChainAuthority for RejectAll {
        fn verify_seal(&self, _snap: &Snapshot, _header: &Header, signer: Address) -> DposResult<()> {
            Err(DposError::Unauthorized { signer })
        }

        fn in_turn(&self, _snap: &Snapshot, _signer: Address, _time: u64) -> bool {
            false
        }
    }

    fn genesis() -> Header {
        Header { extra_data: vec![0u8; EXTRA_VANITY + EXTRA_SEAL].into(), ..Default::default() }
    }

    fn setup(config: impl FnOnce(DposConfig) -> DposConfig) -> (Dpos<MemoryDatabase>, MemoryChain, LocalSigner) {
        let signer = LocalSigner::from_bytes(&[0x07; 32]).unwrap();
        let config = config(DposConfig::new(5, 2, vec![signer.address()]));
        let engine = Dpos::new(config, MemoryDatabase::new_arc());
        (engine, MemoryChain::with_genesis(genesis()), signer)
    }

    fn signed_child(engine: &Dpos<MemoryDatabase>, chain: &MemoryChain, signer: &LocalSigner) -> Header {
        let mut header = Header {
            number: 1,
            parent_hash: genesis().hash(),
            time: 5,
            coinbase: signer.address(),
            ..Default::default()
        };
        engine.finalize(chain, &mut header, Vec::new(), Bytes::new()).unwrap();
        let signature = signer.sign_hash(signer.address(), MIMETYPE_DPOS, &header.seal_encoding()).unwrap();
        assert!(header.set_signature(&signature));
        header
    }

    #[test]
    fn test_ecrecover_accepts_legacy_recovery_id() {
        let (engine, chain, signer) = setup(|config| config);
        let mut header = signed_child(&engine, &chain, &signer);
        assert_eq!(engine.ecrecover(&header).unwrap(), signer.address());

        let mut signature = [0u8; EXTRA_SEAL];
        signature.copy_from_slice(header.signature().unwrap());
        signature[64] += 27;
        assert!(header.set_signature(&signature));

        assert_eq!(engine.ecrecover(&header).unwrap(), signer.address());
        assert_eq!(engine.author(&header).unwrap(), signer.address());
    }

    #[test]
    fn test_ecrecover_rejects_bad_recovery_id() {
        let (engine, chain, signer) = setup(|config| config);
        let mut header = signed_child(&engine, &chain, &signer);
        let mut signature = [0u8; EXTRA_SEAL];
        signature.copy_from_slice(header.signature().unwrap());
        signature[64] = 9;
        assert!(header.set_signature(&signature));

        assert!(matches!(engine.ecrecover(&header), Err(DposError::SignatureRecoveryFailed { .. })));
    }

    #[test]
    fn test_genesis_snapshot_is_persisted() {
        let db = MemoryDatabase::new_arc();
        let (_, chain, signer) = setup(|config| config);
        let config = DposConfig::new(5, 2, vec![signer.address()]).with_genesis_timestamp(3);
        let engine = Dpos::new(config, db.clone());

        let snap = engine.snapshot(&chain, 0, genesis().hash(), &[]).unwrap();

        assert_eq!(snap.signers, vec![signer.address(), signer.address()]);
        assert_eq!(snap.loop_start_time, 3);
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn test_side_chain_requires_authority() {
        let (producer, chain, signer) = setup(|config| config);
        let header = signed_child(&producer, &chain, &signer);

        let (engine, _, _) = setup(|config| config.with_side_chain(true));
        assert_eq!(engine.verify_header(&chain, &header, &[]), Err(DposError::SideChainUnsupported));

        let engine = engine.with_side_chain_authority(Arc::new(RejectAll));
        assert_eq!(
            engine.verify_header(&chain, &header, &[]),
            Err(DposError::Unauthorized { signer: signer.address() })
        );
    }

    #[test]
    fn test_coinbase_check_is_height_gated() {
        let (producer, chain, signer) = setup(|config| config);
        let mut header = signed_child(&producer, &chain, &signer);
        // re-sign a copy claiming another coinbase
        header.coinbase = Address::repeat_byte(0x99);
        let signature = signer.sign_hash(signer.address(), MIMETYPE_DPOS, &header.seal_encoding()).unwrap();
        assert!(header.set_signature(&signature));

        let (strict, _, _) = setup(|config| config);
        assert!(matches!(strict.verify_header(&chain, &header, &[]), Err(DposError::Unauthorized { .. })));

        let (lenient, _, _) = setup(|config| config.with_coinbase_check_block(100));
        lenient.verify_header(&chain, &header, &[]).unwrap();
    }

    #[test]
    fn test_prepare_extra_at_loop_end() {
        let (engine, chain, signer) = setup(|config| config);
        let first = signed_child(&engine, &chain, &signer);
        chain.insert(first.clone());

        let header = Header {
            number: 2,
            parent_hash: first.hash(),
            time: 10,
            coinbase: signer.address(),
            ..Default::default()
        };
        let extra = engine.prepare_extra(&chain, &header).unwrap();

        assert_eq!(extra.loop_start_time, 10);
        assert_eq!(extra.signer_queue, vec![signer.address(), signer.address()]);
        assert!(extra.signer_missing.is_empty());
    }

    #[test]
    fn test_genesis_header_is_valid() {
        let (engine, chain, _) = setup(|config| config);
        engine.verify_header(&chain, &genesis(), &[]).unwrap();
    }

    #[test]
    fn test_prepare_extra_rejects_genesis() {
        let (engine, chain, _) = setup(|config| config);
        assert_eq!(engine.prepare_extra(&chain, &genesis()), Err(DposError::UnknownBlock));
    }
}
