//! DPoS Consensus Demo
//!
//! This demo runs 3 signers on a shared in-memory chain:
//! - Round-robin block production over a fixed roster
//! - One deliberately skipped slot, recorded as a missed signer
//! - A fresh verifier re-checking the whole chain as one batch
//!
//! Run with: `RUST_LOG=dpos=debug cargo run --bin dpos_demo`

use alloy_primitives::{Address, Bytes};
use n42_dpos::{
    miner::SignerIdentity, Block, ChainHeaderReader, Dpos, DposConfig, Header, LocalSigner,
    MemoryChain, MemoryDatabase, EXTRA_SEAL, EXTRA_VANITY,
};
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const PERIOD: u64 = 3;
const SIGNERS: u64 = 3;
const BLOCKS: u64 = 10;
const SKIPPED_SLOT: u64 = 5;

/// Simulated signer node
struct SignerNode {
    address: Address,
    engine: Dpos<MemoryDatabase>,
}

impl SignerNode {
    fn new(seed: u8, config: DposConfig) -> eyre::Result<Self> {
        let identity: SignerIdentity = LocalSigner::from_bytes(&[seed; 32])?.into_identity();
        let engine = Dpos::new(config, MemoryDatabase::new_arc());
        engine.authorize(identity.address, identity.signer);
        Ok(Self { address: identity.address, engine })
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let addresses: Vec<Address> = (1..=SIGNERS as u8)
        .map(|seed| LocalSigner::from_bytes(&[seed; 32]).map(|signer| signer.address()))
        .collect::<Result<_, _>>()?;

    // Genesis far enough in the past that every slot is already due
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let genesis_time = now - PERIOD * (BLOCKS + 2);
    let config = DposConfig::new(PERIOD, SIGNERS, addresses.clone());

    let nodes = (1..=SIGNERS as u8)
        .map(|seed| SignerNode::new(seed, config.clone()))
        .collect::<eyre::Result<Vec<_>>>()?;

    let genesis = Header {
        time: genesis_time,
        extra_data: vec![0u8; EXTRA_VANITY + EXTRA_SEAL].into(),
        ..Default::default()
    };
    let chain = Arc::new(MemoryChain::with_genesis(genesis));
    let (results_tx, mut results_rx) = mpsc::channel(1);

    info!(signers = ?addresses, period = PERIOD, "Starting DPoS demo");

    let mut slot = 0;
    for number in 1..=BLOCKS {
        slot += 1;
        if slot == SKIPPED_SLOT {
            slot += 1;
        }

        let parent = chain.current_header().ok_or_else(|| eyre::eyre!("empty chain"))?;
        let time = genesis_time + slot * PERIOD;

        let snap = nodes[0].engine.snapshot(chain.as_ref(), parent.number, parent.hash(), &[])?;
        let producer = snap
            .scheduled_signer(time)
            .and_then(|address| nodes.iter().find(|node| node.address == address))
            .ok_or_else(|| eyre::eyre!("no node scheduled for slot {slot}"))?;

        let mut header =
            Header { number, parent_hash: parent.hash(), time, coinbase: producer.address, ..Default::default() };
        producer.engine.finalize(chain.as_ref(), &mut header, Vec::new(), Bytes::new())?;
        producer.engine.seal(
            chain.as_ref(),
            Block::new(header, Vec::new()),
            results_tx.clone(),
            CancellationToken::new(),
        )?;

        let sealed = results_rx.recv().await.ok_or_else(|| eyre::eyre!("sealer stopped"))?;
        let extra = producer.engine.codec().decode_header(&sealed.header)?;
        if !extra.signer_missing.is_empty() {
            warn!(number, missing = ?extra.signer_missing, "Block records missed slots");
        }
        info!(number, slot, signer = %producer.address, hash = %sealed.hash(), "Produced block");
        chain.insert(sealed.header);
    }

    // A fresh node verifies the produced chain in one batch
    let verifier = Arc::new(Dpos::new(config, MemoryDatabase::new_arc()));
    let headers: Vec<Header> = (1..=BLOCKS).filter_map(|n| chain.get_header_by_number(n)).collect();
    let mut batch = verifier.verify_headers(chain.clone(), headers);

    let mut number = 0;
    while let Some(result) = batch.next().await {
        number += 1;
        match result {
            Ok(()) => info!(number, "Verified header"),
            Err(err) => warn!(number, %err, "Rejected header"),
        }
    }

    Ok(())
}
