//! N42 delegated proof-of-stake engine.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Dpos engine                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  verify_header / verify_headers          seal / finalize     │
//! │           │                                   │              │
//! │           ▼                                   ▼              │
//! │  ┌─────────────────┐   snapshot()    ┌─────────────────┐     │
//! │  │ HeaderValidator │ ──────────────▶ │  SnapshotStore  │     │
//! │  └────────┬────────┘                 │  LRU → DB → walk│     │
//! │           │                          └────────┬────────┘     │
//! │           ▼                                   ▼              │
//! │  ┌─────────────────┐                 ┌─────────────────┐     │
//! │  │  RotationGuard  │                 │      Tally      │     │
//! │  │ roster, missing │                 │ election, turns │     │
//! │  └─────────────────┘                 └─────────────────┘     │
//! │                                                              │
//! │  ExtraCodec: vanity | RLP payload | seal                     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`primitives`]: Header and block types
//! - [`consensus`]: The DPoS engine, snapshots and rotation rules
//! - [`miner`]: Local signing identity and the block sealer

#![warn(unused_crate_dependencies)]
// Dependencies used by binaries
use eyre as _;
use tracing_subscriber as _;

pub mod consensus;
pub mod miner;
pub mod primitives;

// Re-export DPoS engine types
pub use consensus::dpos::{
    BatchVerification, ChainHeaderReader, Dpos, DposConfig, DposError, DposResult, HeaderExtra,
    KeyValueStore, MemoryChain, MemoryDatabase, Snapshot, StakeTally, Tally, Vote,
};

// Re-export miner types
pub use miner::{calculate_seal_delay, AccountSigner, LocalSigner};

// Re-export primitives
pub use primitives::{Block, Header, EXTRA_SEAL, EXTRA_VANITY};
