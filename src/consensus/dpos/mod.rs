//! Delegated proof-of-stake consensus engine.
//!
//! Headers are authorized against a rotating signer roster. Each loop
//! (epoch) spans `max_signer_count` blocks; the loop-closing header carries
//! the roster elected for the next loop, and every header after the first
//! loop lists the signers that skipped their slot since its parent.
//!
//! Database and chain access are abstracted via traits to allow memory-based
//! testing.

mod cache;
mod chain;
mod config;
mod database;
mod dpos;
mod error;
mod extra;
mod rotation;
mod snapshot;
mod tally;

pub use cache::{LruSnapshotCache, SnapshotCache};
pub use chain::{ChainHeaderReader, MemoryChain};
pub use config::{
    DposConfig, ExtraSchema, ProtocolPolicy, RotationAlgorithm, RotationParams,
    DEFAULT_MAX_SIGNER_COUNT, DEFAULT_PERIOD,
};
pub use database::{KeyValueStore, MemoryDatabase, SnapshotDatabase, DPOS_SNAPSHOT_PREFIX};
pub use dpos::{BatchVerification, Dpos, SideChainAuthority};
pub use error::{DposError, DposResult};
pub use extra::{check_extra_framing, ExtraCodec, HeaderExtra, Vote};
pub use rotation::{
    compute_missing_legacy, compute_missing_trantor, MissingContext, RotationGuard,
};
pub use snapshot::Snapshot;
pub use tally::{StakeTally, Tally, TallyState};

pub(crate) use dpos::unix_now;

/// Number of blocks after which to save the snapshot to the database.
pub const CHECKPOINT_INTERVAL: u64 = 360;

/// Number of recent snapshots to keep in memory.
pub const INMEMORY_SNAPSHOTS: usize = 128;

/// Number of recent block signatures to keep in memory.
pub const INMEMORY_SIGNATURES: usize = 4096;
