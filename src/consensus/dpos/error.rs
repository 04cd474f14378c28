//! DPoS consensus errors.

use alloy_primitives::Address;
use thiserror::Error;

/// DPoS consensus errors.
///
/// Every variant is a protocol verdict or a hard storage fault; none of them
/// is retried by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DposError {
    /// Unknown block error.
    #[error("unknown block")]
    UnknownBlock,

    /// Block is from the future.
    #[error("block in the future: block time {block_time}, current time {current_time}")]
    FutureBlock { block_time: u64, current_time: u64 },

    /// Missing vanity in extra-data.
    #[error("extra-data 32 byte vanity prefix missing")]
    MissingVanity,

    /// Missing signature in extra-data.
    #[error("extra-data 65 byte signature suffix missing")]
    MissingSignature,

    /// Non-zero mix digest.
    #[error("non-zero mix digest")]
    InvalidMixDigest,

    /// Non-empty uncle hash.
    #[error("non empty uncle hash")]
    InvalidUncleHash,

    /// Unknown ancestor error.
    #[error("unknown ancestor")]
    UnknownAncestor,

    /// Block time is before its parent's.
    #[error("invalid timestamp: parent {parent_time} > block {block_time}")]
    InvalidTimestamp { parent_time: u64, block_time: u64 },

    /// Signer is not allowed to produce this block.
    #[error("unauthorized signer: {signer}")]
    Unauthorized { signer: Address },

    /// Embedded missing-signer list disagrees with the recomputed one.
    #[error("punished missing signer list mismatch")]
    PunishedMissing,

    /// Signer queue differs from the parent's, or is not a legal new roster.
    #[error("invalid signer queue")]
    InvalidSignerQueue,

    /// Same signer produced two blocks inside one period.
    #[error("signer {signer} produced neighbouring blocks within one period")]
    InvalidNeighborSigner { signer: Address },

    /// No roster could be built.
    #[error("signer queue is empty")]
    SignerQueueEmpty,

    /// Zero-period chain refuses to seal an empty block.
    #[error("waiting for transactions")]
    WaitTransactions,

    /// Block carries uncles.
    #[error("uncles not allowed")]
    UnclesNotAllowed,

    /// Extra-data payload cannot be decoded for its height.
    #[error("malformed extra-data at block {number}: {reason}")]
    MalformedExtra { number: u64, reason: String },

    /// Loop start time differs from the one derived from the parent.
    #[error("invalid loop start time: expected {expected}, got {actual}")]
    InvalidLoopStartTime { expected: u64, actual: u64 },

    /// Last signer of the previous loop is absent from the grandparent roster.
    #[error("last loop header {signer} not found in previous roster")]
    LastLoopHeaderFail { signer: Address },

    /// Headers handed to a snapshot fold are not contiguous.
    #[error("invalid voting chain")]
    InvalidVotingChain,

    /// Signature recovery failed.
    #[error("signature recovery failed: {message}")]
    SignatureRecoveryFailed { message: String },

    /// Signing callback failed.
    #[error("signing failed: {message}")]
    SignFailed { message: String },

    /// Durable storage error.
    #[error("database error: {message}")]
    Database { message: String },

    /// Configuration cannot be parsed.
    #[error("invalid dpos config: {message}")]
    InvalidConfig { message: String },

    /// Side chain configured without a cross-chain authority.
    #[error("side chain sealing requires a cross-chain authority")]
    SideChainUnsupported,
}

/// Result type for DPoS operations.
pub type DposResult<T> = Result<T, DposError>;
