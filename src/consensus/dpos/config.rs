//! DPoS engine configuration and per-height protocol policy.

use super::{error::DposError, extra::Vote};
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Default block period in seconds.
pub const DEFAULT_PERIOD: u64 = 3;

/// Default roster size, which is also the epoch length in blocks.
pub const DEFAULT_MAX_SIGNER_COUNT: u64 = 21;

/// DPoS consensus configuration, as found in the genesis chain config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DposConfig {
    /// Number of seconds between blocks.
    pub period: u64,
    /// Roster size; an epoch (loop) spans this many blocks.
    pub max_signer_count: u64,
    /// Overrides the genesis header time as the first loop start.
    pub genesis_timestamp: Option<u64>,
    /// Initial roster, in slot order.
    pub self_vote_signers: Vec<Address>,
    /// Initial vote set folded into the genesis snapshot.
    pub genesis_votes: Vec<Vote>,
    /// Height from which the Trantor missing-signer algorithm applies.
    pub trantor_block: u64,
    /// Height from which the recovered signer must equal the coinbase.
    pub coinbase_check_block: u64,
    /// Height from which extra-data carries the economic payload.
    pub extra_v2_block: u64,
    /// Whether this chain is a side chain.
    pub side_chain: bool,
}

impl Default for DposConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            max_signer_count: DEFAULT_MAX_SIGNER_COUNT,
            genesis_timestamp: None,
            self_vote_signers: Vec::new(),
            genesis_votes: Vec::new(),
            trantor_block: 0,
            coinbase_check_block: 0,
            extra_v2_block: 0,
            side_chain: false,
        }
    }
}

impl DposConfig {
    /// Create a configuration with the given rotation parameters and roster.
    pub fn new(period: u64, max_signer_count: u64, signers: Vec<Address>) -> Self {
        Self { period, max_signer_count, self_vote_signers: signers, ..Default::default() }
    }

    /// Parse a JSON config block.
    pub fn from_json(json: &str) -> Result<Self, DposError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| DposError::InvalidConfig { message: e.to_string() })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), DposError> {
        if self.max_signer_count == 0 || self.self_vote_signers.is_empty() {
            return Err(DposError::SignerQueueEmpty);
        }
        Ok(())
    }

    pub fn with_trantor_block(mut self, number: u64) -> Self {
        self.trantor_block = number;
        self
    }

    pub fn with_coinbase_check_block(mut self, number: u64) -> Self {
        self.coinbase_check_block = number;
        self
    }

    pub fn with_extra_v2_block(mut self, number: u64) -> Self {
        self.extra_v2_block = number;
        self
    }

    pub fn with_genesis_votes(mut self, votes: Vec<Vote>) -> Self {
        self.genesis_votes = votes;
        self
    }

    pub fn with_genesis_timestamp(mut self, time: u64) -> Self {
        self.genesis_timestamp = Some(time);
        self
    }

    pub fn with_side_chain(mut self, side_chain: bool) -> Self {
        self.side_chain = side_chain;
        self
    }

    /// Rotation parameters carried by every snapshot.
    pub fn params(&self) -> RotationParams {
        RotationParams { period: self.period, max_signer_count: self.max_signer_count }
    }
}

/// Rotation parameters a snapshot needs to answer slot questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationParams {
    pub period: u64,
    pub max_signer_count: u64,
}

impl Default for RotationParams {
    fn default() -> Self {
        Self { period: DEFAULT_PERIOD, max_signer_count: DEFAULT_MAX_SIGNER_COUNT }
    }
}

/// Missing-signer algorithm in force at a height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationAlgorithm {
    /// Slot-index arithmetic over the parent roster.
    Legacy,
    /// Linear scan of the doubled parent roster.
    Trantor,
}

/// Extra-data payload schema in force at a height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraSchema {
    /// Rotation fields and votes only.
    V1,
    /// V1 followed by the opaque economic payload.
    V2,
}

impl ExtraSchema {
    pub fn at(extra_v2_block: u64, number: u64) -> Self {
        if number >= extra_v2_block {
            Self::V2
        } else {
            Self::V1
        }
    }
}

/// Protocol rules resolved once for a block height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolPolicy {
    pub rotation: RotationAlgorithm,
    pub extra_schema: ExtraSchema,
    pub require_coinbase_signer: bool,
}

impl ProtocolPolicy {
    /// Resolve the policy for block `number`.
    pub fn at(config: &DposConfig, number: u64) -> Self {
        Self {
            rotation: if number >= config.trantor_block {
                RotationAlgorithm::Trantor
            } else {
                RotationAlgorithm::Legacy
            },
            extra_schema: ExtraSchema::at(config.extra_v2_block, number),
            require_coinbase_signer: number >= config.coinbase_check_block,
        }
    }
}
