//! Extra-data payload codec.
//!
//! The payload sits between the 32 byte vanity and the 65 byte seal and is
//! RLP encoded. Its schema is selected by block height:
//!
//! - [`ExtraSchema::V1`]: votes, loop start, signer queue, missing signers,
//!   confirmed block number
//! - [`ExtraSchema::V2`]: V1 followed by the opaque economic payload

use super::{
    config::{DposConfig, ExtraSchema},
    error::{DposError, DposResult},
};
use crate::primitives::{Header, EXTRA_SEAL, EXTRA_VANITY};
use alloy_primitives::{Address, Bytes, U256};
use alloy_rlp::{Decodable, Encodable, RlpDecodable, RlpEncodable};
use serde::{Deserialize, Serialize};

/// A stake vote cast by `voter` for `candidate`.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, RlpEncodable, RlpDecodable, Serialize, Deserialize,
)]
pub struct Vote {
    pub voter: Address,
    pub candidate: Address,
    pub stake: U256,
}

/// Decoded extra-data payload of a header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderExtra {
    /// Votes carried by this block, consumed by the tally.
    pub current_block_votes: Vec<Vote>,
    /// Start time of the loop this block belongs to.
    pub loop_start_time: u64,
    /// Roster for the current loop, in slot order.
    pub signer_queue: Vec<Address>,
    /// Signers that skipped their slot between the parent and this block.
    pub signer_missing: Vec<Address>,
    pub confirmed_block_number: u64,
    /// Economic sub-fields; stored and hashed, never interpreted.
    pub economic: Bytes,
}

#[derive(RlpEncodable, RlpDecodable)]
struct ExtraV1 {
    votes: Vec<Vote>,
    loop_start_time: u64,
    signer_queue: Vec<Address>,
    signer_missing: Vec<Address>,
    confirmed_block_number: u64,
}

#[derive(RlpEncodable, RlpDecodable)]
struct ExtraV2 {
    votes: Vec<Vote>,
    loop_start_time: u64,
    signer_queue: Vec<Address>,
    signer_missing: Vec<Address>,
    confirmed_block_number: u64,
    economic: Bytes,
}

/// Height-aware encoder / decoder for [`HeaderExtra`].
#[derive(Debug, Clone, Copy)]
pub struct ExtraCodec {
    extra_v2_block: u64,
}

impl ExtraCodec {
    pub fn new(config: &DposConfig) -> Self {
        Self { extra_v2_block: config.extra_v2_block }
    }

    fn schema(&self, number: u64) -> ExtraSchema {
        ExtraSchema::at(self.extra_v2_block, number)
    }

    /// Decode the middle slice of a header's extra-data.
    pub fn decode(&self, raw: &[u8], number: u64) -> DposResult<HeaderExtra> {
        let malformed = |reason: String| DposError::MalformedExtra { number, reason };
        let mut buf = raw;

        let extra = match self.schema(number) {
            ExtraSchema::V1 => {
                let v1 = ExtraV1::decode(&mut buf).map_err(|e| malformed(e.to_string()))?;
                HeaderExtra {
                    current_block_votes: v1.votes,
                    loop_start_time: v1.loop_start_time,
                    signer_queue: v1.signer_queue,
                    signer_missing: v1.signer_missing,
                    confirmed_block_number: v1.confirmed_block_number,
                    economic: Bytes::new(),
                }
            }
            ExtraSchema::V2 => {
                let v2 = ExtraV2::decode(&mut buf).map_err(|e| malformed(e.to_string()))?;
                HeaderExtra {
                    current_block_votes: v2.votes,
                    loop_start_time: v2.loop_start_time,
                    signer_queue: v2.signer_queue,
                    signer_missing: v2.signer_missing,
                    confirmed_block_number: v2.confirmed_block_number,
                    economic: v2.economic,
                }
            }
        };

        if !buf.is_empty() {
            return Err(malformed(format!("{} trailing bytes", buf.len())));
        }
        Ok(extra)
    }

    /// Encode `extra` with the schema of `number`. V1 drops the economic
    /// payload.
    pub fn encode(&self, number: u64, extra: &HeaderExtra) -> Vec<u8> {
        let mut out = Vec::new();
        match self.schema(number) {
            ExtraSchema::V1 => ExtraV1 {
                votes: extra.current_block_votes.clone(),
                loop_start_time: extra.loop_start_time,
                signer_queue: extra.signer_queue.clone(),
                signer_missing: extra.signer_missing.clone(),
                confirmed_block_number: extra.confirmed_block_number,
            }
            .encode(&mut out),
            ExtraSchema::V2 => ExtraV2 {
                votes: extra.current_block_votes.clone(),
                loop_start_time: extra.loop_start_time,
                signer_queue: extra.signer_queue.clone(),
                signer_missing: extra.signer_missing.clone(),
                confirmed_block_number: extra.confirmed_block_number,
                economic: extra.economic.clone(),
            }
            .encode(&mut out),
        }
        out
    }

    /// Check the vanity / seal framing and decode a header's payload.
    pub fn decode_header(&self, header: &Header) -> DposResult<HeaderExtra> {
        check_extra_framing(header)?;
        let payload = header.extra_payload().ok_or(DposError::MissingSignature)?;
        self.decode(payload, header.number)
    }

    /// Build a full extra-data field: vanity, encoded payload and a zeroed
    /// seal for the sealer to fill in.
    pub fn assemble(&self, vanity: &[u8], number: u64, extra: &HeaderExtra) -> Bytes {
        let mut out = vec![0u8; EXTRA_VANITY];
        let n = vanity.len().min(EXTRA_VANITY);
        out[..n].copy_from_slice(&vanity[..n]);
        out.extend_from_slice(&self.encode(number, extra));
        out.extend_from_slice(&[0u8; EXTRA_SEAL]);
        out.into()
    }
}

/// Vanity and seal length checks shared by the codec and the validator.
pub fn check_extra_framing(header: &Header) -> DposResult<()> {
    if header.extra_data.len() < EXTRA_VANITY {
        return Err(DposError::MissingVanity);
    }
    if header.extra_data.len() < EXTRA_VANITY + EXTRA_SEAL {
        return Err(DposError::MissingSignature);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_extra() -> HeaderExtra {
        HeaderExtra {
            current_block_votes: vec![Vote {
                voter: Address::repeat_byte(0x11),
                candidate: Address::repeat_byte(0x22),
                stake: U256::from(1_000u64),
            }],
            loop_start_time: 1_700_000_000,
            signer_queue: vec![
                Address::repeat_byte(1),
                Address::repeat_byte(2),
                Address::repeat_byte(3),
            ],
            signer_missing: vec![Address::repeat_byte(2)],
            confirmed_block_number: 12,
            economic: Bytes::from_static(b"reward-records"),
        }
    }

    fn codec(v2_from: u64) -> ExtraCodec {
        ExtraCodec::new(&DposConfig::default().with_extra_v2_block(v2_from))
    }

    #[test]
    fn test_decode_inverts_encode_per_schema() {
        let codec = codec(100);
        let extra = sample_extra();

        let v2 = codec.encode(100, &extra);
        assert_eq!(codec.decode(&v2, 100).unwrap(), extra);

        let v1 = codec.encode(99, &extra);
        let decoded = codec.decode(&v1, 99).unwrap();
        assert!(decoded.economic.is_empty());
        assert_eq!(decoded.signer_queue, extra.signer_queue);
        assert_eq!(decoded.signer_missing, extra.signer_missing);
    }

    #[test]
    fn test_height_selects_schema() {
        let codec = codec(100);
        let extra = sample_extra();

        // A V2 payload is not a valid V1 payload and vice versa.
        let v2 = codec.encode(100, &extra);
        assert!(matches!(codec.decode(&v2, 50), Err(DposError::MalformedExtra { number: 50, .. })));

        let v1 = codec.encode(50, &extra);
        assert!(matches!(codec.decode(&v1, 100), Err(DposError::MalformedExtra { .. })));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let codec = codec(0);
        assert!(matches!(codec.decode(&[0xff, 0x00, 0x01], 5), Err(DposError::MalformedExtra { .. })));
        assert!(matches!(codec.decode(&[], 5), Err(DposError::MalformedExtra { .. })));

        let mut trailing = codec.encode(5, &sample_extra());
        trailing.push(0x80);
        assert!(matches!(codec.decode(&trailing, 5), Err(DposError::MalformedExtra { .. })));
    }

    #[test]
    fn test_decode_header_checks_framing() {
        let codec = codec(0);
        let extra = sample_extra();

        let mut header = Header { number: 3, ..Default::default() };
        header.extra_data = vec![0u8; EXTRA_VANITY - 1].into();
        assert_eq!(codec.decode_header(&header), Err(DposError::MissingVanity));

        header.extra_data = vec![0u8; EXTRA_VANITY + EXTRA_SEAL - 1].into();
        assert_eq!(codec.decode_header(&header), Err(DposError::MissingSignature));

        header.extra_data = codec.assemble(b"n42", 3, &extra);
        assert_eq!(&header.extra_data[..3], b"n42");
        assert_eq!(codec.decode_header(&header).unwrap(), extra);
    }
}
