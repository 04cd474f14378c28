//! Block header and block types consumed by the DPoS engine.
//!
//! # Extra-data layout
//!
//! ```text
//! extra_data
//! ├── [0..32)            vanity (free-form, producer chosen)
//! ├── [32..len-65)       RLP encoded HeaderExtra payload
//! └── [len-65..len)      secp256k1 recoverable signature [r | s | v]
//! ```

use alloy_primitives::{b256, keccak256, Address, Bytes, B256};
use alloy_rlp::{Encodable, RlpDecodable, RlpEncodable};
use serde::{Deserialize, Serialize};

/// Fixed number of extra-data prefix bytes reserved for signer vanity.
pub const EXTRA_VANITY: usize = 32;

/// Fixed number of extra-data suffix bytes reserved for the signer seal.
pub const EXTRA_SEAL: usize = 65;

/// Keccak256 of the RLP encoding of an empty uncle list.
pub const EMPTY_UNCLE_HASH: B256 =
    b256!("1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347");

/// Block header.
///
/// Immutable once received; only the local sealer writes the trailing
/// signature bytes of `extra_data`.
#[derive(
    Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub parent_hash: B256,
    pub uncle_hash: B256,
    /// Claimed producer of the block.
    pub coinbase: Address,
    pub state_root: B256,
    pub transactions_root: B256,
    pub receipts_root: B256,
    pub difficulty: u64,
    pub number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    /// Unix timestamp in seconds.
    pub time: u64,
    pub extra_data: Bytes,
    pub mix_digest: B256,
    pub nonce: u64,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            parent_hash: B256::ZERO,
            uncle_hash: EMPTY_UNCLE_HASH,
            coinbase: Address::ZERO,
            state_root: B256::ZERO,
            transactions_root: B256::ZERO,
            receipts_root: B256::ZERO,
            difficulty: 1,
            number: 0,
            gas_limit: 0,
            gas_used: 0,
            time: 0,
            extra_data: Bytes::new(),
            mix_digest: B256::ZERO,
            nonce: 0,
        }
    }
}

impl Header {
    /// Keccak256 of the full RLP encoding, signature included.
    pub fn hash(&self) -> B256 {
        let mut buf = Vec::with_capacity(self.length());
        self.encode(&mut buf);
        keccak256(&buf)
    }

    /// Canonical pre-signature encoding: the RLP of the header with the
    /// trailing [`EXTRA_SEAL`] bytes of `extra_data` stripped.
    ///
    /// Headers shorter than the seal encode as if their extra-data were
    /// empty; verification rejects them before recovery anyway.
    pub fn seal_encoding(&self) -> Vec<u8> {
        let mut unsealed = self.clone();
        let keep = self.extra_data.len().saturating_sub(EXTRA_SEAL);
        unsealed.extra_data = self.extra_data.slice(..keep);

        let mut buf = Vec::with_capacity(unsealed.length());
        unsealed.encode(&mut buf);
        buf
    }

    /// Hash signed by the producer.
    pub fn seal_hash(&self) -> B256 {
        keccak256(self.seal_encoding())
    }

    /// The 65 signature bytes at the end of `extra_data`, if present.
    pub fn signature(&self) -> Option<&[u8]> {
        let len = self.extra_data.len();
        (len >= EXTRA_SEAL).then(|| &self.extra_data[len - EXTRA_SEAL..])
    }

    /// The protocol payload between vanity and seal, if the field is long
    /// enough to hold both.
    pub fn extra_payload(&self) -> Option<&[u8]> {
        let len = self.extra_data.len();
        (len >= EXTRA_VANITY + EXTRA_SEAL).then(|| &self.extra_data[EXTRA_VANITY..len - EXTRA_SEAL])
    }

    /// Write `signature` into the seal suffix of `extra_data`.
    ///
    /// Returns `false` without touching the header when there is no room for
    /// a seal.
    pub fn set_signature(&mut self, signature: &[u8; EXTRA_SEAL]) -> bool {
        let len = self.extra_data.len();
        if len < EXTRA_SEAL {
            return false;
        }
        let mut extra = self.extra_data.to_vec();
        extra[len - EXTRA_SEAL..].copy_from_slice(signature);
        self.extra_data = extra.into();
        true
    }
}

/// A block as handed to the sealer: header plus opaque transactions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Bytes>,
    pub uncles: Vec<Header>,
}

impl Block {
    pub fn new(header: Header, transactions: Vec<Bytes>) -> Self {
        Self { header, transactions, uncles: Vec::new() }
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }

    pub fn hash(&self) -> B256 {
        self.header.hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_rlp::Decodable;

    fn header_with_extra(payload: &[u8]) -> Header {
        let mut extra = vec![0u8; EXTRA_VANITY];
        extra.extend_from_slice(payload);
        extra.extend_from_slice(&[0u8; EXTRA_SEAL]);
        Header { number: 7, time: 70, extra_data: extra.into(), ..Default::default() }
    }

    #[test]
    fn test_empty_uncle_hash_constant() {
        // rlp([]) == 0xc0
        assert_eq!(keccak256([0xc0u8]), EMPTY_UNCLE_HASH);
    }

    #[test]
    fn test_seal_hash_ignores_signature() {
        let mut header = header_with_extra(b"payload");
        let before = header.seal_hash();
        let full_before = header.hash();

        assert!(header.set_signature(&[7u8; EXTRA_SEAL]));

        assert_eq!(header.seal_hash(), before);
        assert_ne!(header.hash(), full_before);
        assert_eq!(header.signature().unwrap(), &[7u8; EXTRA_SEAL][..]);
    }

    #[test]
    fn test_extra_payload_slices() {
        let header = header_with_extra(b"abc");
        assert_eq!(header.extra_payload().unwrap(), b"abc");

        let short = Header { extra_data: vec![0u8; EXTRA_VANITY].into(), ..Default::default() };
        assert!(short.extra_payload().is_none());
        assert!(short.signature().is_none());
    }

    #[test]
    fn test_set_signature_without_room() {
        let mut header = Header { extra_data: vec![0u8; 10].into(), ..Default::default() };
        assert!(!header.set_signature(&[1u8; EXTRA_SEAL]));
        assert_eq!(header.extra_data.len(), 10);
    }

    #[test]
    fn test_header_rlp_decodes() {
        let header = header_with_extra(b"xyz");
        let mut buf = Vec::new();
        header.encode(&mut buf);
        let decoded = Header::decode(&mut buf.as_slice()).unwrap();
        assert_eq!(decoded.hash(), header.hash());
    }
}
