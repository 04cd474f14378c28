//! Local signing identity.
//!
//! The engine never touches key material directly: it hands bytes to an
//! [`AccountSigner`] and gets a 65 byte `[r | s | v]` signature back.

use crate::consensus::dpos::{DposError, DposResult};
use alloy_primitives::{keccak256, Address, Bytes};
use secp256k1::{ecdsa::RecoverableSignature, Message, PublicKey, Secp256k1, SecretKey};
use std::{fmt, sync::Arc};

/// Mime type passed to the signer when sealing a header.
pub const MIMETYPE_DPOS: &str = "application/x-dpos-header";

/// Signing callbacks for a local account.
pub trait AccountSigner: Send + Sync {
    /// Sign `data` (hashed with keccak256 by the signer) on behalf of
    /// `account`.
    fn sign_hash(&self, account: Address, mime_type: &str, data: &[u8]) -> DposResult<[u8; 65]>;

    /// Sign a raw transaction payload, used by cross-chain confirmations.
    fn sign_transaction(&self, account: Address, tx: &[u8], chain_id: u64) -> DposResult<Bytes>;
}

/// Signer address together with its signing callbacks.
#[derive(Clone)]
pub struct SignerIdentity {
    pub address: Address,
    pub signer: Arc<dyn AccountSigner>,
}

impl fmt::Debug for SignerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerIdentity").field("address", &self.address).finish_non_exhaustive()
    }
}

/// Derive the account address of a secp256k1 public key.
pub fn public_key_address(pubkey: &PublicKey) -> Address {
    let uncompressed = pubkey.serialize_uncompressed();
    let hash = keccak256(&uncompressed[1..]);
    Address::from_slice(&hash[12..])
}

/// Serialize a recoverable signature to 65 bytes.
///
/// Format: [r(32) | s(32) | recovery_id(1)]
pub fn serialize_recoverable_signature(sig: &RecoverableSignature) -> [u8; 65] {
    let (recovery_id, sig_data) = sig.serialize_compact();

    let mut sig_bytes = [0u8; 65];
    sig_bytes[..64].copy_from_slice(&sig_data);
    sig_bytes[64] = i32::from(recovery_id) as u8;
    sig_bytes
}

/// In-process signer holding a single secret key.
pub struct LocalSigner {
    secret_key: SecretKey,
    address: Address,
    secp: Secp256k1<secp256k1::All>,
}

impl LocalSigner {
    pub fn new(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let address = public_key_address(&secret_key.public_key(&secp));
        Self { secret_key, address, secp }
    }

    /// Create a signer from 32 raw secret key bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> DposResult<Self> {
        let secret_key = SecretKey::from_slice(bytes)
            .map_err(|e| DposError::SignFailed { message: e.to_string() })?;
        Ok(Self::new(secret_key))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Package this signer as a [`SignerIdentity`] for [`Dpos::authorize`].
    ///
    /// [`Dpos::authorize`]: crate::consensus::dpos::Dpos::authorize
    pub fn into_identity(self) -> SignerIdentity {
        SignerIdentity { address: self.address, signer: Arc::new(self) }
    }

    fn check_account(&self, account: Address) -> DposResult<()> {
        if account != self.address {
            return Err(DposError::SignFailed { message: format!("unknown account {account}") });
        }
        Ok(())
    }

    fn sign_digest(&self, data: &[u8]) -> [u8; 65] {
        let msg = Message::from_digest(keccak256(data).0);
        let sig = self.secp.sign_ecdsa_recoverable(&msg, &self.secret_key);
        serialize_recoverable_signature(&sig)
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner").field("address", &self.address).finish_non_exhaustive()
    }
}

impl AccountSigner for LocalSigner {
    fn sign_hash(&self, account: Address, _mime_type: &str, data: &[u8]) -> DposResult<[u8; 65]> {
        self.check_account(account)?;
        Ok(self.sign_digest(data))
    }

    fn sign_transaction(&self, account: Address, tx: &[u8], chain_id: u64) -> DposResult<Bytes> {
        self.check_account(account)?;
        let mut payload = tx.to_vec();
        payload.extend_from_slice(&chain_id.to_be_bytes());
        let signature = self.sign_digest(&payload);

        let mut signed = tx.to_vec();
        signed.extend_from_slice(&signature);
        Ok(signed.into())
    }
}
