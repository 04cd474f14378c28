//! DPoS Miner Module
//!
//! Local block production: the signing identity and the sealer that signs
//! a finalized header and releases it when its slot time arrives.
//!
//! # Usage
//!
//! ```ignore
//! use n42_dpos::{miner::LocalSigner, Dpos};
//!
//! let identity = LocalSigner::from_bytes(&key)?.into_identity();
//! engine.authorize(identity.address, identity.signer);
//!
//! engine.finalize(&chain, &mut header, votes, economic)?;
//! engine.seal(&chain, Block::new(header, txs), results_tx, stop.clone())?;
//!
//! while let Some(block) = results_rx.recv().await {
//!     // broadcast block
//! }
//! ```

mod sealer;
mod signer;

pub use sealer::calculate_seal_delay;
pub use signer::{
    public_key_address, serialize_recoverable_signature, AccountSigner, LocalSigner,
    SignerIdentity, MIMETYPE_DPOS,
};
