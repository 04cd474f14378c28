//! Consensus engines for N42.
//!
//! - [`dpos`]: delegated proof-of-stake header authorization and sealing

pub mod dpos;
