//! N42 primitive types consumed by the DPoS engine.
//!
//! # Modules
//!
//! - [`header`]: Block header with the vanity / payload / seal extra-data layout
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Block                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  header: Header                                             │
//! │    ├── number, parent_hash, time, coinbase                  │
//! │    ├── mix_digest (must be zero), uncle_hash (must be empty)│
//! │    └── extra_data: vanity ++ HeaderExtra ++ signature       │
//! │  transactions: opaque, only counted by the sealer           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod header;

pub use header::{Block, Header, EMPTY_UNCLE_HASH, EXTRA_SEAL, EXTRA_VANITY};
