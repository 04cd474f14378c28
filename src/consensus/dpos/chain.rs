//! Chain header access for the engine.

use crate::primitives::Header;
use alloy_primitives::B256;
use parking_lot::RwLock;
use std::{
    collections::{BTreeMap, HashMap},
    sync::atomic::{AtomicUsize, Ordering},
};

/// Chain header reader trait for accessing committed headers.
pub trait ChainHeaderReader: Send + Sync {
    /// Get the current head header.
    fn current_header(&self) -> Option<Header>;

    /// Get header by hash and number.
    fn get_header(&self, hash: B256, number: u64) -> Option<Header>;

    /// Get canonical header by number.
    fn get_header_by_number(&self, number: u64) -> Option<Header>;
}

/// In-memory chain keeping every inserted header and a canonical index.
#[derive(Debug, Default)]
pub struct MemoryChain {
    headers: RwLock<HashMap<B256, Header>>,
    canonical: RwLock<BTreeMap<u64, B256>>,
    reads: AtomicUsize,
}

impl MemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a chain from a genesis header.
    pub fn with_genesis(genesis: Header) -> Self {
        let chain = Self::new();
        chain.insert(genesis);
        chain
    }

    /// Insert a header and make it canonical at its height.
    pub fn insert(&self, header: Header) {
        let hash = header.hash();
        self.canonical.write().insert(header.number, hash);
        self.headers.write().insert(hash, header);
    }

    /// Number of header lookups served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.canonical.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.read().is_empty()
    }
}

impl ChainHeaderReader for MemoryChain {
    fn current_header(&self) -> Option<Header> {
        let hash = *self.canonical.read().values().next_back()?;
        self.headers.read().get(&hash).cloned()
    }

    fn get_header(&self, hash: B256, number: u64) -> Option<Header> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.headers.read().get(&hash).filter(|header| header.number == number).cloned()
    }

    fn get_header_by_number(&self, number: u64) -> Option<Header> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let hash = *self.canonical.read().get(&number)?;
        self.headers.read().get(&hash).cloned()
    }
}
