//! Durable storage for snapshot checkpoints.
//!
//! The engine only needs a key-value store; snapshots are written as JSON
//! under `dpos-<hash>`. [`MemoryDatabase`] backs tests and the demo.

use super::{
    config::RotationParams,
    error::{DposError, DposResult},
    snapshot::Snapshot,
};
use alloy_primitives::B256;
use parking_lot::RwLock;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

/// Database key prefix for DPoS snapshots.
pub const DPOS_SNAPSHOT_PREFIX: &[u8] = b"dpos-";

/// Raw key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &[u8]) -> DposResult<Option<Vec<u8>>>;

    fn put(&self, key: &[u8], value: &[u8]) -> DposResult<()>;
}

/// Snapshot checkpoint operations on top of a [`KeyValueStore`].
pub trait SnapshotDatabase: KeyValueStore {
    /// Load a snapshot by block hash, re-attaching `config`.
    fn load_snapshot(&self, config: RotationParams, hash: B256) -> DposResult<Option<Snapshot>> {
        let Some(blob) = self.get(&snapshot_key(hash))? else {
            return Ok(None);
        };
        let mut snapshot: Snapshot = serde_json::from_slice(&blob)
            .map_err(|e| DposError::Database { message: format!("corrupt snapshot {hash}: {e}") })?;
        snapshot.config = config;
        Ok(Some(snapshot))
    }

    /// Store a snapshot under its hash.
    fn store_snapshot(&self, snapshot: &Snapshot) -> DposResult<()> {
        let blob = serde_json::to_vec(snapshot)
            .map_err(|e| DposError::Database { message: e.to_string() })?;
        self.put(&snapshot_key(snapshot.hash), &blob)
    }
}

impl<T: KeyValueStore + ?Sized> SnapshotDatabase for T {}

fn snapshot_key(hash: B256) -> Vec<u8> {
    let mut key = Vec::with_capacity(DPOS_SNAPSHOT_PREFIX.len() + 32);
    key.extend_from_slice(DPOS_SNAPSHOT_PREFIX);
    key.extend_from_slice(hash.as_slice());
    key
}

/// Memory-based key-value store.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    entries: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new memory database wrapped in Arc.
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Number of `get` calls served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of `put` calls served so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

impl KeyValueStore for MemoryDatabase {
    fn get(&self, key: &[u8]) -> DposResult<Option<Vec<u8>>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> DposResult<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.entries.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::dpos::tally::TallyState;
    use alloy_primitives::Address;

    fn params() -> RotationParams {
        RotationParams { period: 15, max_signer_count: 2 }
    }

    #[test]
    fn test_memory_database() {
        let db = MemoryDatabase::new();
        let signers = vec![Address::repeat_byte(0x01), Address::repeat_byte(0x02)];
        let mut snapshot =
            Snapshot::new(params(), B256::repeat_byte(0xaa), 100, &signers, TallyState::default()).unwrap();
        snapshot.number = 1024;

        db.store_snapshot(&snapshot).unwrap();
        assert_eq!(db.len(), 1);
        assert_eq!(db.writes(), 1);

        let loaded = db.load_snapshot(params(), snapshot.hash).unwrap().unwrap();
        assert_eq!(loaded, snapshot);

        assert!(db.load_snapshot(params(), B256::ZERO).unwrap().is_none());
        assert_eq!(db.reads(), 2);
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let db = MemoryDatabase::new();
        let hash = B256::repeat_byte(0xbb);
        db.put(&snapshot_key(hash), b"not json").unwrap();

        assert!(matches!(db.load_snapshot(params(), hash), Err(DposError::Database { .. })));
    }
}
