//! In-memory snapshot cache.

use super::snapshot::Snapshot;
use alloy_primitives::B256;
use lru::LruCache;
use parking_lot::Mutex;
use std::{num::NonZeroUsize, sync::Arc};

/// Bounded cache of recent snapshots keyed by block hash.
///
/// Snapshots are immutable, so entries are shared as `Arc`s and inserts only
/// ever publish finished values.
pub trait SnapshotCache: Send + Sync {
    /// Look up a snapshot, refreshing its position in the eviction order.
    fn get(&self, hash: &B256) -> Option<Arc<Snapshot>>;

    /// Insert a snapshot under its hash.
    fn insert(&self, snapshot: Arc<Snapshot>);

    /// Number of cached snapshots.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Least-recently-used snapshot cache.
#[derive(Debug)]
pub struct LruSnapshotCache {
    inner: Mutex<LruCache<B256, Arc<Snapshot>>>,
}

impl LruSnapshotCache {
    /// Create a cache holding at most `capacity` snapshots (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { inner: Mutex::new(LruCache::new(capacity)) }
    }
}

impl SnapshotCache for LruSnapshotCache {
    fn get(&self, hash: &B256) -> Option<Arc<Snapshot>> {
        self.inner.lock().get(hash).cloned()
    }

    fn insert(&self, snapshot: Arc<Snapshot>) {
        self.inner.lock().put(snapshot.hash, snapshot);
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }
}
