//! In-memory cache of resolved Acls.
//!
//! Entries are immutable `Arc` snapshots. A mutation never edits a cached Acl;
//! the service evicts and the next lookup re-reads.
//!
//! Every eviction bumps a generation counter. A lookup notes the generation
//! before it reads the store and inserts with [`AclCache::put_if_current`], so a
//! snapshot loaded before a concurrent write cannot land after its eviction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::acl::Acl;
use crate::identity::ObjectIdentity;

/// Hit/miss counters since creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug, Default)]
pub struct AclCache {
    map: RwLock<HashMap<ObjectIdentity, Arc<Acl>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    // Only bumped while holding the map's write lock
    generation: AtomicU64,
}

impl AclCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, oid: &ObjectIdentity) -> Option<Arc<Acl>> {
        let r = self.map.read().get(oid).cloned();
        match r {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        r
    }

    pub fn put(&self, acl: Arc<Acl>) {
        self.map.write().insert(acl.identity().clone(), acl);
    }

    /// Current eviction generation; capture it before reading the store
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Insert unless an eviction happened since `generation` was captured.
    /// Returns whether the entry was stored.
    pub fn put_if_current(&self, acl: Arc<Acl>, generation: u64) -> bool {
        let mut map = self.map.write();
        if self.generation.load(Ordering::Acquire) != generation {
            tracing::debug!(acl = %acl.identity(), "evicted during load, not cached");
            return false;
        }
        map.insert(acl.identity().clone(), acl);
        true
    }

    /// Returns whether an entry was present
    pub fn evict(&self, oid: &ObjectIdentity) -> bool {
        let mut map = self.map.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        let hit = map.remove(oid).is_some();
        drop(map);
        if hit {
            tracing::debug!(acl = %oid, "evicted");
        }
        hit
    }

    pub fn clear(&self) {
        let mut map = self.map.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        map.clear();
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    pub fn contains(&self, oid: &ObjectIdentity) -> bool {
        self.map.read().contains_key(oid)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
