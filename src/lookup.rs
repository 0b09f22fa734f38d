//! Resolve identities into Acls with their ancestor chain, cache first.

use std::collections::HashMap;
use std::sync::Arc;

use crate::acl::Acl;
use crate::cache::AclCache;
use crate::constants::MAX_INHERITANCE_DEPTH;
use crate::error::{AclError, Result};
use crate::identity::{Hierarchy, ObjectIdentity};
use crate::store::AclStore;

pub struct LookupStrategy {
    store: Arc<dyn AclStore>,
    cache: Arc<AclCache>,
}

impl LookupStrategy {
    pub fn new(store: Arc<dyn AclStore>, cache: Arc<AclCache>) -> Self {
        LookupStrategy { store, cache }
    }

    /// The store's hierarchy; parent resolution and child lookups share it
    pub fn hierarchy(&self) -> &Hierarchy {
        self.store.hierarchy()
    }

    /// Resolve every identity; fails on the first one with no record
    pub fn read_acls_by_id(&self, oids: &[ObjectIdentity]) -> Result<HashMap<ObjectIdentity, Arc<Acl>>> {
        let mut out = HashMap::with_capacity(oids.len());
        for oid in oids {
            if !out.contains_key(oid) {
                out.insert(oid.clone(), self.resolve(oid, 0)?);
            }
        }
        Ok(out)
    }

    pub fn read_acl_by_id(&self, oid: &ObjectIdentity) -> Result<Arc<Acl>> {
        self.resolve(oid, 0)
    }

    // The parent is resolved (and cached) before the child links to it, so
    // siblings share one parent snapshot.
    fn resolve(&self, oid: &ObjectIdentity, depth: usize) -> Result<Arc<Acl>> {
        if depth > MAX_INHERITANCE_DEPTH {
            return Err(AclError::invalid(format!(
                "parent chain of {} deeper than {}",
                oid, MAX_INHERITANCE_DEPTH
            )));
        }
        if let Some(hit) = self.cache.get(oid) {
            tracing::debug!(acl = %oid, "cache hit");
            return Ok(hit);
        }
        tracing::debug!(acl = %oid, "cache miss");
        let generation = self.cache.generation();
        let record = self
            .store
            .find_by_identity(oid)?
            .ok_or_else(|| AclError::NotFound(oid.clone()))?;
        let parent = match self.hierarchy().parent_identity(oid, record.parent_object_id.as_deref())? {
            Some(pid) => Some(self.resolve(&pid, depth + 1)?),
            None => None,
        };
        let acl = Arc::new(record.into_acl(parent)?);
        self.cache.put_if_current(acl.clone(), generation);
        Ok(acl)
    }
}
