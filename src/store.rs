//! Durable Acl storage seam.
//!
//! The store is the source of truth; it never caches. [`crate::db::LmdbAclStore`]
//! is the durable implementation, [`MemoryAclStore`] keeps records in-process.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::error::{AclError, Result};
use crate::identity::{Hierarchy, ObjectIdentity};
use crate::record::AclRecord;

pub trait AclStore: Send + Sync {
    /// Type hierarchy used to index children; lookups resolve parents with it
    fn hierarchy(&self) -> &Hierarchy;

    fn find_by_identity(&self, oid: &ObjectIdentity) -> Result<Option<AclRecord>>;

    /// Identities whose parent is `oid`, sorted
    fn find_children(&self, oid: &ObjectIdentity) -> Result<Vec<ObjectIdentity>>;

    /// Create; `AlreadyExists` if a record is present
    fn insert(&self, record: &AclRecord) -> Result<()>;

    /// Upsert keyed by identity
    fn save(&self, record: &AclRecord) -> Result<()>;

    /// Remove a record; returns how many were removed (0 or 1)
    fn delete(&self, oid: &ObjectIdentity) -> Result<usize>;

    fn clear(&self) -> Result<()>;
}

/// In-process store guarded by a single lock
pub struct MemoryAclStore {
    hierarchy: Hierarchy,
    records: RwLock<BTreeMap<ObjectIdentity, AclRecord>>,
}

impl MemoryAclStore {
    pub fn new(hierarchy: Hierarchy) -> Self {
        MemoryAclStore {
            hierarchy,
            records: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl AclStore for MemoryAclStore {
    fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    fn find_by_identity(&self, oid: &ObjectIdentity) -> Result<Option<AclRecord>> {
        Ok(self.records.read().get(oid).cloned())
    }

    fn find_children(&self, oid: &ObjectIdentity) -> Result<Vec<ObjectIdentity>> {
        let records = self.records.read();
        let mut out = Vec::new();
        for (child, rec) in records.iter() {
            if rec.parent_object_id.as_deref() == Some(oid.id())
                && self.hierarchy.parent_type(child.object_type()) == Some(oid.object_type())
            {
                out.push(child.clone());
            }
        }
        Ok(out)
    }

    fn insert(&self, record: &AclRecord) -> Result<()> {
        let oid = record.identity()?;
        let mut records = self.records.write();
        if records.contains_key(&oid) {
            return Err(AclError::AlreadyExists(oid));
        }
        records.insert(oid, record.clone());
        Ok(())
    }

    fn save(&self, record: &AclRecord) -> Result<()> {
        let oid = record.identity()?;
        self.records.write().insert(oid, record.clone());
        Ok(())
    }

    fn delete(&self, oid: &ObjectIdentity) -> Result<usize> {
        let n = usize::from(self.records.write().remove(oid).is_some());
        if n == 0 {
            tracing::warn!(acl = %oid, "delete removed no record");
        }
        Ok(n)
    }

    fn clear(&self) -> Result<()> {
        self.records.write().clear();
        Ok(())
    }
}
