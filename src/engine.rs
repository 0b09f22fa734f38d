//! One handle over store, cache, lookup, mutation service and evaluator.

use std::sync::Arc;

use crate::acl::{Acl, AclDraft};
use crate::cache::AclCache;
use crate::config::AclConfig;
use crate::db::LmdbAclStore;
use crate::error::Result;
use crate::evaluator::PermissionEvaluator;
use crate::identity::{Hierarchy, ObjectIdentity};
use crate::lookup::LookupStrategy;
use crate::permission::Permission;
use crate::service::MutableAclService;
use crate::sid::{SecurityContext, Sid};
use crate::store::{AclStore, MemoryAclStore};

/// Shared across request threads behind an `Arc`
pub struct AclEngine {
    store: Arc<dyn AclStore>,
    cache: Arc<AclCache>,
    service: MutableAclService,
    evaluator: PermissionEvaluator,
}

impl AclEngine {
    /// Open the LMDB store described by `config`
    pub fn open(config: &AclConfig) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(LmdbAclStore::open(config)?);
        Ok(Self::with_store(store))
    }

    /// In-process store, nothing persisted
    pub fn in_memory(hierarchy: Hierarchy) -> Self {
        Self::with_store(Arc::new(MemoryAclStore::new(hierarchy)))
    }

    /// Build over any store; parents resolve through the store's hierarchy
    pub fn with_store(store: Arc<dyn AclStore>) -> Self {
        let cache = Arc::new(AclCache::new());
        let lookup = Arc::new(LookupStrategy::new(store.clone(), cache.clone()));
        AclEngine {
            service: MutableAclService::new(store.clone(), cache.clone(), lookup.clone()),
            evaluator: PermissionEvaluator::new(lookup),
            store,
            cache,
        }
    }

    pub fn store(&self) -> &dyn AclStore {
        self.store.as_ref()
    }

    pub fn cache(&self) -> &AclCache {
        &self.cache
    }

    pub fn service(&self) -> &MutableAclService {
        &self.service
    }

    pub fn evaluator(&self) -> &PermissionEvaluator {
        &self.evaluator
    }

    /// Resolved Acl, cache first
    pub fn read_acl(&self, oid: &ObjectIdentity) -> Result<Arc<Acl>> {
        self.service.lookup().read_acl_by_id(oid)
    }

    pub fn create_acl(&self, principal: &Sid, oid: &ObjectIdentity) -> Result<Arc<Acl>> {
        self.service.create_acl(principal, oid)
    }

    pub fn create_child_acl(&self, principal: &Sid, oid: &ObjectIdentity, parent_id: &str) -> Result<Arc<Acl>> {
        self.service.create_child_acl(principal, oid, parent_id)
    }

    pub fn update_acl(&self, draft: &AclDraft) -> Result<Arc<Acl>> {
        self.service.update_acl(draft)
    }

    pub fn delete_acl(&self, oid: &ObjectIdentity, delete_children: bool) -> Result<()> {
        self.service.delete_acl(oid, delete_children)
    }

    pub fn has_permission(&self, sid: &Sid, oid: &ObjectIdentity, requested: Permission) -> Result<bool> {
        self.evaluator.has_permission(sid, oid, requested)
    }

    pub fn is_granted(&self, ctx: &SecurityContext, oid: &ObjectIdentity, requested: Permission) -> Result<bool> {
        self.evaluator.is_granted(ctx, oid, requested)
    }

    pub fn grant_permission(&self, oid: &ObjectIdentity, sid: &Sid, permission: Permission) -> Result<Arc<Acl>> {
        self.service.grant_permission(oid, sid, permission)
    }

    pub fn revoke_permission(&self, oid: &ObjectIdentity, sid: &Sid) -> Result<usize> {
        self.service.revoke_permission(oid, sid)
    }

    pub fn list_permissions(&self, oid: &ObjectIdentity) -> Result<Vec<(Sid, Permission)>> {
        self.service.list_permissions(oid)
    }

    /// Wipe store and cache
    pub fn clear_all(&self) -> Result<()> {
        self.store.clear()?;
        self.cache.clear();
        Ok(())
    }
}
