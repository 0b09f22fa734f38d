//! Acl lifecycle: create, update, delete, and the administrative grant API.
//!
//! Every mutation writes the store first and then evicts. Updates evict the whole
//! subtree below the object, since descendants resolve through it.

use std::sync::Arc;

use crate::acl::{AceDraft, Acl, AclDraft};
use crate::cache::AclCache;
use crate::error::{AclError, Result};
use crate::identity::ObjectIdentity;
use crate::lookup::LookupStrategy;
use crate::permission::Permission;
use crate::record::AclRecord;
use crate::sid::Sid;
use crate::store::AclStore;

pub struct MutableAclService {
    store: Arc<dyn AclStore>,
    cache: Arc<AclCache>,
    lookup: Arc<LookupStrategy>,
}

impl MutableAclService {
    pub fn new(store: Arc<dyn AclStore>, cache: Arc<AclCache>, lookup: Arc<LookupStrategy>) -> Self {
        MutableAclService { store, cache, lookup }
    }

    pub fn lookup(&self) -> &LookupStrategy {
        &self.lookup
    }

    /// Create the Acl of a new object, owned by `principal`
    pub fn create_acl(&self, principal: &Sid, oid: &ObjectIdentity) -> Result<Arc<Acl>> {
        self.create(principal, oid, None)
    }

    /// Create the Acl of a new object that inherits from `parent_id`
    pub fn create_child_acl(&self, principal: &Sid, oid: &ObjectIdentity, parent_id: &str) -> Result<Arc<Acl>> {
        self.create(principal, oid, Some(parent_id.to_string()))
    }

    fn create(&self, principal: &Sid, oid: &ObjectIdentity, parent_id: Option<String>) -> Result<Arc<Acl>> {
        if self.store.find_by_identity(oid)?.is_some() {
            return Err(AclError::AlreadyExists(oid.clone()));
        }
        self.check_parent(oid, parent_id.as_deref())?;
        let mut acl = Acl::new(oid.clone(), principal.clone());
        acl.parent_id = parent_id;
        self.store.insert(&AclRecord::from(&acl))?;
        tracing::info!(acl = %oid, owner = %principal, parent = ?acl.parent_id, "created acl");
        self.lookup.read_acl_by_id(oid)
    }

    // The parent must resolve to an existing Acl of the configured parent type
    fn check_parent(&self, oid: &ObjectIdentity, parent_id: Option<&str>) -> Result<()> {
        if let Some(pid) = self.lookup.hierarchy().parent_identity(oid, parent_id)? {
            if self.store.find_by_identity(&pid)?.is_none() {
                return Err(AclError::NotFound(pid));
            }
        }
        Ok(())
    }

    /// Replace entries, parent and inheritance of an existing Acl
    pub fn update_acl(&self, draft: &AclDraft) -> Result<Arc<Acl>> {
        let oid = draft.identity();
        let current = self
            .store
            .find_by_identity(oid)?
            .ok_or_else(|| AclError::NotFound(oid.clone()))?;
        self.check_parent(oid, draft.parent_id())?;
        let mut acl = current.into_acl(None)?;
        acl.entries = draft.resolve_entries()?;
        acl.parent_id = draft.parent_id().map(str::to_string);
        acl.entries_inheriting = draft.entries_inheriting();
        self.store.save(&AclRecord::from(&acl))?;
        let evicted = match self.evict_subtree(oid, 0) {
            Ok(n) => n,
            Err(e) => {
                // The record is already written; no descendant may keep the old parent
                self.cache.clear();
                tracing::warn!(acl = %oid, error = %e, "subtree eviction failed, cache cleared");
                return Err(e);
            }
        };
        tracing::info!(
            acl = %oid,
            entries = acl.entries.len(),
            inheriting = acl.entries_inheriting,
            evicted,
            "updated acl"
        );
        self.lookup.read_acl_by_id(oid)
    }

    // Evict `oid` and every descendant; returns how many cache entries were dropped
    fn evict_subtree(&self, oid: &ObjectIdentity, depth: usize) -> Result<usize> {
        let mut n = usize::from(self.cache.evict(oid));
        if depth >= crate::constants::MAX_INHERITANCE_DEPTH {
            return Ok(n);
        }
        for child in self.store.find_children(oid)? {
            n += self.evict_subtree(&child, depth + 1)?;
        }
        Ok(n)
    }

    /// Delete an Acl; with `delete_children` the whole subtree goes, children first
    pub fn delete_acl(&self, oid: &ObjectIdentity, delete_children: bool) -> Result<()> {
        if self.store.find_by_identity(oid)?.is_none() {
            return Err(AclError::NotFound(oid.clone()));
        }
        let children = self.store.find_children(oid)?;
        if !children.is_empty() {
            if !delete_children {
                return Err(AclError::ChildrenExist {
                    identity: oid.clone(),
                    children: children.len(),
                });
            }
            for child in &children {
                self.delete_acl(child, true)?;
            }
        }
        self.store.delete(oid)?;
        self.cache.evict(oid);
        tracing::info!(acl = %oid, children = children.len(), "deleted acl");
        Ok(())
    }

    // ========================================================================
    // Administrative API
    // ========================================================================

    /// Grant `permission` to `sid`. Replaces the mask of the sid's first granting
    /// entry, or appends a new granting entry.
    ///
    /// The sid's denying entries lose the granted bits (and go if nothing is
    /// left), so no earlier denial shadows the grant.
    pub fn grant_permission(&self, oid: &ObjectIdentity, sid: &Sid, permission: Permission) -> Result<Arc<Acl>> {
        let acl = self.lookup.read_acl_by_id(oid)?;
        let mut draft = acl.edit();
        let mut i = 0;
        while i < draft.entries().len() {
            let e = &draft.entries()[i];
            if e.sid == *sid && !e.granting && e.mask.intersects(permission) {
                let rest = e.mask.without(permission);
                if rest.is_empty() {
                    draft.delete_ace(i)?;
                    continue;
                }
                draft.update_ace(i, rest)?;
            }
            i += 1;
        }
        match draft.entries().iter().position(|e| e.sid == *sid && e.granting) {
            Some(i) => draft.update_ace(i, permission)?,
            None => {
                draft.push_entry(AceDraft::new(sid.clone(), permission, true));
            }
        }
        tracing::info!(acl = %oid, %sid, %permission, "grant");
        self.update_acl(&draft)
    }

    /// Remove every entry of `sid`; returns how many were removed
    pub fn revoke_permission(&self, oid: &ObjectIdentity, sid: &Sid) -> Result<usize> {
        let acl = self.lookup.read_acl_by_id(oid)?;
        let mut draft = acl.edit();
        let removed = draft.retain_aces(|e| e.sid != *sid);
        if removed > 0 {
            tracing::info!(acl = %oid, %sid, removed, "revoke");
            self.update_acl(&draft)?;
        }
        Ok(removed)
    }

    /// Granting entries as `(sid, mask)`, in stored order
    pub fn list_permissions(&self, oid: &ObjectIdentity) -> Result<Vec<(Sid, Permission)>> {
        let acl = self.lookup.read_acl_by_id(oid)?;
        Ok(acl
            .entries()
            .iter()
            .filter(|e| e.granting)
            .map(|e| (e.sid.clone(), e.mask))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Hierarchy;
    use crate::store::MemoryAclStore;

    fn oid(t: &str, id: &str) -> ObjectIdentity {
        ObjectIdentity::new(t, id).unwrap()
    }

    fn service() -> (Arc<AclCache>, MutableAclService) {
        let store: Arc<dyn AclStore> = Arc::new(MemoryAclStore::new(Hierarchy::default()));
        let cache = Arc::new(AclCache::new());
        let lookup = Arc::new(LookupStrategy::new(store.clone(), cache.clone()));
        (cache.clone(), MutableAclService::new(store, cache, lookup))
    }

    #[test]
    fn create_sets_owner_and_defaults() {
        let (cache, svc) = service();
        let alice = Sid::principal("alice");
        let acl = svc.create_acl(&alice, &oid("project", "p1")).unwrap();
        assert_eq!(acl.owner(), &alice);
        assert!(acl.entries().is_empty());
        assert!(acl.entries_inheriting());
        assert_eq!(acl.parent_id(), None);
        assert!(cache.contains(&oid("project", "p1")));
        assert_eq!(
            svc.create_acl(&alice, &oid("project", "p1")).unwrap_err(),
            AclError::AlreadyExists(oid("project", "p1"))
        );
    }

    #[test]
    fn create_child_requires_parent() {
        let (_c, svc) = service();
        let alice = Sid::principal("alice");
        assert_eq!(
            svc.create_child_acl(&alice, &oid("run", "r1"), "p1").unwrap_err(),
            AclError::NotFound(oid("project", "p1"))
        );
        svc.create_acl(&alice, &oid("project", "p1")).unwrap();
        let r = svc.create_child_acl(&alice, &oid("run", "r1"), "p1").unwrap();
        assert_eq!(r.parent().unwrap().identity(), &oid("project", "p1"));
    }

    #[test]
    fn update_keeps_ids_and_owner() {
        let (_c, svc) = service();
        let alice = Sid::principal("alice");
        let p = svc.create_acl(&alice, &oid("project", "p1")).unwrap();
        let mut draft = p.edit();
        draft.push_ace(Sid::principal("bob"), Permission::VIEWER, true);
        let v1 = svc.update_acl(&draft).unwrap();
        let bob_id = v1.entries()[0].id.clone();

        let mut draft = v1.edit();
        draft.push_ace(Sid::principal("carol"), Permission::CONTRIBUTOR, true);
        let v2 = svc.update_acl(&draft).unwrap();
        assert_eq!(v2.entries()[0].id, bob_id);
        assert_eq!(v2.entries().len(), 2);
        assert_eq!(v2.owner(), &alice);
    }

    #[test]
    fn update_missing_is_not_found() {
        let (_c, svc) = service();
        let draft = AclDraft::new(oid("project", "nope"));
        assert_eq!(svc.update_acl(&draft).unwrap_err(), AclError::NotFound(oid("project", "nope")));
    }

    #[test]
    fn update_evicts_descendants() {
        let (cache, svc) = service();
        let alice = Sid::principal("alice");
        svc.create_acl(&alice, &oid("project", "p1")).unwrap();
        svc.create_child_acl(&alice, &oid("run", "r1"), "p1").unwrap();
        svc.create_child_acl(&alice, &oid("artifact", "a1"), "p1").unwrap();
        assert_eq!(cache.len(), 3);

        svc.update_acl(&AclDraft::new(oid("project", "p1"))).unwrap();
        // Only the re-read parent is back
        assert_eq!(cache.len(), 1);
        assert!(!cache.contains(&oid("run", "r1")));
        assert!(!cache.contains(&oid("artifact", "a1")));
    }

    #[test]
    fn delete_children_first() {
        let (cache, svc) = service();
        let alice = Sid::principal("alice");
        svc.create_acl(&alice, &oid("project", "p1")).unwrap();
        svc.create_child_acl(&alice, &oid("run", "r1"), "p1").unwrap();

        assert_eq!(
            svc.delete_acl(&oid("project", "p1"), false).unwrap_err(),
            AclError::ChildrenExist { identity: oid("project", "p1"), children: 1 }
        );
        svc.delete_acl(&oid("project", "p1"), true).unwrap();
        assert!(cache.is_empty());
        assert!(matches!(svc.lookup().read_acl_by_id(&oid("run", "r1")), Err(AclError::NotFound(_))));
    }

    #[test]
    fn grant_overrides_earlier_denial() {
        let (_c, svc) = service();
        let bob = Sid::principal("bob");
        let p = oid("project", "p1");
        let acl = svc.create_acl(&Sid::principal("alice"), &p).unwrap();
        let mut draft = acl.edit();
        draft.push_ace(bob.clone(), Permission::VIEWER, false);
        draft.push_ace(bob.clone(), Permission::OWNER | Permission::CONTRIBUTOR, false);
        svc.update_acl(&draft).unwrap();

        let acl = svc.grant_permission(&p, &bob, Permission::VIEWER | Permission::CONTRIBUTOR).unwrap();
        assert!(acl.is_granted(&[bob.clone()], Permission::VIEWER));
        assert!(acl.is_granted(&[bob.clone()], Permission::CONTRIBUTOR));
        // The untouched bit stays denied
        assert!(!acl.is_granted(&[bob.clone()], Permission::OWNER));
        assert_eq!(acl.entries().len(), 2);
        assert_eq!((acl.entries()[0].mask, acl.entries()[0].granting), (Permission::OWNER, false));
        assert_eq!(
            svc.list_permissions(&p).unwrap(),
            vec![(bob, Permission::VIEWER | Permission::CONTRIBUTOR)]
        );
    }

    #[test]
    fn grant_replaces_then_revoke_removes_all() {
        let (_c, svc) = service();
        let alice = Sid::principal("alice");
        let bob = Sid::principal("bob");
        let p = oid("project", "p1");
        svc.create_acl(&alice, &p).unwrap();

        svc.grant_permission(&p, &bob, Permission::VIEWER).unwrap();
        svc.grant_permission(&p, &bob, Permission::CONTRIBUTOR | Permission::VIEWER).unwrap();
        assert_eq!(
            svc.list_permissions(&p).unwrap(),
            vec![(bob.clone(), Permission::CONTRIBUTOR | Permission::VIEWER)]
        );

        assert_eq!(svc.revoke_permission(&p, &bob).unwrap(), 1);
        assert_eq!(svc.revoke_permission(&p, &bob).unwrap(), 0);
        assert!(svc.list_permissions(&p).unwrap().is_empty());
    }
}
