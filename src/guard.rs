//! Boundary wrappers around the predicate.
//!
//! The three shapes a repository uses: drop unreadable items from a collection,
//! refuse a write before it reaches storage, and refuse a single read after the
//! fetch. All three share [`PermissionEvaluator::is_granted`].

use crate::error::{AclError, Result};
use crate::evaluator::PermissionEvaluator;
use crate::identity::ObjectIdentity;
use crate::permission::Permission;
use crate::sid::SecurityContext;

/// A domain object with an Acl
pub trait Securable {
    fn object_identity(&self) -> ObjectIdentity;
}

impl Securable for ObjectIdentity {
    fn object_identity(&self) -> ObjectIdentity {
        self.clone()
    }
}

/// Keep the items the caller holds `permission` on.
///
/// An item without an Acl counts as no access; store faults still propagate.
pub fn pre_filter<T: Securable>(
    evaluator: &PermissionEvaluator,
    ctx: &SecurityContext,
    items: Vec<T>,
    permission: Permission,
) -> Result<Vec<T>> {
    let mut kept = Vec::with_capacity(items.len());
    for item in items {
        match evaluator.is_granted(ctx, &item.object_identity(), permission) {
            Ok(true) => kept.push(item),
            Ok(false) | Err(AclError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(kept)
}

/// Refuse with `AccessDenied` unless the caller holds `permission` on `oid`
pub fn pre_authorize(
    evaluator: &PermissionEvaluator,
    ctx: &SecurityContext,
    oid: &ObjectIdentity,
    permission: Permission,
) -> Result<()> {
    if evaluator.is_granted(ctx, oid, permission)? {
        Ok(())
    } else {
        Err(AclError::AccessDenied {
            sid: ctx.principal().clone(),
            identity: oid.clone(),
            permission,
        })
    }
}

/// Hand back a fetched item only if the caller holds `permission` on it
pub fn post_authorize<T: Securable>(
    evaluator: &PermissionEvaluator,
    ctx: &SecurityContext,
    item: T,
    permission: Permission,
) -> Result<T> {
    pre_authorize(evaluator, ctx, &item.object_identity(), permission)?;
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::cache::AclCache;
    use crate::identity::Hierarchy;
    use crate::lookup::LookupStrategy;
    use crate::service::MutableAclService;
    use crate::sid::Sid;
    use crate::store::{AclStore, MemoryAclStore};

    #[derive(Debug, PartialEq)]
    struct Run {
        id: &'static str,
    }

    impl Securable for Run {
        fn object_identity(&self) -> ObjectIdentity {
            ObjectIdentity::new("run", self.id).unwrap()
        }
    }

    fn setup() -> (MutableAclService, PermissionEvaluator) {
        let store: Arc<dyn AclStore> = Arc::new(MemoryAclStore::new(Hierarchy::default()));
        let cache = Arc::new(AclCache::new());
        let lookup = Arc::new(LookupStrategy::new(store.clone(), cache.clone()));
        (MutableAclService::new(store, cache, lookup.clone()), PermissionEvaluator::new(lookup))
    }

    #[test]
    fn filter_drops_unreadable_and_unknown() {
        let (svc, eval) = setup();
        let alice = Sid::principal("alice");
        let bob = Sid::principal("bob");
        svc.create_acl(&alice, &ObjectIdentity::new("run", "r1").unwrap()).unwrap();
        svc.create_acl(&alice, &ObjectIdentity::new("run", "r2").unwrap()).unwrap();
        svc.grant_permission(&ObjectIdentity::new("run", "r2").unwrap(), &bob, Permission::VIEWER)
            .unwrap();

        let runs = vec![Run { id: "r1" }, Run { id: "r2" }, Run { id: "ghost" }];
        let seen = pre_filter(&eval, &SecurityContext::new("bob"), runs, Permission::VIEWER).unwrap();
        assert_eq!(seen, vec![Run { id: "r2" }]);
    }

    #[test]
    fn write_and_read_checks() {
        let (svc, eval) = setup();
        let r1 = ObjectIdentity::new("run", "r1").unwrap();
        svc.create_acl(&Sid::principal("alice"), &r1).unwrap();
        let alice = SecurityContext::new("alice");
        let bob = SecurityContext::new("bob");

        pre_authorize(&eval, &alice, &r1, Permission::CONTRIBUTOR).unwrap();
        assert_eq!(
            pre_authorize(&eval, &bob, &r1, Permission::CONTRIBUTOR).unwrap_err(),
            AclError::AccessDenied {
                sid: Sid::principal("bob"),
                identity: r1.clone(),
                permission: Permission::CONTRIBUTOR,
            }
        );
        assert_eq!(post_authorize(&eval, &alice, Run { id: "r1" }, Permission::VIEWER).unwrap(), Run { id: "r1" });
        assert!(post_authorize(&eval, &bob, Run { id: "r1" }, Permission::VIEWER).is_err());
    }
}
