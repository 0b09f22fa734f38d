//! The authorization predicate.
//!
//! Denial is `Ok(false)`, never an error. Errors are structural: a missing Acl
//! (`NotFound`) or a store fault.

use std::sync::Arc;

use crate::error::Result;
use crate::identity::ObjectIdentity;
use crate::lookup::LookupStrategy;
use crate::permission::Permission;
use crate::sid::{SecurityContext, Sid};

pub struct PermissionEvaluator {
    lookup: Arc<LookupStrategy>,
}

impl PermissionEvaluator {
    pub fn new(lookup: Arc<LookupStrategy>) -> Self {
        PermissionEvaluator { lookup }
    }

    /// Does `sid` hold `requested` on `oid`, directly or through its parents?
    pub fn has_permission(&self, sid: &Sid, oid: &ObjectIdentity, requested: Permission) -> Result<bool> {
        self.granted(std::slice::from_ref(sid), oid, requested)
    }

    /// As `has_permission`, for a caller with authorities
    pub fn is_granted(&self, ctx: &SecurityContext, oid: &ObjectIdentity, requested: Permission) -> Result<bool> {
        self.granted(&ctx.sids(), oid, requested)
    }

    /// True if any of `permissions` is granted
    pub fn has_any_permission(
        &self,
        ctx: &SecurityContext,
        oid: &ObjectIdentity,
        permissions: &[Permission],
    ) -> Result<bool> {
        let acl = self.lookup.read_acl_by_id(oid)?;
        let sids = ctx.sids();
        Ok(permissions.iter().any(|p| acl.is_granted(&sids, *p)))
    }

    fn granted(&self, sids: &[Sid], oid: &ObjectIdentity, requested: Permission) -> Result<bool> {
        let acl = self.lookup.read_acl_by_id(oid)?;
        let ok = acl.is_granted(sids, requested);
        tracing::debug!(acl = %oid, %requested, granted = ok, "permission check");
        Ok(ok)
    }
}
