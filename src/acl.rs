//! Acl data model and the granting decision.
//!
//! A resolved [`Acl`] is an immutable snapshot. It may carry its resolved parent,
//! so the whole ancestor chain is walked without touching the store. Changes go
//! through an [`AclDraft`] handed to the mutation service.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::constants::AUDIT_TARGET;
use crate::error::{storage, AclError, Result};
use crate::identity::ObjectIdentity;
use crate::permission::Permission;
use crate::sid::Sid;

/// Opaque entry identifier, stable across updates
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AceId(String);

impl AceId {
    pub fn new(id: impl Into<String>) -> Self {
        AceId(id.into())
    }

    /// 128 random bits from the OS, as 32 hex chars
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; 16];
        getrandom::getrandom(&mut bytes).map_err(storage)?;
        Ok(AceId(bytes.iter().map(|b| format!("{:02x}", b)).collect()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One grant or deny rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessControlEntry {
    pub id: AceId,
    pub sid: Sid,
    pub mask: Permission,
    pub granting: bool,
    pub audit_success: bool,
    pub audit_failure: bool,
}

impl AccessControlEntry {
    fn matches(&self, sid: &Sid, requested: Permission) -> bool {
        self.sid == *sid && self.mask.contains(requested)
    }
}

/// The permission record of one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acl {
    pub(crate) identity: ObjectIdentity,
    pub(crate) owner: Sid,
    pub(crate) entries: Vec<AccessControlEntry>,
    pub(crate) parent_id: Option<String>,
    pub(crate) entries_inheriting: bool,
    pub(crate) parent: Option<Arc<Acl>>,
}

impl Acl {
    /// A fresh Acl: no entries, no parent, inheriting
    pub(crate) fn new(identity: ObjectIdentity, owner: Sid) -> Self {
        Acl {
            identity,
            owner,
            entries: Vec::new(),
            parent_id: None,
            entries_inheriting: true,
            parent: None,
        }
    }

    pub fn identity(&self) -> &ObjectIdentity {
        &self.identity
    }

    pub fn owner(&self) -> &Sid {
        &self.owner
    }

    pub fn entries(&self) -> &[AccessControlEntry] {
        &self.entries
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn entries_inheriting(&self) -> bool {
        self.entries_inheriting
    }

    /// The resolved parent, when this Acl came from a lookup
    pub fn parent(&self) -> Option<&Arc<Acl>> {
        self.parent.as_ref()
    }

    /// Decide whether any of `sids` holds `requested` here or, when nothing
    /// matches locally and entries inherit, on an ancestor.
    ///
    /// Owners always pass. Otherwise, per sid in the given order, the first entry
    /// in stored order whose mask covers `requested` decides. A denying entry for
    /// an earlier sid ends the scan.
    pub fn is_granted(&self, sids: &[Sid], requested: Permission) -> bool {
        let mut acl = self;
        loop {
            if sids.contains(&acl.owner) {
                return true;
            }
            if let Some(ace) = acl.first_match(sids, requested) {
                acl.audit(ace, requested);
                return ace.granting;
            }
            match (&acl.parent, acl.entries_inheriting) {
                (Some(p), true) => acl = p,
                _ => return false,
            }
        }
    }

    fn first_match(&self, sids: &[Sid], requested: Permission) -> Option<&AccessControlEntry> {
        sids.iter()
            .find_map(|sid| self.entries.iter().find(|e| e.matches(sid, requested)))
    }

    fn audit(&self, ace: &AccessControlEntry, requested: Permission) {
        if ace.granting && ace.audit_success {
            tracing::info!(target: AUDIT_TARGET, acl = %self.identity, ace = %ace.id, sid = %ace.sid, %requested, "GRANTED");
        } else if !ace.granting && ace.audit_failure {
            tracing::info!(target: AUDIT_TARGET, acl = %self.identity, ace = %ace.id, sid = %ace.sid, %requested, "DENIED");
        }
    }

    /// Start an edit of this Acl
    pub fn edit(&self) -> AclDraft {
        AclDraft {
            identity: self.identity.clone(),
            entries: self
                .entries
                .iter()
                .map(|e| AceDraft {
                    id: Some(e.id.clone()),
                    sid: e.sid.clone(),
                    mask: e.mask,
                    granting: e.granting,
                    audit_success: e.audit_success,
                    audit_failure: e.audit_failure,
                })
                .collect(),
            parent_id: self.parent_id.clone(),
            entries_inheriting: self.entries_inheriting,
        }
    }
}

/// An entry being edited. `id: None` marks a new entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AceDraft {
    pub id: Option<AceId>,
    pub sid: Sid,
    pub mask: Permission,
    pub granting: bool,
    pub audit_success: bool,
    pub audit_failure: bool,
}

impl AceDraft {
    pub fn new(sid: Sid, mask: Permission, granting: bool) -> Self {
        AceDraft {
            id: None,
            sid,
            mask,
            granting,
            audit_success: false,
            audit_failure: false,
        }
    }
}

/// Replacement state for an existing Acl.
///
/// The entry list is replaced wholesale on update; the owner is not editable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclDraft {
    identity: ObjectIdentity,
    entries: Vec<AceDraft>,
    parent_id: Option<String>,
    entries_inheriting: bool,
}

impl AclDraft {
    /// An empty draft: no entries, no parent, inheriting
    pub fn new(identity: ObjectIdentity) -> Self {
        AclDraft {
            identity,
            entries: Vec::new(),
            parent_id: None,
            entries_inheriting: true,
        }
    }

    pub fn identity(&self) -> &ObjectIdentity {
        &self.identity
    }

    pub fn entries(&self) -> &[AceDraft] {
        &self.entries
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn entries_inheriting(&self) -> bool {
        self.entries_inheriting
    }

    pub fn push_ace(&mut self, sid: Sid, mask: Permission, granting: bool) -> &mut Self {
        self.entries.push(AceDraft::new(sid, mask, granting));
        self
    }

    pub fn push_entry(&mut self, ace: AceDraft) -> &mut Self {
        self.entries.push(ace);
        self
    }

    pub fn insert_ace(&mut self, index: usize, sid: Sid, mask: Permission, granting: bool) -> Result<()> {
        if index > self.entries.len() {
            return Err(self.bad_index(index));
        }
        self.entries.insert(index, AceDraft::new(sid, mask, granting));
        Ok(())
    }

    pub fn update_ace(&mut self, index: usize, mask: Permission) -> Result<()> {
        let bad = self.bad_index(index);
        self.entries.get_mut(index).ok_or(bad)?.mask = mask;
        Ok(())
    }

    pub fn update_auditing(&mut self, index: usize, audit_success: bool, audit_failure: bool) -> Result<()> {
        let bad = self.bad_index(index);
        let ace = self.entries.get_mut(index).ok_or(bad)?;
        ace.audit_success = audit_success;
        ace.audit_failure = audit_failure;
        Ok(())
    }

    pub fn delete_ace(&mut self, index: usize) -> Result<AceDraft> {
        if index >= self.entries.len() {
            return Err(self.bad_index(index));
        }
        Ok(self.entries.remove(index))
    }

    /// Keep only entries matching `f`; returns how many were dropped
    pub fn retain_aces<F: FnMut(&AceDraft) -> bool>(&mut self, f: F) -> usize {
        let before = self.entries.len();
        self.entries.retain(f);
        before - self.entries.len()
    }

    pub fn set_parent_id(&mut self, parent_id: Option<String>) -> &mut Self {
        self.parent_id = parent_id;
        self
    }

    pub fn set_entries_inheriting(&mut self, inheriting: bool) -> &mut Self {
        self.entries_inheriting = inheriting;
        self
    }

    fn bad_index(&self, index: usize) -> AclError {
        AclError::invalid(format!(
            "entry index {} out of range for {} ({} entries)",
            index,
            self.identity,
            self.entries.len()
        ))
    }

    /// Finalize entries: keep supplied ids, assign fresh ones, reject duplicates
    pub(crate) fn resolve_entries(&self) -> Result<Vec<AccessControlEntry>> {
        let mut seen = HashSet::with_capacity(self.entries.len());
        let mut out = Vec::with_capacity(self.entries.len());
        for d in &self.entries {
            let id = match &d.id {
                Some(id) => id.clone(),
                None => AceId::generate()?,
            };
            if !seen.insert(id.clone()) {
                return Err(AclError::invalid(format!("duplicate entry id {} on {}", id, self.identity)));
            }
            out.push(AccessControlEntry {
                id,
                sid: d.sid.clone(),
                mask: d.mask,
                granting: d.granting,
                audit_success: d.audit_success,
                audit_failure: d.audit_failure,
            });
        }
        Ok(out)
    }
}
