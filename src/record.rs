//! Persisted record shape, one per object identity

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::acl::{AccessControlEntry, AceId, Acl};
use crate::error::{storage, Result};
use crate::identity::ObjectIdentity;
use crate::permission::Permission;
use crate::sid::Sid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidRecord {
    pub name: String,
    pub is_principal: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRecord {
    pub id: String,
    pub sid_name: String,
    pub is_principal: bool,
    pub mask: u32,
    pub granting: bool,
    pub audit_success: bool,
    pub audit_failure: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AclRecord {
    pub object_type: String,
    pub object_id: String,
    pub owner_sid: SidRecord,
    pub parent_object_id: Option<String>,
    pub entries_inheriting: bool,
    #[serde(default)]
    pub entries: Vec<EntryRecord>,
}

impl AclRecord {
    pub fn identity(&self) -> Result<ObjectIdentity> {
        ObjectIdentity::new(self.object_type.as_str(), self.object_id.as_str())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(storage)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(storage)
    }

    /// Materialize, linking an already-resolved parent
    pub(crate) fn into_acl(self, parent: Option<Arc<Acl>>) -> Result<Acl> {
        let identity = self.identity()?;
        Ok(Acl {
            identity,
            owner: Sid::from_parts(self.owner_sid.name, self.owner_sid.is_principal),
            entries: self
                .entries
                .into_iter()
                .map(|e| AccessControlEntry {
                    id: AceId::new(e.id),
                    sid: Sid::from_parts(e.sid_name, e.is_principal),
                    mask: Permission::from_mask(e.mask),
                    granting: e.granting,
                    audit_success: e.audit_success,
                    audit_failure: e.audit_failure,
                })
                .collect(),
            parent_id: self.parent_object_id,
            entries_inheriting: self.entries_inheriting,
            parent,
        })
    }
}

fn sid_record(sid: &Sid) -> SidRecord {
    SidRecord {
        name: sid.name().to_string(),
        is_principal: sid.is_principal(),
    }
}

impl From<&Acl> for AclRecord {
    fn from(acl: &Acl) -> Self {
        AclRecord {
            object_type: acl.identity.object_type().to_string(),
            object_id: acl.identity.id().to_string(),
            owner_sid: sid_record(&acl.owner),
            parent_object_id: acl.parent_id.clone(),
            entries_inheriting: acl.entries_inheriting,
            entries: acl
                .entries
                .iter()
                .map(|e| EntryRecord {
                    id: e.id.as_str().to_string(),
                    sid_name: e.sid.name().to_string(),
                    is_principal: e.sid.is_principal(),
                    mask: e.mask.mask(),
                    granting: e.granting,
                    audit_success: e.audit_success,
                    audit_failure: e.audit_failure,
                })
                .collect(),
        }
    }
}
