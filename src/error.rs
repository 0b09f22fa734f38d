//! Error types for objacl

use thiserror::Error;

use crate::identity::ObjectIdentity;
use crate::permission::Permission;
use crate::sid::Sid;

/// The main error type for objacl operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AclError {
    /// An Acl already exists for this identity
    #[error("acl already exists for {0}")]
    AlreadyExists(ObjectIdentity),

    /// No Acl record for this identity
    #[error("no acl for {0}")]
    NotFound(ObjectIdentity),

    /// Non-cascading delete blocked by objects still referencing this one as parent
    #[error("{identity} still has {children} child acl(s)")]
    ChildrenExist {
        identity: ObjectIdentity,
        children: usize,
    },

    /// Transient store fault (I/O, lock wait expiry, corrupted record)
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Malformed input
    #[error("invalid: {0}")]
    Invalid(String),

    /// Raised by the boundary guards, never by the evaluator itself
    #[error("{sid} lacks {permission} on {identity}")]
    AccessDenied {
        sid: Sid,
        identity: ObjectIdentity,
        permission: Permission,
    },

    #[error("config: {0}")]
    Config(String),
}

impl AclError {
    /// Whether a caller may retry with backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, AclError::StorageUnavailable(_))
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        AclError::Invalid(msg.into())
    }
}

/// Result type alias for objacl operations
pub type Result<T> = std::result::Result<T, AclError>;

/// Convert any backend error into a storage fault
pub fn storage<E: std::fmt::Display>(e: E) -> AclError {
    AclError::StorageUnavailable(e.to_string())
}
