//! objacl - Object-level access control lists
//!
//! Every securable object (project, experiment, run, artifact) owns one Acl: an
//! owner, an ordered list of grant/deny entries over a bitmask of
//! [`Permission`]s, and an optional parent it inherits from. Lookups resolve the
//! ancestor chain through a shared cache; updates evict the whole subtree below
//! the changed object.
//!
//! ```no_run
//! use objacl::{AclConfig, AclEngine, ObjectIdentity, Permission, Sid};
//!
//! let engine = AclEngine::open(&AclConfig::new("data/acl")).unwrap();
//! let alice = Sid::principal("alice");
//! let project = ObjectIdentity::new("project", "p1").unwrap();
//! engine.create_acl(&alice, &project).unwrap();
//! engine.grant_permission(&project, &Sid::principal("bob"), Permission::VIEWER).unwrap();
//! assert!(engine.has_permission(&Sid::principal("bob"), &project, Permission::VIEWER).unwrap());
//! ```

pub mod acl;
pub mod cache;
pub mod config;
pub mod constants;
pub mod db;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod guard;
pub mod identity;
pub mod keys;
pub mod lookup;
pub mod permission;
pub mod record;
pub mod service;
pub mod sid;
pub mod store;

pub use acl::{AccessControlEntry, AceDraft, AceId, Acl, AclDraft};
pub use cache::{AclCache, CacheStats};
pub use config::AclConfig;
pub use db::LmdbAclStore;
pub use engine::AclEngine;
pub use error::{AclError, Result};
pub use evaluator::PermissionEvaluator;
pub use guard::{post_authorize, pre_authorize, pre_filter, Securable};
pub use identity::{Hierarchy, ObjectIdentity};
pub use lookup::LookupStrategy;
pub use permission::Permission;
pub use record::AclRecord;
pub use service::MutableAclService;
pub use sid::{SecurityContext, Sid};
pub use store::{AclStore, MemoryAclStore};
