//! Limits, defaults and table names

use std::time::Duration;

// Maximum parent chain depth (prevents runaway recursion on corrupted data)
pub const MAX_INHERITANCE_DEPTH: usize = 10;

// Key parts carry a one-byte length prefix
pub const MAX_KEY_PART_LEN: usize = 255;

pub const DEFAULT_MAP_SIZE: usize = 1 << 30;
pub const DEFAULT_MAX_READERS: u32 = 126;
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

// LMDB sub-databases
pub const ACLS_DB: &str = "acls";
pub const CHILDREN_DB: &str = "children";

// Default object hierarchy: (child type, parent type)
pub const ROOT_TYPE: &str = "project";
pub const DEFAULT_HIERARCHY: &[(&str, &str)] = &[
    ("experiment", ROOT_TYPE),
    ("run", ROOT_TYPE),
    ("artifact", ROOT_TYPE),
];

// Audit log target
pub const AUDIT_TARGET: &str = "objacl::audit";
