//! Length-prefixed key encoding for LMDB storage.
//!
//! All keys are encoded as: [len1][bytes1][len2][bytes2]...
//! - No delimiters, no escaping, any bytes allowed
//! - Prefix scans over leading parts work unchanged
//!
//! Parts are at most 255 bytes; `ObjectIdentity` enforces that on construction.

use crate::identity::ObjectIdentity;

/// Build a length-prefixed key from parts
#[inline]
pub fn build_key(parts: &[&str]) -> Vec<u8> {
    let total_len: usize = parts.iter().map(|p| 1 + p.len()).sum();
    let mut key = Vec::with_capacity(total_len);
    for part in parts {
        key.push(part.len() as u8);
        key.extend_from_slice(part.as_bytes());
    }
    key
}

/// Build a prefix for scanning (same as build_key, just clearer intent)
#[inline]
pub fn build_prefix(parts: &[&str]) -> Vec<u8> {
    build_key(parts)
}

/// Parse a length-prefixed key into parts; stops at the first malformed part
pub fn parse_key(bytes: &[u8]) -> Vec<&str> {
    let mut parts = Vec::with_capacity(4);
    let mut i = 0;
    while i < bytes.len() {
        let len = bytes[i] as usize;
        if i + 1 + len > bytes.len() {
            break;
        }
        match std::str::from_utf8(&bytes[i + 1..i + 1 + len]) {
            Ok(part) => parts.push(part),
            Err(_) => break,
        }
        i += 1 + len;
    }
    parts
}

// ============================================================================
// Acl records: [type][id]
// ============================================================================

#[inline]
pub fn acl_key(oid: &ObjectIdentity) -> Vec<u8> {
    build_key(&[oid.object_type(), oid.id()])
}

// ============================================================================
// Child index: [parent_type][parent_id][child_type][child_id]
// ============================================================================

#[inline]
pub fn child_key(parent: &ObjectIdentity, child: &ObjectIdentity) -> Vec<u8> {
    build_key(&[parent.object_type(), parent.id(), child.object_type(), child.id()])
}

/// Prefix covering every child of `parent`
#[inline]
pub fn children_prefix(parent: &ObjectIdentity) -> Vec<u8> {
    build_prefix(&[parent.object_type(), parent.id()])
}

/// Child identity from a child index key
pub fn parse_child(bytes: &[u8]) -> Option<ObjectIdentity> {
    match parse_key(bytes).as_slice() {
        [_, _, t, id] => ObjectIdentity::new(*t, *id).ok(),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
