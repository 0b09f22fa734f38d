//! Object identities and the type hierarchy that links them.
//!
//! An [`ObjectIdentity`] is a plain `(type, id)` value. Parent links stored on an
//! Acl only carry the parent's instance id; the [`Hierarchy`] says which type that
//! id belongs to.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_HIERARCHY, MAX_INHERITANCE_DEPTH, MAX_KEY_PART_LEN};
use crate::error::{AclError, Result};

/// Names one securable object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectIdentity {
    object_type: String,
    id: String,
}

impl ObjectIdentity {
    /// Create from separate type and id.
    ///
    /// # Example
    /// ```
    /// # use objacl::ObjectIdentity;
    /// let oid = ObjectIdentity::new("project", "p1").unwrap();
    /// assert_eq!(oid.object_type(), "project");
    /// assert_eq!(oid.id(), "p1");
    /// ```
    pub fn new(object_type: impl Into<String>, id: impl Into<String>) -> Result<Self> {
        let object_type = object_type.into();
        let id = id.into();
        check_part("object type", &object_type)?;
        check_part("object id", &id)?;
        Ok(ObjectIdentity { object_type, id })
    }

    /// Parse from `type:id`. The id may itself contain colons.
    pub fn parse(s: &str) -> Result<Self> {
        let (t, id) = s
            .split_once(':')
            .ok_or_else(|| AclError::invalid(format!("'{}' is not in 'type:id' format", s)))?;
        Self::new(t, id)
    }

    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

fn check_part(what: &str, s: &str) -> Result<()> {
    if s.is_empty() {
        return Err(AclError::invalid(format!("{} cannot be empty", what)));
    }
    if s.len() > MAX_KEY_PART_LEN {
        return Err(AclError::invalid(format!(
            "{} too long: {} bytes (max {})",
            what,
            s.len(),
            MAX_KEY_PART_LEN
        )));
    }
    Ok(())
}

impl fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.id)
    }
}

/// Which object type a parent id refers to, per child type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct Hierarchy {
    parents: BTreeMap<String, String>,
}

impl Hierarchy {
    /// Build from `(child type, parent type)` pairs, rejecting cycles.
    pub fn new<I, C, P>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (C, P)>,
        C: Into<String>,
        P: Into<String>,
    {
        let parents: BTreeMap<String, String> =
            pairs.into_iter().map(|(c, p)| (c.into(), p.into())).collect();
        let h = Hierarchy { parents };
        h.validate()?;
        Ok(h)
    }

    /// A hierarchy with no parent links at all
    pub fn flat() -> Self {
        Hierarchy { parents: BTreeMap::new() }
    }

    fn validate(&self) -> Result<()> {
        for (child, parent) in &self.parents {
            check_part("hierarchy type", child)?;
            check_part("hierarchy type", parent)?;
            if child == parent {
                return Err(AclError::invalid(format!("type '{}' cannot be its own parent", child)));
            }
            let mut cur = parent.as_str();
            for _ in 0..MAX_INHERITANCE_DEPTH {
                match self.parents.get(cur) {
                    Some(p) if p == child => {
                        return Err(AclError::invalid(format!(
                            "circular hierarchy through '{}'",
                            child
                        )))
                    }
                    Some(p) => cur = p,
                    None => break,
                }
            }
            if self.parents.contains_key(cur) {
                return Err(AclError::invalid(format!(
                    "hierarchy above '{}' deeper than {}",
                    child, MAX_INHERITANCE_DEPTH
                )));
            }
        }
        Ok(())
    }

    pub fn parent_type(&self, object_type: &str) -> Option<&str> {
        self.parents.get(object_type).map(String::as_str)
    }

    /// Types whose parent type is `object_type`
    pub fn child_types<'a>(&'a self, object_type: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.parents
            .iter()
            .filter(move |(_, p)| p.as_str() == object_type)
            .map(|(c, _)| c.as_str())
    }

    /// Resolve a stored parent id into the parent's identity
    pub fn parent_identity(&self, child: &ObjectIdentity, parent_id: Option<&str>) -> Result<Option<ObjectIdentity>> {
        let Some(pid) = parent_id else { return Ok(None) };
        let pt = self.parent_type(child.object_type()).ok_or_else(|| {
            AclError::invalid(format!("type '{}' has no parent type", child.object_type()))
        })?;
        ObjectIdentity::new(pt, pid).map(Some)
    }
}

impl Default for Hierarchy {
    fn default() -> Self {
        Hierarchy {
            parents: DEFAULT_HIERARCHY
                .iter()
                .map(|(c, p)| (c.to_string(), p.to_string()))
                .collect(),
        }
    }
}

impl TryFrom<BTreeMap<String, String>> for Hierarchy {
    type Error = AclError;
    fn try_from(parents: BTreeMap<String, String>) -> Result<Self> {
        Hierarchy::new(parents)
    }
}

impl From<Hierarchy> for BTreeMap<String, String> {
    fn from(h: Hierarchy) -> Self {
        h.parents
    }
}
