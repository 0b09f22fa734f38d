//! Security identities

use std::fmt;

use serde::{Deserialize, Serialize};

/// Who an entry or an ownership applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sid {
    /// An end user
    Principal(String),
    /// A role or group held by users
    Authority(String),
}

impl Sid {
    pub fn principal(name: impl Into<String>) -> Self {
        Sid::Principal(name.into())
    }

    pub fn authority(name: impl Into<String>) -> Self {
        Sid::Authority(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Sid::Principal(n) | Sid::Authority(n) => n,
        }
    }

    pub fn is_principal(&self) -> bool {
        matches!(self, Sid::Principal(_))
    }

    pub(crate) fn from_parts(name: String, is_principal: bool) -> Self {
        if is_principal {
            Sid::Principal(name)
        } else {
            Sid::Authority(name)
        }
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sid::Principal(n) => write!(f, "principal:{}", n),
            Sid::Authority(n) => write!(f, "authority:{}", n),
        }
    }
}

/// The caller: a principal plus the authorities it holds.
///
/// Handed explicitly to every check; there is no ambient security context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityContext {
    principal: Sid,
    authorities: Vec<Sid>,
}

impl SecurityContext {
    pub fn new(principal: impl Into<String>) -> Self {
        SecurityContext {
            principal: Sid::principal(principal),
            authorities: Vec::new(),
        }
    }

    pub fn with_authority(mut self, name: impl Into<String>) -> Self {
        self.authorities.push(Sid::authority(name));
        self
    }

    pub fn principal(&self) -> &Sid {
        &self.principal
    }

    pub fn authorities(&self) -> &[Sid] {
        &self.authorities
    }

    /// Principal first, then authorities in the order they were added
    pub fn sids(&self) -> Vec<Sid> {
        std::iter::once(self.principal.clone())
            .chain(self.authorities.iter().cloned())
            .collect()
    }
}
