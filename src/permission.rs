//! Permission bitmask

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// A grantable right, or a combination of rights.
///
/// The three canonical values form a fixed role ladder; masks combine with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(u32);

impl Permission {
    pub const NONE: Permission = Permission(0);
    pub const VIEWER: Permission = Permission(1);
    pub const CONTRIBUTOR: Permission = Permission(1 << 1);
    pub const OWNER: Permission = Permission(1 << 2);

    pub const fn from_mask(mask: u32) -> Self {
        Permission(mask)
    }

    pub const fn mask(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every bit of `other` is set in `self`
    #[inline]
    pub const fn contains(self, other: Permission) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any bit of `other` is set in `self`
    #[inline]
    pub const fn intersects(self, other: Permission) -> bool {
        self.0 & other.0 != 0
    }

    /// `self` with the bits of `other` cleared
    #[inline]
    pub const fn without(self, other: Permission) -> Permission {
        Permission(self.0 & !other.0)
    }

    /// Diagnostic code for a single canonical bit
    pub fn code(self) -> char {
        NAMES
            .iter()
            .find(|(_, p, _)| *p == self)
            .map(|(_, _, c)| *c)
            .unwrap_or('*')
    }

    /// Diagnostic pattern, highest bit first: `.CV` for CONTRIBUTOR | VIEWER
    pub fn pattern(self) -> String {
        NAMES
            .iter()
            .rev()
            .map(|(_, p, c)| if self.contains(*p) { *c } else { '.' })
            .collect()
    }

    /// Names of the canonical bits set in this mask
    pub fn to_names(self) -> Vec<&'static str> {
        NAMES
            .iter()
            .filter(|(_, p, _)| self.contains(*p))
            .map(|(n, _, _)| *n)
            .collect()
    }

    /// Combine canonical names into a mask; unknown names are ignored
    pub fn from_names(names: &[&str]) -> Permission {
        names
            .iter()
            .filter_map(|n| NAMES.iter().find(|(k, _, _)| k == n).map(|(_, p, _)| *p))
            .fold(Permission::NONE, |a, b| a | b)
    }
}

const NAMES: &[(&str, Permission, char)] = &[
    ("viewer", Permission::VIEWER, 'V'),
    ("contributor", Permission::CONTRIBUTOR, 'C'),
    ("owner", Permission::OWNER, 'O'),
];

impl BitOr for Permission {
    type Output = Permission;
    fn bitor(self, rhs: Permission) -> Permission {
        Permission(self.0 | rhs.0)
    }
}

impl BitOrAssign for Permission {
    fn bitor_assign(&mut self, rhs: Permission) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:#x})", self.pattern(), self.0)
    }
}
