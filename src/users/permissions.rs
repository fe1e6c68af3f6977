/*!
 * Permission Set
 * Typed membership set replacing free-form permission blobs
 */

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Individual capability a user can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Read,
    Write,
    Share,
    Rename,
    Delete,
    Move,
}

impl Permission {
    pub const ALL: [Permission; 6] = [
        Permission::Read,
        Permission::Write,
        Permission::Share,
        Permission::Rename,
        Permission::Delete,
        Permission::Move,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::Share => "share",
            Permission::Rename => "rename",
            Permission::Delete => "delete",
            Permission::Move => "move",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "read" => Some(Permission::Read),
            "write" => Some(Permission::Write),
            "share" => Some(Permission::Share),
            "rename" => Some(Permission::Rename),
            "delete" => Some(Permission::Delete),
            "move" => Some(Permission::Move),
            _ => None,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of permissions with explicit membership tests
///
/// The stored form is a JSON array of permission names; it is parsed
/// once at the store boundary and unknown entries are dropped. Raw
/// strings never cross into business logic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet(HashSet<Permission>);

impl PermissionSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Permission::ALL.iter().copied().collect()
    }

    #[must_use]
    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    pub fn insert(&mut self, permission: Permission) {
        self.0.insert(permission);
    }

    pub fn remove(&mut self, permission: Permission) {
        self.0.remove(&permission);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse the stored JSON array, dropping unknown entries
    pub fn from_json(raw: &str) -> Self {
        let names: Vec<String> = serde_json::from_str(raw).unwrap_or_default();
        names.iter().filter_map(|n| Permission::parse(n)).collect()
    }

    /// Stored form: a JSON array of permission names in stable order
    pub fn to_json(&self) -> String {
        let mut names: Vec<&str> = self.0.iter().map(Permission::as_str).collect();
        names.sort_unstable();
        serde_json::to_string(&names).unwrap_or_else(|_| "[]".to_string())
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
