/*!
 * Identity Types
 * Verified identity claims consumed by the resolver
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric user identifier (SQLite rowid)
pub type UserId = i64;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::User
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verified identity claim supplied by the outer auth layer
///
/// The core trusts this claim completely and performs no independent
/// verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Identity {
    pub id: UserId,
    pub username: String,
    pub role: Role,
}

impl Identity {
    pub fn new(id: UserId, username: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            username: username.into(),
            role,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// User reference accepted by lookup APIs: a numeric id or a username.
/// Numeric strings are treated as ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRef {
    Id(UserId),
    Name(String),
}

impl UserRef {
    pub fn parse(s: &str) -> Self {
        match s.parse::<UserId>() {
            Ok(id) => UserRef::Id(id),
            Err(_) => UserRef::Name(s.to_string()),
        }
    }
}

impl From<UserId> for UserRef {
    fn from(id: UserId) -> Self {
        UserRef::Id(id)
    }
}

impl From<&str> for UserRef {
    fn from(s: &str) -> Self {
        UserRef::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("root"), None);
        assert!(Role::Admin.is_admin());
        assert!(!Role::User.is_admin());
    }

    #[test]
    fn test_user_ref_numeric_strings_are_ids() {
        assert_eq!(UserRef::parse("42"), UserRef::Id(42));
        assert_eq!(UserRef::parse("alice"), UserRef::Name("alice".to_string()));
    }
}
