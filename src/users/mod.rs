/*!
 * User Accounts
 * User records, roles, and provisioning
 */

pub mod permissions;

pub use permissions::{Permission, PermissionSet};

use rusqlite::{params, OptionalExtension, Row};
use std::path::Path;
use tracing::{info, warn};

use crate::core::{CoreError, CoreResult, Role, UserId};
use crate::registry::PathRegistry;
use crate::store::Store;

/// A user account record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub role: Role,
    pub permissions: PermissionSet,
}

impl User {
    /// Admins implicitly hold every permission
    #[must_use]
    pub fn can(&self, permission: Permission) -> bool {
        self.role.is_admin() || self.permissions.contains(permission)
    }
}

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    let role: String = row.get(2)?;
    let permissions: Option<String> = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        role: Role::parse(&role).unwrap_or_default(),
        permissions: permissions
            .as_deref()
            .map(PermissionSet::from_json)
            .unwrap_or_default(),
    })
}

const USER_COLUMNS: &str = "id, username, role, permissions";

/// CRUD store for user accounts
#[derive(Clone)]
pub struct UserStore {
    store: Store,
}

impl UserStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn create(
        &self,
        username: &str,
        role: Role,
        permissions: PermissionSet,
    ) -> CoreResult<User> {
        let id = self.store.with(|conn| {
            conn.execute(
                "INSERT INTO users (username, role, permissions) VALUES (?1, ?2, ?3)",
                params![username, role.as_str(), permissions.to_json()],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        Ok(User {
            id,
            username: username.to_string(),
            role,
            permissions,
        })
    }

    pub fn get(&self, id: UserId) -> CoreResult<Option<User>> {
        self.store.with(|conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                row_to_user,
            )
            .optional()
        })
    }

    pub fn by_username(&self, username: &str) -> CoreResult<Option<User>> {
        self.store.with(|conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                params![username],
                row_to_user,
            )
            .optional()
        })
    }

    pub fn all(&self) -> CoreResult<Vec<User>> {
        self.store.with(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY username"
            ))?;
            let users = stmt
                .query_map([], row_to_user)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
    }

    pub fn set_permissions(&self, id: UserId, permissions: &PermissionSet) -> CoreResult<()> {
        self.store.with(|conn| {
            conn.execute(
                "UPDATE users SET permissions = ?1 WHERE id = ?2",
                params![permissions.to_json(), id],
            )?;
            Ok(())
        })
    }

    /// Delete a user; mappings cascade via the foreign key
    pub fn delete(&self, id: UserId) -> CoreResult<bool> {
        self.store.with(|conn| {
            let changed = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
            Ok(changed > 0)
        })
    }

    /// Seed the default admin account on first open
    pub fn ensure_admin(&self) -> CoreResult<User> {
        if let Some(admin) = self.by_username("admin")? {
            return Ok(admin);
        }
        let admin = self.create("admin", Role::Admin, PermissionSet::all())?;
        info!(user_id = admin.id, "created default admin user");
        Ok(admin)
    }

    /// Create a user and its home mapping
    ///
    /// The two statements are not atomic; a mapping failure deletes the
    /// just-created user so the caller-visible outcome is all-or-nothing.
    pub fn provision(
        &self,
        registry: &PathRegistry,
        username: &str,
        role: Role,
        home: &Path,
    ) -> CoreResult<User> {
        let user = self.create(username, role, PermissionSet::from_iter([
            Permission::Read,
            Permission::Write,
            Permission::Rename,
            Permission::Move,
        ]))?;

        let prefix = format!("/{username}");
        let mapped = registry
            .set_path(username, &prefix, &home.to_string_lossy())
            .unwrap_or(false);
        if !mapped {
            warn!(username, "home mapping failed, rolling back user");
            let _ = self.delete(user.id);
            return Err(CoreError::Storage(format!(
                "failed to create home mapping for {username}"
            )));
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (UserStore, PathRegistry) {
        let store = Store::in_memory().unwrap();
        (UserStore::new(store.clone()), PathRegistry::new(store))
    }

    #[test]
    fn test_create_and_lookup() {
        let (users, _) = fixture();
        let alice = users
            .create("alice", Role::User, PermissionSet::all())
            .unwrap();

        assert_eq!(users.get(alice.id).unwrap().unwrap().username, "alice");
        assert_eq!(users.by_username("alice").unwrap().unwrap().id, alice.id);
        assert!(users.by_username("bob").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_username_is_conflict() {
        let (users, _) = fixture();
        users
            .create("alice", Role::User, PermissionSet::empty())
            .unwrap();
        let err = users
            .create("alice", Role::User, PermissionSet::empty())
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn test_admin_holds_all_permissions() {
        let (users, _) = fixture();
        let admin = users.ensure_admin().unwrap();
        assert!(admin.can(Permission::Delete));
        assert!(admin.can(Permission::Share));

        let limited = users
            .create("bob", Role::User, PermissionSet::from_iter([Permission::Read]))
            .unwrap();
        assert!(limited.can(Permission::Read));
        assert!(!limited.can(Permission::Delete));
    }

    #[test]
    fn test_ensure_admin_is_idempotent() {
        let (users, _) = fixture();
        let first = users.ensure_admin().unwrap();
        let second = users.ensure_admin().unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_provision_creates_home_mapping_and_delete_cascades() {
        let (users, registry) = fixture();
        let alice = users
            .provision(&registry, "alice", Role::User, Path::new("/data/alice"))
            .unwrap();
        assert!(registry.home_for("alice").unwrap().is_some());

        users.delete(alice.id).unwrap();
        assert!(registry.home_for("alice").unwrap().is_none());
    }
}
