/*!
 * Path Registry
 * Durable (user, virtual prefix) → real directory mappings
 */

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::core::{CoreResult, UserId, UserRef};
use crate::store::Store;

/// A registered virtual-prefix → real-directory mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapping {
    pub id: i64,
    pub user_id: UserId,
    pub virtual_path: String,
    pub real_path: String,
}

impl PathMapping {
    /// Splice the remainder of `virtual_path` onto the mapped real path
    ///
    /// `/alice/work` mapped to `/mnt/work` splices `/alice/work/a.txt`
    /// into `/mnt/work/a.txt`.
    #[must_use]
    pub fn splice(&self, virtual_path: &str) -> String {
        if virtual_path.len() > self.virtual_path.len() {
            format!(
                "{}{}",
                self.real_path,
                &virtual_path[self.virtual_path.len()..]
            )
        } else {
            self.real_path.clone()
        }
    }
}

fn row_to_mapping(row: &Row) -> rusqlite::Result<PathMapping> {
    Ok(PathMapping {
        id: row.get(0)?,
        user_id: row.get(1)?,
        virtual_path: row.get(2)?,
        real_path: row.get(3)?,
    })
}

const MAPPING_COLUMNS: &str = "id, user_id, virtual_path, real_path";

/// Durable store of per-user path mappings
#[derive(Clone)]
pub struct PathRegistry {
    store: Store,
}

impl PathRegistry {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Upsert a mapping for `(username, virtual_prefix)`
    ///
    /// Returns false when the username does not resolve to a known user.
    pub fn set_path(
        &self,
        username: &str,
        virtual_prefix: &str,
        real_path: &str,
    ) -> CoreResult<bool> {
        self.store.with(|conn| {
            let user_id: Option<UserId> = conn
                .query_row(
                    "SELECT id FROM users WHERE username = ?1",
                    params![username],
                    |r| r.get(0),
                )
                .optional()?;
            let Some(user_id) = user_id else {
                return Ok(false);
            };
            conn.execute(
                "INSERT INTO user_paths (user_id, virtual_path, real_path)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (user_id, virtual_path)
                 DO UPDATE SET real_path = excluded.real_path",
                params![user_id, virtual_prefix, real_path],
            )?;
            Ok(true)
        })
    }

    /// Every registered mapping (the background sweep's root list)
    pub fn all(&self) -> CoreResult<Vec<PathMapping>> {
        self.store.with(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {MAPPING_COLUMNS} FROM user_paths"))?;
            let mappings = stmt
                .query_map([], row_to_mapping)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(mappings)
        })
    }

    pub fn for_user(&self, user_id: UserId) -> CoreResult<Vec<PathMapping>> {
        self.store.with(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MAPPING_COLUMNS} FROM user_paths WHERE user_id = ?1"
            ))?;
            let mappings = stmt
                .query_map(params![user_id], row_to_mapping)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(mappings)
        })
    }

    /// Delete a mapping by id
    pub fn remove(&self, id: i64) -> CoreResult<bool> {
        self.store.with(|conn| {
            let changed = conn.execute("DELETE FROM user_paths WHERE id = ?1", params![id])?;
            Ok(changed > 0)
        })
    }

    /// The user's canonical home mapping (`/{username}`), if registered
    pub fn home_for(&self, username: &str) -> CoreResult<Option<PathMapping>> {
        let home = format!("/{username}");
        self.store.with(|conn| {
            conn.query_row(
                &format!(
                    "SELECT user_paths.id, user_paths.user_id, user_paths.virtual_path, user_paths.real_path FROM user_paths
                     JOIN users ON user_paths.user_id = users.id
                     WHERE users.username = ?1 AND user_paths.virtual_path = ?2"
                ),
                params![username, home],
                row_to_mapping,
            )
            .optional()
        })
    }

    /// Resolve `virtual_path` to a real path for `username`
    pub fn real_path_for(&self, username: &str, virtual_path: &str) -> CoreResult<Option<String>> {
        Ok(self
            .mapping_for(&UserRef::Name(username.to_string()), virtual_path)?
            .map(|m| m.splice(virtual_path)))
    }

    /// Resolve the matching mapping for a user reference
    ///
    /// Accepts a numeric id or a username; numeric strings are treated
    /// as ids. Strategies in order: exact virtual-path match, then the
    /// longest registered prefix (the home mapping competes as an
    /// ordinary prefix, so a more specific mapping always wins).
    pub fn mapping_for(
        &self,
        user: &UserRef,
        virtual_path: &str,
    ) -> CoreResult<Option<PathMapping>> {
        self.store.with(|conn| {
            let user_id = match user {
                UserRef::Id(id) => {
                    let known: Option<UserId> = conn
                        .query_row("SELECT id FROM users WHERE id = ?1", params![id], |r| {
                            r.get(0)
                        })
                        .optional()?;
                    known
                }
                UserRef::Name(name) => conn
                    .query_row(
                        "SELECT id FROM users WHERE username = ?1",
                        params![name],
                        |r| r.get(0),
                    )
                    .optional()?,
            };
            let Some(user_id) = user_id else {
                return Ok(None);
            };
            Self::lookup(conn, user_id, virtual_path)
        })
    }

    fn lookup(
        conn: &Connection,
        user_id: UserId,
        virtual_path: &str,
    ) -> rusqlite::Result<Option<PathMapping>> {
        let exact = conn
            .query_row(
                &format!(
                    "SELECT {MAPPING_COLUMNS} FROM user_paths
                     WHERE user_id = ?1 AND virtual_path = ?2"
                ),
                params![user_id, virtual_path],
                row_to_mapping,
            )
            .optional()?;
        if exact.is_some() {
            return Ok(exact);
        }

        // Longest prefix wins; matching is a plain string-prefix test,
        // not segment-aware.
        let mut stmt = conn.prepare(&format!(
            "SELECT {MAPPING_COLUMNS} FROM user_paths
             WHERE user_id = ?1
             ORDER BY LENGTH(virtual_path) DESC"
        ))?;
        let mappings = stmt
            .query_map(params![user_id], row_to_mapping)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for mapping in mappings {
            if virtual_path.starts_with(&mapping.virtual_path) {
                debug!(
                    prefix = %mapping.virtual_path,
                    real = %mapping.real_path,
                    "prefix mapping matched"
                );
                return Ok(Some(mapping));
            }
        }
        Ok(None)
    }
}
