/*!
 * SQLite Store
 * Shared connection handle and schema management
 */

use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

use crate::core::{CoreError, CoreResult};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT UNIQUE NOT NULL,
    role TEXT NOT NULL DEFAULT 'user',
    permissions TEXT,
    created_at INTEGER DEFAULT (unixepoch())
);

CREATE TABLE IF NOT EXISTS user_paths (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    virtual_path TEXT NOT NULL,
    real_path TEXT NOT NULL,
    UNIQUE (user_id, virtual_path),
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS file_metadata (
    path TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    is_directory INTEGER NOT NULL,
    size INTEGER NOT NULL DEFAULT 0,
    last_modified INTEGER,
    last_indexed INTEGER NOT NULL,
    parent_path TEXT,
    virtual_path TEXT
);

CREATE INDEX IF NOT EXISTS idx_file_metadata_parent_path ON file_metadata(parent_path);
CREATE INDEX IF NOT EXISTS idx_file_metadata_virtual_path ON file_metadata(virtual_path);
"#;

/// Shared database handle
///
/// Statements are serialized behind a mutex; there is no transaction
/// spanning a recursive index pass, so readers may observe a directory
/// row whose children are still being re-indexed.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open or create the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CoreError::from_io(e, format!("create {}", parent.display())))?;
        }
        let conn = Connection::open(path.as_ref())?;
        Self::init(conn)
    }

    /// In-memory database for tests
    pub fn in_memory() -> CoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> CoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the locked connection
    pub fn with<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> CoreResult<T> {
        let conn = self.conn.lock();
        f(&conn).map_err(CoreError::from)
    }
}
