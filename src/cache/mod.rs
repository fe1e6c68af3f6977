/*!
 * Metadata Cache
 * Per-physical-path attribute store backed by SQLite
 */

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::core::{Clock, CoreResult};
use crate::store::Store;

/// Records older than this are stale and re-indexed on access
pub const STALE_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

/// Cached attributes for one physical path
///
/// Directory sizes are recursive aggregates as of the last index pass,
/// not real time; staleness is bounded by `last_indexed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MetadataRecord {
    pub path: String,
    pub name: String,
    pub is_directory: bool,
    pub size: u64,
    pub last_modified: Option<i64>,
    pub last_indexed: i64,
    pub parent_path: Option<String>,
    pub virtual_path: Option<String>,
}

impl MetadataRecord {
    /// Stale once the record's age strictly exceeds the freshness window
    #[must_use]
    pub fn is_stale(&self, now_secs: i64) -> bool {
        now_secs - self.last_indexed > STALE_AFTER.as_secs() as i64
    }
}

fn row_to_record(row: &Row) -> rusqlite::Result<MetadataRecord> {
    let size: i64 = row.get(3)?;
    Ok(MetadataRecord {
        path: row.get(0)?,
        name: row.get(1)?,
        is_directory: row.get(2)?,
        size: size.max(0) as u64,
        last_modified: row.get(4)?,
        last_indexed: row.get(5)?,
        parent_path: row.get(6)?,
        virtual_path: row.get(7)?,
    })
}

const RECORD_COLUMNS: &str =
    "path, name, is_directory, size, last_modified, last_indexed, parent_path, virtual_path";

/// Upsert/query store keyed by physical path
#[derive(Clone)]
pub struct MetadataCache {
    store: Store,
    clock: Arc<dyn Clock>,
}

impl MetadataCache {
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Current time per the injected clock, in unix seconds
    pub fn now_secs(&self) -> i64 {
        self.clock.now_secs()
    }

    /// Replace-or-insert; always stamps `last_indexed` from the clock
    #[allow(clippy::too_many_arguments)]
    pub fn upsert(
        &self,
        path: &str,
        name: &str,
        is_directory: bool,
        size: u64,
        last_modified: Option<i64>,
        parent_path: Option<&str>,
        virtual_path: &str,
    ) -> CoreResult<()> {
        let now = self.clock.now_secs();
        self.store.with(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO file_metadata
                 (path, name, is_directory, size, last_modified, last_indexed, parent_path, virtual_path)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    path,
                    name,
                    is_directory,
                    size as i64,
                    last_modified,
                    now,
                    parent_path,
                    virtual_path
                ],
            )?;
            Ok(())
        })
    }

    pub fn get(&self, path: &str) -> CoreResult<Option<MetadataRecord>> {
        self.store.with(|conn| {
            conn.query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM file_metadata WHERE path = ?1"),
                params![path],
                row_to_record,
            )
            .optional()
        })
    }

    /// Aggregate size over direct children
    ///
    /// Only reflects children that have themselves been indexed; a
    /// directory whose children were never visited under-reports until
    /// indexing catches up.
    pub fn sum_child_sizes(&self, parent_path: &str) -> CoreResult<u64> {
        self.store.with(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COALESCE(SUM(size), 0) FROM file_metadata WHERE parent_path = ?1",
                params![parent_path],
                |r| r.get(0),
            )?;
            Ok(total.max(0) as u64)
        })
    }

    /// Update-only size restamp used by the upward ancestor walk
    ///
    /// A path with no row is left absent; the walk never materializes
    /// records for unindexed ancestors.
    pub fn set_size(&self, path: &str, size: u64) -> CoreResult<()> {
        let now = self.clock.now_secs();
        self.store.with(|conn| {
            conn.execute(
                "UPDATE file_metadata SET size = ?1, last_indexed = ?2 WHERE path = ?3",
                params![size as i64, now, path],
            )?;
            Ok(())
        })
    }

    /// Remove the record and every record under `path + '/'`
    pub fn delete_subtree(&self, path: &str) -> CoreResult<usize> {
        self.store.with(|conn| {
            let changed = conn.execute(
                "DELETE FROM file_metadata WHERE path = ?1 OR path LIKE ?1 || '/%'",
                params![path],
            )?;
            Ok(changed)
        })
    }
}
