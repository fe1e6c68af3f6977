/*!
 * File Indexer
 * Recursive size aggregation and metadata refresh
 */

pub mod scheduler;

pub use scheduler::IndexScheduler;

use ahash::RandomState;
use dashmap::DashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

use crate::cache::MetadataCache;
use crate::core::{CoreError, CoreResult};
use crate::registry::PathRegistry;

fn mtime_secs(meta: &fs::Metadata) -> Option<i64> {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Append an entry name to a virtual path
fn join_virtual(base: &str, name: &str) -> String {
    if base == "/" {
        format!("/{name}")
    } else {
        format!("{}/{name}", base.trim_end_matches('/'))
    }
}

/// Boundary at which the upward ancestor walk stops: empty, `.`, `..`,
/// or the filesystem root
fn is_root_boundary(path: &Path) -> bool {
    let s = path.as_os_str();
    s.is_empty() || s == "." || s == ".." || path.parent().is_none()
}

/// Recursive depth-first indexer over the physical tree
///
/// All writes are idempotent recomputations from the live filesystem;
/// a racing write is superseded by the next pass, never accumulated.
#[derive(Clone)]
pub struct Indexer {
    cache: MetadataCache,
    registry: PathRegistry,
    in_flight: Arc<DashSet<PathBuf, RandomState>>,
    sweeping: Arc<AtomicBool>,
}

impl Indexer {
    pub fn new(cache: MetadataCache, registry: PathRegistry) -> Self {
        Self {
            cache,
            registry,
            in_flight: Arc::new(DashSet::with_hasher(RandomState::new())),
            sweeping: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// Index one file or directory tree, returning the aggregated size
    ///
    /// Errors on individual entries are logged and contribute zero; one
    /// bad entry never aborts its siblings. A failed entry gets no row.
    pub fn index_entry(&self, path: &Path, virtual_path: &str, parent: Option<&Path>) -> u64 {
        match self.try_index(path, virtual_path, parent) {
            Ok(size) => size,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "indexing failed");
                0
            }
        }
    }

    fn try_index(
        &self,
        path: &Path,
        virtual_path: &str,
        parent: Option<&Path>,
    ) -> CoreResult<u64> {
        let meta = fs::metadata(path)
            .map_err(|e| CoreError::from_io(e, format!("stat {}", path.display())))?;
        let is_dir = meta.is_dir();
        let mut total = 0u64;

        if !is_dir {
            total = meta.len();
        } else {
            match fs::read_dir(path) {
                Ok(entries) => {
                    for entry in entries {
                        let entry = match entry {
                            Ok(entry) => entry,
                            Err(e) => {
                                warn!(
                                    dir = %path.display(),
                                    error = %e,
                                    "skipping unreadable directory entry"
                                );
                                continue;
                            }
                        };
                        let child_path = entry.path();
                        let child_name = entry.file_name().to_string_lossy().into_owned();
                        let child_virtual = join_virtual(virtual_path, &child_name);
                        total += self.index_entry(&child_path, &child_virtual, Some(path));
                    }
                }
                Err(e) => {
                    warn!(dir = %path.display(), error = %e, "directory read failed");
                }
            }
        }

        self.cache.upsert(
            &path.to_string_lossy(),
            &display_name(path),
            is_dir,
            total,
            mtime_secs(&meta),
            parent.map(|p| p.to_string_lossy().into_owned()).as_deref(),
            virtual_path,
        )?;
        Ok(total)
    }

    /// Re-index one path, then propagate size changes to ancestors
    ///
    /// The upward walk recomputes each enclosing directory from its
    /// direct children's cached sizes, so a single file change keeps
    /// every folder size consistent without a full-tree re-scan.
    pub fn update_metadata(&self, path: &Path, virtual_path: &str) -> CoreResult<()> {
        let parent = path
            .parent()
            .filter(|p| !is_root_boundary(p))
            .map(Path::to_path_buf);
        self.index_entry(path, virtual_path, parent.as_deref());
        if let Some(parent) = parent {
            self.propagate_sizes(&parent)?;
        }
        Ok(())
    }

    /// Remove a path's cached subtree, then recompute ancestors
    pub fn delete_metadata(&self, path: &Path) -> CoreResult<()> {
        self.cache.delete_subtree(&path.to_string_lossy())?;
        if let Some(parent) = path.parent() {
            self.propagate_sizes(parent)?;
        }
        Ok(())
    }

    fn propagate_sizes(&self, start: &Path) -> CoreResult<()> {
        let mut dir = start.to_path_buf();
        loop {
            if is_root_boundary(&dir) {
                break;
            }
            let total = self.cache.sum_child_sizes(&dir.to_string_lossy())?;
            self.cache.set_size(&dir.to_string_lossy(), total)?;
            match dir.parent() {
                Some(parent) if parent != dir => dir = parent.to_path_buf(),
                _ => break,
            }
        }
        Ok(())
    }

    /// Full sweep over every registered root
    ///
    /// Returns false when a sweep is already running; overlapping
    /// sweeps are skipped rather than stacked.
    pub fn index_all_roots(&self) -> CoreResult<bool> {
        if self
            .sweeping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("index sweep already running, skipping");
            return Ok(false);
        }

        let result = (|| {
            let mappings = self.registry.all()?;
            debug!(roots = mappings.len(), "index sweep starting");
            for mapping in &mappings {
                debug!(
                    root = %mapping.real_path,
                    virtual_path = %mapping.virtual_path,
                    "indexing root"
                );
                self.index_entry(Path::new(&mapping.real_path), &mapping.virtual_path, None);
            }
            Ok(true)
        })();
        self.sweeping.store(false, Ordering::Release);
        result
    }

    /// Fire-and-forget background refresh, de-duplicated per path
    ///
    /// Dispatched to the runtime's blocking pool so the calling request
    /// path never awaits indexing. Outside a runtime the refresh is
    /// skipped; the record stays stale until the next sweep.
    pub fn spawn_update(&self, path: PathBuf, virtual_path: String) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(path = %path.display(), "no async runtime, background refresh skipped");
            return;
        };
        if !self.in_flight.insert(path.clone()) {
            return;
        }

        let indexer = self.clone();
        handle.spawn(async move {
            let worker = indexer.clone();
            let target = path.clone();
            let virtual_target = virtual_path.clone();
            let joined = tokio::task::spawn_blocking(move || {
                worker.update_metadata(&target, &virtual_target)
            })
            .await;
            match joined {
                Ok(Err(e)) => {
                    warn!(path = %path.display(), error = %e, "background refresh failed")
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "background refresh panicked")
                }
                Ok(Ok(())) => {}
            }
            indexer.in_flight.remove(&path);
        });
    }
}
