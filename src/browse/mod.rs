/*!
 * Directory Browsing
 * Listing assembly with cached directory sizes and background refresh
 */

pub mod filter;

pub use filter::{DateRange, FileKind, ListOptions, SizeRange, SortBy, SortOrder};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::warn;
use uuid::Uuid;

use crate::cache::MetadataCache;
use crate::core::{CoreError, CoreResult, Identity};
use crate::indexer::Indexer;
use crate::resolver::{PathResolver, Resolved};
use crate::users::UserStore;

/// Entry category served to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Folder,
    File,
}

/// One served listing entry
///
/// File sizes come from a live stat; directory sizes come from the
/// metadata cache and may lag the filesystem until the next index pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FileInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Unix seconds, filesystem-sourced
    pub modified: i64,
    /// Virtual path of the entry
    pub path: String,
}

impl FileInfo {
    fn is_folder(&self) -> bool {
        self.entry_type == EntryType::Folder
    }

    fn kind(&self) -> FileKind {
        match self.entry_type {
            EntryType::Folder => FileKind::Folder,
            EntryType::File => FileKind::classify(self.extension.as_deref().unwrap_or("")),
        }
    }
}

/// Page metadata accompanying a listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Pagination {
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

/// A served directory listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Listing {
    pub files: Vec<FileInfo>,
    pub pagination: Pagination,
}

/// Append an entry name to a virtual path
fn join_virtual(base: &str, name: &str) -> String {
    if base == "/" {
        format!("/{name}")
    } else {
        format!("{}/{name}", base.trim_end_matches('/'))
    }
}

/// Listing assembly over resolved directories
#[derive(Clone)]
pub struct Browser {
    resolver: PathResolver,
    cache: MetadataCache,
    indexer: Indexer,
    users: UserStore,
}

impl Browser {
    pub fn new(
        resolver: PathResolver,
        cache: MetadataCache,
        indexer: Indexer,
        users: UserStore,
    ) -> Self {
        Self {
            resolver,
            cache,
            indexer,
            users,
        }
    }

    /// List a virtual directory for the given identity
    ///
    /// Entries with a missing or stale cache record get an asynchronous
    /// refresh dispatched without blocking the response; the served
    /// listing may show a size computed on a previous pass until the
    /// refresh completes.
    pub fn list_directory(
        &self,
        identity: &Identity,
        virtual_path: &str,
        opts: &ListOptions,
    ) -> CoreResult<Listing> {
        // A non-privileged "/" resolves to the home directory; serve
        // entry paths rooted at the canonical home prefix so they
        // resolve back.
        let base_virtual = if virtual_path == "/" && !identity.is_admin() {
            format!("/{}", identity.username)
        } else {
            virtual_path.to_string()
        };

        let mut infos = match self.resolver.resolve(identity, virtual_path)? {
            Resolved::UserIndex => self.user_index()?,
            Resolved::Physical(dir) => self.read_entries(&dir, &base_virtual)?,
        };

        self.apply_filters(&mut infos, opts);
        let total = infos.len();
        self.sort(&mut infos, opts);

        let page = opts.page.max(1);
        let limit = opts.limit.max(1);
        let files: Vec<FileInfo> = infos
            .into_iter()
            .skip((page - 1) * limit)
            .take(limit)
            .collect();

        Ok(Listing {
            files,
            pagination: Pagination {
                total,
                page,
                limit,
                total_pages: total.div_ceil(limit),
            },
        })
    }

    /// One synthesized folder per registered user
    fn user_index(&self) -> CoreResult<Vec<FileInfo>> {
        let now = self.cache.now_secs();
        Ok(self
            .users
            .all()?
            .into_iter()
            .map(|user| FileInfo {
                id: Uuid::new_v4().to_string(),
                name: user.username.clone(),
                entry_type: EntryType::Folder,
                extension: None,
                size: Some(0),
                modified: now,
                path: format!("/{}", user.username),
            })
            .collect())
    }

    fn read_entries(&self, dir: &Path, current_virtual: &str) -> CoreResult<Vec<FileInfo>> {
        let meta = fs::metadata(dir)
            .map_err(|e| CoreError::from_io(e, format!("stat {}", dir.display())))?;
        if !meta.is_dir() {
            return Err(CoreError::InvalidPath(format!(
                "{} is not a directory",
                dir.display()
            )));
        }

        let entries = fs::read_dir(dir)
            .map_err(|e| CoreError::from_io(e, format!("read {}", dir.display())))?;
        let mut infos = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            let entry_virtual = join_virtual(current_virtual, &name);
            match self.file_info(&entry.path(), entry_virtual) {
                Ok(info) => infos.push(info),
                Err(e) => {
                    warn!(entry = %entry.path().display(), error = %e, "skipping entry")
                }
            }
        }
        Ok(infos)
    }

    fn file_info(&self, path: &Path, virtual_path: String) -> CoreResult<FileInfo> {
        let meta = fs::metadata(path)
            .map_err(|e| CoreError::from_io(e, format!("stat {}", path.display())))?;
        let is_dir = meta.is_dir();
        let path_key = path.to_string_lossy();

        let record = self.cache.get(&path_key)?;
        let size = if is_dir {
            record.as_ref().map(|r| r.size)
        } else {
            Some(meta.len())
        };

        // Stale-while-revalidate: serve what we have, refresh behind
        // the response.
        let needs_refresh = match &record {
            None => true,
            Some(record) => record.is_stale(self.cache.now_secs()),
        };
        if needs_refresh {
            self.indexer
                .spawn_update(path.to_path_buf(), virtual_path.clone());
        }

        let extension = if is_dir {
            None
        } else {
            path.extension()
                .map(|e| e.to_string_lossy().to_lowercase())
        };
        let modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        Ok(FileInfo {
            id: Uuid::new_v4().to_string(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path_key.into_owned()),
            entry_type: if is_dir {
                EntryType::Folder
            } else {
                EntryType::File
            },
            extension,
            size,
            modified,
            path: virtual_path,
        })
    }

    fn apply_filters(&self, infos: &mut Vec<FileInfo>, opts: &ListOptions) {
        if let Some(search) = opts.search.as_deref().filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            infos.retain(|f| f.name.to_lowercase().contains(&needle));
        }
        if let Some(kind) = opts.kind {
            infos.retain(|f| f.kind() == kind);
        }
        if let Some(extension) = opts.extension.as_deref().filter(|e| !e.is_empty()) {
            let wanted = extension.to_lowercase();
            infos.retain(|f| f.extension.as_deref() == Some(wanted.as_str()));
        }
        if opts.size_range != SizeRange::All {
            // Folders are excluded from size filtering
            infos.retain(|f| !f.is_folder() && opts.size_range.matches(f.size.unwrap_or(0)));
        }
        if opts.date_range != DateRange::All {
            let now = self.cache.now_secs();
            infos.retain(|f| opts.date_range.matches(f.modified, now));
        }
    }

    fn sort(&self, infos: &mut [FileInfo], opts: &ListOptions) {
        infos.sort_by(|a, b| {
            use std::cmp::Ordering;
            // Folders always sort before files
            match (a.is_folder(), b.is_folder()) {
                (true, false) => return Ordering::Less,
                (false, true) => return Ordering::Greater,
                _ => {}
            }
            let ord = match opts.sort_by {
                SortBy::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
                SortBy::Modified => a.modified.cmp(&b.modified),
                SortBy::Size => a.size.unwrap_or(0).cmp(&b.size.unwrap_or(0)),
            };
            match opts.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
    }
}
