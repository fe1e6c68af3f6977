/*!
 * File Operations
 * Mutations over resolved virtual paths
 */

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::core::{CoreError, CoreResult, Identity};
use crate::indexer::Indexer;
use crate::resolver::PathResolver;
use crate::users::{Permission, UserStore};

/// Per-path outcome of a batch mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PathOutcome {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CoreError>,
}

/// Results of a multi-path mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BatchOutcome {
    pub results: Vec<PathOutcome>,
}

impl BatchOutcome {
    #[must_use]
    pub fn all_ok(&self) -> bool {
        self.results.iter().all(|r| r.error.is_none())
    }
}

/// Virtual path of an entry's parent directory
fn parent_virtual(virtual_path: &str) -> &str {
    match virtual_path.trim_end_matches('/').rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &virtual_path[..idx],
    }
}

/// Append an entry name to a virtual path
fn join_virtual(base: &str, name: &str) -> String {
    if base == "/" {
        format!("/{name}")
    } else {
        format!("{}/{name}", base.trim_end_matches('/'))
    }
}

/// Mutation operations over the virtual namespace
///
/// Each operation resolves every virtual path involved exactly once,
/// performs the physical operation, then refreshes the affected
/// metadata so ancestor sizes stay consistent. Metadata refresh
/// failures are logged, never surfaced: the cache must not cause a
/// completed physical operation to fail.
#[derive(Clone)]
pub struct FileOps {
    resolver: PathResolver,
    indexer: Indexer,
    users: UserStore,
}

impl FileOps {
    pub fn new(resolver: PathResolver, indexer: Indexer, users: UserStore) -> Self {
        Self {
            resolver,
            indexer,
            users,
        }
    }

    fn check_permission(&self, identity: &Identity, permission: Permission) -> CoreResult<()> {
        let user = self
            .users
            .get(identity.id)?
            .ok_or_else(|| CoreError::Forbidden(format!("unknown user {}", identity.username)))?;
        if !user.can(permission) {
            return Err(CoreError::Forbidden(format!(
                "user {} lacks the {permission} permission",
                identity.username
            )));
        }
        Ok(())
    }

    fn refresh(&self, path: &Path, virtual_path: &str) {
        if let Err(e) = self.indexer.update_metadata(path, virtual_path) {
            warn!(path = %path.display(), error = %e, "metadata refresh failed");
        }
    }

    fn forget(&self, path: &Path) {
        if let Err(e) = self.indexer.delete_metadata(path) {
            warn!(path = %path.display(), error = %e, "metadata removal failed");
        }
    }

    /// Rename an entry in place; returns the new virtual path
    pub fn rename(
        &self,
        identity: &Identity,
        virtual_path: &str,
        new_name: &str,
    ) -> CoreResult<String> {
        self.check_permission(identity, Permission::Rename)?;
        let old_physical = self
            .resolver
            .resolve(identity, virtual_path)?
            .into_physical()?;
        if !old_physical.exists() {
            return Err(CoreError::NotFound(format!("{virtual_path} does not exist")));
        }

        let parent = old_physical.parent().ok_or_else(|| {
            CoreError::InvalidPath(format!("{virtual_path} has no parent directory"))
        })?;
        let new_physical = parent.join(new_name);
        if new_physical.exists() {
            return Err(CoreError::Conflict(format!(
                "an entry named {new_name} already exists"
            )));
        }

        fs::rename(&old_physical, &new_physical)
            .map_err(|e| CoreError::from_io(e, format!("rename {virtual_path}")))?;

        let new_virtual = join_virtual(parent_virtual(virtual_path), new_name);
        self.forget(&old_physical);
        self.refresh(&new_physical, &new_virtual);
        Ok(new_virtual)
    }

    /// Delete files or directories; directories are removed recursively
    pub fn delete(&self, identity: &Identity, virtual_paths: &[String]) -> CoreResult<BatchOutcome> {
        self.check_permission(identity, Permission::Delete)?;
        let mut results = Vec::with_capacity(virtual_paths.len());
        for virtual_path in virtual_paths {
            let outcome = self.delete_one(identity, virtual_path);
            results.push(PathOutcome {
                path: virtual_path.clone(),
                new_path: None,
                error: outcome.err(),
            });
        }
        Ok(BatchOutcome { results })
    }

    fn delete_one(&self, identity: &Identity, virtual_path: &str) -> CoreResult<()> {
        let physical = self
            .resolver
            .resolve(identity, virtual_path)?
            .into_physical()?;
        let meta = fs::metadata(&physical)
            .map_err(|e| CoreError::from_io(e, format!("stat {virtual_path}")))?;
        if meta.is_dir() {
            fs::remove_dir_all(&physical)
                .map_err(|e| CoreError::from_io(e, format!("delete {virtual_path}")))?;
        } else {
            fs::remove_file(&physical)
                .map_err(|e| CoreError::from_io(e, format!("delete {virtual_path}")))?;
        }
        self.forget(&physical);
        Ok(())
    }

    /// Move entries into a destination directory
    pub fn move_entries(
        &self,
        identity: &Identity,
        virtual_paths: &[String],
        destination: &str,
    ) -> CoreResult<BatchOutcome> {
        self.check_permission(identity, Permission::Move)?;
        let dest_physical = self
            .resolver
            .resolve(identity, destination)?
            .into_physical()?;
        let dest_meta = fs::metadata(&dest_physical)
            .map_err(|e| CoreError::from_io(e, format!("stat {destination}")))?;
        if !dest_meta.is_dir() {
            return Err(CoreError::InvalidPath(format!(
                "{destination} is not a directory"
            )));
        }

        let mut results = Vec::with_capacity(virtual_paths.len());
        for virtual_path in virtual_paths {
            match self.move_one(identity, virtual_path, destination, &dest_physical) {
                Ok(new_virtual) => results.push(PathOutcome {
                    path: virtual_path.clone(),
                    new_path: Some(new_virtual),
                    error: None,
                }),
                Err(e) => results.push(PathOutcome {
                    path: virtual_path.clone(),
                    new_path: None,
                    error: Some(e),
                }),
            }
        }
        Ok(BatchOutcome { results })
    }

    fn move_one(
        &self,
        identity: &Identity,
        virtual_path: &str,
        destination: &str,
        dest_physical: &Path,
    ) -> CoreResult<String> {
        let source = self
            .resolver
            .resolve(identity, virtual_path)?
            .into_physical()?;
        if !source.exists() {
            return Err(CoreError::NotFound(format!("{virtual_path} does not exist")));
        }

        let name = source
            .file_name()
            .ok_or_else(|| CoreError::InvalidPath(format!("{virtual_path} has no file name")))?
            .to_string_lossy()
            .into_owned();
        let target = dest_physical.join(&name);
        if target.exists() {
            return Err(CoreError::Conflict(format!(
                "an entry named {name} already exists at {destination}"
            )));
        }

        fs::rename(&source, &target)
            .map_err(|e| CoreError::from_io(e, format!("move {virtual_path}")))?;

        let new_virtual = join_virtual(destination, &name);
        self.forget(&source);
        self.refresh(&target, &new_virtual);
        Ok(new_virtual)
    }

    /// Create a directory under a parent virtual path
    pub fn mkdir(&self, identity: &Identity, parent: &str, name: &str) -> CoreResult<String> {
        self.check_permission(identity, Permission::Write)?;
        let parent_physical = self.resolver.resolve(identity, parent)?.into_physical()?;
        let target = parent_physical.join(name);
        if target.exists() {
            return Err(CoreError::Conflict(format!(
                "an entry named {name} already exists"
            )));
        }

        fs::create_dir_all(&target)
            .map_err(|e| CoreError::from_io(e, format!("create directory {name}")))?;

        let new_virtual = join_virtual(parent, name);
        self.refresh(&target, &new_virtual);
        Ok(new_virtual)
    }

    /// Create an empty file under a parent virtual path
    pub fn touch(&self, identity: &Identity, parent: &str, name: &str) -> CoreResult<String> {
        self.check_permission(identity, Permission::Write)?;
        let parent_physical = self.resolver.resolve(identity, parent)?.into_physical()?;
        let target = parent_physical.join(name);
        if target.exists() {
            return Err(CoreError::Conflict(format!(
                "an entry named {name} already exists"
            )));
        }

        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .map_err(|e| CoreError::from_io(e, format!("create file {name}")))?;

        let new_virtual = join_virtual(parent, name);
        self.refresh(&target, &new_virtual);
        Ok(new_virtual)
    }
}
