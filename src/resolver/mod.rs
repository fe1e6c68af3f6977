/*!
 * Path Resolver
 * Translates (identity, virtual path) into a physical location
 */

use path_clean::clean;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::{CoreError, CoreResult, Identity, UserRef};
use crate::registry::PathRegistry;

/// Marker resolving to the synthesized all-users index
pub const ALL_MARKER: &str = "/all";

/// Outcome of a resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// A concrete filesystem location
    Physical(PathBuf),
    /// The synthesized all-users index; served by the caller, not the
    /// filesystem
    UserIndex,
}

impl Resolved {
    /// Unwrap the physical path or fail for virtual targets
    pub fn into_physical(self) -> CoreResult<PathBuf> {
        match self {
            Resolved::Physical(path) => Ok(path),
            Resolved::UserIndex => Err(CoreError::InvalidPath(
                "the user index has no physical location".to_string(),
            )),
        }
    }
}

/// Pre-resolved legacy absolute paths (drive-letter form) pass through
/// untouched. A bare `/`-rooted string cannot serve as this test since
/// every virtual path is `/`-rooted.
fn is_native_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes.len() == 2 || bytes[2] == b'/' || bytes[2] == b'\\')
}

/// Directory-shaped virtual paths (trailing separator or no extension)
/// are created on demand; file-shaped ones get their parent created.
fn is_dir_shaped(virtual_path: &str) -> bool {
    virtual_path.ends_with('/') || Path::new(virtual_path).extension().is_none()
}

/// First path segment and the remainder after it
fn split_first_segment(virtual_path: &str) -> (&str, Option<&str>) {
    let trimmed = virtual_path.trim_start_matches('/');
    match trimmed.split_once('/') {
        Some((first, rest)) => (first, (!rest.is_empty()).then_some(rest)),
        None => (trimmed, None),
    }
}

/// The single translation point from virtual paths to physical paths
///
/// Every file-affecting operation resolves through here. Resolution is
/// idempotently side-effecting: missing directories along the resolved
/// path are created before it is returned. The registry is never
/// mutated by resolution.
#[derive(Clone)]
pub struct PathResolver {
    registry: PathRegistry,
}

impl PathResolver {
    pub fn new(registry: PathRegistry) -> Self {
        Self { registry }
    }

    /// Resolve a virtual path for the given identity
    ///
    /// Fails with `NotFound` when no mapping covers the path, and with
    /// `Forbidden` when a non-privileged identity reaches into another
    /// user's namespace.
    pub fn resolve(&self, identity: &Identity, virtual_path: &str) -> CoreResult<Resolved> {
        if virtual_path.contains("..") {
            return Err(CoreError::InvalidPath(format!(
                "path traversal rejected: {virtual_path}"
            )));
        }
        if is_native_absolute(virtual_path) {
            debug!(path = virtual_path, "native absolute path passed through");
            return Ok(Resolved::Physical(PathBuf::from(virtual_path)));
        }

        let normalized = virtual_path.replace('\\', "/");
        let dir_shaped = is_dir_shaped(&normalized);
        let cleaned = if normalized.is_empty() {
            "/".to_string()
        } else {
            clean(&normalized).to_string_lossy().into_owned()
        };

        // Root and the all-users marker
        if cleaned == "/" || cleaned == ALL_MARKER {
            if identity.is_admin() {
                return Ok(Resolved::UserIndex);
            }
            if cleaned == "/" {
                let home = self.registry.home_for(&identity.username)?.ok_or_else(|| {
                    CoreError::NotFound(format!(
                        "no home mapping for user {}",
                        identity.username
                    ))
                })?;
                let path = PathBuf::from(home.real_path);
                self.ensure_dirs(&path, true)?;
                return Ok(Resolved::Physical(path));
            }
            // A non-privileged /all falls through to ordinary resolution
        }

        let (first, rest) = split_first_segment(&cleaned);
        if !first.is_empty() && first != identity.username {
            if let Some(home) = self.registry.home_for(first)? {
                if !identity.is_admin() {
                    return Err(CoreError::Forbidden(format!(
                        "user {} may not browse /{first}",
                        identity.username
                    )));
                }
                let mut path = PathBuf::from(home.real_path);
                if let Some(rest) = rest {
                    path.push(rest);
                }
                self.ensure_dirs(&path, dir_shaped)?;
                return Ok(Resolved::Physical(path));
            }
            if identity.is_admin() {
                // Unknown segment under a privileged identity: an
                // ordinary sub-directory of its own home, created on
                // demand.
                let own = self.registry.home_for(&identity.username)?.ok_or_else(|| {
                    CoreError::NotFound(format!(
                        "no home mapping for user {}",
                        identity.username
                    ))
                })?;
                let mut path = PathBuf::from(own.real_path);
                path.push(first);
                if let Some(rest) = rest {
                    path.push(rest);
                }
                self.ensure_dirs(&path, dir_shaped)?;
                return Ok(Resolved::Physical(path));
            }
        }

        // Own namespace: exact match, then longest registered prefix
        let mapping = self
            .registry
            .mapping_for(&UserRef::Name(identity.username.clone()), &cleaned)?
            .ok_or_else(|| CoreError::NotFound(format!("no mapping resolves {cleaned}")))?;
        let path = PathBuf::from(mapping.splice(&cleaned));
        self.ensure_dirs(&path, dir_shaped)?;
        Ok(Resolved::Physical(path))
    }

    fn ensure_dirs(&self, path: &Path, dir_shaped: bool) -> CoreResult<()> {
        let target = if dir_shaped { Some(path) } else { path.parent() };
        if let Some(target) = target {
            if !target.as_os_str().is_empty() {
                fs::create_dir_all(target)
                    .map_err(|e| CoreError::from_io(e, format!("create {}", target.display())))?;
            }
        }
        Ok(())
    }
}
