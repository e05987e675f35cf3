//! Name collision policies and target resolution.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shellward_core::{FileSystemStatusCode, FsError, FsResult};
use tracing::warn;
use uuid::Uuid;

/// What to do when the destination name already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CollisionPolicy {
    /// Pick "name (1).ext", "name (2).ext", ... instead.
    #[default]
    GenerateUniqueName,
    /// Overwrite the existing item. Not undoable.
    ReplaceExisting,
    /// Abort with `AlreadyExists`.
    FailIfExists,
}

/// Per-item choice made by the user for a batch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ConflictResolveOption {
    /// No conflict was detected for this item.
    #[default]
    None,
    GenerateNewName,
    ReplaceExisting,
    /// Leave this item out of both execution and history.
    Skip,
}

impl ConflictResolveOption {
    /// The collision policy a single-item call should use, or `None` for `Skip`.
    pub fn policy(&self) -> Option<CollisionPolicy> {
        match self {
            Self::None | Self::GenerateNewName => Some(CollisionPolicy::GenerateUniqueName),
            Self::ReplaceExisting => Some(CollisionPolicy::ReplaceExisting),
            Self::Skip => None,
        }
    }

    /// Check if this item is skipped.
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip)
    }
}

impl From<CollisionPolicy> for ConflictResolveOption {
    fn from(policy: CollisionPolicy) -> Self {
        match policy {
            CollisionPolicy::GenerateUniqueName => Self::GenerateNewName,
            CollisionPolicy::ReplaceExisting => Self::ReplaceExisting,
            CollisionPolicy::FailIfExists => Self::None,
        }
    }
}

/// A destination after applying a collision policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub path: PathBuf,
    /// An existing item was moved aside to make room.
    pub replaced: bool,
    backup: Option<PathBuf>,
}

impl ResolvedTarget {
    pub fn new(path: impl Into<PathBuf>, replaced: bool) -> Self {
        Self {
            path: path.into(),
            replaced,
            backup: None,
        }
    }

    /// Where the displaced item waits until the new one is in place.
    pub fn backup(&self) -> Option<&Path> {
        self.backup.as_deref()
    }

    /// Discard the displaced item.
    pub fn commit(&self) {
        let Some(backup) = &self.backup else {
            return;
        };
        if let Err(e) = remove_any(backup) {
            warn!(target: "shellward::collision", backup = %backup.display(), error = %e, "Failed to remove replaced item");
        }
    }

    /// Put the displaced item back, dropping whatever a failed transfer left
    /// at the target.
    pub fn rollback(&self) {
        let Some(backup) = &self.backup else {
            return;
        };
        if fs::symlink_metadata(&self.path).is_ok() {
            let _ = remove_any(&self.path);
        }
        if let Err(e) = fs::rename(backup, &self.path) {
            warn!(
                target: "shellward::collision",
                backup = %backup.display(),
                path = %self.path.display(),
                error = %e,
                "Failed to restore replaced item"
            );
        }
    }
}

fn remove_any(path: &Path) -> std::io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Hidden sibling of `path` that holds it while it is being replaced.
fn backup_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.replaced", Uuid::new_v4().simple()))
}

/// Apply `policy` to `destination`.
///
/// For `ReplaceExisting` the existing item is moved to a hidden sibling;
/// the caller must [`commit`](ResolvedTarget::commit) or
/// [`rollback`](ResolvedTarget::rollback) once the transfer is done.
pub fn resolve_target(destination: &Path, policy: CollisionPolicy) -> FsResult<ResolvedTarget> {
    if fs::symlink_metadata(destination).is_err() {
        return Ok(ResolvedTarget::new(destination, false));
    }

    match policy {
        CollisionPolicy::FailIfExists => Err(FsError::new(
            FileSystemStatusCode::AlreadyExists,
            destination,
            "Destination already exists",
        )),
        CollisionPolicy::GenerateUniqueName => Ok(ResolvedTarget::new(unique_path(destination), false)),
        CollisionPolicy::ReplaceExisting => {
            let backup = backup_path(destination);
            fs::rename(destination, &backup).map_err(|e| FsError::io(destination, e))?;
            Ok(ResolvedTarget {
                path: destination.to_path_buf(),
                replaced: true,
                backup: Some(backup),
            })
        }
    }
}

/// Resolve `destination` and run `place` on the result.
///
/// A replaced item is only discarded after `place` succeeds; on failure it
/// is restored.
pub fn place_at<F>(destination: &Path, policy: CollisionPolicy, place: F) -> FsResult<ResolvedTarget>
where
    F: FnOnce(&Path) -> FsResult<()>,
{
    let resolved = resolve_target(destination, policy)?;
    match place(&resolved.path) {
        Ok(()) => {
            resolved.commit();
            Ok(resolved)
        }
        Err(e) => {
            resolved.rollback();
            Err(e)
        }
    }
}

/// Generate a path that does not exist yet.
///
/// For "file.txt", tries "file (1).txt", "file (2).txt", etc.
pub fn unique_path(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new(""));
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    let extension = path.extension().and_then(|e| e.to_str());

    for i in 1..1000 {
        let new_name = match extension {
            Some(ext) => format!("{stem} ({i}).{ext}"),
            None => format!("{stem} ({i})"),
        };

        let new_path = parent.join(&new_name);
        if fs::symlink_metadata(&new_path).is_err() {
            return new_path;
        }
    }

    // Fallback: use timestamp
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let new_name = match extension {
        Some(ext) => format!("{stem}_{timestamp}.{ext}"),
        None => format!("{stem}_{timestamp}"),
    };

    parent.join(&new_name)
}
