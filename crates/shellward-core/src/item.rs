//! Typed filesystem paths.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FsError, FsResult};

/// What kind of entry a path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum FilesystemItemType {
    File,
    Directory,
    /// Kept for wire compatibility; no operation produces it.
    Symlink,
}

impl FilesystemItemType {
    /// Classify existing metadata.
    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        if metadata.is_dir() {
            Self::Directory
        } else {
            Self::File
        }
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory)
    }
}

/// A filesystem entry that may or may not currently exist.
///
/// Operations record these for the "before" and "after" side of a
/// [`StorageHistory`](crate::StorageHistory). Values are never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathWithType {
    pub path: PathBuf,
    pub item_type: FilesystemItemType,
}

impl PathWithType {
    /// Create a new typed path.
    pub fn new(path: impl Into<PathBuf>, item_type: FilesystemItemType) -> Self {
        Self {
            path: path.into(),
            item_type,
        }
    }

    /// Create a typed path for a file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(path, FilesystemItemType::File)
    }

    /// Create a typed path for a directory.
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self::new(path, FilesystemItemType::Directory)
    }

    /// Resolve an existing path, reading its type from the filesystem.
    pub fn resolve(path: impl Into<PathBuf>) -> FsResult<Self> {
        let path = path.into();
        let metadata = fs::metadata(&path).map_err(|e| FsError::io(&path, e))?;
        Ok(Self::new(path, FilesystemItemType::from_metadata(&metadata)))
    }

    /// The same item type at a different location.
    pub fn with_path(&self, path: impl Into<PathBuf>) -> Self {
        Self::new(path, self.item_type)
    }

    /// The final path component, if any.
    pub fn name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    /// The containing directory, if any.
    pub fn parent(&self) -> Option<&Path> {
        self.path.parent()
    }

    /// Whether the item has no usable path (e.g. it came from a read-only
    /// transfer buffer and only a storage handle exists).
    pub fn has_no_path(&self) -> bool {
        self.path.as_os_str().to_string_lossy().trim().is_empty()
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.item_type.is_dir()
    }
}

impl std::fmt::Display for PathWithType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.path.display(), self.item_type)
    }
}
