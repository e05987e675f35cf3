//! Blocking filesystem primitives used by the façades and the helper.
//!
//! Every function here runs on a blocking thread (see
//! [`run_blocking`]) and maps `std::io::Error` into [`FsError`].

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use shellward_core::{FileSystemStatusCode, FsError, FsResult};
use tokio_util::sync::CancellationToken;

/// Limits for recursive directory walks.
#[derive(Debug, Clone)]
pub struct WalkLimits {
    pub max_depth: u32,
    pub cancel: CancellationToken,
}

impl WalkLimits {
    pub fn new(max_depth: u32, cancel: CancellationToken) -> Self {
        Self { max_depth, cancel }
    }

    fn check(&self, path: &Path, depth: u32) -> FsResult<()> {
        if self.cancel.is_cancelled() {
            return Err(FsError::cancelled(path));
        }
        if depth > self.max_depth {
            return Err(FsError::generic(
                path,
                format!("Directory nesting exceeds {} levels", self.max_depth),
            ));
        }
        Ok(())
    }
}

/// Run a blocking closure on tokio's blocking pool.
pub async fn run_blocking<T, F>(path: &Path, f: F) -> FsResult<T>
where
    F: FnOnce() -> FsResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| FsError::generic(path, format!("Task failed: {e}")))?
}

/// Copy a single file with the OS copy call.
pub fn copy_file(source: &Path, dest: &Path) -> FsResult<()> {
    fs::copy(source, dest).map_err(|e| FsError::io(source, e))?;
    Ok(())
}

/// Copy a file by streaming its contents through handles.
///
/// Slower than [`copy_file`] but works where the OS copy call refuses,
/// for instance on special files or some network shares.
pub fn stream_copy_file(source: &Path, dest: &Path) -> FsResult<()> {
    let mut reader = File::open(source).map_err(|e| FsError::io(source, e))?;
    let mut writer = File::create(dest).map_err(|e| FsError::io(dest, e))?;
    io::copy(&mut reader, &mut writer).map_err(|e| FsError::io(dest, e))?;

    if let Ok(metadata) = reader.metadata() {
        let _ = fs::set_permissions(dest, metadata.permissions());
    }
    Ok(())
}

/// Recursively clone a directory: create `dest`, copy each child file and
/// recurse into each child folder, depth first.
///
/// Cancellation and the depth bound are checked on every recursive call.
pub fn clone_directory(source: &Path, dest: &Path, limits: &WalkLimits) -> FsResult<()> {
    clone_directory_at(source, dest, limits, 0)
}

fn clone_directory_at(source: &Path, dest: &Path, limits: &WalkLimits, depth: u32) -> FsResult<()> {
    limits.check(source, depth)?;

    if dest.starts_with(source) {
        return Err(FsError::generic(dest, "Destination is inside the source folder"));
    }

    fs::create_dir_all(dest).map_err(|e| FsError::io(dest, e))?;

    let entries = fs::read_dir(source).map_err(|e| FsError::io(source, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| FsError::io(source, e))?;
        let path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if path.is_dir() {
            clone_directory_at(&path, &dest_path, limits, depth + 1)?;
        } else {
            if limits.cancel.is_cancelled() {
                return Err(FsError::cancelled(&path));
            }
            copy_file(&path, &dest_path).or_else(|_| stream_copy_file(&path, &dest_path))?;
        }
    }

    set_hidden(dest, is_hidden(source));
    Ok(())
}

/// Copy a file or directory tree.
pub fn copy_path(source: &Path, dest: &Path, limits: &WalkLimits) -> FsResult<()> {
    let metadata = fs::metadata(source).map_err(|e| FsError::io(source, e))?;
    if metadata.is_dir() {
        clone_directory(source, dest, limits)
    } else {
        copy_file(source, dest)
    }
}

/// Move a file or directory.
///
/// Tries a rename first and falls back to copy-then-delete when the
/// destination is on another volume.
pub fn move_path(source: &Path, dest: &Path, limits: &WalkLimits) -> FsResult<()> {
    if source.is_dir() && dest.starts_with(source) && dest != source {
        return Err(FsError::generic(dest, "Destination is inside the source folder"));
    }

    match fs::rename(source, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            copy_path(source, dest, limits)?;
            remove_path(source)
        }
        Err(e) => Err(FsError::io(source, e)),
    }
}

/// Move a directory by cloning it and removing the source.
///
/// Used when a plain rename of the folder is refused.
pub fn move_directory(source: &Path, dest: &Path, limits: &WalkLimits) -> FsResult<()> {
    clone_directory(source, dest, limits)?;
    remove_path(source)
}

/// Delete a file or directory tree.
pub fn remove_path(path: &Path) -> FsResult<()> {
    let metadata = fs::symlink_metadata(path).map_err(|e| FsError::io(path, e))?;
    let removed = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.map_err(|e| FsError::io(path, e))
}

/// Delete a file or directory tree, clearing read-only flags first.
pub fn force_remove(path: &Path) -> FsResult<()> {
    match remove_path(path) {
        Err(e) if e.is(FileSystemStatusCode::Unauthorized) || e.is(FileSystemStatusCode::ReadOnly) => {
            clear_readonly(path);
            remove_path(path)
        }
        other => other,
    }
}

#[allow(clippy::permissions_set_readonly_false)]
fn clear_readonly(path: &Path) {
    if let Ok(metadata) = fs::symlink_metadata(path) {
        let mut permissions = metadata.permissions();
        if permissions.readonly() {
            permissions.set_readonly(false);
            let _ = fs::set_permissions(path, permissions);
        }
    }

    if path.is_dir() {
        if let Ok(entries) = fs::read_dir(path) {
            for entry in entries.flatten() {
                clear_readonly(&entry.path());
            }
        }
    }
}

/// Create an empty directory. Fails if it exists.
pub fn create_directory(path: &Path) -> FsResult<()> {
    fs::create_dir(path).map_err(|e| FsError::io(path, e))
}

/// Path of `source` renamed to `new_name` in the same directory.
pub fn sibling_path(source: &Path, new_name: &str) -> PathBuf {
    source
        .parent()
        .map(|p| p.join(new_name))
        .unwrap_or_else(|| PathBuf::from(new_name))
}

/// Compare two paths the way a case-insensitive volume does.
pub fn same_path_ignoring_case(a: &Path, b: &Path) -> bool {
    a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
}

/// Check if a path carries the hidden attribute.
#[cfg(windows)]
pub fn is_hidden(path: &Path) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;

    fs::metadata(path)
        .map(|m| m.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0)
        .unwrap_or(false)
}

/// Check if a path is hidden (dot-prefixed).
#[cfg(not(windows))]
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

/// Apply the hidden attribute to `path`.
#[cfg(windows)]
pub fn set_hidden(path: &Path, hidden: bool) {
    if !hidden || is_hidden(path) {
        return;
    }

    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::Storage::FileSystem::{
        GetFileAttributesW, SetFileAttributesW, FILE_ATTRIBUTE_HIDDEN, INVALID_FILE_ATTRIBUTES,
    };

    let wide: Vec<u16> = path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();
    // SAFETY: `wide` is NUL-terminated and outlives both calls.
    let attributes = unsafe { GetFileAttributesW(wide.as_ptr()) };
    let ok = attributes != INVALID_FILE_ATTRIBUTES
        && unsafe { SetFileAttributesW(wide.as_ptr(), attributes | FILE_ATTRIBUTE_HIDDEN) } != 0;
    if !ok {
        tracing::warn!(
            target: "shellward::direct",
            path = %path.display(),
            error = %io::Error::last_os_error(),
            "Failed to set hidden attribute"
        );
    }
}

/// Hidden is part of the name on this platform, which copy and move keep.
#[cfg(not(windows))]
pub fn set_hidden(_path: &Path, _hidden: bool) {}
