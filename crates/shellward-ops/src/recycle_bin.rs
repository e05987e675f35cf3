//! Recycle bin access.
//!
//! Every recycled entry is stored as a payload named `$R<id><ext>` next to a
//! metadata twin `$I<id><ext>` holding its original location. Code that
//! removes a payload permanently must remove the twin as well.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shellward_core::{FilesystemItemType, FsError, FsResult, PathWithType};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::direct::{self, WalkLimits};

const PAYLOAD_PREFIX: &str = "$R";
const METADATA_PREFIX: &str = "$I";
const CLAIM_ATTEMPTS: usize = 16;

/// Extensions the recycle bin hides from the displayed original name.
const SHORTCUT_EXTENSIONS: [&str; 2] = ["lnk", "url"];

/// An entry currently in the recycle bin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecycledItem {
    /// Where the item lived before deletion, as the bin displays it.
    pub original_path: PathBuf,
    /// Where the item lives now.
    pub recycle_path: PathBuf,
    pub deleted_at: Option<DateTime<Utc>>,
    pub item_type: FilesystemItemType,
}

impl RecycledItem {
    /// Typed path of the recycled payload.
    pub fn to_path_with_type(&self) -> PathWithType {
        PathWithType::new(&self.recycle_path, self.item_type)
    }

    /// Check if this entry was deleted from `path`.
    ///
    /// Shortcut files are listed without their extension, so the comparison
    /// strips `.lnk`/`.url` from `path` as well.
    pub fn matches_original(&self, path: &Path) -> bool {
        self.original_path == path || self.original_path == strip_shortcut_extension(path)
    }
}

/// `path` without a trailing `.lnk`/`.url` extension.
pub fn strip_shortcut_extension(path: &Path) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if SHORTCUT_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)) => {
            path.with_extension("")
        }
        _ => path.to_path_buf(),
    }
}

/// The `$I` metadata twin of a recycled `$R` payload, if `path` is one.
pub fn metadata_twin(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let rest = name.strip_prefix(PAYLOAD_PREFIX)?;
    Some(path.with_file_name(format!("{METADATA_PREFIX}{rest}")))
}

/// Remove the `$I` twin of `path` if one exists.
pub fn remove_metadata_twin(path: &Path) -> FsResult<()> {
    match metadata_twin(path) {
        Some(twin) if fs::symlink_metadata(&twin).is_ok() => direct::remove_path(&twin),
        _ => Ok(()),
    }
}

/// Access to a recycle bin.
pub trait RecycleBin: Send + Sync {
    /// Check if `path` lies inside the recycle bin.
    fn contains(&self, path: &Path) -> bool;

    /// Move an item into the recycle bin.
    fn recycle(&self, item: &PathWithType) -> FsResult<()>;

    /// List the entries currently in the recycle bin.
    fn enumerate(&self) -> FsResult<Vec<RecycledItem>>;
}

#[derive(Debug, Serialize, Deserialize)]
struct MetadataRecord {
    original_path: PathBuf,
    deleted_at: DateTime<Utc>,
    item_type: FilesystemItemType,
}

/// A recycle bin kept in a plain directory using the `$R`/`$I` layout.
#[derive(Debug, Clone)]
pub struct DirectoryRecycleBin {
    root: PathBuf,
    max_depth: u32,
}

impl DirectoryRecycleBin {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_depth: 256,
        }
    }

    /// Bound the depth of cross-volume moves into the bin.
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Root directory of this bin.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn new_id() -> String {
        uuid::Uuid::new_v4().simple().to_string().to_uppercase()
    }

    /// Reserve the `$R`/`$I` pair for `id` by creating the metadata twin.
    ///
    /// Returns `None` when either name is already taken.
    fn claim_slot(&self, id: &str, source: &Path, json: &str) -> FsResult<Option<(PathBuf, PathBuf)>> {
        let payload_name = Self::payload_name(id, source);
        let payload = self.root.join(&payload_name);
        let twin = self.root.join(format!(
            "{METADATA_PREFIX}{}",
            &payload_name[PAYLOAD_PREFIX.len()..]
        ));
        if fs::symlink_metadata(&payload).is_ok() {
            return Ok(None);
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&twin) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(FsError::io(&twin, e)),
        };
        if let Err(e) = file.write_all(json.as_bytes()) {
            drop(file);
            let _ = fs::remove_file(&twin);
            return Err(FsError::io(&twin, e));
        }
        Ok(Some((payload, twin)))
    }

    fn payload_name(id: &str, source: &Path) -> String {
        match source.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{PAYLOAD_PREFIX}{id}.{ext}"),
            None => format!("{PAYLOAD_PREFIX}{id}"),
        }
    }

    fn read_record(&self, twin: &Path) -> Option<RecycledItem> {
        let name = twin.file_name()?.to_str()?;
        let rest = name.strip_prefix(METADATA_PREFIX)?;
        let payload = self.root.join(format!("{PAYLOAD_PREFIX}{rest}"));
        if fs::symlink_metadata(&payload).is_err() {
            return None;
        }

        let contents = fs::read_to_string(twin).ok()?;
        let record: MetadataRecord = serde_json::from_str(&contents).ok()?;
        Some(RecycledItem {
            original_path: strip_shortcut_extension(&record.original_path),
            recycle_path: payload,
            deleted_at: Some(record.deleted_at),
            item_type: record.item_type,
        })
    }
}

impl RecycleBin for DirectoryRecycleBin {
    fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    fn recycle(&self, item: &PathWithType) -> FsResult<()> {
        fs::create_dir_all(&self.root).map_err(|e| FsError::io(&self.root, e))?;
        fs::symlink_metadata(&item.path).map_err(|e| FsError::io(&item.path, e))?;

        let record = MetadataRecord {
            original_path: item.path.clone(),
            deleted_at: Utc::now(),
            item_type: item.item_type,
        };
        let json = serde_json::to_string(&record)
            .map_err(|e| FsError::generic(&item.path, format!("Failed to encode metadata: {e}")))?;

        let mut slot = None;
        for _ in 0..CLAIM_ATTEMPTS {
            slot = self.claim_slot(&Self::new_id(), &item.path, &json)?;
            if slot.is_some() {
                break;
            }
        }
        let Some((payload, twin)) = slot else {
            return Err(FsError::generic(&item.path, "No free recycle bin slot"));
        };

        let limits = WalkLimits::new(self.max_depth, CancellationToken::new());
        if let Err(e) = direct::move_path(&item.path, &payload, &limits) {
            let _ = fs::remove_file(&twin);
            return Err(e);
        }

        debug!(
            target: "shellward::recycle_bin",
            original = %item.path.display(),
            payload = %payload.display(),
            "Recycled item"
        );
        Ok(())
    }

    fn enumerate(&self) -> FsResult<Vec<RecycledItem>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(FsError::io(&self.root, e)),
        };

        let mut items: Vec<RecycledItem> = entries
            .flatten()
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|n| n.starts_with(METADATA_PREFIX))
            })
            .filter_map(|entry| self.read_record(&entry.path()))
            .collect();
        items.sort_by(|a, b| a.deleted_at.cmp(&b.deleted_at));
        Ok(items)
    }
}

/// The operating system's trash, through the `trash` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTrash;

impl RecycleBin for SystemTrash {
    fn contains(&self, path: &Path) -> bool {
        let normalized = format!(
            "{}/",
            path.to_string_lossy().to_lowercase().replace('\\', "/")
        );
        normalized.contains("/$recycle.bin/") || normalized.contains("/trash/files/")
    }

    fn recycle(&self, item: &PathWithType) -> FsResult<()> {
        trash::delete(&item.path).map_err(|e| {
            FsError::generic(&item.path, format!("Failed to move to trash: {e}"))
        })
    }

    #[cfg(any(
        target_os = "windows",
        all(unix, not(target_os = "macos"), not(target_os = "ios"), not(target_os = "android"))
    ))]
    fn enumerate(&self) -> FsResult<Vec<RecycledItem>> {
        let items = trash::os_limited::list()
            .map_err(|e| FsError::generic("", format!("Failed to list trash: {e}")))?;

        Ok(items
            .into_iter()
            .map(|item| {
                let recycle_path = system_trash_payload(&item);
                let item_type = fs::symlink_metadata(&recycle_path)
                    .map(|m| FilesystemItemType::from_metadata(&m))
                    .unwrap_or(FilesystemItemType::File);
                RecycledItem {
                    original_path: item.original_path(),
                    recycle_path,
                    deleted_at: DateTime::from_timestamp(item.time_deleted, 0),
                    item_type,
                }
            })
            .collect())
    }

    #[cfg(not(any(
        target_os = "windows",
        all(unix, not(target_os = "macos"), not(target_os = "ios"), not(target_os = "android"))
    )))]
    fn enumerate(&self) -> FsResult<Vec<RecycledItem>> {
        Ok(Vec::new())
    }
}

#[cfg(target_os = "windows")]
fn system_trash_payload(item: &trash::TrashItem) -> PathBuf {
    PathBuf::from(&item.id)
}

#[cfg(all(unix, not(target_os = "macos"), not(target_os = "ios"), not(target_os = "android")))]
fn system_trash_payload(item: &trash::TrashItem) -> PathBuf {
    let info_file = Path::new(&item.id);
    let trash_folder = info_file.parent().and_then(|p| p.parent());
    match (trash_folder, info_file.file_stem()) {
        (Some(folder), Some(name)) => folder.join("files").join(name),
        _ => info_file.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_metadata_twin() {
        assert_eq!(
            metadata_twin(Path::new("/bin/$RAB12CD.txt")),
            Some(PathBuf::from("/bin/$IAB12CD.txt"))
        );
        assert_eq!(metadata_twin(Path::new("/bin/plain.txt")), None);
    }

    #[test]
    fn test_strip_shortcut_extension() {
        assert_eq!(
            strip_shortcut_extension(Path::new("/d/App.LNK")),
            PathBuf::from("/d/App")
        );
        assert_eq!(
            strip_shortcut_extension(Path::new("/d/a.txt")),
            PathBuf::from("/d/a.txt")
        );
    }

    #[test]
    fn test_directory_bin_recycle_and_enumerate() {
        let temp = TempDir::new().unwrap();
        let bin = DirectoryRecycleBin::new(temp.path().join("bin"));
        let file = temp.path().join("doc.txt");
        fs::write(&file, b"x").unwrap();

        bin.recycle(&PathWithType::file(&file)).unwrap();
        assert!(!file.exists());

        let items = bin.enumerate().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].original_path, file);
        assert!(items[0].recycle_path.exists());
        assert!(bin.contains(&items[0].recycle_path));
        assert!(metadata_twin(&items[0].recycle_path).unwrap().exists());
    }

    #[test]
    fn test_claim_slot_skips_taken_ids() {
        let temp = TempDir::new().unwrap();
        let bin = DirectoryRecycleBin::new(temp.path());
        let source = Path::new("/home/doc.txt");
        fs::write(temp.path().join("$RABC.txt"), b"earlier").unwrap();
        fs::write(temp.path().join("$IDEF.txt"), b"{}").unwrap();

        assert_eq!(bin.claim_slot("ABC", source, "{}").unwrap(), None);
        assert_eq!(bin.claim_slot("DEF", source, "{}").unwrap(), None);
        assert_eq!(fs::read(temp.path().join("$IDEF.txt")).unwrap(), b"{}");

        let (payload, twin) = bin.claim_slot("123", source, "{\"a\":1}").unwrap().unwrap();
        assert_eq!(payload, temp.path().join("$R123.txt"));
        assert_eq!(fs::read_to_string(twin).unwrap(), "{\"a\":1}");
        assert!(!payload.exists());
    }

    #[test]
    fn test_recycle_keeps_earlier_entries() {
        let temp = TempDir::new().unwrap();
        let bin = DirectoryRecycleBin::new(temp.path().join("bin"));
        for contents in ["one", "two", "three"] {
            let file = temp.path().join("same.txt");
            fs::write(&file, contents).unwrap();
            bin.recycle(&PathWithType::file(&file)).unwrap();
        }

        let mut contents: Vec<String> = bin
            .enumerate()
            .unwrap()
            .iter()
            .map(|item| fs::read_to_string(&item.recycle_path).unwrap())
            .collect();
        contents.sort();
        assert_eq!(contents, ["one", "three", "two"]);
    }

    #[test]
    fn test_directory_bin_hides_shortcut_extension() {
        let temp = TempDir::new().unwrap();
        let bin = DirectoryRecycleBin::new(temp.path().join("bin"));
        let shortcut = temp.path().join("Tool.lnk");
        fs::write(&shortcut, b"x").unwrap();

        bin.recycle(&PathWithType::file(&shortcut)).unwrap();
        let items = bin.enumerate().unwrap();
        assert_eq!(items[0].original_path, temp.path().join("Tool"));
        assert!(items[0].matches_original(&shortcut));
    }

    #[test]
    fn test_enumerate_missing_root() {
        let bin = DirectoryRecycleBin::new("/definitely/not/a/bin");
        assert!(bin.enumerate().unwrap().is_empty());
    }

    #[test]
    fn test_remove_metadata_twin() {
        let temp = TempDir::new().unwrap();
        let payload = temp.path().join("$RXYZ.txt");
        let twin = temp.path().join("$IXYZ.txt");
        fs::write(&payload, b"").unwrap();
        fs::write(&twin, b"").unwrap();

        remove_metadata_twin(&payload).unwrap();
        assert!(!twin.exists());
        remove_metadata_twin(&payload).unwrap();
    }

    #[test]
    fn test_system_trash_contains() {
        assert!(SystemTrash.contains(Path::new("C:\\$Recycle.Bin\\S-1\\$R1.txt")));
        assert!(SystemTrash.contains(Path::new("/home/u/.local/share/Trash/files/a")));
        assert!(!SystemTrash.contains(Path::new("/home/u/docs")));
    }
}
