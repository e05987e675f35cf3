//! Wire messages exchanged with the helper process.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shellward_core::FileSystemStatusCode;
use uuid::Uuid;

use super::IpcError;
use crate::collision::CollisionPolicy;

/// Value of the `Arguments` key for file operations.
pub const FILE_OPERATION: &str = "FileOperation";

/// Separator for multi-item path lists.
pub const PATH_SEPARATOR: char = '|';

/// Operation the helper should execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum FileOpKind {
    CopyItem,
    MoveItem,
    DeleteItem,
    RenameItem,
    CreateFile,
    CreateFolder,
}

/// A file operation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOperationRequest {
    #[serde(rename = "Arguments")]
    pub arguments: String,
    #[serde(rename = "fileop")]
    pub fileop: FileOpKind,
    /// Correlates progress events with this request.
    #[serde(rename = "operationID")]
    pub operation_id: Uuid,
    /// `|`-joined source paths.
    #[serde(rename = "filepath")]
    pub filepath: String,
    /// `|`-joined destination paths, paired with `filepath`.
    #[serde(rename = "destpath", default, skip_serializing_if = "Option::is_none")]
    pub destpath: Option<String>,
    #[serde(rename = "newName", default, skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    #[serde(rename = "overwrite", default)]
    pub overwrite: bool,
    /// Copy and move only: refuse an existing destination instead of
    /// picking a unique name.
    #[serde(rename = "failIfExists", default, skip_serializing_if = "std::ops::Not::not")]
    pub fail_if_exists: bool,
    #[serde(rename = "permanently", default)]
    pub permanently: bool,
    #[serde(rename = "template", default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,
    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
}

/// Check if a path can travel in a `|`-joined list.
pub fn is_wire_safe(path: &Path) -> bool {
    let text = path.to_string_lossy();
    !text.trim().is_empty() && !text.contains(PATH_SEPARATOR) && !text.starts_with(r"\\?\")
}

fn join_paths<P: AsRef<Path>>(paths: &[P]) -> String {
    paths
        .iter()
        .map(|p| p.as_ref().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(&PATH_SEPARATOR.to_string())
}

fn split_paths(joined: &str) -> Vec<PathBuf> {
    joined
        .split(PATH_SEPARATOR)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect()
}

impl FileOperationRequest {
    fn new(fileop: FileOpKind, filepath: String) -> Self {
        Self {
            arguments: FILE_OPERATION.to_string(),
            fileop,
            operation_id: Uuid::new_v4(),
            filepath,
            destpath: None,
            new_name: None,
            overwrite: false,
            fail_if_exists: false,
            permanently: false,
            template: None,
            data: None,
        }
    }

    /// Copy `sources[i]` to `destinations[i]`.
    pub fn copy<P: AsRef<Path>, Q: AsRef<Path>>(sources: &[P], destinations: &[Q], overwrite: bool) -> Self {
        Self {
            destpath: Some(join_paths(destinations)),
            overwrite,
            ..Self::new(FileOpKind::CopyItem, join_paths(sources))
        }
    }

    /// Move `sources[i]` to `destinations[i]`.
    pub fn move_items<P: AsRef<Path>, Q: AsRef<Path>>(
        sources: &[P],
        destinations: &[Q],
        overwrite: bool,
    ) -> Self {
        Self {
            destpath: Some(join_paths(destinations)),
            overwrite,
            ..Self::new(FileOpKind::MoveItem, join_paths(sources))
        }
    }

    /// Set how a copy or move treats an existing destination.
    pub fn with_policy(self, policy: CollisionPolicy) -> Self {
        Self {
            overwrite: policy == CollisionPolicy::ReplaceExisting,
            fail_if_exists: policy == CollisionPolicy::FailIfExists,
            ..self
        }
    }

    /// Collision policy of a copy or move.
    pub fn transfer_policy(&self) -> CollisionPolicy {
        if self.overwrite {
            CollisionPolicy::ReplaceExisting
        } else if self.fail_if_exists {
            CollisionPolicy::FailIfExists
        } else {
            CollisionPolicy::GenerateUniqueName
        }
    }

    /// Delete `sources`, to the recycle bin unless `permanently`.
    pub fn delete<P: AsRef<Path>>(sources: &[P], permanently: bool) -> Self {
        Self {
            permanently,
            ..Self::new(FileOpKind::DeleteItem, join_paths(sources))
        }
    }

    /// Rename `source` in place.
    pub fn rename(source: &Path, new_name: &str, overwrite: bool) -> Self {
        Self {
            new_name: Some(new_name.to_string()),
            overwrite,
            ..Self::new(FileOpKind::RenameItem, join_paths(&[source]))
        }
    }

    /// Create a file, optionally from a template file or initial bytes.
    pub fn create_file(path: &Path, template: Option<PathBuf>, data: Option<Vec<u8>>) -> Self {
        Self {
            template,
            data,
            ..Self::new(FileOpKind::CreateFile, join_paths(&[path]))
        }
    }

    /// Create an empty folder.
    pub fn create_folder(path: &Path) -> Self {
        Self::new(FileOpKind::CreateFolder, join_paths(&[path]))
    }

    /// Source paths carried by this request.
    pub fn sources(&self) -> Vec<PathBuf> {
        split_paths(&self.filepath)
    }

    /// Destination paths carried by this request.
    pub fn destinations(&self) -> Vec<PathBuf> {
        self.destpath.as_deref().map(split_paths).unwrap_or_default()
    }

    /// Check the request is well-formed before executing it.
    pub fn validate(&self) -> Result<(), IpcError> {
        if self.arguments != FILE_OPERATION {
            return Err(IpcError::InvalidRequest(format!(
                "Unknown arguments '{}'",
                self.arguments
            )));
        }

        let sources = self.sources();
        if sources.is_empty() {
            return Err(IpcError::InvalidRequest("No source paths".to_string()));
        }

        match self.fileop {
            FileOpKind::CopyItem | FileOpKind::MoveItem => {
                if self.destinations().len() != sources.len() {
                    return Err(IpcError::InvalidRequest(
                        "Source and destination counts differ".to_string(),
                    ));
                }
            }
            FileOpKind::RenameItem => {
                if self.new_name.as_deref().is_none_or(str::is_empty) {
                    return Err(IpcError::InvalidRequest("Missing new name".to_string()));
                }
            }
            FileOpKind::DeleteItem | FileOpKind::CreateFile | FileOpKind::CreateFolder => {}
        }
        Ok(())
    }
}

/// Outcome of one item of a helper operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellOperationItemResult {
    #[serde(rename = "Succeeded")]
    pub succeeded: bool,
    #[serde(rename = "Source")]
    pub source: PathBuf,
    /// Final location, after any collision renaming.
    #[serde(rename = "Destination", default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    #[serde(rename = "Status")]
    pub status: FileSystemStatusCode,
}

/// Reply to a [`FileOperationRequest`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperResponse {
    #[serde(rename = "Success")]
    pub success: bool,
    #[serde(rename = "ResultItems", default)]
    pub result_items: Vec<ShellOperationItemResult>,
}

impl HelperResponse {
    /// Build a response from per-item results.
    pub fn from_items(result_items: Vec<ShellOperationItemResult>) -> Self {
        Self {
            success: !result_items.is_empty() && result_items.iter().all(|i| i.succeeded),
            result_items,
        }
    }

    /// A failed response without item details.
    pub fn failed(source: &str, status: FileSystemStatusCode) -> Self {
        Self {
            success: false,
            result_items: split_paths(source)
                .into_iter()
                .map(|source| ShellOperationItemResult {
                    succeeded: false,
                    source,
                    destination: None,
                    status,
                })
                .collect(),
        }
    }

    /// Worst status across all items.
    pub fn status(&self) -> FileSystemStatusCode {
        if self.success {
            return FileSystemStatusCode::Success;
        }
        if self.result_items.is_empty() {
            return FileSystemStatusCode::Generic;
        }
        FileSystemStatusCode::reduce(self.result_items.iter().map(|i| i.status))
    }
}

/// One line on the helper channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireMessage {
    Request {
        id: u64,
        body: FileOperationRequest,
    },
    Response {
        id: u64,
        body: HelperResponse,
    },
    Progress {
        #[serde(rename = "OperationID")]
        operation_id: Uuid,
        #[serde(rename = "Progress")]
        progress: f32,
    },
    Cancel {
        #[serde(rename = "OperationID")]
        operation_id: Uuid,
    },
}

impl WireMessage {
    /// Encode as a single newline-terminated JSON line.
    pub fn encode(&self) -> Result<String, IpcError> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Decode one line.
    pub fn decode(line: &str) -> Result<Self, IpcError> {
        Ok(serde_json::from_str(line.trim_end())?)
    }
}
