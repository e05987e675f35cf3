//! Filesystem operation façades for shellward.
//!
//! This crate performs copy, move, delete, rename, create and
//! restore-from-recycle-bin operations with progress and status reporting,
//! collision handling, fallback to a helper process when access is denied,
//! and undo history.
//!
//! Two façades implement [`FileOperations`]: [`FilesystemOperations`] works
//! with direct filesystem calls, [`ShellFilesystemOperations`] sends whole
//! batches to the helper process.

use std::future::Future;
use std::pin::Pin;

mod collision;
pub mod direct;
mod filesystem;
mod history;
pub mod ipc;
mod naming;
mod operations;
mod progress;
mod recycle_bin;
mod shell;
mod shell_ops;
mod templates;

pub use collision::{place_at, resolve_target, unique_path, CollisionPolicy, ConflictResolveOption, ResolvedTarget};
pub use filesystem::FilesystemOperations;
pub use history::{HistoryLog, StorageHistoryOperations, UndoOutcome, DEFAULT_HISTORY_CAPACITY};
pub use naming::{
    contains_restricted_characters, contains_restricted_file_name, filter_restricted_characters,
    restricted_characters, validate_filename, NameError,
};
pub use operations::{CreateOutcome, FileOperations, OperationContext};
pub use progress::{ReportReceiver, Reporter};
pub use recycle_bin::{
    metadata_twin, remove_metadata_twin, strip_shortcut_extension, DirectoryRecycleBin, RecycleBin,
    RecycledItem, SystemTrash,
};
pub use shell::{
    DialogPresenter, DialogResponse, ExclusiveDialogs, HeadlessDialogs, Notice, NullShellPage, ShellPage,
};
pub use shell_ops::ShellFilesystemOperations;
pub use templates::{NewItemTemplate, NewItemTemplates, NoTemplates, TemplateDirectory};

/// A boxed future, used by the object-safe async traits of this crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
