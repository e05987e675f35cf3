//! Collaborators supplied by the UI layer.
//!
//! The façades never reach for global state. Everything they need from the
//! surrounding application (the current view, modal dialogs) is passed in
//! through these traits.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use shellward_core::FileSystemStatusCode;
use tracing::{info, warn};

use crate::BoxFuture;

/// The view an operation was started from.
pub trait ShellPage: Send + Sync {
    /// Directory currently displayed.
    fn working_directory(&self) -> PathBuf;

    /// Add items to the current selection.
    fn add_selected_items(&self, paths: &[PathBuf]);

    /// Move keyboard focus to the selection.
    fn focus_selected_items(&self);

    /// Drop a jump-list or recent-folder entry that pointed at a moved folder.
    fn remove_jump_list_entry(&self, _path: &Path) {}
}

/// A page that displays nothing. Selection callbacks are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullShellPage;

impl ShellPage for NullShellPage {
    fn working_directory(&self) -> PathBuf {
        PathBuf::new()
    }

    fn add_selected_items(&self, _paths: &[PathBuf]) {}

    fn focus_selected_items(&self) {}
}

/// A blocking, informational dialog shown after a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Pasting into the recycle bin.
    UnsupportedOperation,
    /// Copying or moving a folder into its own subtree.
    DestinationIsSubfolder { source: PathBuf, destination: PathBuf },
    FileInUse(PathBuf),
    NameInvalid(String),
    NameTooLong(String),
    /// The item disappeared before the operation ran.
    ItemDeleted(PathBuf),
    AccessDenied(PathBuf),
    ItemAlreadyExists(PathBuf),
    /// The renamed item is not of the expected kind.
    WrongItemType { path: PathBuf, expected_folder: bool },
}

impl Notice {
    /// Dialog title.
    pub fn title(&self) -> &'static str {
        match self {
            Self::UnsupportedOperation => "Operation not supported",
            Self::DestinationIsSubfolder { .. } => "The destination folder is a subfolder",
            Self::FileInUse(_) => "The file is in use",
            Self::NameInvalid(_) => "Invalid name",
            Self::NameTooLong(_) => "Name too long",
            Self::ItemDeleted(_) => "Item no longer exists",
            Self::AccessDenied(_) => "Access denied",
            Self::ItemAlreadyExists(_) => "Item already exists",
            Self::WrongItemType { .. } => "Unexpected item type",
        }
    }

    /// Dialog body.
    pub fn message(&self) -> String {
        match self {
            Self::UnsupportedOperation => {
                "Items cannot be pasted into the recycle bin.".to_string()
            }
            Self::DestinationIsSubfolder {
                source,
                destination,
            } => format!(
                "'{}' cannot be placed inside itself at '{}'.",
                source.display(),
                destination.display()
            ),
            Self::FileInUse(path) => format!(
                "'{}' is open in another program. Close it and try again.",
                path.display()
            ),
            Self::NameInvalid(name) => format!("'{name}' is not a valid name."),
            Self::NameTooLong(name) => {
                format!("'{name}' is longer than the file system allows.")
            }
            Self::ItemDeleted(path) => format!(
                "'{}' was moved or deleted before the operation ran.",
                path.display()
            ),
            Self::AccessDenied(path) => {
                format!("You don't have permission to change '{}'.", path.display())
            }
            Self::ItemAlreadyExists(path) => {
                format!("'{}' already exists.", path.display())
            }
            Self::WrongItemType {
                path,
                expected_folder,
            } => format!(
                "'{}' is not a {}.",
                path.display(),
                if *expected_folder { "folder" } else { "file" }
            ),
        }
    }

    /// The notice rename shows for a terminal status code.
    pub fn for_rename_failure(code: FileSystemStatusCode, path: &Path, name: &str) -> Option<Self> {
        match code {
            FileSystemStatusCode::NotAFile => Some(Self::WrongItemType {
                path: path.to_path_buf(),
                expected_folder: false,
            }),
            FileSystemStatusCode::NotAFolder => Some(Self::WrongItemType {
                path: path.to_path_buf(),
                expected_folder: true,
            }),
            FileSystemStatusCode::NameTooLong => Some(Self::NameTooLong(name.to_string())),
            FileSystemStatusCode::InUse => Some(Self::FileInUse(path.to_path_buf())),
            FileSystemStatusCode::NotFound => Some(Self::ItemDeleted(path.to_path_buf())),
            FileSystemStatusCode::AlreadyExists => Some(Self::ItemAlreadyExists(path.with_file_name(name))),
            FileSystemStatusCode::Unauthorized | FileSystemStatusCode::ReadOnly => {
                Some(Self::AccessDenied(path.to_path_buf()))
            }
            _ => None,
        }
    }
}

/// Answer to a two-button prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogResponse {
    Primary,
    Secondary,
    Cancelled,
    /// Another modal dialog was already open.
    Unavailable,
}

/// Modal dialogs shown to the user.
pub trait DialogPresenter: Send + Sync {
    /// Show an informational notice and wait until it is dismissed.
    fn show_notice<'a>(&'a self, notice: Notice) -> BoxFuture<'a, ()>;

    /// Ask whether to retry with administrator rights.
    fn confirm_elevation<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool>;

    /// Ask how to resolve a rename collision: `Primary` keeps both,
    /// `Secondary` replaces the existing item.
    fn resolve_name_collision<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, DialogResponse>;

    /// Tell the user the destination is inside the source. The answer is
    /// shown for information only.
    fn confirm_subfolder_operation<'a>(
        &'a self,
        source: &'a Path,
        destination: &'a Path,
    ) -> BoxFuture<'a, DialogResponse>;
}

/// Allows only one modal dialog at a time.
///
/// Prompts raised while another dialog is open resolve immediately to
/// [`DialogResponse::Unavailable`] (or `false` for elevation) instead of
/// stacking.
pub struct ExclusiveDialogs {
    inner: Arc<dyn DialogPresenter>,
    open: AtomicBool,
}

struct OpenGuard<'a>(&'a AtomicBool);

impl Drop for OpenGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ExclusiveDialogs {
    pub fn new(inner: Arc<dyn DialogPresenter>) -> Self {
        Self {
            inner,
            open: AtomicBool::new(false),
        }
    }

    fn acquire(&self) -> Option<OpenGuard<'_>> {
        self.open
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| OpenGuard(&self.open))
    }

    /// Check if a dialog is currently open.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl DialogPresenter for ExclusiveDialogs {
    fn show_notice<'a>(&'a self, notice: Notice) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            match self.acquire() {
                Some(_guard) => self.inner.show_notice(notice).await,
                None => warn!(target: "shellward::dialogs", title = notice.title(), "Dialog suppressed"),
            }
        })
    }

    fn confirm_elevation<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            match self.acquire() {
                Some(_guard) => self.inner.confirm_elevation(path).await,
                None => false,
            }
        })
    }

    fn resolve_name_collision<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, DialogResponse> {
        Box::pin(async move {
            match self.acquire() {
                Some(_guard) => self.inner.resolve_name_collision(path).await,
                None => DialogResponse::Unavailable,
            }
        })
    }

    fn confirm_subfolder_operation<'a>(
        &'a self,
        source: &'a Path,
        destination: &'a Path,
    ) -> BoxFuture<'a, DialogResponse> {
        Box::pin(async move {
            match self.acquire() {
                Some(_guard) => {
                    self.inner
                        .confirm_subfolder_operation(source, destination)
                        .await
                }
                None => DialogResponse::Unavailable,
            }
        })
    }
}

/// Non-interactive dialogs answering from fixed settings.
///
/// Notices are logged and kept so a caller can print them.
#[derive(Debug, Default)]
pub struct HeadlessDialogs {
    pub allow_elevation: bool,
    pub collision_response: Option<DialogResponse>,
    notices: Mutex<Vec<Notice>>,
}

impl HeadlessDialogs {
    pub fn new(allow_elevation: bool, collision_response: Option<DialogResponse>) -> Self {
        Self {
            allow_elevation,
            collision_response,
            notices: Mutex::new(Vec::new()),
        }
    }

    /// Notices shown so far.
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }
}

impl DialogPresenter for HeadlessDialogs {
    fn show_notice<'a>(&'a self, notice: Notice) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            info!(target: "shellward::dialogs", title = notice.title(), "{}", notice.message());
            if let Ok(mut notices) = self.notices.lock() {
                notices.push(notice);
            }
        })
    }

    fn confirm_elevation<'a>(&'a self, _path: &'a Path) -> BoxFuture<'a, bool> {
        Box::pin(async move { self.allow_elevation })
    }

    fn resolve_name_collision<'a>(&'a self, _path: &'a Path) -> BoxFuture<'a, DialogResponse> {
        Box::pin(async move {
            self.collision_response
                .unwrap_or(DialogResponse::Cancelled)
        })
    }

    fn confirm_subfolder_operation<'a>(
        &'a self,
        source: &'a Path,
        destination: &'a Path,
    ) -> BoxFuture<'a, DialogResponse> {
        Box::pin(async move {
            self.show_notice(Notice::DestinationIsSubfolder {
                source: source.to_path_buf(),
                destination: destination.to_path_buf(),
            })
            .await;
            DialogResponse::Primary
        })
    }
}
