//! The operation contract shared by both façades.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use shellward_core::{OpsConfig, PathWithType, StorageHistory};
use tokio_util::sync::CancellationToken;

use crate::collision::{CollisionPolicy, ConflictResolveOption};
use crate::ipc::{HelperConnector, NoHelper};
use crate::progress::Reporter;
use crate::recycle_bin::{DirectoryRecycleBin, RecycleBin, SystemTrash};
use crate::shell::{DialogPresenter, ExclusiveDialogs, HeadlessDialogs, NullShellPage, ShellPage};
use crate::templates::{NewItemTemplates, NoTemplates, TemplateDirectory};
use crate::BoxFuture;

/// Result of [`FileOperations::create`]: the history and the created item.
pub type CreateOutcome = (Option<StorageHistory>, Option<PathWithType>);

/// Filesystem mutations that produce undo history.
///
/// Each call reports `InProgress` and then exactly one terminal code on the
/// reporter's status sink. A `None` history means there is nothing to
/// undo: the operation failed, was a no-op, or destroyed the prior state.
pub trait FileOperations: Send + Sync {
    /// Create an empty file or folder at `source.path`.
    fn create<'a>(
        &'a self,
        source: &'a PathWithType,
        reporter: &'a Reporter,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, CreateOutcome>;

    /// Copy `source` to the full path `destination`.
    fn copy<'a>(
        &'a self,
        source: &'a PathWithType,
        destination: &'a Path,
        policy: CollisionPolicy,
        reporter: &'a Reporter,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Option<StorageHistory>>;

    /// Move `source` to the full path `destination`.
    fn move_item<'a>(
        &'a self,
        source: &'a PathWithType,
        destination: &'a Path,
        policy: CollisionPolicy,
        reporter: &'a Reporter,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Option<StorageHistory>>;

    /// Delete `source`, to the recycle bin unless `permanently`.
    fn delete<'a>(
        &'a self,
        source: &'a PathWithType,
        permanently: bool,
        reporter: &'a Reporter,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Option<StorageHistory>>;

    /// Rename `source` in place.
    fn rename<'a>(
        &'a self,
        source: &'a PathWithType,
        new_name: &'a str,
        policy: CollisionPolicy,
        reporter: &'a Reporter,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Option<StorageHistory>>;

    /// Move a recycled item back to `destination`.
    ///
    /// Always returns a `Restore` history, even when the move failed; the
    /// status sink carries the real outcome.
    fn restore_from_trash<'a>(
        &'a self,
        source: &'a PathWithType,
        destination: &'a Path,
        reporter: &'a Reporter,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, StorageHistory>;

    /// Copy `sources[i]` to `destinations[i]`, honoring `options[i]`.
    fn copy_items<'a>(
        &'a self,
        sources: &'a [PathWithType],
        destinations: &'a [PathBuf],
        options: &'a [ConflictResolveOption],
        reporter: &'a Reporter,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Option<StorageHistory>>;

    /// Move `sources[i]` to `destinations[i]`, honoring `options[i]`.
    fn move_items<'a>(
        &'a self,
        sources: &'a [PathWithType],
        destinations: &'a [PathBuf],
        options: &'a [ConflictResolveOption],
        reporter: &'a Reporter,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Option<StorageHistory>>;

    /// Delete every item in `sources`.
    fn delete_items<'a>(
        &'a self,
        sources: &'a [PathWithType],
        permanently: bool,
        reporter: &'a Reporter,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Option<StorageHistory>>;
}

/// Collaborators a façade works with.
#[derive(Clone)]
pub struct OperationContext {
    pub config: Arc<OpsConfig>,
    pub shell: Arc<dyn ShellPage>,
    pub dialogs: Arc<dyn DialogPresenter>,
    pub recycle_bin: Arc<dyn RecycleBin>,
    pub helper: Arc<dyn HelperConnector>,
    pub templates: Arc<dyn NewItemTemplates>,
}

impl OperationContext {
    /// Context with headless dialogs, no view, no helper, and the recycle
    /// bin and templates `config` describes.
    pub fn new(config: OpsConfig) -> Self {
        let recycle_bin: Arc<dyn RecycleBin> = if config.use_system_trash {
            Arc::new(SystemTrash)
        } else {
            Arc::new(
                DirectoryRecycleBin::new(&config.recycle_bin_root).with_max_depth(config.max_depth),
            )
        };
        let templates: Arc<dyn NewItemTemplates> = match &config.templates_dir {
            Some(dir) => Arc::new(TemplateDirectory::new(dir)),
            None => Arc::new(NoTemplates),
        };

        Self {
            config: Arc::new(config),
            shell: Arc::new(NullShellPage),
            dialogs: Arc::new(ExclusiveDialogs::new(Arc::new(HeadlessDialogs::default()))),
            recycle_bin,
            helper: Arc::new(NoHelper),
            templates,
        }
    }

    pub fn with_shell(mut self, shell: Arc<dyn ShellPage>) -> Self {
        self.shell = shell;
        self
    }

    /// Use `dialogs`, allowing only one of them open at a time.
    pub fn with_dialogs(mut self, dialogs: Arc<dyn DialogPresenter>) -> Self {
        self.dialogs = Arc::new(ExclusiveDialogs::new(dialogs));
        self
    }

    pub fn with_recycle_bin(mut self, recycle_bin: Arc<dyn RecycleBin>) -> Self {
        self.recycle_bin = recycle_bin;
        self
    }

    pub fn with_helper(mut self, helper: Arc<dyn HelperConnector>) -> Self {
        self.helper = helper;
        self
    }

    pub fn with_templates(mut self, templates: Arc<dyn NewItemTemplates>) -> Self {
        self.templates = templates;
        self
    }

    /// Check if `path` lies in the recycle bin.
    pub fn is_in_recycle_bin(&self, path: &Path) -> bool {
        self.recycle_bin.contains(path) || self.config.is_under_recycle_bin(path)
    }
}
