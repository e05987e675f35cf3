//! The direct façade: operations performed with local filesystem calls,
//! falling back to the helper process when access is denied.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use shellward_core::{
    FileSystemStatusCode, FilesystemItemType, FsError, FsResult, OperationType, PathWithType,
    StorageHistory,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::collision::{place_at, unique_path, CollisionPolicy, ConflictResolveOption, ResolvedTarget};
use crate::direct::{self, run_blocking, WalkLimits};
use crate::ipc::{FileOperationRequest, HelperMode, ShellOperationItemResult};
use crate::naming::validate_filename;
use crate::operations::{CreateOutcome, FileOperations, OperationContext};
use crate::progress::Reporter;
use crate::recycle_bin::remove_metadata_twin;
use crate::shell::{DialogResponse, Notice};
use crate::BoxFuture;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransferKind {
    Copy,
    Move,
}

impl TransferKind {
    fn operation_type(self) -> OperationType {
        match self {
            Self::Copy => OperationType::Copy,
            Self::Move => OperationType::Move,
        }
    }

    fn request(self, source: &Path, destination: &Path, policy: CollisionPolicy) -> FileOperationRequest {
        let request = match self {
            Self::Copy => FileOperationRequest::copy(&[source], &[destination], false),
            Self::Move => FileOperationRequest::move_items(&[source], &[destination], false),
        };
        request.with_policy(policy)
    }
}

/// Check if `destination` would place a folder inside `source`.
fn is_inside(destination: &Path, source: &Path) -> bool {
    destination.parent().is_some_and(|parent| parent.starts_with(source))
}

/// Operations executed with direct filesystem calls.
pub struct FilesystemOperations {
    context: OperationContext,
}

impl FilesystemOperations {
    pub fn new(context: OperationContext) -> Self {
        Self { context }
    }

    /// Collaborators this façade was built with.
    pub fn context(&self) -> &OperationContext {
        &self.context
    }

    fn limits(&self, cancel: &CancellationToken) -> WalkLimits {
        WalkLimits::new(self.context.config.max_depth, cancel.clone())
    }

    /// Select newly placed items if they landed in the displayed directory.
    pub(crate) fn select_if_visible(&self, paths: Vec<PathBuf>) {
        let working = self.context.shell.working_directory();
        if working.as_os_str().is_empty() {
            return;
        }

        let visible: Vec<PathBuf> = paths
            .into_iter()
            .filter(|p| p.parent() == Some(working.as_path()))
            .collect();
        if visible.is_empty() {
            return;
        }

        let shell = Arc::clone(&self.context.shell);
        let delay = self.context.config.selection_delay();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shell.add_selected_items(&visible);
            shell.focus_selected_items();
        });
    }

    /// Run `request` on a helper of the given mode and return its single item.
    async fn on_helper(
        &self,
        mode: HelperMode,
        path: &Path,
        request: FileOperationRequest,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> FsResult<ShellOperationItemResult> {
        let Some(connection) = self.context.helper.connect(mode).await else {
            return Err(FsError::new(
                FileSystemStatusCode::Unauthorized,
                path,
                format!("No {mode} helper available"),
            ));
        };

        info!(target: "shellward::ops", %mode, fileop = %request.fileop, path = %path.display(), "Retrying through helper");
        let response = connection
            .execute(request, reporter.progress_sender(), cancel)
            .await
            .map_err(|e| FsError::generic(path, e.to_string()))?;

        let item = response
            .result_items
            .into_iter()
            .next()
            .ok_or_else(|| FsError::generic(path, "Helper returned no result"))?;
        if item.succeeded {
            Ok(item)
        } else {
            Err(FsError::new(item.status, path, "Helper operation failed"))
        }
    }

    /// Ask for elevation and run `request` on the elevated helper.
    async fn elevate(
        &self,
        path: &Path,
        request: FileOperationRequest,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> FsResult<ShellOperationItemResult> {
        if !self.context.dialogs.confirm_elevation(path).await {
            return Err(FsError::new(
                FileSystemStatusCode::Unauthorized,
                path,
                "Elevation was not granted",
            ));
        }
        self.on_helper(HelperMode::Elevated, path, request, reporter, cancel)
            .await
    }

    /// Copy or move with direct calls: primary attempt, then fallback.
    async fn direct_transfer(
        &self,
        kind: TransferKind,
        source: &PathWithType,
        destination: &Path,
        policy: CollisionPolicy,
        cancel: &CancellationToken,
    ) -> FsResult<ResolvedTarget> {
        let limits = self.limits(cancel);
        let src = source.path.clone();
        let dst = destination.to_path_buf();

        run_blocking(&source.path, move || {
            place_at(&dst, policy, |target| {
                let primary = match kind {
                    TransferKind::Copy => direct::copy_path(&src, target, &limits),
                    TransferKind::Move => direct::move_path(&src, target, &limits),
                };
                let Err(primary_error) = primary else {
                    return Ok(());
                };
                if limits.cancel.is_cancelled() || primary_error.is(FileSystemStatusCode::NotFound) {
                    return Err(primary_error);
                }

                debug!(target: "shellward::ops", error = %primary_error, "Primary transfer failed, trying fallback");
                match (kind, src.is_dir()) {
                    (TransferKind::Copy, true) => Err(primary_error),
                    (TransferKind::Copy, false) => direct::stream_copy_file(&src, target),
                    (TransferKind::Move, true) => direct::move_directory(&src, target, &limits),
                    (TransferKind::Move, false) => {
                        direct::stream_copy_file(&src, target).and_then(|_| direct::remove_path(&src))
                    }
                }
            })
        })
        .await
    }

    /// Guards, direct attempt and elevation shared by copy, move and restore.
    async fn transfer(
        &self,
        kind: TransferKind,
        source: &PathWithType,
        destination: &Path,
        policy: CollisionPolicy,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> FsResult<ResolvedTarget> {
        self.check_destination(source, destination).await?;

        let policy = if destination == source.path && policy == CollisionPolicy::ReplaceExisting {
            CollisionPolicy::GenerateUniqueName
        } else {
            policy
        };

        match self
            .direct_transfer(kind, source, destination, policy, cancel)
            .await
        {
            Err(e) if e.code.wants_elevation() => {
                let overwrite = policy == CollisionPolicy::ReplaceExisting;
                let request = kind.request(&source.path, destination, policy);
                let item = self.elevate(destination, request, reporter, cancel).await?;
                Ok(ResolvedTarget::new(
                    item.destination
                        .unwrap_or_else(|| destination.to_path_buf()),
                    overwrite,
                ))
            }
            other => other,
        }
    }

    /// Refuse destinations in the recycle bin, inside the source folder or
    /// above the source.
    pub(crate) async fn check_destination(
        &self,
        source: &PathWithType,
        destination: &Path,
    ) -> FsResult<()> {
        if self.context.is_in_recycle_bin(destination) {
            self.context
                .dialogs
                .show_notice(Notice::UnsupportedOperation)
                .await;
            return Err(FsError::new(
                FileSystemStatusCode::Unauthorized,
                destination,
                "Items cannot be placed in the recycle bin",
            ));
        }

        if source.is_dir() && is_inside(destination, &source.path) {
            // The answer does not matter: this never proceeds.
            let _ = self
                .context
                .dialogs
                .confirm_subfolder_operation(&source.path, destination)
                .await;
            return Err(FsError::generic(
                destination,
                "The destination folder is a subfolder of the source folder",
            ));
        }

        if destination != source.path && source.path.starts_with(destination) {
            debug!(
                target: "shellward::ops",
                source = %source.path.display(),
                destination = %destination.display(),
                "Destination contains the source"
            );
            return Err(FsError::generic(
                destination,
                "The destination contains the source item",
            ));
        }
        Ok(())
    }

    async fn transfer_one(
        &self,
        kind: TransferKind,
        source: &PathWithType,
        destination: &Path,
        policy: CollisionPolicy,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> Option<StorageHistory> {
        reporter.status(FileSystemStatusCode::InProgress);

        if source.has_no_path() {
            trace!(target: "shellward::ops", operation = %kind.operation_type(), "Source has no path");
            reporter.progress(100.0);
            reporter.status(FileSystemStatusCode::Generic);
            return None;
        }

        if kind == TransferKind::Move && source.path == destination {
            reporter.progress(100.0);
            reporter.status(FileSystemStatusCode::Success);
            return None;
        }

        let result = self
            .transfer(kind, source, destination, policy, reporter, cancel)
            .await;
        reporter.progress(100.0);

        match result {
            Ok(resolved) => {
                info!(
                    target: "shellward::ops",
                    operation = %kind.operation_type(),
                    source = %source.path.display(),
                    destination = %resolved.path.display(),
                    "Transfer completed"
                );
                if kind == TransferKind::Move && source.is_dir() {
                    self.context.shell.remove_jump_list_entry(&source.path);
                }
                self.select_if_visible(vec![resolved.path.clone()]);
                reporter.status(FileSystemStatusCode::Success);

                (!resolved.replaced).then(|| {
                    StorageHistory::single(
                        kind.operation_type(),
                        source.clone(),
                        Some(source.with_path(resolved.path)),
                    )
                })
            }
            Err(e) => {
                warn!(target: "shellward::ops", operation = %kind.operation_type(), error = %e, "Transfer failed");
                reporter.status(e.code);
                None
            }
        }
    }

    async fn try_delete(
        &self,
        source: &PathWithType,
        permanently: bool,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> FsResult<()> {
        let path = source.path.clone();

        let mut result = if permanently {
            let p = path.clone();
            run_blocking(&path, move || direct::remove_path(&p)).await
        } else {
            Err(FsError::generic(&path, "Not attempted"))
        };

        if let Err(e) = &result {
            if permanently {
                debug!(target: "shellward::ops", error = %e, "Direct delete failed, retrying");
            }
            if !e.is(FileSystemStatusCode::NotFound) || !permanently {
                let recycle_bin = Arc::clone(&self.context.recycle_bin);
                let item = source.clone();
                result = run_blocking(&path, move || {
                    if permanently {
                        direct::force_remove(&item.path)
                    } else {
                        recycle_bin.recycle(&item)
                    }
                })
                .await;
            }
        }

        match result {
            Err(e) if e.code.wants_elevation() => {
                let request = FileOperationRequest::delete(&[&path], permanently);
                match self
                    .on_helper(HelperMode::Standard, &path, request.clone(), reporter, cancel)
                    .await
                {
                    Err(e) if e.code.wants_elevation() => {
                        self.elevate(&path, request, reporter, cancel).await.map(|_| ())
                    }
                    other => other.map(|_| ()),
                }
            }
            other => other,
        }
    }

    /// History for a recycled item: points at its newest recycle bin entry.
    pub(crate) async fn recycled_history(&self, source: &PathWithType) -> StorageHistory {
        let recycle_bin = Arc::clone(&self.context.recycle_bin);
        let entries = run_blocking(&source.path, move || recycle_bin.enumerate()).await;

        let entry = match entries {
            Ok(items) => items
                .into_iter()
                .filter(|item| item.matches_original(&source.path))
                .max_by_key(|item| item.deleted_at),
            Err(e) => {
                warn!(target: "shellward::ops", error = %e, "Failed to enumerate recycle bin");
                None
            }
        };

        if entry.is_none() {
            warn!(target: "shellward::ops", path = %source.path.display(), "Recycled item not found in recycle bin");
        }
        StorageHistory::single(
            OperationType::Recycle,
            source.clone(),
            entry.map(|item| item.to_path_with_type()),
        )
    }

    async fn delete_one(
        &self,
        source: &PathWithType,
        permanently: bool,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> Option<StorageHistory> {
        reporter.status(FileSystemStatusCode::InProgress);

        let in_recycle_bin = self.context.is_in_recycle_bin(&source.path);
        let permanently = permanently || in_recycle_bin;
        let result = self.try_delete(source, permanently, reporter, cancel).await;
        reporter.progress(100.0);

        if let Err(e) = result {
            warn!(target: "shellward::ops", error = %e, "Delete failed");
            if e.is(FileSystemStatusCode::InUse) {
                self.context
                    .dialogs
                    .show_notice(Notice::FileInUse(source.path.clone()))
                    .await;
            }
            reporter.status(e.code);
            return None;
        }

        if in_recycle_bin {
            let path = source.path.clone();
            if let Err(e) = run_blocking(&source.path, move || remove_metadata_twin(&path)).await {
                warn!(target: "shellward::ops", error = %e, "Failed to remove recycle bin metadata");
            }
        }

        info!(target: "shellward::ops", path = %source.path.display(), permanently, "Deleted item");
        reporter.status(FileSystemStatusCode::Success);

        if permanently {
            Some(StorageHistory::single(OperationType::Delete, source.clone(), None))
        } else {
            Some(self.recycled_history(source).await)
        }
    }

    async fn try_rename(
        &self,
        source: &PathWithType,
        new_name: &str,
        policy: CollisionPolicy,
        case_only: bool,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> FsResult<ResolvedTarget> {
        let destination = direct::sibling_path(&source.path, new_name);
        let src = source.path.clone();
        let dst = destination.clone();
        let expected = source.item_type;

        let primary = run_blocking(&source.path, move || {
            let metadata = std::fs::metadata(&src).map_err(|e| FsError::io(&src, e))?;
            match (expected, metadata.is_dir()) {
                (FilesystemItemType::Directory, false) => {
                    return Err(FsError::new(FileSystemStatusCode::NotAFolder, &src, "Not a folder"));
                }
                (FilesystemItemType::File, true) => {
                    return Err(FsError::new(FileSystemStatusCode::NotAFile, &src, "Not a file"));
                }
                _ => {}
            }

            let rename = |target: &Path| std::fs::rename(&src, target).map_err(|e| FsError::io(&src, e));
            if case_only {
                rename(&dst)?;
                Ok(ResolvedTarget::new(dst, false))
            } else {
                place_at(&dst, policy, rename)
            }
        })
        .await;

        let Err(error) = primary else {
            return primary;
        };
        if !error.code.wants_elevation() {
            return Err(error);
        }

        debug!(target: "shellward::ops", error = %error, "Rename refused, moving in place");
        let limits = self.limits(cancel);
        let src = source.path.clone();
        let dst = destination.clone();
        let fallback = run_blocking(&source.path, move || {
            direct::move_path(&src, &dst, &limits)?;
            Ok(ResolvedTarget::new(dst, false))
        })
        .await;

        match fallback {
            Err(e) if e.code.wants_elevation() => {
                let dst = destination.clone();
                let target = if policy == CollisionPolicy::GenerateUniqueName && !case_only {
                    run_blocking(&destination, move || {
                        Ok(if dst.exists() { unique_path(&dst) } else { dst })
                    })
                    .await?
                } else {
                    destination.clone()
                };
                let name = target
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| new_name.to_string());
                let overwrite = policy == CollisionPolicy::ReplaceExisting;

                let request = FileOperationRequest::rename(&source.path, &name, overwrite);
                let item = self.elevate(&source.path, request, reporter, cancel).await?;
                Ok(ResolvedTarget::new(
                    item.destination.unwrap_or(target),
                    overwrite && !case_only,
                ))
            }
            other => other,
        }
    }

    async fn rename_one(
        &self,
        source: &PathWithType,
        new_name: &str,
        policy: CollisionPolicy,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> Option<StorageHistory> {
        reporter.status(FileSystemStatusCode::InProgress);
        let current = source.name().unwrap_or_default();

        if new_name == current {
            let code = match policy {
                CollisionPolicy::FailIfExists => FileSystemStatusCode::AlreadyExists,
                _ => FileSystemStatusCode::Success,
            };
            reporter.status(code);
            return None;
        }

        let config = &self.context.config;
        if let Err(e) = validate_filename(new_name, config.alternate_streams_visible, config.max_name_length) {
            let code = e.status_code();
            let notice = if code == FileSystemStatusCode::NameTooLong {
                Notice::NameTooLong(new_name.to_string())
            } else {
                Notice::NameInvalid(new_name.to_string())
            };
            self.context.dialogs.show_notice(notice).await;
            reporter.status(code);
            return None;
        }

        // Case-only renames must replace "themselves" to succeed.
        let case_only = current.to_lowercase() == new_name.to_lowercase();
        let policy = if case_only {
            CollisionPolicy::ReplaceExisting
        } else {
            policy
        };

        match self
            .try_rename(source, new_name, policy, case_only, reporter, cancel)
            .await
        {
            Ok(resolved) => {
                info!(
                    target: "shellward::ops",
                    source = %source.path.display(),
                    destination = %resolved.path.display(),
                    "Renamed item"
                );
                reporter.status(FileSystemStatusCode::Success);
                (!resolved.replaced).then(|| {
                    StorageHistory::single(
                        OperationType::Rename,
                        source.clone(),
                        Some(source.with_path(resolved.path)),
                    )
                })
            }
            Err(e) if e.is(FileSystemStatusCode::AlreadyExists) && policy == CollisionPolicy::FailIfExists => {
                let existing = direct::sibling_path(&source.path, new_name);
                match self.context.dialogs.resolve_name_collision(&existing).await {
                    DialogResponse::Primary => {
                        self.rename(source, new_name, CollisionPolicy::GenerateUniqueName, reporter, cancel)
                            .await
                    }
                    DialogResponse::Secondary => {
                        self.rename(source, new_name, CollisionPolicy::ReplaceExisting, reporter, cancel)
                            .await
                    }
                    DialogResponse::Cancelled | DialogResponse::Unavailable => {
                        reporter.status(FileSystemStatusCode::AlreadyExists);
                        None
                    }
                }
            }
            Err(e) => {
                warn!(target: "shellward::ops", error = %e, "Rename failed");
                if let Some(notice) = Notice::for_rename_failure(e.code, &source.path, new_name) {
                    self.context.dialogs.show_notice(notice).await;
                }
                reporter.status(e.code);
                None
            }
        }
    }

    async fn restore_one(
        &self,
        source: &PathWithType,
        destination: &Path,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> StorageHistory {
        reporter.status(FileSystemStatusCode::InProgress);

        let result = self
            .transfer(
                TransferKind::Move,
                source,
                destination,
                CollisionPolicy::FailIfExists,
                reporter,
                cancel,
            )
            .await;
        reporter.progress(100.0);

        match result {
            Ok(resolved) => {
                let path = source.path.clone();
                if let Err(e) = run_blocking(&source.path, move || remove_metadata_twin(&path)).await {
                    warn!(target: "shellward::ops", error = %e, "Failed to remove recycle bin metadata");
                }
                info!(target: "shellward::ops", destination = %resolved.path.display(), "Restored item");
                self.select_if_visible(vec![resolved.path]);
                reporter.status(FileSystemStatusCode::Success);
            }
            Err(e) => {
                warn!(target: "shellward::ops", error = %e, "Restore failed");
                reporter.status(e.code);
            }
        }

        StorageHistory::single(
            OperationType::Restore,
            source.clone(),
            Some(source.with_path(destination)),
        )
    }

    async fn create_one(
        &self,
        source: &PathWithType,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> CreateOutcome {
        reporter.status(FileSystemStatusCode::InProgress);

        let config = &self.context.config;
        let name = source.name().unwrap_or_default();
        if let Err(e) = validate_filename(name, config.alternate_streams_visible, config.max_name_length) {
            self.context
                .dialogs
                .show_notice(Notice::NameInvalid(name.to_string()))
                .await;
            reporter.status(e.status_code());
            return (None, None);
        }

        let template = match source.item_type {
            FilesystemItemType::Directory => None,
            _ => source
                .path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(|ext| self.context.templates.template_for(ext)),
        };

        let item = source.clone();
        let file_template = template.clone().unwrap_or_default();
        let direct = run_blocking(&source.path, move || {
            if std::fs::symlink_metadata(&item.path).is_ok() {
                return Err(FsError::new(
                    FileSystemStatusCode::AlreadyExists,
                    &item.path,
                    "Item already exists",
                ));
            }
            match item.item_type {
                FilesystemItemType::Directory => direct::create_directory(&item.path),
                _ => file_template.write_to(&item.path),
            }
        })
        .await;

        let result = match direct {
            Err(e) if e.code.wants_elevation() => {
                let request = match source.item_type {
                    FilesystemItemType::Directory => FileOperationRequest::create_folder(&source.path),
                    _ => {
                        let template = template.unwrap_or_default();
                        FileOperationRequest::create_file(&source.path, template.template, template.data)
                    }
                };
                self.elevate(&source.path, request, reporter, cancel)
                    .await
                    .map(|_| ())
            }
            other => other,
        };

        match result {
            Ok(()) => {
                info!(target: "shellward::ops", path = %source.path.display(), "Created item");
                reporter.status(FileSystemStatusCode::Success);
                (
                    Some(StorageHistory::single(OperationType::CreateNew, source.clone(), None)),
                    Some(source.clone()),
                )
            }
            Err(e) => {
                warn!(target: "shellward::ops", error = %e, "Create failed");
                reporter.status(e.code);
                (None, None)
            }
        }
    }

    async fn transfer_items(
        &self,
        kind: TransferKind,
        sources: &[PathWithType],
        destinations: &[PathBuf],
        options: &[ConflictResolveOption],
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> Option<StorageHistory> {
        reporter.status(FileSystemStatusCode::InProgress);
        let count = sources.len();
        let mut histories = Vec::with_capacity(count);
        let mut codes = Vec::with_capacity(count);

        for (index, (source, destination)) in sources.iter().zip(destinations).enumerate() {
            if cancel.is_cancelled() {
                info!(target: "shellward::ops", completed = index, count, "Batch cancelled");
                codes.push(FileSystemStatusCode::Generic);
                break;
            }
            reporter.batch_progress(index, count);

            let option = options.get(index).copied().unwrap_or_default();
            let Some(policy) = option.policy() else {
                debug!(target: "shellward::ops", source = %source.path.display(), "Skipped by user");
                continue;
            };

            let (item_reporter, mut item_status) = Reporter::channel();
            histories.push(
                self.transfer_one(kind, source, destination, policy, &item_reporter, cancel)
                    .await,
            );
            codes.push(item_status.last_status().unwrap_or(FileSystemStatusCode::Generic));
        }

        reporter.progress(100.0);
        reporter.status(FileSystemStatusCode::reduce(codes));
        StorageHistory::merge(histories)
    }

    async fn delete_items_impl(
        &self,
        sources: &[PathWithType],
        permanently: bool,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> Option<StorageHistory> {
        reporter.status(FileSystemStatusCode::InProgress);
        let count = sources.len();
        let mut histories = Vec::with_capacity(count);
        let mut codes = Vec::with_capacity(count);

        for (index, source) in sources.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(target: "shellward::ops", completed = index, count, "Batch cancelled");
                codes.push(FileSystemStatusCode::Generic);
                break;
            }
            reporter.batch_progress(index, count);

            let (item_reporter, mut item_status) = Reporter::channel();
            histories.push(
                self.delete_one(source, permanently, &item_reporter, cancel)
                    .await,
            );
            codes.push(item_status.last_status().unwrap_or(FileSystemStatusCode::Generic));
        }

        reporter.progress(100.0);
        reporter.status(FileSystemStatusCode::reduce(codes));
        StorageHistory::merge(histories)
    }
}

impl FileOperations for FilesystemOperations {
    fn create<'a>(
        &'a self,
        source: &'a PathWithType,
        reporter: &'a Reporter,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, CreateOutcome> {
        Box::pin(self.create_one(source, reporter, cancel))
    }

    fn copy<'a>(
        &'a self,
        source: &'a PathWithType,
        destination: &'a Path,
        policy: CollisionPolicy,
        reporter: &'a Reporter,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Option<StorageHistory>> {
        Box::pin(self.transfer_one(TransferKind::Copy, source, destination, policy, reporter, cancel))
    }

    fn move_item<'a>(
        &'a self,
        source: &'a PathWithType,
        destination: &'a Path,
        policy: CollisionPolicy,
        reporter: &'a Reporter,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Option<StorageHistory>> {
        Box::pin(self.transfer_one(TransferKind::Move, source, destination, policy, reporter, cancel))
    }

    fn delete<'a>(
        &'a self,
        source: &'a PathWithType,
        permanently: bool,
        reporter: &'a Reporter,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Option<StorageHistory>> {
        Box::pin(self.delete_one(source, permanently, reporter, cancel))
    }

    fn rename<'a>(
        &'a self,
        source: &'a PathWithType,
        new_name: &'a str,
        policy: CollisionPolicy,
        reporter: &'a Reporter,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Option<StorageHistory>> {
        Box::pin(self.rename_one(source, new_name, policy, reporter, cancel))
    }

    fn restore_from_trash<'a>(
        &'a self,
        source: &'a PathWithType,
        destination: &'a Path,
        reporter: &'a Reporter,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, StorageHistory> {
        Box::pin(self.restore_one(source, destination, reporter, cancel))
    }

    fn copy_items<'a>(
        &'a self,
        sources: &'a [PathWithType],
        destinations: &'a [PathBuf],
        options: &'a [ConflictResolveOption],
        reporter: &'a Reporter,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Option<StorageHistory>> {
        Box::pin(self.transfer_items(TransferKind::Copy, sources, destinations, options, reporter, cancel))
    }

    fn move_items<'a>(
        &'a self,
        sources: &'a [PathWithType],
        destinations: &'a [PathBuf],
        options: &'a [ConflictResolveOption],
        reporter: &'a Reporter,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Option<StorageHistory>> {
        Box::pin(self.transfer_items(TransferKind::Move, sources, destinations, options, reporter, cancel))
    }

    fn delete_items<'a>(
        &'a self,
        sources: &'a [PathWithType],
        permanently: bool,
        reporter: &'a Reporter,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Option<StorageHistory>> {
        Box::pin(self.delete_items_impl(sources, permanently, reporter, cancel))
    }
}
