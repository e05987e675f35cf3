//! The helper-backed façade.
//!
//! Batches are sent to the helper process in one round trip per collision
//! mode. Anything the helper cannot take (no connection, paths that do not
//! survive the `|`-joined wire format) or fails to do is handed to the
//! direct façade.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use shellward_core::{FileSystemStatusCode, FilesystemItemType, OperationType, PathWithType, StorageHistory};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collision::{unique_path, CollisionPolicy, ConflictResolveOption};
use crate::direct::{self, run_blocking};
use crate::filesystem::FilesystemOperations;
use crate::ipc::{is_wire_safe, FileOperationRequest, HelperConnection, HelperMode, HelperResponse, IpcError};
use crate::naming::validate_filename;
use crate::operations::{CreateOutcome, FileOperations, OperationContext};
use crate::progress::Reporter;
use crate::recycle_bin::remove_metadata_twin;
use crate::BoxFuture;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchKind {
    Copy,
    Move,
}

/// Input index, source, destination and policy of one transfer.
type TransferPair<'a> = (usize, &'a PathWithType, &'a Path, CollisionPolicy);

/// One executed batch item, kept in input order.
struct ItemOutcome {
    index: usize,
    history: Option<StorageHistory>,
    code: FileSystemStatusCode,
}

/// Operations executed by the helper process.
pub struct ShellFilesystemOperations {
    context: OperationContext,
    direct: FilesystemOperations,
}

impl ShellFilesystemOperations {
    pub fn new(context: OperationContext) -> Self {
        Self {
            direct: FilesystemOperations::new(context.clone()),
            context,
        }
    }

    /// The direct façade used as fallback.
    pub fn direct(&self) -> &FilesystemOperations {
        &self.direct
    }

    /// A standard helper connection, if one exists and every path can be sent.
    async fn connection<'p>(
        &self,
        mut paths: impl Iterator<Item = &'p Path>,
    ) -> Option<Arc<HelperConnection>> {
        if !paths.all(is_wire_safe) {
            debug!(target: "shellward::shell_ops", "Paths not representable on the wire, using direct calls");
            return None;
        }
        self.context.helper.connect(HelperMode::Standard).await
    }

    async fn send(
        &self,
        connection: &HelperConnection,
        request: FileOperationRequest,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> Result<HelperResponse, IpcError> {
        info!(
            target: "shellward::shell_ops",
            fileop = %request.fileop,
            operation_id = %request.operation_id,
            "Sending batch to helper"
        );
        connection
            .execute(request, reporter.progress_sender(), cancel)
            .await
    }

    async fn direct_single(
        &self,
        kind: BatchKind,
        source: &PathWithType,
        destination: &Path,
        policy: CollisionPolicy,
        cancel: &CancellationToken,
    ) -> (Option<StorageHistory>, FileSystemStatusCode) {
        let (reporter, mut status) = Reporter::channel();
        let history = match kind {
            BatchKind::Copy => {
                self.direct
                    .copy(source, destination, policy, &reporter, cancel)
                    .await
            }
            BatchKind::Move => {
                self.direct
                    .move_item(source, destination, policy, &reporter, cancel)
                    .await
            }
        };
        (history, status.last_status().unwrap_or(FileSystemStatusCode::Generic))
    }

    async fn transfer_items(
        &self,
        kind: BatchKind,
        sources: &[PathWithType],
        destinations: &[PathBuf],
        options: &[ConflictResolveOption],
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> Option<StorageHistory> {
        let pairs: Vec<TransferPair<'_>> = sources
            .iter()
            .zip(destinations)
            .enumerate()
            .filter_map(|(index, (source, destination))| {
                let option = options.get(index).copied().unwrap_or_default();
                option
                    .policy()
                    .map(|policy| (index, source, destination.as_path(), policy))
            })
            .collect();

        let paths = pairs.iter().flat_map(|(_, s, d, _)| [s.path.as_path(), *d]);
        let Some(connection) = self.connection(paths).await else {
            return match kind {
                BatchKind::Copy => {
                    self.direct
                        .copy_items(sources, destinations, options, reporter, cancel)
                        .await
                }
                BatchKind::Move => {
                    self.direct
                        .move_items(sources, destinations, options, reporter, cancel)
                        .await
                }
            };
        };

        self.send_transfers(kind, &connection, pairs, reporter, cancel)
            .await
    }

    /// Run transfers on the helper, one request per collision policy.
    async fn send_transfers(
        &self,
        kind: BatchKind,
        connection: &HelperConnection,
        pairs: Vec<TransferPair<'_>>,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> Option<StorageHistory> {
        reporter.status(FileSystemStatusCode::InProgress);
        let operation_type = match kind {
            BatchKind::Copy => OperationType::Copy,
            BatchKind::Move => OperationType::Move,
        };
        let mut outcomes = Vec::with_capacity(pairs.len());
        let mut sendable = Vec::with_capacity(pairs.len());

        for pair in pairs {
            let (index, source, destination, _) = pair;
            if kind == BatchKind::Move && source.path.as_path() == destination {
                outcomes.push(ItemOutcome {
                    index,
                    history: None,
                    code: FileSystemStatusCode::Success,
                });
            } else if let Err(e) = self.direct.check_destination(source, destination).await {
                outcomes.push(ItemOutcome {
                    index,
                    history: None,
                    code: e.code,
                });
            } else {
                sendable.push(pair);
            }
        }

        let policies = [
            CollisionPolicy::GenerateUniqueName,
            CollisionPolicy::FailIfExists,
            CollisionPolicy::ReplaceExisting,
        ];
        for group_policy in policies {
            let group: Vec<_> = sendable
                .iter()
                .filter(|(_, _, _, policy)| *policy == group_policy)
                .collect();
            if group.is_empty() {
                continue;
            }
            if cancel.is_cancelled() {
                outcomes.extend(group.iter().map(|(index, ..)| ItemOutcome {
                    index: *index,
                    history: None,
                    code: FileSystemStatusCode::Generic,
                }));
                continue;
            }

            let overwrite = group_policy == CollisionPolicy::ReplaceExisting;
            let group_sources: Vec<&Path> = group.iter().map(|(_, s, _, _)| s.path.as_path()).collect();
            let group_destinations: Vec<&Path> = group.iter().map(|(_, _, d, _)| *d).collect();
            let request = match kind {
                BatchKind::Copy => FileOperationRequest::copy(&group_sources, &group_destinations, overwrite),
                BatchKind::Move => {
                    FileOperationRequest::move_items(&group_sources, &group_destinations, overwrite)
                }
            }
            .with_policy(group_policy);

            let response = match self.send(connection, request, reporter, cancel).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(target: "shellward::shell_ops", error = %e, "Helper request failed");
                    HelperResponse::default()
                }
            };

            for (position, (index, source, destination, policy)) in group.into_iter().enumerate() {
                let item = response.result_items.get(position);
                let outcome = match item {
                    Some(item) if item.succeeded => {
                        let target = item.destination.clone().unwrap_or_else(|| destination.to_path_buf());
                        if kind == BatchKind::Move && source.is_dir() {
                            self.context.shell.remove_jump_list_entry(&source.path);
                        }
                        self.direct.select_if_visible(vec![target.clone()]);
                        ItemOutcome {
                            index: *index,
                            history: (!overwrite).then(|| {
                                StorageHistory::single(operation_type, (*source).clone(), Some(source.with_path(target)))
                            }),
                            code: FileSystemStatusCode::Success,
                        }
                    }
                    Some(item) if item.status == FileSystemStatusCode::AlreadyExists => ItemOutcome {
                        index: *index,
                        history: None,
                        code: FileSystemStatusCode::AlreadyExists,
                    },
                    _ if cancel.is_cancelled() => ItemOutcome {
                        index: *index,
                        history: None,
                        code: FileSystemStatusCode::Generic,
                    },
                    _ => {
                        debug!(target: "shellward::shell_ops", source = %source.path.display(), "Retrying item with direct calls");
                        let (history, code) = self
                            .direct_single(kind, source, destination, *policy, cancel)
                            .await;
                        ItemOutcome {
                            index: *index,
                            history,
                            code,
                        }
                    }
                };
                outcomes.push(outcome);
            }
        }

        finish(outcomes, reporter)
    }

    async fn delete_items_impl(
        &self,
        sources: &[PathWithType],
        permanently: bool,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> Option<StorageHistory> {
        let mut seen = HashSet::new();
        let unique: Vec<PathWithType> = sources
            .iter()
            .filter(|s| seen.insert(s.path.clone()))
            .cloned()
            .collect();

        let Some(connection) = self.connection(unique.iter().map(|s| s.path.as_path())).await else {
            return self
                .direct
                .delete_items(&unique, permanently, reporter, cancel)
                .await;
        };

        reporter.status(FileSystemStatusCode::InProgress);
        let mut outcomes = Vec::with_capacity(unique.len());

        // Items already in the recycle bin can only be deleted permanently.
        let (binned, regular): (Vec<_>, Vec<_>) = unique
            .iter()
            .enumerate()
            .partition(|(_, s)| self.context.is_in_recycle_bin(&s.path));
        let groups = if permanently {
            vec![(true, binned.into_iter().chain(regular).collect::<Vec<_>>())]
        } else {
            vec![(false, regular), (true, binned)]
        };

        for (group_permanently, group) in groups {
            if group.is_empty() {
                continue;
            }
            if cancel.is_cancelled() {
                outcomes.extend(group.iter().map(|(index, _)| ItemOutcome {
                    index: *index,
                    history: None,
                    code: FileSystemStatusCode::Generic,
                }));
                continue;
            }

            let paths: Vec<&Path> = group.iter().map(|(_, s)| s.path.as_path()).collect();
            let request = FileOperationRequest::delete(&paths, group_permanently);
            let response = match self.send(&connection, request, reporter, cancel).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(target: "shellward::shell_ops", error = %e, "Helper request failed");
                    HelperResponse::default()
                }
            };

            for (position, (index, source)) in group.into_iter().enumerate() {
                let succeeded = response
                    .result_items
                    .get(position)
                    .is_some_and(|i| i.succeeded);

                let outcome = if succeeded {
                    let history = if group_permanently {
                        StorageHistory::single(OperationType::Delete, source.clone(), None)
                    } else {
                        self.direct.recycled_history(source).await
                    };
                    ItemOutcome {
                        index,
                        history: Some(history),
                        code: FileSystemStatusCode::Success,
                    }
                } else if cancel.is_cancelled() {
                    ItemOutcome {
                        index,
                        history: None,
                        code: FileSystemStatusCode::Generic,
                    }
                } else {
                    let (item_reporter, mut status) = Reporter::channel();
                    let history = self
                        .direct
                        .delete(source, group_permanently, &item_reporter, cancel)
                        .await;
                    ItemOutcome {
                        index,
                        history,
                        code: status.last_status().unwrap_or(FileSystemStatusCode::Generic),
                    }
                };
                outcomes.push(outcome);
            }
        }

        finish(outcomes, reporter)
    }

    async fn copy_one(
        &self,
        kind: BatchKind,
        source: &PathWithType,
        destination: &Path,
        policy: CollisionPolicy,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> Option<StorageHistory> {
        let paths = [source.path.as_path(), destination];
        let Some(connection) = self.connection(paths.into_iter()).await else {
            return match kind {
                BatchKind::Copy => {
                    self.direct
                        .copy(source, destination, policy, reporter, cancel)
                        .await
                }
                BatchKind::Move => {
                    self.direct
                        .move_item(source, destination, policy, reporter, cancel)
                        .await
                }
            };
        };

        self.send_transfers(kind, &connection, vec![(0, source, destination, policy)], reporter, cancel)
            .await
    }

    async fn rename_one(
        &self,
        source: &PathWithType,
        new_name: &str,
        policy: CollisionPolicy,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> Option<StorageHistory> {
        let current = source.name().unwrap_or_default();
        let case_only = current.to_lowercase() == new_name.to_lowercase();
        let config = &self.context.config;
        let valid = validate_filename(new_name, config.alternate_streams_visible, config.max_name_length).is_ok();

        // Invalid names are reported by the direct façade.
        let connection = if case_only || !valid {
            None
        } else {
            self.connection(std::iter::once(source.path.as_path())).await
        };
        let Some(connection) = connection else {
            return self
                .direct
                .rename(source, new_name, policy, reporter, cancel)
                .await;
        };

        let destination = direct::sibling_path(&source.path, new_name);
        let target = if policy == CollisionPolicy::GenerateUniqueName {
            let dst = destination.clone();
            let resolved =
                run_blocking(&destination, move || Ok(if dst.exists() { unique_path(&dst) } else { dst })).await;
            resolved.unwrap_or(destination)
        } else {
            destination
        };
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| new_name.to_string());
        let overwrite = policy == CollisionPolicy::ReplaceExisting;

        reporter.status(FileSystemStatusCode::InProgress);
        let request = FileOperationRequest::rename(&source.path, &name, overwrite);
        match self.send(&connection, request, reporter, cancel).await {
            Ok(response) if response.success => {
                reporter.status(FileSystemStatusCode::Success);
                let renamed = response
                    .result_items
                    .into_iter()
                    .next()
                    .and_then(|i| i.destination)
                    .unwrap_or(target);
                (!overwrite).then(|| {
                    StorageHistory::single(OperationType::Rename, source.clone(), Some(source.with_path(renamed)))
                })
            }
            _ => {
                self.direct
                    .rename(source, new_name, policy, &reporter.continuing(), cancel)
                    .await
            }
        }
    }

    async fn create_one(
        &self,
        source: &PathWithType,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> CreateOutcome {
        let Some(connection) = self.connection(std::iter::once(source.path.as_path())).await else {
            return self.direct.create(source, reporter, cancel).await;
        };

        let request = match source.item_type {
            FilesystemItemType::Directory => FileOperationRequest::create_folder(&source.path),
            _ => {
                let template = source
                    .path
                    .extension()
                    .and_then(|e| e.to_str())
                    .and_then(|ext| self.context.templates.template_for(ext))
                    .unwrap_or_default();
                FileOperationRequest::create_file(&source.path, template.template, template.data)
            }
        };

        reporter.status(FileSystemStatusCode::InProgress);
        match self.send(&connection, request, reporter, cancel).await {
            Ok(response) if response.success => {
                reporter.status(FileSystemStatusCode::Success);
                (
                    Some(StorageHistory::single(OperationType::CreateNew, source.clone(), None)),
                    Some(source.clone()),
                )
            }
            Ok(response) if response.status() == FileSystemStatusCode::AlreadyExists => {
                reporter.status(FileSystemStatusCode::AlreadyExists);
                (None, None)
            }
            _ => self.direct.create(source, &reporter.continuing(), cancel).await,
        }
    }

    async fn restore_one(
        &self,
        source: &PathWithType,
        destination: &Path,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> StorageHistory {
        let paths = [source.path.as_path(), destination];
        let Some(connection) = self.connection(paths.into_iter()).await else {
            return self
                .direct
                .restore_from_trash(source, destination, reporter, cancel)
                .await;
        };

        reporter.status(FileSystemStatusCode::InProgress);
        let request = FileOperationRequest::move_items(&[&source.path], &[destination], false);
        match self.send(&connection, request, reporter, cancel).await {
            Ok(response) if response.success => {
                let path = source.path.clone();
                if let Err(e) = run_blocking(&source.path, move || remove_metadata_twin(&path)).await {
                    warn!(target: "shellward::shell_ops", error = %e, "Failed to remove recycle bin metadata");
                }
                reporter.progress(100.0);
                reporter.status(FileSystemStatusCode::Success);
                let restored = response
                    .result_items
                    .into_iter()
                    .next()
                    .and_then(|i| i.destination)
                    .unwrap_or_else(|| destination.to_path_buf());
                StorageHistory::single(OperationType::Restore, source.clone(), Some(source.with_path(restored)))
            }
            _ => {
                self.direct
                    .restore_from_trash(source, destination, &reporter.continuing(), cancel)
                    .await
            }
        }
    }
}

/// Report the aggregate status and merge histories in input order.
fn finish(mut outcomes: Vec<ItemOutcome>, reporter: &Reporter) -> Option<StorageHistory> {
    outcomes.sort_by_key(|o| o.index);
    reporter.progress(100.0);
    reporter.status(FileSystemStatusCode::reduce(outcomes.iter().map(|o| o.code)));
    StorageHistory::merge(outcomes.into_iter().map(|o| o.history).collect())
}

impl FileOperations for ShellFilesystemOperations {
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
        Box::pin(self.copy_one(BatchKind::Copy, source, destination, policy, reporter, cancel))
    }

    fn move_item<'a>(
        &'a self,
        source: &'a PathWithType,
        destination: &'a Path,
        policy: CollisionPolicy,
        reporter: &'a Reporter,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Option<StorageHistory>> {
        Box::pin(self.copy_one(BatchKind::Move, source, destination, policy, reporter, cancel))
    }

    fn delete<'a>(
        &'a self,
        source: &'a PathWithType,
        permanently: bool,
        reporter: &'a Reporter,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Option<StorageHistory>> {
        Box::pin(self.delete_items_impl(std::slice::from_ref(source), permanently, reporter, cancel))
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
        Box::pin(self.transfer_items(BatchKind::Copy, sources, destinations, options, reporter, cancel))
    }

    fn move_items<'a>(
        &'a self,
        sources: &'a [PathWithType],
        destinations: &'a [PathBuf],
        options: &'a [ConflictResolveOption],
        reporter: &'a Reporter,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Option<StorageHistory>> {
        Box::pin(self.transfer_items(BatchKind::Move, sources, destinations, options, reporter, cancel))
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
