//! Undo and redo of recorded operations.

use std::path::PathBuf;
use std::sync::Arc;

use shellward_core::{FileSystemStatusCode, OperationType, PathWithType, StorageHistory};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collision::{CollisionPolicy, ConflictResolveOption};
use crate::operations::FileOperations;
use crate::progress::Reporter;

/// Default number of entries a [`HistoryLog`] keeps.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// A caller-owned undo/redo stack.
///
/// Entries before the cursor have been applied and can be undone; entries
/// at and after it have been undone and can be redone. Pushing discards
/// the redo side.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    entries: Vec<StorageHistory>,
    cursor: usize,
    capacity: usize,
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    /// Record a completed operation, dropping the oldest entry when full.
    pub fn push(&mut self, history: StorageHistory) {
        self.entries.truncate(self.cursor);
        self.entries.push(history);
        if self.entries.len() > self.capacity {
            self.entries.remove(0);
        }
        self.cursor = self.entries.len();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[StorageHistory] {
        &self.entries
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    /// The entry the next undo inverts.
    pub fn undo_target(&self) -> Option<&StorageHistory> {
        self.cursor.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// The entry the next redo replays.
    pub fn redo_target(&self) -> Option<&StorageHistory> {
        self.entries.get(self.cursor)
    }

    /// Replace the entry at the undo position.
    ///
    /// Returns `false` when nothing has been applied.
    pub fn modify_current(&mut self, history: StorageHistory) -> bool {
        match self.cursor.checked_sub(1).and_then(|i| self.entries.get_mut(i)) {
            Some(entry) => {
                *entry = history;
                true
            }
            None => false,
        }
    }

    /// Remove the entry at the undo position.
    pub fn remove(&mut self) -> Option<StorageHistory> {
        let index = self.cursor.checked_sub(1)?;
        self.cursor = index;
        Some(self.entries.remove(index))
    }

    fn step_back(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    fn step_forward(&mut self) {
        self.cursor = (self.cursor + 1).min(self.entries.len());
    }
}

/// Result of undoing or redoing one history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoOutcome {
    pub status: FileSystemStatusCode,
    /// A history to store in place of the replayed one, when the replay
    /// moved items somewhere new (for example a fresh recycle bin entry).
    pub replacement: Option<StorageHistory>,
}

impl UndoOutcome {
    fn status(status: FileSystemStatusCode) -> Self {
        Self {
            status,
            replacement: None,
        }
    }

    fn failed() -> Self {
        Self::status(FileSystemStatusCode::Generic)
    }
}

fn last_status(rx: &mut mpsc::UnboundedReceiver<FileSystemStatusCode>) -> FileSystemStatusCode {
    let mut last = None;
    while let Ok(code) = rx.try_recv() {
        last = Some(code);
    }
    last.unwrap_or(FileSystemStatusCode::Generic)
}

fn paths(items: &[PathWithType]) -> Vec<PathBuf> {
    items.iter().map(|item| item.path.clone()).collect()
}

fn generate_names(count: usize) -> Vec<ConflictResolveOption> {
    vec![ConflictResolveOption::GenerateNewName; count]
}

/// Inverts and replays histories through a façade.
pub struct StorageHistoryOperations {
    ops: Arc<dyn FileOperations>,
}

impl StorageHistoryOperations {
    pub fn new(ops: Arc<dyn FileOperations>) -> Self {
        Self { ops }
    }

    /// Undo `history`.
    pub async fn undo(
        &self,
        history: &StorageHistory,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> UndoOutcome {
        reporter.status(FileSystemStatusCode::InProgress);
        let (inner, mut status) = reporter.capture_status();
        let ops = &self.ops;

        let outcome = match (history.operation_type, &history.destination) {
            (OperationType::CreateNew, _) => {
                ops.delete_items(&history.source, true, &inner, cancel).await;
                UndoOutcome::status(last_status(&mut status))
            }
            (OperationType::Copy, Some(copies)) => {
                ops.delete_items(copies, true, &inner, cancel).await;
                UndoOutcome::status(last_status(&mut status))
            }
            (OperationType::Move, Some(moved)) => {
                let originals = paths(&history.source);
                let options = generate_names(moved.len());
                ops.move_items(moved, &originals, &options, &inner, cancel)
                    .await;
                UndoOutcome::status(last_status(&mut status))
            }
            (OperationType::Rename, Some(renamed)) => {
                let mut codes = Vec::with_capacity(renamed.len());
                for (original, current) in history.source.iter().zip(renamed) {
                    let name = original.name().unwrap_or_default();
                    ops.rename(current, name, CollisionPolicy::GenerateUniqueName, &inner, cancel)
                        .await;
                    codes.push(last_status(&mut status));
                }
                UndoOutcome::status(FileSystemStatusCode::reduce(codes))
            }
            (OperationType::Recycle, Some(recycled)) => {
                let mut codes = Vec::with_capacity(recycled.len());
                for (original, entry) in history.source.iter().zip(recycled) {
                    ops.restore_from_trash(entry, &original.path, &inner, cancel)
                        .await;
                    codes.push(last_status(&mut status));
                }
                UndoOutcome::status(FileSystemStatusCode::reduce(codes))
            }
            (OperationType::Restore, Some(restored)) => {
                let recycled = ops.delete_items(restored, false, &inner, cancel).await;
                // The items now sit at new recycle bin paths.
                let replacement = recycled.and_then(|h| {
                    h.destination
                        .map(|entries| StorageHistory::new(OperationType::Restore, entries, Some(h.source)))
                });
                UndoOutcome {
                    status: last_status(&mut status),
                    replacement,
                }
            }
            (operation_type, _) => {
                debug!(target: "shellward::history", %operation_type, "History cannot be undone");
                UndoOutcome::failed()
            }
        };

        info!(
            target: "shellward::history",
            operation = %history.description(),
            status = %outcome.status,
            "Undo finished"
        );
        reporter.status(outcome.status);
        outcome
    }

    /// Replay `history`.
    pub async fn redo(
        &self,
        history: &StorageHistory,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> UndoOutcome {
        reporter.status(FileSystemStatusCode::InProgress);
        let (inner, mut status) = reporter.capture_status();
        let ops = &self.ops;

        let outcome = match (history.operation_type, &history.destination) {
            (OperationType::CreateNew, _) => {
                let mut codes = Vec::with_capacity(history.source.len());
                for item in &history.source {
                    ops.create(item, &inner, cancel).await;
                    codes.push(last_status(&mut status));
                }
                UndoOutcome::status(FileSystemStatusCode::reduce(codes))
            }
            (OperationType::Copy, Some(copies)) => {
                let targets = paths(copies);
                let options = generate_names(targets.len());
                let replacement = ops
                    .copy_items(&history.source, &targets, &options, &inner, cancel)
                    .await;
                UndoOutcome {
                    status: last_status(&mut status),
                    replacement,
                }
            }
            (OperationType::Move, Some(moved)) => {
                let targets = paths(moved);
                let options = generate_names(targets.len());
                let replacement = ops
                    .move_items(&history.source, &targets, &options, &inner, cancel)
                    .await;
                UndoOutcome {
                    status: last_status(&mut status),
                    replacement,
                }
            }
            (OperationType::Rename, Some(renamed)) => {
                let mut codes = Vec::with_capacity(renamed.len());
                let mut histories = Vec::with_capacity(renamed.len());
                for (original, target) in history.source.iter().zip(renamed) {
                    let name = target.name().unwrap_or_default();
                    histories.push(
                        ops.rename(original, name, CollisionPolicy::GenerateUniqueName, &inner, cancel)
                            .await,
                    );
                    codes.push(last_status(&mut status));
                }
                UndoOutcome {
                    status: FileSystemStatusCode::reduce(codes),
                    replacement: StorageHistory::merge(histories),
                }
            }
            (OperationType::Recycle, _) => {
                let replacement = ops
                    .delete_items(&history.source, false, &inner, cancel)
                    .await;
                UndoOutcome {
                    status: last_status(&mut status),
                    replacement,
                }
            }
            (OperationType::Restore, Some(restored)) => {
                let mut codes = Vec::with_capacity(restored.len());
                for (entry, target) in history.source.iter().zip(restored) {
                    ops.restore_from_trash(entry, &target.path, &inner, cancel)
                        .await;
                    codes.push(last_status(&mut status));
                }
                UndoOutcome::status(FileSystemStatusCode::reduce(codes))
            }
            (OperationType::Delete, _) => {
                ops.delete_items(&history.source, true, &inner, cancel)
                    .await;
                UndoOutcome::status(last_status(&mut status))
            }
            (operation_type, None) => {
                debug!(target: "shellward::history", %operation_type, "History has no destination to replay");
                UndoOutcome::failed()
            }
        };

        info!(
            target: "shellward::history",
            operation = %history.description(),
            status = %outcome.status,
            "Redo finished"
        );
        reporter.status(outcome.status);
        outcome
    }

    /// Undo the latest applied entry of `log`.
    ///
    /// Entries that can never be undone are dropped from the log. A failed
    /// undo leaves the log unchanged. Returns `None` when there is nothing
    /// to undo.
    pub async fn undo_last(
        &self,
        log: &mut HistoryLog,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> Option<UndoOutcome> {
        let history = log.undo_target()?.clone();

        if history.has_blank_paths() || !history.can_undo() {
            warn!(
                target: "shellward::history",
                operation = %history.description(),
                "Dropping history that cannot be undone"
            );
            log.remove();
            reporter.status(FileSystemStatusCode::Generic);
            return Some(UndoOutcome::failed());
        }

        let outcome = self.undo(&history, reporter, cancel).await;
        if outcome.status.is_success() {
            if let Some(replacement) = &outcome.replacement {
                log.modify_current(replacement.clone());
            }
            log.step_back();
        }
        Some(outcome)
    }

    /// Redo the latest undone entry of `log`.
    pub async fn redo_last(
        &self,
        log: &mut HistoryLog,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> Option<UndoOutcome> {
        let history = log.redo_target()?.clone();

        let outcome = self.redo(&history, reporter, cancel).await;
        if outcome.status.is_success() {
            log.step_forward();
            if let Some(replacement) = &outcome.replacement {
                log.modify_current(replacement.clone());
            }
        }
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rename(from: &str, to: &str) -> StorageHistory {
        StorageHistory::single(
            OperationType::Rename,
            PathWithType::file(from),
            Some(PathWithType::file(to)),
        )
    }

    #[test]
    fn test_push_truncates_redo() {
        let mut log = HistoryLog::default();
        log.push(rename("/a", "/b"));
        log.push(rename("/b", "/c"));
        log.step_back();
        assert!(log.can_redo());

        log.push(rename("/b", "/d"));
        assert_eq!(log.len(), 2);
        assert!(!log.can_redo());
        assert_eq!(log.undo_target(), Some(&rename("/b", "/d")));
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut log = HistoryLog::new(2);
        log.push(rename("/a", "/b"));
        log.push(rename("/b", "/c"));
        log.push(rename("/c", "/d"));

        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[0], rename("/b", "/c"));
    }

    #[test]
    fn test_targets_follow_cursor() {
        let mut log = HistoryLog::default();
        assert!(log.undo_target().is_none());
        assert!(!log.modify_current(rename("/x", "/y")));

        log.push(rename("/a", "/b"));
        assert!(log.redo_target().is_none());
        log.step_back();
        assert_eq!(log.redo_target(), Some(&rename("/a", "/b")));
        assert!(log.undo_target().is_none());
        log.step_forward();
        log.step_forward();
        assert!(log.modify_current(rename("/a", "/z")));
        assert_eq!(log.undo_target(), Some(&rename("/a", "/z")));
    }

    #[test]
    fn test_remove() {
        let mut log = HistoryLog::default();
        log.push(rename("/a", "/b"));
        log.push(rename("/b", "/c"));

        assert_eq!(log.remove(), Some(rename("/b", "/c")));
        assert_eq!(log.undo_target(), Some(&rename("/a", "/b")));
        log.remove();
        assert!(log.remove().is_none());
        assert!(log.is_empty());
    }
}
