//! Storage history records used to build an undo/redo stack.

use serde::{Deserialize, Serialize};

use crate::item::PathWithType;

/// The kind of filesystem action a history records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum OperationType {
    #[strum(to_string = "Create")]
    CreateNew,
    Copy,
    Move,
    Delete,
    Recycle,
    Rename,
    Restore,
}

/// One completed, potentially undoable filesystem action.
///
/// `source[i]` pairs with `destination[i]`. A `None` destination means the
/// prior state is gone (overwrite, permanent delete) except for
/// [`OperationType::CreateNew`], whose `source` lists the created items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageHistory {
    pub operation_type: OperationType,
    pub source: Vec<PathWithType>,
    pub destination: Option<Vec<PathWithType>>,
}

impl StorageHistory {
    /// Create a new history record.
    pub fn new(
        operation_type: OperationType,
        source: Vec<PathWithType>,
        destination: Option<Vec<PathWithType>>,
    ) -> Self {
        Self {
            operation_type,
            source,
            destination,
        }
    }

    /// Create a single-item history.
    pub fn single(
        operation_type: OperationType,
        source: PathWithType,
        destination: Option<PathWithType>,
    ) -> Self {
        Self::new(operation_type, vec![source], destination.map(|d| vec![d]))
    }

    /// Merge per-item results of a batch into one history.
    ///
    /// Returns `None` if the batch executed nothing or if any item produced
    /// no history, so a batch is undone all at once or not at all. The
    /// operation type is taken from the first item. The merged destination is
    /// `None` as soon as any item has no destination.
    pub fn merge(histories: Vec<Option<StorageHistory>>) -> Option<StorageHistory> {
        if histories.is_empty() || histories.iter().any(Option::is_none) {
            return None;
        }

        let histories: Vec<StorageHistory> = histories.into_iter().flatten().collect();
        let operation_type = histories[0].operation_type;
        let mut source = Vec::new();
        let mut destination = Some(Vec::new());

        for history in histories {
            source.extend(history.source);
            destination = match (destination, history.destination) {
                (Some(mut acc), Some(items)) => {
                    acc.extend(items);
                    Some(acc)
                }
                _ => None,
            };
        }

        Some(Self::new(operation_type, source, destination))
    }

    /// Number of items this history covers.
    pub fn len(&self) -> usize {
        self.source.len()
    }

    /// Check if the history covers no items.
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// Check if this history can be inverted.
    pub fn can_undo(&self) -> bool {
        match self.operation_type {
            OperationType::Delete => false,
            OperationType::CreateNew => true,
            _ => self.destination.is_some(),
        }
    }

    /// Whether any recorded path is blank and the history cannot be replayed.
    pub fn has_blank_paths(&self) -> bool {
        let blank = |items: &[PathWithType]| items.iter().any(PathWithType::has_no_path);
        blank(&self.source) || self.destination.as_deref().is_some_and(blank)
    }

    /// Human-readable description, used by undo menus and logs.
    pub fn description(&self) -> String {
        let count = self.len();
        match self.operation_type {
            OperationType::CreateNew => format!("Created {count} items"),
            OperationType::Copy => format!("Copied {count} items"),
            OperationType::Move => format!("Moved {count} items"),
            OperationType::Delete => format!("Permanently deleted {count} items"),
            OperationType::Recycle => format!("Moved {count} items to the recycle bin"),
            OperationType::Rename => match (self.source.first(), self.destination_first()) {
                (Some(from), Some(to)) if count == 1 => format!(
                    "Renamed '{}' to '{}'",
                    from.name().unwrap_or_default(),
                    to.name().unwrap_or_default()
                ),
                _ => format!("Renamed {count} items"),
            },
            OperationType::Restore => format!("Restored {count} items"),
        }
    }

    fn destination_first(&self) -> Option<&PathWithType> {
        self.destination.as_ref().and_then(|d| d.first())
    }
}
