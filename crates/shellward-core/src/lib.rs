//! Core types for shellward.
//!
//! This crate provides the value types shared by every filesystem operation:
//! typed paths, status codes, the undo-capable storage history record, and
//! the operations configuration.

mod config;
mod error;
mod history;
mod item;
mod status;

pub use config::{OpsConfig, OpsConfigBuilder};
pub use error::{FsError, FsResult};
pub use history::{OperationType, StorageHistory};
pub use item::{FilesystemItemType, PathWithType};
pub use status::FileSystemStatusCode;
