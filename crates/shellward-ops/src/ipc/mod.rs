//! Helper-process protocol.
//!
//! The helper speaks newline-delimited JSON over any byte stream (its
//! stdin/stdout when spawned). Each line is a [`WireMessage`]: requests and
//! responses are correlated by a numeric `id`, progress events and
//! cancellations by the request's `operationID`.

mod client;
mod message;
mod server;

pub use client::{FixedConnector, HelperConnection, HelperConnector, HelperMode, NoHelper, ProcessConnector};
pub use message::{
    is_wire_safe, FileOpKind, FileOperationRequest, HelperResponse, ShellOperationItemResult,
    WireMessage, FILE_OPERATION, PATH_SEPARATOR,
};
pub use server::{serve, HelperExecutor};

use thiserror::Error;

/// Errors on the helper channel.
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("I/O error on helper channel: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed helper message: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Helper connection closed")]
    Disconnected,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
