//! Client side of the helper channel.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{FileOperationRequest, HelperResponse, IpcError, WireMessage};
use crate::BoxFuture;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<HelperResponse>>>>;
type ProgressMap = Arc<Mutex<HashMap<Uuid, mpsc::UnboundedSender<f32>>>>;
type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A live connection to a helper process.
pub struct HelperConnection {
    writer: tokio::sync::Mutex<BoxWriter>,
    pending: PendingMap,
    progress: ProgressMap,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    reader_task: JoinHandle<()>,
    _child: Option<Child>,
}

/// Removes a progress subscription when dropped.
struct ProgressSubscription {
    map: ProgressMap,
    operation_id: Uuid,
}

impl Drop for ProgressSubscription {
    fn drop(&mut self) {
        if let Ok(mut map) = self.map.lock() {
            map.remove(&self.operation_id);
        }
    }
}

impl HelperConnection {
    /// Wrap a byte stream pair connected to a helper.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let pending: PendingMap = Arc::default();
        let progress: ProgressMap = Arc::default();
        let closed = Arc::new(AtomicBool::new(false));

        let reader_task = tokio::spawn(read_loop(
            reader,
            Arc::clone(&pending),
            Arc::clone(&progress),
            Arc::clone(&closed),
        ));

        Self {
            writer: tokio::sync::Mutex::new(Box::new(writer)),
            pending,
            progress,
            next_id: AtomicU64::new(1),
            closed,
            reader_task,
            _child: None,
        }
    }

    /// Keep the spawned helper alive for as long as this connection.
    pub fn with_child(mut self, child: Child) -> Self {
        self._child = Some(child);
        self
    }

    /// Check if the helper is still reachable.
    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    async fn write(&self, message: &WireMessage) -> Result<(), IpcError> {
        if !self.is_connected() {
            return Err(IpcError::Disconnected);
        }
        let line = message.encode()?;
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Send a request and wait for its response.
    pub async fn send_for_response(
        &self,
        request: FileOperationRequest,
    ) -> Result<HelperResponse, IpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .map_err(|_| IpcError::Disconnected)?
            .insert(id, tx);

        debug!(
            target: "shellward::ipc",
            id,
            fileop = %request.fileop,
            operation_id = %request.operation_id,
            "Sending helper request"
        );

        if let Err(e) = self.write(&WireMessage::Request { id, body: request }).await {
            if let Ok(mut pending) = self.pending.lock() {
                pending.remove(&id);
            }
            return Err(e);
        }

        rx.await.map_err(|_| IpcError::Disconnected)
    }

    /// Ask the helper to stop an operation.
    pub async fn cancel(&self, operation_id: Uuid) -> Result<(), IpcError> {
        self.write(&WireMessage::Cancel { operation_id }).await
    }

    /// Execute a request, relaying its progress and forwarding cancellation.
    ///
    /// After a cancellation the helper still answers, reporting the items
    /// it did not get to as failed.
    pub async fn execute(
        &self,
        request: FileOperationRequest,
        progress: Option<mpsc::UnboundedSender<f32>>,
        cancel: &CancellationToken,
    ) -> Result<HelperResponse, IpcError> {
        let operation_id = request.operation_id;
        let _subscription = progress.map(|tx| {
            if let Ok(mut map) = self.progress.lock() {
                map.insert(operation_id, tx);
            }
            ProgressSubscription {
                map: Arc::clone(&self.progress),
                operation_id,
            }
        });

        let response = self.send_for_response(request);
        tokio::pin!(response);

        tokio::select! {
            result = &mut response => result,
            _ = cancel.cancelled() => {
                info!(target: "shellward::ipc", %operation_id, "Cancelling helper operation");
                if let Err(e) = self.cancel(operation_id).await {
                    warn!(target: "shellward::ipc", error = %e, "Failed to forward cancellation");
                }
                response.await
            }
        }
    }
}

impl Drop for HelperConnection {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

async fn read_loop<R>(reader: R, pending: PendingMap, progress: ProgressMap, closed: Arc<AtomicBool>)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(target: "shellward::ipc", error = %e, "Helper channel read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match WireMessage::decode(&line) {
            Ok(WireMessage::Response { id, body }) => {
                let sender = pending.lock().ok().and_then(|mut p| p.remove(&id));
                match sender {
                    Some(tx) => {
                        let _ = tx.send(body);
                    }
                    None => debug!(target: "shellward::ipc", id, "Response for unknown request"),
                }
            }
            Ok(WireMessage::Progress {
                operation_id,
                progress: value,
            }) => {
                if let Some(tx) = progress.lock().ok().and_then(|p| p.get(&operation_id).cloned()) {
                    let _ = tx.send(value);
                }
            }
            Ok(other) => {
                debug!(target: "shellward::ipc", ?other, "Ignoring unexpected helper message");
            }
            Err(e) => {
                warn!(target: "shellward::ipc", error = %e, "Malformed helper message");
            }
        }
    }

    closed.store(true, Ordering::Release);
    if let Ok(mut pending) = pending.lock() {
        pending.clear();
    }
    debug!(target: "shellward::ipc", "Helper channel closed");
}

/// Privilege level of the helper to connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum HelperMode {
    Standard,
    Elevated,
}

/// Opens helper connections on demand.
pub trait HelperConnector: Send + Sync {
    /// Connect to (or reuse) a helper of the given mode. `None` when no
    /// helper is available.
    fn connect<'a>(&'a self, mode: HelperMode) -> BoxFuture<'a, Option<Arc<HelperConnection>>>;
}

/// No helper process exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHelper;

impl HelperConnector for NoHelper {
    fn connect<'a>(&'a self, _mode: HelperMode) -> BoxFuture<'a, Option<Arc<HelperConnection>>> {
        Box::pin(async { None })
    }
}

/// Hands out pre-established connections.
#[derive(Default)]
pub struct FixedConnector {
    pub standard: Option<Arc<HelperConnection>>,
    pub elevated: Option<Arc<HelperConnection>>,
}

impl FixedConnector {
    /// Use the same connection for both modes.
    pub fn shared(connection: Arc<HelperConnection>) -> Self {
        Self {
            standard: Some(Arc::clone(&connection)),
            elevated: Some(connection),
        }
    }
}

impl HelperConnector for FixedConnector {
    fn connect<'a>(&'a self, mode: HelperMode) -> BoxFuture<'a, Option<Arc<HelperConnection>>> {
        Box::pin(async move {
            let connection = match mode {
                HelperMode::Standard => self.standard.clone(),
                HelperMode::Elevated => self.elevated.clone(),
            };
            connection.filter(|c| c.is_connected())
        })
    }
}

/// Spawns helper processes and caches one connection per mode.
///
/// With no standard command configured, the current executable is started
/// with the `helper` argument. Elevated helpers are only started from an
/// explicitly configured command.
pub struct ProcessConnector {
    standard_command: Vec<String>,
    elevated_command: Vec<String>,
    standard: tokio::sync::Mutex<Option<Arc<HelperConnection>>>,
    elevated: tokio::sync::Mutex<Option<Arc<HelperConnection>>>,
}

impl ProcessConnector {
    pub fn new(standard_command: Vec<String>, elevated_command: Vec<String>) -> Self {
        Self {
            standard_command,
            elevated_command,
            standard: tokio::sync::Mutex::new(None),
            elevated: tokio::sync::Mutex::new(None),
        }
    }

    fn command_for(&self, mode: HelperMode) -> Option<Vec<String>> {
        match mode {
            HelperMode::Standard if self.standard_command.is_empty() => {
                let exe = std::env::current_exe().ok()?;
                Some(vec![exe.to_string_lossy().into_owned(), "helper".to_string()])
            }
            HelperMode::Standard => Some(self.standard_command.clone()),
            HelperMode::Elevated if self.elevated_command.is_empty() => None,
            HelperMode::Elevated => Some(self.elevated_command.clone()),
        }
    }

    fn spawn(&self, mode: HelperMode) -> Option<HelperConnection> {
        let command = self.command_for(mode)?;
        let (program, args) = command.split_first()?;

        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(target: "shellward::ipc", %mode, program, error = %e, "Failed to start helper");
                return None;
            }
        };

        let stdin = child.stdin.take()?;
        let stdout = child.stdout.take()?;
        info!(target: "shellward::ipc", %mode, program, "Started helper process");
        Some(HelperConnection::new(stdout, stdin).with_child(child))
    }
}

impl HelperConnector for ProcessConnector {
    fn connect<'a>(&'a self, mode: HelperMode) -> BoxFuture<'a, Option<Arc<HelperConnection>>> {
        Box::pin(async move {
            let slot = match mode {
                HelperMode::Standard => &self.standard,
                HelperMode::Elevated => &self.elevated,
            };
            let mut cached = slot.lock().await;

            if let Some(connection) = cached.as_ref().filter(|c| c.is_connected()) {
                return Some(Arc::clone(connection));
            }

            let connection = Arc::new(self.spawn(mode)?);
            *cached = Some(Arc::clone(&connection));
            Some(connection)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::ShellOperationItemResult;
    use shellward_core::FileSystemStatusCode;
    use std::path::PathBuf;
    use tokio::io::duplex;

    /// Answers every request with success after one progress event.
    async fn fake_helper(stream: tokio::io::DuplexStream) {
        let (read, mut write) = tokio::io::split(stream);
        let mut lines = BufReader::new(read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Ok(WireMessage::Request { id, body }) = WireMessage::decode(&line) {
                let progress = WireMessage::Progress {
                    operation_id: body.operation_id,
                    progress: 100.0,
                };
                let response = WireMessage::Response {
                    id,
                    body: HelperResponse::from_items(vec![ShellOperationItemResult {
                        succeeded: true,
                        source: PathBuf::from(&body.filepath),
                        destination: None,
                        status: FileSystemStatusCode::Success,
                    }]),
                };
                write
                    .write_all(progress.encode().unwrap().as_bytes())
                    .await
                    .unwrap();
                write
                    .write_all(response.encode().unwrap().as_bytes())
                    .await
                    .unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_round_trip_with_progress() {
        let (client, server) = duplex(4096);
        tokio::spawn(fake_helper(server));
        let (read, write) = tokio::io::split(client);
        let connection = HelperConnection::new(read, write);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let request = FileOperationRequest::delete(&["/a"], true);
        let response = connection
            .execute(request, Some(tx), &CancellationToken::new())
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(rx.recv().await, Some(100.0));
    }

    #[tokio::test]
    async fn test_disconnect_fails_pending() {
        let (client, server) = duplex(4096);
        let (read, write) = tokio::io::split(client);
        let connection = HelperConnection::new(read, write);
        drop(server);

        let result = connection
            .send_for_response(FileOperationRequest::delete(&["/a"], true))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_no_helper() {
        assert!(NoHelper.connect(HelperMode::Elevated).await.is_none());
        let connector = ProcessConnector::new(Vec::new(), Vec::new());
        assert!(connector.connect(HelperMode::Elevated).await.is_none());
    }
}
