//! Helper side of the channel: executes requests with direct calls.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use shellward_core::{FileSystemStatusCode, FsError, FsResult, PathWithType};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{FileOpKind, FileOperationRequest, HelperResponse, IpcError, ShellOperationItemResult, WireMessage};
use crate::collision::{place_at, CollisionPolicy};
use crate::direct::{self, run_blocking, WalkLimits};
use crate::naming::validate_filename;
use crate::recycle_bin::{remove_metadata_twin, RecycleBin};
use crate::templates::NewItemTemplate;

/// Executes helper requests against the local filesystem.
pub struct HelperExecutor {
    max_depth: u32,
    recycle_bin: Arc<dyn RecycleBin>,
    alternate_streams_visible: bool,
    max_name_length: usize,
    running: Mutex<HashMap<Uuid, CancellationToken>>,
}

impl HelperExecutor {
    pub fn new(max_depth: u32, recycle_bin: Arc<dyn RecycleBin>) -> Self {
        Self {
            max_depth,
            recycle_bin,
            alternate_streams_visible: false,
            max_name_length: 255,
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Rules applied to the new name of a rename.
    pub fn with_name_rules(mut self, alternate_streams_visible: bool, max_name_length: usize) -> Self {
        self.alternate_streams_visible = alternate_streams_visible;
        self.max_name_length = max_name_length;
        self
    }

    fn register(&self, operation_id: Uuid) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut running) = self.running.lock() {
            running.insert(operation_id, token.clone());
        }
        token
    }

    fn finish(&self, operation_id: &Uuid) {
        if let Ok(mut running) = self.running.lock() {
            running.remove(operation_id);
        }
    }

    /// Cancel a running operation. Unknown IDs are ignored.
    pub fn cancel(&self, operation_id: &Uuid) {
        if let Some(token) = self.running.lock().ok().and_then(|r| r.get(operation_id).cloned()) {
            token.cancel();
        }
    }

    /// Cancel everything still running.
    pub fn cancel_all(&self) {
        if let Ok(running) = self.running.lock() {
            running.values().for_each(CancellationToken::cancel);
        }
    }

    /// Execute one request, sending progress through `progress`.
    pub async fn execute(
        &self,
        request: FileOperationRequest,
        progress: mpsc::UnboundedSender<f32>,
    ) -> HelperResponse {
        if let Err(e) = request.validate() {
            warn!(target: "shellward::helper", error = %e, "Rejected request");
            return HelperResponse::failed(&request.filepath, FileSystemStatusCode::Generic);
        }

        let cancel = self.register(request.operation_id);
        let sources = request.sources();
        let destinations = request.destinations();
        let count = sources.len();
        let mut items = Vec::with_capacity(count);

        info!(
            target: "shellward::helper",
            fileop = %request.fileop,
            operation_id = %request.operation_id,
            count,
            "Executing request"
        );

        for (index, source) in sources.iter().enumerate() {
            let result = if cancel.is_cancelled() {
                Err(FsError::cancelled(source))
            } else {
                self.execute_item(&request, source, destinations.get(index), &cancel)
                    .await
            };

            items.push(match result {
                Ok(destination) => ShellOperationItemResult {
                    succeeded: true,
                    source: source.clone(),
                    destination,
                    status: FileSystemStatusCode::Success,
                },
                Err(e) => {
                    debug!(target: "shellward::helper", error = %e, "Item failed");
                    ShellOperationItemResult {
                        succeeded: false,
                        source: source.clone(),
                        destination: None,
                        status: e.code,
                    }
                }
            });

            let _ = progress.send((index + 1) as f32 / count as f32 * 100.0);
        }

        self.finish(&request.operation_id);
        HelperResponse::from_items(items)
    }

    async fn execute_item(
        &self,
        request: &FileOperationRequest,
        source: &Path,
        destination: Option<&PathBuf>,
        cancel: &CancellationToken,
    ) -> FsResult<Option<PathBuf>> {
        let limits = WalkLimits::new(self.max_depth, cancel.clone());
        let source_owned = source.to_path_buf();

        match request.fileop {
            FileOpKind::CopyItem | FileOpKind::MoveItem => {
                let destination = destination
                    .cloned()
                    .ok_or_else(|| FsError::generic(source, "Missing destination"))?;
                if destination != source && source.starts_with(&destination) {
                    return Err(FsError::generic(&destination, "The destination contains the source item"));
                }
                let policy = request.transfer_policy();
                let is_move = request.fileop == FileOpKind::MoveItem;

                run_blocking(source, move || {
                    let resolved = place_at(&destination, policy, |target| {
                        if is_move {
                            direct::move_path(&source_owned, target, &limits)
                        } else {
                            direct::copy_path(&source_owned, target, &limits)
                        }
                    })?;
                    Ok(Some(resolved.path))
                })
                .await
            }
            FileOpKind::DeleteItem => {
                let recycle_bin = Arc::clone(&self.recycle_bin);
                let permanently = request.permanently;

                run_blocking(source, move || {
                    if permanently {
                        direct::force_remove(&source_owned)?;
                        remove_metadata_twin(&source_owned)?;
                    } else {
                        let item = PathWithType::resolve(&source_owned)?;
                        recycle_bin.recycle(&item)?;
                    }
                    Ok(None)
                })
                .await
            }
            FileOpKind::RenameItem => {
                let new_name = request.new_name.clone().unwrap_or_default();
                if let Err(e) = validate_filename(&new_name, self.alternate_streams_visible, self.max_name_length) {
                    return Err(FsError::new(e.status_code(), source, e.to_string()));
                }
                let policy = if request.overwrite {
                    CollisionPolicy::ReplaceExisting
                } else {
                    CollisionPolicy::FailIfExists
                };

                run_blocking(source, move || {
                    let destination = direct::sibling_path(&source_owned, &new_name);
                    let rename =
                        |target: &Path| std::fs::rename(&source_owned, target).map_err(|e| FsError::io(&source_owned, e));
                    // A case-only rename targets the source itself.
                    if direct::same_path_ignoring_case(&source_owned, &destination) {
                        rename(&destination)?;
                        return Ok(Some(destination));
                    }
                    Ok(Some(place_at(&destination, policy, rename)?.path))
                })
                .await
            }
            FileOpKind::CreateFile => {
                let template = NewItemTemplate {
                    template: request.template.clone(),
                    data: request.data.clone(),
                };

                run_blocking(source, move || {
                    if std::fs::symlink_metadata(&source_owned).is_ok() {
                        return Err(FsError::new(
                            FileSystemStatusCode::AlreadyExists,
                            &source_owned,
                            "Item already exists",
                        ));
                    }
                    template.write_to(&source_owned)?;
                    Ok(Some(source_owned))
                })
                .await
            }
            FileOpKind::CreateFolder => {
                run_blocking(source, move || {
                    direct::create_directory(&source_owned)?;
                    Ok(Some(source_owned))
                })
                .await
            }
        }
    }
}

/// Serve the helper protocol until the reader reaches end of input.
///
/// Requests run concurrently; all output is serialized through one writer.
pub async fn serve<R, W>(reader: R, writer: W, executor: Arc<HelperExecutor>) -> Result<(), IpcError>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<WireMessage>();

    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(message) = out_rx.recv().await {
            let line = message.encode()?;
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await?;
        }
        Ok::<(), IpcError>(())
    });

    let mut lines = BufReader::new(reader).lines();
    let mut tasks = Vec::new();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let message = match WireMessage::decode(&line) {
            Ok(message) => message,
            Err(e) => {
                warn!(target: "shellward::helper", error = %e, "Malformed message");
                continue;
            }
        };

        match message {
            WireMessage::Request { id, body } => {
                let executor = Arc::clone(&executor);
                let out_tx = out_tx.clone();
                tasks.push(tokio::spawn(async move {
                    let operation_id = body.operation_id;
                    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();

                    let relay_tx = out_tx.clone();
                    let relay = tokio::spawn(async move {
                        while let Some(progress) = progress_rx.recv().await {
                            let _ = relay_tx.send(WireMessage::Progress {
                                operation_id,
                                progress,
                            });
                        }
                    });

                    let response = executor.execute(body, progress_tx).await;
                    let _ = relay.await;
                    let _ = out_tx.send(WireMessage::Response { id, body: response });
                }));
            }
            WireMessage::Cancel { operation_id } => {
                info!(target: "shellward::helper", %operation_id, "Cancel requested");
                executor.cancel(&operation_id);
            }
            other => {
                debug!(target: "shellward::helper", ?other, "Ignoring unexpected message");
            }
        }

        tasks.retain(|t| !t.is_finished());
    }

    executor.cancel_all();
    for task in tasks {
        let _ = task.await;
    }
    drop(out_tx);

    match writer_task.await {
        Ok(result) => result,
        Err(e) => Err(IpcError::Io(std::io::Error::other(e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recycle_bin::DirectoryRecycleBin;
    use tempfile::TempDir;

    fn executor(temp: &TempDir) -> HelperExecutor {
        HelperExecutor::new(
            32,
            Arc::new(DirectoryRecycleBin::new(temp.path().join("bin"))),
        )
    }

    #[tokio::test]
    async fn test_execute_copy_generates_names() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.txt");
        std::fs::write(&src, b"a").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let response = executor(&temp)
            .execute(FileOperationRequest::copy(&[&src], &[&src], false), tx)
            .await;

        assert!(response.success);
        assert_eq!(
            response.result_items[0].destination,
            Some(temp.path().join("a (1).txt"))
        );
        assert_eq!(rx.recv().await, Some(100.0));
    }

    #[tokio::test]
    async fn test_execute_rename_refuses_existing() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.txt");
        std::fs::write(&src, b"a").unwrap();
        std::fs::write(temp.path().join("b.txt"), b"b").unwrap();

        let (tx, _rx) = mpsc::unbounded_channel();
        let response = executor(&temp)
            .execute(FileOperationRequest::rename(&src, "b.txt", false), tx)
            .await;

        assert!(!response.success);
        assert_eq!(response.status(), FileSystemStatusCode::AlreadyExists);
    }

    #[tokio::test]
    async fn test_execute_rename_rejects_invalid_names() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("dir");
        std::fs::create_dir_all(dir.join("sub")).unwrap();
        let src = dir.join("a.txt");
        std::fs::write(&src, b"a").unwrap();
        let executor = executor(&temp);

        for name in ["bad*name.txt", "CON", "sub/renamed.txt", "../x", ".."] {
            let (tx, _rx) = mpsc::unbounded_channel();
            let response = executor
                .execute(FileOperationRequest::rename(&src, name, false), tx)
                .await;
            assert!(!response.success, "{name} was accepted");
            assert_eq!(response.status(), FileSystemStatusCode::Generic);
        }

        let (tx, _rx) = mpsc::unbounded_channel();
        let long = "x".repeat(300);
        let response = executor
            .execute(FileOperationRequest::rename(&src, &long, false), tx)
            .await;
        assert_eq!(response.status(), FileSystemStatusCode::NameTooLong);

        assert!(src.exists());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 2);
        assert!(!temp.path().join("x").exists());
    }

    #[tokio::test]
    async fn test_execute_copy_fail_if_exists() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.txt");
        let dst = temp.path().join("b.txt");
        std::fs::write(&src, b"new").unwrap();
        std::fs::write(&dst, b"old").unwrap();

        let (tx, _rx) = mpsc::unbounded_channel();
        let request = FileOperationRequest::copy(&[&src], &[&dst], false).with_policy(CollisionPolicy::FailIfExists);
        let response = executor(&temp).execute(request, tx).await;

        assert_eq!(response.status(), FileSystemStatusCode::AlreadyExists);
        assert_eq!(std::fs::read(&dst).unwrap(), b"old");
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_execute_copy_onto_ancestor_is_refused() {
        let temp = TempDir::new().unwrap();
        let docs = temp.path().join("docs");
        std::fs::create_dir(&docs).unwrap();
        let report = docs.join("report.txt");
        std::fs::write(&report, b"r").unwrap();

        let (tx, _rx) = mpsc::unbounded_channel();
        let response = executor(&temp)
            .execute(FileOperationRequest::copy(&[&report], &[&docs], true), tx)
            .await;

        assert_eq!(response.status(), FileSystemStatusCode::Generic);
        assert_eq!(std::fs::read(&report).unwrap(), b"r");
        assert!(docs.is_dir());
    }

    #[tokio::test]
    async fn test_execute_delete_missing() {
        let temp = TempDir::new().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let response = executor(&temp)
            .execute(
                FileOperationRequest::delete(&[temp.path().join("gone")], true),
                tx,
            )
            .await;

        assert_eq!(response.status(), FileSystemStatusCode::NotFound);
    }

    #[tokio::test]
    async fn test_execute_create_folder() {
        let temp = TempDir::new().unwrap();
        let folder = temp.path().join("new");
        let (tx, _rx) = mpsc::unbounded_channel();
        let response = executor(&temp)
            .execute(FileOperationRequest::create_folder(&folder), tx)
            .await;

        assert!(response.success);
        assert!(folder.is_dir());
    }

    #[tokio::test]
    async fn test_serve_until_eof() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("x.txt");
        std::fs::write(&file, b"x").unwrap();

        let (client, server) = tokio::io::duplex(4096);
        let (server_read, server_write) = tokio::io::split(server);
        let serving = tokio::spawn(serve(server_read, server_write, Arc::new(executor(&temp))));

        let (client_read, client_write) = tokio::io::split(client);
        let connection = crate::ipc::HelperConnection::new(client_read, client_write);
        let response = connection
            .send_for_response(FileOperationRequest::delete(&[&file], true))
            .await
            .unwrap();
        assert!(response.success);
        assert!(!file.exists());

        drop(connection);
        serving.await.unwrap().unwrap();
    }
}
