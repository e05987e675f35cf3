//! Progress and status sinks for file operations.

use shellward_core::FileSystemStatusCode;
use tokio::sync::mpsc;

/// Where an operation reports coarse progress (0.0 to 100.0) and status codes.
///
/// Both sinks are optional. Batch calls hand their sub-operations a
/// reporter without a progress sink so only the batch-level percentage is
/// visible.
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    progress: Option<mpsc::UnboundedSender<f32>>,
    status: Option<mpsc::UnboundedSender<FileSystemStatusCode>>,
    /// Drop `InProgress`; the caller already reported it.
    started: bool,
}

impl Reporter {
    /// A reporter that discards everything.
    pub fn silent() -> Self {
        Self::default()
    }

    /// Create a reporter from explicit senders.
    pub fn new(
        progress: Option<mpsc::UnboundedSender<f32>>,
        status: Option<mpsc::UnboundedSender<FileSystemStatusCode>>,
    ) -> Self {
        Self {
            progress,
            status,
            started: false,
        }
    }

    /// Create a reporter with both sinks and the receiving ends.
    pub fn channel() -> (Self, ReportReceiver) {
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        (
            Self::new(Some(progress_tx), Some(status_tx)),
            ReportReceiver {
                progress: progress_rx,
                status: status_rx,
            },
        )
    }

    /// Report a progress percentage.
    pub fn progress(&self, value: f32) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(value.clamp(0.0, 100.0));
        }
    }

    /// Report a status code.
    pub fn status(&self, code: FileSystemStatusCode) {
        if self.started && code == FileSystemStatusCode::InProgress {
            return;
        }
        if let Some(tx) = &self.status {
            let _ = tx.send(code);
        }
    }

    /// Report a batch position as `index / count * 100`.
    pub fn batch_progress(&self, index: usize, count: usize) {
        if count > 0 {
            self.progress(index as f32 / count as f32 * 100.0);
        }
    }

    /// The same status sink without a progress sink.
    pub fn status_only(&self) -> Self {
        Self {
            progress: None,
            status: self.status.clone(),
            started: self.started,
        }
    }

    /// The same sinks for work that continues an operation which already
    /// reported `InProgress`.
    pub fn continuing(&self) -> Self {
        Self {
            started: true,
            ..self.clone()
        }
    }

    /// The same progress sink with status codes captured in a new channel.
    pub fn capture_status(&self) -> (Self, mpsc::UnboundedReceiver<FileSystemStatusCode>) {
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        (Self::new(self.progress.clone(), Some(status_tx)), status_rx)
    }

    /// A progress sender for relaying values from another source.
    pub fn progress_sender(&self) -> Option<mpsc::UnboundedSender<f32>> {
        self.progress.clone()
    }
}

/// Receiving ends of [`Reporter::channel`].
#[derive(Debug)]
pub struct ReportReceiver {
    pub progress: mpsc::UnboundedReceiver<f32>,
    pub status: mpsc::UnboundedReceiver<FileSystemStatusCode>,
}

impl ReportReceiver {
    /// Drain all buffered status codes.
    pub fn drain_status(&mut self) -> Vec<FileSystemStatusCode> {
        let mut codes = Vec::new();
        while let Ok(code) = self.status.try_recv() {
            codes.push(code);
        }
        codes
    }

    /// Drain all buffered progress values.
    pub fn drain_progress(&mut self) -> Vec<f32> {
        let mut values = Vec::new();
        while let Ok(value) = self.progress.try_recv() {
            values.push(value);
        }
        values
    }

    /// The last reported status, draining the buffer.
    pub fn last_status(&mut self) -> Option<FileSystemStatusCode> {
        self.drain_status().pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporter_channel() {
        let (reporter, mut rx) = Reporter::channel();
        reporter.status(FileSystemStatusCode::InProgress);
        reporter.progress(150.0);
        reporter.status(FileSystemStatusCode::Success);

        assert_eq!(
            rx.drain_status(),
            vec![FileSystemStatusCode::InProgress, FileSystemStatusCode::Success]
        );
        assert_eq!(rx.drain_progress(), vec![100.0]);
    }

    #[test]
    fn test_continuing_skips_in_progress() {
        let (reporter, mut rx) = Reporter::channel();
        reporter.status(FileSystemStatusCode::InProgress);
        let inner = reporter.continuing();
        inner.status(FileSystemStatusCode::InProgress);
        inner.progress(100.0);
        inner.status(FileSystemStatusCode::Success);

        assert_eq!(
            rx.drain_status(),
            vec![FileSystemStatusCode::InProgress, FileSystemStatusCode::Success]
        );
        assert_eq!(rx.drain_progress(), vec![100.0]);
    }

    #[test]
    fn test_status_only_drops_progress() {
        let (reporter, mut rx) = Reporter::channel();
        let inner = reporter.status_only();
        inner.progress(50.0);
        inner.status(FileSystemStatusCode::NotFound);

        assert!(rx.drain_progress().is_empty());
        assert_eq!(rx.last_status(), Some(FileSystemStatusCode::NotFound));
    }

    #[test]
    fn test_batch_progress() {
        let (reporter, mut rx) = Reporter::channel();
        reporter.batch_progress(1, 4);
        reporter.batch_progress(0, 0);
        assert_eq!(rx.drain_progress(), vec![25.0]);
    }

    #[test]
    fn test_capture_status_keeps_progress() {
        let (reporter, mut rx) = Reporter::channel();
        let (inner, mut captured) = reporter.capture_status();
        inner.progress(40.0);
        inner.status(FileSystemStatusCode::AlreadyExists);

        assert_eq!(rx.drain_progress(), vec![40.0]);
        assert!(rx.drain_status().is_empty());
        assert_eq!(captured.try_recv().ok(), Some(FileSystemStatusCode::AlreadyExists));
    }

    #[test]
    fn test_silent_reporter() {
        let reporter = Reporter::silent();
        reporter.progress(10.0);
        reporter.status(FileSystemStatusCode::Generic);
    }
}
