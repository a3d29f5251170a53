//! Streaming episode transfer with coarse progress checkpoints.
//!
//! Progress is reported only when the percentage advances by more than
//! [`PROGRESS_STEP`] or reaches 100. Each checkpoint first asks the
//! [`CancelProbe`] whether the episode was cancelled or skipped, so a control
//! action takes effect within one checkpoint interval.

use crate::constants::transfer::{CHUNK_SIZE, PROGRESS_STEP};
use crate::domain::AbortReason;
use futures::StreamExt;
use std::path::Path;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed after {received} of {expected} bytes")]
    Incomplete { received: u64, expected: u64 },

    #[error("Progress reporting failed: {0}")]
    Progress(String),
}

#[derive(Debug)]
pub enum TransferOutcome {
    Completed { bytes: u64 },
    Aborted(AbortReason),
    Failed(TransferError),
}

/// Asked at every checkpoint whether the transfer must stop.
#[async_trait::async_trait]
pub trait CancelProbe: Send + Sync {
    async fn should_abort(&self) -> anyhow::Result<Option<AbortReason>>;
}

/// Receives the percentage at every checkpoint that was not aborted.
#[async_trait::async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, percent: u8) -> anyhow::Result<()>;
}

/// Decides when a checkpoint fires.
#[derive(Debug, Default)]
struct CheckpointTracker {
    last_reported: u8,
}

impl CheckpointTracker {
    fn percent(received: u64, total: u64) -> u8 {
        if total == 0 {
            return 100;
        }
        let pct = (u128::from(received) * 100 / u128::from(total)).min(100);
        u8::try_from(pct).unwrap_or(100)
    }

    fn should_fire(&self, percent: u8) -> bool {
        percent > self.last_reported.saturating_add(PROGRESS_STEP)
            || (percent >= 100 && self.last_reported < 100)
    }
}

enum Checkpoint {
    Continue,
    Stop(TransferOutcome),
}

#[derive(Clone)]
pub struct StreamingDownloader {
    client: reqwest::Client,
}

impl StreamingDownloader {
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Streams `url` into `dest`. The destination is removed on every outcome
    /// other than [`TransferOutcome::Completed`].
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        sink: &dyn ProgressSink,
        probe: &dyn CancelProbe,
    ) -> TransferOutcome {
        let outcome = self.stream_to_file(url, dest, sink, probe).await;

        if !matches!(outcome, TransferOutcome::Completed { .. }) {
            discard_partial(dest).await;
        }

        outcome
    }

    async fn stream_to_file(
        &self,
        url: &str,
        dest: &Path,
        sink: &dyn ProgressSink,
        probe: &dyn CancelProbe,
    ) -> TransferOutcome {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => return TransferOutcome::Failed(e.into()),
        };

        let status = response.status();
        if !status.is_success() {
            return TransferOutcome::Failed(TransferError::Status(status.as_u16()));
        }

        let total = response.content_length().filter(|len| *len > 0);

        let mut file = match open_destination(dest).await {
            Ok(f) => f,
            Err(e) => return TransferOutcome::Failed(e.into()),
        };

        let mut tracker = CheckpointTracker::default();
        let mut received: u64 = 0;
        let mut stream = std::pin::pin!(response.bytes_stream());

        while let Some(item) = stream.next().await {
            let bytes = match item {
                Ok(b) => b,
                Err(e) => return TransferOutcome::Failed(e.into()),
            };

            for chunk in bytes.chunks(CHUNK_SIZE) {
                if let Err(e) = file.write_all(chunk).await {
                    return TransferOutcome::Failed(e.into());
                }
                received += chunk.len() as u64;

                if let Some(total) = total {
                    let percent = CheckpointTracker::percent(received, total);
                    if tracker.should_fire(percent)
                        && let Checkpoint::Stop(outcome) =
                            checkpoint(&mut tracker, percent, sink, probe).await
                    {
                        return outcome;
                    }
                }
            }
        }

        if let Err(e) = file.flush().await {
            return TransferOutcome::Failed(e.into());
        }
        drop(file);

        if let Some(expected) = total
            && received < expected
        {
            return TransferOutcome::Failed(TransferError::Incomplete { received, expected });
        }

        if tracker.last_reported < 100
            && let Checkpoint::Stop(outcome) = checkpoint(&mut tracker, 100, sink, probe).await
        {
            return outcome;
        }

        debug!(url, bytes = received, path = %dest.display(), "Transfer finished");
        TransferOutcome::Completed { bytes: received }
    }
}

async fn checkpoint(
    tracker: &mut CheckpointTracker,
    percent: u8,
    sink: &dyn ProgressSink,
    probe: &dyn CancelProbe,
) -> Checkpoint {
    match probe.should_abort().await {
        Ok(Some(reason)) => return Checkpoint::Stop(TransferOutcome::Aborted(reason)),
        Ok(None) => {}
        Err(e) => {
            return Checkpoint::Stop(TransferOutcome::Failed(TransferError::Progress(
                e.to_string(),
            )));
        }
    }

    if let Err(e) = sink.report(percent).await {
        return Checkpoint::Stop(TransferOutcome::Failed(TransferError::Progress(
            e.to_string(),
        )));
    }

    tracker.last_reported = percent;
    Checkpoint::Continue
}

async fn open_destination(dest: &Path) -> std::io::Result<tokio::fs::File> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(dest)
        .await
}

async fn discard_partial(dest: &Path) {
    match tokio::fs::remove_file(dest).await {
        Ok(()) => debug!(path = %dest.display(), "Removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %dest.display(), error = %e, "Failed to remove partial download"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Aborts with `reason` on the `abort_on`-th call (1-based).
    struct ScriptedCancel {
        calls: AtomicUsize,
        abort_on: Option<(usize, AbortReason)>,
    }

    impl ScriptedCancel {
        fn never() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                abort_on: None,
            }
        }

        fn abort_on(call: usize, reason: AbortReason) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                abort_on: Some((call, reason)),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl CancelProbe for ScriptedCancel {
        async fn should_abort(&self) -> anyhow::Result<Option<AbortReason>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(self
                .abort_on
                .filter(|(at, _)| *at == call)
                .map(|(_, reason)| reason))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        reports: Mutex<Vec<u8>>,
    }

    impl RecordingSink {
        fn reports(&self) -> Vec<u8> {
            self.reports.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ProgressSink for RecordingSink {
        async fn report(&self, percent: u8) -> anyhow::Result<()> {
            self.reports.lock().unwrap().push(percent);
            Ok(())
        }
    }

    /// Answers one request with the raw bytes given, then closes.
    async fn serve_once(head: String, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            socket.shutdown().await.ok();
        });

        format!("http://{addr}/video.mp4")
    }

    fn with_length(len: usize) -> String {
        format!("HTTP/1.1 200 OK\r\nContent-Length: {len}\r\nConnection: close\r\n\r\n")
    }

    fn without_length() -> String {
        "HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n".to_string()
    }

    fn temp_dest() -> PathBuf {
        std::env::temp_dir()
            .join(format!("animedl-transfer-{}", uuid::Uuid::new_v4()))
            .join("Season 01")
            .join("episode.mp4")
    }

    #[tokio::test]
    async fn test_known_length_reports_coarse_progress() {
        let url = serve_once(with_length(64 * 1024), vec![1u8; 64 * 1024]).await;
        let dest = temp_dest();
        let (sink, cancel) = (RecordingSink::default(), ScriptedCancel::never());

        let outcome = StreamingDownloader::new(reqwest::Client::new())
            .download(&url, &dest, &sink, &cancel)
            .await;

        assert!(matches!(outcome, TransferOutcome::Completed { bytes: 65_536 }));
        let reports = sink.reports();
        assert_eq!(reports.last(), Some(&100));
        assert!(reports.windows(2).all(|w| w[1] > w[0] + PROGRESS_STEP || w[1] == 100));
        assert_eq!(cancel.calls(), reports.len());
        assert_eq!(tokio::fs::metadata(&dest).await.unwrap().len(), 65_536);
    }

    #[tokio::test]
    async fn test_skip_mid_transfer_discards_file() {
        let url = serve_once(with_length(64 * 1024), vec![1u8; 64 * 1024]).await;
        let dest = temp_dest();
        let sink = RecordingSink::default();
        let cancel = ScriptedCancel::abort_on(2, AbortReason::Skipped);

        let outcome = StreamingDownloader::new(reqwest::Client::new())
            .download(&url, &dest, &sink, &cancel)
            .await;

        assert!(matches!(
            outcome,
            TransferOutcome::Aborted(AbortReason::Skipped)
        ));
        assert_eq!(sink.reports().len(), 1);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_unknown_length_fires_only_final_checkpoint() {
        let url = serve_once(without_length(), vec![3u8; 40_000]).await;
        let dest = temp_dest();
        let (sink, cancel) = (RecordingSink::default(), ScriptedCancel::never());

        let outcome = StreamingDownloader::new(reqwest::Client::new())
            .download(&url, &dest, &sink, &cancel)
            .await;

        assert!(matches!(outcome, TransferOutcome::Completed { bytes: 40_000 }));
        assert_eq!(sink.reports(), vec![100]);
        assert_eq!(cancel.calls(), 1);
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn test_unknown_length_cancel_at_final_checkpoint_discards_file() {
        let url = serve_once(without_length(), vec![3u8; 40_000]).await;
        let dest = temp_dest();
        let sink = RecordingSink::default();
        let cancel = ScriptedCancel::abort_on(1, AbortReason::Cancelled);

        let outcome = StreamingDownloader::new(reqwest::Client::new())
            .download(&url, &dest, &sink, &cancel)
            .await;

        assert!(matches!(
            outcome,
            TransferOutcome::Aborted(AbortReason::Cancelled)
        ));
        assert!(sink.reports().is_empty());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_short_body_fails_and_discards_file() {
        let url = serve_once(with_length(100_000), vec![5u8; 30_000]).await;
        let dest = temp_dest();
        let (sink, cancel) = (RecordingSink::default(), ScriptedCancel::never());

        let outcome = StreamingDownloader::new(reqwest::Client::new())
            .download(&url, &dest, &sink, &cancel)
            .await;

        assert!(matches!(outcome, TransferOutcome::Failed(_)), "{outcome:?}");
        assert_ne!(sink.reports().last(), Some(&100));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_http_error_status_fails() {
        let head = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
        let url = serve_once(head.to_string(), Vec::new()).await;
        let dest = temp_dest();
        let (sink, cancel) = (RecordingSink::default(), ScriptedCancel::never());

        let outcome = StreamingDownloader::new(reqwest::Client::new())
            .download(&url, &dest, &sink, &cancel)
            .await;

        assert!(matches!(
            outcome,
            TransferOutcome::Failed(TransferError::Status(404))
        ));
        assert!(!dest.exists());
    }

    #[test]
    fn test_percent_is_floored_and_clamped() {
        assert_eq!(CheckpointTracker::percent(0, 1000), 0);
        assert_eq!(CheckpointTracker::percent(59, 1000), 5);
        assert_eq!(CheckpointTracker::percent(999, 1000), 99);
        assert_eq!(CheckpointTracker::percent(1000, 1000), 100);
        assert_eq!(CheckpointTracker::percent(2000, 1000), 100);
    }

    #[test]
    fn test_checkpoint_fires_after_more_than_step() {
        let mut tracker = CheckpointTracker::default();
        assert!(!tracker.should_fire(5));
        assert!(tracker.should_fire(6));

        tracker.last_reported = 6;
        assert!(!tracker.should_fire(11));
        assert!(tracker.should_fire(12));
    }

    #[test]
    fn test_checkpoint_always_fires_at_completion() {
        let tracker = CheckpointTracker { last_reported: 97 };
        assert!(tracker.should_fire(100));

        let done = CheckpointTracker { last_reported: 100 };
        assert!(!done.should_fire(100));
    }
}
