//! In-process download job queue.
//!
//! [`DownloadQueue`] is the dispatch seam used by the state machine and the
//! discovery bridge; [`DownloadWorker`] drains it, running at most
//! `max_concurrent_downloads` episode jobs at a time. Each job runs in its own
//! task so that a panic is contained and recorded as a failed episode.

use crate::domain::EpisodeId;
use crate::services::episode_state::EpisodeStateMachine;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Fire-and-forget job submission with an availability probe.
pub trait JobDispatcher: Send + Sync {
    /// Whether enqueued jobs will be picked up.
    fn is_available(&self) -> bool;

    /// Submits a download job; returns `false` when the job was not accepted.
    fn enqueue(&self, episode_id: EpisodeId) -> bool;
}

pub struct DownloadQueue {
    tx: mpsc::UnboundedSender<EpisodeId>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<EpisodeId>>>,
    accepting: AtomicBool,
}

impl Default for DownloadQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadQueue {
    /// Creates a closed queue. Call [`DownloadQueue::open`] once a worker is
    /// going to drain it.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            accepting: AtomicBool::new(false),
        }
    }

    pub fn open(&self) {
        self.accepting.store(true, Ordering::SeqCst);
    }

    pub fn close(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }

    /// Hands the receiving side to a worker. Only one worker holds it at a
    /// time.
    pub async fn take_receiver(&self) -> Option<mpsc::UnboundedReceiver<EpisodeId>> {
        self.rx.lock().await.take()
    }

    /// Returns a receiver handed out by [`DownloadQueue::take_receiver`].
    pub async fn restore_receiver(&self, rx: mpsc::UnboundedReceiver<EpisodeId>) {
        *self.rx.lock().await = Some(rx);
    }
}

impl JobDispatcher for DownloadQueue {
    fn is_available(&self) -> bool {
        self.accepting.load(Ordering::SeqCst) && !self.tx.is_closed()
    }

    fn enqueue(&self, episode_id: EpisodeId) -> bool {
        if !self.is_available() {
            warn!(episode_id = %episode_id, "Download queue unavailable, job not queued");
            return false;
        }

        match self.tx.send(episode_id) {
            Ok(()) => {
                debug!(episode_id = %episode_id, "Queued download job");
                true
            }
            Err(_) => {
                warn!(episode_id = %episode_id, "Download worker stopped, job dropped");
                false
            }
        }
    }
}

pub struct DownloadWorker {
    rx: mpsc::UnboundedReceiver<EpisodeId>,
    machine: Arc<EpisodeStateMachine>,
    semaphore: Arc<Semaphore>,
}

impl DownloadWorker {
    #[must_use]
    pub fn new(
        rx: mpsc::UnboundedReceiver<EpisodeId>,
        machine: Arc<EpisodeStateMachine>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            rx,
            machine,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Processes jobs until every sender is dropped.
    pub async fn run(mut self) {
        info!("Download worker started");
        let mut jobs = JoinSet::new();

        while let Some(episode_id) = self.rx.recv().await {
            self.spawn_job(&mut jobs, episode_id);
            while jobs.try_join_next().is_some() {}
        }

        while jobs.join_next().await.is_some() {}
        info!("Download worker stopped");
    }

    /// Processes queued jobs, including ones queued while running, and
    /// returns the receiver once the queue is empty and nothing is in flight.
    pub async fn run_until_idle(mut self) -> mpsc::UnboundedReceiver<EpisodeId> {
        let mut jobs = JoinSet::new();

        loop {
            match self.rx.try_recv() {
                Ok(episode_id) => self.spawn_job(&mut jobs, episode_id),
                Err(mpsc::error::TryRecvError::Empty) => {
                    if jobs.join_next().await.is_none() {
                        break;
                    }
                }
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    while jobs.join_next().await.is_some() {}
                    break;
                }
            }
        }

        self.rx
    }

    fn spawn_job(&self, jobs: &mut JoinSet<()>, episode_id: EpisodeId) {
        let machine = self.machine.clone();
        let semaphore = self.semaphore.clone();

        jobs.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            execute_job(machine, episode_id).await;
        });
    }
}

/// Runs one episode job in its own task; a panic is recorded on the episode.
pub async fn execute_job(machine: Arc<EpisodeStateMachine>, episode_id: EpisodeId) {
    let runner = machine.clone();
    let result = tokio::spawn(async move { runner.run(episode_id).await }).await;

    if let Err(e) = result {
        error!(episode_id = %episode_id, error = %e, "Download job aborted unexpectedly");
        machine
            .mark_failed(episode_id, &format!("Download task aborted: {e}"))
            .await;
    }
}
