use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;

use crate::clients::{AnimeUnityClient, CatalogSearch, EpisodeDiscovery};
use crate::config::Config;
use crate::db::Store;
use crate::domain::events::NotificationEvent;
use crate::library::LibraryLayout;
use crate::services::{
    DiscoveryBridge, DownloadQueue, DownloadWorker, EpisodeStateMachine, LibraryService,
    StreamingDownloader, VideoUrlResolver,
};

/// Build a shared HTTP client with reasonable defaults.
/// This client is reused across catalog, resolution and transfer requests to
/// enable connection pooling and keep the catalog session cookies.
fn build_shared_http_client(config: &Config) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(u64::from(
            config.catalog.request_timeout_seconds,
        )))
        .user_agent(config.catalog.user_agent.clone())
        .cookie_store(true)
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub http: reqwest::Client,

    pub catalog: Arc<dyn CatalogSearch>,

    pub queue: Arc<DownloadQueue>,

    pub machine: Arc<EpisodeStateMachine>,

    pub discovery: Arc<DiscoveryBridge>,

    pub library: Arc<LibraryService>,

    pub layout: LibraryLayout,

    pub event_bus: broadcast::Sender<NotificationEvent>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let (event_bus, _) = broadcast::channel(config.general.event_bus_buffer_size.max(1));
        let http = build_shared_http_client(&config)?;
        let client = Arc::new(AnimeUnityClient::new(
            http.clone(),
            &config.catalog.base_url,
            Duration::from_secs(u64::from(config.catalog.request_timeout_seconds)),
        ));

        Self::with_clients(config, http, event_bus, client.clone(), client).await
    }

    /// Wires every service around the given catalog and discovery clients.
    pub async fn with_clients(
        config: Config,
        http: reqwest::Client,
        event_bus: broadcast::Sender<NotificationEvent>,
        catalog: Arc<dyn CatalogSearch>,
        episode_source: Arc<dyn EpisodeDiscovery>,
    ) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let timeout = Duration::from_secs(u64::from(config.catalog.request_timeout_seconds));
        let layout = LibraryLayout::new(&config.library);
        let queue = Arc::new(DownloadQueue::new());

        let machine = Arc::new(EpisodeStateMachine::new(
            store.clone(),
            VideoUrlResolver::new(http.clone(), timeout),
            StreamingDownloader::new(http.clone()),
            layout.clone(),
            queue.clone(),
            event_bus.clone(),
        ));

        let discovery = Arc::new(DiscoveryBridge::new(
            store.clone(),
            episode_source.clone(),
            machine.clone(),
            event_bus.clone(),
        ));

        let library = Arc::new(LibraryService::new(
            store.clone(),
            episode_source,
            queue.clone(),
            layout.clone(),
            http.clone(),
            config.library.write_metadata,
            event_bus.clone(),
        ));

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            http,
            catalog,
            queue,
            machine,
            discovery,
            library,
            layout,
            event_bus,
        })
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }

    async fn max_concurrent(&self) -> usize {
        self.config.read().await.downloads.max_concurrent_downloads
    }

    /// Opens the queue and starts a long-running worker for it.
    pub async fn spawn_worker(&self) -> anyhow::Result<JoinHandle<()>> {
        let rx = self
            .queue
            .take_receiver()
            .await
            .ok_or_else(|| anyhow::anyhow!("Download worker already running"))?;

        let worker = DownloadWorker::new(rx, self.machine.clone(), self.max_concurrent().await);
        self.queue.open();
        Ok(tokio::spawn(worker.run()))
    }

    /// Runs every queued job to completion on the current task.
    pub async fn run_pending_jobs(&self) -> anyhow::Result<()> {
        let rx = self
            .queue
            .take_receiver()
            .await
            .ok_or_else(|| anyhow::anyhow!("Download worker already running"))?;

        let worker = DownloadWorker::new(rx, self.machine.clone(), self.max_concurrent().await);
        let rx = worker.run_until_idle().await;
        self.queue.restore_receiver(rx).await;
        Ok(())
    }
}
