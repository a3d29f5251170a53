//! Shared fixtures: a local server standing in for the catalog site and a
//! `SharedState` wired to it with in-memory episode sources.

#![allow(dead_code)]

use animedl::clients::{
    CatalogSearch, ClientError, DiscoveredEpisode, DiscoveredEpisodes, EpisodeDiscovery,
};
use animedl::config::Config;
use animedl::domain::{EpisodeId, EpisodeNumber, SeriesId};
use animedl::models::catalog::CatalogEntry;
use animedl::models::series::NewSeries;
use animedl::state::SharedState;
use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, Bytes},
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, broadcast};

pub const VIDEO_LEN: usize = 20_000;
pub const SLOW_VIDEO_LEN: usize = 64 * 1024;

#[derive(Clone)]
pub struct MockSite {
    pub base: String,
    /// Releases the second half of the `slow` video.
    pub gate: Arc<Notify>,
}

async fn embed_url(State(site): State<MockSite>, Path(id): Path<String>) -> Response {
    if id == "missing" {
        return StatusCode::NOT_FOUND.into_response();
    }
    if id == "garbage" {
        return "<html>login required</html>".into_response();
    }
    format!("{}/embed/{id}", site.base).into_response()
}

async fn embed_page(State(site): State<MockSite>, Path(id): Path<String>) -> Response {
    if id == "noscript" {
        return "<html><body>nothing here</body></html>".into_response();
    }
    format!(
        "<html><script>window.downloadUrl = '{}/video/{id}';</script></html>",
        site.base
    )
    .into_response()
}

async fn video(State(site): State<MockSite>, Path(id): Path<String>) -> Response {
    if id == "slow" {
        let gate = site.gate.clone();
        let stream = futures::stream::unfold(0u8, move |step| {
            let gate = gate.clone();
            async move {
                match step {
                    0 => Some((Ok::<_, std::io::Error>(Bytes::from(vec![1u8; 8192])), 1)),
                    1 => {
                        gate.notified().await;
                        Some((Ok(Bytes::from(vec![2u8; SLOW_VIDEO_LEN - 8192])), 2))
                    }
                    _ => None,
                }
            }
        });
        return (
            [(header::CONTENT_LENGTH, SLOW_VIDEO_LEN.to_string())],
            Body::from_stream(stream),
        )
            .into_response();
    }

    if id == "broken" {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    vec![7u8; VIDEO_LEN].into_response()
}

pub async fn spawn_site() -> MockSite {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind mock site");
    let addr = listener.local_addr().expect("missing local addr");

    let site = MockSite {
        base: format!("http://{addr}"),
        gate: Arc::new(Notify::new()),
    };

    let app = Router::new()
        .route("/embed-url/{id}", get(embed_url))
        .route("/embed/{id}", get(embed_page))
        .route("/video/{id}", get(video))
        .with_state(site.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock site crashed");
    });

    site
}

/// Episode source whose answer can be changed between checks.
#[derive(Default)]
pub struct FakeSource {
    pub episodes: Mutex<DiscoveredEpisodes>,
    pub entries: Vec<CatalogEntry>,
}

impl FakeSource {
    pub fn set_episodes(&self, episodes: Vec<(&str, String)>) {
        let mut guard = self.episodes.lock().expect("poisoned");
        guard.episodes = episodes
            .into_iter()
            .map(|(number, url)| DiscoveredEpisode {
                number: EpisodeNumber::new(number),
                url,
            })
            .collect();
    }
}

#[async_trait]
impl EpisodeDiscovery for FakeSource {
    async fn discover_episodes(&self, _series_url: &str) -> Result<DiscoveredEpisodes, ClientError> {
        Ok(self.episodes.lock().expect("poisoned").clone())
    }
}

#[async_trait]
impl CatalogSearch for FakeSource {
    async fn search(&self, _query: &str) -> Result<Vec<CatalogEntry>, ClientError> {
        Ok(self.entries.clone())
    }
}

pub struct TestEnv {
    pub site: MockSite,
    pub state: SharedState,
    pub source: Arc<FakeSource>,
    pub media_root: PathBuf,
}

impl TestEnv {
    pub async fn new() -> Self {
        Self::with_metadata(false).await
    }

    pub async fn with_metadata(write_metadata: bool) -> Self {
        let site = spawn_site().await;
        let unique = uuid::Uuid::new_v4();

        let db_path = std::env::temp_dir().join(format!("animedl-test-{unique}.db"));
        let media_root = std::env::temp_dir().join(format!("animedl-media-{unique}"));

        let mut config = Config::default();
        config.general.database_path = format!("sqlite:{}", db_path.display());
        config.catalog.base_url.clone_from(&site.base);
        config.catalog.request_timeout_seconds = 5;
        config.library.media_root = media_root.display().to_string();
        config.library.write_metadata = write_metadata;
        config.scheduler.check_delay_seconds = 0;

        let source = Arc::new(FakeSource::default());
        let (event_bus, _) = broadcast::channel(256);

        let state = SharedState::with_clients(
            config,
            reqwest::Client::new(),
            event_bus,
            source.clone(),
            source.clone(),
        )
        .await
        .expect("failed to create shared state");

        Self {
            site,
            state,
            source,
            media_root,
        }
    }

    pub fn episode_url(&self, key: &str) -> String {
        format!("{}/anime/1-test-show/{key}", self.site.base)
    }

    pub async fn seed_series(&self, title: &str) -> SeriesId {
        let (id, created) = self
            .state
            .store
            .upsert_series(&NewSeries {
                title: title.to_string(),
                source_url: format!("{}/anime/1-test-show", self.site.base),
                directory_name: title.to_string(),
                ..NewSeries::default()
            })
            .await
            .expect("failed to insert series");
        assert!(created);
        id
    }

    pub async fn seed_episode(&self, series_id: SeriesId, number: &str, key: &str) -> EpisodeId {
        self.state
            .store
            .insert_episode_if_missing(series_id, &EpisodeNumber::new(number), &self.episode_url(key))
            .await
            .expect("failed to insert episode")
            .expect("episode already existed")
    }

    /// Drains queued job ids without running them.
    pub async fn drain_queue(&self) -> Vec<EpisodeId> {
        let mut rx = self
            .state
            .queue
            .take_receiver()
            .await
            .expect("receiver already taken");
        let mut ids = Vec::new();
        while let Ok(id) = rx.try_recv() {
            ids.push(id);
        }
        self.state.queue.restore_receiver(rx).await;
        ids
    }
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.media_root);
    }
}
