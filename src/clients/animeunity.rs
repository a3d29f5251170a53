use super::{CatalogSearch, ClientError, DiscoveredEpisode, DiscoveredEpisodes, EpisodeDiscovery};
use crate::constants::limits::MAX_SEARCH_RESULTS;
use crate::domain::EpisodeNumber;
use crate::models::catalog::CatalogEntry;
use regex::Regex;
use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, ORIGIN, REFERER};
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};

const XSRF_COOKIE: &str = "XSRF-TOKEN";

#[derive(Debug, Deserialize)]
struct LiveSearchResponse {
    #[serde(default)]
    records: Vec<LiveSearchRecord>,
}

#[derive(Debug, Deserialize)]
struct LiveSearchRecord {
    id: i32,
    slug: String,
    title: Option<String>,
    title_eng: Option<String>,
    imageurl: Option<String>,
    plot: Option<String>,
    episodes_count: Option<Value>,
    date: Option<Value>,
    studio: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PlayerAnime {
    id: Option<Value>,
    slug: Option<String>,
    #[serde(default)]
    genres: Vec<PlayerGenre>,
}

#[derive(Debug, Deserialize)]
struct PlayerGenre {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PlayerEpisode {
    id: Option<Value>,
    number: Option<Value>,
}

/// Client for the AnimeUnity site: live search and episode discovery.
#[derive(Clone)]
pub struct AnimeUnityClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl AnimeUnityClient {
    #[must_use]
    pub fn new(client: Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn base_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
        if let Ok(origin) = HeaderValue::from_str(&self.base_url) {
            headers.insert(ORIGIN, origin);
        }
        if let Ok(referer) = HeaderValue::from_str(&format!("{}/", self.base_url)) {
            headers.insert(REFERER, referer);
        }
        headers
    }

    /// Loads the home page to obtain the session cookie and CSRF token the
    /// search endpoint expects.
    async fn csrf_headers(&self) -> Result<HeaderMap, ClientError> {
        let url = format!("{}/", self.base_url);
        let response = self
            .client
            .get(&url)
            .headers(self.base_headers())
            .timeout(self.timeout)
            .send()
            .await?;
        check_status(&response, &url)?;

        let xsrf = response
            .cookies()
            .find(|c| c.name() == XSRF_COOKIE)
            .map(|c| {
                urlencoding::decode(c.value())
                    .map_or_else(|_| c.value().to_string(), |v| v.into_owned())
            });
        let body = response.text().await?;
        let meta = parse_csrf_meta(&body);

        let mut headers = self.base_headers();
        if let Some(token) = xsrf.as_deref().and_then(|t| HeaderValue::from_str(t).ok()) {
            headers.insert("x-xsrf-token", token.clone());
            headers.insert("x-csrf-token", token);
        }
        if let Some(token) = meta.as_deref().and_then(|t| HeaderValue::from_str(t).ok()) {
            headers.insert("x-csrf-token", token);
        }

        debug!(
            has_xsrf = xsrf.is_some(),
            has_meta = meta.is_some(),
            "Obtained catalog session tokens"
        );
        Ok(headers)
    }

    #[must_use]
    pub fn series_url(&self, id: &str, slug: &str) -> String {
        format!("{}/anime/{id}-{slug}", self.base_url)
    }

    fn map_record(&self, record: LiveSearchRecord) -> CatalogEntry {
        let title = record
            .title_eng
            .filter(|t| !t.trim().is_empty())
            .or(record.title.filter(|t| !t.trim().is_empty()))
            .unwrap_or_else(|| "Unknown Title".to_string());

        CatalogEntry {
            url: self.series_url(&record.id.to_string(), &record.slug),
            title,
            cover_image: record.imageurl.filter(|u| !u.is_empty()),
            id: record.id,
            slug: record.slug,
            plot: record.plot,
            episodes_count: record
                .episodes_count
                .as_ref()
                .and_then(value_to_string)
                .and_then(|s| s.parse().ok()),
            year: record
                .date
                .as_ref()
                .and_then(value_to_string)
                .and_then(|d| extract_year(&d)),
            studio: record.studio.filter(|s| !s.is_empty()),
        }
    }

    /// Parses a series page into its episode list and genres.
    pub fn parse_series_page(
        &self,
        html: &str,
        series_url: &str,
    ) -> Result<DiscoveredEpisodes, ClientError> {
        let Some(attrs) = video_player_attributes(html) else {
            warn!(series_url, "No video player found on series page");
            return Ok(DiscoveredEpisodes::default());
        };

        let anime: PlayerAnime = attribute(&attrs, "anime")
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();

        let episode_base = match (anime.id.as_ref().and_then(value_to_string), anime.slug) {
            (Some(id), Some(slug)) if !slug.is_empty() => self.series_url(&id, &slug),
            _ => series_url.trim_end_matches('/').to_string(),
        };

        let raw_episodes: Vec<PlayerEpisode> = match attribute(&attrs, "episodes") {
            Some(raw) => serde_json::from_str(&raw)?,
            None => Vec::new(),
        };

        let mut episodes: Vec<DiscoveredEpisode> = raw_episodes
            .into_iter()
            .filter_map(|ep| {
                let number = ep.number.as_ref().and_then(value_to_string)?;
                let id = ep.id.as_ref().and_then(value_to_string)?;
                let number = EpisodeNumber::new(&number);
                if number.as_str().is_empty() {
                    return None;
                }
                Some(DiscoveredEpisode {
                    number,
                    url: format!("{episode_base}/{id}"),
                })
            })
            .collect();

        episodes.sort_by(|a, b| {
            a.number
                .sort_key()
                .total_cmp(&b.number.sort_key())
                .then_with(|| a.number.as_str().cmp(b.number.as_str()))
        });
        episodes.dedup_by(|a, b| a.number == b.number);

        Ok(DiscoveredEpisodes {
            episodes,
            genres: anime.genres.into_iter().map(|g| g.name).collect(),
        })
    }
}

#[async_trait::async_trait]
impl CatalogSearch for AnimeUnityClient {
    async fn search(&self, query: &str) -> Result<Vec<CatalogEntry>, ClientError> {
        let headers = self.csrf_headers().await?;

        let url = format!("{}/livesearch", self.base_url);
        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(&serde_json::json!({ "title": query }))
            .timeout(self.timeout)
            .send()
            .await?;
        check_status(&response, &url)?;

        let body: LiveSearchResponse = response.json().await?;
        let results: Vec<CatalogEntry> = body
            .records
            .into_iter()
            .take(MAX_SEARCH_RESULTS)
            .map(|r| self.map_record(r))
            .collect();

        info!(query, results = results.len(), "Catalog search finished");
        Ok(results)
    }
}

#[async_trait::async_trait]
impl EpisodeDiscovery for AnimeUnityClient {
    async fn discover_episodes(&self, series_url: &str) -> Result<DiscoveredEpisodes, ClientError> {
        let response = self
            .client
            .get(series_url)
            .timeout(self.timeout)
            .send()
            .await?;
        check_status(&response, series_url)?;
        let html = response.text().await?;

        let discovered = self.parse_series_page(&html, series_url)?;
        debug!(
            series_url,
            episodes = discovered.episodes.len(),
            "Discovered episodes"
        );
        Ok(discovered)
    }
}

fn check_status(response: &reqwest::Response, url: &str) -> Result<(), ClientError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(ClientError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        })
    }
}

fn get_regex(re: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    re.get_or_init(|| Regex::new(pattern).expect("Invalid regex pattern defined in code"))
}

fn parse_csrf_meta(html: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(&RE, r#"<meta\s+name="csrf-token"\s+content="([^"]+)""#)
        .captures(html)
        .map(|c| c[1].to_string())
}

fn video_player_attributes(html: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(&RE, r"(?is)<video-player\b([^>]*)>")
        .captures(html)
        .map(|c| c[1].to_string())
}

/// Reads a double-quoted attribute and decodes its HTML entities.
fn attribute(attrs: &str, name: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(&RE, r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*"([^"]*)""#)
        .captures_iter(attrs)
        .find(|c| c[1].eq_ignore_ascii_case(name))
        .map(|c| html_escape::decode_html_entities(&c[2]).into_owned())
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn extract_year(date: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(&RE, r"\b(\d{4})\b")
        .captures(date)
        .map(|c| c[1].to_string())
}
