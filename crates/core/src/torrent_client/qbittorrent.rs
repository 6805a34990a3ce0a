//! qBittorrent Web API v2 client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::QBittorrentConfig;

use super::{
    ShareLimits, TorrentClient, TorrentClientError, TorrentFile, TorrentFilters, TorrentInfo,
    TorrentState, TrackerEntry,
};

/// qBittorrent client implementation.
pub struct QBittorrentClient {
    client: Client,
    config: QBittorrentConfig,
    /// Whether the cookie jar holds a live session (refreshed on 403).
    session: Arc<RwLock<bool>>,
}

impl QBittorrentClient {
    pub fn new(config: QBittorrentConfig) -> Result<Self, TorrentClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .map_err(|e| TorrentClientError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            config,
            session: Arc::new(RwLock::new(false)),
        })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    /// Login and store session cookie.
    async fn login(&self) -> Result<(), TorrentClientError> {
        let url = format!("{}/api/v2/auth/login", self.base_url());
        let params = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;

        if body.contains("Ok.") {
            debug!("qBittorrent login successful");
            *self.session.write().await = true;
            Ok(())
        } else if body.contains("Fails.") || status == StatusCode::FORBIDDEN {
            Err(TorrentClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(TorrentClientError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    async fn ensure_authenticated(&self) -> Result<(), TorrentClientError> {
        if *self.session.read().await {
            return Ok(());
        }
        self.login().await
    }

    /// Send an authenticated request, logging in again once on 403.
    async fn call(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<String, TorrentClientError> {
        self.ensure_authenticated().await?;

        let url = format!("{}/api/v2/{}", self.base_url(), endpoint);
        let mut response = self.send(method.clone(), &url, params).await?;

        if response.status() == StatusCode::FORBIDDEN {
            warn!("qBittorrent session expired, re-authenticating");
            *self.session.write().await = false;
            self.login().await?;
            response = self.send(method, &url, params).await?;
        }

        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(TorrentClientError::Http {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }
        Ok(body)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<reqwest::Response, TorrentClientError> {
        let builder = if method == Method::GET {
            self.client.get(url).query(params)
        } else {
            self.client.request(method, url).form(params)
        };
        builder.send().await.map_err(map_reqwest_error)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, TorrentClientError> {
        let body = self.call(Method::GET, endpoint, params).await?;
        serde_json::from_str(&body).map_err(|e| TorrentClientError::Decode(e.to_string()))
    }

    async fn post(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<(), TorrentClientError> {
        self.call(Method::POST, endpoint, params).await.map(|_| ())
    }

    /// v5 renamed pause/resume to stop/start; fall back when the old name is gone.
    async fn post_renamed(
        &self,
        endpoint: &str,
        fallback: &str,
        params: &[(&str, &str)],
    ) -> Result<(), TorrentClientError> {
        match self.post(endpoint, params).await {
            Err(TorrentClientError::Http { status: 404, .. }) => {
                debug!(endpoint, fallback, "Endpoint missing, using v5 name");
                self.post(fallback, params).await
            }
            other => other,
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TorrentClientError {
    if e.is_timeout() {
        TorrentClientError::Timeout
    } else if e.is_connect() {
        TorrentClientError::ConnectionFailed(e.to_string())
    } else if e.is_decode() {
        TorrentClientError::Decode(e.to_string())
    } else {
        TorrentClientError::Transport(e.to_string())
    }
}

fn join_hashes(hashes: &[String]) -> String {
    hashes
        .iter()
        .map(|h| h.to_lowercase())
        .collect::<Vec<_>>()
        .join("|")
}

/// qBittorrent torrent info response.
#[derive(Debug, Deserialize)]
struct QBTorrentInfo {
    hash: String,
    name: String,
    state: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    tags: String,
    progress: f64,
    #[serde(default)]
    eta: i64,
    #[serde(default)]
    availability: f64,
    #[serde(default)]
    added_on: i64,
    #[serde(default)]
    completion_on: i64,
    #[serde(default)]
    last_activity: i64,
    #[serde(default)]
    amount_left: i64,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    seeding_time: i64,
    #[serde(default)]
    ratio: f64,
    #[serde(default)]
    ratio_limit: f64,
    #[serde(default)]
    seeding_time_limit: i64,
    #[serde(default)]
    up_limit: i64,
    #[serde(default)]
    dl_limit: i64,
    #[serde(default)]
    super_seeding: bool,
    #[serde(default)]
    content_path: String,
}

impl QBTorrentInfo {
    fn into_torrent_info(self) -> TorrentInfo {
        TorrentInfo {
            hash: self.hash.to_lowercase(),
            name: self.name,
            state: TorrentState::from_api(&self.state),
            category: self.category,
            tags: parse_tags(&self.tags),
            progress: self.progress,
            eta: self.eta,
            availability: self.availability,
            added_on: self.added_on,
            completion_on: self.completion_on,
            last_activity: self.last_activity,
            amount_left: self.amount_left,
            size: self.size,
            seeding_time: self.seeding_time,
            ratio: self.ratio,
            ratio_limit: self.ratio_limit,
            seeding_time_limit: self.seeding_time_limit,
            up_limit: self.up_limit,
            dl_limit: self.dl_limit,
            super_seeding: self.super_seeding,
            content_path: if self.content_path.is_empty() {
                None
            } else {
                Some(self.content_path)
            },
        }
    }
}

fn parse_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Debug, Deserialize)]
struct QBFile {
    #[serde(default)]
    index: Option<i64>,
    name: String,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    progress: f64,
    #[serde(default)]
    priority: i32,
}

#[derive(Debug, Deserialize)]
struct QBTracker {
    url: String,
    #[serde(default)]
    status: i32,
    #[serde(default)]
    msg: String,
}

#[async_trait]
impl TorrentClient for QBittorrentClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    async fn api_version(&self) -> Result<String, TorrentClientError> {
        let body = self.call(Method::GET, "app/version", &[]).await?;
        Ok(body.trim().to_string())
    }

    async fn list_torrents(
        &self,
        filters: &TorrentFilters,
    ) -> Result<Vec<TorrentInfo>, TorrentClientError> {
        let hashes = join_hashes(&filters.hashes);
        let mut params = vec![("sort", "added_on")];
        if let Some(category) = &filters.category {
            params.push(("category", category.as_str()));
        }
        if !hashes.is_empty() {
            params.push(("hashes", hashes.as_str()));
        }

        let torrents: Vec<QBTorrentInfo> = self.get_json("torrents/info", &params).await?;
        Ok(torrents.into_iter().map(|t| t.into_torrent_info()).collect())
    }

    async fn torrent_files(&self, hash: &str) -> Result<Vec<TorrentFile>, TorrentClientError> {
        let hash = hash.to_lowercase();
        let files: Vec<QBFile> = self.get_json("torrents/files", &[("hash", &hash)]).await?;
        Ok(files
            .into_iter()
            .enumerate()
            .map(|(i, f)| TorrentFile {
                id: f.index.unwrap_or(i as i64),
                name: f.name,
                size: f.size,
                progress: f.progress,
                priority: f.priority,
            })
            .collect())
    }

    async fn torrent_trackers(&self, hash: &str) -> Result<Vec<TrackerEntry>, TorrentClientError> {
        let hash = hash.to_lowercase();
        let trackers: Vec<QBTracker> =
            self.get_json("torrents/trackers", &[("hash", &hash)]).await?;
        Ok(trackers
            .into_iter()
            .map(|t| TrackerEntry {
                url: t.url,
                status: t.status,
                msg: t.msg,
            })
            .collect())
    }

    async fn pause(&self, hashes: &[String]) -> Result<(), TorrentClientError> {
        let hashes = join_hashes(hashes);
        self.post_renamed("torrents/pause", "torrents/stop", &[("hashes", &hashes)])
            .await
    }

    async fn resume(&self, hashes: &[String]) -> Result<(), TorrentClientError> {
        let hashes = join_hashes(hashes);
        self.post_renamed("torrents/resume", "torrents/start", &[("hashes", &hashes)])
            .await
    }

    async fn recheck(&self, hashes: &[String]) -> Result<(), TorrentClientError> {
        let hashes = join_hashes(hashes);
        self.post("torrents/recheck", &[("hashes", &hashes)]).await
    }

    async fn delete(&self, hashes: &[String], delete_files: bool) -> Result<(), TorrentClientError> {
        let hashes = join_hashes(hashes);
        let delete_files = if delete_files { "true" } else { "false" };
        self.post(
            "torrents/delete",
            &[("hashes", &hashes), ("deleteFiles", delete_files)],
        )
        .await
    }

    async fn set_file_priority(
        &self,
        hash: &str,
        file_ids: &[i64],
        priority: i32,
    ) -> Result<(), TorrentClientError> {
        let hash = hash.to_lowercase();
        let ids = file_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join("|");
        let priority = priority.to_string();
        self.post(
            "torrents/filePrio",
            &[("hash", &hash), ("id", &ids), ("priority", &priority)],
        )
        .await
    }

    async fn add_trackers(&self, hash: &str, urls: &[String]) -> Result<(), TorrentClientError> {
        let hash = hash.to_lowercase();
        let urls = urls.join("\n");
        self.post("torrents/addTrackers", &[("hash", &hash), ("urls", &urls)])
            .await
    }

    async fn remove_trackers(&self, hash: &str, urls: &[String]) -> Result<(), TorrentClientError> {
        let hash = hash.to_lowercase();
        let urls = urls.join("|");
        self.post("torrents/removeTrackers", &[("hash", &hash), ("urls", &urls)])
            .await
    }

    async fn set_share_limits(
        &self,
        hash: &str,
        limits: ShareLimits,
    ) -> Result<(), TorrentClientError> {
        let hash = hash.to_lowercase();
        let ratio = limits.ratio_limit.to_string();
        let time = limits.seeding_time_limit.to_string();
        self.post(
            "torrents/setShareLimits",
            &[
                ("hashes", &hash),
                ("ratioLimit", &ratio),
                ("seedingTimeLimit", &time),
                ("inactiveSeedingTimeLimit", "-2"),
            ],
        )
        .await
    }

    async fn set_download_limit(&self, hash: &str, limit: i64) -> Result<(), TorrentClientError> {
        let hash = hash.to_lowercase();
        let limit = limit.to_string();
        self.post(
            "torrents/setDownloadLimit",
            &[("hashes", &hash), ("limit", &limit)],
        )
        .await
    }

    async fn set_upload_limit(&self, hash: &str, limit: i64) -> Result<(), TorrentClientError> {
        let hash = hash.to_lowercase();
        let limit = limit.to_string();
        self.post(
            "torrents/setUploadLimit",
            &[("hashes", &hash), ("limit", &limit)],
        )
        .await
    }

    async fn set_super_seeding(&self, hash: &str, enabled: bool) -> Result<(), TorrentClientError> {
        let hash = hash.to_lowercase();
        let value = if enabled { "true" } else { "false" };
        self.post(
            "torrents/setSuperSeeding",
            &[("hashes", &hash), ("value", value)],
        )
        .await
    }

    async fn add_tags(&self, hash: &str, tags: &[String]) -> Result<(), TorrentClientError> {
        let hash = hash.to_lowercase();
        let tags = tags.join(",");
        self.post("torrents/addTags", &[("hashes", &hash), ("tags", &tags)])
            .await
    }

    async fn remove_tags(&self, hash: &str, tags: &[String]) -> Result<(), TorrentClientError> {
        let hash = hash.to_lowercase();
        let tags = tags.join(",");
        self.post("torrents/removeTags", &[("hashes", &hash), ("tags", &tags)])
            .await
    }

    async fn set_category(&self, hashes: &[String], category: &str) -> Result<(), TorrentClientError> {
        let hashes = join_hashes(hashes);
        self.post(
            "torrents/setCategory",
            &[("hashes", &hashes), ("category", category)],
        )
        .await
    }
}
