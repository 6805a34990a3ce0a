//! Ombi API v1 client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::types::map_reqwest_error;
use super::{MediaType, PendingRequest, RequestError, RequestSource, RequestSourceKind};
use crate::config::{ArrKind, OmbiConfig};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MovieRequest {
    #[serde(default)]
    denied: Option<bool>,
    #[serde(default)]
    imdb_id: Option<String>,
    #[serde(default)]
    the_movie_db_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChildRequest {
    #[serde(default)]
    denied: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TvRequest {
    #[serde(default)]
    imdb_id: Option<String>,
    #[serde(default)]
    tv_db_id: Option<i64>,
    #[serde(default)]
    child_requests: Vec<ChildRequest>,
}

/// Client for one Ombi server. Ombi exposes no release dates, so every
/// request it returns is treated as released.
pub struct OmbiClient {
    client: Client,
    base_url: String,
    api_key: String,
    approved_only: bool,
}

impl OmbiClient {
    pub fn new(config: &OmbiConfig, timeout: Duration) -> Result<Self, RequestError> {
        let uri = config
            .uri
            .as_deref()
            .ok_or_else(|| RequestError::Internal("Ombi uri is required".to_string()))?;
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| RequestError::Internal("Ombi api_key is required".to_string()))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RequestError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: uri.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            approved_only: config.approved_only,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RequestError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header("ApiKey", &self.api_key)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RequestError::Http {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| RequestError::Decode(e.to_string()))
    }
}

fn filter_movies(requests: Vec<MovieRequest>, approved_only: bool) -> Vec<PendingRequest> {
    requests
        .into_iter()
        .filter(|r| !(approved_only && r.denied == Some(true)))
        .map(|r| PendingRequest {
            media_type: MediaType::Movie,
            imdb_id: r.imdb_id,
            tmdb_id: r.the_movie_db_id,
            tvdb_id: None,
        })
        .collect()
}

/// With `approved_only`, a show with any denied season request is skipped entirely.
fn filter_shows(requests: Vec<TvRequest>, approved_only: bool) -> Vec<PendingRequest> {
    requests
        .into_iter()
        .filter(|r| {
            !(approved_only && r.child_requests.iter().any(|c| c.denied == Some(true)))
        })
        .map(|r| PendingRequest {
            media_type: MediaType::Tv,
            imdb_id: r.imdb_id,
            tmdb_id: None,
            tvdb_id: r.tv_db_id,
        })
        .collect()
}

#[async_trait]
impl RequestSource for OmbiClient {
    fn kind(&self) -> RequestSourceKind {
        RequestSourceKind::Ombi
    }

    async fn pending_requests(&self, arr: ArrKind) -> Result<Vec<PendingRequest>, RequestError> {
        let (total_path, list_path) = match arr {
            ArrKind::Sonarr => ("/api/v1/Request/tv/total", "/api/v1/Request/tvlite"),
            ArrKind::Radarr => ("/api/v1/Request/movie/total", "/api/v1/Request/movie"),
        };

        let total: i64 = self.get_json(total_path).await?;
        debug!(total, "Fetched Ombi request count");
        if total == 0 {
            return Ok(Vec::new());
        }

        let requests = match arr {
            ArrKind::Sonarr => filter_shows(self.get_json(list_path).await?, self.approved_only),
            ArrKind::Radarr => filter_movies(self.get_json(list_path).await?, self.approved_only),
        };
        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denied_movies_skipped_when_approved_only() {
        let body = r#"[
            {"denied": true, "imdbId": "tt1", "theMovieDbId": 1},
            {"denied": false, "imdbId": "tt2", "theMovieDbId": 2},
            {"imdbId": "tt3"}
        ]"#;
        let parsed: Vec<MovieRequest> = serde_json::from_str(body).unwrap();
        let found = filter_movies(parsed, true);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].tmdb_id, Some(2));

        let parsed: Vec<MovieRequest> = serde_json::from_str(body).unwrap();
        assert_eq!(filter_movies(parsed, false).len(), 3);
    }

    #[test]
    fn test_partially_denied_show_skipped() {
        let body = r#"[
            {"imdbId": "tt10", "tvDbId": 10, "childRequests": [{"denied": false}, {"denied": true}]},
            {"imdbId": "tt11", "tvDbId": 11, "childRequests": [{"denied": false}]}
        ]"#;
        let parsed: Vec<TvRequest> = serde_json::from_str(body).unwrap();
        let found = filter_shows(parsed, true);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tvdb_id, Some(11));
    }
}
