//! Overseerr API v1 client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::types::map_reqwest_error;
use super::{MediaType, PendingRequest, RequestError, RequestSource, RequestSourceKind};
use crate::config::{ArrKind, OverseerrConfig};

/// Media status reported by Overseerr once a request is approved.
const STATUS_PROCESSING: i64 = 3;
/// Media status for content that is already available.
const STATUS_AVAILABLE: i64 = 5;

#[derive(Debug, Deserialize)]
struct RequestPage {
    #[serde(default)]
    results: Vec<RequestItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestItem {
    #[serde(rename = "type", default)]
    media_type: Option<String>,
    #[serde(rename = "is4k", default)]
    is_4k: bool,
    #[serde(default)]
    media: Option<RequestMedia>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestMedia {
    #[serde(default)]
    tmdb_id: Option<i64>,
    #[serde(default)]
    tvdb_id: Option<i64>,
    #[serde(default)]
    imdb_id: Option<String>,
    #[serde(default)]
    status: Option<i64>,
    #[serde(rename = "status4k", default)]
    status_4k: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaDetails {
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    first_air_date: Option<String>,
}

/// Client for one Overseerr server.
pub struct OverseerrClient {
    client: Client,
    base_url: String,
    api_key: String,
    approved_only: bool,
    is_4k: bool,
}

impl OverseerrClient {
    pub fn new(config: &OverseerrConfig, timeout: Duration) -> Result<Self, RequestError> {
        let uri = config
            .uri
            .as_deref()
            .ok_or_else(|| RequestError::Internal("Overseerr uri is required".to_string()))?;
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| RequestError::Internal("Overseerr api_key is required".to_string()))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RequestError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: uri.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            approved_only: config.approved_only,
            is_4k: config.is_4k,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, RequestError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .query(query)
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

    fn filter(&self, items: Vec<RequestItem>, arr: ArrKind) -> Vec<PendingRequest> {
        filter_requests(items, arr, self.approved_only, self.is_4k)
    }
}

/// Keep requests of the instance's media type whose (4K or regular) status
/// passes the approval rule.
fn filter_requests(
    items: Vec<RequestItem>,
    arr: ArrKind,
    approved_only: bool,
    is_4k: bool,
) -> Vec<PendingRequest> {
    let wanted = match arr {
        ArrKind::Sonarr => "tv",
        ArrKind::Radarr => "movie",
    };

    items
        .into_iter()
        .filter(|item| item.media_type.as_deref() == Some(wanted))
        .filter(|item| item.is_4k == is_4k)
        .filter_map(|item| item.media)
        .filter(|media| {
            let status = if is_4k { media.status_4k } else { media.status };
            if approved_only {
                status == Some(STATUS_PROCESSING)
            } else {
                status != Some(STATUS_AVAILABLE)
            }
        })
        .map(|media| PendingRequest {
            media_type: MediaType::for_arr(arr),
            imdb_id: media.imdb_id,
            tmdb_id: media.tmdb_id,
            tvdb_id: media.tvdb_id,
        })
        .collect()
}

#[async_trait]
impl RequestSource for OverseerrClient {
    fn kind(&self) -> RequestSourceKind {
        RequestSourceKind::Overseerr
    }

    async fn pending_requests(&self, arr: ArrKind) -> Result<Vec<PendingRequest>, RequestError> {
        let filter = if self.approved_only {
            "approved"
        } else {
            "unavailable"
        };
        let query = [
            ("take", "100".to_string()),
            ("skip", "0".to_string()),
            ("sort", "added".to_string()),
            ("filter", filter.to_string()),
        ];
        let page: RequestPage = self.get_json("/api/v1/request", &query).await?;
        debug!(count = page.results.len(), filter, "Fetched Overseerr requests");
        Ok(self.filter(page.results, arr))
    }

    async fn release_date(
        &self,
        request: &PendingRequest,
    ) -> Result<Option<NaiveDate>, RequestError> {
        let Some(id) = request.lookup_id() else {
            return Ok(None);
        };
        let path = match request.media_type {
            MediaType::Movie => format!("/api/v1/movies/{}", id),
            MediaType::Tv => format!("/api/v1/tv/{}", id),
        };
        let details: MediaDetails = self.get_json(&path, &[]).await?;
        let date = match request.media_type {
            MediaType::Movie => details.release_date,
            MediaType::Tv => details.first_air_date,
        };
        Ok(date.and_then(|d| {
            let day = d.get(..10).unwrap_or(d.as_str());
            NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<RequestItem> {
        let body = r#"{"results": [
            {"type": "movie", "is4k": false, "media": {"tmdbId": 1, "imdbId": "tt1", "status": 3}},
            {"type": "movie", "is4k": false, "media": {"tmdbId": 2, "status": 5}},
            {"type": "movie", "is4k": true,  "media": {"tmdbId": 3, "status": 1, "status4k": 3}},
            {"type": "movie", "is4k": false, "media": {"tmdbId": 4, "status": 2}},
            {"type": "tv",    "is4k": false, "media": {"tmdbId": 5, "tvdbId": 50, "status": 3}},
            {"type": "movie", "is4k": false}
        ]}"#;
        let page: RequestPage = serde_json::from_str(body).unwrap();
        page.results
    }

    fn tmdb_ids(requests: &[PendingRequest]) -> Vec<i64> {
        requests.iter().filter_map(|r| r.tmdb_id).collect()
    }

    #[test]
    fn test_approved_only_requires_processing_status() {
        let found = filter_requests(items(), ArrKind::Radarr, true, false);
        assert_eq!(tmdb_ids(&found), vec![1]);
        assert_eq!(found[0].imdb_id.as_deref(), Some("tt1"));
    }

    #[test]
    fn test_unapproved_skips_available() {
        let found = filter_requests(items(), ArrKind::Radarr, false, false);
        assert_eq!(tmdb_ids(&found), vec![1, 4]);
    }

    #[test]
    fn test_4k_uses_4k_status() {
        let found = filter_requests(items(), ArrKind::Radarr, true, true);
        assert_eq!(tmdb_ids(&found), vec![3]);
    }

    #[test]
    fn test_filters_by_media_type() {
        let found = filter_requests(items(), ArrKind::Sonarr, true, false);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tvdb_id, Some(50));
        assert_eq!(found[0].media_type, MediaType::Tv);
    }

    #[test]
    fn test_new_requires_uri_and_key() {
        let config = OverseerrConfig {
            enabled: true,
            uri: None,
            api_key: Some("k".into()),
            ..Default::default()
        };
        assert!(OverseerrClient::new(&config, Duration::from_secs(2)).is_err());
    }
}
