//! Sonarr/Radarr API v3 client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::QueuePage;
use super::{
    ArrClient, ArrCommand, ArrError, EpisodeMetadata, MovieMetadata, QueueRecord, SeriesMetadata,
    SystemStatus,
};

/// `X-Api-Key` authenticated HTTP client for one content manager.
pub struct HttpArrClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpArrClient {
    pub fn new(uri: &str, api_key: &str, timeout: Duration) -> Result<Self, ArrError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ArrError::Internal(e.to_string()))?;
        Ok(Self {
            client,
            base_url: uri.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v3/{}", self.base_url, path)
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<String, ArrError> {
        let mut builder = self
            .client
            .request(method, self.url(path))
            .header("X-Api-Key", &self.api_key)
            .query(query);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let text = response.text().await.map_err(map_reqwest_error)?;

        if status == StatusCode::NOT_FOUND {
            return Err(ArrError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            return Err(ArrError::Http {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }
        Ok(text)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ArrError> {
        let text = self.request(Method::GET, path, query, None).await?;
        serde_json::from_str(&text).map_err(|e| ArrError::Decode(e.to_string()))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ArrError {
    if e.is_timeout() {
        ArrError::Timeout
    } else if e.is_connect() {
        ArrError::Connection(e.to_string())
    } else if e.is_decode() {
        ArrError::Decode(e.to_string())
    } else {
        ArrError::Transport(e.to_string())
    }
}

#[async_trait]
impl ArrClient for HttpArrClient {
    async fn system_status(&self) -> Result<SystemStatus, ArrError> {
        self.get_json("system/status", &[]).await
    }

    async fn get_queue(&self, page: u32, page_size: u32) -> Result<Vec<QueueRecord>, ArrError> {
        let query = [
            ("page", page.to_string()),
            ("pageSize", page_size.to_string()),
            ("sortKey", "timeLeft".to_string()),
            ("sortDirection", "ascending".to_string()),
            ("includeUnknownSeriesItems", "true".to_string()),
            ("includeUnknownMovieItems", "true".to_string()),
        ];
        let page: QueuePage = self.get_json("queue", &query).await?;
        Ok(page.records)
    }

    async fn delete_queue(
        &self,
        id: i64,
        remove_from_client: bool,
        blocklist: bool,
    ) -> Result<(), ArrError> {
        let query = [
            ("removeFromClient", remove_from_client.to_string()),
            ("blocklist", blocklist.to_string()),
        ];
        self.request(Method::DELETE, &format!("queue/{}", id), &query, None)
            .await
            .map(|_| ())
    }

    async fn post_command(&self, command: &ArrCommand) -> Result<(), ArrError> {
        debug!(command = command.name(), "Posting command");
        let body = command.to_body();
        self.request(Method::POST, "command", &[], Some(&body))
            .await
            .map(|_| ())
    }

    async fn get_episode(&self, id: i64) -> Result<EpisodeMetadata, ArrError> {
        self.get_json(&format!("episode/{}", id), &[]).await
    }

    async fn get_movie(&self, id: i64) -> Result<MovieMetadata, ArrError> {
        self.get_json(&format!("movie/{}", id), &[]).await
    }

    async fn get_series(&self, id: i64) -> Result<SeriesMetadata, ArrError> {
        self.get_json(&format!("series/{}", id), &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let client =
            HttpArrClient::new("http://sonarr:8989/", "key", Duration::from_secs(5)).unwrap();
        assert_eq!(client.url("queue"), "http://sonarr:8989/api/v3/queue");
    }

    #[test]
    fn test_queue_page_without_records() {
        let page: QueuePage = serde_json::from_str(r#"{"page": 1, "totalRecords": 0}"#).unwrap();
        assert!(page.records.is_empty());
    }
}
