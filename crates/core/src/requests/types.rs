use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::config::ArrKind;
use crate::retry::Transient;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RequestError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, RequestError::Connection(_) | RequestError::Timeout)
    }
}

impl Transient for RequestError {
    fn is_transient(&self) -> bool {
        matches!(self, RequestError::Transport(_) | RequestError::Decode(_))
    }
}

pub(crate) fn map_reqwest_error(e: reqwest::Error) -> RequestError {
    if e.is_timeout() {
        RequestError::Timeout
    } else if e.is_connect() {
        RequestError::Connection(e.to_string())
    } else if e.is_decode() {
        RequestError::Decode(e.to_string())
    } else {
        RequestError::Transport(e.to_string())
    }
}

/// Which aggregator a request came from. Used to tag log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestSourceKind {
    Overseerr,
    Ombi,
}

impl RequestSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestSourceKind::Overseerr => "overseerr",
            RequestSourceKind::Ombi => "ombi",
        }
    }

    /// Log prefix for searches triggered by this source.
    pub fn log_tag(&self) -> &'static str {
        match self {
            RequestSourceKind::Overseerr => "[OVERSEERR REQUEST]",
            RequestSourceKind::Ombi => "[OMBI REQUEST]",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    pub fn for_arr(kind: ArrKind) -> Self {
        match kind {
            ArrKind::Sonarr => MediaType::Tv,
            ArrKind::Radarr => MediaType::Movie,
        }
    }
}

/// One request that already passed the source's approval and 4K filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingRequest {
    pub media_type: MediaType,
    pub imdb_id: Option<String>,
    pub tmdb_id: Option<i64>,
    pub tvdb_id: Option<i64>,
}

impl PendingRequest {
    /// Id under which the source serves the media's details.
    pub fn lookup_id(&self) -> Option<i64> {
        match self.media_type {
            MediaType::Movie => self.tmdb_id,
            MediaType::Tv => self.tvdb_id,
        }
    }
}

/// External ids of requested content, matched against the content manager's catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestIds {
    pub imdb: BTreeSet<String>,
    pub tmdb: BTreeSet<i64>,
    pub tvdb: BTreeSet<i64>,
}

impl RequestIds {
    pub fn is_empty(&self) -> bool {
        self.imdb.is_empty() && self.tmdb.is_empty() && self.tvdb.is_empty()
    }

    pub fn len(&self) -> usize {
        self.imdb.len() + self.tmdb.len() + self.tvdb.len()
    }

    /// Record the ids of `request` that the given instance kind can match on.
    pub fn collect(&mut self, kind: ArrKind, request: &PendingRequest) {
        if let Some(imdb) = request.imdb_id.as_ref().filter(|id| !id.is_empty()) {
            self.imdb.insert(imdb.clone());
        }
        match kind {
            ArrKind::Sonarr => {
                if let Some(tvdb) = request.tvdb_id.filter(|id| *id > 0) {
                    self.tvdb.insert(tvdb);
                }
            }
            ArrKind::Radarr => {
                if let Some(tmdb) = request.tmdb_id.filter(|id| *id > 0) {
                    self.tmdb.insert(tmdb);
                }
            }
        }
    }
}

/// A request-aggregator service.
#[async_trait]
pub trait RequestSource: Send + Sync {
    fn kind(&self) -> RequestSourceKind;

    /// Requests for the given instance kind, filtered by the source's approval rules.
    async fn pending_requests(&self, arr: ArrKind) -> Result<Vec<PendingRequest>, RequestError>;

    /// Release (movies) or first-air (tv) date. `None` when the source has no dates.
    async fn release_date(
        &self,
        _request: &PendingRequest,
    ) -> Result<Option<NaiveDate>, RequestError> {
        Ok(None)
    }
}
