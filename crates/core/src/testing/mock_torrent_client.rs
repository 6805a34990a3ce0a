//! Mock download client for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::torrent_client::{
    ShareLimits, TorrentClient, TorrentClientError, TorrentFile, TorrentFilters, TorrentInfo,
    TorrentState, TrackerEntry,
};

/// One recorded mutating call.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCall {
    Pause { hashes: Vec<String> },
    Resume { hashes: Vec<String> },
    Recheck { hashes: Vec<String> },
    Delete { hashes: Vec<String>, delete_files: bool },
    SetFilePriority { hash: String, file_ids: Vec<i64>, priority: i32 },
    AddTrackers { hash: String, urls: Vec<String> },
    RemoveTrackers { hash: String, urls: Vec<String> },
    SetShareLimits { hash: String, limits: ShareLimits },
    SetDownloadLimit { hash: String, limit: i64 },
    SetUploadLimit { hash: String, limit: i64 },
    SetSuperSeeding { hash: String, enabled: bool },
    AddTags { hash: String, tags: Vec<String> },
    RemoveTags { hash: String, tags: Vec<String> },
    SetCategory { hashes: Vec<String>, category: String },
}

/// In-memory [`TorrentClient`].
///
/// Reads come from the seeded torrents, file lists and tracker lists. Every
/// mutating call is recorded and applied to the seeded torrents where that
/// makes sense (deletes remove, pauses pause, tags and categories change).
#[derive(Debug)]
pub struct MockTorrentClient {
    torrents: Arc<RwLock<Vec<TorrentInfo>>>,
    files: Arc<RwLock<HashMap<String, Vec<TorrentFile>>>>,
    trackers: Arc<RwLock<HashMap<String, Vec<TrackerEntry>>>>,
    calls: Arc<RwLock<Vec<ClientCall>>>,
    next_error: Arc<RwLock<Option<TorrentClientError>>>,
    version: String,
}

impl Default for MockTorrentClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTorrentClient {
    pub fn new() -> Self {
        Self {
            torrents: Arc::new(RwLock::new(Vec::new())),
            files: Arc::new(RwLock::new(HashMap::new())),
            trackers: Arc::new(RwLock::new(HashMap::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            version: "v4.6.7".to_string(),
        }
    }

    /// Add or replace a torrent by hash.
    pub async fn add_torrent(&self, torrent: TorrentInfo) {
        let mut torrents = self.torrents.write().await;
        torrents.retain(|t| t.hash != torrent.hash);
        torrents.push(torrent);
    }

    /// Drop a torrent without recording a call, as if removed by hand.
    pub async fn remove_torrent(&self, hash: &str) {
        self.torrents.write().await.retain(|t| t.hash != hash);
    }

    pub async fn torrent(&self, hash: &str) -> Option<TorrentInfo> {
        self.torrents
            .read()
            .await
            .iter()
            .find(|t| t.hash == hash)
            .cloned()
    }

    pub async fn set_files(&self, hash: &str, files: Vec<TorrentFile>) {
        self.files.write().await.insert(hash.to_string(), files);
    }

    pub async fn set_trackers(&self, hash: &str, trackers: Vec<TrackerEntry>) {
        self.trackers.write().await.insert(hash.to_string(), trackers);
    }

    /// Make the next call (of any kind) fail with `error`.
    pub async fn set_next_error(&self, error: TorrentClientError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn calls(&self) -> Vec<ClientCall> {
        self.calls.read().await.clone()
    }

    pub async fn clear_calls(&self) {
        self.calls.write().await.clear();
    }

    /// Number of mutating calls since the last clear.
    pub async fn mutation_count(&self) -> usize {
        self.calls.read().await.len()
    }

    async fn check_error(&self) -> Result<(), TorrentClientError> {
        match self.next_error.write().await.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn record(&self, call: ClientCall) -> Result<(), TorrentClientError> {
        self.check_error().await?;
        self.calls.write().await.push(call);
        Ok(())
    }

    async fn update<F: Fn(&mut TorrentInfo)>(&self, hashes: &[String], f: F) {
        let mut torrents = self.torrents.write().await;
        for torrent in torrents.iter_mut() {
            if hashes.iter().any(|h| h.eq_ignore_ascii_case(&torrent.hash)) {
                f(torrent);
            }
        }
    }
}

#[async_trait]
impl TorrentClient for MockTorrentClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn api_version(&self) -> Result<String, TorrentClientError> {
        self.check_error().await?;
        Ok(self.version.clone())
    }

    async fn list_torrents(
        &self,
        filters: &TorrentFilters,
    ) -> Result<Vec<TorrentInfo>, TorrentClientError> {
        self.check_error().await?;
        let mut torrents: Vec<TorrentInfo> = self
            .torrents
            .read()
            .await
            .iter()
            .filter(|t| filters.category.as_deref().is_none_or(|c| t.category == c))
            .filter(|t| filters.hashes.is_empty() || filters.hashes.contains(&t.hash))
            .cloned()
            .collect();
        torrents.sort_by_key(|t| t.added_on);
        Ok(torrents)
    }

    async fn torrent_files(&self, hash: &str) -> Result<Vec<TorrentFile>, TorrentClientError> {
        self.check_error().await?;
        Ok(self.files.read().await.get(hash).cloned().unwrap_or_default())
    }

    async fn torrent_trackers(&self, hash: &str) -> Result<Vec<TrackerEntry>, TorrentClientError> {
        self.check_error().await?;
        Ok(self.trackers.read().await.get(hash).cloned().unwrap_or_default())
    }

    async fn pause(&self, hashes: &[String]) -> Result<(), TorrentClientError> {
        self.record(ClientCall::Pause {
            hashes: hashes.to_vec(),
        })
        .await?;
        self.update(hashes, |t| {
            t.state = if t.state.is_complete() {
                TorrentState::PausedUpload
            } else {
                TorrentState::PausedDownload
            }
        })
        .await;
        Ok(())
    }

    async fn resume(&self, hashes: &[String]) -> Result<(), TorrentClientError> {
        self.record(ClientCall::Resume {
            hashes: hashes.to_vec(),
        })
        .await?;
        self.update(hashes, |t| {
            t.state = match t.state {
                TorrentState::PausedUpload => TorrentState::StalledUpload,
                TorrentState::PausedDownload => TorrentState::Downloading,
                other => other,
            }
        })
        .await;
        Ok(())
    }

    async fn recheck(&self, hashes: &[String]) -> Result<(), TorrentClientError> {
        self.record(ClientCall::Recheck {
            hashes: hashes.to_vec(),
        })
        .await
    }

    async fn delete(&self, hashes: &[String], delete_files: bool) -> Result<(), TorrentClientError> {
        self.record(ClientCall::Delete {
            hashes: hashes.to_vec(),
            delete_files,
        })
        .await?;
        self.torrents
            .write()
            .await
            .retain(|t| !hashes.iter().any(|h| h.eq_ignore_ascii_case(&t.hash)));
        Ok(())
    }

    async fn set_file_priority(
        &self,
        hash: &str,
        file_ids: &[i64],
        priority: i32,
    ) -> Result<(), TorrentClientError> {
        self.record(ClientCall::SetFilePriority {
            hash: hash.to_string(),
            file_ids: file_ids.to_vec(),
            priority,
        })
        .await?;
        if let Some(files) = self.files.write().await.get_mut(hash) {
            for file in files.iter_mut().filter(|f| file_ids.contains(&f.id)) {
                file.priority = priority;
            }
        }
        Ok(())
    }

    async fn add_trackers(&self, hash: &str, urls: &[String]) -> Result<(), TorrentClientError> {
        self.record(ClientCall::AddTrackers {
            hash: hash.to_string(),
            urls: urls.to_vec(),
        })
        .await
    }

    async fn remove_trackers(&self, hash: &str, urls: &[String]) -> Result<(), TorrentClientError> {
        self.record(ClientCall::RemoveTrackers {
            hash: hash.to_string(),
            urls: urls.to_vec(),
        })
        .await
    }

    async fn set_share_limits(
        &self,
        hash: &str,
        limits: ShareLimits,
    ) -> Result<(), TorrentClientError> {
        self.record(ClientCall::SetShareLimits {
            hash: hash.to_string(),
            limits,
        })
        .await?;
        self.update(&[hash.to_string()], |t| {
            t.ratio_limit = limits.ratio_limit;
            t.seeding_time_limit = limits.seeding_time_limit;
        })
        .await;
        Ok(())
    }

    async fn set_download_limit(&self, hash: &str, limit: i64) -> Result<(), TorrentClientError> {
        self.record(ClientCall::SetDownloadLimit {
            hash: hash.to_string(),
            limit,
        })
        .await
    }

    async fn set_upload_limit(&self, hash: &str, limit: i64) -> Result<(), TorrentClientError> {
        self.record(ClientCall::SetUploadLimit {
            hash: hash.to_string(),
            limit,
        })
        .await
    }

    async fn set_super_seeding(&self, hash: &str, enabled: bool) -> Result<(), TorrentClientError> {
        self.record(ClientCall::SetSuperSeeding {
            hash: hash.to_string(),
            enabled,
        })
        .await
    }

    async fn add_tags(&self, hash: &str, tags: &[String]) -> Result<(), TorrentClientError> {
        self.record(ClientCall::AddTags {
            hash: hash.to_string(),
            tags: tags.to_vec(),
        })
        .await?;
        self.update(&[hash.to_string()], |t| {
            for tag in tags {
                if !t.has_tag(tag) {
                    t.tags.push(tag.clone());
                }
            }
        })
        .await;
        Ok(())
    }

    async fn remove_tags(&self, hash: &str, tags: &[String]) -> Result<(), TorrentClientError> {
        self.record(ClientCall::RemoveTags {
            hash: hash.to_string(),
            tags: tags.to_vec(),
        })
        .await?;
        self.update(&[hash.to_string()], |t| t.tags.retain(|x| !tags.contains(x)))
            .await;
        Ok(())
    }

    async fn set_category(&self, hashes: &[String], category: &str) -> Result<(), TorrentClientError> {
        self.record(ClientCall::SetCategory {
            hashes: hashes.to_vec(),
            category: category.to_string(),
        })
        .await?;
        self.update(hashes, |t| t.category = category.to_string()).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_list_filters_by_category_and_sorts() {
        let client = MockTorrentClient::new();
        let mut late = fixtures::torrent("b", TorrentState::Downloading);
        late.added_on = 20;
        let mut early = fixtures::torrent("a", TorrentState::Downloading);
        early.added_on = 10;
        let mut other = fixtures::torrent("c", TorrentState::Downloading);
        other.category = "other".into();
        client.add_torrent(late).await;
        client.add_torrent(early).await;
        client.add_torrent(other).await;

        let listed = client
            .list_torrents(&TorrentFilters::category("sonarr"))
            .await
            .unwrap();
        let hashes: Vec<&str> = listed.iter().map(|t| t.hash.as_str()).collect();
        assert_eq!(hashes, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_delete_removes_and_records() {
        let client = MockTorrentClient::new();
        client
            .add_torrent(fixtures::torrent("a", TorrentState::Uploading))
            .await;
        client.delete(&["A".to_string()], true).await.unwrap();
        assert!(client.torrent("a").await.is_none());
        assert_eq!(client.mutation_count().await, 1);
    }

    #[tokio::test]
    async fn test_next_error_is_consumed() {
        let client = MockTorrentClient::new();
        client.set_next_error(TorrentClientError::Timeout).await;
        assert!(client.api_version().await.is_err());
        assert!(client.api_version().await.is_ok());
    }
}
