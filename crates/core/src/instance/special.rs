//! The loop for the reserved `failed` and `recheck` categories.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{Cycle, LoopServices};
use crate::config::Settings;
use crate::delay::LoopError;
use crate::executor::FailureHandler;
use crate::expiring_set::ExpiringSet;
use crate::metrics;
use crate::queue::{self, QueueIndex};
use crate::retry::RetryPolicy;
use crate::shared_cache::SharedTorrentCache;
use crate::torrent_client::{TorrentClient, TorrentFilters, TorrentInfo};

const INSTANCE: &str = "special";

/// Blocklists and deletes torrents moved to the failed category, and
/// rechecks torrents moved to the recheck category.
pub struct SpecialCategoryLoop {
    failed_category: String,
    recheck_category: String,
    client: Arc<dyn TorrentClient>,
    shared: Arc<SharedTorrentCache>,
    handlers: Vec<FailureHandler>,
    rechecked: ExpiringSet<String>,
    retry: RetryPolicy,
}

impl SpecialCategoryLoop {
    pub fn new(settings: &Settings, services: &LoopServices, handlers: Vec<FailureHandler>) -> Self {
        Self {
            failed_category: settings.failed_category.clone(),
            recheck_category: settings.recheck_category.clone(),
            client: services.client.clone(),
            shared: services.shared.clone(),
            handlers,
            rechecked: ExpiringSet::with_secs(settings.ignore_torrents_younger_than.max(0) as u64),
            retry: RetryPolicy::default(),
        }
    }

    /// One queue snapshot per reachable instance. Unreachable instances are
    /// skipped for this cycle.
    async fn queues(&self) -> Vec<QueueIndex> {
        let mut queues = Vec::with_capacity(self.handlers.len());
        for handler in &self.handlers {
            match queue::fetch_queue(handler.arr(), &self.retry).await {
                Ok(records) => queues.push(QueueIndex::build(&records, &[])),
                Err(e) => {
                    warn!(instance = handler.instance(), error = %e, "Queue unavailable");
                    queues.push(QueueIndex::default());
                }
            }
        }
        queues
    }

    async fn handle_failed(&self, torrents: &[TorrentInfo]) -> Result<(), LoopError> {
        let queues = self.queues().await;
        for torrent in torrents {
            for (handler, queue) in self.handlers.iter().zip(&queues) {
                if let Err(e) = handler.blocklist(&torrent.hash, &torrent.name, queue).await {
                    warn!(
                        instance = handler.instance(),
                        hash = %torrent.hash,
                        error = %e,
                        "Blocklisting failed"
                    );
                }
            }
        }

        let hashes: Vec<String> = torrents.iter().map(|t| t.hash.clone()).collect();
        info!(count = hashes.len(), "Deleting torrents in the failed category");
        self.client.delete(&hashes, true).await?;
        metrics::ACTIONS
            .with_label_values(&["delete"])
            .inc_by(hashes.len() as u64);
        for hash in &hashes {
            self.shared.forget(hash);
        }
        Ok(())
    }

    async fn handle_recheck(&mut self, torrents: &[TorrentInfo]) -> Result<(), LoopError> {
        let hashes: Vec<String> = torrents
            .iter()
            .map(|t| t.hash.clone())
            .filter(|h| !self.rechecked.contains(h.as_str()))
            .collect();
        if hashes.is_empty() {
            return Ok(());
        }
        self.client.recheck(&hashes).await?;
        metrics::ACTIONS
            .with_label_values(&["recheck"])
            .inc_by(hashes.len() as u64);

        let mut restore: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for hash in &hashes {
            self.rechecked.add(hash.clone());
            match self.shared.category(hash) {
                Some(category) => restore.entry(category).or_default().push(hash.clone()),
                None => debug!(hash = %hash, "No previous category known"),
            }
        }
        for (category, hashes) in restore {
            debug!(%category, count = hashes.len(), "Restoring category after recheck");
            self.client.set_category(&hashes, &category).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Cycle for SpecialCategoryLoop {
    fn label(&self) -> &'static str {
        "special"
    }

    fn instance(&self) -> &str {
        INSTANCE
    }

    async fn cycle(&mut self) -> Result<(), LoopError> {
        let failed = self
            .client
            .list_torrents(&TorrentFilters::category(self.failed_category.clone()))
            .await?;
        if !failed.is_empty() {
            self.handle_failed(&failed).await?;
        }

        let recheck = self
            .client
            .list_torrents(&TorrentFilters::category(self.recheck_category.clone()))
            .await?;
        if !recheck.is_empty() {
            self.handle_recheck(&recheck).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArrKind;
    use crate::status::StatusBoard;
    use crate::store::LocalStateStore;
    use crate::testing::{fixtures, ClientCall, MockArrClient, MockInternetProbe, MockTorrentClient};
    use crate::torrent_client::TorrentState;

    fn services(client: Arc<MockTorrentClient>, shared: Arc<SharedTorrentCache>) -> LoopServices {
        LoopServices {
            client,
            internet: Arc::new(MockInternetProbe::new()),
            shared,
            status: StatusBoard::new(),
        }
    }

    fn handler(name: &str, arr: Arc<MockArrClient>) -> FailureHandler {
        let store = Arc::new(LocalStateStore::in_memory().unwrap());
        FailureHandler::new(name, ArrKind::Sonarr, arr, store, false)
    }

    #[tokio::test]
    async fn test_failed_torrents_blocklisted_where_queued_then_deleted() {
        let client = Arc::new(MockTorrentClient::new());
        let shared = Arc::new(SharedTorrentCache::new());
        let mut torrent = fixtures::torrent("abc", TorrentState::Downloading);
        torrent.category = "failed".into();
        client.add_torrent(torrent).await;

        let knows = Arc::new(MockArrClient::new());
        knows.set_queue(vec![fixtures::queue_record(7, "abc", 70)]).await;
        let other = Arc::new(MockArrClient::new());

        let mut special = SpecialCategoryLoop::new(
            &Settings::default(),
            &services(client.clone(), shared),
            vec![handler("tv", knows.clone()), handler("anime", other.clone())],
        );
        special.cycle().await.unwrap();

        assert_eq!(knows.deletions().await.len(), 1);
        assert!(other.deletions().await.is_empty());
        assert!(client.calls().await.contains(&ClientCall::Delete {
            hashes: vec!["abc".into()],
            delete_files: true,
        }));
    }

    #[tokio::test]
    async fn test_recheck_restores_previous_category() {
        let client = Arc::new(MockTorrentClient::new());
        let shared = Arc::new(SharedTorrentCache::new());
        shared.record_category("abc", "sonarr");
        let mut torrent = fixtures::torrent("abc", TorrentState::PausedDownload);
        torrent.category = "recheck".into();
        client.add_torrent(torrent).await;

        let mut special = SpecialCategoryLoop::new(
            &Settings::default(),
            &services(client.clone(), shared),
            Vec::new(),
        );
        special.cycle().await.unwrap();

        let calls = client.calls().await;
        assert!(calls.contains(&ClientCall::Recheck {
            hashes: vec!["abc".into()],
        }));
        assert!(calls.contains(&ClientCall::SetCategory {
            hashes: vec!["abc".into()],
            category: "sonarr".into(),
        }));
    }

    #[tokio::test]
    async fn test_unknown_category_is_rechecked_once_per_window() {
        let client = Arc::new(MockTorrentClient::new());
        let mut torrent = fixtures::torrent("abc", TorrentState::PausedDownload);
        torrent.category = "recheck".into();
        client.add_torrent(torrent).await;

        let mut special = SpecialCategoryLoop::new(
            &Settings::default(),
            &services(client.clone(), Arc::new(SharedTorrentCache::new())),
            Vec::new(),
        );
        special.cycle().await.unwrap();
        special.cycle().await.unwrap();

        let rechecks = client
            .calls()
            .await
            .into_iter()
            .filter(|c| matches!(c, ClientCall::Recheck { .. }))
            .count();
        assert_eq!(rechecks, 1);
    }
}
