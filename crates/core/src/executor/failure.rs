//! Blocklisting failed downloads and searching their content again.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::arr::{ArrClient, ArrCommand, ArrError};
use crate::config::ArrKind;
use crate::delay::{tolerate, LoopError};
use crate::metrics;
use crate::queue::QueueIndex;
use crate::retry::RetryPolicy;
use crate::store::LocalStateStore;

/// Removes a download from one content manager's queue with blocklisting.
pub struct FailureHandler {
    instance: String,
    kind: ArrKind,
    arr: Arc<dyn ArrClient>,
    store: Arc<LocalStateStore>,
    retry: RetryPolicy,
    re_search: bool,
}

impl FailureHandler {
    pub fn new(
        instance: impl Into<String>,
        kind: ArrKind,
        arr: Arc<dyn ArrClient>,
        store: Arc<LocalStateStore>,
        re_search: bool,
    ) -> Self {
        Self {
            instance: instance.into(),
            kind,
            arr,
            store,
            retry: RetryPolicy::default(),
            re_search,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn arr(&self) -> &dyn ArrClient {
        self.arr.as_ref()
    }

    /// Blocklist the download `hash` if the queue knows it. Returns whether a
    /// queue entry was found. Unknown hashes have nothing to blocklist.
    pub async fn blocklist(
        &self,
        hash: &str,
        name: &str,
        queue: &QueueIndex,
    ) -> Result<bool, LoopError> {
        let Some(queue_id) = queue.queue_id(hash) else {
            debug!(instance = %self.instance, hash, "Not in queue, nothing to blocklist");
            return Ok(false);
        };

        info!(instance = %self.instance, name, hash, "Blocklisting failed download");
        match self.arr.delete_queue(queue_id, true, true).await {
            Ok(()) => metrics::ACTIONS.with_label_values(&["blocklist"]).inc(),
            Err(ArrError::NotFound(_)) => {
                debug!(instance = %self.instance, queue_id, "Queue entry already gone")
            }
            Err(e) if e.is_connectivity() => return Err(e.into()),
            Err(e) => warn!(instance = %self.instance, queue_id, error = %e, "Queue deletion failed"),
        }

        if self.re_search {
            self.search_again(queue.entry_ids(queue_id)).await?;
        }
        Ok(true)
    }

    async fn search_again(&self, entry_ids: &[i64]) -> Result<(), LoopError> {
        if entry_ids.is_empty() {
            return Ok(());
        }
        let command = match self.kind {
            ArrKind::Sonarr => ArrCommand::EpisodeSearch {
                episode_ids: entry_ids.to_vec(),
            },
            ArrKind::Radarr => ArrCommand::MoviesSearch {
                movie_ids: entry_ids.to_vec(),
            },
        };
        let posted = self
            .retry
            .run("re_search", || self.arr.post_command(&command))
            .await;
        if tolerate(posted, "re_search")?.is_none() {
            return Ok(());
        }
        info!(instance = %self.instance, ids = ?entry_ids, "Searching failed content again");
        metrics::SEARCHES.with_label_values(&["re_search"]).inc();

        for &id in entry_ids {
            let key = match self.kind {
                ArrKind::Sonarr => match tolerate(self.arr.get_episode(id).await, "get_episode")? {
                    Some(episode) => episode.series_id.unwrap_or(id),
                    None => id,
                },
                ArrKind::Radarr => id,
            };
            tolerate(self.store.add_persistent(key), "add_persistent")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arr::{EpisodeMetadata, SeriesRef};
    use crate::testing::{fixtures, MockArrClient, QueueDeletion};

    fn handler(arr: Arc<MockArrClient>, re_search: bool) -> (FailureHandler, Arc<LocalStateStore>) {
        let store = Arc::new(LocalStateStore::in_memory().unwrap());
        let handler = FailureHandler::new("sonarr", ArrKind::Sonarr, arr, store.clone(), re_search)
            .with_retry(RetryPolicy::new(3));
        (handler, store)
    }

    #[tokio::test]
    async fn test_unknown_hash_is_skipped() {
        let arr = Arc::new(MockArrClient::new());
        let (handler, _) = handler(arr.clone(), true);
        let found = handler
            .blocklist("abc", "x", &QueueIndex::default())
            .await
            .unwrap();
        assert!(!found);
        assert!(arr.deletions().await.is_empty());
        assert!(arr.commands().await.is_empty());
    }

    #[tokio::test]
    async fn test_blocklist_and_search_again() {
        let arr = Arc::new(MockArrClient::new());
        let records = vec![fixtures::queue_record(5, "abc", 50)];
        arr.set_queue(records.clone()).await;
        arr.add_episode(EpisodeMetadata {
            id: 50,
            series_id: Some(9),
            series: SeriesRef::default(),
            quality_cutoff_not_met: false,
        })
        .await;
        let (handler, store) = handler(arr.clone(), true);
        let queue = QueueIndex::build(&records, &[]);

        assert!(handler.blocklist("abc", "x", &queue).await.unwrap());
        assert_eq!(
            arr.deletions().await,
            vec![QueueDeletion {
                id: 5,
                remove_from_client: true,
                blocklist: true,
            }]
        );
        assert_eq!(
            arr.commands().await,
            vec![ArrCommand::EpisodeSearch {
                episode_ids: vec![50]
            }]
        );
        assert!(store.in_persistent(9).unwrap());
    }

    #[tokio::test]
    async fn test_no_re_search_when_disabled() {
        let arr = Arc::new(MockArrClient::new());
        let records = vec![fixtures::queue_record(5, "abc", 50)];
        arr.set_queue(records.clone()).await;
        let (handler, _) = handler(arr.clone(), false);
        let queue = QueueIndex::build(&records, &[]);
        handler.blocklist("abc", "x", &queue).await.unwrap();
        assert!(arr.commands().await.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_manager_unwinds() {
        let arr = Arc::new(MockArrClient::new());
        let records = vec![fixtures::queue_record(5, "abc", 50)];
        arr.set_reachable(false).await;
        let (handler, _) = handler(arr, false);
        let queue = QueueIndex::build(&records, &[]);
        let err = handler.blocklist("abc", "x", &queue).await.unwrap_err();
        assert!(err.is_connectivity());
    }
}
