//! Snapshot of a content manager's live download queue.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use tracing::debug;

use crate::arr::{ArrClient, ArrError, QueueRecord};
use crate::retry::RetryPolicy;
use crate::store::{LocalStateStore, StoreError};

/// Everything the queue is fetched with in one page.
const QUEUE_PAGE_SIZE: u32 = 10_000;

/// A finished download the content manager refuses to import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadQueueItem {
    /// Upper-case info hash.
    pub download_id: String,
    /// `outputPath/title`.
    pub path: PathBuf,
}

/// Lookup tables built from one queue fetch.
#[derive(Debug, Clone, Default)]
pub struct QueueIndex {
    queue_ids: HashMap<String, i64>,
    entries: HashMap<i64, Vec<i64>>,
    queued: HashSet<i64>,
    bad: Vec<BadQueueItem>,
}

fn is_bad(record: &QueueRecord, blocklist_messages: &[String]) -> bool {
    record.status.as_deref() == Some("completed")
        && record.tracked_download_state.as_deref() == Some("importPending")
        && record.tracked_download_status.as_deref() == Some("warning")
        && record
            .status_messages
            .iter()
            .flat_map(|m| m.messages.iter())
            .any(|msg| blocklist_messages.iter().any(|b| b == msg))
}

impl QueueIndex {
    pub fn build(records: &[QueueRecord], blocklist_messages: &[String]) -> Self {
        let mut index = Self::default();
        for record in records {
            let Some(download_id) = record.download_id.as_deref().map(str::to_uppercase) else {
                continue;
            };
            index.queue_ids.insert(download_id.clone(), record.id);
            if let Some(entry_id) = record.entry_id() {
                index.entries.entry(record.id).or_default().push(entry_id);
                index.queued.insert(entry_id);
            }
            if is_bad(record, blocklist_messages) {
                if let (Some(output), Some(title)) = (&record.output_path, &record.title) {
                    index.bad.push(BadQueueItem {
                        download_id,
                        path: PathBuf::from(output).join(title),
                    });
                }
            }
        }
        index
    }

    /// Queue id of the download with this info hash.
    pub fn queue_id(&self, hash: &str) -> Option<i64> {
        self.queue_ids.get(&hash.to_uppercase()).copied()
    }

    /// Episode or movie ids a queue record covers.
    pub fn entry_ids(&self, queue_id: i64) -> &[i64] {
        self.entries.get(&queue_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_queued(&self, entry_id: i64) -> bool {
        self.queued.contains(&entry_id)
    }

    pub fn queued_entry_ids(&self) -> Vec<i64> {
        self.queued.iter().copied().collect()
    }

    pub fn bad_items(&self) -> &[BadQueueItem] {
        &self.bad
    }

    pub fn len(&self) -> usize {
        self.queue_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue_ids.is_empty()
    }
}

/// Fetch the whole queue, retrying transient transport failures.
pub async fn fetch_queue(
    arr: &dyn ArrClient,
    retry: &RetryPolicy,
) -> Result<Vec<QueueRecord>, ArrError> {
    retry
        .run("get_queue", || arr.get_queue(1, QUEUE_PAGE_SIZE))
        .await
}

/// Mirror the live queue into the store's queue table.
pub fn sync_store(store: &LocalStateStore, index: &QueueIndex) -> Result<(), StoreError> {
    let live = index.queued_entry_ids();
    for id in &live {
        store.upsert_queue(*id)?;
    }
    let pruned = store.prune_queue(&live)?;
    if pruned > 0 {
        debug!(pruned, "Pruned stale queue rows");
    }
    Ok(())
}
