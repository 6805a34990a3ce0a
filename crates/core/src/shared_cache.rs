//! Process-wide torrent facts shared between instance loops.
//!
//! Every loop records the category and display name of the torrents it sees.
//! Writes are last-writer-wins; a stale read only delays a log line or a
//! category restore by one cycle.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Hash → category and hash → name maps. Hashes are stored lowercase.
#[derive(Debug, Default)]
pub struct SharedTorrentCache {
    categories: RwLock<HashMap<String, String>>,
    names: RwLock<HashMap<String, String>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SharedTorrentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_category(&self, hash: &str, category: &str) {
        write(&self.categories).insert(hash.to_lowercase(), category.to_string());
    }

    pub fn record_name(&self, hash: &str, name: &str) {
        write(&self.names).insert(hash.to_lowercase(), name.to_string());
    }

    pub fn category(&self, hash: &str) -> Option<String> {
        read(&self.categories).get(&hash.to_lowercase()).cloned()
    }

    /// Display name for logs, falling back to the hash.
    pub fn name(&self, hash: &str) -> String {
        read(&self.names)
            .get(&hash.to_lowercase())
            .cloned()
            .unwrap_or_else(|| hash.to_string())
    }

    /// Drop everything known about `hash`.
    pub fn forget(&self, hash: &str) {
        let key = hash.to_lowercase();
        write(&self.categories).remove(&key);
        write(&self.names).remove(&key);
    }

    pub fn len(&self) -> usize {
        read(&self.names).len().max(read(&self.categories).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
