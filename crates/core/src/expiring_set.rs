//! Time-windowed set used to debounce repeated work on the same key.
//!
//! Every key carries its own expiry. `contains` is true only while the key is
//! unexpired, and inserting an existing key pushes its expiry forward.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use tokio::time::{Duration, Instant};

/// A set whose members silently drop out after a fixed time-to-live.
#[derive(Debug, Clone)]
pub struct ExpiringSet<K> {
    ttl: Duration,
    entries: HashMap<K, Instant>,
}

impl<K: Eq + Hash> ExpiringSet<K> {
    /// Create an empty set where each member lives for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Create an empty set with a TTL expressed in whole seconds.
    pub fn with_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert `key`, refreshing its expiry if it was already present.
    pub fn add(&mut self, key: K) {
        let expires_at = Instant::now() + self.ttl;
        self.entries.insert(key, expires_at);
    }

    /// Whether `key` was inserted less than one TTL ago.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.entries.get(key) {
            Some(expires_at) => Instant::now() < *expires_at,
            None => false,
        }
    }

    /// Drop `key` ahead of its expiry. Returns whether it was live.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.entries.remove(key) {
            Some(expires_at) => Instant::now() < expires_at,
            None => false,
        }
    }

    /// Number of live members. Prunes expired ones as a side effect.
    pub fn len(&mut self) -> usize {
        self.prune();
        self.entries.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Forget every expired member.
    pub fn prune(&mut self) {
        let now = Instant::now();
        self.entries.retain(|_, expires_at| now < *expires_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_contains_until_expiry() {
        let mut set = ExpiringSet::with_secs(10);
        set.add("abc".to_string());
        assert!(set.contains("abc"));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(set.contains("abc"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!set.contains("abc"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reinsert_refreshes_expiry() {
        let mut set = ExpiringSet::with_secs(10);
        set.add(1u32);
        tokio::time::advance(Duration::from_secs(8)).await;
        set.add(1u32);
        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(set.contains(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_len_prunes_expired() {
        let mut set = ExpiringSet::with_secs(5);
        set.add("a");
        set.add("b");
        assert_eq!(set.len(), 2);

        tokio::time::advance(Duration::from_secs(6)).await;
        set.add("c");
        assert_eq!(set.len(), 1);
        assert!(!set.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove() {
        let mut set = ExpiringSet::with_secs(5);
        set.add("a");
        assert!(set.remove("a"));
        assert!(!set.contains("a"));
        assert!(!set.remove("missing"));
    }
}
