//! Process-local per-torrent flags consulted by the classifier.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::expiring_set::ExpiringSet;

/// What one instance's torrent loop remembers between cycles. Nothing here
/// is persisted.
#[derive(Debug)]
pub struct TorrentMemory {
    files_filtered: HashSet<String>,
    special_cased: HashSet<String>,
    recently_touched: ExpiringSet<String>,
    sent_to_import: HashSet<String>,
    import_paths: HashSet<PathBuf>,
    queued_at: HashMap<String, i64>,
}

impl TorrentMemory {
    /// `debounce_secs` is how long a resumed or rechecked torrent is left alone.
    pub fn new(debounce_secs: u64) -> Self {
        Self {
            files_filtered: HashSet::new(),
            special_cased: HashSet::new(),
            recently_touched: ExpiringSet::with_secs(debounce_secs),
            sent_to_import: HashSet::new(),
            import_paths: HashSet::new(),
            queued_at: HashMap::new(),
        }
    }

    pub fn files_filtered(&self, hash: &str) -> bool {
        self.files_filtered.contains(hash)
    }

    pub fn mark_files_filtered(&mut self, hash: &str) {
        self.files_filtered.insert(hash.to_string());
    }

    pub fn special_cased(&self, hash: &str) -> bool {
        self.special_cased.contains(hash)
    }

    pub fn mark_special_cased(&mut self, hash: &str) {
        self.special_cased.insert(hash.to_string());
    }

    /// Start the debounce window for `hash`.
    pub fn touch(&mut self, hash: &str) {
        self.recently_touched.add(hash.to_string());
    }

    pub fn recently_touched(&self, hash: &str) -> bool {
        self.recently_touched.contains(hash)
    }

    pub fn sent_to_import(&self, hash: &str) -> bool {
        self.sent_to_import.contains(hash)
    }

    pub fn import_path_sent(&self, path: &Path) -> bool {
        self.import_paths.contains(path)
    }

    pub fn mark_sent_to_import(&mut self, hash: &str, path: PathBuf) {
        self.sent_to_import.insert(hash.to_string());
        self.import_paths.insert(path);
    }

    /// Called once the completed folder is empty again.
    pub fn clear_import_paths(&mut self) {
        self.import_paths.clear();
    }

    /// Remember that `hash` sat in the client's download queue at `now`.
    pub fn note_queued(&mut self, hash: &str, now: i64) {
        self.queued_at.insert(hash.to_string(), now);
    }

    /// Last time `hash` was seen queued, else `added_on`.
    pub fn queued_at(&self, hash: &str, added_on: i64) -> i64 {
        self.queued_at.get(hash).copied().unwrap_or(added_on)
    }

    pub fn forget_queued(&mut self, hash: &str) {
        self.queued_at.remove(hash);
    }

    /// Drop flags for every torrent not in `live`, e.g. ones removed by hand.
    pub fn retain_live(&mut self, live: &HashSet<&str>) {
        self.files_filtered.retain(|h| live.contains(h.as_str()));
        self.special_cased.retain(|h| live.contains(h.as_str()));
        self.sent_to_import.retain(|h| live.contains(h.as_str()));
        self.queued_at.retain(|h, _| live.contains(h.as_str()));
    }

    /// Drop every flag for a torrent that left the client.
    pub fn forget(&mut self, hash: &str) {
        self.files_filtered.remove(hash);
        self.special_cased.remove(hash);
        self.recently_touched.remove(hash);
        self.sent_to_import.remove(hash);
        self.queued_at.remove(hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_touch_expires() {
        let mut memory = TorrentMemory::new(60);
        memory.touch("abc");
        assert!(memory.recently_touched("abc"));
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!memory.recently_touched("abc"));
    }

    #[test]
    fn test_queued_at_falls_back_to_added_on() {
        let mut memory = TorrentMemory::new(60);
        assert_eq!(memory.queued_at("abc", 100), 100);
        memory.note_queued("abc", 500);
        assert_eq!(memory.queued_at("abc", 100), 500);
    }

    #[test]
    fn test_forget_clears_flags_but_keeps_paths() {
        let mut memory = TorrentMemory::new(60);
        memory.mark_files_filtered("abc");
        memory.mark_sent_to_import("abc", PathBuf::from("/done/abc"));
        memory.forget("abc");
        assert!(!memory.files_filtered("abc"));
        assert!(!memory.sent_to_import("abc"));
        assert!(memory.import_path_sent(Path::new("/done/abc")));
        memory.clear_import_paths();
        assert!(!memory.import_path_sent(Path::new("/done/abc")));
    }

    #[test]
    fn test_retain_live_drops_vanished_torrents() {
        let mut memory = TorrentMemory::new(60);
        for hash in ["kept", "gone"] {
            memory.mark_files_filtered(hash);
            memory.mark_special_cased(hash);
            memory.mark_sent_to_import(hash, PathBuf::from(format!("/done/{hash}")));
            memory.note_queued(hash, 500);
        }
        memory.retain_live(&HashSet::from(["kept"]));

        assert!(memory.files_filtered("kept"));
        assert!(memory.special_cased("kept"));
        assert!(memory.sent_to_import("kept"));
        assert_eq!(memory.queued_at("kept", 0), 500);
        assert!(!memory.files_filtered("gone"));
        assert!(!memory.special_cased("gone"));
        assert!(!memory.sent_to_import("gone"));
        assert_eq!(memory.queued_at("gone", 0), 0);
    }
}
