//! Per-cycle action sets.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::classifier::TorrentAction;
use crate::torrent_client::TorrentInfo;

/// A completed torrent waiting to be handed to the content manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportJob {
    pub hash: String,
    pub name: String,
    pub content_path: PathBuf,
}

/// Hashes collected during one classification pass, drained once.
///
/// A hash sits in at most one terminal set (`pause`, `resume`, `recheck`,
/// `delete`, `remove_from_client`). `change_priority` and `imports` are
/// independent of the terminal sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionSets {
    pub pause: BTreeSet<String>,
    pub resume: BTreeSet<String>,
    pub recheck: BTreeSet<String>,
    pub delete: BTreeSet<String>,
    pub remove_from_client: BTreeSet<String>,
    pub change_priority: BTreeMap<String, Vec<i64>>,
    pub imports: Vec<ImportJob>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminal {
    Pause,
    Resume,
    Recheck,
    Delete,
    RemoveFromClient,
}

impl ActionSets {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_terminal(&mut self, hash: &str, target: Terminal) {
        let hash = hash.to_string();
        self.pause.remove(&hash);
        self.resume.remove(&hash);
        self.recheck.remove(&hash);
        self.delete.remove(&hash);
        self.remove_from_client.remove(&hash);
        let set = match target {
            Terminal::Pause => &mut self.pause,
            Terminal::Resume => &mut self.resume,
            Terminal::Recheck => &mut self.recheck,
            Terminal::Delete => &mut self.delete,
            Terminal::RemoveFromClient => &mut self.remove_from_client,
        };
        set.insert(hash);
    }

    /// Record a classifier decision. File filtering is handled by the caller
    /// through [`ActionSets::deprioritize`] or [`ActionSets::record`] with
    /// [`TorrentAction::Delete`].
    pub fn record(&mut self, torrent: &TorrentInfo, action: TorrentAction) {
        match action {
            TorrentAction::None | TorrentAction::FilterFiles { .. } => {}
            TorrentAction::Delete => self.insert_terminal(&torrent.hash, Terminal::Delete),
            TorrentAction::Recheck => self.insert_terminal(&torrent.hash, Terminal::Recheck),
            TorrentAction::Pause => self.insert_terminal(&torrent.hash, Terminal::Pause),
            TorrentAction::Resume => self.insert_terminal(&torrent.hash, Terminal::Resume),
            TorrentAction::RemoveFromClient => {
                self.insert_terminal(&torrent.hash, Terminal::RemoveFromClient)
            }
            TorrentAction::Complete => {
                self.insert_terminal(&torrent.hash, Terminal::Pause);
                if let Some(path) = torrent.content_path.as_deref() {
                    if !self.imports.iter().any(|j| j.hash == torrent.hash) {
                        self.imports.push(ImportJob {
                            hash: torrent.hash.clone(),
                            name: torrent.name.clone(),
                            content_path: PathBuf::from(path),
                        });
                    }
                }
            }
        }
    }

    pub fn deprioritize(&mut self, hash: &str, file_ids: Vec<i64>) {
        if !file_ids.is_empty() {
            self.change_priority.insert(hash.to_string(), file_ids);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pause.is_empty()
            && self.resume.is_empty()
            && self.recheck.is_empty()
            && self.delete.is_empty()
            && self.remove_from_client.is_empty()
            && self.change_priority.is_empty()
            && self.imports.is_empty()
    }
}
