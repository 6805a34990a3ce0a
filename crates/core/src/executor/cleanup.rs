//! Completed-folder cleanup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::classifier::FileFilter;
use crate::probe::MediaProbe;

const IGNORED_NAMES: [&str; 2] = ["desktop.ini", ".DS_Store"];

fn is_ignored(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    IGNORED_NAMES.contains(&name) || path.extension().is_some_and(|e| e == "parts")
}

/// Folder a torrent's content lives in. Single-file torrents whose parent is
/// named after the torrent resolve to that parent.
pub fn content_folder(content_path: &Path, name: &str) -> PathBuf {
    let named = |p: &Path| p.file_name().and_then(|n| n.to_str()) == Some(name);
    if content_path.is_dir() && named(content_path) {
        return content_path.to_path_buf();
    }
    if content_path.is_file() {
        if let Some(parent) = content_path.parent().filter(|p| named(p)) {
            return parent.to_path_buf();
        }
    }
    content_path.to_path_buf()
}

/// What one cleanup pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupOutcome {
    /// Hashes whose folder held no valid media and was removed.
    pub no_media: Vec<String>,
    pub removed_files: usize,
    pub removed_dirs: usize,
    /// The completed folder is empty again.
    pub root_empty: bool,
}

/// Walks completed folders, keeping only playable media.
pub struct FolderCleaner {
    root: PathBuf,
    probe: Arc<dyn MediaProbe>,
    filter: FileFilter,
}

async fn remove_path(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    }
}

impl FolderCleaner {
    pub fn new(root: PathBuf, probe: Arc<dyn MediaProbe>, filter: FileFilter) -> Self {
        Self {
            root,
            probe,
            filter,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn is_valid(&self, path: &Path) -> bool {
        self.filter.allows_extension(path) && self.probe.is_media(path).await
    }

    /// Clean each `(hash, folder)` pair, remove `bad_paths`, then prune empty
    /// directories under the root.
    pub async fn clean(&self, folders: &[(String, PathBuf)], bad_paths: &[PathBuf]) -> CleanupOutcome {
        let mut outcome = CleanupOutcome::default();

        for (hash, folder) in folders {
            if !folder.exists() {
                continue;
            }
            let files: Vec<PathBuf> = if folder.is_file() {
                vec![folder.clone()]
            } else {
                WalkDir::new(folder)
                    .into_iter()
                    .filter_map(Result::ok)
                    .filter(|e| e.file_type().is_file())
                    .map(|e| e.into_path())
                    .collect()
            };

            let mut valid = 0usize;
            let mut invalid = Vec::new();
            for file in files.into_iter().filter(|f| !is_ignored(f)) {
                if self.is_valid(&file).await {
                    valid += 1;
                } else {
                    invalid.push(file);
                }
            }

            if valid == 0 {
                info!(hash, folder = %folder.display(), "No valid media, removing folder");
                match remove_path(folder).await {
                    Ok(()) => outcome.removed_dirs += 1,
                    Err(e) => warn!(folder = %folder.display(), error = %e, "Failed to remove folder"),
                }
                outcome.no_media.push(hash.clone());
                continue;
            }

            for file in invalid {
                debug!(file = %file.display(), "Removing invalid file");
                match tokio::fs::remove_file(&file).await {
                    Ok(()) => outcome.removed_files += 1,
                    Err(e) => warn!(file = %file.display(), error = %e, "Failed to remove file"),
                }
            }
        }

        for path in bad_paths.iter().filter(|p| p.exists()) {
            info!(path = %path.display(), "Removing rejected download");
            match remove_path(path).await {
                Ok(()) => outcome.removed_dirs += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove path"),
            }
        }

        outcome.removed_dirs += self.prune_empty_dirs().await;
        outcome.root_empty = std::fs::read_dir(&self.root)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        outcome
    }

    async fn prune_empty_dirs(&self) -> usize {
        let dirs: Vec<PathBuf> = WalkDir::new(&self.root)
            .min_depth(1)
            .contents_first(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_dir())
            .map(|e| e.into_path())
            .collect();

        let mut removed = 0;
        for dir in dirs {
            let empty = std::fs::read_dir(&dir)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if empty && tokio::fs::remove_dir(&dir).await.is_ok() {
                removed += 1;
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TorrentPolicyConfig;
    use crate::probe::AcceptAllProbe;
    use std::fs;

    fn cleaner(root: &Path) -> FolderCleaner {
        let filter = FileFilter::new(&TorrentPolicyConfig {
            file_extension_allowlist: vec![".mkv".into()],
            ..Default::default()
        })
        .unwrap();
        FolderCleaner::new(root.to_path_buf(), Arc::new(AcceptAllProbe), filter)
    }

    #[test]
    fn test_content_folder() {
        let dir = tempfile::tempdir().unwrap();
        let named = dir.path().join("Show.S01");
        fs::create_dir(&named).unwrap();
        let file = named.join("ep.mkv");
        fs::write(&file, b"x").unwrap();

        assert_eq!(content_folder(&named, "Show.S01"), named);
        assert_eq!(content_folder(&file, "Show.S01"), named);
        assert_eq!(content_folder(&file, "Other"), file);
    }

    #[tokio::test]
    async fn test_invalid_files_removed_valid_kept() {
        let root = tempfile::tempdir().unwrap();
        let folder = root.path().join("Show");
        fs::create_dir_all(folder.join("Subs")).unwrap();
        fs::write(folder.join("ep.mkv"), b"x").unwrap();
        fs::write(folder.join("ep.nfo"), b"x").unwrap();
        fs::write(folder.join("Subs").join("en.srt"), b"x").unwrap();
        fs::write(folder.join("desktop.ini"), b"x").unwrap();

        let outcome = cleaner(root.path())
            .clean(&[("abc".into(), folder.clone())], &[])
            .await;

        assert!(outcome.no_media.is_empty());
        assert_eq!(outcome.removed_files, 2);
        assert!(folder.join("ep.mkv").exists());
        assert!(folder.join("desktop.ini").exists());
        assert!(!folder.join("Subs").exists());
        assert!(!outcome.root_empty);
    }

    #[tokio::test]
    async fn test_folder_without_media_is_removed() {
        let root = tempfile::tempdir().unwrap();
        let folder = root.path().join("Junk");
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("readme.txt"), b"x").unwrap();

        let outcome = cleaner(root.path())
            .clean(&[("abc".into(), folder.clone())], &[])
            .await;

        assert_eq!(outcome.no_media, vec!["abc".to_string()]);
        assert!(!folder.exists());
        assert!(outcome.root_empty);
    }

    #[tokio::test]
    async fn test_bad_paths_removed() {
        let root = tempfile::tempdir().unwrap();
        let bad = root.path().join("Rejected.Release");
        fs::create_dir_all(&bad).unwrap();
        fs::write(bad.join("a.mkv"), b"x").unwrap();

        cleaner(root.path()).clean(&[], &[bad.clone()]).await;
        assert!(!bad.exists());
    }
}
