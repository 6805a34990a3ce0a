//! File-list filtering for a single torrent.

use std::path::Path;

use regex_lite::{Regex, RegexBuilder};

use crate::config::TorrentPolicyConfig;
use crate::torrent_client::TorrentFile;

/// Outcome of inspecting a torrent's file list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileDecision {
    /// The client has not reported any files yet; try again next cycle.
    NotReady,
    /// Nothing to exclude.
    Keep,
    /// Set these file ids to priority 0.
    Deprioritize(Vec<i64>),
    /// Every file is excluded; delete the torrent.
    DeleteAll,
}

/// Compiled exclusion patterns and extension allowlist.
#[derive(Debug, Clone)]
pub struct FileFilter {
    folder: Option<Regex>,
    name: Option<Regex>,
    extensions: Option<Regex>,
}

fn alternation(patterns: &[String], case_sensitive: bool) -> Result<Option<Regex>, regex_lite::Error> {
    let parts: Vec<&str> = patterns
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        return Ok(None);
    }
    let joined = parts
        .iter()
        .map(|p| format!("(?:{p})"))
        .collect::<Vec<_>>()
        .join("|");
    RegexBuilder::new(&joined)
        .case_insensitive(!case_sensitive)
        .build()
        .map(Some)
}

impl FileFilter {
    pub fn new(policy: &TorrentPolicyConfig) -> Result<Self, regex_lite::Error> {
        let case_sensitive = policy.case_sensitive_matches;
        let extensions: Vec<String> = policy
            .file_extension_allowlist
            .iter()
            .map(|e| e.trim().trim_start_matches('.'))
            .filter(|e| !e.is_empty())
            .map(|e| format!(r"\.{}$", regex_lite::escape(e)))
            .collect();

        Ok(Self {
            folder: alternation(&policy.folder_exclusion_regex, case_sensitive)?,
            name: alternation(&policy.file_name_exclusion_regex, case_sensitive)?,
            extensions: alternation(&extensions, case_sensitive)?,
        })
    }

    /// Whether the extension allowlist accepts this path. An empty allowlist
    /// accepts everything.
    pub fn allows_extension(&self, path: &Path) -> bool {
        match &self.extensions {
            Some(re) => path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| re.is_match(n)),
            None => true,
        }
    }

    /// Why `relative` should not be downloaded, if at all.
    pub fn exclusion_reason(&self, relative: &str) -> Option<&'static str> {
        let path = Path::new(relative);
        if let Some(folder) = &self.folder {
            let parents = path
                .parent()
                .into_iter()
                .flat_map(|p| p.components())
                .filter_map(|c| c.as_os_str().to_str());
            for dir in parents {
                if folder.is_match(&dir.to_lowercase()) {
                    return Some("folder");
                }
            }
        }
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or(relative);
        if let Some(name) = &self.name {
            if name.is_match(file_name) {
                return Some("name");
            }
        }
        if !self.allows_extension(path) {
            return Some("extension");
        }
        None
    }

    /// Decide what to do with a torrent's file list. Files already at
    /// priority 0 count as excluded but are not sent again.
    pub fn decide(&self, files: &[TorrentFile]) -> FileDecision {
        if files.is_empty() {
            return FileDecision::NotReady;
        }
        let mut excluded = 0usize;
        let mut ids = Vec::new();
        for file in files {
            if file.priority == 0 {
                excluded += 1;
                continue;
            }
            if self.exclusion_reason(&file.name).is_some() {
                excluded += 1;
                ids.push(file.id);
            }
        }
        if excluded == files.len() {
            FileDecision::DeleteAll
        } else if ids.is_empty() {
            FileDecision::Keep
        } else {
            FileDecision::Deprioritize(ids)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: i64, name: &str) -> TorrentFile {
        TorrentFile {
            id,
            name: name.into(),
            size: 1024,
            progress: 0.0,
            priority: 1,
        }
    }

    fn policy() -> TorrentPolicyConfig {
        TorrentPolicyConfig {
            folder_exclusion_regex: vec![r"\bextras?\b".into(), r"\bsample\b".into()],
            file_name_exclusion_regex: vec![r"\bsample\b".into()],
            file_extension_allowlist: vec![".mkv".into(), "mp4".into(), ".!qb".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_exclusion_reasons() {
        let filter = FileFilter::new(&policy()).unwrap();
        assert_eq!(filter.exclusion_reason("Show/Extras/clip.mkv"), Some("folder"));
        assert_eq!(filter.exclusion_reason("Show/show.sample.mkv"), Some("name"));
        assert_eq!(filter.exclusion_reason("Show/show.nfo"), Some("extension"));
        assert_eq!(filter.exclusion_reason("Show/show.MKV"), None);
        assert_eq!(filter.exclusion_reason("Show/show.mkv.!qB"), None);
    }

    #[test]
    fn test_case_sensitive_extensions() {
        let filter = FileFilter::new(&TorrentPolicyConfig {
            case_sensitive_matches: true,
            ..policy()
        })
        .unwrap();
        assert_eq!(filter.exclusion_reason("show.MKV"), Some("extension"));
        assert_eq!(filter.exclusion_reason("show.mkv"), None);
    }

    #[test]
    fn test_empty_allowlist_accepts_everything() {
        let filter = FileFilter::new(&TorrentPolicyConfig::default()).unwrap();
        assert!(filter.allows_extension(Path::new("a/b.txt")));
        assert_eq!(filter.exclusion_reason("a/b.txt"), None);
    }

    #[test]
    fn test_decide() {
        let filter = FileFilter::new(&policy()).unwrap();
        assert_eq!(filter.decide(&[]), FileDecision::NotReady);
        assert_eq!(
            filter.decide(&[file(0, "a.mkv"), file(1, "a.mp4")]),
            FileDecision::Keep
        );
        assert_eq!(
            filter.decide(&[file(0, "a.mkv"), file(1, "a.nfo"), file(2, "sample/a.mkv")]),
            FileDecision::Deprioritize(vec![1, 2])
        );
        assert_eq!(
            filter.decide(&[file(0, "a.txt"), file(1, "a.nfo")]),
            FileDecision::DeleteAll
        );
    }

    #[test]
    fn test_already_skipped_files_count_as_excluded() {
        let filter = FileFilter::new(&policy()).unwrap();
        let mut skipped = file(0, "a.mkv");
        skipped.priority = 0;
        assert_eq!(
            filter.decide(&[skipped.clone(), file(1, "a.nfo")]),
            FileDecision::DeleteAll
        );
        assert_eq!(
            filter.decide(&[skipped, file(1, "b.mkv")]),
            FileDecision::Keep
        );
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let bad = TorrentPolicyConfig {
            folder_exclusion_regex: vec!["(".into()],
            ..Default::default()
        };
        assert!(FileFilter::new(&bad).is_err());
    }
}
