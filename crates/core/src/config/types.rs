use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    pub qbittorrent: QBittorrentConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub instances: Vec<ArrInstanceConfig>,
}

/// Process-wide settings shared by every instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Root of the per-category completed download folders.
    #[serde(default = "default_completed_folder")]
    pub completed_download_folder: PathBuf,
    /// Where per-instance state databases live.
    #[serde(default = "default_appdata_folder")]
    pub appdata_folder: PathBuf,
    #[serde(default = "default_failed_category")]
    pub failed_category: String,
    #[serde(default = "default_recheck_category")]
    pub recheck_category: String,
    /// Sleep between two loop iterations (seconds).
    #[serde(default = "default_loop_sleep")]
    pub loop_sleep_secs: u64,
    #[serde(default = "default_no_internet_sleep")]
    pub no_internet_sleep_secs: u64,
    /// Backoff applied when a service stops answering (seconds).
    #[serde(default = "default_delay_sleep")]
    pub delay_sleep_secs: u64,
    /// Grace window used by the reserved-category handler.
    #[serde(default = "default_ignore_younger")]
    pub ignore_torrents_younger_than: i64,
    /// Path to an ffprobe binary. Absent means every allowed file counts as media.
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
    #[serde(default = "default_internet_check_urls")]
    pub internet_check_urls: Vec<String>,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            completed_download_folder: default_completed_folder(),
            appdata_folder: default_appdata_folder(),
            failed_category: default_failed_category(),
            recheck_category: default_recheck_category(),
            loop_sleep_secs: default_loop_sleep(),
            no_internet_sleep_secs: default_no_internet_sleep(),
            delay_sleep_secs: default_delay_sleep(),
            ignore_torrents_younger_than: default_ignore_younger(),
            ffprobe_path: None,
            internet_check_urls: default_internet_check_urls(),
            log_format: LogFormat::default(),
        }
    }
}

fn default_completed_folder() -> PathBuf {
    PathBuf::from("/downloads/completed")
}

fn default_appdata_folder() -> PathBuf {
    PathBuf::from("appdata")
}

fn default_failed_category() -> String {
    "failed".to_string()
}

fn default_recheck_category() -> String {
    "recheck".to_string()
}

fn default_loop_sleep() -> u64 {
    5
}

fn default_no_internet_sleep() -> u64 {
    15
}

fn default_delay_sleep() -> u64 {
    300
}

fn default_ignore_younger() -> i64 {
    600
}

fn default_internet_check_urls() -> Vec<String> {
    vec![
        "https://1.1.1.1".to_string(),
        "https://dns.google".to_string(),
    ]
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// qBittorrent Web API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QBittorrentConfig {
    /// Web UI URL (e.g., "http://localhost:8080")
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    30
}

/// Optional status/metrics HTTP endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    9120
}

/// Which flavour of content manager an instance talks to.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ArrKind {
    Sonarr,
    Radarr,
}

impl ArrKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArrKind::Sonarr => "sonarr",
            ArrKind::Radarr => "radarr",
        }
    }
}

impl std::fmt::Display for ArrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One managed Sonarr/Radarr instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArrInstanceConfig {
    pub name: String,
    pub kind: ArrKind,
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Download client category watched by this instance (defaults to `name`).
    #[serde(default)]
    pub category: Option<String>,
    /// Search again for whatever a failed download was for.
    #[serde(default)]
    pub re_search: bool,
    #[serde(default = "default_import_mode")]
    pub import_mode: String,
    /// Minutes between `RefreshMonitoredDownloads` commands (0 disables).
    #[serde(default = "default_refresh_downloads_timer")]
    pub refresh_downloads_timer: u64,
    /// Minutes between `RssSync` commands (0 disables).
    #[serde(default = "default_rss_sync_timer")]
    pub rss_sync_timer: u64,
    /// Queue status messages that get the download blocklisted.
    #[serde(default)]
    pub arr_error_codes_to_blocklist: Vec<String>,
    #[serde(default)]
    pub entry_search: EntrySearchConfig,
    #[serde(default)]
    pub torrent: TorrentPolicyConfig,
}

impl ArrInstanceConfig {
    pub fn category(&self) -> &str {
        self.category.as_deref().unwrap_or(&self.name)
    }
}

fn default_import_mode() -> String {
    "Move".to_string()
}

fn default_refresh_downloads_timer() -> u64 {
    1
}

fn default_rss_sync_timer() -> u64 {
    15
}

/// Missing/upgrade search behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EntrySearchConfig {
    #[serde(default)]
    pub search_missing: bool,
    #[serde(default)]
    pub also_search_specials: bool,
    #[serde(default = "default_true")]
    pub search_by_year: bool,
    #[serde(default)]
    pub search_in_reverse: bool,
    /// Maximum outstanding search commands before non-priority searches wait.
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,
    #[serde(default = "default_true")]
    pub prioritize_todays_releases: bool,
    #[serde(default)]
    pub do_upgrade_search: bool,
    #[serde(default)]
    pub quality_unmet_search: bool,
    /// Clear `Searched` flags once a full sweep completes.
    #[serde(default)]
    pub search_again_on_completion: bool,
    #[serde(default)]
    pub search_by_series: bool,
    /// The content manager's own SQLite database, opened read-only.
    #[serde(default)]
    pub database_file: Option<PathBuf>,
    #[serde(default = "default_requests_every")]
    pub search_requests_every_secs: u64,
    #[serde(default = "default_loop_timer")]
    pub loop_timer_mins: u64,
    #[serde(default = "default_throttle_sleep")]
    pub throttle_sleep_secs: u64,
    #[serde(default)]
    pub overseerr: OverseerrConfig,
    #[serde(default)]
    pub ombi: OmbiConfig,
}

impl Default for EntrySearchConfig {
    fn default() -> Self {
        Self {
            search_missing: false,
            also_search_specials: false,
            search_by_year: true,
            search_in_reverse: false,
            search_limit: default_search_limit(),
            prioritize_todays_releases: true,
            do_upgrade_search: false,
            quality_unmet_search: false,
            search_again_on_completion: false,
            search_by_series: false,
            database_file: None,
            search_requests_every_secs: default_requests_every(),
            loop_timer_mins: default_loop_timer(),
            throttle_sleep_secs: default_throttle_sleep(),
            overseerr: OverseerrConfig::default(),
            ombi: OmbiConfig::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_search_limit() -> u32 {
    5
}

fn default_requests_every() -> u64 {
    1800
}

fn default_loop_timer() -> u64 {
    15
}

fn default_throttle_sleep() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OverseerrConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_true")]
    pub approved_only: bool,
    #[serde(default)]
    pub is_4k: bool,
}

impl Default for OverseerrConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            uri: None,
            api_key: None,
            approved_only: true,
            is_4k: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OmbiConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_true")]
    pub approved_only: bool,
}

impl Default for OmbiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            uri: None,
            api_key: None,
            approved_only: true,
        }
    }
}

/// Per-instance torrent handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TorrentPolicyConfig {
    #[serde(default)]
    pub case_sensitive_matches: bool,
    #[serde(default)]
    pub folder_exclusion_regex: Vec<String>,
    #[serde(default)]
    pub file_name_exclusion_regex: Vec<String>,
    /// Extensions (with or without the leading dot) allowed to download.
    #[serde(default)]
    pub file_extension_allowlist: Vec<String>,
    #[serde(default)]
    pub auto_delete: bool,
    /// Grace window (seconds) before stalled or unavailable torrents are removed.
    #[serde(default = "default_ignore_younger")]
    pub ignore_torrents_younger_than: i64,
    #[serde(default = "default_maximum_eta")]
    pub maximum_eta: i64,
    #[serde(default = "default_deletable_percentage")]
    pub maximum_deletable_percentage: f64,
    #[serde(default)]
    pub do_not_remove_slow: bool,
    #[serde(default)]
    pub seeding_mode: SeedingModeConfig,
    #[serde(default)]
    pub trackers: Vec<TrackerRule>,
}

impl Default for TorrentPolicyConfig {
    fn default() -> Self {
        Self {
            case_sensitive_matches: false,
            folder_exclusion_regex: Vec::new(),
            file_name_exclusion_regex: Vec::new(),
            file_extension_allowlist: Vec::new(),
            auto_delete: false,
            ignore_torrents_younger_than: default_ignore_younger(),
            maximum_eta: default_maximum_eta(),
            maximum_deletable_percentage: default_deletable_percentage(),
            do_not_remove_slow: false,
            seeding_mode: SeedingModeConfig::default(),
            trackers: Vec::new(),
        }
    }
}

fn default_maximum_eta() -> i64 {
    86400
}

fn default_deletable_percentage() -> f64 {
    0.95
}

/// Category-wide seeding defaults. Non-positive values mean "unset".
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeedingModeConfig {
    #[serde(default = "default_unset")]
    pub download_rate_limit_per_torrent: i64,
    #[serde(default = "default_unset")]
    pub upload_rate_limit_per_torrent: i64,
    #[serde(default = "default_unset_ratio")]
    pub max_upload_ratio: f64,
    #[serde(default = "default_unset")]
    pub max_seeding_time: i64,
    #[serde(default)]
    pub remove_torrent: RemovalPolicy,
    #[serde(default)]
    pub remove_dead_trackers: bool,
    /// Tracker messages that mark a tracker as dead.
    #[serde(default)]
    pub remove_tracker_with_message: Vec<String>,
}

impl Default for SeedingModeConfig {
    fn default() -> Self {
        Self {
            download_rate_limit_per_torrent: default_unset(),
            upload_rate_limit_per_torrent: default_unset(),
            max_upload_ratio: default_unset_ratio(),
            max_seeding_time: default_unset(),
            remove_torrent: RemovalPolicy::default(),
            remove_dead_trackers: false,
            remove_tracker_with_message: Vec::new(),
        }
    }
}

fn default_unset() -> i64 {
    -1
}

fn default_unset_ratio() -> f64 {
    -1.0
}

/// When a torrent that met its seeding goals is removed outright.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    #[default]
    Disabled,
    /// Ratio limit reached.
    Ratio,
    /// Seeding time limit reached.
    Time,
    /// Either limit reached.
    Either,
    /// Both limits reached.
    Both,
}

/// Per-tracker overrides, matched by announce URL.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TrackerRule {
    #[serde(default)]
    pub name: Option<String>,
    pub uri: String,
    /// Higher wins when several rules match one torrent.
    #[serde(default = "default_tracker_priority")]
    pub priority: i64,
    #[serde(default)]
    pub maximum_eta: Option<i64>,
    #[serde(default)]
    pub download_rate_limit: Option<i64>,
    #[serde(default)]
    pub upload_rate_limit: Option<i64>,
    #[serde(default)]
    pub max_upload_ratio: Option<f64>,
    #[serde(default)]
    pub max_seeding_time: Option<i64>,
    #[serde(default)]
    pub super_seed_mode: Option<bool>,
    #[serde(default)]
    pub add_tracker_if_missing: bool,
    #[serde(default)]
    pub remove_if_exists: bool,
    #[serde(default)]
    pub add_tags: Vec<String>,
}

fn default_tracker_priority() -> i64 {
    -100
}

/// Sanitized config for the status endpoint (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub qbittorrent_url: String,
    pub status: StatusConfig,
    pub instances: Vec<SanitizedInstance>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedInstance {
    pub name: String,
    pub kind: ArrKind,
    pub managed: bool,
    pub category: String,
    pub uri: Option<String>,
    pub search_missing: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            qbittorrent_url: config.qbittorrent.url.clone(),
            status: config.status.clone(),
            instances: config
                .instances
                .iter()
                .map(|i| SanitizedInstance {
                    name: i.name.clone(),
                    kind: i.kind,
                    managed: i.managed,
                    category: i.category().to_string(),
                    uri: i.uri.clone(),
                    search_missing: i.entry_search.search_missing,
                })
                .collect(),
        }
    }
}
