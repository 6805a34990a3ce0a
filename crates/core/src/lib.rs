//! Decision engine that keeps a qBittorrent client and a set of Sonarr/Radarr
//! instances consistent: classifies torrents, applies the resulting actions
//! in batches, and searches for missing or upgradeable content.

pub mod arr;
pub mod arr_db;
pub mod classifier;
pub mod config;
pub mod connectivity;
pub mod delay;
pub mod executor;
pub mod expiring_set;
pub mod instance;
pub mod metrics;
pub mod probe;
pub mod queue;
pub mod requests;
pub mod retry;
pub mod scheduler;
pub mod seeding;
pub mod shared_cache;
pub mod status;
pub mod store;
pub mod testing;
pub mod torrent_client;

pub use config::{
    load_config, load_config_from_str, validate_config, validate_instances, ArrInstanceConfig,
    ArrKind, Config, ConfigError, InstanceRejection, Settings,
};
pub use delay::{DelayKind, DelaySignal, LoopError};
pub use instance::{
    build_instance, run_forever, ArrInstance, BuildError, Cycle, LoopServices, LoopTimings,
    SpecialCategoryLoop, TorrentLoop,
};
pub use scheduler::MissingContentScheduler;
pub use shared_cache::SharedTorrentCache;
pub use status::{InstanceStatus, SchedulerPhase, StatusBoard};
pub use torrent_client::{QBittorrentClient, TorrentClient, TorrentClientError};
