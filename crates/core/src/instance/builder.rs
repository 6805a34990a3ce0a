//! Turning one validated `[[instances]]` entry into running loops.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use super::{LoopServices, TorrentLoop};
use crate::arr::{ArrClient, ArrError, HttpArrClient};
use crate::arr_db::{select_schema, ArrDatabase, ArrDbError};
use crate::classifier::FileFilter;
use crate::config::{ArrInstanceConfig, Settings};
use crate::executor::{BatchActionExecutor, FailureHandler, FolderCleaner};
use crate::probe::{AcceptAllProbe, FfprobeProbe, MediaProbe};
use crate::requests::{
    OmbiClient, OverseerrClient, RequestError, RequestReconciler, RequestSource,
};
use crate::scheduler::MissingContentScheduler;
use crate::status::InstanceStatus;
use crate::store::{LocalStateStore, StoreError};

/// Timeout for content manager and request service calls.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("instance '{0}' has no uri or api_key")]
    MissingCredentials(String),

    #[error("unrecognised version '{version}' reported by '{instance}'")]
    UnknownVersion { instance: String, version: String },

    #[error("content manager: {0}")]
    Arr(#[from] ArrError),

    #[error("content manager database: {0}")]
    ArrDb(#[from] ArrDbError),

    #[error("state store: {0}")]
    Store(#[from] StoreError),

    #[error("request service: {0}")]
    Request(#[from] RequestError),

    #[error("invalid exclusion pattern: {0}")]
    Pattern(#[from] regex_lite::Error),
}

/// Everything that runs for one content manager instance.
pub struct ArrInstance {
    pub name: String,
    pub torrents: TorrentLoop,
    /// Present when missing search is on and the database is readable.
    pub search: Option<MissingContentScheduler>,
    /// Blocklists on this instance's behalf from the special-category loop.
    pub failure: FailureHandler,
}

/// Connect to the instance over HTTP and assemble its loops.
pub async fn build_instance(
    config: &ArrInstanceConfig,
    settings: &Settings,
    services: &LoopServices,
) -> Result<ArrInstance, BuildError> {
    let (Some(uri), Some(api_key)) = (config.uri.as_deref(), config.api_key.as_deref()) else {
        return Err(BuildError::MissingCredentials(config.name.clone()));
    };
    let arr: Arc<dyn ArrClient> = Arc::new(HttpArrClient::new(uri, api_key, HTTP_TIMEOUT)?);
    build_instance_with(config, settings, services, arr).await
}

/// Assemble an instance around an existing content manager client.
pub async fn build_instance_with(
    config: &ArrInstanceConfig,
    settings: &Settings,
    services: &LoopServices,
    arr: Arc<dyn ArrClient>,
) -> Result<ArrInstance, BuildError> {
    let name = config.name.clone();
    let kind = config.kind;

    let status = arr.system_status().await?;
    let major = status
        .major_version()
        .ok_or_else(|| BuildError::UnknownVersion {
            instance: name.clone(),
            version: status.version.clone(),
        })?;
    info!(instance = %name, %kind, version = %status.version, "Connected to content manager");

    let store = Arc::new(LocalStateStore::open(
        &settings.appdata_folder.join(format!("{name}.db")),
    )?);

    let failure = FailureHandler::new(&name, kind, arr.clone(), store.clone(), config.re_search);
    let mut executor = BatchActionExecutor::new(
        kind,
        config.import_mode.clone(),
        services.client.clone(),
        failure,
        services.shared.clone(),
    );
    if let Some(cleaner) = cleaner(config, settings)? {
        executor = executor.with_cleaner(cleaner);
    }
    let torrents = TorrentLoop::new(config, settings, services, arr.clone(), store.clone(), executor)?;

    let search = if config.entry_search.search_missing {
        match &config.entry_search.database_file {
            Some(path) if path.exists() => {
                let db = ArrDatabase::open(path, select_schema(kind, major))?;
                let mut scheduler = MissingContentScheduler::new(
                    &name,
                    kind,
                    config.entry_search.clone(),
                    arr.clone(),
                    Arc::new(db),
                    store.clone(),
                    services.status.clone(),
                );
                if let Some(source) = request_source(config)? {
                    info!(instance = %name, source = source.kind().as_str(), "Request search enabled");
                    scheduler = scheduler.with_requests(RequestReconciler::new(source, kind));
                }
                Some(scheduler)
            }
            _ => {
                warn!(instance = %name, "Database file not found, missing search disabled");
                None
            }
        }
    } else {
        None
    };

    services
        .status
        .register(
            &name,
            InstanceStatus::new(kind, config.category(), search.is_some()),
        )
        .await;

    let failure = FailureHandler::new(&name, kind, arr, store, config.re_search);
    Ok(ArrInstance {
        name,
        torrents,
        search,
        failure,
    })
}

/// Folder cleanup needs auto-delete and an existing completed folder root.
fn cleaner(
    config: &ArrInstanceConfig,
    settings: &Settings,
) -> Result<Option<FolderCleaner>, regex_lite::Error> {
    if !config.torrent.auto_delete {
        return Ok(None);
    }
    let folder = settings.completed_download_folder.join(config.category());
    if !folder.parent().is_some_and(Path::exists) {
        warn!(
            instance = %config.name,
            folder = %folder.display(),
            "Completed folder does not exist, cleanup disabled"
        );
        return Ok(None);
    }
    let probe: Arc<dyn MediaProbe> = match &settings.ffprobe_path {
        Some(binary) => Arc::new(FfprobeProbe::new(binary)),
        None => Arc::new(AcceptAllProbe),
    };
    let filter = FileFilter::new(&config.torrent)?;
    Ok(Some(FolderCleaner::new(folder, probe, filter)))
}

fn request_source(config: &ArrInstanceConfig) -> Result<Option<Arc<dyn RequestSource>>, RequestError> {
    let search = &config.entry_search;
    if search.overseerr.enabled {
        let client = OverseerrClient::new(&search.overseerr, HTTP_TIMEOUT)?;
        return Ok(Some(Arc::new(client)));
    }
    if search.ombi.enabled {
        let client = OmbiClient::new(&search.ombi, HTTP_TIMEOUT)?;
        return Ok(Some(Arc::new(client)));
    }
    Ok(None)
}
