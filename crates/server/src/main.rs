mod api;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use reconcilarr_core::config::LogFormat;
use reconcilarr_core::connectivity::HttpInternetProbe;
use reconcilarr_core::{
    build_instance, load_config, run_forever, validate_config, validate_instances, Config,
    LoopServices, LoopTimings, QBittorrentClient, SharedTorrentCache, SpecialCategoryLoop,
    StatusBoard,
};

use api::create_router;
use state::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Timeout for each internet reachability probe.
const INTERNET_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Keeps qBittorrent and Sonarr/Radarr in step.
#[derive(Debug, Parser)]
#[command(name = "reconcilarr", version)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, env = "RECONCILARR_CONFIG", default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config from {:?}: {}", args.config, e);
            std::process::exit(1);
        }
    };
    init_tracing(config.settings.log_format);
    info!(version = VERSION, path = ?args.config, "Configuration loaded");

    if let Err(e) = run(config).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Short hex digest of the effective configuration, for telling restarts apart.
fn config_fingerprint(config: &Config) -> String {
    let json = serde_json::to_string(config).unwrap_or_default();
    let digest = format!("{:x}", Sha256::digest(json.as_bytes()));
    digest[..16].to_string()
}

async fn run(config: Config) -> Result<()> {
    validate_config(&config).context("Configuration validation failed")?;
    info!(fingerprint = %config_fingerprint(&config), "Configuration validated");

    let settings = &config.settings;
    std::fs::create_dir_all(&settings.appdata_folder).with_context(|| {
        format!("Failed to create appdata folder {:?}", settings.appdata_folder)
    })?;
    if let Err(e) = std::fs::create_dir_all(&settings.completed_download_folder) {
        warn!(
            folder = ?settings.completed_download_folder,
            error = %e,
            "Could not create completed download folder"
        );
    }

    let client = QBittorrentClient::new(config.qbittorrent.clone())
        .context("Failed to create qBittorrent client")?;
    info!(url = %config.qbittorrent.url, "Using qBittorrent");
    let internet = HttpInternetProbe::new(
        settings.internet_check_urls.clone(),
        INTERNET_CHECK_TIMEOUT,
    )
    .context("Failed to create internet probe")?;

    let status = StatusBoard::new();
    let services = LoopServices {
        client: Arc::new(client),
        internet: Arc::new(internet),
        shared: Arc::new(SharedTorrentCache::new()),
        status: status.clone(),
    };
    let timings = LoopTimings::from(settings);

    let (accepted, rejected) = validate_instances(&config.instances);
    if !rejected.is_empty() {
        warn!(count = rejected.len(), "Some instances were rejected");
    }

    let mut handlers = Vec::new();
    for instance in &accepted {
        let built = match build_instance(instance, settings, &services).await {
            Ok(built) => built,
            Err(e) => {
                error!(instance = %instance.name, error = %e, "Failed to start instance");
                continue;
            }
        };
        info!(
            instance = %built.name,
            category = built.torrents.category(),
            search = built.search.is_some(),
            "Starting instance loops"
        );
        tokio::spawn(run_forever(built.torrents, timings, status.clone()));
        if let Some(search) = built.search {
            tokio::spawn(run_forever(search, timings, status.clone()));
        }
        handlers.push(built.failure);
    }

    let special = SpecialCategoryLoop::new(settings, &services, handlers);
    tokio::spawn(run_forever(special, timings, status.clone()));

    if config.status.enabled {
        let addr = SocketAddr::new(config.status.host, config.status.port);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind status server to {}", addr))?;
        let app = create_router(Arc::new(AppState::new(&config, status.clone())));
        info!("Status server listening on {}", addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!(error = %e, "Status server stopped");
            }
        });
    }

    signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down");
    std::process::exit(0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcilarr_core::load_config_from_str;

    #[test]
    fn test_fingerprint_changes_with_config() {
        let a = load_config_from_str("[qbittorrent]\nurl = \"http://a:8080\"").unwrap();
        let b = load_config_from_str("[qbittorrent]\nurl = \"http://b:8080\"").unwrap();
        assert_eq!(config_fingerprint(&a).len(), 16);
        assert_eq!(config_fingerprint(&a), config_fingerprint(&a));
        assert_ne!(config_fingerprint(&a), config_fingerprint(&b));
    }

    #[test]
    fn test_args_default_config_path() {
        let args = Args::try_parse_from(["reconcilarr"]).unwrap();
        if std::env::var_os("RECONCILARR_CONFIG").is_none() {
            assert_eq!(args.config, PathBuf::from("config.toml"));
        }
        let args = Args::try_parse_from(["reconcilarr", "--config", "/etc/r.toml"]).unwrap();
        assert_eq!(args.config, PathBuf::from("/etc/r.toml"));
    }
}
