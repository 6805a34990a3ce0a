use reconcilarr_core::config::SanitizedConfig;
use reconcilarr_core::{Config, StatusBoard};

/// Shared state for the status server.
pub struct AppState {
    config: SanitizedConfig,
    status: StatusBoard,
}

impl AppState {
    pub fn new(config: &Config, status: StatusBoard) -> Self {
        Self {
            config: SanitizedConfig::from(config),
            status,
        }
    }

    pub fn sanitized_config(&self) -> &SanitizedConfig {
        &self.config
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }
}
