use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::State, http::header, response::IntoResponse, Json};
use reconcilarr_core::config::SanitizedConfig;
use reconcilarr_core::InstanceStatus;
use serde::Serialize;

use crate::metrics;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Per-instance loop state, keyed by instance name.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<String, InstanceStatus>> {
    Json(state.status().snapshot().await)
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config().clone())
}

pub async fn get_metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::encode_metrics(),
    )
}
