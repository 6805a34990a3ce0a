use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use super::{handlers, middleware::metrics_middleware};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::get_status))
        .route("/config", get(handlers::get_config))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .route("/metrics", get(handlers::get_metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use reconcilarr_core::{load_config_from_str, ArrKind, InstanceStatus, StatusBoard};
    use tower::ServiceExt;

    const CONFIG: &str = r#"
        [qbittorrent]
        url = "http://localhost:8080"
        password = "hunter2"

        [[instances]]
        name = "tv"
        kind = "sonarr"
        managed = true
        uri = "http://localhost:8989"
        api_key = "secret-key"
    "#;

    async fn app() -> (Router, StatusBoard) {
        let config = load_config_from_str(CONFIG).unwrap();
        let status = StatusBoard::new();
        status
            .register("tv", InstanceStatus::new(ArrKind::Sonarr, "tv", true))
            .await;
        let state = Arc::new(AppState::new(&config, status.clone()));
        (create_router(state), status)
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app().await;
        let (code, body) = get_body(app, "/api/health").await;
        assert_eq!(code, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_status_reports_instances() {
        let (app, status) = app().await;
        status.record_search("tv").await;
        let (code, body) = get_body(app, "/api/status").await;
        assert_eq!(code, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["tv"]["kind"], "sonarr");
        assert_eq!(json["tv"]["phase"], "idle");
        assert_eq!(json["tv"]["searches_issued"], 1);
    }

    #[tokio::test]
    async fn test_config_hides_secrets() {
        let (app, _) = app().await;
        let (_, body) = get_body(app, "/api/config").await;
        assert!(!body.contains("secret-key"));
        assert!(!body.contains("hunter2"));
        assert!(body.contains("localhost:8989"));
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (app, _) = app().await;
        let (code, body) = get_body(app, "/metrics").await;
        assert_eq!(code, StatusCode::OK);
        assert!(body.contains("# TYPE"));
    }
}
