//! HTTP API gateway for FinTrack.
//!
//! Exposes the chat pipeline over REST: chat CRUD, message turns with
//! optional PDF statements, upload-only statements, insights and summaries.
//!
//! Built on Axum.

pub mod api;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{Router, response::Json, routing::get};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use fintrack_config::{AppConfig, GatewayConfig};
use fintrack_core::error::ChatError;
use fintrack_pipeline::{ChatService, ModelGateway, PdfExtractor};
use fintrack_security::{Cipher, SecretKey};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub service: ChatService,
    pub config: GatewayConfig,
}

pub type SharedState = Arc<GatewayState>;

/// Build the full router.
///
/// Layers applied:
/// - CORS for the configured browser origins
/// - Request body size limit (`gateway.max_upload_bytes`)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health_handler))
        .merge(api::chat_router(state))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Wire the chat pipeline from configuration.
///
/// A missing or malformed encryption secret, or an unknown default
/// provider, is a [`ChatError::Configuration`].
pub async fn build_state(config: &AppConfig) -> Result<SharedState, ChatError> {
    let secret = SecretKey::from_config(&config.encryption).map_err(|e| {
        ChatError::Configuration {
            message: e.to_string(),
        }
    })?;
    let store = fintrack_store::open(&config.store).await?;

    if !config.has_api_key() {
        warn!("No API key configured; model calls will fail until one is set");
    }

    let router = fintrack_providers::router::build_from_config(config);
    let provider = router.default().ok_or_else(|| ChatError::Configuration {
        message: format!("unknown default provider '{}'", config.default_provider),
    })?;
    let model = fintrack_providers::router::resolve_model(config);

    info!(
        provider = %provider.name(),
        model = %model,
        store = %store.name(),
        "Pipeline configured"
    );

    let gateway = ModelGateway::new(provider, model)
        .with_temperature(config.default_temperature)
        .with_max_tokens(config.default_max_tokens);

    Ok(Arc::new(GatewayState {
        service: ChatService::new(store, Cipher::new(secret), Arc::new(PdfExtractor::new()), gateway),
        config: config.gateway.clone(),
    }))
}

/// Build the pipeline and serve until shutdown.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let app = build_router(build_state(&config).await?);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use fintrack_core::DocumentExtractor;
    use fintrack_core::error::ExtractionError;
    use fintrack_store::InMemoryChatStore;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct NoExtractor;

    impl DocumentExtractor for NoExtractor {
        fn name(&self) -> &str {
            "none"
        }

        fn extract(&self, _bytes: &[u8]) -> Result<String, ExtractionError> {
            Err(ExtractionError::Empty)
        }
    }

    fn test_state() -> SharedState {
        let config = AppConfig::default();
        let router = fintrack_providers::router::build_from_config(&config);
        let provider = router.default().expect("default provider");
        let secret = SecretKey::from_bytes(&[9u8; 32]).unwrap();

        Arc::new(GatewayState {
            service: ChatService::new(
                Arc::new(InMemoryChatStore::new()),
                Cipher::new(secret),
                Arc::new(NoExtractor),
                ModelGateway::new(provider, &config.default_model),
            ),
            config: config.gateway,
        })
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_state());

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn cors_preflight_allows_configured_origin() {
        let app = build_router(test_state());

        let req = Request::builder()
            .method("OPTIONS")
            .uri("/chats")
            .header("Origin", "http://localhost:5173")
            .header("Access-Control-Request-Method", "POST")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("http://localhost:5173")
        );
    }

    #[tokio::test]
    async fn cors_rejects_unknown_origin() {
        let app = build_router(test_state());

        let req = Request::builder()
            .method("OPTIONS")
            .uri("/chats")
            .header("Origin", "https://evil.example")
            .header("Access-Control-Request-Method", "POST")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert!(response.headers().get("access-control-allow-origin").is_none());
    }

    fn memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.store.backend = "memory".into();
        config.encryption.key = Some("0123456789abcdef0123456789abcdef".into());
        config
    }

    #[tokio::test]
    async fn missing_secret_is_configuration_error() {
        let mut config = memory_config();
        config.encryption.key = None;
        let err = build_state(&config).await.err().unwrap();
        assert!(matches!(err, ChatError::Configuration { .. }));
        assert!(start(config).await.is_err());
    }

    #[tokio::test]
    async fn short_secret_is_configuration_error() {
        let mut config = memory_config();
        config.encryption.key = Some("too-short".into());
        let err = build_state(&config).await.err().unwrap();
        assert!(matches!(err, ChatError::Configuration { .. }));
    }

    #[tokio::test]
    async fn unknown_provider_is_configuration_error() {
        let mut config = memory_config();
        config.default_provider = "nonexistent".into();
        let err = build_state(&config).await.err().unwrap();
        assert!(matches!(err, ChatError::Configuration { .. }));
    }

    #[tokio::test]
    async fn valid_config_builds_state() {
        let state = build_state(&memory_config()).await.unwrap();
        assert_eq!(state.service.store().name(), "in_memory");
        assert_eq!(state.config.port, 5000);
    }
}
