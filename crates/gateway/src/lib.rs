//! HTTP API gateway for webagent.
//!
//! Exposes health and model listing plus the chat endpoints. Streaming
//! chat is served as SSE, one event per agent `StreamEvent`.
//!
//! Built on Axum.

pub mod api;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{
    Router,
    response::Json,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use webagent_agent::AgentLoop;
use webagent_config::AppConfig;
use webagent_core::error::Error;
use webagent_core::tool::ToolRegistry;
use webagent_providers::ModelRegistry;

/// Shared application state for the gateway.
pub struct AppState {
    pub config: AppConfig,
    pub models: ModelRegistry,
    pub tools: ToolRegistry,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: AppConfig, models: ModelRegistry, tools: ToolRegistry) -> Self {
        Self {
            config,
            models,
            tools,
        }
    }

    /// Build state from config: a client per keyed provider and the default tools.
    pub fn from_config(config: AppConfig) -> Self {
        let models = ModelRegistry::from_config(&config);
        let tools = webagent_tools::default_registry(&config.tools);
        Self::new(config, models, tools)
    }

    /// A fresh run loop for one request.
    pub fn agent_for(&self, model: Option<&str>) -> Result<AgentLoop, Error> {
        let (selection, client) = self.models.resolve(model)?;
        Ok(AgentLoop::new(
            client,
            selection,
            self.tools.clone(),
            &self.config,
        ))
    }
}

/// Build the router with every route and layer.
///
/// - CORS restricted to the configured origins
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.gateway.cors_origins);

    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/models", get(api::models_handler))
        .route("/v1/chat/completions", post(api::chat_completions_handler))
        .route("/v1/chat", post(api::chat_handler))
        .route("/v1/query", post(api::query_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let state = Arc::new(AppState::from_config(config));
    let models = state.models.supported_ids().len();
    let tools = state.tools.len();
    let app = build_router(state);

    info!(addr = %addr, models, tools, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state() -> SharedState {
        let config = AppConfig::default();
        let models = ModelRegistry::from_config(&config);
        Arc::new(AppState::new(config, models, ToolRegistry::new()))
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
    }

    #[tokio::test]
    async fn cors_preflight_allows_configured_origin() {
        let app = build_router(test_state());

        let req = Request::builder()
            .method("OPTIONS")
            .uri("/v1/chat")
            .header("origin", "http://localhost:5173")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "http://localhost:5173"
        );
    }

    #[test]
    fn invalid_origins_are_skipped() {
        // Must not panic on an unparseable origin.
        let _ = cors_layer(&["http://ok.example".into(), "bad\norigin".into()]);
    }
}
