//! HTTP server implementation using Axum.

use std::sync::Arc;

use axum::response::Html;
use axum::{
    Json, Router,
    routing::{get, post},
};
use persona_agent::Agent;
use persona_core::config::GatewayConfig;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub gateway_config: GatewayConfig,
    pub start_time: std::time::Instant,
    /// Stateless per call; sessions carry their own history.
    pub agent: Arc<Agent>,
}

impl AppState {
    pub fn new(gateway_config: GatewayConfig, agent: Arc<Agent>) -> Self {
        Self {
            gateway_config,
            start_time: std::time::Instant::now(),
            agent,
        }
    }
}

/// Serve the chat widget page.
async fn widget_page(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Html<String> {
    Html(super::widget::widget_html(state.agent.name()))
}

fn cors_layer() -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    // Example: PERSONA_CORS_ORIGINS=https://me.example.com,https://www.example.com
    if let Ok(origins_str) = std::env::var("PERSONA_CORS_ORIGINS") {
        let origins: Vec<_> = origins_str
            .split(',')
            .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
            .collect();
        cors.allow_origin(origins)
    } else {
        cors.allow_origin(Any)
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let shared = Arc::new(state);

    Router::new()
        .route("/", get(widget_page))
        .route("/health", get(super::routes::health_check))
        .route("/api/v1/info", get(super::routes::system_info))
        .route("/api/v1/chat", post(super::routes::chat))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Router shown when the agent could not start, e.g. a profile document is
/// missing. Every page explains what to fix; chat requests are refused.
pub fn build_setup_router(problem: String) -> Router {
    let page = Arc::new(super::widget::setup_html(&problem));
    let problem = Arc::new(problem);

    Router::new()
        .route(
            "/health",
            get(|| async { Json(serde_json::json!({ "status": "setup_required" })) }),
        )
        .route(
            "/api/v1/chat",
            post(move || {
                let problem = problem.clone();
                async move {
                    Json(serde_json::json!({
                        "ok": false,
                        "error": format!("Setup required: {problem}")
                    }))
                }
            }),
        )
        .fallback(get(move || {
            let page = page.clone();
            async move { Html(page.as_str().to_string()) }
        }))
        .layer(TraceLayer::new_for_http())
}

async fn serve(config: &GatewayConfig, app: Router) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🌐 Chat widget listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Start the HTTP server.
pub async fn start(config: &GatewayConfig, agent: Arc<Agent>) -> anyhow::Result<()> {
    serve(config, build_router(AppState::new(config.clone(), agent))).await
}

/// Start the server in setup mode.
pub async fn start_setup(config: &GatewayConfig, problem: String) -> anyhow::Result<()> {
    tracing::warn!("⚠️ Serving setup page: {problem}");
    serve(config, build_setup_router(problem)).await
}
