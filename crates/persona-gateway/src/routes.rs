//! API route handlers for the gateway.

use std::sync::Arc;

use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::Value;

use super::server::AppState;

/// Chat request from the widget.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Prior turns as `[{role, content}]`; content may be multimodal.
    #[serde(default)]
    pub history: Vec<Value>,
}

/// Health check endpoint.
pub async fn health_check() -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "persona-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// System information endpoint.
pub async fn system_info(State(state): State<Arc<AppState>>) -> Json<Value> {
    let uptime = state.start_time.elapsed();
    let cfg = state.agent.config();
    let tools: Vec<String> = state
        .agent
        .tool_definitions()
        .into_iter()
        .map(|d| d.name)
        .collect();
    Json(serde_json::json!({
        "name": cfg.identity.name,
        "version": env!("CARGO_PKG_VERSION"),
        "platform": format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
        "uptime_secs": uptime.as_secs(),
        "model": cfg.llm.model,
        "index_chunks": state.agent.index().len(),
        "tools": tools,
        "gateway": {
            "host": state.gateway_config.host,
            "port": state.gateway_config.port,
        }
    }))
}

/// Run one turn for the widget.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Json<Value> {
    if req.message.trim().is_empty() {
        return Json(serde_json::json!({
            "ok": false,
            "error": "Empty message"
        }));
    }

    match state.agent.chat(&req.message, &req.history).await {
        Ok(turn) => {
            let tools: Vec<&str> = turn.tool_calls.iter().map(|c| c.name.as_str()).collect();
            Json(serde_json::json!({
                "ok": true,
                "response": turn.answer,
                "tool_calls": tools,
            }))
        }
        Err(e) => {
            tracing::error!("Chat turn failed: {e}");
            Json(serde_json::json!({
                "ok": false,
                "error": e.to_string(),
                "recoverable": e.is_recoverable(),
            }))
        }
    }
}
