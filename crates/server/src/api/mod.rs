use crate::config::{AppState, ServerConfig};
use crate::middleware::auth;
use crate::session;
use anyhow::{Context, Result};
use axum::{extract::State, middleware, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Start the gateway. Failing to bind is the only fatal runtime error.
pub async fn serve(config: ServerConfig) -> Result<()> {
    let addr = config.bind_addr();
    let state = Arc::new(AppState::new(config));

    let app = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Gateway listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);
    tracing::info!("MCP endpoint: ws://{}{}", addr, state.config.server.mcp_path);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the gateway router
pub fn create_router(state: Arc<AppState>) -> Router {
    let mcp_routes = Router::new()
        .route(&state.config.server.mcp_path, get(session::mcp_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_bearer));

    Router::new()
        .route("/health", get(health_check))
        .merge(mcp_routes)
        .nest_service("/connect", ServeDir::new(&state.config.server.connect_dir))
        // Middleware
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(false))
                .on_response(DefaultOnResponse::new().include_headers(false)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "service": state.mcp.info().name,
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": state.config.endpoints(),
    }))
}

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }
}
