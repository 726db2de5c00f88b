//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::agents::{AgentDefinition, ContentNetwork, RunLimits, RunOutcome};
use crate::config::Config;
use crate::db::Database;
use crate::llm::{ChatOptions, GeminiClient, LlmClient};
use crate::mcp::{redact_url, McpClient};
use crate::tools::{ToolInfo, ToolRegistry};

use super::types::*;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// The content agent and its routing loop
    pub network: ContentNetwork,
}

impl AppState {
    pub fn new(config: Config, tools: Arc<ToolRegistry>, llm: Arc<dyn LlmClient>) -> Self {
        let agent = AgentDefinition::content_agent(config.llm.model.clone(), tools).with_options(
            ChatOptions {
                temperature: config.llm.temperature,
                max_tokens: config.llm.max_tokens,
            },
        );
        let limits = RunLimits {
            max_turns: config.max_turns,
            timeout: config.run_timeout,
        };
        Self {
            network: ContentNetwork::new(agent, llm, limits),
            config,
        }
    }
}

/// Build the tool set: local content tools plus whatever the proxy exposes.
async fn build_tools(config: &Config) -> anyhow::Result<ToolRegistry> {
    let db = Arc::new(Database::new(&config.database.url, config.database.policy)?);
    let mut tools = ToolRegistry::with_content_tools(db);

    let mcp_url = config.mcp.server_url()?;
    match McpClient::connect(mcp_url.clone()).await {
        Ok(client) => {
            if let Err(e) = tools.add_remote_tools(Arc::new(client)).await {
                tracing::warn!("Failed to list tools on {}: {}", redact_url(&mcp_url), e);
            }
        }
        Err(e) => tracing::warn!(
            "MCP proxy {} unavailable, continuing with local tools only: {}",
            redact_url(&mcp_url),
            e
        ),
    }

    Ok(tools)
}

/// Build the router over an existing state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/run", post(run))
        .route("/api/tools", get(list_tools))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let tools = Arc::new(build_tools(&config).await?);
    tracing::info!("{} tools available", tools.len());

    let llm: Arc<dyn LlmClient> = Arc::new(GeminiClient::new(
        config.llm.api_key.clone(),
        config.llm.api_url.clone(),
    ));

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(config, tools, llm));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Setup graceful shutdown on SIGTERM/SIGINT
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.network.agent().model.clone(),
        max_turns: state.network.limits().max_turns,
    })
}

/// Run the agent to completion (or abort) and return the outcome.
async fn run(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunRequest>,
) -> Result<Json<RunOutcome>, (StatusCode, String)> {
    if req.input.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "input must not be empty".to_string()));
    }

    let model = req.model.as_deref().filter(|m| !m.trim().is_empty());
    let outcome = state.network.run(&req.input, model).await;
    Ok(Json(outcome))
}

/// List all tools the agent can call.
async fn list_tools(State(state): State<Arc<AppState>>) -> Json<Vec<ToolInfo>> {
    Json(state.network.agent().tools.list_tools())
}
