//! content-agent - HTTP Server Entry Point
//!
//! Starts the HTTP server that exposes the content agent.

use content_agent::{api, config::Config};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the environment may already be populated.
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "content_agent=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Loaded configuration: model={}, max_turns={}, run_timeout={}s, db_policy={}",
        config.llm.model,
        config.max_turns,
        config.run_timeout.as_secs(),
        config.database.policy
    );

    api::serve(config).await
}
