//! API request and response types.

use serde::{Deserialize, Serialize};

/// Request to run the content agent.
#[derive(Debug, Clone, Deserialize)]
pub struct RunRequest {
    /// The content request, e.g. "write a 50-word note about rain"
    pub input: String,

    /// Optional model override (uses the configured model if not specified)
    pub model: Option<String>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Default model for runs
    pub model: String,

    /// Maximum agent turns per run (from MAX_TURNS env var)
    pub max_turns: usize,
}
