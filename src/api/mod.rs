//! HTTP API for the content agent.
//!
//! ## Endpoints
//!
//! - `POST /api/run` - Run the agent on a content request and return the outcome
//! - `GET /api/health` - Health check
//! - `GET /api/tools` - List all tools (local + remote)

mod routes;
pub mod types;

pub use routes::{build_router, serve, AppState};
pub use types::*;
