//! Remote capability proxy over the Model Context Protocol.
//!
//! The content agent reaches its research and database-assist capabilities
//! through a hosted MCP server. [`McpClient`] speaks the streamable HTTP
//! transport; discovered tools are wrapped as agent tools in
//! [`crate::tools::RemoteTool`].

mod client;
mod types;

pub use client::{parse_response_body, redact_url, McpClient};
pub use types::*;
