//! # Content Agent
//!
//! HTTP service that runs a single tool-calling agent: given a content
//! request it researches the topic, writes the content, stores it in
//! PostgreSQL and signals completion.
//!
//! ## Architecture
//!
//! ```text
//!   POST /api/run
//!        │
//!        ▼
//!  ┌──────────────────┐   chat completions   ┌──────────────┐
//!  │  ContentNetwork  │ ───────────────────▶ │ LLM (Gemini) │
//!  │  (routing loop)  │                      └──────────────┘
//!  └────────┬─────────┘
//!           │ tool calls
//!           ▼
//!  ┌──────────────────┐      ┌──────────────────────────────┐
//!  │  ToolRegistry    │ ───▶ │ run_sql / test_connection     │ ──▶ PostgreSQL
//!  │                  │ ───▶ │ done (writes SharedRunState)  │
//!  │                  │ ───▶ │ remote tools (MCP proxy)      │ ──▶ Smithery
//!  └──────────────────┘      └──────────────────────────────┘
//! ```
//!
//! ## Modules
//! - `agents`: agent definition, run state and the routing loop
//! - `tools`: tool trait, registry and the content tools
//! - `db`: per-call PostgreSQL sessions and row conversion
//! - `llm`: OpenAI-compatible chat completions client
//! - `mcp`: streamable-HTTP MCP client for the capability proxy
//! - `api`: HTTP server

pub mod agents;
pub mod api;
pub mod config;
pub mod db;
pub mod llm;
pub mod mcp;
pub mod tools;

pub use config::Config;
