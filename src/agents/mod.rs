//! Agents module: the content agent and the loop that drives it.
//!
//! # Pieces
//! - **AgentDefinition**: prompt, model binding and tool set
//! - **ContentNetwork**: single-agent routing loop, bounded by turns and time
//! - **SharedRunState**: per-run record written by tools, read by the loop

mod network;
mod prompt;
mod state;

pub use network::{
    route, AbortReason, ContentNetwork, RoutingState, RunLimits, RunOutcome, ToolCallRecord,
};
pub use prompt::{build_system_prompt, CONTENT_TABLE_SCHEMA};
pub use state::{RunState, RunStateUpdate, SharedRunState};

use std::sync::Arc;

use crate::llm::ChatOptions;
use crate::tools::ToolRegistry;

/// Declarative description of an agent.
#[derive(Clone)]
pub struct AgentDefinition {
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    /// Model used when a run does not ask for another one.
    pub model: String,
    pub options: ChatOptions,
    pub tools: Arc<ToolRegistry>,
}

impl AgentDefinition {
    /// The content creation agent over the given tool set.
    pub fn content_agent(model: impl Into<String>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            name: "content_agent".to_string(),
            description: "Researches a topic, writes content and stores it in PostgreSQL"
                .to_string(),
            system_prompt: build_system_prompt(&tools),
            model: model.into(),
            options: ChatOptions::default(),
            tools,
        }
    }

    /// Sampling options sent with every turn.
    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }
}

impl std::fmt::Debug for AgentDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentDefinition")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("tools", &self.tools.len())
            .finish()
    }
}
