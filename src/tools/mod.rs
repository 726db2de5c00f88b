//! Tool system for the content agent.
//!
//! Local tools talk to the content database (`run_sql`, `test_connection`)
//! or finish the run (`done`). Remote tools are discovered on the MCP
//! capability proxy and forwarded to it unchanged.

mod done;
mod remote;
mod sql;

pub use done::Done;
pub use remote::RemoteTool;
pub use sql::{ProbeOutcome, RunSql, SqlOutcome, TestConnection, SQL_SUGGESTION};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::agents::SharedRunState;
use crate::db::Database;
use crate::llm::{FunctionDefinition, ToolDefinition};
use crate::mcp::McpClient;

/// Per-call context handed to every tool.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub run_id: Uuid,
    pub state: SharedRunState,
}

impl ToolContext {
    pub fn new(run_id: Uuid, state: SharedRunState) -> Self {
        Self { run_id, state }
    }
}

/// Where a tool is implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSource {
    Local,
    Remote,
}

/// Information about a tool for display purposes.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub source: ToolSource,
}

/// Trait for implementing tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does.
    fn description(&self) -> &str;

    /// JSON schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    fn source(&self) -> ToolSource {
        ToolSource::Local
    }

    /// Execute the tool with the given arguments.
    ///
    /// `Err` is reserved for calls the tool could not even attempt (bad
    /// arguments, unreachable proxy); expected failures are reported in the
    /// returned text.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<String>;
}

/// Registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registry with the local content tools bound to `db`.
    pub fn with_content_tools(db: Arc<Database>) -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(TestConnection::new(Arc::clone(&db))));
        registry.register(Arc::new(RunSql::new(db)));
        registry.register(Arc::new(Done));
        registry
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Add every tool discovered on an MCP server.
    ///
    /// Local tools win name collisions; the shadowed remote tool is skipped.
    /// Returns the number of remote tools added.
    pub async fn add_remote_tools(&mut self, client: Arc<McpClient>) -> anyhow::Result<usize> {
        let descriptors = client.list_tools().await?;
        let mut added = 0;
        for descriptor in descriptors {
            if self.has_tool(&descriptor.name) {
                tracing::warn!(
                    "Remote tool '{}' shadowed by a local tool; skipping",
                    descriptor.name
                );
                continue;
            }
            self.register(Arc::new(RemoteTool::new(descriptor, Arc::clone(&client))));
            added += 1;
        }
        tracing::info!("Registered {} remote tools", added);
        Ok(added)
    }

    /// List all available tools, sorted by name.
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        let mut tools: Vec<ToolInfo> = self
            .tools
            .values()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
                source: t.source(),
            })
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Get tool schemas in LLM-compatible format, sorted by name.
    pub fn get_tool_schemas(&self) -> Vec<ToolDefinition> {
        let mut schemas: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                tool_type: "function".to_string(),
                function: FunctionDefinition {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    parameters: t.parameters_schema(),
                },
            })
            .collect();
        schemas.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        schemas
    }

    /// Execute a tool by name.
    pub async fn execute(&self, name: &str, args: Value, ctx: &ToolContext) -> anyhow::Result<String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: {}", name))?;

        tool.execute(args, ctx).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::empty()
    }
}
