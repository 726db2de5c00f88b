//! Tools discovered on the MCP capability proxy.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{Tool, ToolContext, ToolSource};
use crate::mcp::{McpClient, McpToolDescriptor};

/// A remote tool; calls are forwarded to the MCP server unchanged.
pub struct RemoteTool {
    name: String,
    description: String,
    schema: Value,
    client: Arc<McpClient>,
}

impl RemoteTool {
    pub fn new(descriptor: McpToolDescriptor, client: Arc<McpClient>) -> Self {
        Self {
            name: descriptor.name,
            description: descriptor.description,
            schema: normalize_schema(descriptor.input_schema),
            client,
        }
    }
}

/// The chat completions endpoint rejects `$schema` and needs an object root.
fn normalize_schema(schema: Value) -> Value {
    match schema {
        Value::Object(mut map) => {
            map.remove("$schema");
            map.entry("type")
                .or_insert_with(|| Value::String("object".to_string()));
            Value::Object(map)
        }
        _ => serde_json::json!({"type": "object", "properties": {}}),
    }
}

#[async_trait]
impl Tool for RemoteTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    fn source(&self) -> ToolSource {
        ToolSource::Remote
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<String> {
        tracing::info!(run_id = %ctx.run_id, "Calling remote tool {}", self.name);
        self.client.call_tool(&self.name, args).await
    }
}
