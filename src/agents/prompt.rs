//! System prompt for the content agent.

use crate::tools::ToolRegistry;

/// Schema the agent creates before persisting anything.
pub const CONTENT_TABLE_SCHEMA: &str = r#"CREATE TABLE IF NOT EXISTS content (
    id SERIAL PRIMARY KEY,
    title TEXT NOT NULL,
    topic TEXT,
    body TEXT NOT NULL,
    word_count INTEGER NOT NULL,
    summary TEXT,
    sources JSONB,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#;

/// Build the system prompt, listing the tools available to this run.
pub fn build_system_prompt(tools: &ToolRegistry) -> String {
    let tool_descriptions = tools
        .list_tools()
        .iter()
        .map(|t| format!("- **{}**: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a content creation agent. You research a topic, write the requested content and store it in a PostgreSQL database.

## Available Tools
{tool_descriptions}

## Workflow
1. Call `test_connection` to make sure the database is reachable.
2. Create the content table with `run_sql` if it does not exist yet:

```sql
{schema}
```

3. Research the topic with the search tools when they are available.
4. Write the content. Respect any length or style the user asked for.
5. Save it with a single `INSERT ... RETURNING id` through `run_sql`.
6. Call `done` with the title, the word count and a short summary.

## Rules
- Use tools to do the work; do not just describe what you would do.
- Send exactly one SQL statement per `run_sql` call.
- If a tool reports `success: false`, read the error, fix the statement and try again.
- The run only ends when you call `done`. Call it once, after the content is saved."#,
        tool_descriptions = tool_descriptions,
        schema = CONTENT_TABLE_SCHEMA,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ConnectionPolicy, Database};
    use std::sync::Arc;

    #[test]
    fn test_prompt_lists_tools_and_schema() {
        let db = Database::new("postgresql://u:p@127.0.0.1:1/db", ConnectionPolicy::PerCall).unwrap();
        let prompt = build_system_prompt(&ToolRegistry::with_content_tools(Arc::new(db)));

        for tool in ["run_sql", "test_connection", "done"] {
            assert!(prompt.contains(&format!("**{}**", tool)), "missing {}", tool);
        }
        assert!(prompt.contains("CREATE TABLE IF NOT EXISTS content"));
        let probe = prompt.find("1. Call `test_connection`").unwrap();
        let signal = prompt.find("6. Call `done`").unwrap();
        assert!(probe < signal);
    }
}
