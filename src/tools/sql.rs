//! Database tools: `run_sql` and `test_connection`.
//!
//! Both tools always answer with a JSON record carrying a `success` flag.
//! Database failures are reported in that record, never as tool errors, so
//! the agent can read the message and adjust its SQL.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Tool, ToolContext};
use crate::db::{Database, StatementKind, StatementOutput};

pub const SQL_SUGGESTION: &str = "Check your SQL syntax and database connection";

const PROBE_QUERY: &str = "SELECT NOW() AS server_time, version() AS postgres_version";

/// Result of a `run_sql` call.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlOutcome {
    Rows { rows: Vec<Value> },
    Inserted { rows_affected: u64, inserted_id: Value },
    Command { rows_affected: u64, command: String },
    Failed { error: String },
}

impl SqlOutcome {
    /// Shape a statement's output according to its kind.
    pub fn from_output(kind: StatementKind, output: StatementOutput) -> Self {
        match kind {
            StatementKind::Select => Self::Rows { rows: output.rows },
            StatementKind::Insert => Self::Inserted {
                rows_affected: output.rows_affected,
                inserted_id: output
                    .rows
                    .first()
                    .and_then(|row| row.get("id"))
                    .cloned()
                    .unwrap_or(Value::Null),
            },
            StatementKind::Command(command) => Self::Command {
                rows_affected: output.rows_affected,
                command,
            },
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Rows { rows } => json!({
                "success": true,
                "rows": rows,
                "rowCount": rows.len(),
            }),
            Self::Inserted {
                rows_affected,
                inserted_id,
            } => json!({
                "success": true,
                "message": format!("Inserted {} row(s)", rows_affected),
                "insertedId": inserted_id,
            }),
            Self::Command {
                rows_affected,
                command,
            } => json!({
                "success": true,
                "message": format!("Command executed successfully. Affected {} row(s)", rows_affected),
                "command": command,
            }),
            Self::Failed { error } => json!({
                "success": false,
                "error": error,
                "suggestion": SQL_SUGGESTION,
            }),
        }
    }
}

/// Execute one SQL statement against the content database.
pub struct RunSql {
    db: Arc<Database>,
}

impl RunSql {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn run(&self, sql: &str) -> SqlOutcome {
        let kind = StatementKind::classify(sql);
        match self.db.run(sql).await {
            Ok(output) => SqlOutcome::from_output(kind, output),
            Err(e) => {
                tracing::warn!("SQL execution failed: {}", e);
                SqlOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RunSqlArgs {
    sql: String,
}

#[async_trait]
impl Tool for RunSql {
    fn name(&self) -> &str {
        "run_sql"
    }

    fn description(&self) -> &str {
        "Execute a single SQL statement against the PostgreSQL content database. \
        SELECT returns rows and rowCount; INSERT returns insertedId (use RETURNING id); \
        other statements return the affected row count."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "The SQL statement to execute"
                }
            },
            "required": ["sql"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<String> {
        let args: RunSqlArgs = serde_json::from_value(args)
            .map_err(|e| anyhow::anyhow!("Invalid arguments: {}", e))?;

        let preview: String = args.sql.chars().take(120).collect();
        tracing::info!(run_id = %ctx.run_id, "run_sql: {}", preview);

        let outcome = self.run(&args.sql).await;
        Ok(outcome.to_json().to_string())
    }
}

/// Result of a `test_connection` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Connected {
        server_time: String,
        postgres_version: String,
    },
    Failed {
        error: String,
    },
}

impl ProbeOutcome {
    fn from_output(output: StatementOutput) -> Self {
        let Some(row) = output.rows.first() else {
            return Self::Failed {
                error: "Diagnostic query returned no rows".to_string(),
            };
        };

        let server_time = row
            .get("server_time")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let postgres_version = row
            .get("postgres_version")
            .and_then(Value::as_str)
            .and_then(|v| v.split_whitespace().next())
            .unwrap_or_default()
            .to_string();

        Self::Connected {
            server_time,
            postgres_version,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Connected {
                server_time,
                postgres_version,
            } => json!({
                "success": true,
                "message": "Database connection successful",
                "server_time": server_time,
                "postgres_version": postgres_version,
            }),
            Self::Failed { error } => json!({
                "success": false,
                "error": error,
            }),
        }
    }
}

/// Check that the content database is reachable.
pub struct TestConnection {
    db: Arc<Database>,
}

impl TestConnection {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn probe(&self) -> ProbeOutcome {
        match self.db.run(PROBE_QUERY).await {
            Ok(output) => ProbeOutcome::from_output(output),
            Err(e) => {
                tracing::warn!("Database connection test failed: {}", e);
                ProbeOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}

#[async_trait]
impl Tool for TestConnection {
    fn name(&self) -> &str {
        "test_connection"
    }

    fn description(&self) -> &str {
        "Test the connection to the PostgreSQL content database. \
        Returns the server time and PostgreSQL version."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> anyhow::Result<String> {
        tracing::info!(run_id = %ctx.run_id, "test_connection");
        Ok(self.probe().await.to_json().to_string())
    }
}


/// Tests against a live PostgreSQL server (TLS enabled) named by `TEST_DATABASE_URL`.
/// Run with `cargo test -- --ignored`.
#[cfg(test)]
mod live_tests {
    use super::*;
    use crate::db::ConnectionPolicy;

    fn live_database() -> Arc<Database> {
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
        Arc::new(Database::new(&url, ConnectionPolicy::PerCall).expect("valid TEST_DATABASE_URL"))
    }

    #[tokio::test]
    #[ignore = "Requires database setup"]
    async fn test_probe_time_is_non_decreasing() {
        let db = live_database();
        let tool = TestConnection::new(db);
        let mut last: Option<chrono::DateTime<chrono::FixedOffset>> = None;
        for _ in 0..3 {
            let ProbeOutcome::Connected { server_time, .. } = tool.probe().await else {
                panic!("probe failed");
            };
            let time = chrono::DateTime::parse_from_rfc3339(&server_time).unwrap();
            if let Some(previous) = last {
                assert!(time >= previous);
            }
            last = Some(time);
        }
    }

    #[tokio::test]
    #[ignore = "Requires database setup"]
    async fn test_create_insert_select_cycle() {
        let db = live_database();
        let tool = RunSql::new(Arc::clone(&db));
        let table = format!("content_test_{}", uuid::Uuid::new_v4().simple());

        let created = tool
            .run(&format!(
                "CREATE TABLE IF NOT EXISTS {} (id SERIAL PRIMARY KEY, title TEXT NOT NULL)",
                table
            ))
            .await;
        assert_eq!(created.to_json()["command"], "CREATE");

        let inserted = tool
            .run(&format!(
                "INSERT INTO {} (title) VALUES ('Rain Note') RETURNING id",
                table
            ))
            .await
            .to_json();
        assert_eq!(inserted["message"], "Inserted 1 row(s)");
        assert!(inserted["insertedId"].is_i64());

        let selected = tool.run(&format!("select * from {}", table)).await.to_json();
        assert_eq!(selected["rowCount"], 1);
        assert_eq!(selected["rows"][0]["title"], "Rain Note");

        let dropped = tool.run(&format!("DROP TABLE {}", table)).await;
        assert!(dropped.is_success());
        assert_eq!(db.stats().opened(), db.stats().closed());
    }
}
