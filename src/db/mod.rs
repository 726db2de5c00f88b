//! PostgreSQL access for the SQL tools.
//!
//! Every tool invocation gets its own [`Session`]. Under the default
//! [`ConnectionPolicy::PerCall`] a session is a fresh connection that is
//! closed as soon as the statement finishes; [`ConnectionPolicy::Pooled`]
//! checks connections out of a bounded pool instead.

mod rows;
mod statement;

pub use rows::row_to_json;
pub use statement::StatementKind;

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::TryStreamExt;
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{Connection, Either, PgConnection, PgPool, Postgres};
use thiserror::Error;
use tracing::{debug, info, warn};

/// How database connections are obtained for tool calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPolicy {
    /// Open a new connection for every statement and close it afterwards.
    PerCall,
    /// Check connections out of a shared pool.
    Pooled { max_connections: u32 },
}

impl ConnectionPolicy {
    /// Parse a policy name (`per_call` or `pooled`).
    pub fn parse(value: &str, pool_size: u32) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "per_call" | "per-call" | "percall" => Some(Self::PerCall),
            "pooled" | "pool" => Some(Self::Pooled {
                max_connections: pool_size.max(1),
            }),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConnectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PerCall => write!(f, "per_call"),
            Self::Pooled { max_connections } => write!(f, "pooled({})", max_connections),
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),

    #[error("{0}")]
    Connect(String),

    #[error("{0}")]
    Query(String),
}

/// Output of one statement: rows returned plus the server's affected-row count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementOutput {
    pub rows: Vec<Value>,
    pub rows_affected: u64,
}

/// Counters for session lifecycle, exposed for diagnostics and tests.
#[derive(Debug, Default)]
pub struct SessionStats {
    opened: AtomicU64,
    closed: AtomicU64,
}

impl SessionStats {
    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> u64 {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Handle to the content database.
pub struct Database {
    options: PgConnectOptions,
    policy: ConnectionPolicy,
    pool: Option<PgPool>,
    stats: Arc<SessionStats>,
}

impl Database {
    /// Build a database handle. No connection is opened until the first session.
    pub fn new(url: &str, policy: ConnectionPolicy) -> Result<Self, DbError> {
        // TLS is always on and the server certificate is never verified,
        // whatever `sslmode` the URL asks for.
        let options = PgConnectOptions::from_str(url)
            .map_err(|e| DbError::InvalidUrl(e.to_string()))?
            .ssl_mode(PgSslMode::Require);

        let pool = match policy {
            ConnectionPolicy::PerCall => None,
            ConnectionPolicy::Pooled { max_connections } => Some(
                PgPoolOptions::new()
                    .max_connections(max_connections)
                    .acquire_timeout(Duration::from_secs(30))
                    .idle_timeout(Duration::from_secs(600))
                    .connect_lazy_with(options.clone()),
            ),
        };

        info!(
            "Database configured: {} (policy: {})",
            mask_database_url(url),
            policy
        );

        Ok(Self {
            options,
            policy,
            pool,
            stats: Arc::new(SessionStats::default()),
        })
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Obtain a session for exactly one tool call.
    pub async fn session(&self) -> Result<Session, DbError> {
        let handle = match &self.pool {
            Some(pool) => SessionHandle::Pooled(
                pool.acquire()
                    .await
                    .map_err(|e| DbError::Connect(e.to_string()))?,
            ),
            None => SessionHandle::Owned(
                PgConnection::connect_with(&self.options)
                    .await
                    .map_err(|e| DbError::Connect(e.to_string()))?,
            ),
        };
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        debug!("Database session opened ({})", self.policy);

        Ok(Session {
            handle,
            stats: Arc::clone(&self.stats),
        })
    }

    /// Run a single statement in its own session.
    ///
    /// The session is released before returning, whether or not the
    /// statement succeeded.
    pub async fn run(&self, sql: &str) -> Result<StatementOutput, DbError> {
        let mut session = self.session().await?;
        let result = session.execute(sql).await;
        session.close().await;
        result
    }
}

enum SessionHandle {
    Owned(PgConnection),
    Pooled(PoolConnection<Postgres>),
}

/// A single-use database session.
pub struct Session {
    handle: SessionHandle,
    stats: Arc<SessionStats>,
}

impl Session {
    fn connection(&mut self) -> &mut PgConnection {
        match &mut self.handle {
            SessionHandle::Owned(conn) => conn,
            SessionHandle::Pooled(conn) => &mut **conn,
        }
    }

    /// Execute one statement over the simple query protocol.
    pub async fn execute(&mut self, sql: &str) -> Result<StatementOutput, DbError> {
        let mut output = StatementOutput::default();
        let mut stream = sqlx::raw_sql(sql).fetch_many(self.connection());

        while let Some(item) = stream
            .try_next()
            .await
            .map_err(|e| DbError::Query(e.to_string()))?
        {
            match item {
                Either::Left(done) => output.rows_affected += done.rows_affected(),
                Either::Right(row) => output.rows.push(row_to_json(&row)),
            }
        }

        Ok(output)
    }

    /// Release the session. Close failures are logged and swallowed.
    pub async fn close(self) {
        let Session { handle, stats } = self;
        match handle {
            SessionHandle::Owned(conn) => {
                if let Err(e) = conn.close().await {
                    warn!("Error closing database connection: {}", e);
                }
            }
            // Dropping returns the connection to the pool.
            SessionHandle::Pooled(conn) => drop(conn),
        }
        stats.closed.fetch_add(1, Ordering::SeqCst);
        debug!("Database session closed");
    }
}

/// Mask the password in a database URL for logging.
pub fn mask_database_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("****"));
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<invalid url>".to_string(),
    }
}


/// Tests against a live PostgreSQL server (TLS enabled) named by `TEST_DATABASE_URL`.
/// Run with `cargo test -- --ignored`.
#[cfg(test)]
mod live_tests {
    use super::*;

    fn live_database(policy: ConnectionPolicy) -> Database {
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
        Database::new(&url, policy).expect("valid TEST_DATABASE_URL")
    }

    #[tokio::test]
    #[ignore = "Requires database setup"]
    async fn test_select_rows_and_session_closed_once() {
        let db = live_database(ConnectionPolicy::PerCall);
        let output = db
            .run("SELECT 1::int4 AS one, 'a'::text AS letter UNION ALL SELECT 2, 'b'")
            .await
            .unwrap();
        assert_eq!(output.rows.len(), 2);
        assert_eq!(output.rows[0]["one"], 1);
        assert_eq!(output.rows[1]["letter"], "b");
        assert_eq!(db.stats().opened(), 1);
        assert_eq!(db.stats().closed(), 1);
    }

    #[tokio::test]
    #[ignore = "Requires database setup"]
    async fn test_failed_statement_still_closes() {
        let db = live_database(ConnectionPolicy::PerCall);
        let err = db.run("SELEC nonsense").await.unwrap_err();
        assert!(matches!(err, DbError::Query(_)));
        assert_eq!(db.stats().opened(), 1);
        assert_eq!(db.stats().closed(), 1);
    }

    #[tokio::test]
    #[ignore = "Requires database setup"]
    async fn test_pooled_policy_runs_statements() {
        let db = live_database(ConnectionPolicy::Pooled { max_connections: 2 });
        for _ in 0..4 {
            let output = db.run("SELECT NOW() AS server_time").await.unwrap();
            assert_eq!(output.rows.len(), 1);
        }
        assert_eq!(db.stats().opened(), 4);
        assert_eq!(db.stats().closed(), 4);
    }
}
