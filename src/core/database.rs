//! Database trait and connection management
//!
//! This module defines the connection-provider contract every pooled backend implements,
//! plus the builder used to render connection strings from configuration.

use super::database_types::DatabaseType;
use super::error::Result;
use super::query_builder::Statement;
use super::transaction::Transaction;
use super::value::{DatabaseResult, DatabaseValue};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Default timeout for database operations (30 seconds)
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Pool configuration shared by the pooled backends
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: usize,
    /// Timeout for acquiring a connection from the pool
    pub timeout: Duration,
    /// Timeout for database operations (query, execute, etc.)
    pub operation_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 16,
            timeout: Duration::from_secs(5),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

impl PoolConfig {
    /// Set maximum pool size
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Set connection acquisition timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set database operation timeout (for query, execute, etc.)
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

/// Pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Upper bound on open connections
    pub max_size: usize,
    /// Total number of connections currently open
    pub size: usize,
    /// Number of idle connections ready to be leased
    pub available: usize,
    /// Number of callers waiting for a connection
    pub waiting: usize,
}

/// Pooled connection provider
///
/// Every call leases one connection from the pool for the duration of the call and
/// returns it on all exit paths, errors included. Multi-statement work that must see
/// a single connection goes through [`Database::begin`].
///
/// The trait is object safe; the service holds it as `Arc<dyn Database>`.
#[async_trait]
pub trait Database: Send + Sync {
    /// Get the database type
    fn database_type(&self) -> DatabaseType;

    /// Lease a connection and verify the server answers
    async fn ping(&self) -> Result<()>;

    /// Run one or more statements without parameters
    ///
    /// # Security Warning
    ///
    /// **SQL Injection Risk**: the text is sent as-is. This exists for schema fixtures
    /// and administrative scripts; anything carrying caller input goes through
    /// [`Database::query_with_params`] or [`Database::execute_with_params`].
    async fn execute_batch(&self, sql: &str) -> Result<()>;

    /// Execute a parameterized statement and return its rows
    async fn query_with_params(
        &self,
        query: &str,
        params: &[DatabaseValue],
    ) -> Result<DatabaseResult>;

    /// Execute a parameterized statement and return the number of affected rows
    async fn execute_with_params(&self, query: &str, params: &[DatabaseValue]) -> Result<u64>;

    /// Begin a transaction pinned to one pooled connection
    async fn begin(&self) -> Result<Box<dyn Transaction>>;

    /// Current pool statistics
    fn stats(&self) -> PoolStats;

    /// Stop handing out connections and close idle ones
    fn close(&self);

    /// Run a built statement and return its rows
    async fn query_statement(&self, statement: &Statement) -> Result<DatabaseResult> {
        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "query");
        self.query_with_params(&statement.sql, &statement.params)
            .await
    }

    /// Run a built statement and return the number of affected rows
    async fn execute_statement(&self, statement: &Statement) -> Result<u64> {
        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "execute");
        self.execute_with_params(&statement.sql, &statement.params)
            .await
    }
}

/// Database connection builder
#[derive(Debug, Clone)]
pub struct ConnectionBuilder {
    db_type: DatabaseType,
    host: Option<String>,
    port: Option<u16>,
    database: Option<String>,
    username: Option<String>,
    password: Option<String>,
    options: std::collections::BTreeMap<String, String>,
}

/// Quote a libpq `key=value` value when it needs it
fn quote_conninfo_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '\'' || c == '\\');
    if !needs_quotes {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

impl ConnectionBuilder {
    /// Create a new connection builder for the specified database type
    pub fn new(db_type: DatabaseType) -> Self {
        Self {
            db_type,
            host: None,
            port: None,
            database: None,
            username: None,
            password: None,
            options: std::collections::BTreeMap::new(),
        }
    }

    /// Set the database host
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the database port
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the database name (file path for SQLite)
    pub fn database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the username
    pub fn username<S: Into<String>>(mut self, username: S) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password
    pub fn password<S: Into<String>>(mut self, password: S) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Add a custom option
    pub fn option<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Get the database type this builder targets
    pub fn database_type(&self) -> DatabaseType {
        self.db_type
    }

    /// Host for error reporting
    pub fn host_name(&self) -> &str {
        self.host.as_deref().unwrap_or("localhost")
    }

    /// Port for error reporting
    pub fn port_number(&self) -> u16 {
        self.port.unwrap_or(5432)
    }

    /// Build the connection string
    pub fn build_connection_string(&self) -> String {
        self.render(false)
    }

    /// Build the connection string with the password masked, for logs
    pub fn build_redacted_connection_string(&self) -> String {
        self.render(true)
    }

    fn render(&self, redact: bool) -> String {
        match self.db_type {
            DatabaseType::Sqlite => self
                .database
                .clone()
                .unwrap_or_else(|| ":memory:".to_string()),
            DatabaseType::Postgres => {
                let mut parts = Vec::new();
                if let Some(host) = &self.host {
                    parts.push(format!("host={}", quote_conninfo_value(host)));
                }
                if let Some(port) = self.port {
                    parts.push(format!("port={}", port));
                }
                if let Some(database) = &self.database {
                    parts.push(format!("dbname={}", quote_conninfo_value(database)));
                }
                if let Some(username) = &self.username {
                    parts.push(format!("user={}", quote_conninfo_value(username)));
                }
                if let Some(password) = &self.password {
                    let password = if redact { "***" } else { password.as_str() };
                    parts.push(format!("password={}", quote_conninfo_value(password)));
                }
                for (key, value) in &self.options {
                    parts.push(format!("{}={}", key, quote_conninfo_value(value)));
                }
                parts.join(" ")
            }
        }
    }
}
