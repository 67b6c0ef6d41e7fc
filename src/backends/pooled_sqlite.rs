//! Pooled SQLite database backend implementation
//!
//! This module provides a connection-pooled SQLite implementation of the Database trait
//! using deadpool-sqlite. It runs the same `$n` statements the PostgreSQL backend does:
//! SQLite treats `$1` as a named parameter and numbers distinct names by first
//! appearance, so positional binding lines up with the builder's numbering.
//!
//! A pool needs a database file; `:memory:` would give every pooled connection its own
//! private database.

use crate::core::{
    database::{Database, PoolConfig, PoolStats},
    database_types::DatabaseType,
    error::{DatabaseError, Result},
    transaction::{Transaction, TransactionState},
    value::{DatabaseResult, DatabaseRow, DatabaseValue, DATE_FORMAT},
};
use async_trait::async_trait;
use deadpool_sqlite::{Config, Object, Pool, PoolError, Runtime};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection, Row};
use std::path::Path;
use std::time::Duration;

/// Pooled SQLite database implementation
///
/// # Example
///
/// ```no_run
/// use student_records::backends::PooledSqliteDatabase;
/// use student_records::core::{Database, PoolConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db = PooledSqliteDatabase::new("students.db", PoolConfig::default()).await?;
///     db.execute_batch("CREATE TABLE IF NOT EXISTS t (id INTEGER PRIMARY KEY)").await?;
///     Ok(())
/// }
/// ```
pub struct PooledSqliteDatabase {
    pool: Pool,
    acquire_timeout: Duration,
    operation_timeout: Duration,
}

impl PooledSqliteDatabase {
    /// Create a pool over the database file at `path`
    ///
    /// # Errors
    ///
    /// Returns error if pool creation or initialization fails
    pub async fn new(path: impl AsRef<Path>, config: PoolConfig) -> Result<Self> {
        let path = path.as_ref();
        let pool = Config::new(path)
            .builder(Runtime::Tokio1)
            .map_err(|e| DatabaseError::config(format!("Invalid SQLite settings: {}", e)))?
            .max_size(config.max_size)
            .wait_timeout(Some(config.timeout))
            .create_timeout(Some(config.timeout))
            .build()
            .map_err(|e| DatabaseError::connection(format!("Failed to create pool: {}", e)))?;

        let db = Self {
            pool,
            acquire_timeout: config.timeout,
            operation_timeout: config.operation_timeout,
        };

        // journal_mode is stored in the file, so one connection is enough
        let conn = db.acquire().await?;
        interact(&conn, db.operation_timeout, |conn| {
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
        })
        .await?;

        tracing::info!(
            path = %path.display(),
            max_size = config.max_size,
            "SQLite pool created"
        );

        Ok(db)
    }

    async fn acquire(&self) -> Result<Object> {
        self.pool.get().await.map_err(|e| self.pool_error(e))
    }

    fn pool_error(&self, error: PoolError) -> DatabaseError {
        match error {
            PoolError::Timeout(_) => {
                let status = self.pool.status();
                if status.available == 0 && status.size >= status.max_size {
                    DatabaseError::pool_exhausted(status.size, status.max_size)
                } else {
                    DatabaseError::connection_timeout(self.acquire_timeout.as_millis() as u64)
                }
            }
            PoolError::Backend(e) => DatabaseError::SqliteError(e),
            PoolError::Closed => DatabaseError::connection("Connection pool is closed"),
            other => DatabaseError::connection(format!("Failed to acquire connection: {}", other)),
        }
    }
}

/// Run `f` on the pooled connection's worker thread, bounded by `timeout`
async fn interact<T, F>(conn: &Object, timeout: Duration, f: F) -> Result<T>
where
    F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::time::timeout(
        timeout,
        conn.interact(move |conn| {
            // Per connection and off by default; a no-op inside an open transaction.
            conn.pragma_update(None, "foreign_keys", true)?;
            f(conn)
        }),
    )
    .await
    .map_err(|_| DatabaseError::query_timeout(timeout.as_millis() as u64))?
    .map_err(|e| DatabaseError::other(format!("Interact error: {}", e)))?
    .map_err(DatabaseError::from)
}

async fn run_query(
    conn: &Object,
    timeout: Duration,
    query: &str,
    params: &[DatabaseValue],
) -> Result<DatabaseResult> {
    let query = query.to_string();
    let params: Vec<Value> = params.iter().map(to_sqlite_value).collect();

    interact(conn, timeout, move |conn| {
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), row_to_database_row)?;
        rows.collect()
    })
    .await
}

async fn run_execute(
    conn: &Object,
    timeout: Duration,
    query: &str,
    params: &[DatabaseValue],
) -> Result<u64> {
    let query = query.to_string();
    let params: Vec<Value> = params.iter().map(to_sqlite_value).collect();

    interact(conn, timeout, move |conn| {
        let mut stmt = conn.prepare(&query)?;
        stmt.execute(params_from_iter(params.iter()))
    })
    .await
    .map(|affected| affected as u64)
}

async fn run_batch(conn: &Object, timeout: Duration, sql: &str) -> Result<()> {
    let sql = sql.to_string();
    interact(conn, timeout, move |conn| conn.execute_batch(&sql)).await
}

/// Convert a rusqlite Row to a DatabaseRow
fn row_to_database_row(row: &Row) -> rusqlite::Result<DatabaseRow> {
    let mut db_row = DatabaseRow::new();
    let column_count = row.as_ref().column_count();

    for i in 0..column_count {
        let column_name = row.as_ref().column_name(i)?.to_string();
        let value = match row.get_ref(i)? {
            ValueRef::Null => DatabaseValue::Null,
            ValueRef::Integer(v) => DatabaseValue::Long(v),
            ValueRef::Real(v) => DatabaseValue::Double(v),
            ValueRef::Text(v) => DatabaseValue::String(String::from_utf8_lossy(v).to_string()),
            ValueRef::Blob(v) => DatabaseValue::Bytes(v.to_vec()),
        };
        db_row.insert(column_name, value);
    }

    Ok(db_row)
}

/// Convert DatabaseValue to an owned SQLite value
///
/// Dates are stored as `YYYY-MM-DD` text.
fn to_sqlite_value(value: &DatabaseValue) -> Value {
    match value {
        DatabaseValue::Null => Value::Null,
        DatabaseValue::Bool(v) => Value::Integer(i64::from(*v)),
        DatabaseValue::Int(v) => Value::Integer(i64::from(*v)),
        DatabaseValue::Long(v) => Value::Integer(*v),
        DatabaseValue::Float(v) => Value::Real(f64::from(*v)),
        DatabaseValue::Double(v) => Value::Real(*v),
        DatabaseValue::Date(d) => Value::Text(d.format(DATE_FORMAT).to_string()),
        DatabaseValue::String(v) => Value::Text(v.clone()),
        DatabaseValue::Bytes(v) => Value::Blob(v.clone()),
        DatabaseValue::Timestamp(v) => Value::Integer(*v),
    }
}

#[async_trait]
impl Database for PooledSqliteDatabase {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    async fn ping(&self) -> Result<()> {
        let conn = self.acquire().await?;
        interact(&conn, self.operation_timeout, |conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))
        })
        .await
    }

    async fn execute_batch(&self, sql: &str) -> Result<()> {
        let conn = self.acquire().await?;
        run_batch(&conn, self.operation_timeout, sql).await
    }

    async fn query_with_params(
        &self,
        query: &str,
        params: &[DatabaseValue],
    ) -> Result<DatabaseResult> {
        let conn = self.acquire().await?;
        run_query(&conn, self.operation_timeout, query, params).await
    }

    async fn execute_with_params(&self, query: &str, params: &[DatabaseValue]) -> Result<u64> {
        let conn = self.acquire().await?;
        run_execute(&conn, self.operation_timeout, query, params).await
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let conn = self.acquire().await?;
        // IMMEDIATE takes the write lock up front so concurrent writers queue on the
        // busy timeout instead of failing on lock upgrade.
        let begun = run_batch(&conn, self.operation_timeout, "BEGIN IMMEDIATE TRANSACTION").await;
        if let Err(e) = begun {
            drop(Object::take(conn));
            return Err(DatabaseError::transaction(e.to_string()));
        }

        Ok(Box::new(PooledTransaction {
            connection: Some(conn),
            state: TransactionState::default(),
            operation_timeout: self.operation_timeout,
        }))
    }

    fn stats(&self) -> PoolStats {
        let status = self.pool.status();
        PoolStats {
            max_size: status.max_size,
            size: status.size,
            available: status.available,
            waiting: status.waiting,
        }
    }

    fn close(&self) {
        self.pool.close();
        tracing::info!("SQLite pool closed");
    }
}

/// Transaction guard for pooled connections
///
/// All statements run on the connection leased by [`Database::begin`]. If the guard is
/// dropped without commit or rollback, or if finishing fails, the connection is
/// detached from the pool; closing it makes SQLite roll the transaction back.
pub struct PooledTransaction {
    connection: Option<Object>,
    state: TransactionState,
    operation_timeout: Duration,
}

impl PooledTransaction {
    fn connection(&self) -> Result<&Object> {
        self.state.ensure_open()?;
        self.connection
            .as_ref()
            .ok_or_else(|| DatabaseError::transaction("Transaction already finalized"))
    }

    async fn finish(&mut self, sql: &str) -> Result<()> {
        self.state.ensure_open()?;
        let conn = self
            .connection
            .take()
            .ok_or_else(|| DatabaseError::transaction("Transaction connection missing"))?;

        match run_batch(&conn, self.operation_timeout, sql).await {
            Ok(()) => Ok(()),
            Err(e) => {
                drop(Object::take(conn));
                Err(DatabaseError::transaction(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl Transaction for PooledTransaction {
    async fn query_with_params(
        &mut self,
        query: &str,
        params: &[DatabaseValue],
    ) -> Result<DatabaseResult> {
        let conn = self.connection()?;
        run_query(conn, self.operation_timeout, query, params).await
    }

    async fn execute_with_params(
        &mut self,
        query: &str,
        params: &[DatabaseValue],
    ) -> Result<u64> {
        let conn = self.connection()?;
        run_execute(conn, self.operation_timeout, query, params).await
    }

    async fn commit(&mut self) -> Result<()> {
        let result = self.finish("COMMIT").await;
        self.state.mark_committed();
        result
    }

    async fn rollback(&mut self) -> Result<()> {
        let result = self.finish("ROLLBACK").await;
        self.state.mark_rolled_back();
        result
    }

    fn is_finished(&self) -> bool {
        self.state.is_finished()
    }
}

impl Drop for PooledTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.connection.take() {
            tracing::warn!(
                "PooledTransaction dropped without commit or rollback; \
                 detaching its connection so the transaction is rolled back"
            );
            drop(Object::take(conn));
        }
    }
}
