//! PostgreSQL database backend implementation
//!
//! This module provides a pooled PostgreSQL implementation of the Database trait using
//! deadpool-postgres over tokio-postgres.
//!
//! Statements are prepared (and cached per connection) before they run, so each bound
//! value is coerced to the parameter type the server declared for it: a JSON integer
//! lands in an `int4` column, `"2004-01-01"` binds to a `date`, and `null` becomes a
//! NULL of the right type.

use crate::core::{
    database::{Database, PoolConfig, PoolStats},
    database_types::DatabaseType,
    error::{DatabaseError, Result},
    transaction::{Transaction, TransactionState},
    value::{DatabaseResult, DatabaseRow, DatabaseValue},
    ConnectionBuilder,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use deadpool_postgres::{ClientWrapper, Manager, ManagerConfig, Object, Pool, PoolError};
use deadpool_postgres::{RecyclingMethod, Runtime};
use rust_decimal::Decimal;
use std::time::Duration;
use tokio_postgres::types::{FromSql, ToSql, Type};
use tokio_postgres::{NoTls, Row};

type SqlParam = Box<dyn ToSql + Sync + Send>;

/// Pooled PostgreSQL database implementation
pub struct PostgresDatabase {
    pool: Pool,
    host: String,
    port: u16,
    acquire_timeout: Duration,
    operation_timeout: Duration,
}

impl PostgresDatabase {
    /// Create a pool for the server described by `builder`
    ///
    /// Connections are opened lazily on first use, so this succeeds even when the
    /// server is down; use [`Database::ping`] to check reachability.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection settings cannot be parsed or the pool
    /// cannot be built.
    pub fn new(builder: &ConnectionBuilder, config: PoolConfig) -> Result<Self> {
        let pg_config: tokio_postgres::Config = builder
            .build_connection_string()
            .parse()
            .map_err(|e: tokio_postgres::Error| {
                DatabaseError::config(format!("Invalid PostgreSQL settings: {}", e))
            })?;

        let mut manager_config = ManagerConfig::default();
        manager_config.recycling_method = RecyclingMethod::Fast;
        let manager = Manager::from_config(pg_config, NoTls, manager_config);

        let pool = Pool::builder(manager)
            .max_size(config.max_size)
            .wait_timeout(Some(config.timeout))
            .create_timeout(Some(config.timeout))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| {
                DatabaseError::connection_failed_with_source(
                    builder.host_name(),
                    builder.port_number(),
                    "Failed to build connection pool",
                    Box::new(e),
                )
            })?;

        tracing::info!(
            target = %builder.build_redacted_connection_string(),
            max_size = config.max_size,
            "PostgreSQL pool created"
        );

        Ok(Self {
            pool,
            host: builder.host_name().to_string(),
            port: builder.port_number(),
            acquire_timeout: config.timeout,
            operation_timeout: config.operation_timeout,
        })
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
            PoolError::Backend(e) => DatabaseError::connection_failed_with_source(
                self.host.clone(),
                self.port,
                "Failed to open connection",
                Box::new(e),
            ),
            PoolError::Closed => DatabaseError::connection("Connection pool is closed"),
            other => DatabaseError::connection(format!("Failed to acquire connection: {}", other)),
        }
    }
}

/// Prepare, bind and run a statement on one connection, returning raw rows
async fn run_query(
    client: &ClientWrapper,
    query: &str,
    params: &[DatabaseValue],
    operation_timeout: Duration,
) -> Result<Vec<Row>> {
    let work = async {
        let statement = client.prepare_cached(query).await?;
        let bound = bind_params(statement.params(), params)?;
        let param_refs: Vec<&(dyn ToSql + Sync)> = bound
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();
        client
            .query(&statement, &param_refs)
            .await
            .map_err(DatabaseError::from)
    };

    tokio::time::timeout(operation_timeout, work)
        .await
        .map_err(|_| DatabaseError::query_timeout(operation_timeout.as_millis() as u64))?
}

/// Like [`run_query`] but returns the affected row count
async fn run_execute(
    client: &ClientWrapper,
    query: &str,
    params: &[DatabaseValue],
    operation_timeout: Duration,
) -> Result<u64> {
    let work = async {
        let statement = client.prepare_cached(query).await?;
        let bound = bind_params(statement.params(), params)?;
        let param_refs: Vec<&(dyn ToSql + Sync)> = bound
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();
        client
            .execute(&statement, &param_refs)
            .await
            .map_err(DatabaseError::from)
    };

    tokio::time::timeout(operation_timeout, work)
        .await
        .map_err(|_| DatabaseError::query_timeout(operation_timeout.as_millis() as u64))?
}

async fn run_batch(client: &ClientWrapper, sql: &str, operation_timeout: Duration) -> Result<()> {
    tokio::time::timeout(operation_timeout, client.batch_execute(sql))
        .await
        .map_err(|_| DatabaseError::query_timeout(operation_timeout.as_millis() as u64))?
        .map_err(DatabaseError::from)
}

fn bind_params(types: &[Type], params: &[DatabaseValue]) -> Result<Vec<SqlParam>> {
    if types.len() != params.len() {
        return Err(DatabaseError::query(format!(
            "statement expects {} parameters, got {}",
            types.len(),
            params.len()
        )));
    }
    types
        .iter()
        .zip(params)
        .map(|(ty, value)| to_sql_param(value, ty))
        .collect()
}

/// Coerce a value to the parameter type the server declared
fn to_sql_param(value: &DatabaseValue, ty: &Type) -> Result<SqlParam> {
    let mismatch = || DatabaseError::type_mismatch(ty.name(), value.type_name());

    if value.is_null() {
        return Ok(typed_null(ty));
    }

    let param: SqlParam = match ty.name() {
        "bool" => Box::new(value.as_bool().ok_or_else(mismatch)?),
        "int2" => Box::new(
            value
                .as_long()
                .and_then(|v| i16::try_from(v).ok())
                .ok_or_else(mismatch)?,
        ),
        "int4" => Box::new(
            value
                .as_long()
                .and_then(|v| i32::try_from(v).ok())
                .ok_or_else(mismatch)?,
        ),
        "int8" => Box::new(value.as_long().ok_or_else(mismatch)?),
        "float4" => Box::new(value.as_float().ok_or_else(mismatch)?),
        "float8" => Box::new(value.as_double().ok_or_else(mismatch)?),
        "numeric" => Box::new(as_decimal(value).ok_or_else(mismatch)?),
        "date" => Box::new(value.as_date().ok_or_else(mismatch)?),
        "timestamptz" => Box::new(as_utc_timestamp(value).ok_or_else(mismatch)?),
        "timestamp" => Box::new(
            as_utc_timestamp(value)
                .map(|ts| ts.naive_utc())
                .ok_or_else(mismatch)?,
        ),
        "bytea" => Box::new(value.as_bytes().map(<[u8]>::to_vec).ok_or_else(mismatch)?),
        "text" | "varchar" | "bpchar" | "name" | "unknown" => match value {
            DatabaseValue::Bytes(_) => return Err(mismatch()),
            other => Box::new(other.as_string()),
        },
        _ => return Err(mismatch()),
    };
    Ok(param)
}

fn as_decimal(value: &DatabaseValue) -> Option<Decimal> {
    match value {
        DatabaseValue::Int(v) => Some(Decimal::from(*v)),
        DatabaseValue::Long(v) => Some(Decimal::from(*v)),
        DatabaseValue::Float(v) => Decimal::try_from(*v).ok(),
        DatabaseValue::Double(v) => Decimal::try_from(*v).ok(),
        DatabaseValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_utc_timestamp(value: &DatabaseValue) -> Option<DateTime<Utc>> {
    match value {
        DatabaseValue::Timestamp(micros) => DateTime::from_timestamp_micros(*micros),
        DatabaseValue::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        DatabaseValue::Date(d) => d.and_hms_opt(0, 0, 0).map(|ts| ts.and_utc()),
        _ => None,
    }
}

fn typed_null(ty: &Type) -> SqlParam {
    match ty.name() {
        "bool" => Box::new(None::<bool>),
        "int2" => Box::new(None::<i16>),
        "int4" => Box::new(None::<i32>),
        "int8" => Box::new(None::<i64>),
        "float4" => Box::new(None::<f32>),
        "float8" => Box::new(None::<f64>),
        "numeric" => Box::new(None::<Decimal>),
        "date" => Box::new(None::<NaiveDate>),
        "timestamp" => Box::new(None::<NaiveDateTime>),
        "timestamptz" => Box::new(None::<DateTime<Utc>>),
        "bytea" => Box::new(None::<Vec<u8>>),
        _ => Box::new(None::<String>),
    }
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize) -> Option<T> {
    row.try_get::<_, Option<T>>(idx).ok().flatten()
}

/// Convert a tokio_postgres Row to a DatabaseRow
///
/// Columns of a type this layer cannot decode come back as `Null` rather than failing
/// the whole row.
fn row_to_database_row(row: &Row) -> DatabaseRow {
    let mut db_row = DatabaseRow::new();

    for (idx, column) in row.columns().iter().enumerate() {
        let value = match column.type_().name() {
            "bool" => get::<bool>(row, idx).map(DatabaseValue::Bool),
            "int2" => get::<i16>(row, idx).map(|v| DatabaseValue::Int(v as i32)),
            "int4" => get::<i32>(row, idx).map(DatabaseValue::Int),
            "int8" => get::<i64>(row, idx).map(DatabaseValue::Long),
            "float4" => get::<f32>(row, idx).map(DatabaseValue::Float),
            "float8" => get::<f64>(row, idx).map(DatabaseValue::Double),
            "numeric" => get::<Decimal>(row, idx).map(|d| DatabaseValue::String(d.to_string())),
            "date" => get::<NaiveDate>(row, idx).map(DatabaseValue::Date),
            "timestamp" => get::<NaiveDateTime>(row, idx)
                .map(|ts| DatabaseValue::Timestamp(ts.and_utc().timestamp_micros())),
            "timestamptz" => get::<DateTime<Utc>>(row, idx)
                .map(|ts| DatabaseValue::Timestamp(ts.timestamp_micros())),
            "bytea" => get::<Vec<u8>>(row, idx).map(DatabaseValue::Bytes),
            _ => get::<String>(row, idx).map(DatabaseValue::String),
        };
        db_row.insert(
            column.name().to_string(),
            value.unwrap_or(DatabaseValue::Null),
        );
    }

    db_row
}

#[async_trait]
impl Database for PostgresDatabase {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    async fn ping(&self) -> Result<()> {
        let conn = self.acquire().await?;
        run_batch(&conn, "SELECT 1", self.operation_timeout).await
    }

    async fn execute_batch(&self, sql: &str) -> Result<()> {
        let conn = self.acquire().await?;
        run_batch(&conn, sql, self.operation_timeout).await
    }

    async fn query_with_params(
        &self,
        query: &str,
        params: &[DatabaseValue],
    ) -> Result<DatabaseResult> {
        let conn = self.acquire().await?;
        let rows = run_query(&conn, query, params, self.operation_timeout).await?;
        Ok(rows.iter().map(row_to_database_row).collect())
    }

    async fn execute_with_params(&self, query: &str, params: &[DatabaseValue]) -> Result<u64> {
        let conn = self.acquire().await?;
        run_execute(&conn, query, params, self.operation_timeout).await
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let conn = self.acquire().await?;
        let begun = run_batch(&conn, "BEGIN", self.operation_timeout).await;
        if let Err(e) = begun {
            // The connection state is unknown; keep it out of the pool.
            drop(Object::take(conn));
            return Err(DatabaseError::transaction(e.to_string()));
        }

        Ok(Box::new(PostgresTransaction {
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
        tracing::info!("PostgreSQL pool closed");
    }
}

/// Transaction holding one pooled PostgreSQL connection
pub struct PostgresTransaction {
    connection: Option<Object>,
    state: TransactionState,
    operation_timeout: Duration,
}

impl PostgresTransaction {
    fn client(&self) -> Result<&Object> {
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

        match run_batch(&conn, sql, self.operation_timeout).await {
            Ok(()) => Ok(()),
            Err(e) => {
                drop(Object::take(conn));
                Err(DatabaseError::transaction(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn query_with_params(
        &mut self,
        query: &str,
        params: &[DatabaseValue],
    ) -> Result<DatabaseResult> {
        let conn = self.client()?;
        let rows = run_query(conn, query, params, self.operation_timeout).await?;
        Ok(rows.iter().map(row_to_database_row).collect())
    }

    async fn execute_with_params(
        &mut self,
        query: &str,
        params: &[DatabaseValue],
    ) -> Result<u64> {
        let conn = self.client()?;
        run_execute(conn, query, params, self.operation_timeout).await
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

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.connection.take() {
            tracing::warn!(
                "PostgresTransaction dropped without commit or rollback; \
                 detaching its connection so the server aborts the transaction"
            );
            drop(Object::take(conn));
        }
    }
}
