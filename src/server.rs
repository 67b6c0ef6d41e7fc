//! Server bootstrap
//!
//! Opens the configured pool, serves the router, and on Ctrl+C/SIGTERM drains
//! in-flight requests before closing the pool.

use crate::api::{self, AppState};
use crate::config::{AppConfig, ConfigError, DatabaseConfig};
use crate::core::{Database, DatabaseError, DatabaseType};
use crate::records::Repository;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Open the pool for the configured backend
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn Database>, DatabaseError> {
    match config.backend {
        DatabaseType::Postgres => connect_postgres(config),
        DatabaseType::Sqlite => connect_sqlite(config).await,
    }
}

#[cfg(feature = "postgres")]
fn connect_postgres(config: &DatabaseConfig) -> Result<Arc<dyn Database>, DatabaseError> {
    let db = crate::backends::PostgresDatabase::new(
        &config.connection_builder(),
        config.pool_config(),
    )?;
    Ok(Arc::new(db))
}

#[cfg(not(feature = "postgres"))]
fn connect_postgres(_config: &DatabaseConfig) -> Result<Arc<dyn Database>, DatabaseError> {
    Err(DatabaseError::config(
        "PostgreSQL support is not enabled in this build",
    ))
}

#[cfg(feature = "sqlite")]
async fn connect_sqlite(config: &DatabaseConfig) -> Result<Arc<dyn Database>, DatabaseError> {
    let db =
        crate::backends::PooledSqliteDatabase::new(&config.sqlite_path, config.pool_config())
            .await?;
    crate::records::ensure_sqlite_schema(&db).await?;
    Ok(Arc::new(db))
}

#[cfg(not(feature = "sqlite"))]
async fn connect_sqlite(_config: &DatabaseConfig) -> Result<Arc<dyn Database>, DatabaseError> {
    Err(DatabaseError::config("SQLite support is not enabled in this build"))
}

/// Run the HTTP server until a shutdown signal arrives
pub async fn run(config: AppConfig) -> Result<(), ServerError> {
    let addr = config.server.bind_addr()?;

    tracing::info!(
        backend = %config.database.backend,
        target = %config.database.connection_builder().build_redacted_connection_string(),
        "Opening database pool"
    );
    let db = connect(&config.database).await?;
    if let Err(e) = db.ping().await {
        tracing::warn!(error = %e, "Database not reachable at startup");
    }

    let repo = Repository::new(Arc::clone(&db), config.database.tables());
    let app = api::router(AppState::new(repo));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server is running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close();
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn sqlite_backend_bootstraps_schema() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = DatabaseConfig {
            backend: DatabaseType::Sqlite,
            sqlite_path: dir.path().join("server.db"),
            ..DatabaseConfig::default()
        };

        let db = connect(&config).await.unwrap();
        db.ping().await.unwrap();
        let rows = db
            .query_with_params("SELECT COUNT(*) AS count FROM students", &[])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        db.close();
    }

    #[cfg(feature = "postgres")]
    #[tokio::test]
    async fn unreachable_postgres_is_a_connection_error() {
        let config = DatabaseConfig {
            port: 1,
            acquire_timeout_secs: 2,
            ..DatabaseConfig::default()
        };

        // Pool construction is lazy; the failure shows on first use.
        let db = connect(&config).await.unwrap();
        let err = db.ping().await.unwrap_err();
        assert!(err.is_connection_error(), "unexpected error: {}", err);
    }
}
