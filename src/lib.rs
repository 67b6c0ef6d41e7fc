//! # Student Records
//!
//! An HTTP API over a student/course/marks schema. The interesting part is the data
//! access layer: a query builder that only ever produces parameterized statements, a
//! pooled connection provider with PostgreSQL and SQLite backends, and transactional
//! coordination for the cascading student delete.
//!
//! ## Layout
//!
//! ```text
//! src/
//! ├── core/          # Database trait, transactions, values, query builder, errors
//! ├── backends/      # Pooled PostgreSQL and SQLite implementations
//! ├── records/       # Record operations, pagination, table names
//! ├── api/           # axum handlers, router, error → status mapping
//! ├── config.rs      # TOML + environment configuration
//! ├── logging.rs     # tracing subscriber setup
//! └── server.rs      # Pool bootstrap and graceful shutdown
//! ```
//!
//! ## Using the repository directly
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use student_records::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let db = PooledSqliteDatabase::new("students.db", PoolConfig::default()).await?;
//!     ensure_sqlite_schema(&db).await?;
//!
//!     let repo = Repository::new(Arc::new(db), Tables::new(None));
//!     let page = repo.list_students(&PageRequest::new(1, 5, "ann")).await?;
//!     println!("{} matching students", page.total_count);
//!     Ok(())
//! }
//! ```

/// Core database layer types and traits
pub mod core;

/// Database backend implementations
pub mod backends;

pub mod api;
pub mod config;
pub mod logging;
pub mod records;
pub mod server;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::core::{
        ConnectionBuilder, Database, DatabaseError, DatabaseResult, DatabaseRow, DatabaseType,
        DatabaseValue, PoolConfig, Result, Transaction,
    };
    pub use crate::records::{
        ensure_sqlite_schema, NewCourse, NewMark, NewStudent, PageRequest, RecordError,
        Repository, Tables,
    };

    #[cfg(feature = "postgres")]
    pub use crate::backends::PostgresDatabase;
    #[cfg(feature = "sqlite")]
    pub use crate::backends::PooledSqliteDatabase;
}

// Re-export at root level for convenience
pub use crate::core::{
    ConnectionBuilder, Database, DatabaseError, DatabaseResult, DatabaseRow, DatabaseType,
    DatabaseValue, Result,
};
