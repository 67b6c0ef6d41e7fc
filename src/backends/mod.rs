//! Database backend implementations
//!
//! This module contains the pooled implementations of the Database trait. PostgreSQL
//! is the production store; SQLite runs the same statements for local development and
//! the test suite.

#[cfg(feature = "sqlite")]
pub mod pooled_sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "sqlite")]
pub use pooled_sqlite::{PooledSqliteDatabase, PooledTransaction};

#[cfg(feature = "postgres")]
pub use postgres::{PostgresDatabase, PostgresTransaction};
