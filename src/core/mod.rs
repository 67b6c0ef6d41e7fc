//! Core database layer types and traits
//!
//! This module provides the fundamental building blocks for data access: error types,
//! the pooled connection-provider trait, transactions, value types, and the query builder.

pub mod database;
pub mod database_types;
pub mod error;
pub mod query_builder;
pub mod transaction;
pub mod value;

// Re-export commonly used types
pub use database::{ConnectionBuilder, Database, PoolConfig, PoolStats};
pub use database_types::DatabaseType;
pub use error::{DatabaseError, Result};
pub use query_builder::{DeleteBuilder, InsertBuilder, SelectBuilder, Statement, UpdateBuilder};
pub use transaction::Transaction;
pub use value::{DatabaseResult, DatabaseRow, DatabaseValue};
