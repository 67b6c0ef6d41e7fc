//! Database type definitions
//!
//! This module defines the backends the service can run against and the SQL dialect
//! differences between them.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported database types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// PostgreSQL database
    #[default]
    Postgres,
    /// SQLite database
    Sqlite,
}

impl DatabaseType {
    /// Convert database type to string representation
    pub fn to_str(&self) -> &'static str {
        match self {
            DatabaseType::Postgres => "postgres",
            DatabaseType::Sqlite => "sqlite",
        }
    }

    /// Case-insensitive pattern match operator for this dialect
    ///
    /// SQLite has no `ILIKE`; its `LIKE` already ignores ASCII case.
    pub fn case_insensitive_like(&self) -> &'static str {
        match self {
            DatabaseType::Postgres => "ILIKE",
            DatabaseType::Sqlite => "LIKE",
        }
    }

    /// Whether tables are normally addressed through a named schema
    pub fn supports_schemas(&self) -> bool {
        matches!(self, DatabaseType::Postgres)
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for DatabaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(DatabaseType::Postgres),
            "sqlite" | "sqlite3" => Ok(DatabaseType::Sqlite),
            _ => Err(format!("Invalid database type: '{}'", s)),
        }
    }
}
