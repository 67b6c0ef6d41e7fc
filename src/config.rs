//! Service configuration loading and validation
//!
//! Configuration starts from built-in defaults, is optionally replaced by a TOML file,
//! and is then overridden by environment variables (a `.env` file is loaded into the
//! environment by the binary before this runs).

use crate::core::{ConnectionBuilder, DatabaseType, PoolConfig};
use crate::records::{Tables, DEFAULT_SCHEMA};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {var}: '{value}'")]
    InvalidEnv { var: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// Address to bind the listener to
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = IpAddr::from_str(&self.host).map_err(|_| {
            ConfigError::Invalid(format!("host is not an IP address: {}", self.host))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: DatabaseType,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub dbname: String,
    /// Schema holding the tables; ignored by SQLite
    pub schema: String,
    pub sqlite_path: PathBuf,
    pub max_connections: usize,
    pub acquire_timeout_secs: u64,
    pub operation_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseType::Postgres,
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: None,
            dbname: "postgres".to_string(),
            schema: DEFAULT_SCHEMA.to_string(),
            sqlite_path: PathBuf::from("student_records.db"),
            max_connections: 16,
            acquire_timeout_secs: 5,
            operation_timeout_secs: 30,
        }
    }
}

impl DatabaseConfig {
    /// Connection settings for the PostgreSQL backend
    pub fn connection_builder(&self) -> ConnectionBuilder {
        let builder = ConnectionBuilder::new(self.backend);
        match self.backend {
            DatabaseType::Sqlite => builder.database(self.sqlite_path.to_string_lossy()),
            DatabaseType::Postgres => {
                let builder = builder
                    .host(self.host.as_str())
                    .port(self.port)
                    .database(self.dbname.as_str())
                    .username(self.user.as_str())
                    .option("application_name", env!("CARGO_PKG_NAME"));
                match &self.password {
                    Some(password) => builder.password(password.as_str()),
                    None => builder,
                }
            }
        }
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::default()
            .with_max_size(self.max_connections)
            .with_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .with_operation_timeout(Duration::from_secs(self.operation_timeout_secs))
    }

    /// Table names, schema-qualified where the backend uses schemas
    pub fn tables(&self) -> Tables {
        if self.backend.supports_schemas() {
            Tables::new(Some(&self.schema))
        } else {
            Tables::new(None)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

fn parse_env<T: FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { var, value })
}

impl AppConfig {
    /// Load configuration: defaults or `path`, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply overrides from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("PORT") {
            self.server.port = parse_env("PORT", value)?;
        }
        if let Some(value) = lookup("HOST") {
            self.server.host = value;
        }
        if let Some(value) = lookup("DB_BACKEND") {
            self.database.backend = parse_env("DB_BACKEND", value)?;
        }
        if let Some(value) = lookup("DB_HOST") {
            self.database.host = value;
        }
        if let Some(value) = lookup("DB_PORT") {
            self.database.port = parse_env("DB_PORT", value)?;
        }
        if let Some(value) = lookup("DB_USER") {
            self.database.user = value;
        }
        if let Some(value) = lookup("DB_PASSWORD") {
            self.database.password = Some(value);
        }
        if let Some(value) = lookup("DB_NAME") {
            self.database.dbname = value;
        }
        if let Some(value) = lookup("DB_SCHEMA") {
            self.database.schema = value;
        }
        if let Some(value) = lookup("DB_SQLITE_PATH") {
            self.database.sqlite_path = PathBuf::from(value);
        }
        if let Some(value) = lookup("DB_MAX_CONNECTIONS") {
            self.database.max_connections = parse_env("DB_MAX_CONNECTIONS", value)?;
        }
        Ok(())
    }

    /// Apply command-line overrides; callers re-run [`AppConfig::validate`] afterwards
    pub fn apply_overrides(&mut self, port: Option<u16>, debug: bool, log_json: bool) {
        if let Some(port) = port {
            self.server.port = port;
        }
        if debug {
            self.logging.level = "debug".to_string();
        }
        if log_json {
            self.logging.format = "json".to_string();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server port must be non-zero".into()));
        }
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server host must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database max_connections must be at least 1".into(),
            ));
        }
        if self.database.acquire_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "database acquire_timeout_secs must be at least 1".into(),
            ));
        }
        if self.database.operation_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "database operation_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
