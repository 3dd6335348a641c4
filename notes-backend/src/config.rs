use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const PORT: &str = "PORT";
    pub const BIND_ADDRESS: &str = "BIND_ADDRESS";
    /// Storage backend to use: "sqlite" (default) or "mysql"
    pub const BACKEND: &str = "NOTES_BACKEND";
    pub const DB_PATH: &str = "DB_PATH";
    pub const DB_HOST: &str = "DB_HOST";
    pub const DB_PORT: &str = "DB_PORT";
    pub const DB_USER: &str = "DB_USER";
    pub const DB_PASS: &str = "DB_PASS";
    pub const DB_NAME: &str = "DB_NAME";
    /// Maximum number of pooled connections, applies to both backends
    pub const DB_POOL_SIZE: &str = "DB_POOL_SIZE";
    pub const PUBLIC_DIR: &str = "PUBLIC_DIR";
}

/// Default values
pub mod defaults {
    pub const PORT: u16 = 3000;
    pub const BIND_ADDRESS: &str = "0.0.0.0";
    pub const DB_PATH: &str = "./notesdb.sqlite";
    pub const DB_HOST: &str = "localhost";
    pub const DB_PORT: u16 = 3306;
    pub const DB_USER: &str = "root";
    pub const DB_PASS: &str = "";
    pub const DB_NAME: &str = "notesdb";
    pub const DB_POOL_SIZE: u32 = 10;
    pub const PUBLIC_DIR: &str = "public";
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has an invalid value: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("unknown storage backend {0:?} (expected \"sqlite\" or \"mysql\")")]
    UnknownBackend(String),
}

/// Which storage engine the service persists notes in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite,
    MySql,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "mysql" => Ok(Self::MySql),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

/// Connection settings for the networked backend
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub backend: StorageBackend,
    /// SQLite database file
    pub db_path: PathBuf,
    pub mysql: MySqlConfig,
    pub pool_size: u32,
    /// Static assets served at `/` when the directory exists
    pub public_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    /// Unset variables fall back to [`defaults`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string_or =
            |var: &str, default: &str| lookup(var).unwrap_or_else(|| default.to_string());

        let backend = match lookup(env_vars::BACKEND) {
            Some(value) => value.parse()?,
            None => StorageBackend::Sqlite,
        };

        let pool_size = parse_or(&lookup, env_vars::DB_POOL_SIZE, defaults::DB_POOL_SIZE)?;
        if pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                var: env_vars::DB_POOL_SIZE,
                value: "0".to_string(),
            });
        }

        Ok(Self {
            port: parse_or(&lookup, env_vars::PORT, defaults::PORT)?,
            bind_address: string_or(env_vars::BIND_ADDRESS, defaults::BIND_ADDRESS),
            backend,
            db_path: PathBuf::from(string_or(env_vars::DB_PATH, defaults::DB_PATH)),
            mysql: MySqlConfig {
                host: string_or(env_vars::DB_HOST, defaults::DB_HOST),
                port: parse_or(&lookup, env_vars::DB_PORT, defaults::DB_PORT)?,
                user: string_or(env_vars::DB_USER, defaults::DB_USER),
                password: string_or(env_vars::DB_PASS, defaults::DB_PASS),
                database: string_or(env_vars::DB_NAME, defaults::DB_NAME),
            },
            pool_size,
            public_dir: PathBuf::from(string_or(env_vars::PUBLIC_DIR, defaults::PUBLIC_DIR)),
        })
    }

    /// Human-readable location of the configured database, for startup logs.
    /// Never includes the password.
    pub fn database_location(&self) -> String {
        match self.backend {
            StorageBackend::Sqlite => self.db_path.display().to_string(),
            StorageBackend::MySql => format!(
                "mysql://{}@{}:{}/{}",
                self.mysql.user, self.mysql.host, self.mysql.port, self.mysql.database
            ),
        }
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        None => Ok(default),
    }
}
