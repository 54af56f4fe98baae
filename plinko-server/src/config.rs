//! CLI and environment configuration for the Plinko PIR server.
//!
//! Every field can be set via an environment variable or overridden on the
//! command line; `clap`'s own precedence rules mean an explicit CLI flag
//! always wins over its `env` fallback.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("invalid port: {0}")]
    InvalidPort(u16),
    #[error("database path cannot be empty")]
    EmptyDatabasePath,
    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl FromStr for LogLevel {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            other => Err(ConfigurationError::InvalidLogLevel(other.to_string())),
        }
    }
}

impl LogLevel {
    pub fn as_tracing_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
            LogLevel::Critical => "error",
        }
    }
}

/// Plinko PIR server configuration, loaded from CLI flags with environment
/// variable fallbacks.
#[derive(Debug, Parser)]
#[command(name = "plinko-server", about = "Plinko PIR query server")]
pub struct Config {
    /// TCP port to listen on.
    #[arg(long, env = "PLINKO_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Path to the binary database snapshot.
    #[arg(long, env = "PLINKO_DATABASE_PATH", default_value = "data/database.bin")]
    pub database_path: PathBuf,

    /// Seconds to wait for the database file to appear before giving up.
    /// `0` means check once and fail immediately if it is absent.
    #[arg(long, env = "PLINKO_DATABASE_TIMEOUT", default_value_t = 60)]
    pub database_wait_timeout_secs: u64,

    /// Log level: DEBUG, INFO, WARNING, ERROR, or CRITICAL.
    #[arg(long, env = "PLINKO_LOG_LEVEL", default_value = "INFO")]
    pub log_level: String,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.port == 0 {
            return Err(ConfigurationError::InvalidPort(self.port));
        }
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigurationError::EmptyDatabasePath);
        }
        self.log_level_parsed()?;
        Ok(())
    }

    pub fn log_level_parsed(&self) -> Result<LogLevel, ConfigurationError> {
        self.log_level.parse()
    }

    pub fn database_wait_timeout(&self) -> Option<Duration> {
        if self.database_wait_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.database_wait_timeout_secs))
        }
    }

    pub fn listen_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            port: 8080,
            database_path: PathBuf::from("data/database.bin"),
            database_wait_timeout_secs: 60,
            log_level: "INFO".to_string(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut config = base_config();
        config.port = 0;
        assert_eq!(config.validate().unwrap_err(), ConfigurationError::InvalidPort(0));
    }

    #[test]
    fn empty_database_path_is_rejected() {
        let mut config = base_config();
        config.database_path = PathBuf::new();
        assert_eq!(config.validate().unwrap_err(), ConfigurationError::EmptyDatabasePath);
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let mut config = base_config();
        config.log_level = "VERBOSE".to_string();
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigurationError::InvalidLogLevel(_)
        ));
    }

    #[test]
    fn log_level_is_case_insensitive() {
        let mut config = base_config();
        config.log_level = "warning".to_string();
        assert_eq!(config.log_level_parsed().unwrap(), LogLevel::Warning);
    }

    #[test]
    fn zero_timeout_means_no_wait() {
        let mut config = base_config();
        config.database_wait_timeout_secs = 0;
        assert_eq!(config.database_wait_timeout(), None);
    }

    #[test]
    fn listen_address_binds_all_interfaces() {
        let config = base_config();
        assert_eq!(config.listen_address(), "0.0.0.0:8080");
    }
}
