//! Configuration management
//!
//! This module handles loading and parsing configuration for Hearth.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Session configuration
    #[serde(default)]
    pub session: SessionConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/hearth.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Session configuration
///
/// `renewal_threshold_days` is the window before expiry in which a validated
/// session gets its expiry pushed out again. It must stay below
/// `duration_days`, otherwise every fresh session would renew immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Name of the cookie carrying the session token
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Total lifetime of a session in days
    #[serde(default = "default_duration_days")]
    pub duration_days: i64,
    /// Time before expiry (in days) that triggers renewal
    #[serde(default = "default_renewal_threshold_days")]
    pub renewal_threshold_days: i64,
    /// Whether the session cookie is marked `Secure`
    #[serde(default = "default_secure_cookie")]
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            duration_days: default_duration_days(),
            renewal_threshold_days: default_renewal_threshold_days(),
            secure_cookie: default_secure_cookie(),
        }
    }
}

fn default_cookie_name() -> String {
    "auth-session".to_string()
}

fn default_duration_days() -> i64 {
    30
}

fn default_renewal_threshold_days() -> i64 {
    15
}

fn default_secure_cookie() -> bool {
    true
}

/// Longest session lifetime accepted, in days
pub const MAX_SESSION_DAYS: i64 = 3650;

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - HEARTH_DATABASE_DRIVER
    /// - HEARTH_DATABASE_URL
    /// - HEARTH_SESSION_COOKIE_NAME
    /// - HEARTH_SESSION_DURATION_DAYS
    /// - HEARTH_SESSION_RENEWAL_THRESHOLD_DAYS
    /// - HEARTH_SESSION_SECURE_COOKIE
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        let session = &self.session;

        if session.cookie_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "session.cookie_name cannot be empty".to_string(),
            ));
        }
        if session.duration_days <= 0 {
            return Err(ConfigError::ValidationError(format!(
                "session.duration_days must be positive, got {}",
                session.duration_days
            )));
        }
        if session.duration_days > MAX_SESSION_DAYS {
            return Err(ConfigError::ValidationError(format!(
                "session.duration_days must be at most {}, got {}",
                MAX_SESSION_DAYS, session.duration_days
            )));
        }
        if session.renewal_threshold_days <= 0 {
            return Err(ConfigError::ValidationError(format!(
                "session.renewal_threshold_days must be positive, got {}",
                session.renewal_threshold_days
            )));
        }
        if session.renewal_threshold_days >= session.duration_days {
            return Err(ConfigError::ValidationError(format!(
                "session.renewal_threshold_days ({}) must be less than session.duration_days ({})",
                session.renewal_threshold_days, session.duration_days
            )));
        }

        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(driver) = std::env::var("HEARTH_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("HEARTH_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(name) = std::env::var("HEARTH_SESSION_COOKIE_NAME") {
            self.session.cookie_name = name;
        }
        if let Ok(days) = std::env::var("HEARTH_SESSION_DURATION_DAYS") {
            if let Ok(days) = days.parse::<i64>() {
                self.session.duration_days = days;
            }
        }
        if let Ok(days) = std::env::var("HEARTH_SESSION_RENEWAL_THRESHOLD_DAYS") {
            if let Ok(days) = days.parse::<i64>() {
                self.session.renewal_threshold_days = days;
            }
        }
        if let Ok(secure) = std::env::var("HEARTH_SESSION_SECURE_COOKIE") {
            if let Ok(secure) = secure.parse::<bool>() {
                self.session.secure_cookie = secure;
            }
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
