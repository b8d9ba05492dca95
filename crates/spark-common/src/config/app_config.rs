//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file when present).

use super::RealtimeConfig;
use std::env;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app: AppSettings,
    pub realtime: RealtimeConfig,
    pub log: LogSettings,
}

/// General application settings
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub name: String,
    pub env: Environment,
}

/// Log output settings
#[derive(Debug, Clone, Copy)]
pub struct LogSettings {
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

fn default_app_name() -> String {
    "spark-client".to_string()
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    ///
    /// `from_env` delegates here; tests pass a map instead of mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = lookup("APP_ENV")
            .and_then(|s| Environment::parse(&s))
            .unwrap_or_default();

        let app = AppSettings {
            name: lookup("APP_NAME").unwrap_or_else(default_app_name),
            env,
        };

        let realtime = RealtimeConfig::from_lookup(&lookup)?;
        realtime.validate()?;

        let json = match lookup("LOG_FORMAT") {
            Some(format) => match format.to_lowercase().as_str() {
                "json" => true,
                "text" | "pretty" => false,
                other => return Err(ConfigError::InvalidValue("LOG_FORMAT", other.to_string())),
            },
            None => env.is_production(),
        };

        Ok(Self {
            app,
            realtime,
            log: LogSettings { json },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
