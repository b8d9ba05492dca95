//! Configuration structs

mod app_config;
mod realtime;

pub use app_config::{AppConfig, AppSettings, ConfigError, Environment};
pub use realtime::RealtimeConfig;
