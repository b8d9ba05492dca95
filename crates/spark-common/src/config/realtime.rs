//! Realtime channel configuration

use super::ConfigError;
use std::time::Duration;
use url::Url;

/// Query parameter carrying the subject identifier on the socket URL
pub const SUBJECT_QUERY_PARAM: &str = "userID";

/// Settings for the realtime WebSocket channel
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Base WebSocket endpoint (`ws://` or `wss://`)
    pub endpoint: String,
    pub heartbeat_interval_ms: u64,
    pub reconnect_delay_ms: u64,
    /// Frames that may wait for the socket writer before sends start dropping
    pub outbound_buffer: usize,
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_reconnect_delay_ms() -> u64 {
    5_000
}

fn default_outbound_buffer() -> usize {
    100
}

impl RealtimeConfig {
    /// Create a configuration for `endpoint` with default timings
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            outbound_buffer: default_outbound_buffer(),
        }
    }

    /// Read the `REALTIME_*` keys through `lookup`
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup("REALTIME_URL").ok_or(ConfigError::MissingVar("REALTIME_URL"))?;

        Ok(Self {
            endpoint,
            heartbeat_interval_ms: parse_or(
                lookup,
                "REALTIME_HEARTBEAT_INTERVAL_MS",
                default_heartbeat_interval_ms,
            )?,
            reconnect_delay_ms: parse_or(
                lookup,
                "REALTIME_RECONNECT_DELAY_MS",
                default_reconnect_delay_ms,
            )?,
            outbound_buffer: parse_or(lookup, "REALTIME_OUTBOUND_BUFFER", default_outbound_buffer)?,
        })
    }

    /// Check the endpoint and timings
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| ConfigError::InvalidValue("REALTIME_URL", format!("{}: {e}", self.endpoint)))?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConfigError::InvalidValue(
                "REALTIME_URL",
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "REALTIME_HEARTBEAT_INTERVAL_MS",
                "must be greater than zero".to_string(),
            ));
        }
        if self.reconnect_delay_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "REALTIME_RECONNECT_DELAY_MS",
                "must be greater than zero".to_string(),
            ));
        }
        if self.outbound_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "REALTIME_OUTBOUND_BUFFER",
                "must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Socket URL for `subject_id`: the endpoint with `userID=<subject_id>` appended
    pub fn connect_url(&self, subject_id: &str) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&self.endpoint)?;
        url.query_pairs_mut()
            .append_pair(SUBJECT_QUERY_PARAM, subject_id);
        Ok(url)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: fn() -> T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        None => Ok(default()),
    }
}
