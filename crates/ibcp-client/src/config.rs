//! Client configuration and layered loading.
//!
//! `ClientConfig` can be built in code with the `with_*` methods or loaded
//! through [`ConfigLoader`], which merges defaults, an optional TOML file
//! and `IBCP_`-prefixed environment variables.

use crate::error::{GatewayError, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default Client Portal gateway address.
pub const DEFAULT_GATEWAY_URL: &str = "https://localhost:5000";

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config/ibcp.toml";

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "IBCP_";

/// Log verbosity, ordered `Error < Warning < Info < Debug`.
///
/// A message is emitted only if its level is at or below the configured one.
///
/// Deserializes from the same names and numbers `FromStr` accepts.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase", try_from = "RawLogLevel")]
pub enum LogLevel {
    Error,
    Warning,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    /// Returns true if a message at `level` should be emitted.
    #[must_use]
    pub fn allows(self, level: LogLevel) -> bool {
        level <= self
    }
}

/// Log level as written in a config file or environment variable.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawLogLevel {
    Number(u8),
    Name(String),
}

impl TryFrom<RawLogLevel> for LogLevel {
    type Error = GatewayError;

    fn try_from(raw: RawLogLevel) -> Result<Self> {
        match raw {
            RawLogLevel::Number(n) => n.to_string().parse(),
            RawLogLevel::Name(name) => name.parse(),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "error" | "0" => Ok(Self::Error),
            "warning" | "warn" | "1" => Ok(Self::Warning),
            "info" | "2" => Ok(Self::Info),
            "debug" | "3" => Ok(Self::Debug),
            other => Err(GatewayError::Configuration(format!(
                "unknown log level: {other}"
            ))),
        }
    }
}

/// Configuration for [`GatewayClient`](crate::GatewayClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Gateway base URL, without the `/v1/api` prefix.
    pub base_url: String,

    /// Log verbosity.
    pub log_level: LogLevel,

    /// Start the heartbeat automatically after a successful connect.
    pub auto_tickle: bool,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Client-side request budget.
    pub requests_per_second: u32,

    /// Delay between heartbeat calls, in milliseconds.
    pub tickle_interval_ms: u64,

    /// Wait after a re-authentication request before polling status again.
    pub reauth_grace_ms: u64,

    /// Accept the gateway's self-signed certificate.
    pub accept_invalid_certs: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GATEWAY_URL.to_string(),
            log_level: LogLevel::Info,
            auto_tickle: true,
            timeout_secs: 10,
            requests_per_second: 10,
            tickle_interval_ms: 60_000,
            reauth_grace_ms: 3_000,
            accept_invalid_certs: true,
        }
    }
}

impl ClientConfig {
    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the log level.
    #[must_use]
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Enables or disables the automatic heartbeat.
    #[must_use]
    pub fn with_auto_tickle(mut self, enabled: bool) -> Self {
        self.auto_tickle = enabled;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Sets the client-side rate limit.
    #[must_use]
    pub fn with_requests_per_second(mut self, rps: u32) -> Self {
        self.requests_per_second = rps;
        self
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub fn with_tickle_interval(mut self, interval: Duration) -> Self {
        self.tickle_interval_ms = duration_millis(interval);
        self
    }

    /// Sets the re-authentication grace period.
    #[must_use]
    pub fn with_reauth_grace(mut self, grace: Duration) -> Self {
        self.reauth_grace_ms = duration_millis(grace);
        self
    }

    /// Controls acceptance of self-signed certificates.
    #[must_use]
    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Heartbeat interval as a `Duration`.
    #[must_use]
    pub fn tickle_interval(&self) -> Duration {
        Duration::from_millis(self.tickle_interval_ms)
    }

    /// Re-authentication grace period as a `Duration`.
    #[must_use]
    pub fn reauth_grace(&self) -> Duration {
        Duration::from_millis(self.reauth_grace_ms)
    }

    /// Request timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Checks that the configuration is usable.
    ///
    /// # Errors
    /// Returns [`GatewayError::Configuration`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return Err(GatewayError::Configuration(format!(
                "base_url must be an http(s) URL: {}",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(GatewayError::Configuration(
                "timeout_secs must be positive".to_string(),
            ));
        }
        if self.requests_per_second == 0 {
            return Err(GatewayError::Configuration(
                "requests_per_second must be positive".to_string(),
            ));
        }
        if self.tickle_interval_ms == 0 {
            return Err(GatewayError::Configuration(
                "tickle_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Loads [`ClientConfig`] from defaults, a TOML file and the environment.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from [`DEFAULT_CONFIG_FILE`] and `IBCP_*` variables.
    ///
    /// A missing file is not an error; defaults fill every unset field.
    ///
    /// # Errors
    /// Returns an error if a source cannot be parsed or the result is invalid.
    pub fn load() -> Result<ClientConfig> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Loads configuration from the given TOML file and `IBCP_*` variables.
    ///
    /// # Errors
    /// Returns an error if a source cannot be parsed or the result is invalid.
    pub fn load_from(path: impl AsRef<Path>) -> Result<ClientConfig> {
        let figment = Figment::from(Serialized::defaults(ClientConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX));
        Self::extract(&figment)
    }

    /// Loads configuration from a TOML file only, ignoring the environment.
    ///
    /// # Errors
    /// Returns an error if the file cannot be parsed or the result is invalid.
    pub fn load_file(path: impl AsRef<Path>) -> Result<ClientConfig> {
        let figment = Figment::from(Serialized::defaults(ClientConfig::default()))
            .merge(Toml::file(path.as_ref()));
        Self::extract(&figment)
    }

    fn extract(figment: &Figment) -> Result<ClientConfig> {
        let config: ClientConfig = figment
            .extract()
            .map_err(|e| GatewayError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "https://localhost:5000");
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.auto_tickle);
        assert_eq!(config.tickle_interval(), Duration::from_secs(60));
        assert_eq!(config.reauth_grace(), Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::default()
            .with_base_url("http://127.0.0.1:5001")
            .with_log_level(LogLevel::Debug)
            .with_auto_tickle(false)
            .with_timeout_secs(5)
            .with_requests_per_second(2)
            .with_tickle_interval(Duration::from_millis(250))
            .with_reauth_grace(Duration::from_millis(20))
            .with_accept_invalid_certs(false);

        assert_eq!(config.base_url, "http://127.0.0.1:5001");
        assert_eq!(config.log_level, LogLevel::Debug);
        assert!(!config.auto_tickle);
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.requests_per_second, 2);
        assert_eq!(config.tickle_interval_ms, 250);
        assert_eq!(config.reauth_grace_ms, 20);
        assert!(!config.accept_invalid_certs);
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Error < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);

        assert!(LogLevel::Info.allows(LogLevel::Error));
        assert!(LogLevel::Info.allows(LogLevel::Info));
        assert!(!LogLevel::Info.allows(LogLevel::Debug));
        assert!(!LogLevel::Error.allows(LogLevel::Warning));
        assert!(LogLevel::Debug.allows(LogLevel::Debug));
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("0".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(ClientConfig::default()
            .with_base_url("localhost:5000")
            .validate()
            .is_err());
        assert!(ClientConfig::default().with_timeout_secs(0).validate().is_err());
        assert!(ClientConfig::default()
            .with_requests_per_second(0)
            .validate()
            .is_err());
        assert!(ClientConfig::default()
            .with_tickle_interval(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_load_file_merges_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "base_url = \"https://gateway.internal:5000\"\nlog_level = \"debug\"\nauto_tickle = false"
        )
        .unwrap();

        let config = ConfigLoader::load_file(file.path()).unwrap();
        assert_eq!(config.base_url, "https://gateway.internal:5000");
        assert_eq!(config.log_level, LogLevel::Debug);
        assert!(!config.auto_tickle);
        assert_eq!(config.tickle_interval_ms, 60_000);
    }

    #[test]
    fn test_load_file_accepts_log_level_aliases() {
        for (value, expected) in [
            ("\"warn\"", LogLevel::Warning),
            ("\"WARNING\"", LogLevel::Warning),
            ("1", LogLevel::Warning),
            ("3", LogLevel::Debug),
            ("\"0\"", LogLevel::Error),
        ] {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "log_level = {value}").unwrap();

            let config = ConfigLoader::load_file(file.path()).unwrap();
            assert_eq!(config.log_level, expected, "log_level = {value}");
        }
    }

    #[test]
    fn test_load_file_rejects_unknown_log_level() {
        for value in ["\"verbose\"", "7"] {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "log_level = {value}").unwrap();
            assert!(matches!(
                ConfigLoader::load_file(file.path()),
                Err(GatewayError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_log_level_serializes_lowercase() {
        let json = serde_json::to_value(LogLevel::Warning).unwrap();
        assert_eq!(json, serde_json::json!("warning"));
        let parsed: LogLevel = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, LogLevel::Warning);
    }

    #[test]
    fn test_load_file_missing_uses_defaults() {
        let config = ConfigLoader::load_file("does/not/exist.toml").unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_load_file_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "base_url = \"ftp://nope\"").unwrap();
        let err = ConfigLoader::load_file(file.path()).unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(_)));
    }
}
