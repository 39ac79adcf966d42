//! Configuration management for barry-price
//!
//! This module handles loading, validation, and management of the service
//! configuration from YAML files with support for environment variable overrides.

use crate::error::{BarryError, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Barry JSON-RPC endpoint
pub const DEFAULT_ENDPOINT: &str = "https://jsonrpc.barry.energy/json-rpc";

/// Currency used for every country except Denmark
pub const CURRENCY_EURO: &str = "€";

/// Currency used for Danish metering points
pub const CURRENCY_KRONE: &str = "kr.";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Barry account and metering point settings
    pub barry: BarryConfig,

    /// Local hour (0-23) after which next-day prices are assumed published
    pub refresh_hour: u32,

    /// Polling interval in minutes
    pub scan_interval_minutes: u64,

    /// Maximum number of hourly prices fetched per refresh cycle
    pub batch_size: usize,

    /// Timeout for a whole refresh cycle in seconds
    pub api_timeout_seconds: u64,

    /// IANA time zone used for local day boundaries
    pub timezone: String,

    /// Where the resolved config entry is persisted
    pub entry_file: String,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Web server binding configuration
    pub web: WebConfig,
}

/// Barry API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BarryConfig {
    /// Barry API token
    pub api_token: String,

    /// Price zone; empty uses the metering point's price code
    pub price_zone: String,

    /// Preferred metering point id; required when the account has several
    pub mpid: String,

    /// Currency symbol; empty derives it from the metering point country
    pub currency: String,

    /// JSON-RPC endpoint
    pub endpoint: String,

    /// Per-request HTTP timeout in seconds
    pub request_timeout_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional console-specific level
    pub console_level: Option<String>,

    /// Optional file-specific level
    pub file_level: Option<String>,

    /// Path to log file (its parent directory holds the rolling files)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Whether the HTTP API is served
    pub enabled: bool,

    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

impl Default for BarryConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            price_zone: String::new(),
            mpid: String::new(),
            currency: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout_seconds: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/barry-price.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8089,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            barry: BarryConfig::default(),
            refresh_hour: 20,
            scan_interval_minutes: 5,
            batch_size: 2,
            api_timeout_seconds: 100,
            timezone: "UTC".to_string(),
            entry_file: "/data/barry_entry.json".to_string(),
            logging: LoggingConfig::default(),
            web: WebConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from `BARRY_CONFIG` or the default locations, then
    /// apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("BARRY_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::load_default_paths()?,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_default_paths() -> Result<Self> {
        let default_paths = [
            "barry_config.yaml",
            "/data/barry_config.yaml",
            "/etc/barry/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Config::default())
    }

    /// Secrets are usually injected through the environment rather than the file
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("BARRY_API_TOKEN")
            && !token.trim().is_empty()
        {
            self.barry.api_token = token.trim().to_string();
        }
        if let Ok(mpid) = std::env::var("BARRY_MPID")
            && !mpid.trim().is_empty()
        {
            self.barry.mpid = mpid.trim().to_string();
        }
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parsed time zone
    pub fn tz(&self) -> Result<Tz> {
        self.timezone.parse::<Tz>().map_err(|_| {
            BarryError::validation(
                "timezone".to_string(),
                format!("Unknown time zone: {}", self.timezone),
            )
        })
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_minutes * 60)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_seconds)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.refresh_hour > 23 {
            return Err(BarryError::validation(
                "refresh_hour",
                "Must be an hour of day between 0 and 23",
            ));
        }

        if self.scan_interval_minutes == 0 {
            return Err(BarryError::validation(
                "scan_interval_minutes",
                "Must be greater than 0",
            ));
        }

        if self.batch_size == 0 {
            return Err(BarryError::validation("batch_size", "Must be greater than 0"));
        }

        if self.api_timeout_seconds == 0 {
            return Err(BarryError::validation(
                "api_timeout_seconds",
                "Must be greater than 0",
            ));
        }

        if self.barry.endpoint.trim().is_empty() {
            return Err(BarryError::validation(
                "barry.endpoint",
                "Endpoint cannot be empty",
            ));
        }

        if self.web.enabled && self.web.port == 0 {
            return Err(BarryError::validation(
                "web.port",
                "Port must be greater than 0",
            ));
        }

        crate::logging::parse_log_level(&self.logging.level).map_err(|_| {
            BarryError::validation(
                "logging.level".to_string(),
                format!("Invalid log level: {}", self.logging.level),
            )
        })?;

        self.tz()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.refresh_hour, 20);
        assert_eq!(config.scan_interval_minutes, 5);
        assert_eq!(config.batch_size, 2);
        assert_eq!(config.api_timeout_seconds, 100);
        assert!(config.barry.currency.is_empty());
        assert_eq!(config.scan_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.refresh_hour = 24;
        assert!(config.validate().is_err());

        config = Config::default();
        config.batch_size = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.timezone = "Mars/Olympus".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.logging.level = "chatty".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.refresh_hour, deserialized.refresh_hour);
        assert_eq!(config.barry.endpoint, deserialized.barry.endpoint);
    }

    #[test]
    fn partial_yaml_uses_defaults() {
        let yaml = "barry:\n  api_token: abc\ntimezone: Europe/Copenhagen\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.barry.api_token, "abc");
        assert_eq!(config.batch_size, 2);
        assert_eq!(config.tz().unwrap(), chrono_tz::Europe::Copenhagen);
    }
}
