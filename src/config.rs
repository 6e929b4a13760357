//! Configuration module for the telemetry agent.
//!
//! This module provides environment-based configuration for the agent,
//! including the collector URL, buffer file location, and capture and
//! delivery cadence overrides.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::settings::Settings;

/// Default base URL for the collector service
const DEFAULT_COLLECTOR_URL: &str = "http://localhost:1337";

/// Default location of the durable buffer file
const DEFAULT_BUFFER_PATH: &str = "pending-samples.json";

/// Default HTTP request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Collector endpoint serving agent settings
const SETTINGS_ENDPOINT: &str = "/get-settings-data";

/// Collector endpoint accepting sample batches
const INGEST_ENDPOINT: &str = "/add-data";

/// Configuration for the telemetry agent.
///
/// All settings can be configured via environment variables:
/// - `TELEMETRY_AGENT_COLLECTOR_URL`: Collector base URL (default: http://localhost:1337)
/// - `TELEMETRY_AGENT_BUFFER_PATH`: Buffer file path (default: pending-samples.json)
/// - `TELEMETRY_AGENT_REQUEST_TIMEOUT_SECS`: HTTP timeout (default: 10)
/// - `TELEMETRY_AGENT_SAMPLING_INTERVAL_SECS`: Initial capture cadence (default: 2)
/// - `TELEMETRY_AGENT_SEND_INTERVAL_SECS`: Initial delivery cadence (default: 60)
///
/// The interval overrides only seed the initial settings; the collector can
/// adjust both at runtime through the settings endpoint.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the collector service
    pub collector_url: String,

    /// Full URL for the settings endpoint
    pub settings_url: String,

    /// Full URL for the sample ingest endpoint
    pub ingest_url: String,

    /// Location of the durable buffer file
    pub buffer_path: PathBuf,

    /// HTTP request timeout duration
    pub request_timeout: Duration,

    /// Initial seconds between sensor reads
    pub sampling_interval_secs: u64,

    /// Initial seconds between delivery attempts
    pub send_interval_secs: u64,
}

/// Error type for configuration loading failures
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub env_var: Option<String>,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.env_var {
            Some(var) => write!(f, "Configuration error for {}: {}", var, self.message),
            None => write!(f, "Configuration error: {}", self.message),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Returns a new `Config` instance with values from environment
    /// variables, falling back to defaults where appropriate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any of the second-valued variables is not
    /// a valid number or is zero.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use telemetry_agent::config::Config;
    ///
    /// let config = Config::from_env().expect("Failed to load config");
    /// println!("Collector: {}", config.collector_url);
    /// ```
    pub fn from_env() -> Result<Self, ConfigError> {
        let collector_url = env::var("TELEMETRY_AGENT_COLLECTOR_URL")
            .unwrap_or_else(|_| DEFAULT_COLLECTOR_URL.to_string());

        // Normalize so endpoint concatenation never doubles a slash
        let collector_url = collector_url.trim_end_matches('/').to_string();

        let settings_url = format!("{}{}", collector_url, SETTINGS_ENDPOINT);
        let ingest_url = format!("{}{}", collector_url, INGEST_ENDPOINT);

        let buffer_path = env::var("TELEMETRY_AGENT_BUFFER_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_BUFFER_PATH));

        let request_timeout_secs = Self::parse_positive_secs(
            "TELEMETRY_AGENT_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;
        let request_timeout = Duration::from_secs(request_timeout_secs);

        let defaults = Settings::default();
        let sampling_interval_secs = Self::parse_positive_secs(
            "TELEMETRY_AGENT_SAMPLING_INTERVAL_SECS",
            defaults.sampling_interval_secs,
        )?;
        let send_interval_secs = Self::parse_positive_secs(
            "TELEMETRY_AGENT_SEND_INTERVAL_SECS",
            defaults.send_interval_secs,
        )?;

        Ok(Self {
            collector_url,
            settings_url,
            ingest_url,
            buffer_path,
            request_timeout,
            sampling_interval_secs,
            send_interval_secs,
        })
    }

    /// The settings the agent starts with before its first sync.
    pub fn initial_settings(&self) -> Settings {
        Settings {
            sampling_interval_secs: self.sampling_interval_secs,
            send_interval_secs: self.send_interval_secs,
            ..Settings::default()
        }
    }

    /// Parse a second-valued environment variable with validation.
    fn parse_positive_secs(env_var: &str, default: u64) -> Result<u64, ConfigError> {
        match env::var(env_var) {
            Ok(value) => {
                let secs: u64 = value.parse().map_err(|_| ConfigError {
                    message: format!("'{}' is not a valid number", value),
                    env_var: Some(env_var.to_string()),
                })?;

                if secs == 0 {
                    return Err(ConfigError {
                        message: "value must be greater than 0".to_string(),
                        env_var: Some(env_var.to_string()),
                    });
                }

                Ok(secs)
            }
            Err(_) => Ok(default),
        }
    }
}

impl Default for Config {
    /// Create a default configuration using default values.
    ///
    /// This is useful for testing or when environment variables are not set.
    fn default() -> Self {
        let defaults = Settings::default();
        Self {
            collector_url: DEFAULT_COLLECTOR_URL.to_string(),
            settings_url: format!("{}{}", DEFAULT_COLLECTOR_URL, SETTINGS_ENDPOINT),
            ingest_url: format!("{}{}", DEFAULT_COLLECTOR_URL, INGEST_ENDPOINT),
            buffer_path: PathBuf::from(DEFAULT_BUFFER_PATH),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            sampling_interval_secs: defaults.sampling_interval_secs,
            send_interval_secs: defaults.send_interval_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Tests mutate shared process environment; serialize them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        original: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let original = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                original,
            }
        }

        fn remove(key: &str) -> Self {
            let original = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                original,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.original {
                Some(val) => env::set_var(&self.key, val),
                None => env::remove_var(&self.key),
            }
        }
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.collector_url, "http://localhost:1337");
        assert_eq!(
            config.settings_url,
            "http://localhost:1337/get-settings-data"
        );
        assert_eq!(config.ingest_url, "http://localhost:1337/add-data");
        assert_eq!(config.buffer_path, PathBuf::from("pending-samples.json"));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.sampling_interval_secs, 2);
        assert_eq!(config.send_interval_secs, 60);
    }

    #[test]
    fn test_config_from_env_with_defaults() {
        let _lock = env_lock();
        let _guard1 = EnvGuard::remove("TELEMETRY_AGENT_COLLECTOR_URL");
        let _guard2 = EnvGuard::remove("TELEMETRY_AGENT_BUFFER_PATH");
        let _guard3 = EnvGuard::remove("TELEMETRY_AGENT_REQUEST_TIMEOUT_SECS");
        let _guard4 = EnvGuard::remove("TELEMETRY_AGENT_SAMPLING_INTERVAL_SECS");
        let _guard5 = EnvGuard::remove("TELEMETRY_AGENT_SEND_INTERVAL_SECS");

        let config = Config::from_env().expect("Should load with defaults");
        assert_eq!(config.collector_url, "http://localhost:1337");
        assert_eq!(config.buffer_path, PathBuf::from("pending-samples.json"));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_config_from_env_custom_values() {
        let _lock = env_lock();
        let _guard1 = EnvGuard::set(
            "TELEMETRY_AGENT_COLLECTOR_URL",
            "http://collector.local:8080/",
        );
        let _guard2 = EnvGuard::set(
            "TELEMETRY_AGENT_BUFFER_PATH",
            "/var/lib/telemetry/pending.json",
        );
        let _guard3 = EnvGuard::set("TELEMETRY_AGENT_REQUEST_TIMEOUT_SECS", "30");
        let _guard4 = EnvGuard::set("TELEMETRY_AGENT_SAMPLING_INTERVAL_SECS", "5");
        let _guard5 = EnvGuard::set("TELEMETRY_AGENT_SEND_INTERVAL_SECS", "300");

        let config = Config::from_env().expect("Should load custom values");
        assert_eq!(config.collector_url, "http://collector.local:8080"); // Trailing slash removed
        assert_eq!(
            config.settings_url,
            "http://collector.local:8080/get-settings-data"
        );
        assert_eq!(config.ingest_url, "http://collector.local:8080/add-data");
        assert_eq!(
            config.buffer_path,
            PathBuf::from("/var/lib/telemetry/pending.json")
        );
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.sampling_interval_secs, 5);
        assert_eq!(config.send_interval_secs, 300);
    }

    #[test]
    fn test_invalid_timeout() {
        let _lock = env_lock();
        let _guard = EnvGuard::set("TELEMETRY_AGENT_REQUEST_TIMEOUT_SECS", "not_a_number");

        let result = Config::from_env();
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.message.contains("not a valid number"));
        assert_eq!(
            err.env_var.as_deref(),
            Some("TELEMETRY_AGENT_REQUEST_TIMEOUT_SECS")
        );
    }

    #[test]
    fn test_zero_send_interval_rejected() {
        let _lock = env_lock();
        let _guard = EnvGuard::set("TELEMETRY_AGENT_SEND_INTERVAL_SECS", "0");

        let result = Config::from_env();
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.message.contains("greater than 0"));
    }

    #[test]
    fn test_initial_settings_carries_env_intervals() {
        let _lock = env_lock();
        let _guard1 = EnvGuard::set("TELEMETRY_AGENT_SAMPLING_INTERVAL_SECS", "5");
        let _guard2 = EnvGuard::set("TELEMETRY_AGENT_SEND_INTERVAL_SECS", "120");

        let config = Config::from_env().expect("Should load custom intervals");
        let settings = config.initial_settings();
        assert!(settings.collect_temperature);
        assert!(settings.collect_humidity);
        assert_eq!(settings.sampling_interval_secs, 5);
        assert_eq!(settings.send_interval_secs, 120);
    }

    #[test]
    fn test_config_error_display() {
        let error = ConfigError {
            message: "test error".to_string(),
            env_var: Some("TEST_VAR".to_string()),
        };
        assert_eq!(
            format!("{}", error),
            "Configuration error for TEST_VAR: test error"
        );

        let error_no_var = ConfigError {
            message: "general error".to_string(),
            env_var: None,
        };
        assert_eq!(
            format!("{}", error_no_var),
            "Configuration error: general error"
        );
    }
}
