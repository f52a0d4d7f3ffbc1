//! Configuration data model and validation

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main subsystem configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Number of concurrent test workers per session
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-probe timeout in milliseconds (owned by the prober)
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Target URL for URL-test probing
    #[serde(default = "default_test_url")]
    pub test_url: String,

    /// Inter-round delay for the continuous test loop, in seconds
    #[serde(default = "default_test_interval_secs")]
    pub test_interval_secs: u64,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

fn default_concurrency() -> usize {
    crate::defaults::DEFAULT_CONCURRENCY
}

fn default_probe_timeout_ms() -> u64 {
    crate::defaults::DEFAULT_PROBE_TIMEOUT.as_millis() as u64
}

fn default_test_url() -> String {
    crate::defaults::DEFAULT_TEST_URL.to_string()
}

fn default_test_interval_secs() -> u64 {
    crate::defaults::DEFAULT_TEST_INTERVAL.as_secs()
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            probe_timeout_ms: default_probe_timeout_ms(),
            test_url: default_test_url(),
            test_interval_secs: default_test_interval_secs(),
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Get probe timeout as Duration
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Get continuous-test interval as Duration
    pub fn test_interval(&self) -> Duration {
        Duration::from_secs(self.test_interval_secs)
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(AppError::config("Concurrency must be greater than 0"));
        }

        // 4x the logical core count is already past the point of diminishing
        // returns for connect probes
        let concurrency_cap = (num_cpus::get() * 4).max(64);
        if self.concurrency > concurrency_cap {
            return Err(AppError::config(format!(
                "Concurrency {} exceeds supported maximum {}",
                self.concurrency, concurrency_cap
            )));
        }

        if self.probe_timeout_ms == 0 {
            return Err(AppError::config("Probe timeout must be greater than 0"));
        }

        if self.probe_timeout_ms > 60_000 {
            return Err(AppError::config("Probe timeout cannot exceed 60000 ms"));
        }

        if self.test_url.is_empty() {
            return Err(AppError::config("Test URL cannot be empty"));
        }

        match url::Url::parse(&self.test_url) {
            Ok(parsed) => {
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    return Err(AppError::config(format!(
                        "Test URL must be http or https: {}",
                        self.test_url
                    )));
                }
            }
            Err(e) => {
                return Err(AppError::config(format!(
                    "Invalid test URL '{}': {}",
                    self.test_url, e
                )));
            }
        }

        if self.test_interval_secs == 0 {
            return Err(AppError::config("Test interval must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = Config::default();
        config.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_bounds() {
        let mut config = Config::default();
        config.probe_timeout_ms = 0;
        assert!(config.validate().is_err());

        config.probe_timeout_ms = 60_001;
        assert!(config.validate().is_err());

        config.probe_timeout_ms = 3_000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_test_url_rejected() {
        let mut config = Config::default();
        config.test_url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.test_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_durations() {
        let config = Config::default();
        assert_eq!(config.probe_timeout(), Duration::from_millis(config.probe_timeout_ms));
        assert_eq!(config.test_interval(), Duration::from_secs(config.test_interval_secs));
    }
}
