//! Configuration management
//!
//! Precedence: built-in defaults, then environment (`PNS_*`, optionally
//! from a .env file), then command-line flags.

pub mod env;

pub use env::EnvManager;

// Re-export from models for convenience
pub use crate::models::Config;

use crate::{
    cli::Cli,
    error::Result,
};

/// Non-fatal configuration findings surfaced at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub message: String,
}

impl ConfigWarning {
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    /// Format for console display
    pub fn format(&self, use_color: bool) -> String {
        if use_color {
            use colored::Colorize;
            format!("{} {}", "warning:".yellow().bold(), self.message)
        } else {
            format!("warning: {}", self.message)
        }
    }
}

/// Build the effective configuration from defaults, environment and CLI
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::default();

    // Environment layer
    if let Some(concurrency) = EnvManager::parse_var(env::ENV_CONCURRENCY)? {
        config.concurrency = concurrency;
    }
    if let Some(timeout_ms) = EnvManager::parse_var(env::ENV_PROBE_TIMEOUT_MS)? {
        config.probe_timeout_ms = timeout_ms;
    }
    if let Some(test_url) = EnvManager::parse_var::<String>(env::ENV_TEST_URL)? {
        config.test_url = test_url;
    }
    if let Some(interval) = EnvManager::parse_var(env::ENV_TEST_INTERVAL_SECS)? {
        config.test_interval_secs = interval;
    }
    if let Some(enable_color) = EnvManager::parse_bool_var(env::ENV_ENABLE_COLOR)? {
        config.enable_color = enable_color;
    }

    // CLI layer wins
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.probe_timeout_ms = timeout_ms;
    }
    if let Some(test_url) = &cli.test_url {
        config.test_url = test_url.clone();
    }
    if let Some(interval) = cli.interval {
        config.test_interval_secs = interval;
    }
    if cli.no_color {
        config.enable_color = false;
    }
    config.verbose = cli.verbose;
    config.debug = cli.debug;

    config.validate()?;
    Ok(config)
}

/// Sanity-check a valid configuration and collect warnings
pub fn validate_config(config: &Config) -> Result<Vec<ConfigWarning>> {
    config.validate()?;

    let mut warnings = Vec::new();

    if config.concurrency > 32 {
        warnings.push(ConfigWarning::new(format!(
            "Concurrency {} is high; probe latencies may be distorted by local contention",
            config.concurrency
        )));
    }

    if config.probe_timeout_ms < 500 {
        warnings.push(ConfigWarning::new(format!(
            "Probe timeout {}ms is aggressive; slow but reachable nodes will classify as timeouts",
            config.probe_timeout_ms
        )));
    }

    if config.test_interval_secs < 5 {
        warnings.push(ConfigWarning::new(format!(
            "Test interval {}s will probe nodes near-continuously",
            config.test_interval_secs
        )));
    }

    Ok(warnings)
}
