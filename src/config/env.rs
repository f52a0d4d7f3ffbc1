//! Environment variable handling and .env file support

use crate::error::{AppError, Result};
use std::path::Path;

/// Environment keys recognized by the selector, all optional
pub const ENV_CONCURRENCY: &str = "PNS_CONCURRENCY";
pub const ENV_PROBE_TIMEOUT_MS: &str = "PNS_PROBE_TIMEOUT_MS";
pub const ENV_TEST_URL: &str = "PNS_TEST_URL";
pub const ENV_TEST_INTERVAL_SECS: &str = "PNS_TEST_INTERVAL_SECS";
pub const ENV_ENABLE_COLOR: &str = "PNS_ENABLE_COLOR";

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        if Path::new(".env").exists() {
            dotenv::from_filename(".env")
                .map_err(|e| AppError::config(format!("Failed to load .env file: {}", e)))?;

            if debug {
                eprintln!("Loaded configuration from .env file");
            }
        }
        Ok(())
    }

    /// Read a typed value from the environment, None when unset
    pub fn parse_var<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
        match std::env::var(key) {
            Err(_) => Ok(None),
            Ok(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| AppError::config(format!("Invalid value for {}: '{}'", key, raw))),
        }
    }

    /// Booleans accept true/false/1/0/yes/no
    pub fn parse_bool_var(key: &str) -> Result<Option<bool>> {
        match std::env::var(key) {
            Err(_) => Ok(None),
            Ok(raw) => match raw.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(Some(true)),
                "false" | "0" | "no" => Ok(Some(false)),
                _ => Err(AppError::config(format!(
                    "Invalid boolean for {}: '{}'",
                    key, raw
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; keep each key unique per test

    #[test]
    fn test_parse_var_typed() {
        std::env::set_var("PNS_TEST_PARSE_USIZE", "12");
        let parsed: Option<usize> = EnvManager::parse_var("PNS_TEST_PARSE_USIZE").unwrap();
        assert_eq!(parsed, Some(12));
        std::env::remove_var("PNS_TEST_PARSE_USIZE");

        let missing: Option<usize> = EnvManager::parse_var("PNS_TEST_PARSE_MISSING").unwrap();
        assert_eq!(missing, None);
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        std::env::set_var("PNS_TEST_PARSE_BAD", "not-a-number");
        let result: Result<Option<u64>> = EnvManager::parse_var("PNS_TEST_PARSE_BAD");
        assert!(result.is_err());
        std::env::remove_var("PNS_TEST_PARSE_BAD");
    }

    #[test]
    fn test_parse_bool_variants() {
        std::env::set_var("PNS_TEST_BOOL_YES", "Yes");
        assert_eq!(EnvManager::parse_bool_var("PNS_TEST_BOOL_YES").unwrap(), Some(true));
        std::env::remove_var("PNS_TEST_BOOL_YES");

        std::env::set_var("PNS_TEST_BOOL_ZERO", "0");
        assert_eq!(EnvManager::parse_bool_var("PNS_TEST_BOOL_ZERO").unwrap(), Some(false));
        std::env::remove_var("PNS_TEST_BOOL_ZERO");

        std::env::set_var("PNS_TEST_BOOL_BAD", "maybe");
        assert!(EnvManager::parse_bool_var("PNS_TEST_BOOL_BAD").is_err());
        std::env::remove_var("PNS_TEST_BOOL_BAD");
    }
}
