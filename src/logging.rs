//! Structured logging for the node selector
//!
//! Log entries carry a component name, an optional correlation ID (test
//! sessions log under their session UUID) and arbitrary structured fields.
//! Output is a human console format or JSON lines for log aggregators.

use crate::models::Config;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Write};

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    /// Get log level name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    /// Get ANSI color code for console output
    pub fn color_code(&self) -> &'static str {
        match self {
            LogLevel::Trace => "\x1b[37m",
            LogLevel::Debug => "\x1b[36m",
            LogLevel::Info => "\x1b[32m",
            LogLevel::Warn => "\x1b[33m",
            LogLevel::Error => "\x1b[31m",
        }
    }

    /// Reset ANSI color code
    pub fn reset_code() -> &'static str {
        "\x1b[0m"
    }
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable console format
    Console,
    /// JSON lines for structured logging
    Json,
}

/// A single structured log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub component: String,
    pub message: String,
    /// Correlation ID for tracking related events (session UUID)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

/// Component logger with level filtering and structured fields
#[derive(Debug, Clone)]
pub struct Logger {
    min_level: LogLevel,
    use_color: bool,
    format: LogFormat,
    component: String,
    correlation_id: Option<String>,
}

impl Logger {
    /// Create a new console logger for a component
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            min_level: LogLevel::Info,
            use_color: true,
            format: LogFormat::Console,
            component: component.into(),
            correlation_id: None,
        }
    }

    /// Create a logger configured from the application config
    pub fn with_config(component: impl Into<String>, config: &Config) -> Self {
        let min_level = if config.debug {
            LogLevel::Debug
        } else if config.verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        };

        Self {
            min_level,
            use_color: config.enable_color,
            format: if config.debug { LogFormat::Json } else { LogFormat::Console },
            component: component.into(),
            correlation_id: None,
        }
    }

    /// Derive a logger whose entries carry the given correlation ID
    pub fn with_correlation_id(&self, id: impl Into<String>) -> Self {
        let mut logger = self.clone();
        logger.correlation_id = Some(id.into());
        logger
    }

    /// Set minimum log level
    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    /// Check whether a level passes the filter
    pub fn would_log(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    /// Start a log entry at the given level
    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder {
            logger: self,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                component: self.component.clone(),
                message: message.to_string(),
                correlation_id: self.correlation_id.clone(),
                fields: BTreeMap::new(),
            },
        }
    }

    fn emit(&self, entry: &LogEntry) {
        if !self.would_log(entry.level) {
            return;
        }

        let line = match self.format {
            LogFormat::Json => {
                serde_json::to_string(entry).unwrap_or_else(|_| entry.message.clone())
            }
            LogFormat::Console => self.format_console(entry),
        };

        // Logging must never take the process down with it
        let _ = writeln!(io::stderr(), "{}", line);
    }

    fn format_console(&self, entry: &LogEntry) -> String {
        let level = if self.use_color {
            format!(
                "{}{}{}",
                entry.level.color_code(),
                entry.level.as_str(),
                LogLevel::reset_code()
            )
        } else {
            entry.level.as_str().to_string()
        };

        let mut line = format!(
            "{} [{}] {} {}",
            entry.timestamp.format("%H:%M:%S%.3f"),
            entry.component,
            level,
            entry.message
        );

        if let Some(id) = &entry.correlation_id {
            line.push_str(&format!(" (session={})", id));
        }

        for (key, value) in &entry.fields {
            line.push_str(&format!(" {}={}", key, value));
        }

        line
    }
}

/// Builder for a single log entry
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    /// Override the correlation ID for this entry
    pub fn correlation_id(mut self, id: &str) -> Self {
        self.entry.correlation_id = Some(id.to_string());
        self
    }

    /// Attach a structured field
    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    /// Emit the entry
    pub fn log(self) {
        self.logger.emit(&self.entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering_and_filter() {
        let mut logger = Logger::new("test");
        logger.set_level(LogLevel::Warn);
        assert!(!logger.would_log(LogLevel::Info));
        assert!(logger.would_log(LogLevel::Warn));
        assert!(logger.would_log(LogLevel::Error));
    }

    #[test]
    fn test_with_config_levels() {
        let mut config = Config::default();
        config.debug = true;
        assert!(Logger::with_config("t", &config).would_log(LogLevel::Debug));

        config.debug = false;
        config.verbose = true;
        let logger = Logger::with_config("t", &config);
        assert!(logger.would_log(LogLevel::Info));
        assert!(!logger.would_log(LogLevel::Debug));

        config.verbose = false;
        assert!(!Logger::with_config("t", &config).would_log(LogLevel::Info));
    }

    #[test]
    fn test_console_format_contains_fields() {
        let logger = Logger::new("session").with_correlation_id("abc-123");
        let builder = logger.info("probe finished").field("latency_ms", 42);
        let rendered = logger.format_console(&builder.entry);
        assert!(rendered.contains("probe finished"));
        assert!(rendered.contains("session=abc-123"));
        assert!(rendered.contains("latency_ms=42"));
    }

    #[test]
    fn test_entry_serializes_to_json() {
        let logger = Logger::new("worker");
        let builder = logger.info("done").field("id", 7);
        let json = serde_json::to_string(&builder.entry).unwrap();
        assert!(json.contains("\"component\":\"worker\""));
        assert!(json.contains("\"id\":7"));
    }
}
