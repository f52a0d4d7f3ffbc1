//! Error handling for the node selector

pub mod friendly;

pub use friendly::friendly_message;

use crate::models::ProfileStatus;
use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, AppError>;

/// Custom error types for the node selector
///
/// Per-probe failures are NOT represented here; they are classified into
/// [`ProbeFailure`] and absorbed into profile state by the worker that owns
/// the record. `AppError` covers session-level faults and contract
/// violations, which do propagate to callers.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Datastore errors (profile load/persist)
    #[error("Datastore error: {0}")]
    Store(String),

    /// A test session is already running for the group
    #[error("A test session is already running for group {group_id}")]
    SessionAlreadyRunning { group_id: i64 },

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Parsing errors (profile files, URLs)
    #[error("Parsing error: {0}")]
    Parse(String),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new datastore error
    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store(message.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new parsing error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Store(_) => "STORE",
            Self::SessionAlreadyRunning { .. } => "SESSION",
            Self::Validation(_) => "VALIDATION",
            Self::Parse(_) => "PARSE",
            Self::Io(_) => "IO",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Get exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => 1,
            Self::Store(_) => 2,
            Self::SessionAlreadyRunning { .. } => 3,
            Self::Io(_) => 5,
            Self::Internal(_) => 99,
        }
    }

    /// Format error for console display with color coding
    pub fn format_for_console(&self, use_color: bool) -> String {
        let category = self.category();
        let message = self.to_string();

        if use_color {
            use colored::Colorize;
            match self {
                Self::Config(_) | Self::Validation(_) | Self::Parse(_) => {
                    format!("[{}] {}", category.red().bold(), message.red())
                }
                Self::Store(_) => {
                    format!("[{}] {}", category.yellow().bold(), message.yellow())
                }
                Self::SessionAlreadyRunning { .. } => {
                    format!("[{}] {}", category.blue().bold(), message.blue())
                }
                Self::Io(_) => {
                    format!("[{}] {}", category.cyan().bold(), message.cyan())
                }
                Self::Internal(_) => {
                    format!("[{}] {}", category.bright_red().bold(), message.bright_red())
                }
            }
        } else {
            format!("[{}] {}", category, message)
        }
    }
}

// Standard library error conversions
impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(error: url::ParseError) -> Self {
        Self::parse(format!("URL parse error: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON error: {}", error))
    }
}

/// Classified outcome of a single failed probe.
///
/// The prober reports exactly one of these per failed measurement; the
/// owning worker turns it into profile state and never rethrows it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    #[error("Connection timed out")]
    Timeout,

    #[error("Connection refused")]
    ConnectionRefused,

    #[error("Network unreachable")]
    NetworkUnreachable,

    #[error("Domain not found")]
    DomainNotFound,

    /// The protocol family needs a capability (e.g. a plugin) that is not
    /// present at runtime
    #[error("Missing capability: {0}")]
    CapabilityUnavailable(String),

    /// Anything outside the well-known categories, carrying raw detail
    #[error("{0}")]
    Unclassified(String),
}

impl ProbeFailure {
    /// Classify an I/O error from a connect attempt
    pub fn from_io(error: &std::io::Error) -> Self {
        use std::io::ErrorKind;
        match error.kind() {
            ErrorKind::TimedOut => Self::Timeout,
            ErrorKind::ConnectionRefused => Self::ConnectionRefused,
            ErrorKind::NetworkUnreachable | ErrorKind::HostUnreachable => {
                Self::NetworkUnreachable
            }
            _ => {
                // Raw OS error strings still carry the errno name on unix
                let detail = error.to_string();
                if detail.contains("ECONNREFUSED") {
                    Self::ConnectionRefused
                } else if detail.contains("ENETUNREACH") || detail.contains("EHOSTUNREACH") {
                    Self::NetworkUnreachable
                } else {
                    Self::Unclassified(detail)
                }
            }
        }
    }

    /// Two-tier classification into profile state (status, human detail).
    ///
    /// Well-known network categories map crisply to Unreachable; a missing
    /// capability and anything unclassified map to Error, the latter after a
    /// friendly-message lookup on the raw detail.
    pub fn classify(&self) -> (ProfileStatus, String) {
        match self {
            Self::Timeout
            | Self::ConnectionRefused
            | Self::NetworkUnreachable
            | Self::DomainNotFound => (ProfileStatus::Unreachable, self.to_string()),
            Self::CapabilityUnavailable(_) => (ProfileStatus::Error, self.to_string()),
            Self::Unclassified(detail) => {
                let rendered = friendly_message(detail)
                    .map(str::to_string)
                    .unwrap_or_else(|| detail.clone());
                (ProfileStatus::Error, rendered)
            }
        }
    }
}
