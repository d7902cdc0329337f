// Configuration error types and constants

use crate::error::ErrorCode;
use std::fmt;

/// Configuration error code constants
///
/// Error code range: 5001-5002
pub struct ConfigErrorCodes {}

impl ConfigErrorCodes {
    /// Config file missing, unreadable or not valid JSON
    pub const LOAD_FAILED: i32 = 5001;

    /// A configured value is out of range
    pub const INVALID_VALUE: i32 = 5002;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    LoadFailed { path: String, reason: String },
    InvalidValue { field: &'static str, reason: String },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> i32 {
        match self {
            ConfigError::LoadFailed { .. } => ConfigErrorCodes::LOAD_FAILED,
            ConfigError::InvalidValue { .. } => ConfigErrorCodes::INVALID_VALUE,
        }
    }

    fn message(&self) -> String {
        match self {
            ConfigError::LoadFailed { path, reason } => {
                format!("Configuration file {}: {}", path, reason)
            }
            ConfigError::InvalidValue { field, reason } => {
                format!("Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConfigError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ConfigError {}
