// Report output error types and constants

use crate::error::ErrorCode;
use std::fmt;

/// Output error code constants
///
/// Error code range: 4001-4002
pub struct OutputErrorCodes {}

impl OutputErrorCodes {
    /// Report file could not be created
    pub const CREATE_FAILED: i32 = 4001;

    /// Writing or syncing a report file failed
    pub const WRITE_FAILED: i32 = 4002;
}

/// Report writer errors
#[derive(Debug, Clone, PartialEq)]
pub enum OutputError {
    CreateFailed { path: String, reason: String },
    WriteFailed { path: String, reason: String },
}

impl ErrorCode for OutputError {
    fn code(&self) -> i32 {
        match self {
            OutputError::CreateFailed { .. } => OutputErrorCodes::CREATE_FAILED,
            OutputError::WriteFailed { .. } => OutputErrorCodes::WRITE_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            OutputError::CreateFailed { path, reason } => {
                format!("Cannot create report file {}: {}", path, reason)
            }
            OutputError::WriteFailed { path, reason } => {
                format!("Cannot write report file {}: {}", path, reason)
            }
        }
    }
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OutputError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for OutputError {}
