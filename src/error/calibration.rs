// Calibration error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Calibration error code constants
///
/// Error code range: 2001-2002
pub struct CalibrationErrorCodes {}

impl CalibrationErrorCodes {
    /// Source ended before any measurement block was collected
    pub const INSUFFICIENT_SAMPLES: i32 = 2001;

    /// Reference tone measurement produced an unusable level
    pub const INVALID_MEASUREMENT: i32 = 2002;
}

/// Log a calibration error with structured context
///
/// This function logs calibration errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: Additional contextual information
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    error!(
        "Calibration error in {}: code={}, component=Calibrator, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Calibration-related errors
///
/// Error code range: 2001-2002
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Source ended before enough blocks were measured
    InsufficientSamples { required: usize, collected: usize },

    /// The measured reference level is not a finite number
    InvalidMeasurement { reason: String },
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::InsufficientSamples { .. } => {
                CalibrationErrorCodes::INSUFFICIENT_SAMPLES
            }
            CalibrationError::InvalidMeasurement { .. } => {
                CalibrationErrorCodes::INVALID_MEASUREMENT
            }
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::InsufficientSamples {
                required,
                collected,
            } => {
                format!(
                    "Insufficient calibration blocks: need {}, got {}",
                    required, collected
                )
            }
            CalibrationError::InvalidMeasurement { reason } => {
                format!("Invalid calibration measurement: {}", reason)
            }
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {}
