// Error types for the sound meter
//
// This module defines one error enum per concern (acquisition, calibration,
// telemetry, report output, configuration), each carrying a stable numeric
// code so the binary and log consumers can react to failures uniformly.

mod audio;
mod calibration;
mod config;
mod output;
mod telemetry;

use std::fmt;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use calibration::{log_calibration_error, CalibrationError, CalibrationErrorCodes};
pub use config::{ConfigError, ConfigErrorCodes};
pub use output::{OutputError, OutputErrorCodes};
pub use telemetry::{log_telemetry_error, TelemetryError, TelemetryErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the library and the binaries.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

/// Failure of a complete meter session
///
/// Wraps the per-concern errors that can abort [`crate::meter::Meter::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum MeterError {
    Config(ConfigError),
    Audio(AudioError),
    Calibration(CalibrationError),
    Output(OutputError),
}

impl ErrorCode for MeterError {
    fn code(&self) -> i32 {
        match self {
            MeterError::Config(err) => err.code(),
            MeterError::Audio(err) => err.code(),
            MeterError::Calibration(err) => err.code(),
            MeterError::Output(err) => err.code(),
        }
    }

    fn message(&self) -> String {
        match self {
            MeterError::Config(err) => err.message(),
            MeterError::Audio(err) => err.message(),
            MeterError::Calibration(err) => err.message(),
            MeterError::Output(err) => err.message(),
        }
    }
}

impl fmt::Display for MeterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeterError::Config(err) => err.fmt(f),
            MeterError::Audio(err) => err.fmt(f),
            MeterError::Calibration(err) => err.fmt(f),
            MeterError::Output(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for MeterError {}

impl From<ConfigError> for MeterError {
    fn from(err: ConfigError) -> Self {
        MeterError::Config(err)
    }
}

impl From<AudioError> for MeterError {
    fn from(err: AudioError) -> Self {
        MeterError::Audio(err)
    }
}

impl From<CalibrationError> for MeterError {
    fn from(err: CalibrationError) -> Self {
        MeterError::Calibration(err)
    }
}

impl From<OutputError> for MeterError {
    fn from(err: OutputError) -> Self {
        MeterError::Output(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_trait() {
        let audio_err: &dyn ErrorCode = &AudioError::UnsupportedSampleRate { sample_rate: 8000 };
        assert_eq!(audio_err.code(), 1002);

        let cal_err: &dyn ErrorCode = &CalibrationError::InsufficientSamples {
            required: 1,
            collected: 0,
        };
        assert_eq!(cal_err.code(), 2001);
    }

    #[test]
    fn test_meter_error_delegates_code() {
        let err: MeterError = OutputError::WriteFailed {
            path: "levels.csv".to_string(),
            reason: "disk full".to_string(),
        }
        .into();
        assert_eq!(err.code(), OutputErrorCodes::WRITE_FAILED);
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_error_propagation() {
        fn may_fail() -> Result<(), AudioError> {
            Err(AudioError::ReadFailed {
                reason: "device unplugged".to_string(),
            })
        }

        fn caller() -> Result<(), MeterError> {
            may_fail()?;
            Ok(())
        }

        match caller() {
            Err(MeterError::Audio(AudioError::ReadFailed { reason })) => {
                assert!(reason.contains("unplugged"));
            }
            other => panic!("Expected wrapped ReadFailed, got {:?}", other),
        }
    }
}
