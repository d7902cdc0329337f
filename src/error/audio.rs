// Audio error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// Single source of truth for the numeric codes reported by [`AudioError`].
///
/// Error code range: 1001-1008
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// Capture device could not be found or opened
    pub const DEVICE_OPEN_FAILED: i32 = 1001;

    /// No A-weighting coefficients exist for the requested sample rate
    pub const UNSUPPORTED_SAMPLE_RATE: i32 = 1002;

    /// PCM layout is not 16-bit signed (or the device offers no usable format)
    pub const UNSUPPORTED_FORMAT: i32 = 1003;

    /// WAV input file could not be opened or parsed
    pub const FILE_OPEN_FAILED: i32 = 1004;

    /// Reading from an open source failed
    pub const READ_FAILED: i32 = 1005;

    /// Capture stream reported an error or disconnected
    pub const STREAM_FAILURE: i32 = 1006;

    /// Block or segment size is zero or inconsistent
    pub const INVALID_BLOCK_SIZE: i32 = 1007;

    /// Audit WAV dump could not be written
    pub const AUDIT_WRITE_FAILED: i32 = 1008;
}

/// Log an audio error with structured context
///
/// This function logs audio errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: Additional contextual information
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=Acquisition, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Acquisition and signal-path errors
///
/// These errors cover opening and reading the PCM source as well as the
/// construction-time checks of the filter chain.
///
/// Error code range: 1001-1008
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Capture device could not be found or opened
    DeviceOpenFailed { device: String, reason: String },

    /// No A-weighting coefficients exist for this rate
    UnsupportedSampleRate { sample_rate: u32 },

    /// PCM layout is not usable
    UnsupportedFormat { details: String },

    /// WAV input file could not be opened or parsed
    FileOpenFailed { path: String, reason: String },

    /// Reading from an open source failed
    ReadFailed { reason: String },

    /// Capture stream reported an error or disconnected
    StreamFailure { reason: String },

    /// Block or segment size is zero or inconsistent
    InvalidBlockSize { block_size: usize, segment_size: usize },

    /// Audit WAV dump could not be written
    AuditWriteFailed { reason: String },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::DeviceOpenFailed { .. } => AudioErrorCodes::DEVICE_OPEN_FAILED,
            AudioError::UnsupportedSampleRate { .. } => AudioErrorCodes::UNSUPPORTED_SAMPLE_RATE,
            AudioError::UnsupportedFormat { .. } => AudioErrorCodes::UNSUPPORTED_FORMAT,
            AudioError::FileOpenFailed { .. } => AudioErrorCodes::FILE_OPEN_FAILED,
            AudioError::ReadFailed { .. } => AudioErrorCodes::READ_FAILED,
            AudioError::StreamFailure { .. } => AudioErrorCodes::STREAM_FAILURE,
            AudioError::InvalidBlockSize { .. } => AudioErrorCodes::INVALID_BLOCK_SIZE,
            AudioError::AuditWriteFailed { .. } => AudioErrorCodes::AUDIT_WRITE_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::DeviceOpenFailed { device, reason } => {
                format!("Cannot open audio device {}: {}", device, reason)
            }
            AudioError::UnsupportedSampleRate { sample_rate } => {
                format!(
                    "Unsupported sample rate {} Hz (supported: 44100, 48000)",
                    sample_rate
                )
            }
            AudioError::UnsupportedFormat { details } => {
                format!("Unsupported PCM format: {}", details)
            }
            AudioError::FileOpenFailed { path, reason } => {
                format!("Can't load wave file {}: {}", path, reason)
            }
            AudioError::ReadFailed { reason } => {
                format!("Read from audio source failed: {}", reason)
            }
            AudioError::StreamFailure { reason } => {
                format!("Audio stream failed: {}", reason)
            }
            AudioError::InvalidBlockSize {
                block_size,
                segment_size,
            } => {
                format!(
                    "Invalid block/segment size (block {}, segment {})",
                    block_size, segment_size
                )
            }
            AudioError::AuditWriteFailed { reason } => {
                format!("Audit dump failed: {}", reason)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::ReadFailed {
            reason: err.to_string(),
        }
    }
}
