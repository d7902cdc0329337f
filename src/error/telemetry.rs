// Telemetry error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Telemetry error code constants
///
/// Error code range: 3001-3003
pub struct TelemetryErrorCodes {}

impl TelemetryErrorCodes {
    /// Unix socket could not be bound at the configured path
    pub const BIND_FAILED: i32 = 3001;

    /// Listener could not be switched to non-blocking mode
    pub const SOCKET_SETUP_FAILED: i32 = 3002;

    /// Broadcaster thread could not be spawned
    pub const THREAD_SPAWN_FAILED: i32 = 3003;
}

/// Log a telemetry error with structured context
pub fn log_telemetry_error(err: &TelemetryError, context: &str) {
    error!(
        "Telemetry error in {}: code={}, component=TelemetryBroadcaster, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised while starting the live telemetry broadcaster
///
/// Per-client write failures are not errors: the client is dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryError {
    BindFailed { path: String, reason: String },
    SocketSetupFailed { reason: String },
    ThreadSpawnFailed { reason: String },
}

impl ErrorCode for TelemetryError {
    fn code(&self) -> i32 {
        match self {
            TelemetryError::BindFailed { .. } => TelemetryErrorCodes::BIND_FAILED,
            TelemetryError::SocketSetupFailed { .. } => TelemetryErrorCodes::SOCKET_SETUP_FAILED,
            TelemetryError::ThreadSpawnFailed { .. } => TelemetryErrorCodes::THREAD_SPAWN_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            TelemetryError::BindFailed { path, reason } => {
                format!("Cannot bind telemetry socket {}: {}", path, reason)
            }
            TelemetryError::SocketSetupFailed { reason } => {
                format!("Telemetry socket setup failed: {}", reason)
            }
            TelemetryError::ThreadSpawnFailed { reason } => {
                format!("Cannot start telemetry thread: {}", reason)
            }
        }
    }
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TelemetryError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for TelemetryError {}
