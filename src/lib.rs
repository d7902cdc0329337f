// Sound Meter Core - A-weighted sound level measurement
//
// Single-threaded signal path (acquisition -> A-weighting -> Fast detector ->
// segment levels) with a background thread pushing live levels to Unix
// socket clients.

#![deny(rustdoc::broken_intra_doc_links)]

// Module declarations
pub mod analysis;
pub mod audio;
pub mod calibration;
pub mod config;
pub mod error;
pub mod logging;
pub mod meter;
pub mod output;
pub mod shutdown;
pub mod telemetry;
pub mod testing;

// Re-exports for convenience
pub use analysis::{Levels, MeasurementPipeline};
pub use config::AppConfig;
pub use error::{ErrorCode, MeterError};
pub use meter::{Meter, RunSummary, StopReason};
