//! Configuration management for the sound meter
//!
//! Runtime configuration is loaded from a JSON file. Every section and every
//! field is optional: anything left out falls back to the defaults below, so
//! a config file only needs to name what differs from a standard 48 kHz,
//! one-second-segment station.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::output::ReportFormat;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub measurement: MeasurementConfig,
    pub calibration: CalibrationConfig,
    pub output: OutputConfig,
    pub telemetry: TelemetryConfig,
}

/// Acquisition parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate in Hz (must have A-weighting coefficients)
    pub sample_rate: u32,
    /// Frames requested from the source per read
    pub block_size: usize,
    /// Capture device name; "default" selects the host default input
    pub input_device: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            block_size: 1024,
            input_device: "default".to_string(),
        }
    }
}

/// Segment and record cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementConfig {
    /// Duration of one segment in seconds
    pub segment_duration: f64,
    /// Segments per record batch handed to the report writer
    pub record_period: usize,
    /// Record batches per output file (0 disables rotation)
    pub file_period: usize,
    /// LAeq window in segments (0 selects the cumulative mean)
    pub laeq_time: usize,
    /// Reference pressure in pascal
    pub pressure_reference: f64,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            segment_duration: 1.0,
            record_period: 10,
            file_period: 10,
            // One day of one-second segments
            laeq_time: 60 * 60 * 24,
            pressure_reference: 20e-6,
        }
    }
}

impl MeasurementConfig {
    /// Number of samples in one segment at `sample_rate`
    pub fn segment_size(&self, sample_rate: u32) -> usize {
        (self.segment_duration * sample_rate as f64).round() as usize
    }
}

/// Startup calibration against a reference tone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Measurement window in seconds (0 disables calibration)
    pub time: f64,
    /// Warm-up time discarded before measuring, in seconds
    pub guard: f64,
    /// Level of the reference tone in dB
    pub reference: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            time: 0.0,
            guard: 3.0,
            reference: 94.0,
        }
    }
}

/// Report writer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Station name written into JSON reports
    pub identification: String,
    /// Report file; derived from the input when unset
    pub path: Option<PathBuf>,
    pub format: ReportFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            identification: "STATION_0".to_string(),
            path: None,
            format: ReportFormat::Csv,
        }
    }
}

/// Live telemetry socket
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Unix socket path; the broadcaster is disabled when unset
    pub socket_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// * `Ok(AppConfig)` - Loaded configuration (missing fields defaulted)
    /// * `Err(ConfigError::LoadFailed)` - File unreadable or JSON invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| ConfigError::LoadFailed {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        let config = Self::from_json(&contents).map_err(|err| ConfigError::LoadFailed {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        tracing::info!("[Config] Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Parse a JSON document in either layout
    ///
    /// Sectioned keys (`"audio": { "sample_rate": .. }`) and the flat station
    /// keys (`sample_rate`, `calibration_time`, `output_path`, ...) may be
    /// mixed; a flat key overrides the sectioned value it maps to.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(contents)?;
        let mut config = AppConfig::deserialize(&value)?;
        FlatStationConfig::deserialize(&value)?.apply(&mut config);
        Ok(config)
    }

    /// Reject values the measurement pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audio.sample_rate == 0 {
            return Err(invalid("audio.sample_rate", "must be greater than 0"));
        }
        if self.audio.block_size == 0 {
            return Err(invalid("audio.block_size", "must be greater than 0"));
        }
        if !(self.measurement.segment_duration > 0.0) {
            return Err(invalid(
                "measurement.segment_duration",
                format!("must be positive (got {})", self.measurement.segment_duration),
            ));
        }
        if self.measurement.segment_size(self.audio.sample_rate) == 0 {
            return Err(invalid(
                "measurement.segment_duration",
                "shorter than one sample",
            ));
        }
        if self.measurement.record_period == 0 {
            return Err(invalid("measurement.record_period", "must be greater than 0"));
        }
        if !(self.measurement.pressure_reference > 0.0) {
            return Err(invalid(
                "measurement.pressure_reference",
                "must be a positive pressure in pascal",
            ));
        }
        if !self.measurement.segment_duration.is_finite() {
            return Err(invalid("measurement.segment_duration", "must be finite"));
        }
        for (field, value) in [
            ("calibration.time", self.calibration.time),
            ("calibration.guard", self.calibration.guard),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(
                    field,
                    format!("must be a finite, non-negative duration (got {})", value),
                ));
            }
        }
        Ok(())
    }
}

/// Top-level keys of the flat station config layout
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FlatStationConfig {
    identification: Option<String>,
    input_device: Option<String>,
    sample_rate: Option<u32>,
    segment_duration: Option<f64>,
    block_size: Option<usize>,
    record_period: Option<usize>,
    file_period: Option<usize>,
    laeq_time: Option<usize>,
    output_path: Option<PathBuf>,
    calibration_time: Option<f64>,
    calibration_reference: Option<f64>,
}

impl FlatStationConfig {
    fn apply(self, config: &mut AppConfig) {
        if let Some(value) = self.identification {
            config.output.identification = value;
        }
        if let Some(value) = self.input_device {
            config.audio.input_device = value;
        }
        if let Some(value) = self.sample_rate {
            config.audio.sample_rate = value;
        }
        if let Some(value) = self.segment_duration {
            config.measurement.segment_duration = value;
        }
        if let Some(value) = self.block_size {
            config.audio.block_size = value;
        }
        if let Some(value) = self.record_period {
            config.measurement.record_period = value;
        }
        if let Some(value) = self.file_period {
            config.measurement.file_period = value;
        }
        if let Some(value) = self.laeq_time {
            config.measurement.laeq_time = value;
        }
        if let Some(value) = self.output_path {
            config.output.path = Some(value);
        }
        if let Some(value) = self.calibration_time {
            config.calibration.time = value;
        }
        if let Some(value) = self.calibration_reference {
            config.calibration.reference = value;
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}
