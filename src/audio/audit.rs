// AuditRecorder - dumps intermediate signals for offline inspection
//
// Writes the A-weighted signal and the time-weighted power signal as two
// mono 32-bit float WAV files, so a measurement can be replayed in any audio
// editor and the filter stages checked against a reference meter.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::error::AudioError;

pub const WEIGHTED_FILE: &str = "a_weighted.wav";
pub const POWER_FILE: &str = "time_weighted_power.wav";

type FloatWriter = WavWriter<BufWriter<File>>;

/// Recorder for the filter-chain outputs
pub struct AuditRecorder {
    weighted: FloatWriter,
    power: FloatWriter,
    directory: PathBuf,
}

impl AuditRecorder {
    /// Create `directory` (if needed) and open both dump files in it
    pub fn create<P: AsRef<Path>>(directory: P, sample_rate: u32) -> Result<Self, AudioError> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory).map_err(|e| AudioError::AuditWriteFailed {
            reason: format!("{}: {}", directory.display(), e),
        })?;

        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let open = |name: &str| {
            let path = directory.join(name);
            WavWriter::create(&path, spec).map_err(|e| AudioError::AuditWriteFailed {
                reason: format!("{}: {}", path.display(), e),
            })
        };
        let weighted = open(WEIGHTED_FILE)?;
        let power = open(POWER_FILE)?;

        tracing::info!("[AuditRecorder] Writing filter outputs to {:?}", directory);
        Ok(Self {
            weighted,
            power,
            directory,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Append one block of both signals
    pub fn record(&mut self, weighted: &[f32], power: &[f32]) -> Result<(), AudioError> {
        write_samples(&mut self.weighted, weighted)?;
        write_samples(&mut self.power, power)
    }

    /// Flush and patch the WAV headers
    pub fn finalize(self) -> Result<(), AudioError> {
        self.weighted.finalize().map_err(audit_failed)?;
        self.power.finalize().map_err(audit_failed)
    }
}

fn write_samples(writer: &mut FloatWriter, samples: &[f32]) -> Result<(), AudioError> {
    for &sample in samples {
        writer.write_sample(sample).map_err(audit_failed)?;
    }
    Ok(())
}

fn audit_failed(err: hound::Error) -> AudioError {
    AudioError::AuditWriteFailed {
        reason: err.to_string(),
    }
}
