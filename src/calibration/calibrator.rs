// Calibrator - derives the dB offset that makes a reference tone read its
// nominal level
//
// Timeline, in samples since the source was opened:
//   [0, guard)                 Guard: blocks read and discarded, filters idle
//   [guard, guard + time)      Measuring: filter chain runs, block RMS summed
//   guard + time               Complete
// Reads are shortened at each boundary so a block never spans two phases.

use crate::analysis::{linear_to_db, MeasurementPipeline};
use crate::audio::AcquisitionSource;
use crate::config::CalibrationConfig;
use crate::error::{CalibrationError, MeterError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    Guard,
    Measuring,
    Complete,
}

/// Outcome of a calibration run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationResult {
    /// Offset added to every level from now on
    pub delta: f64,
    /// Uncalibrated level of the reference tone
    pub measured_db: f64,
    /// Blocks that contributed to the measurement
    pub blocks: usize,
    /// False when the source ended inside the measuring window
    pub complete: bool,
}

impl CalibrationResult {
    /// Result used when calibration is disabled
    pub fn disabled() -> Self {
        Self {
            delta: 0.0,
            measured_db: 0.0,
            blocks: 0,
            complete: true,
        }
    }
}

/// Sample-clock driven calibration state machine
#[derive(Debug, Clone)]
pub struct Calibrator {
    reference: f64,
    pressure_reference: f64,
    guard_end: u64,
    measure_end: u64,
    elapsed: u64,
    rms_sum: f64,
    blocks: usize,
}

impl Calibrator {
    /// # Arguments
    /// * `config` - Guard and measurement durations plus the reference level
    /// * `pressure_reference` - Reference pressure used for dB conversion
    /// * `sample_rate` - Rate of the source, converts seconds to samples
    pub fn new(config: &CalibrationConfig, pressure_reference: f64, sample_rate: u32) -> Self {
        let rate = sample_rate as f64;
        let guard_end = (config.guard.max(0.0) * rate).round() as u64;
        let measure_end = guard_end.saturating_add((config.time.max(0.0) * rate).round() as u64);
        Self {
            reference: config.reference,
            pressure_reference,
            guard_end,
            measure_end,
            elapsed: 0,
            rms_sum: 0.0,
            blocks: 0,
        }
    }

    pub fn phase(&self) -> CalibrationPhase {
        if self.elapsed < self.guard_end {
            CalibrationPhase::Guard
        } else if self.elapsed < self.measure_end {
            CalibrationPhase::Measuring
        } else {
            CalibrationPhase::Complete
        }
    }

    /// Samples consumed since the start
    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    pub fn blocks(&self) -> usize {
        self.blocks
    }

    /// Length of the next read so it ends on or before the next phase boundary
    pub fn next_read_len(&self, block_size: usize) -> usize {
        let boundary = match self.phase() {
            CalibrationPhase::Guard => self.guard_end,
            CalibrationPhase::Measuring => self.measure_end,
            CalibrationPhase::Complete => return 0,
        };
        ((boundary - self.elapsed) as usize).min(block_size)
    }

    /// Account for one block read from the source
    ///
    /// Guard blocks are dropped without touching the filters. Measuring blocks
    /// run through `pipeline` so its filter state is warm afterwards.
    pub fn feed(&mut self, pcm: &[i16], pipeline: &mut MeasurementPipeline) {
        match self.phase() {
            CalibrationPhase::Guard => {}
            CalibrationPhase::Measuring => {
                if let Some(rms) = pipeline.measure_block_rms(pcm) {
                    self.rms_sum += rms;
                    self.blocks += 1;
                }
            }
            CalibrationPhase::Complete => return,
        }
        self.elapsed += pcm.len() as u64;
    }

    /// Compute the delta from the blocks measured so far
    ///
    /// # Returns
    /// * `Err(CalibrationError::InsufficientSamples)` - No block was measured
    /// * `Err(CalibrationError::InvalidMeasurement)` - Reference tone measured as silence
    pub fn finish(&self) -> Result<CalibrationResult, CalibrationError> {
        if self.blocks == 0 {
            return Err(CalibrationError::InsufficientSamples {
                required: 1,
                collected: 0,
            });
        }
        let mean_rms = self.rms_sum / self.blocks as f64;
        if !(mean_rms > 0.0) || !mean_rms.is_finite() {
            return Err(CalibrationError::InvalidMeasurement {
                reason: format!("mean reference RMS is {}", mean_rms),
            });
        }
        let measured_db = linear_to_db(mean_rms, self.pressure_reference, 0.0);
        Ok(CalibrationResult {
            delta: self.reference - measured_db,
            measured_db,
            blocks: self.blocks,
            complete: self.phase() == CalibrationPhase::Complete,
        })
    }
}

/// Run the calibration phase against `source`
///
/// Reads until the measuring window closes or the source ends. The resulting
/// delta is installed in `pipeline`.
///
/// # Returns
/// * `Ok(Some(result))` - Calibration ran (or is disabled)
/// * `Ok(None)` - `should_stop` returned true before the window closed; no
///   delta is installed
pub fn calibrate<S, F>(
    source: &mut S,
    pipeline: &mut MeasurementPipeline,
    config: &CalibrationConfig,
    pressure_reference: f64,
    should_stop: F,
) -> Result<Option<CalibrationResult>, MeterError>
where
    S: AcquisitionSource + ?Sized,
    F: Fn() -> bool,
{
    if config.time <= 0.0 {
        tracing::info!("[Calibrator] Calibration disabled, delta 0 dB");
        pipeline.set_calibration_delta(0.0);
        return Ok(Some(CalibrationResult::disabled()));
    }

    let mut calibrator = Calibrator::new(config, pressure_reference, source.sample_rate());
    let mut buffer = vec![0i16; pipeline.block_size()];

    tracing::info!(
        "[Calibrator] Guard {:.1} s, measuring {:.1} s against {:.1} dB",
        config.guard,
        config.time,
        config.reference
    );

    loop {
        let wanted = calibrator.next_read_len(buffer.len());
        if wanted == 0 {
            break;
        }
        if should_stop() {
            tracing::info!(
                "[Calibrator] Stop requested after {} sample(s), calibration abandoned",
                calibrator.elapsed()
            );
            return Ok(None);
        }
        let n = source.read(&mut buffer[..wanted])?;
        if n == 0 {
            break;
        }
        let was_guard = calibrator.phase() == CalibrationPhase::Guard;
        calibrator.feed(&buffer[..n], pipeline);
        if was_guard && calibrator.phase() != CalibrationPhase::Guard {
            tracing::debug!("[Calibrator] Guard time elapsed, measuring");
        }
    }

    let result = calibrator.finish()?;
    if !result.complete {
        tracing::warn!(
            "[Calibrator] Source ended early, calibrating from {} block(s)",
            result.blocks
        );
    }
    tracing::info!(
        "[Calibrator] Measured {:.2} dB, delta {:+.2} dB ({} blocks)",
        result.measured_db,
        result.delta,
        result.blocks
    );
    pipeline.set_calibration_delta(result.delta);
    Ok(Some(result))
}
