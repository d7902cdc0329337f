// Level engine - reduces one segment of filtered signal to dB levels
//
// Inputs per segment (both exactly segment_size samples, possibly delivered
// as two spans across the ring wrap):
// - B: A-weighted signal (linear amplitude)
// - D: time-weighted power (Fast detector over B squared)
//
// Outputs:
// - LApeak: max |B|
// - LAE:    sqrt(mean D)
// - LAFmax: sqrt(max D)
// - LAFmin: sqrt(min D)
// - LAeq:   mean of linear LAE over the Leq window
//
// All power values get LEVEL_MARGIN added before the square root, so
// silence maps to a finite floor instead of -inf.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

/// Power floor added before every square root (-100 dB re full scale)
pub const LEVEL_MARGIN: f64 = 1e-10;

/// Levels of one completed segment, in calibrated dB
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Levels {
    pub segment: u64,
    /// Unix time (seconds) at which the segment completed
    #[serde(rename = "ts")]
    pub timestamp: u64,
    #[serde(rename = "LAeq")]
    pub laeq: f64,
    #[serde(rename = "LAFmin")]
    pub lafmin: f64,
    #[serde(rename = "LAE")]
    pub lae: f64,
    #[serde(rename = "LAFmax")]
    pub lafmax: f64,
    #[serde(rename = "LApeak")]
    pub lapeak: f64,
}

/// Seconds since the Unix epoch (0 if the clock is before it)
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Convert a linear amplitude to calibrated dB
///
/// # Arguments
/// * `linear` - Amplitude in full-scale units (already floored)
/// * `pressure_reference` - Reference pressure in the same units
/// * `calibration_delta` - Offset in dB added to the result
pub fn linear_to_db(linear: f64, pressure_reference: f64, calibration_delta: f64) -> f64 {
    20.0 * (linear / pressure_reference).log10() + calibration_delta
}

/// Running statistics over one segment, fed span by span
#[derive(Debug, Clone)]
pub struct SegmentAccumulator {
    peak_square: f64,
    power_sum: f64,
    power_max: f64,
    power_min: f64,
    weighted_count: usize,
    power_count: usize,
}

impl Default for SegmentAccumulator {
    fn default() -> Self {
        Self {
            peak_square: 0.0,
            power_sum: 0.0,
            power_max: f64::NEG_INFINITY,
            power_min: f64::INFINITY,
            weighted_count: 0,
            power_count: 0,
        }
    }
}

impl SegmentAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a span of the A-weighted signal
    pub fn add_weighted(&mut self, span: &[f32]) {
        for &x in span {
            let square = x as f64 * x as f64;
            if square > self.peak_square {
                self.peak_square = square;
            }
        }
        self.weighted_count += span.len();
    }

    /// Add a span of the time-weighted power signal
    pub fn add_power(&mut self, span: &[f32]) {
        for &p in span {
            let p = p as f64;
            self.power_sum += p;
            self.power_max = self.power_max.max(p);
            self.power_min = self.power_min.min(p);
        }
        self.power_count += span.len();
    }

    pub fn power_count(&self) -> usize {
        self.power_count
    }

    pub fn weighted_count(&self) -> usize {
        self.weighted_count
    }
}

/// Linear (floored) amplitudes of one segment, before dB conversion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearLevels {
    pub peak: f64,
    pub exposure: f64,
    pub fast_max: f64,
    pub fast_min: f64,
}

impl LinearLevels {
    /// Reduce an accumulator; an empty accumulator reduces to the floor
    pub fn from_accumulator(acc: &SegmentAccumulator) -> Self {
        let floor = LEVEL_MARGIN.sqrt();
        if acc.power_count == 0 {
            return Self {
                peak: (acc.peak_square + LEVEL_MARGIN).sqrt(),
                exposure: floor,
                fast_max: floor,
                fast_min: floor,
            };
        }
        // The detector output is non-negative in theory; rounding may not be
        let clamp = |p: f64| p.max(0.0);
        Self {
            peak: (acc.peak_square + LEVEL_MARGIN).sqrt(),
            exposure: (clamp(acc.power_sum / acc.power_count as f64) + LEVEL_MARGIN).sqrt(),
            fast_max: (clamp(acc.power_max) + LEVEL_MARGIN).sqrt(),
            fast_min: (clamp(acc.power_min) + LEVEL_MARGIN).sqrt(),
        }
    }
}

/// Equivalent continuous level accumulator over linear segment LAE values
///
/// With a window of N > 0 segments the mean covers the most recent N
/// values; with a window of 0 it covers every value since construction.
#[derive(Debug, Clone)]
pub struct LeqAccumulator {
    window: usize,
    values: VecDeque<f64>,
    sum: f64,
    count: u64,
}

impl LeqAccumulator {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            values: VecDeque::with_capacity(window.min(4096)),
            sum: 0.0,
            count: 0,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Add one linear LAE value and return the running mean
    pub fn push(&mut self, value: f64) -> f64 {
        self.sum += value;
        if self.window == 0 {
            self.count += 1;
            return self.sum / self.count as f64;
        }

        self.values.push_back(value);
        if self.values.len() > self.window {
            if let Some(oldest) = self.values.pop_front() {
                self.sum -= oldest;
            }
        }
        // Subtraction drift must not produce a negative mean
        self.sum = self.sum.max(0.0);
        self.sum / self.values.len() as f64
    }
}

/// Converts segment statistics to calibrated Levels records
#[derive(Debug, Clone)]
pub struct LevelEngine {
    pressure_reference: f64,
    calibration_delta: f64,
    leq: LeqAccumulator,
    segments: u64,
}

impl LevelEngine {
    /// # Arguments
    /// * `pressure_reference` - Reference pressure (20 µPa for air)
    /// * `calibration_delta` - dB offset from calibration (0 when uncalibrated)
    /// * `laeq_time` - Leq window in segments, 0 for cumulative
    pub fn new(pressure_reference: f64, calibration_delta: f64, laeq_time: usize) -> Self {
        Self {
            pressure_reference,
            calibration_delta,
            leq: LeqAccumulator::new(laeq_time),
            segments: 0,
        }
    }

    pub fn calibration_delta(&self) -> f64 {
        self.calibration_delta
    }

    pub fn set_calibration_delta(&mut self, delta: f64) {
        self.calibration_delta = delta;
    }

    /// Segments completed so far
    pub fn segments(&self) -> u64 {
        self.segments
    }

    fn to_db(&self, linear: f64) -> f64 {
        linear_to_db(linear, self.pressure_reference, self.calibration_delta)
    }

    /// Finish a segment and produce its record
    pub fn complete_segment(&mut self, acc: &SegmentAccumulator, timestamp: u64) -> Levels {
        let linear = LinearLevels::from_accumulator(acc);
        let mean_exposure = self.leq.push(linear.exposure);
        let levels = Levels {
            segment: self.segments,
            timestamp,
            laeq: self.to_db(mean_exposure),
            lafmin: self.to_db(linear.fast_min),
            lae: self.to_db(linear.exposure),
            lafmax: self.to_db(linear.fast_max),
            lapeak: self.to_db(linear.peak),
        };
        self.segments += 1;
        levels
    }
}

/// Records collected until `record_period` are available
#[derive(Debug, Clone)]
pub struct RecordBatch {
    period: usize,
    records: Vec<Levels>,
}

impl RecordBatch {
    /// # Panics
    /// Panics if `period` is 0
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "record period must be greater than 0");
        Self {
            period,
            records: Vec::with_capacity(period),
        }
    }

    /// Append a record; returns true when the batch is full
    pub fn push(&mut self, levels: Levels) -> bool {
        self.records.push(levels);
        self.records.len() >= self.period
    }

    pub fn records(&self) -> &[Levels] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
