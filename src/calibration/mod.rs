// Calibration module - startup calibration against a reference tone
//
// The calibration workflow:
// 1. Discard `guard` seconds of input while the calibrator tone settles
// 2. Measure the A-weighted, Fast time-weighted RMS for `time` seconds
// 3. delta = reference_db - measured_db, applied to every later level

pub mod calibrator;

pub use calibrator::{calibrate, CalibrationPhase, CalibrationResult, Calibrator};
