// Analysis module - A-weighted level measurement
//
// Signal path for every block of PCM:
//   AWeightingFilter -> SampleRing B
//   square -> TimeWeightingFilter (Fast) -> SampleRing D
// and, once a segment's worth of samples is buffered, LevelEngine reduces it
// to one Levels record. MeasurementPipeline owns all of that state.

pub mod a_weighting;
pub mod levels;
pub mod pipeline;
pub mod time_weighting;

pub use a_weighting::{AWeightingFilter, Biquad, BiquadCoefficients, SUPPORTED_SAMPLE_RATES};
pub use levels::{
    linear_to_db, unix_timestamp, LeqAccumulator, LevelEngine, Levels, RecordBatch,
    SegmentAccumulator, LEVEL_MARGIN,
};
pub use pipeline::MeasurementPipeline;
pub use time_weighting::{square_in_place, TimeWeightingFilter};
