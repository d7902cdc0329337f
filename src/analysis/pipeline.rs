// MeasurementPipeline - owns the complete signal path of one meter session
//
// Per block:
// 1. PCM -> float
// 2. A-weighting (in place)                      -> ring B
// 3. square + Fast time weighting (in place)     -> ring D
// 4. while occupancy(D) >= segment_size: drain one segment from B and D
//    (up to two spans each) into the level engine
//
// Both rings hold segment_size + block_size samples, so a full block always
// fits after the previous drain.

use crate::audio::{pcm_to_float, AuditRecorder, SampleRing};
use crate::error::AudioError;

use super::a_weighting::AWeightingFilter;
use super::levels::{LevelEngine, Levels, SegmentAccumulator};
use super::time_weighting::{square_in_place, TimeWeightingFilter};

pub struct MeasurementPipeline {
    a_weighting: AWeightingFilter,
    time_weighting: TimeWeightingFilter,
    weighted_ring: SampleRing,
    power_ring: SampleRing,
    engine: LevelEngine,
    segment_size: usize,
    block_size: usize,
    weighted_block: Vec<f32>,
    power_block: Vec<f32>,
    audit: Option<AuditRecorder>,
}

impl MeasurementPipeline {
    /// Build the filter chain and rings
    ///
    /// # Arguments
    /// * `sample_rate` - Must be one of the A-weighting rates
    /// * `block_size` - Largest block handed to [`Self::process_block`] at once
    /// * `segment_size` - Samples per Levels record
    /// * `pressure_reference` - Reference pressure for dB conversion
    /// * `laeq_time` - Leq window in segments, 0 for cumulative
    ///
    /// # Returns
    /// * `Err(AudioError::UnsupportedSampleRate)` - No coefficients for the rate
    /// * `Err(AudioError::InvalidBlockSize)` - Zero block or segment size
    pub fn new(
        sample_rate: u32,
        block_size: usize,
        segment_size: usize,
        pressure_reference: f64,
        laeq_time: usize,
    ) -> Result<Self, AudioError> {
        if block_size == 0 || segment_size == 0 {
            return Err(AudioError::InvalidBlockSize {
                block_size,
                segment_size,
            });
        }
        let a_weighting = AWeightingFilter::new(sample_rate)?;
        let capacity = segment_size + block_size;

        tracing::debug!(
            "[Pipeline] {} Hz, block {}, segment {}, ring capacity {}",
            sample_rate,
            block_size,
            segment_size,
            capacity
        );

        Ok(Self {
            a_weighting,
            time_weighting: TimeWeightingFilter::fast(sample_rate),
            weighted_ring: SampleRing::new(capacity),
            power_ring: SampleRing::new(capacity),
            engine: LevelEngine::new(pressure_reference, 0.0, laeq_time),
            segment_size,
            block_size,
            weighted_block: vec![0.0; block_size],
            power_block: vec![0.0; block_size],
            audit: None,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.a_weighting.sample_rate()
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    pub fn calibration_delta(&self) -> f64 {
        self.engine.calibration_delta()
    }

    pub fn set_calibration_delta(&mut self, delta: f64) {
        self.engine.set_calibration_delta(delta);
    }

    /// Samples waiting for the current segment to complete
    pub fn pending_samples(&self) -> usize {
        self.power_ring.occupancy()
    }

    pub fn segments(&self) -> u64 {
        self.engine.segments()
    }

    /// Dump the filter outputs of every measured block
    pub fn attach_audit(&mut self, recorder: AuditRecorder) {
        self.audit = Some(recorder);
    }

    /// Detach and finalize the audit recorder, if any
    pub fn finish_audit(&mut self) -> Result<(), AudioError> {
        match self.audit.take() {
            Some(recorder) => recorder.finalize(),
            None => Ok(()),
        }
    }

    /// Run one chunk (at most `block_size` samples) through both filters
    ///
    /// Leaves the A-weighted signal in `weighted_block` and the time-weighted
    /// power in `power_block`.
    fn filter_chunk(&mut self, pcm: &[i16]) {
        let n = pcm.len();
        let weighted = &mut self.weighted_block[..n];
        pcm_to_float(pcm, weighted);
        self.a_weighting.process(weighted);

        let power = &mut self.power_block[..n];
        power.copy_from_slice(weighted);
        square_in_place(power);
        self.time_weighting.process(power);
    }

    /// Filter a block without feeding the rings, returning its RMS
    ///
    /// Used while calibrating: filter state advances exactly as during a
    /// measurement so it carries over. Returns `sqrt(mean(power))`, or `None`
    /// for an empty block.
    pub fn measure_block_rms(&mut self, pcm: &[i16]) -> Option<f64> {
        if pcm.is_empty() {
            return None;
        }
        let mut sum = 0.0f64;
        for chunk in pcm.chunks(self.block_size) {
            self.filter_chunk(chunk);
            sum += self.power_block[..chunk.len()]
                .iter()
                .map(|&p| p as f64)
                .sum::<f64>();
        }
        Some((sum / pcm.len() as f64).max(0.0).sqrt())
    }

    /// Feed one block and collect every segment it completes
    ///
    /// # Arguments
    /// * `pcm` - Block of any length; longer blocks are split internally
    /// * `timestamp` - Unix seconds stamped on completed records
    /// * `completed` - Receives the records of completed segments
    pub fn process_block(
        &mut self,
        pcm: &[i16],
        timestamp: u64,
        completed: &mut Vec<Levels>,
    ) -> Result<(), AudioError> {
        for chunk in pcm.chunks(self.block_size) {
            let n = chunk.len();
            self.filter_chunk(chunk);

            if let Some(audit) = self.audit.as_mut() {
                audit.record(&self.weighted_block[..n], &self.power_block[..n])?;
            }

            self.weighted_ring.write_all(&self.weighted_block[..n]);
            self.power_ring.write_all(&self.power_block[..n]);

            while self.power_ring.occupancy() >= self.segment_size {
                let levels = self.drain_segment(timestamp);
                tracing::debug!(
                    "[Pipeline] Segment {}: LAE {:.1} dB, LAeq {:.1} dB",
                    levels.segment,
                    levels.lae,
                    levels.laeq
                );
                completed.push(levels);
            }
        }
        Ok(())
    }

    /// Consume exactly one segment from both rings
    fn drain_segment(&mut self, timestamp: u64) -> Levels {
        let mut acc = SegmentAccumulator::new();

        let mut remaining = self.segment_size;
        while remaining > 0 {
            let span = self.weighted_ring.readable_span();
            let n = span.len().min(remaining);
            acc.add_weighted(&span[..n]);
            self.weighted_ring.commit_read(n);
            remaining -= n;
        }

        let mut remaining = self.segment_size;
        while remaining > 0 {
            let span = self.power_ring.readable_span();
            let n = span.len().min(remaining);
            acc.add_power(&span[..n]);
            self.power_ring.commit_read(n);
            remaining -= n;
        }

        self.engine.complete_segment(&acc, timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_completes_on_boundary_not_block_multiple() {
        // 1000-sample segments fed in 300-sample blocks
        let mut pipeline = MeasurementPipeline::new(48_000, 300, 1_000, 20e-6, 0).unwrap();
        let block = [0i16; 300];
        let mut completed = Vec::new();

        for _ in 0..3 {
            pipeline.process_block(&block, 0, &mut completed).unwrap();
        }
        assert!(completed.is_empty());
        assert_eq!(pipeline.pending_samples(), 900);

        pipeline.process_block(&block, 0, &mut completed).unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(pipeline.pending_samples(), 200);

        for _ in 0..6 {
            pipeline.process_block(&block, 0, &mut completed).unwrap();
        }
        assert_eq!(completed.len(), 3);
        assert_eq!(pipeline.pending_samples(), 0);
    }

    #[test]
    fn test_oversized_block_completes_several_segments() {
        let mut pipeline = MeasurementPipeline::new(48_000, 256, 100, 20e-6, 0).unwrap();
        let mut completed = Vec::new();
        pipeline
            .process_block(&[0i16; 1_000], 42, &mut completed)
            .unwrap();
        assert_eq!(completed.len(), 10);
        assert!(completed.iter().all(|l| l.timestamp == 42));
        assert_eq!(completed[9].segment, 9);
    }

    #[test]
    fn test_invalid_sizes_are_rejected() {
        assert!(matches!(
            MeasurementPipeline::new(48_000, 0, 48_000, 20e-6, 0),
            Err(AudioError::InvalidBlockSize { .. })
        ));
        assert!(matches!(
            MeasurementPipeline::new(48_000, 1024, 0, 20e-6, 0),
            Err(AudioError::InvalidBlockSize { .. })
        ));
        assert!(matches!(
            MeasurementPipeline::new(32_000, 1024, 32_000, 20e-6, 0),
            Err(AudioError::UnsupportedSampleRate { .. })
        ));
    }

    #[test]
    fn test_block_rms_of_silence_is_zero() {
        let mut pipeline = MeasurementPipeline::new(44_100, 512, 44_100, 20e-6, 0).unwrap();
        assert_eq!(pipeline.measure_block_rms(&[0i16; 512]), Some(0.0));
        assert_eq!(pipeline.measure_block_rms(&[]), None);
        // Calibration blocks never reach the rings
        assert_eq!(pipeline.pending_samples(), 0);
    }
}
