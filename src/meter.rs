// Meter session - calibration followed by the measurement loop
//
// One session owns a MeasurementPipeline and drives it from a single
// AcquisitionSource:
// 1. calibration phase (skipped when calibration.time is 0)
// 2. read block -> pipeline -> completed Levels
//    -> telemetry publisher (every record)
//    -> record batch -> sink (every record_period records)
// 3. on end of stream, duration limit or stop request: flush the partial
//    batch and finalize the audit dump

use crate::analysis::{unix_timestamp, Levels, MeasurementPipeline, RecordBatch};
use crate::audio::{AcquisitionSource, AuditRecorder};
use crate::calibration::{calibrate, CalibrationResult};
use crate::config::AppConfig;
use crate::error::MeterError;
use crate::output::RecordSink;
use crate::telemetry::TelemetryPublisher;

/// Why the measurement loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    DurationReached,
    StopRequested,
}

/// What a completed session did
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// None when a stop was requested before calibration finished
    pub calibration: Option<CalibrationResult>,
    pub segments: u64,
    pub batches: usize,
    /// Samples that went through the measurement pipeline
    pub samples_measured: u64,
    /// Samples still waiting for a segment to complete at exit
    pub pending_samples: usize,
    pub stop_reason: StopReason,
    pub last_levels: Option<Levels>,
}

/// Builder for one meter session
pub struct Meter<'a> {
    config: &'a AppConfig,
    sink: &'a mut dyn RecordSink,
    publisher: Option<TelemetryPublisher>,
    audit: Option<AuditRecorder>,
    max_duration: Option<f64>,
}

impl<'a> Meter<'a> {
    pub fn new(config: &'a AppConfig, sink: &'a mut dyn RecordSink) -> Self {
        Self {
            config,
            sink,
            publisher: None,
            audit: None,
            max_duration: None,
        }
    }

    /// Publish every completed record to live telemetry clients
    pub fn with_publisher(mut self, publisher: TelemetryPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Dump the filter outputs of the measurement phase
    pub fn with_audit(mut self, recorder: AuditRecorder) -> Self {
        self.audit = Some(recorder);
        self
    }

    /// Stop after `seconds` of measured audio (calibration excluded)
    pub fn with_max_duration(mut self, seconds: f64) -> Self {
        self.max_duration = Some(seconds);
        self
    }

    /// Run calibration and measurement until the source ends or a limit hits
    ///
    /// `should_stop` is polled between blocks. Records already completed are
    /// flushed to the sink even when the loop ends with an error.
    ///
    /// # Returns
    /// * `Err(MeterError::Config)` - `config` failed validation
    /// * `Err(MeterError::Audio)` - Pipeline construction or source read failed
    /// * `Err(MeterError::Calibration)` - No usable calibration measurement
    /// * `Err(MeterError::Output)` - Sink write failed
    pub fn run<S, F>(self, source: &mut S, should_stop: F) -> Result<RunSummary, MeterError>
    where
        S: AcquisitionSource + ?Sized,
        F: Fn() -> bool,
    {
        let Meter {
            config,
            sink,
            publisher,
            audit,
            max_duration,
        } = self;

        config.validate()?;

        let sample_rate = source.sample_rate();
        let measurement = &config.measurement;
        let segment_size = measurement.segment_size(sample_rate);
        let mut pipeline = MeasurementPipeline::new(
            sample_rate,
            config.audio.block_size,
            segment_size,
            measurement.pressure_reference,
            measurement.laeq_time,
        )?;

        let calibration = match calibrate(
            source,
            &mut pipeline,
            &config.calibration,
            measurement.pressure_reference,
            &should_stop,
        )? {
            Some(result) => result,
            None => {
                tracing::info!("[Meter] Stopped during calibration, nothing measured");
                return Ok(RunSummary {
                    calibration: None,
                    segments: 0,
                    batches: 0,
                    samples_measured: 0,
                    pending_samples: 0,
                    stop_reason: StopReason::StopRequested,
                    last_levels: None,
                });
            }
        };

        if let Some(recorder) = audit {
            pipeline.attach_audit(recorder);
        }

        tracing::info!(
            "[Meter] Measuring at {} Hz, {} samples per segment, LAeq window {}",
            sample_rate,
            segment_size,
            if measurement.laeq_time == 0 {
                "cumulative".to_string()
            } else {
                format!("{} segments", measurement.laeq_time)
            }
        );

        let max_samples =
            max_duration.map(|seconds| (seconds.max(0.0) * sample_rate as f64).round() as u64);
        let mut buffer = vec![0i16; config.audio.block_size];
        let mut completed: Vec<Levels> = Vec::new();
        let mut batch = RecordBatch::new(measurement.record_period);
        let mut batches = 0usize;
        let mut samples_measured = 0u64;
        let mut last_levels = None;

        let outcome: Result<StopReason, MeterError> = loop {
            if should_stop() {
                break Ok(StopReason::StopRequested);
            }
            let wanted = match max_samples {
                Some(limit) if samples_measured >= limit => break Ok(StopReason::DurationReached),
                Some(limit) => buffer.len().min((limit - samples_measured) as usize),
                None => buffer.len(),
            };

            let n = match source.read(&mut buffer[..wanted]) {
                Ok(0) => break Ok(StopReason::EndOfStream),
                Ok(n) => n,
                Err(err) => break Err(err.into()),
            };
            samples_measured += n as u64;

            if let Err(err) = pipeline.process_block(&buffer[..n], unix_timestamp(), &mut completed)
            {
                break Err(err.into());
            }

            let mut sink_error = None;
            for levels in completed.drain(..) {
                if let Some(publisher) = publisher.as_ref() {
                    publisher.publish(&levels);
                }
                last_levels = Some(levels);
                if batch.push(levels) {
                    match sink.write_batch(batch.records()) {
                        Ok(()) => batches += 1,
                        Err(err) => {
                            sink_error.get_or_insert(err);
                        }
                    }
                    batch.clear();
                }
            }
            if let Some(err) = sink_error {
                break Err(err.into());
            }
        };

        if !batch.is_empty() {
            let flushed = sink.write_batch(batch.records());
            if outcome.is_ok() {
                flushed?;
                batches += 1;
            } else if let Err(err) = flushed {
                tracing::error!("[Meter] Could not flush final batch: {}", err);
            }
        }
        let audit_result = pipeline.finish_audit();

        let stop_reason = outcome?;
        audit_result?;

        let summary = RunSummary {
            calibration: Some(calibration),
            segments: pipeline.segments(),
            batches,
            samples_measured,
            pending_samples: pipeline.pending_samples(),
            stop_reason,
            last_levels,
        };
        tracing::info!(
            "[Meter] Stopped ({:?}) after {} segment(s), {} batch(es)",
            summary.stop_reason,
            summary.segments,
            summary.batches
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, OutputError};
    use crate::testing::{generate_pcm, MemorySink, MemorySource, SyntheticSignal};
    use std::cell::Cell;

    fn config(segment_duration: f64, record_period: usize) -> AppConfig {
        let mut config = AppConfig::default();
        config.measurement.segment_duration = segment_duration;
        config.measurement.record_period = record_period;
        config
    }

    #[test]
    fn test_batches_and_final_flush() {
        // 0.1 s segments, 3 per batch, 1.0 s of audio: 10 segments
        let config = config(0.1, 3);
        let mut source = MemorySource::new(vec![0; 48_000], 48_000);
        let mut sink = MemorySink::new();
        let summary = Meter::new(&config, &mut sink)
            .run(&mut source, || false)
            .unwrap();

        assert_eq!(summary.stop_reason, StopReason::EndOfStream);
        assert_eq!(summary.segments, 10);
        assert_eq!(summary.batches, 4);
        let sizes: Vec<usize> = sink.batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![3, 3, 3, 1]);
        let segments: Vec<u64> = sink.records().iter().map(|l| l.segment).collect();
        assert_eq!(segments, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_duration_limit() {
        let config = config(0.1, 10);
        let mut source = MemorySource::new(vec![0; 48_000], 48_000);
        let mut sink = MemorySink::new();
        let summary = Meter::new(&config, &mut sink)
            .with_max_duration(0.25)
            .run(&mut source, || false)
            .unwrap();

        assert_eq!(summary.stop_reason, StopReason::DurationReached);
        assert_eq!(summary.samples_measured, 12_000);
        assert_eq!(summary.segments, 2);
        assert_eq!(summary.pending_samples, 2_400);
        assert_eq!(source.position(), 12_000);
    }

    #[test]
    fn test_stop_request_ends_loop() {
        let config = config(0.1, 10);
        let mut source = MemorySource::new(vec![0; 48_000], 48_000);
        let mut sink = MemorySink::new();
        let polls = Cell::new(0);
        let summary = Meter::new(&config, &mut sink)
            .run(&mut source, || {
                polls.set(polls.get() + 1);
                polls.get() > 10
            })
            .unwrap();

        assert_eq!(summary.stop_reason, StopReason::StopRequested);
        assert_eq!(summary.samples_measured, 10 * 1024);
        // Two full segments measured, flushed as a partial batch
        assert_eq!(sink.records().len(), 2);
    }

    #[test]
    fn test_calibration_runs_before_measurement() {
        let mut config = config(0.5, 10);
        config.calibration.time = 5.0;
        config.calibration.guard = 0.25;
        let tone = SyntheticSignal::Sine {
            frequency_hz: 1_000.0,
            amplitude: 0.1,
        };
        let mut source = MemorySource::new(generate_pcm(tone, 48_000, 48_000 * 8), 48_000);
        let mut sink = MemorySink::new();
        let summary = Meter::new(&config, &mut sink)
            .run(&mut source, || false)
            .unwrap();

        assert!(summary.calibration.unwrap().complete);
        assert_eq!(summary.samples_measured, 48_000 * 8 - 252_000);
        // The detector starts from rest when measuring begins, so the
        // calibrated tone reads slightly above the reference
        let lae = sink.records()[1].lae;
        assert!((lae - 94.0).abs() < 0.5, "LAE after calibration was {}", lae);
    }

    #[test]
    fn test_stop_during_calibration_guard_is_clean_exit() {
        let mut config = config(1.0, 10);
        config.calibration.time = 5.0;
        config.calibration.guard = 3.0;
        let tone = SyntheticSignal::Sine {
            frequency_hz: 1_000.0,
            amplitude: 0.1,
        };
        let mut source = MemorySource::new(generate_pcm(tone, 48_000, 48_000 * 10), 48_000);
        let mut sink = MemorySink::new();
        let polls = Cell::new(0);
        let summary = Meter::new(&config, &mut sink)
            .run(&mut source, || {
                polls.set(polls.get() + 1);
                polls.get() > 3
            })
            .unwrap();

        assert_eq!(summary.stop_reason, StopReason::StopRequested);
        assert_eq!(summary.calibration, None);
        assert_eq!(summary.segments, 0);
        assert_eq!(summary.samples_measured, 0);
        assert!(sink.batches.is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected_before_reading() {
        let mut config = config(1.0, 10);
        config.measurement.record_period = 0;
        let mut source = MemorySource::new(vec![0; 48_000], 48_000);
        let mut sink = MemorySink::new();
        let result = Meter::new(&config, &mut sink).run(&mut source, || false);

        assert!(matches!(
            result,
            Err(MeterError::Config(ConfigError::InvalidValue {
                field: "measurement.record_period",
                ..
            }))
        ));
        assert_eq!(source.position(), 0);
    }

    struct FailingSink;

    impl RecordSink for FailingSink {
        fn write_batch(&mut self, _records: &[Levels]) -> Result<(), OutputError> {
            Err(OutputError::WriteFailed {
                path: "mem".to_string(),
                reason: "disk full".to_string(),
            })
        }
    }

    #[test]
    fn test_sink_failure_aborts_session() {
        let config = config(0.1, 1);
        let mut source = MemorySource::new(vec![0; 48_000], 48_000);
        let mut sink = FailingSink;
        let result = Meter::new(&config, &mut sink).run(&mut source, || false);
        assert!(matches!(result, Err(MeterError::Output(_))));
    }
}
