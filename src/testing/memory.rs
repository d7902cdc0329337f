//! In-memory source and sink.

use crate::analysis::Levels;
use crate::audio::AcquisitionSource;
use crate::error::{AudioError, OutputError};
use crate::output::RecordSink;

/// Acquisition source replaying a PCM vector
#[derive(Debug, Clone)]
pub struct MemorySource {
    samples: Vec<i16>,
    position: usize,
    sample_rate: u32,
    max_read: Option<usize>,
}

impl MemorySource {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            position: 0,
            sample_rate,
            max_read: None,
        }
    }

    /// Deliver at most `frames` per read, like a device with a small period
    pub fn with_max_read(mut self, frames: usize) -> Self {
        self.max_read = Some(frames.max(1));
        self
    }

    pub fn remaining(&self) -> usize {
        self.samples.len() - self.position
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl AcquisitionSource for MemorySource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, buffer: &mut [i16]) -> Result<usize, AudioError> {
        let limit = self.max_read.unwrap_or(usize::MAX);
        let n = buffer.len().min(self.remaining()).min(limit);
        buffer[..n].copy_from_slice(&self.samples[self.position..self.position + n]);
        self.position += n;
        Ok(n)
    }
}

/// Record sink keeping every batch it receives
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub batches: Vec<Vec<Levels>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records in arrival order
    pub fn records(&self) -> Vec<Levels> {
        self.batches.iter().flatten().copied().collect()
    }
}

impl RecordSink for MemorySink {
    fn write_batch(&mut self, records: &[Levels]) -> Result<(), OutputError> {
        self.batches.push(records.to_vec());
        Ok(())
    }
}
