// SampleRing - single-producer/single-consumer float ring for the signal path
//
// Decouples the acquisition block cadence from the segment cadence of the
// level engine. Storage is a fixed arena addressed by two monotonically
// increasing counters; the physical index is `counter % capacity`.
//
// Access is span based, so wrap-around never copies:
// 1. `writable_span()` returns the next contiguous free region
// 2. the caller fills a prefix of it and calls `commit_write(n)`
// 3. near the end of the arena the span is shorter than the free space and
//    the caller issues a second span/commit for the remainder
// Reads mirror this with `readable_span()` / `commit_read(n)`.
//
// The ring carries no synchronization: producer and consumer are the same
// thread in the measurement pipeline.

/// Fixed-capacity sample ring with explicit contiguous spans
#[derive(Debug)]
pub struct SampleRing {
    buffer: Vec<f32>,
    written: u64,
    read: u64,
}

impl SampleRing {
    /// Create a ring holding at most `capacity` samples
    ///
    /// # Panics
    /// Panics if capacity is 0
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        Self {
            buffer: vec![0.0; capacity],
            written: 0,
            read: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Samples written but not yet read
    pub fn occupancy(&self) -> usize {
        (self.written - self.read) as usize
    }

    pub fn free(&self) -> usize {
        self.capacity() - self.occupancy()
    }

    pub fn total_written(&self) -> u64 {
        self.written
    }

    pub fn total_read(&self) -> u64 {
        self.read
    }

    fn write_index(&self) -> usize {
        (self.written % self.capacity() as u64) as usize
    }

    fn read_index(&self) -> usize {
        (self.read % self.capacity() as u64) as usize
    }

    /// Next contiguous region that may be written
    ///
    /// May be shorter than `free()` when the region wraps.
    pub fn writable_span(&mut self) -> &mut [f32] {
        let start = self.write_index();
        let len = self.free().min(self.capacity() - start);
        &mut self.buffer[start..start + len]
    }

    /// Publish `n` samples written into the last writable span
    ///
    /// # Panics
    /// Panics if `n` exceeds the free space or the contiguous span
    pub fn commit_write(&mut self, n: usize) {
        let free = self.free();
        assert!(
            n <= free,
            "commit_write({}) exceeds free space ({} of {})",
            n,
            free,
            self.capacity()
        );
        let contiguous = self.capacity() - self.write_index();
        assert!(
            n <= contiguous,
            "commit_write({}) crosses the wrap boundary ({} contiguous)",
            n,
            contiguous
        );
        self.written += n as u64;
    }

    /// Next contiguous region of unread samples
    ///
    /// May be shorter than `occupancy()` when the data wraps.
    pub fn readable_span(&self) -> &[f32] {
        let start = self.read_index();
        let len = self.occupancy().min(self.capacity() - start);
        &self.buffer[start..start + len]
    }

    /// Release `n` samples from the front of the readable span
    ///
    /// # Panics
    /// Panics if `n` exceeds the occupancy or the contiguous span
    pub fn commit_read(&mut self, n: usize) {
        let occupancy = self.occupancy();
        assert!(
            n <= occupancy,
            "commit_read({}) exceeds occupancy ({})",
            n,
            occupancy
        );
        let contiguous = self.capacity() - self.read_index();
        assert!(
            n <= contiguous,
            "commit_read({}) crosses the wrap boundary ({} contiguous)",
            n,
            contiguous
        );
        self.read += n as u64;
    }

    /// Copy all of `samples` into the ring using at most two spans
    ///
    /// # Panics
    /// Panics if `samples` does not fit in the free space
    pub fn write_all(&mut self, samples: &[f32]) {
        assert!(
            samples.len() <= self.free(),
            "write of {} samples exceeds free space ({})",
            samples.len(),
            self.free()
        );
        let mut remaining = samples;
        while !remaining.is_empty() {
            let span = self.writable_span();
            let n = span.len().min(remaining.len());
            span[..n].copy_from_slice(&remaining[..n]);
            self.commit_write(n);
            remaining = &remaining[n..];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn test_new_ring_is_empty() {
        let ring = SampleRing::new(8);
        assert_eq!(ring.capacity(), 8);
        assert_eq!(ring.occupancy(), 0);
        assert_eq!(ring.free(), 8);
        assert!(ring.readable_span().is_empty());
    }

    #[test]
    fn test_span_shortens_at_wrap_boundary() {
        let mut ring = SampleRing::new(8);
        ring.write_all(&[1.0; 6]);
        ring.commit_read(5);

        // write index at 6: only 2 contiguous slots though 7 are free
        assert_eq!(ring.free(), 7);
        assert_eq!(ring.writable_span().len(), 2);

        ring.write_all(&[2.0, 3.0, 4.0, 5.0]);
        assert_eq!(ring.occupancy(), 5);

        // read index at 5: first span holds 3, second the wrapped 2
        let first = ring.readable_span().to_vec();
        assert_eq!(first, vec![1.0, 2.0, 3.0]);
        ring.commit_read(first.len());
        let second = ring.readable_span().to_vec();
        assert_eq!(second, vec![4.0, 5.0]);
        ring.commit_read(second.len());
        assert_eq!(ring.occupancy(), 0);
    }

    #[test]
    fn test_counters_are_not_wrapped() {
        let mut ring = SampleRing::new(4);
        for _ in 0..10 {
            ring.write_all(&[0.5; 3]);
            let n = ring.readable_span().len();
            ring.commit_read(n);
            let n = ring.readable_span().len();
            ring.commit_read(n);
        }
        assert_eq!(ring.total_written(), 30);
        assert_eq!(ring.total_read(), 30);
    }

    #[test]
    fn test_occupancy_matches_counters_for_random_sequences() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut ring = SampleRing::new(37);
        let mut next_value = 0u32;
        let mut expected_next_read = 0u32;

        for _ in 0..5_000 {
            if rng.gen_bool(0.5) {
                let n = rng.gen_range(0..=ring.free());
                let chunk: Vec<f32> = (0..n)
                    .map(|_| {
                        next_value += 1;
                        next_value as f32
                    })
                    .collect();
                ring.write_all(&chunk);
            } else {
                let span = ring.readable_span();
                let n = rng.gen_range(0..=span.len());
                for &value in &span[..n] {
                    expected_next_read += 1;
                    assert_eq!(value, expected_next_read as f32, "samples out of order");
                }
                ring.commit_read(n);
            }
            assert_eq!(
                ring.occupancy() as u64,
                ring.total_written() - ring.total_read()
            );
            assert!(ring.occupancy() <= ring.capacity());
        }
    }

    #[test]
    #[should_panic(expected = "exceeds free space")]
    fn test_commit_write_beyond_free_space_panics() {
        let mut ring = SampleRing::new(4);
        ring.write_all(&[1.0; 3]);
        ring.commit_write(2);
    }

    #[test]
    #[should_panic(expected = "exceeds free space")]
    fn test_write_all_overflow_panics() {
        let mut ring = SampleRing::new(4);
        ring.write_all(&[1.0; 5]);
    }

    #[test]
    #[should_panic(expected = "exceeds occupancy")]
    fn test_commit_read_beyond_occupancy_panics() {
        let mut ring = SampleRing::new(4);
        ring.write_all(&[1.0; 2]);
        ring.commit_read(3);
    }

    #[test]
    #[should_panic(expected = "capacity must be greater than 0")]
    fn test_zero_capacity_panics() {
        SampleRing::new(0);
    }
}
