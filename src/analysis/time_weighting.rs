// TimeWeightingFilter - exponential power detector
//
// One-pole lowpass over the squared A-weighted signal:
//   y[n] = alpha * x[n] + (1 - alpha) * y[n-1],  alpha = 1 - exp(-1 / (tau * fs))
// Fast (125 ms) is the meter's detector; every LAF metric is read from it.

/// Time constant of the "Fast" detector in seconds
pub const FAST: f64 = 0.125;

#[derive(Debug, Clone)]
pub struct TimeWeightingFilter {
    alpha: f64,
    previous: f64,
}

impl TimeWeightingFilter {
    /// Create a detector with time constant `tau` seconds
    ///
    /// # Panics
    /// Panics if `sample_rate` is 0 or `tau` is not positive
    pub fn new(sample_rate: u32, tau: f64) -> Self {
        assert!(sample_rate > 0, "sample_rate must be greater than 0");
        assert!(tau > 0.0, "time constant must be positive");
        Self {
            alpha: 1.0 - (-1.0 / (tau * sample_rate as f64)).exp(),
            previous: 0.0,
        }
    }

    pub fn fast(sample_rate: u32) -> Self {
        Self::new(sample_rate, FAST)
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Smooth `block` in place
    pub fn process(&mut self, block: &mut [f32]) {
        let alpha = self.alpha;
        let mut y = self.previous;
        for sample in block.iter_mut() {
            y = alpha * *sample as f64 + (1.0 - alpha) * y;
            *sample = y as f32;
        }
        self.previous = y;
    }
}

/// Replace each sample with its square
pub fn square_in_place(block: &mut [f32]) {
    for sample in block.iter_mut() {
        *sample *= *sample;
    }
}
