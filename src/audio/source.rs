//! Acquisition sources feeding the measurement pipeline.
//!
//! The pipeline only needs blocks of signed 16-bit PCM at a known rate. Two
//! production sources implement [`AcquisitionSource`]: [`crate::audio::FileSource`]
//! for WAV files and [`crate::audio::LiveDevice`] for capture hardware.

use crate::error::AudioError;

/// Full-scale divisor turning i16 PCM into floats in [-1, +1)
pub const PCM_NORM: f32 = 32_768.0;

/// Blocking source of mono 16-bit PCM
pub trait AcquisitionSource {
    /// Rate of the delivered samples in Hz
    fn sample_rate(&self) -> u32;

    /// Fill up to `buffer.len()` frames, blocking until data is available
    ///
    /// # Returns
    /// * `Ok(0)` - End of stream
    /// * `Ok(n)` - `n` frames were written to the front of `buffer`
    fn read(&mut self, buffer: &mut [i16]) -> Result<usize, AudioError>;
}

impl<S: AcquisitionSource + ?Sized> AcquisitionSource for Box<S> {
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn read(&mut self, buffer: &mut [i16]) -> Result<usize, AudioError> {
        (**self).read(buffer)
    }
}

/// Convert PCM samples to normalized floats
///
/// `output` must be at least as long as `pcm`.
pub fn pcm_to_float(pcm: &[i16], output: &mut [f32]) {
    for (out, &sample) in output.iter_mut().zip(pcm) {
        *out = sample as f32 / PCM_NORM;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_to_float_range() {
        let pcm = [i16::MIN, -16_384, 0, 16_384, i16::MAX];
        let mut out = [0.0f32; 5];
        pcm_to_float(&pcm, &mut out);
        assert_eq!(out[0], -1.0);
        assert_eq!(out[1], -0.5);
        assert_eq!(out[2], 0.0);
        assert_eq!(out[3], 0.5);
        assert!(out[4] < 1.0 && out[4] > 0.9999);
    }
}
