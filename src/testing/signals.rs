//! Synthetic PCM signals.

use hound::{SampleFormat, WavSpec, WavWriter};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::f64::consts::PI;
use std::path::Path;

use crate::error::AudioError;

/// Deterministic waveform description; amplitudes are full-scale fractions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyntheticSignal {
    Silence,
    Sine { frequency_hz: f64, amplitude: f64 },
    WhiteNoise { amplitude: f64, seed: u64 },
}

impl SyntheticSignal {
    /// RMS of the signal in full-scale units (before quantization)
    pub fn rms(&self) -> f64 {
        match *self {
            SyntheticSignal::Silence => 0.0,
            SyntheticSignal::Sine { amplitude, .. } => amplitude / 2f64.sqrt(),
            // Uniform in [-a, a)
            SyntheticSignal::WhiteNoise { amplitude, .. } => amplitude / 3f64.sqrt(),
        }
    }
}

/// Render `frames` samples of `signal` as 16-bit PCM
pub fn generate_pcm(signal: SyntheticSignal, sample_rate: u32, frames: usize) -> Vec<i16> {
    let to_pcm = |value: f64| (value * 32_768.0).round().clamp(-32_768.0, 32_767.0) as i16;
    match signal {
        SyntheticSignal::Silence => vec![0; frames],
        SyntheticSignal::Sine {
            frequency_hz,
            amplitude,
        } => (0..frames)
            .map(|n| {
                let phase = 2.0 * PI * frequency_hz * n as f64 / sample_rate as f64;
                to_pcm(phase.sin() * amplitude)
            })
            .collect(),
        SyntheticSignal::WhiteNoise { amplitude, .. } if amplitude <= 0.0 => vec![0; frames],
        SyntheticSignal::WhiteNoise { amplitude, seed } => {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..frames)
                .map(|_| to_pcm(rng.gen_range(-amplitude..amplitude)))
                .collect()
        }
    }
}

/// Write mono 16-bit PCM to a WAV file
pub fn write_pcm_wav(path: &Path, sample_rate: u32, samples: &[i16]) -> Result<(), AudioError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let wav_err = |err: hound::Error| AudioError::FileOpenFailed {
        path: path.display().to_string(),
        reason: err.to_string(),
    };
    let mut writer = WavWriter::create(path, spec).map_err(wav_err)?;
    for &sample in samples {
        writer.write_sample(sample).map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_peak_and_length() {
        let pcm = generate_pcm(
            SyntheticSignal::Sine {
                frequency_hz: 1_000.0,
                amplitude: 0.5,
            },
            48_000,
            480,
        );
        assert_eq!(pcm.len(), 480);
        // 48 samples per period: sample 12 is the crest
        assert_eq!(pcm[12], 16_384);
        assert_eq!(pcm[0], 0);
    }

    #[test]
    fn test_noise_is_seeded() {
        let signal = SyntheticSignal::WhiteNoise {
            amplitude: 0.25,
            seed: 7,
        };
        assert_eq!(generate_pcm(signal, 48_000, 64), generate_pcm(signal, 48_000, 64));
        assert!(generate_pcm(signal, 48_000, 1_000)
            .iter()
            .all(|&s| s.unsigned_abs() <= 8_192));
    }

    #[test]
    fn test_rms_of_sine() {
        let signal = SyntheticSignal::Sine {
            frequency_hz: 100.0,
            amplitude: 1.0,
        };
        assert!((signal.rms() - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);
    }
}
