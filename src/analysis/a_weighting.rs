// AWeightingFilter - IEC 61672 A-weighting as a cascade of three biquads
//
// The analog A-weighting prototype (poles at 20.6 Hz x2, 107.7 Hz, 737.9 Hz,
// 12194 Hz x2) is mapped to the digital domain with the bilinear transform
// and split into second-order sections:
// - section 1: the 12194 Hz pole pair, lowpass zeros at Nyquist, overall gain
// - section 2: the 20.6 Hz pole pair, highpass zeros at DC
// - section 3: the 107.7 Hz / 737.9 Hz poles, highpass zeros at DC
// Gain is normalized to 0 dB at 1 kHz.
//
// Each section runs in direct form II:
//   u0 = x - a1*u1 - a2*u2
//   y  = b0*u0 + b1*u1 + b2*u2
// State and arithmetic are f64; samples stay f32 at the block boundary.

use crate::error::AudioError;

/// Normalized second-order section, a0 == 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    pub b: [f64; 3],
    /// Denominator terms a1, a2
    pub a: [f64; 2],
}

const AWEIGHT_48000: [BiquadCoefficients; 3] = [
    BiquadCoefficients {
        b: [0.23418304260355655, 0.4683660852071131, 0.23418304260355655],
        a: [-0.22455845805977917, 0.0126066252715464],
    },
    BiquadCoefficients {
        b: [1.0, -2.0, 1.0],
        a: [-1.9946144559930217, 0.9946217070140845],
    },
    BiquadCoefficients {
        b: [1.0, -2.0, 1.0],
        a: [-1.8938704947230705, 0.8951597690946614],
    },
];

const AWEIGHT_44100: [BiquadCoefficients; 3] = [
    BiquadCoefficients {
        b: [0.25558782037851396, 0.5111756407570279, 0.25558782037851396],
        a: [-0.14053608242071075, 0.0049375976155402014],
    },
    BiquadCoefficients {
        b: [1.0, -2.0, 1.0],
        a: [-1.9941388812663283, 0.9941474694445309],
    },
    BiquadCoefficients {
        b: [1.0, -2.0, 1.0],
        a: [-1.884901217428792, 0.8864214718161675],
    },
];

/// Sample rates with precomputed coefficients
pub const SUPPORTED_SAMPLE_RATES: [u32; 2] = [44_100, 48_000];

/// Coefficients of the three sections for `sample_rate`
pub fn coefficients_for(sample_rate: u32) -> Result<&'static [BiquadCoefficients; 3], AudioError> {
    match sample_rate {
        48_000 => Ok(&AWEIGHT_48000),
        44_100 => Ok(&AWEIGHT_44100),
        _ => Err(AudioError::UnsupportedSampleRate { sample_rate }),
    }
}

/// One direct form II section with persistent state
#[derive(Debug, Clone)]
pub struct Biquad {
    coefficients: BiquadCoefficients,
    u1: f64,
    u2: f64,
}

impl Biquad {
    pub fn new(coefficients: BiquadCoefficients) -> Self {
        Self {
            coefficients,
            u1: 0.0,
            u2: 0.0,
        }
    }

    #[inline]
    pub fn process_sample(&mut self, x: f64) -> f64 {
        let BiquadCoefficients { b, a } = self.coefficients;
        let u0 = x - a[0] * self.u1 - a[1] * self.u2;
        let y = b[0] * u0 + b[1] * self.u1 + b[2] * self.u2;
        self.u2 = self.u1;
        self.u1 = u0;
        y
    }
}

/// A-weighting filter, in-place over blocks
#[derive(Debug, Clone)]
pub struct AWeightingFilter {
    sections: [Biquad; 3],
    sample_rate: u32,
}

impl AWeightingFilter {
    /// Create a filter with zeroed state
    ///
    /// # Returns
    /// * `Err(AudioError::UnsupportedSampleRate)` - Rate not in [`SUPPORTED_SAMPLE_RATES`]
    pub fn new(sample_rate: u32) -> Result<Self, AudioError> {
        let [s1, s2, s3] = *coefficients_for(sample_rate)?;
        Ok(Self {
            sections: [Biquad::new(s1), Biquad::new(s2), Biquad::new(s3)],
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Filter `block` in place; state carries over to the next call
    pub fn process(&mut self, block: &mut [f32]) {
        let [s1, s2, s3] = &mut self.sections;
        for sample in block.iter_mut() {
            let y = s3.process_sample(s2.process_sample(s1.process_sample(*sample as f64)));
            *sample = y as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    /// Steady-state gain in dB for a sine at `freq`, measured after settling
    fn measured_gain_db(sample_rate: u32, freq: f64) -> f64 {
        let mut filter = AWeightingFilter::new(sample_rate).unwrap();
        let fs = sample_rate as f64;
        let total = sample_rate as usize * 2;
        let mut block: Vec<f32> = (0..total)
            .map(|n| (2.0 * PI * freq * n as f64 / fs).sin() as f32 * 0.5)
            .collect();
        filter.process(&mut block);

        // Second half only: the 20 Hz poles need time to settle
        let tail = &block[total / 2..];
        let out_power: f64 =
            tail.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>() / tail.len() as f64;
        let in_power = 0.25 / 2.0;
        10.0 * (out_power / in_power).log10()
    }

    #[test]
    fn test_unity_gain_at_1khz() {
        for rate in SUPPORTED_SAMPLE_RATES {
            let gain = measured_gain_db(rate, 1_000.0);
            assert!(gain.abs() < 0.05, "{} Hz: gain at 1 kHz was {:.3} dB", rate, gain);
        }
    }

    #[test]
    fn test_low_frequency_attenuation() {
        let gain = measured_gain_db(48_000, 31.5);
        assert!(
            (gain - (-39.5)).abs() < 1.0,
            "gain at 31.5 Hz was {:.2} dB",
            gain
        );
        let gain = measured_gain_db(48_000, 100.0);
        assert!((gain - (-19.1)).abs() < 0.5, "gain at 100 Hz was {:.2} dB", gain);
    }

    #[test]
    fn test_presence_boost_near_4khz() {
        let gain = measured_gain_db(44_100, 4_000.0);
        assert!(gain > 0.5 && gain < 1.3, "gain at 4 kHz was {:.2} dB", gain);
    }

    #[test]
    fn test_impulse_response_decays() {
        let mut filter = AWeightingFilter::new(48_000).unwrap();
        let mut block = vec![0.0f32; 48_000];
        block[0] = 1.0;
        filter.process(&mut block);

        assert!(block.iter().all(|s| s.is_finite()));
        let energy = |s: &[f32]| s.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>();
        let head = energy(&block[..4_800]);
        let tail = energy(&block[43_200..]);
        assert!(head.is_finite() && head > 0.0);
        assert!(tail < head * 1e-6, "tail energy {} vs head {}", tail, head);
    }

    #[test]
    fn test_fresh_filters_are_deterministic() {
        let input: Vec<f32> = (0..2_000).map(|n| ((n * 7919) % 255) as f32 / 255.0 - 0.5).collect();
        let mut a = input.clone();
        let mut b = input.clone();
        AWeightingFilter::new(48_000).unwrap().process(&mut a);
        AWeightingFilter::new(48_000).unwrap().process(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_state_carries_across_blocks() {
        let input: Vec<f32> = (0..1_000).map(|n| (n as f32 * 0.05).sin()).collect();
        let mut whole = input.clone();
        AWeightingFilter::new(44_100).unwrap().process(&mut whole);

        let mut filter = AWeightingFilter::new(44_100).unwrap();
        let mut split = input;
        let (first, second) = split.split_at_mut(333);
        filter.process(first);
        filter.process(second);
        assert_eq!(whole, split);
    }

    #[test]
    fn test_unsupported_rate_is_rejected() {
        assert!(matches!(
            AWeightingFilter::new(22_050),
            Err(AudioError::UnsupportedSampleRate { sample_rate: 22_050 })
        ));
    }
}
