//! Channel mixdown and sample-rate conversion for reference audio.

use anyhow::Result;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Average any channel layout down to mono.
pub fn to_mono(channels: &[Vec<f32>]) -> Result<Vec<f32>> {
    match channels.len() {
        0 => anyhow::bail!("No audio channels to mix down"),
        1 => Ok(channels[0].clone()),
        n => {
            let len = channels[0].len();
            for channel in &channels[1..] {
                if channel.len() != len {
                    anyhow::bail!("Channel length mismatch in mixdown");
                }
            }
            let scale = 1.0 / n as f32;
            let mut mixed = vec![0.0f32; len];
            for channel in channels {
                for (out, value) in mixed.iter_mut().zip(channel) {
                    *out += value * scale;
                }
            }
            Ok(mixed)
        }
    }
}

/// Resample a mono buffer between sample rates with a sinc interpolator.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, samples.len(), 1)?;
    let mut output = resampler.process(&[samples.to_vec()], None)?;
    Ok(output.remove(0))
}

#[cfg(test)]
mod tests {
    use super::{resample, to_mono};

    #[test]
    fn mixdown_averages_channels() {
        let channels = vec![vec![1.0f32, 0.0], vec![0.0f32, 1.0]];
        let mono = to_mono(&channels).expect("mixdown");
        assert_eq!(mono, vec![0.5, 0.5]);
    }

    #[test]
    fn mixdown_rejects_ragged_channels() {
        let channels = vec![vec![0.0f32; 4], vec![0.0f32; 3]];
        assert!(to_mono(&channels).is_err());
    }

    #[test]
    fn resampling_halves_the_length() {
        let samples = vec![0.0f32; 4800];
        let output = resample(&samples, 48000, 24000).expect("resample");
        // Sinc resampling trims edge transients; allow a small tolerance.
        assert!((output.len() as i64 - 2400).unsigned_abs() < 300);
    }

    #[test]
    fn same_rate_is_passthrough() {
        let samples = vec![0.25f32; 100];
        let output = resample(&samples, 24000, 24000).expect("resample");
        assert_eq!(output, samples);
    }
}
