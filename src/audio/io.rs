//! WAV reading and writing.
//!
//! Reference recordings arrive as PCM or float WAV with any channel layout;
//! output is always 16-bit PCM mono at the model sample rate.

use anyhow::Result;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;

#[derive(Debug, Default)]
pub struct WavIo;

impl WavIo {
    /// Read a WAV file into per-channel f32 buffers in `[-1, 1]`.
    pub fn read(path: impl AsRef<Path>) -> Result<(Vec<Vec<f32>>, u32)> {
        let path = path.as_ref();
        let mut reader = WavReader::open(path)
            .map_err(|e| anyhow::anyhow!("Failed to open audio file {}: {e}", path.display()))?;
        let spec = reader.spec();
        let channels = spec.channels as usize;
        if channels == 0 {
            anyhow::bail!("Audio file {} reports zero channels", path.display());
        }
        let mut samples = vec![Vec::new(); channels];

        match spec.sample_format {
            SampleFormat::Float => {
                for (idx, sample) in reader.samples::<f32>().enumerate() {
                    samples[idx % channels].push(sample?);
                }
            }
            SampleFormat::Int => {
                let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
                for (idx, sample) in reader.samples::<i32>().enumerate() {
                    samples[idx % channels].push(sample? as f32 / scale);
                }
            }
        }

        if samples[0].is_empty() {
            anyhow::bail!("Audio file {} holds no samples", path.display());
        }
        Ok((samples, spec.sample_rate))
    }

    /// Write a mono buffer as 16-bit PCM.
    pub fn write_mono(path: impl AsRef<Path>, samples: &[f32], sample_rate: u32) -> Result<()> {
        if samples.is_empty() {
            anyhow::bail!("No audio samples to write");
        }
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec)?;
        for value in samples {
            let clamped = value.clamp(-1.0, 1.0);
            writer.write_sample((clamped * i16::MAX as f32).round() as i16)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Duration in seconds of a mono buffer at the given rate.
    pub fn duration_secs(samples: &[f32], sample_rate: u32) -> f64 {
        samples.len() as f64 / sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::WavIo;
    use tempfile::tempdir;

    #[test]
    fn mono_roundtrip_preserves_length_and_rate() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("tone.wav");
        let samples: Vec<f32> = (0..240).map(|i| (i as f32 / 240.0).sin() * 0.5).collect();
        WavIo::write_mono(&path, &samples, 24000).expect("write wav");

        let (decoded, rate) = WavIo::read(&path).expect("read wav");
        assert_eq!(rate, 24000);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].len(), samples.len());
        // 16-bit quantization stays within one step of the source.
        for (a, b) in decoded[0].iter().zip(&samples) {
            assert!((a - b).abs() < 2.0 / i16::MAX as f32);
        }
    }

    #[test]
    fn out_of_range_samples_are_clamped() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("hot.wav");
        WavIo::write_mono(&path, &[2.0, -2.0, 0.0], 24000).expect("write wav");

        let (decoded, _) = WavIo::read(&path).expect("read wav");
        assert!(decoded[0][0] <= 1.0);
        assert!(decoded[0][1] >= -1.0);
    }

    #[test]
    fn empty_write_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("empty.wav");
        assert!(WavIo::write_mono(&path, &[], 24000).is_err());
    }

    #[test]
    fn duration_matches_sample_count() {
        let samples = vec![0.0f32; 48000];
        assert!((WavIo::duration_secs(&samples, 24000) - 2.0).abs() < 1e-9);
    }
}
