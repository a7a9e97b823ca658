//! Session loading and the synthesis loop around the exported graphs.
//!
//! The pipeline owns three ONNX Runtime sessions: the mel extractor (run once
//! per reference), the flow-matching backbone (run once per sampling step),
//! and the vocoder (run once per chunk). Everything between session calls is
//! plain driver math: noise, schedules, duration estimates, and cross-fades.

use crate::audio::io::WavIo;
use crate::audio::ops::{apply_gain, clip_at_silence, cross_fade_join, rms};
use crate::audio::resample::{resample, to_mono};
use crate::config::ModelConfig;
use crate::perf::{self, Metric};
use crate::sampling::{estimate_duration_frames, timestep_schedule, NoiseRng};
use crate::text::{chunk_budget, chunk_text, normalize_ref_text};
use crate::vocab::Vocab;
use crate::vocoder::{VocoderKind, VocoderPaths};
use anyhow::{Context, Result};
use ndarray::{Array1, Array2, Array3};
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Longest reference accepted, in seconds. Longer recordings are clipped at
/// a silence boundary so conditioning stays in the regime the checkpoint was
/// trained on.
const MAX_REF_SECS: f64 = 12.0;

/// Input names of the backbone graph.
const IN_NOISE: &str = "noise";
const IN_COND: &str = "cond";
const IN_TEXT: &str = "text";
const IN_TIME: &str = "time";
const IN_CFG: &str = "cfg_strength";
/// Input name of the mel extractor graph.
const IN_WAVEFORM: &str = "waveform";
/// Input name of the vocoder graph.
const IN_MEL: &str = "mel";

/// Knobs of one synthesis run. Defaults mirror the CLI defaults.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisParams {
    /// Backbone evaluations per chunk.
    pub nfe_step: usize,
    /// Classifier-free guidance strength, handed to the graph.
    pub cfg_strength: f32,
    /// Sway coefficient reshaping the timestep schedule.
    pub sway_sampling_coef: f32,
    /// Speaking-rate factor (>1 is faster).
    pub speed: f32,
    /// Loudness floor for quiet references.
    pub target_rms: f32,
    /// Cross-fade between chunk waveforms, in seconds.
    pub cross_fade_duration: f32,
    /// Noise seed; `None` draws from runtime entropy.
    pub seed: Option<u64>,
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            nfe_step: 32,
            cfg_strength: 2.0,
            sway_sampling_coef: -1.0,
            speed: 1.0,
            target_rms: 0.1,
            cross_fade_duration: 0.15,
            seed: None,
        }
    }
}

impl SynthesisParams {
    /// Reject parameter combinations the pipeline cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.nfe_step == 0 {
            anyhow::bail!("nfe_step must be at least 1");
        }
        if !self.speed.is_finite() || self.speed <= 0.0 {
            anyhow::bail!("speed must be a positive number");
        }
        if !self.target_rms.is_finite() || self.target_rms <= 0.0 || self.target_rms > 1.0 {
            anyhow::bail!("target_rms must be in (0, 1]");
        }
        if !self.cross_fade_duration.is_finite() || self.cross_fade_duration < 0.0 {
            anyhow::bail!("cross_fade_duration must be non-negative");
        }
        if !self.cfg_strength.is_finite() || !self.sway_sampling_coef.is_finite() {
            anyhow::bail!("cfg_strength and sway_sampling_coef must be finite");
        }
        Ok(())
    }
}

/// Preprocessed reference: mono audio at the model rate plus its normalized
/// transcript and measured loudness.
#[derive(Debug, Clone)]
pub struct Reference {
    /// Mono samples at the model sample rate.
    pub samples: Vec<f32>,
    /// Normalized transcript (ends with punctuation and a space).
    pub text: String,
    /// RMS level before any loudness adjustment.
    pub rms: f32,
}

/// The loaded inference stack.
pub struct TtsPipeline {
    backbone: Session,
    mel_spec: Session,
    vocoder: Session,
    vocab: Vocab,
    config: ModelConfig,
}

impl TtsPipeline {
    /// Build all three sessions and load the vocabulary.
    pub fn load(
        config: ModelConfig,
        kind: VocoderKind,
        vocoder_paths: &VocoderPaths,
        ckpt_file: &Path,
        vocab_file: &Path,
    ) -> Result<Self> {
        if config.model.mel_spec.n_mel_channels == 0 {
            anyhow::bail!("Model config declares zero mel channels");
        }
        if kind.sample_rate() != config.model.mel_spec.target_sample_rate {
            anyhow::bail!(
                "Vocoder {kind} produces {} Hz audio but config {} expects {} Hz",
                kind.sample_rate(),
                config.model.name,
                config.model.mel_spec.target_sample_rate
            );
        }
        if config.model.mel_spec.mel_spec_type != kind.as_str() {
            eprintln!(
                "Warning: config {} expects mel type '{}' but vocoder '{}' was selected; \
                 the vocoder choice wins.",
                config.model.name, config.model.mel_spec.mel_spec_type, kind
            );
        }

        let (mel_spec, vocoder) = {
            let _span = perf::span(Metric::VocoderLoad);
            (
                load_session(&vocoder_paths.mel_spec, "mel extractor")?,
                load_session(&vocoder_paths.vocoder, "vocoder")?,
            )
        };

        let _span = perf::span(Metric::BackboneLoad);
        let backbone = load_session(ckpt_file, "backbone")?;
        let vocab = Vocab::load(vocab_file)?;
        if let Some(expected) = config.model.arch.text_num_embeds {
            if expected != vocab.len() {
                anyhow::bail!(
                    "Vocab size mismatch: config {} declares {expected} text embeddings but {} \
                     holds {} tokens",
                    config.model.name,
                    vocab_file.display(),
                    vocab.len()
                );
            }
        }

        Ok(Self {
            backbone,
            mel_spec,
            vocoder,
            vocab,
            config,
        })
    }

    /// Decode, mix down, resample, clip, and measure the reference audio;
    /// normalize its transcript.
    pub fn preprocess_reference(&self, audio_path: &Path, text: &str) -> Result<Reference> {
        let _span = perf::span(Metric::Preprocess);
        let target_rate = self.config.model.mel_spec.target_sample_rate;

        let (channels, source_rate) = WavIo::read(audio_path)?;
        let mono = to_mono(&channels)?;
        let samples = resample(&mono, source_rate, target_rate)?;

        let max_samples = (MAX_REF_SECS * target_rate as f64) as usize;
        let (samples, clipped) = clip_at_silence(samples, max_samples, target_rate);
        if clipped {
            eprintln!(
                "Warning: reference audio is longer than {MAX_REF_SECS:.0}s and was clipped."
            );
        }

        let level = rms(&samples);
        if level == 0.0 {
            anyhow::bail!("Reference audio {} is silent", audio_path.display());
        }

        Ok(Reference {
            samples,
            text: normalize_ref_text(text)?,
            rms: level,
        })
    }

    /// Synthesize `gen_text` in the reference voice.
    ///
    /// Returns the mono waveform and its sample rate. `interrupted` is polled
    /// between sampling steps and chunks so Ctrl-C aborts promptly.
    pub fn infer(
        &mut self,
        reference: &Reference,
        gen_text: &str,
        params: &SynthesisParams,
        interrupted: &AtomicBool,
    ) -> Result<(Vec<f32>, u32)> {
        params.validate()?;
        let gen_text = gen_text.trim();
        if gen_text.is_empty() {
            anyhow::bail!("Generation text must not be empty");
        }

        let _span = perf::span(Metric::Synthesize);
        let sample_rate = self.config.model.mel_spec.target_sample_rate;

        let mut ref_samples = reference.samples.clone();
        let boosted = reference.rms < params.target_rms;
        if boosted {
            apply_gain(&mut ref_samples, params.target_rms / reference.rms);
        }

        let ref_secs = WavIo::duration_secs(&ref_samples, sample_rate);
        let budget = chunk_budget(reference.text.len(), ref_secs);
        let chunks = chunk_text(gen_text, budget);
        if chunks.is_empty() {
            anyhow::bail!("Generation text produced no synthesizable chunks");
        }
        perf::add_count(Metric::Chunks, chunks.len() as u64);

        let ref_mel = self.extract_mel(&ref_samples)?;

        let mut rng = match params.seed {
            Some(seed) => NoiseRng::from_seed(seed),
            None => NoiseRng::from_entropy(),
        };
        let fade_samples = (params.cross_fade_duration * sample_rate as f32) as usize;

        let mut wave: Vec<f32> = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            if interrupted.load(Ordering::SeqCst) {
                anyhow::bail!("Interrupted");
            }
            if chunks.len() > 1 {
                eprintln!("synthesizing chunk {}/{}", idx + 1, chunks.len());
            }

            let mut chunk_wave =
                self.synthesize_chunk(&ref_mel, &reference.text, chunk, params, &mut rng, interrupted)?;
            if boosted {
                // Undo the conditioning boost so output loudness follows the
                // original reference.
                apply_gain(&mut chunk_wave, reference.rms / params.target_rms);
            }

            wave = if wave.is_empty() {
                chunk_wave
            } else {
                cross_fade_join(wave, &chunk_wave, fade_samples)
            };
        }

        perf::add_count(Metric::SamplesOut, wave.len() as u64);
        Ok((wave, sample_rate))
    }

    /// Run the mel extractor over a mono buffer. Returns `[1, mels, frames]`.
    fn extract_mel(&mut self, samples: &[f32]) -> Result<Array3<f32>> {
        let n_mels = self.config.model.mel_spec.n_mel_channels;
        let waveform = Array2::from_shape_vec((1, samples.len()), samples.to_vec())?;
        let outputs = self
            .mel_spec
            .run(inputs![IN_WAVEFORM => Tensor::from_array(waveform)?])?;
        let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;

        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        if dims.len() != 3 || dims[0] != 1 || dims[1] != n_mels {
            anyhow::bail!(
                "Mel extractor returned shape {dims:?}, expected [1, {n_mels}, frames]"
            );
        }
        Ok(Array3::from_shape_vec((1, n_mels, dims[2]), data.to_vec())?)
    }

    /// Synthesize one text chunk: integrate the flow ODE from noise, slice
    /// off the generated frames, and vocode them.
    fn synthesize_chunk(
        &mut self,
        ref_mel: &Array3<f32>,
        ref_text: &str,
        gen_chunk: &str,
        params: &SynthesisParams,
        rng: &mut NoiseRng,
        interrupted: &AtomicBool,
    ) -> Result<Vec<f32>> {
        let n_mels = self.config.model.mel_spec.n_mel_channels;
        let ref_frames = ref_mel.dim().2;

        let full_text = format!("{ref_text}{gen_chunk}");
        let (ids, misses) = self.vocab.encode(&full_text);
        if misses > 0 {
            eprintln!("Warning: {misses} character(s) not in the vocabulary were mapped to id 0.");
        }
        let text = Array2::from_shape_vec((1, ids.len()), ids)?;

        let total_frames =
            estimate_duration_frames(ref_frames, ref_text.len(), gen_chunk.len(), params.speed)?
                .max(ref_frames + 1);

        // Reference frames lead the conditioning; the frames to generate stay
        // zero.
        let mut cond = Array3::<f32>::zeros((1, total_frames, n_mels));
        for frame in 0..ref_frames {
            for mel in 0..n_mels {
                cond[[0, frame, mel]] = ref_mel[[0, mel, frame]];
            }
        }

        let mut x = Array3::<f32>::zeros((1, total_frames, n_mels));
        match x.as_slice_mut() {
            Some(buf) => rng.fill_gaussian(buf),
            None => anyhow::bail!("Noise buffer is not contiguous"),
        }

        let schedule = timestep_schedule(params.nfe_step, params.sway_sampling_coef)?;
        for step in schedule.windows(2) {
            if interrupted.load(Ordering::SeqCst) {
                anyhow::bail!("Interrupted");
            }
            let (t_now, t_next) = (step[0], step[1]);

            let outputs = self.backbone.run(inputs![
                IN_NOISE => Tensor::from_array(x.clone())?,
                IN_COND => Tensor::from_array(cond.clone())?,
                IN_TEXT => Tensor::from_array(text.clone())?,
                IN_TIME => Tensor::from_array(Array1::from_vec(vec![t_now]))?,
                IN_CFG => Tensor::from_array(Array1::from_vec(vec![params.cfg_strength]))?,
            ])?;
            let (_, velocity) = outputs[0].try_extract_tensor::<f32>()?;
            if velocity.len() != x.len() {
                anyhow::bail!(
                    "Backbone returned {} velocity values, expected {}",
                    velocity.len(),
                    x.len()
                );
            }

            let dt = t_next - t_now;
            for (value, v) in x.iter_mut().zip(velocity) {
                *value += dt * v;
            }
            perf::add_count(Metric::NfeEvals, 1);
        }

        let gen_frames = total_frames - ref_frames;
        let mut gen_mel = Array3::<f32>::zeros((1, n_mels, gen_frames));
        for frame in 0..gen_frames {
            for mel in 0..n_mels {
                gen_mel[[0, mel, frame]] = x[[0, ref_frames + frame, mel]];
            }
        }
        perf::add_count(Metric::MelFrames, gen_frames as u64);

        let _span = perf::span(Metric::Vocode);
        let outputs = self
            .vocoder
            .run(inputs![IN_MEL => Tensor::from_array(gen_mel)?])?;
        let (_, samples) = outputs[0].try_extract_tensor::<f32>()?;
        Ok(samples.to_vec())
    }
}

/// Build one CPU session with full graph optimization.
fn load_session(path: &Path, label: &str) -> Result<Session> {
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(available_threads())?
        .commit_from_file(path)
        .with_context(|| format!("Failed to load {label} graph from {}", path.display()))
}

fn available_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(8)
}

#[cfg(test)]
mod tests {
    use super::SynthesisParams;

    #[test]
    fn defaults_mirror_the_cli() {
        let params = SynthesisParams::default();
        assert_eq!(params.nfe_step, 32);
        assert_eq!(params.cfg_strength, 2.0);
        assert_eq!(params.sway_sampling_coef, -1.0);
        assert_eq!(params.speed, 1.0);
        assert_eq!(params.target_rms, 0.1);
        assert_eq!(params.cross_fade_duration, 0.15);
        assert!(params.seed.is_none());
        assert!(params.validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_knobs() {
        let mut params = SynthesisParams::default();
        params.nfe_step = 0;
        assert!(params.validate().is_err());

        let mut params = SynthesisParams::default();
        params.speed = 0.0;
        assert!(params.validate().is_err());

        let mut params = SynthesisParams::default();
        params.target_rms = 1.5;
        assert!(params.validate().is_err());

        let mut params = SynthesisParams::default();
        params.cross_fade_duration = -0.1;
        assert!(params.validate().is_err());

        let mut params = SynthesisParams::default();
        params.cfg_strength = f32::NAN;
        assert!(params.validate().is_err());
    }
}
