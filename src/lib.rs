//! # macalla - voice-cloning TTS inference
//!
//! A command-line driver for flow-matching text-to-speech with voice cloning.
//! The neural compute (mel extraction, the flow-matching backbone, and the
//! vocoder) lives in exported ONNX graphs executed through ONNX Runtime; this
//! crate owns everything around them: configuration, artifact resolution,
//! reference-audio preprocessing, text chunking, the sampling loop, and WAV
//! output.
//!
//! ## Pipeline Overview
//!
//! 1. **Configuration** ([`config`]): a YAML file per model name describes the
//!    backbone kind (`DiT` or `UNetT`), architecture metadata, and mel
//!    parameters the exported graphs were built with.
//!
//! 2. **Reference preprocessing** ([`TtsPipeline::preprocess_reference`]):
//!    the reference recording is decoded, mixed down, resampled to the model
//!    rate, clipped to at most twelve seconds at a silence boundary, and
//!    loudness-normalized; the transcript is normalized to end in punctuation.
//!
//! 3. **Synthesis** ([`TtsPipeline::infer`]): the generation text is split
//!    into chunks sized from the reference, each chunk is synthesized by
//!    integrating the flow ODE over `nfe_step` backbone evaluations on a
//!    sway-sampled timestep schedule, the generated mel frames are vocoded,
//!    and chunk waveforms are joined with a linear cross-fade.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use macalla::config::{load_config, resolve_model_config};
//! use macalla::pipeline::{SynthesisParams, TtsPipeline};
//! use macalla::vocoder::VocoderKind;
//!
//! let config = load_config(resolve_model_config("F5TTS_Base")?)?;
//! let vocoder = VocoderKind::Vocos.resolve_artifacts(None)?;
//! let mut pipeline = TtsPipeline::load(
//!     config,
//!     VocoderKind::Vocos,
//!     &vocoder,
//!     "model/model_500000.onnx".as_ref(),
//!     "model/vocab.txt".as_ref(),
//! )?;
//!
//! let reference = pipeline.preprocess_reference(
//!     "voice_samples/reference.wav".as_ref(),
//!     "And this is what the speaker sounds like.",
//! )?;
//! let interrupted = AtomicBool::new(false);
//! let (wave, sample_rate) = pipeline.infer(
//!     &reference,
//!     "Hello from a borrowed voice.",
//!     &SynthesisParams::default(),
//!     &interrupted,
//! )?;
//! macalla::audio::io::WavIo::write_mono("outputs/hello.wav", &wave, sample_rate)?;
//! # anyhow::Ok(())
//! ```
//!
//! ## Artifacts
//!
//! The backbone graph (`--ckpt_file`), vocabulary file (`--vocab_file`), and
//! vocoder artifact directory can be local paths, `hf://owner/repo/file`
//! references, or HTTP(S) URLs; remote artifacts are cached under
//! `~/.cache/macalla/`.

pub mod audio;
pub mod config;
pub mod download;
pub mod perf;
pub mod pipeline;
pub mod sampling;
pub mod text;
pub mod vocab;
pub mod vocoder;

pub use config::{load_config, resolve_model_config, Backbone, ModelConfig};
pub use pipeline::{Reference, SynthesisParams, TtsPipeline};
pub use vocab::Vocab;
pub use vocoder::VocoderKind;
