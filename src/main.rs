//! Command-line interface for voice-cloning speech synthesis.
//!
//! The CLI wires together configuration resolution, artifact downloads,
//! reference preprocessing, the sampling loop, and WAV output, reporting each
//! stage on stdout as it goes.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use macalla::audio::io::WavIo;
use macalla::audio::ops::collapse_silence;
use macalla::audio::resample::to_mono;
use macalla::config::{load_config, resolve_model_config};
use macalla::download::resolve_artifact;
use macalla::perf;
use macalla::pipeline::{SynthesisParams, TtsPipeline};
use macalla::vocoder::VocoderKind;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Vocoder families selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lower")]
enum VocoderChoice {
    Vocos,
    BigVgan,
}

impl From<VocoderChoice> for VocoderKind {
    fn from(choice: VocoderChoice) -> Self {
        match choice {
            VocoderChoice::Vocos => VocoderKind::Vocos,
            VocoderChoice::BigVgan => VocoderKind::BigVgan,
        }
    }
}

/// Top-level CLI options.
#[derive(Debug, Parser)]
#[command(name = "macalla")]
#[command(about = "Voice-cloning speech synthesis over exported ONNX graphs", long_about = None)]
#[command(rename_all = "snake_case")]
struct Cli {
    /// Model name; resolves configs/<model>.yaml.
    #[arg(long, default_value = "F5TTS_Base")]
    model: String,
    /// Reference audio file (WAV).
    #[arg(long)]
    ref_audio: String,
    /// Transcript of the reference audio.
    #[arg(long)]
    ref_text: String,
    /// Text to synthesize.
    #[arg(long)]
    gen_text: String,
    /// Speaking-rate factor (>1 is faster).
    #[arg(long, default_value_t = 1.0)]
    speed: f32,
    /// Vocoder to use.
    #[arg(long, value_enum, default_value_t = VocoderChoice::Vocos)]
    vocoder_name: VocoderChoice,
    /// Vocoder artifact directory or hf://owner/repo override.
    #[arg(long)]
    vocoder_path: Option<String>,
    /// Path to the vocabulary file.
    #[arg(long, default_value = "model/vocab.txt")]
    vocab_file: String,
    /// Path to the exported backbone graph.
    #[arg(long, default_value = "model/model_500000.onnx")]
    ckpt_file: String,
    /// Output file name.
    #[arg(long, default_value = "synthesized_speech.wav")]
    output_file: String,
    /// Output directory, created if missing.
    #[arg(long, default_value = "outputs")]
    output_dir: PathBuf,
    /// Number of function evaluation steps.
    #[arg(long, default_value_t = 32)]
    nfe_step: usize,
    /// Classifier-free guidance strength.
    #[arg(long, default_value_t = 2.0)]
    cfg_strength: f32,
    /// Target RMS for quiet reference audio.
    #[arg(long, default_value_t = 0.1)]
    target_rms: f32,
    /// Cross-fade between text chunks, in seconds.
    #[arg(long, default_value_t = 0.15)]
    cross_fade_duration: f32,
    /// Sway sampling coefficient.
    #[arg(long, default_value_t = -1.0, allow_negative_numbers = true)]
    sway_sampling_coef: f32,
    /// Remove silence from the written output.
    #[arg(long)]
    remove_silence: bool,
    /// Noise seed for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,
    /// Print a performance summary at the end of the run.
    #[arg(long, short)]
    verbose: bool,
}

/// Entry point for the CLI.
fn main() -> Result<()> {
    let cli = Cli::parse();

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupt_flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || {
        interrupt_flag.store(true, Ordering::SeqCst);
    })?;

    fs::create_dir_all(&cli.output_dir)?;
    let wave_path = cli.output_dir.join(&cli.output_file);

    let kind = VocoderKind::from(cli.vocoder_name);
    println!("Loading vocoder: {kind}");
    let vocoder_paths = kind.resolve_artifacts(cli.vocoder_path.as_deref())?;

    let config_path = resolve_model_config(&cli.model)?;
    let config = load_config(&config_path)?;
    println!(
        "Loading model {} ({} backbone) from {}",
        cli.model, config.model.backbone, cli.ckpt_file
    );
    let ckpt_file = resolve_artifact(&cli.ckpt_file)?;
    let vocab_file = resolve_artifact(&cli.vocab_file)?;
    let mut pipeline = TtsPipeline::load(config, kind, &vocoder_paths, &ckpt_file, &vocab_file)?;

    println!("Preprocessing reference audio and text");
    let ref_audio = resolve_artifact(&cli.ref_audio)?;
    let reference = pipeline.preprocess_reference(&ref_audio, &cli.ref_text)?;

    let params = SynthesisParams {
        nfe_step: cli.nfe_step,
        cfg_strength: cli.cfg_strength,
        sway_sampling_coef: cli.sway_sampling_coef,
        speed: cli.speed,
        target_rms: cli.target_rms,
        cross_fade_duration: cli.cross_fade_duration,
        seed: cli.seed,
    };

    println!("Generating speech for: {}", cli.gen_text);
    let (wave, sample_rate) = pipeline.infer(&reference, &cli.gen_text, &params, &interrupted)?;

    println!("Saving audio to {}", wave_path.display());
    WavIo::write_mono(&wave_path, &wave, sample_rate)?;

    if cli.remove_silence {
        println!("Removing silence from generated audio");
        strip_silence_in_place(&wave_path)?;
    }

    println!("Done! Output saved to {}", wave_path.display());
    if cli.verbose {
        eprintln!("{}", perf::report());
    }
    Ok(())
}

/// Collapse long silences in an already-written WAV file.
fn strip_silence_in_place(path: &Path) -> Result<()> {
    let (channels, sample_rate) = WavIo::read(path)?;
    let mono = to_mono(&channels)?;
    let collapsed = collapse_silence(&mono, sample_rate);
    WavIo::write_mono(path, &collapsed, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Result<Cli, clap::Error> {
        let mut argv = vec![
            "macalla",
            "--ref_audio",
            "ref.wav",
            "--ref_text",
            "a reference",
            "--gen_text",
            "some text",
        ];
        argv.extend_from_slice(extra);
        Cli::try_parse_from(argv)
    }

    #[test]
    fn defaults_match_the_documented_interface() {
        let cli = parse(&[]).expect("parse defaults");
        assert_eq!(cli.model, "F5TTS_Base");
        assert_eq!(cli.vocoder_name, VocoderChoice::Vocos);
        assert_eq!(cli.vocab_file, "model/vocab.txt");
        assert_eq!(cli.ckpt_file, "model/model_500000.onnx");
        assert_eq!(cli.output_file, "synthesized_speech.wav");
        assert_eq!(cli.output_dir, PathBuf::from("outputs"));
        assert_eq!(cli.nfe_step, 32);
        assert_eq!(cli.cfg_strength, 2.0);
        assert_eq!(cli.target_rms, 0.1);
        assert_eq!(cli.cross_fade_duration, 0.15);
        assert_eq!(cli.sway_sampling_coef, -1.0);
        assert!(!cli.remove_silence);
        assert!(cli.seed.is_none());
    }

    #[test]
    fn flags_use_snake_case_spelling() {
        let cli = parse(&["--nfe_step", "16", "--remove_silence", "--sway_sampling_coef", "-0.5"])
            .expect("parse snake_case flags");
        assert_eq!(cli.nfe_step, 16);
        assert!(cli.remove_silence);
        assert_eq!(cli.sway_sampling_coef, -0.5);
    }

    #[test]
    fn unknown_vocoder_is_rejected() {
        let err = parse(&["--vocoder_name", "griffinlim"]).unwrap_err();
        assert!(err.to_string().contains("vocoder_name"));
    }

    #[test]
    fn reference_arguments_are_required() {
        assert!(Cli::try_parse_from(["macalla", "--gen_text", "hi"]).is_err());
    }

    #[test]
    fn output_path_joins_dir_and_file() {
        let cli = parse(&["--output_dir", "out", "--output_file", "speech.wav"])
            .expect("parse output flags");
        assert_eq!(cli.output_dir.join(&cli.output_file), PathBuf::from("out/speech.wav"));
    }
}
