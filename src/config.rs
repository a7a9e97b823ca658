//! Model configuration types for the exported TTS graphs.
//!
//! Each model name maps to a YAML file in a `configs/` directory describing
//! the backbone the checkpoint was exported from and the mel parameters the
//! graphs were built with. Configurations are loaded with [`load_config`] and
//! resolved by name with [`resolve_model_config`].

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Backbone architecture a checkpoint was exported from.
///
/// The compute itself is compiled into the ONNX graph; the kind is kept as
/// configuration data so that mismatched checkpoints fail loudly at load time
/// rather than producing garbage audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backbone {
    /// Diffusion transformer with convolutional text positioning.
    DiT,
    /// Flat U-Net style transformer with interleaved text tokens.
    UNetT,
}

impl fmt::Display for Backbone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backbone::DiT => write!(f, "DiT"),
            Backbone::UNetT => write!(f, "UNetT"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
/// Architecture metadata carried alongside an exported checkpoint.
pub struct ArchConfig {
    /// Model width.
    pub dim: i64,
    /// Number of transformer layers.
    pub depth: i64,
    /// Number of attention heads.
    pub heads: i64,
    /// Feed-forward expansion factor.
    pub ff_mult: i64,
    /// Text embedding dimension (DiT only).
    #[serde(default)]
    pub text_dim: Option<i64>,
    /// Convolutional text-position layers (DiT only).
    #[serde(default)]
    pub conv_layers: Option<i64>,
    /// Size of the text embedding table. When present it must match the
    /// vocabulary file supplied at load time.
    #[serde(default)]
    pub text_num_embeds: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
/// Mel-spectrogram parameters the exported graphs were built with.
pub struct MelSpecConfig {
    /// Audio sample rate in Hz.
    pub target_sample_rate: u32,
    /// Number of mel channels.
    pub n_mel_channels: usize,
    /// Hop length in samples (one mel frame per hop).
    pub hop_length: usize,
    /// STFT window length in samples.
    pub win_length: usize,
    /// FFT size.
    pub n_fft: usize,
    /// Mel convention the graphs expect ("vocos" or "bigvgan").
    pub mel_spec_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
/// The `model` section of a configuration file.
pub struct ModelSection {
    /// Model name (matches the configuration file stem).
    pub name: String,
    /// Backbone the checkpoint was exported from.
    pub backbone: Backbone,
    /// Tokenizer kind (informational; the text interface is a character
    /// vocabulary file supplied separately).
    #[serde(default)]
    pub tokenizer: Option<String>,
    /// Architecture metadata.
    pub arch: ArchConfig,
    /// Mel parameters.
    pub mel_spec: MelSpecConfig,
}

/// Top-level model configuration.
///
/// # Example YAML
///
/// ```yaml
/// model:
///   name: F5TTS_Base
///   backbone: DiT
///   tokenizer: char
///   arch: { dim: 1024, depth: 22, heads: 16, ff_mult: 2, text_dim: 512, conv_layers: 4 }
///   mel_spec:
///     target_sample_rate: 24000
///     n_mel_channels: 100
///     hop_length: 256
///     win_length: 1024
///     n_fft: 1024
///     mel_spec_type: vocos
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// The `model` section.
    pub model: ModelSection,
}

/// Load a model configuration from a YAML file.
///
/// # Errors
///
/// Returns an error if the file doesn't exist, contains invalid YAML, or
/// names an unknown backbone.
pub fn load_config(path: impl AsRef<Path>) -> Result<ModelConfig> {
    let path = path.as_ref();
    if !path.exists() {
        anyhow::bail!("Config file not found: {}", path.display());
    }

    let data = fs::read_to_string(path)?;
    let config: ModelConfig = serde_yaml::from_str(&data)
        .map_err(|e| anyhow::anyhow!("Invalid model config {}: {e}", path.display()))?;
    Ok(config)
}

/// Resolve a model name to a configuration file path.
///
/// Searches `configs/<model>.yaml` next to the running executable first
/// (the bundled configurations), then under the current directory.
pub fn resolve_model_config(model: &str) -> Result<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            roots.push(dir.to_path_buf());
        }
    }
    roots.push(PathBuf::from("."));
    resolve_model_config_in(&roots, model)
}

/// Resolve `configs/<model>.yaml` under the given roots, in order.
pub fn resolve_model_config_in(roots: &[PathBuf], model: &str) -> Result<PathBuf> {
    let mut tried = Vec::new();
    for root in roots {
        let candidate = root.join("configs").join(format!("{model}.yaml"));
        if candidate.exists() {
            return Ok(candidate);
        }
        tried.push(candidate);
    }
    let tried = tried
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    anyhow::bail!("Could not find model config for {model} (tried: {tried})")
}
