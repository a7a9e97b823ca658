//! Vocoder selection and artifact layout.
//!
//! Both supported vocoders ship as a pair of exported graphs: a mel
//! extractor (`mel_spec.onnx`, waveform to mel, used on the reference) and
//! the vocoder proper (`vocoder.onnx`, mel to waveform). The pair lives in an
//! artifact directory, locally or on the Hub.

use crate::download::{resolve_artifact, HfRef};
use anyhow::Result;
use std::fmt;
use std::path::{Path, PathBuf};

/// File name of the waveform-to-mel graph inside an artifact directory.
pub const MEL_SPEC_GRAPH: &str = "mel_spec.onnx";
/// File name of the mel-to-waveform graph inside an artifact directory.
pub const VOCODER_GRAPH: &str = "vocoder.onnx";

/// Supported vocoder families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VocoderKind {
    /// Vocos, 24 kHz mel convention.
    Vocos,
    /// BigVGAN, 24 kHz mel convention.
    BigVgan,
}

impl VocoderKind {
    /// Canonical lowercase name, as used in configs and directory layouts.
    pub fn as_str(&self) -> &'static str {
        match self {
            VocoderKind::Vocos => "vocos",
            VocoderKind::BigVgan => "bigvgan",
        }
    }

    /// Output sample rate the vocoder produces.
    pub fn sample_rate(&self) -> u32 {
        24_000
    }

    /// Default artifact directory for this vocoder.
    pub fn default_dir(&self) -> PathBuf {
        Path::new("models").join(self.as_str())
    }

    /// Resolve the graph pair for this vocoder.
    ///
    /// `location` overrides the default `models/<name>` directory and may be
    /// a local directory or an `hf://owner/repo` prefix; in the latter case
    /// both graphs are fetched through the Hub cache.
    pub fn resolve_artifacts(&self, location: Option<&str>) -> Result<VocoderPaths> {
        let location = location
            .map(str::to_string)
            .unwrap_or_else(|| self.default_dir().display().to_string());

        if let Some(repo) = location.strip_prefix("hf://") {
            let repo = repo.trim_end_matches('/');
            let mel_spec = HfRef::parse(&format!("{repo}/{MEL_SPEC_GRAPH}"))?.fetch()?;
            let vocoder = HfRef::parse(&format!("{repo}/{VOCODER_GRAPH}"))?.fetch()?;
            return Ok(VocoderPaths { mel_spec, vocoder });
        }

        let dir = Path::new(&location);
        let mel_spec = resolve_artifact(&dir.join(MEL_SPEC_GRAPH).display().to_string())?;
        let vocoder = resolve_artifact(&dir.join(VOCODER_GRAPH).display().to_string())?;
        Ok(VocoderPaths { mel_spec, vocoder })
    }
}

impl fmt::Display for VocoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved locations of the two vocoder graphs.
#[derive(Debug, Clone)]
pub struct VocoderPaths {
    /// Waveform-to-mel graph.
    pub mel_spec: PathBuf,
    /// Mel-to-waveform graph.
    pub vocoder: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn kinds_have_stable_names_and_rates() {
        assert_eq!(VocoderKind::Vocos.as_str(), "vocos");
        assert_eq!(VocoderKind::BigVgan.as_str(), "bigvgan");
        assert_eq!(VocoderKind::Vocos.sample_rate(), 24_000);
        assert_eq!(VocoderKind::Vocos.default_dir(), Path::new("models/vocos"));
    }

    #[test]
    fn resolves_graph_pair_from_local_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(MEL_SPEC_GRAPH), b"mel").expect("write mel graph");
        fs::write(dir.path().join(VOCODER_GRAPH), b"voc").expect("write vocoder graph");

        let paths = VocoderKind::Vocos
            .resolve_artifacts(Some(dir.path().to_str().unwrap()))
            .expect("resolve artifacts");
        assert!(paths.mel_spec.ends_with(MEL_SPEC_GRAPH));
        assert!(paths.vocoder.ends_with(VOCODER_GRAPH));
    }

    #[test]
    fn missing_artifacts_name_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = VocoderKind::BigVgan
            .resolve_artifacts(Some(dir.path().to_str().unwrap()))
            .unwrap_err();
        assert!(err.to_string().contains("No such file"));
    }
}
