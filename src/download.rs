//! Artifact resolution: local paths, HuggingFace Hub references, and HTTP(S)
//! URLs, with a download cache under `~/.cache/macalla/`.

use anyhow::Result;
use hf_hub::api::sync::Api;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Path to the download cache, created on first use.
pub fn cache_directory() -> Result<PathBuf> {
    let home = std::env::var_os("HOME").unwrap_or_else(|| ".".into());
    let dir = Path::new(&home).join(".cache").join("macalla");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Resolve an artifact reference to a local file.
///
/// Accepted forms:
/// - `hf://owner/repo/path/to/file[@revision]`: fetched through the
///   HuggingFace Hub cache,
/// - `http://` / `https://`: downloaded once into the crate cache,
/// - anything else: treated as a local path that must exist.
pub fn resolve_artifact(reference: &str) -> Result<PathBuf> {
    if let Some(spec) = reference.strip_prefix("hf://") {
        let hf = HfRef::parse(spec)?;
        return hf.fetch();
    }
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return fetch_http(reference);
    }

    let local = PathBuf::from(reference);
    if !local.exists() {
        anyhow::bail!("No such file or directory: {reference}");
    }
    Ok(local)
}

/// A parsed `hf://` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HfRef {
    /// `owner/repo` pair.
    pub repo_id: String,
    /// File path inside the repository.
    pub filename: String,
    /// Optional revision after `@`.
    pub revision: Option<String>,
}

impl HfRef {
    /// Parse `owner/repo/path/to/file[@revision]`.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut parts = spec.splitn(3, '/');
        let owner = parts.next().filter(|s| !s.is_empty());
        let repo = parts.next().filter(|s| !s.is_empty());
        let rest = parts.next().filter(|s| !s.is_empty());
        let (Some(owner), Some(repo), Some(rest)) = (owner, repo, rest) else {
            anyhow::bail!("Invalid hf:// reference: hf://{spec} (expected hf://owner/repo/file)");
        };

        let (filename, revision) = match rest.split_once('@') {
            Some((file, rev)) => (file.to_string(), Some(rev.to_string())),
            None => (rest.to_string(), None),
        };
        Ok(Self {
            repo_id: format!("{owner}/{repo}"),
            filename,
            revision,
        })
    }

    /// Fetch the file through the HuggingFace Hub cache.
    pub fn fetch(&self) -> Result<PathBuf> {
        let api = Api::new()?;
        let repo = match &self.revision {
            Some(rev) => api.repo(hf_hub::Repo::with_revision(
                self.repo_id.clone(),
                hf_hub::RepoType::Model,
                rev.clone(),
            )),
            None => api.repo(hf_hub::Repo::model(self.repo_id.clone())),
        };
        Ok(repo.get(&self.filename)?)
    }
}

/// Download an HTTP(S) URL into the cache, once.
fn fetch_http(url: &str) -> Result<PathBuf> {
    let cached = cache_directory()?.join(cache_filename(url));
    if cached.exists() {
        return Ok(cached);
    }

    eprintln!("Downloading {url}...");
    let response = ureq::get(url)
        .call()
        .map_err(|e| anyhow::anyhow!("Failed to download {url}: {e}"))?;
    let mut body = Vec::new();
    response.into_reader().read_to_end(&mut body)?;

    // Land the bytes under a temporary name so an interrupted download never
    // leaves a truncated file behind.
    let partial = cached.with_extension("partial");
    fs::write(&partial, &body)?;
    fs::rename(&partial, &cached)?;
    Ok(cached)
}

/// Derive a stable cache filename from a URL.
fn cache_filename(url: &str) -> String {
    let stripped = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    stripped
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn parses_hf_references() {
        let parsed = HfRef::parse("charactr/vocos-mel-24khz/vocoder.onnx").expect("parse");
        assert_eq!(parsed.repo_id, "charactr/vocos-mel-24khz");
        assert_eq!(parsed.filename, "vocoder.onnx");
        assert_eq!(parsed.revision, None);

        let pinned = HfRef::parse("owner/repo/dir/file.onnx@v1").expect("parse");
        assert_eq!(pinned.filename, "dir/file.onnx");
        assert_eq!(pinned.revision, Some("v1".to_string()));
    }

    #[test]
    fn rejects_short_hf_references() {
        assert!(HfRef::parse("owner/repo").is_err());
        assert!(HfRef::parse("owner").is_err());
        assert!(HfRef::parse("").is_err());
    }

    #[test]
    fn local_paths_resolve_when_present() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("model.onnx");
        fs::write(&path, b"graph").expect("write file");

        let resolved = resolve_artifact(path.to_str().unwrap()).expect("resolve");
        assert_eq!(resolved, path);
    }

    #[test]
    fn missing_local_paths_error() {
        let err = resolve_artifact("model/definitely_missing.onnx").unwrap_err();
        assert!(err.to_string().contains("No such file"));
    }

    #[test]
    fn cache_filenames_are_path_safe() {
        assert_eq!(
            cache_filename("https://example.com/models/voc.onnx?rev=2"),
            "example.com_models_voc.onnx_rev_2"
        );
    }
}
