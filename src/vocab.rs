//! Character vocabulary loading and text encoding.
//!
//! The model's text interface is a plain file with one token per line; a
//! token's id is its line number. Tokens are usually single characters
//! (including a bare space line), so text is encoded character by character.
//! Characters missing from the vocabulary map to id 0, mirroring the lookup
//! the checkpoint was trained with; callers get the miss count back so they
//! can warn the user.

use anyhow::Result;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Token table read from a vocabulary file.
#[derive(Debug, Clone)]
pub struct Vocab {
    tokens: HashMap<String, i64>,
    len: usize,
}

impl Vocab {
    /// Load a vocabulary file, one token per line.
    ///
    /// Lines keep their content verbatim apart from the trailing newline, so
    /// a line holding a single space is the space token. Duplicate tokens
    /// keep the last occurrence, matching the lookup-table construction the
    /// checkpoint used.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read vocab file {}: {e}", path.display()))?;

        let mut tokens = HashMap::new();
        let mut len = 0usize;
        let line_count = data.split('\n').count();
        for (id, line) in data.split('\n').enumerate() {
            let token = line.strip_suffix('\r').unwrap_or(line);
            // A trailing newline yields one empty final entry; skip it without
            // disturbing ids of earlier lines.
            if token.is_empty() && id + 1 == line_count {
                continue;
            }
            tokens.insert(token.to_string(), id as i64);
            len = id + 1;
        }

        if len == 0 {
            anyhow::bail!("Vocab file {} is empty", path.display());
        }
        Ok(Self { tokens, len })
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Look up a single token.
    pub fn id(&self, token: &str) -> Option<i64> {
        self.tokens.get(token).copied()
    }

    /// Encode text character by character.
    ///
    /// Returns the id sequence and the number of characters that were not in
    /// the vocabulary (encoded as id 0).
    pub fn encode(&self, text: &str) -> (Vec<i64>, usize) {
        let mut ids = Vec::with_capacity(text.chars().count());
        let mut misses = 0usize;
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            let key: &str = ch.encode_utf8(&mut buf);
            match self.tokens.get(key) {
                Some(id) => ids.push(*id),
                None => {
                    ids.push(0);
                    misses += 1;
                }
            }
        }
        (ids, misses)
    }
}

#[cfg(test)]
mod tests {
    use super::Vocab;
    use std::fs;

    fn vocab_from(contents: &str) -> Vocab {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("vocab.txt");
        fs::write(&path, contents).expect("write vocab");
        Vocab::load(&path).expect("load vocab")
    }

    #[test]
    fn loads_tokens_with_line_ids() {
        let vocab = vocab_from(" \na\nb\nc\n");
        assert_eq!(vocab.len(), 4);
        assert_eq!(vocab.id(" "), Some(0));
        assert_eq!(vocab.id("c"), Some(3));
        assert_eq!(vocab.id("z"), None);
    }

    #[test]
    fn encodes_text_and_counts_misses() {
        let vocab = vocab_from(" \nh\ne\nl\no\n");
        let (ids, misses) = vocab.encode("hello");
        assert_eq!(ids, vec![1, 2, 3, 3, 4]);
        assert_eq!(misses, 0);

        let (ids, misses) = vocab.encode("helix");
        assert_eq!(ids, vec![1, 2, 3, 0, 0]);
        assert_eq!(misses, 2);
    }

    #[test]
    fn rejects_empty_vocab() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("vocab.txt");
        fs::write(&path, "").expect("write vocab");
        let err = Vocab::load(&path).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn duplicate_tokens_keep_last_id() {
        let vocab = vocab_from("a\nb\na\n");
        assert_eq!(vocab.id("a"), Some(2));
        assert_eq!(vocab.len(), 3);
    }
}
