//! Reference transcript normalization and generation-text chunking.
//!
//! Long generation text is synthesized in chunks so each chunk stays close to
//! the duration regime the model was trained on. The per-chunk byte budget is
//! derived from the reference: a transcript that covers `ref_secs` seconds of
//! speech tells us roughly how many bytes of text fit in the remaining
//! duration headroom.

use anyhow::Result;

/// Punctuation that terminates a sentence-ish unit in latin scripts.
const ASCII_BREAKS: &[char] = &[';', ':', ',', '.', '!', '?'];
/// Fullwidth punctuation that terminates a unit on its own.
const CJK_BREAKS: &[char] = &['；', '：', '，', '。', '！', '？'];

/// Normalize the reference transcript.
///
/// Trims surrounding whitespace and guarantees the transcript ends with
/// punctuation plus a trailing space, so the generated text starts a new
/// sentence from the model's perspective.
pub fn normalize_ref_text(text: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        anyhow::bail!("Reference text must not be empty");
    }

    let mut out = trimmed.to_string();
    let last = out.chars().last().unwrap_or(' ');
    if CJK_BREAKS.contains(&last) {
        return Ok(out);
    }
    if ASCII_BREAKS.contains(&last) {
        out.push(' ');
    } else {
        out.push_str(". ");
    }
    Ok(out)
}

/// Byte budget for one generation chunk.
///
/// `ref_text_bytes / ref_secs` estimates text bytes per second of speech;
/// the factor `22 - ref_secs` is the duration headroom (in seconds) left in
/// the window the model handles well. Never returns 0.
pub fn chunk_budget(ref_text_bytes: usize, ref_secs: f64) -> usize {
    if ref_secs <= 0.0 {
        return ref_text_bytes.max(1);
    }
    let headroom = (22.0 - ref_secs).max(1.0);
    let budget = (ref_text_bytes as f64 / ref_secs * headroom) as usize;
    budget.max(1)
}

/// Split text into chunks of at most `max_bytes` UTF-8 bytes, breaking at
/// punctuation boundaries.
///
/// A sentence unit ends after ASCII punctuation followed by whitespace, or
/// after fullwidth punctuation directly. Units longer than the budget become
/// chunks of their own rather than being split mid-sentence.
pub fn chunk_text(text: &str, max_bytes: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for unit in split_units(text) {
        let glued = if unit.chars().last().map(|c| c.len_utf8() == 1).unwrap_or(false) {
            format!("{unit} ")
        } else {
            unit.to_string()
        };

        if !current.is_empty() && current.len() + unit.len() > max_bytes {
            push_chunk(&mut chunks, &mut current);
        }
        current.push_str(&glued);
        if current.len() > max_bytes {
            push_chunk(&mut chunks, &mut current);
        }
    }
    push_chunk(&mut chunks, &mut current);
    chunks
}

fn push_chunk(chunks: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
    current.clear();
}

/// Iterate sentence-ish units of `text`.
fn split_units(text: &str) -> Vec<&str> {
    let mut units = Vec::new();
    let mut start = 0usize;
    let mut after_ascii_break = false;

    for (idx, ch) in text.char_indices() {
        if after_ascii_break && ch.is_whitespace() {
            units.push(&text[start..idx]);
            start = idx + ch.len_utf8();
            after_ascii_break = false;
            continue;
        }
        after_ascii_break = ASCII_BREAKS.contains(&ch);

        if CJK_BREAKS.contains(&ch) {
            let end = idx + ch.len_utf8();
            units.push(&text[start..end]);
            start = end;
            after_ascii_break = false;
        }
    }
    if start < text.len() {
        units.push(&text[start..]);
    }
    units.into_iter().filter(|u| !u.trim().is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_text_gets_terminal_punctuation() {
        assert_eq!(normalize_ref_text("hello world").unwrap(), "hello world. ");
        assert_eq!(normalize_ref_text("hello world.").unwrap(), "hello world. ");
        assert_eq!(normalize_ref_text("你好。").unwrap(), "你好。");
        assert!(normalize_ref_text("   ").is_err());
    }

    #[test]
    fn budget_scales_with_reference_density() {
        // 100 bytes over 10s of speech leaves 12s of headroom.
        assert_eq!(chunk_budget(100, 10.0), 120);
        // Degenerate references still produce a usable budget.
        assert!(chunk_budget(10, 0.0) >= 1);
        assert!(chunk_budget(100, 30.0) >= 1);
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk_text("Hello there.", 135);
        assert_eq!(chunks, vec!["Hello there."]);
    }

    #[test]
    fn splits_at_sentence_boundaries() {
        let text = "First sentence. Second sentence! Third one?";
        let chunks = chunk_text(text, 20);
        assert_eq!(
            chunks,
            vec!["First sentence.", "Second sentence!", "Third one?"]
        );
    }

    #[test]
    fn packs_sentences_under_the_budget() {
        let text = "One. Two. Three. Four.";
        let chunks = chunk_text(text, 12);
        assert_eq!(chunks, vec!["One. Two.", "Three. Four."]);
    }

    #[test]
    fn fullwidth_punctuation_breaks_without_whitespace() {
        let chunks = chunk_text("你好。世界。", 7);
        assert_eq!(chunks, vec!["你好。", "世界。"]);
    }

    #[test]
    fn oversized_sentence_stays_whole() {
        let text = "An unbreakable run of words without punctuation that exceeds the budget";
        let chunks = chunk_text(text, 16);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], text);
    }
}
