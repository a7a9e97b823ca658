//! Operations on mono sample buffers: loudness, cross-fades, and silence.

/// Window length used for silence scanning, in seconds.
const SCAN_WINDOW_SECS: f64 = 0.01;
/// Windows quieter than this (dBFS) count as silence.
const SILENCE_THRESHOLD_DB: f32 = -50.0;
/// A silent stretch must last this long before it is collapsed.
const MIN_SILENCE_SECS: f64 = 1.0;
/// Silence kept on each side of a collapsed stretch.
const KEEP_SILENCE_SECS: f64 = 1.0;

/// Root-mean-square level of a buffer.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy: f32 = samples.iter().map(|x| x * x).sum();
    (energy / samples.len() as f32).sqrt()
}

/// Scale every sample in place.
pub fn apply_gain(samples: &mut [f32], gain: f32) {
    for value in samples {
        *value *= gain;
    }
}

/// Join two waveforms with a linear cross-fade of up to `fade_samples`.
///
/// The fade shrinks to the shorter of the two buffers; zero fade (or an
/// empty side) degenerates to plain concatenation.
pub fn cross_fade_join(prev: Vec<f32>, next: &[f32], fade_samples: usize) -> Vec<f32> {
    let n = fade_samples.min(prev.len()).min(next.len());
    if n == 0 {
        let mut out = prev;
        out.extend_from_slice(next);
        return out;
    }

    let mut out = prev;
    let tail_start = out.len() - n;
    for i in 0..n {
        let k = if n == 1 { 0.5 } else { i as f32 / (n - 1) as f32 };
        out[tail_start + i] = out[tail_start + i] * (1.0 - k) + next[i] * k;
    }
    out.extend_from_slice(&next[n..]);
    out
}

/// Level of one scan window in dBFS.
fn window_dbfs(window: &[f32]) -> f32 {
    20.0 * (rms(window) + f32::EPSILON).log10()
}

/// Per-window silence flags over a buffer.
fn silence_mask(samples: &[f32], window: usize) -> Vec<bool> {
    samples
        .chunks(window)
        .map(|w| window_dbfs(w) < SILENCE_THRESHOLD_DB)
        .collect()
}

fn scan_window(sample_rate: u32) -> usize {
    ((sample_rate as f64 * SCAN_WINDOW_SECS) as usize).max(1)
}

/// Clip a reference recording to at most `max_samples`.
///
/// Prefers cutting at the end of the last silent window inside the limit so
/// the clip does not land mid-word; falls back to a hard cut. Returns the
/// clipped buffer and whether clipping happened.
pub fn clip_at_silence(samples: Vec<f32>, max_samples: usize, sample_rate: u32) -> (Vec<f32>, bool) {
    if samples.len() <= max_samples || max_samples == 0 {
        return (samples, false);
    }

    let window = scan_window(sample_rate);
    let mask = silence_mask(&samples[..max_samples], window);
    let cut = mask
        .iter()
        .rposition(|silent| *silent)
        .map(|idx| ((idx + 1) * window).min(max_samples))
        .unwrap_or(max_samples);

    let mut clipped = samples;
    clipped.truncate(cut);
    (clipped, true)
}

/// Collapse long silent stretches in a generated waveform.
///
/// Silent runs of at least one second shrink to at most one second of
/// silence on each side; leading and trailing silence keeps only the second
/// adjacent to speech. A buffer with no speech at all is returned unchanged.
pub fn collapse_silence(samples: &[f32], sample_rate: u32) -> Vec<f32> {
    let window = scan_window(sample_rate);
    let mask = silence_mask(samples, window);
    if mask.iter().all(|silent| *silent) || mask.iter().all(|silent| !*silent) {
        return samples.to_vec();
    }

    let min_run = ((sample_rate as f64 * MIN_SILENCE_SECS) as usize / window).max(1);
    let keep = ((sample_rate as f64 * KEEP_SILENCE_SECS) as usize / window).max(1);

    let mut keep_window = vec![true; mask.len()];
    let mut run_start = None;
    for idx in 0..=mask.len() {
        let silent = idx < mask.len() && mask[idx];
        match (run_start, silent) {
            (None, true) => run_start = Some(idx),
            (Some(start), false) => {
                mark_collapsed(&mut keep_window, start, idx, min_run, keep, mask.len());
                run_start = None;
            }
            _ => {}
        }
    }

    let mut out = Vec::with_capacity(samples.len());
    for (idx, chunk) in samples.chunks(window).enumerate() {
        if keep_window[idx] {
            out.extend_from_slice(chunk);
        }
    }
    out
}

/// Decide which windows of the silent run `[start, end)` survive.
fn mark_collapsed(
    keep_window: &mut [bool],
    start: usize,
    end: usize,
    min_run: usize,
    keep: usize,
    total: usize,
) {
    let len = end - start;
    if len < min_run {
        return;
    }
    // Interior runs keep `keep` windows on both sides; runs touching an edge
    // keep silence only on the side facing speech.
    let keep_head = if start == 0 { 0 } else { keep };
    let keep_tail = if end == total { 0 } else { keep };
    if len <= keep_head + keep_tail {
        return;
    }
    for idx in (start + keep_head)..(end - keep_tail) {
        keep_window[idx] = false;
    }
}
