//! Lightweight performance aggregation.
//!
//! Coarse stage timers and counters with minimal overhead, collected
//! unconditionally and printed as an end-of-run summary when requested.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

/// Stages and counters tracked across a run.
#[derive(Debug, Clone, Copy)]
#[repr(usize)]
pub enum Metric {
    /// Vocoder session construction.
    VocoderLoad,
    /// Backbone session + vocabulary construction.
    BackboneLoad,
    /// Reference audio/text preprocessing.
    Preprocess,
    /// Full synthesis across all chunks.
    Synthesize,
    /// Vocoder graph execution.
    Vocode,
    /// Backbone graph evaluations (count).
    NfeEvals,
    /// Mel frames generated (count).
    MelFrames,
    /// Text chunks synthesized (count).
    Chunks,
    /// Output samples produced (count).
    SamplesOut,
}

const NAMES: [(&str, bool); 9] = [
    ("vocoder.load", true),
    ("backbone.load", true),
    ("reference.preprocess", true),
    ("synthesize.total", true),
    ("vocoder.decode", true),
    ("backbone.evals", false),
    ("mel.frames", false),
    ("text.chunks", false),
    ("audio.samples_out", false),
];

fn cells() -> &'static [AtomicU64; NAMES.len()] {
    static CELLS: OnceLock<[AtomicU64; NAMES.len()]> = OnceLock::new();
    CELLS.get_or_init(|| std::array::from_fn(|_| AtomicU64::new(0)))
}

/// Add to a counter metric.
pub fn add_count(metric: Metric, amount: u64) {
    cells()[metric as usize].fetch_add(amount, Ordering::Relaxed);
}

/// Time a stage for the lifetime of the returned guard.
pub fn span(metric: Metric) -> SpanGuard {
    SpanGuard {
        metric,
        started: Instant::now(),
    }
}

/// Guard that records elapsed time on drop.
pub struct SpanGuard {
    metric: Metric,
    started: Instant,
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        // Record at least one microsecond so a touched stage never reads as
        // untouched.
        let micros = (self.started.elapsed().as_micros() as u64).max(1);
        cells()[self.metric as usize].fetch_add(micros, Ordering::Relaxed);
    }
}

/// Render the collected metrics, skipping untouched ones.
pub fn report() -> String {
    let mut out = String::from("perf summary:\n");
    for (idx, (name, is_duration)) in NAMES.iter().enumerate() {
        let value = cells()[idx].load(Ordering::Relaxed);
        if value == 0 {
            continue;
        }
        if *is_duration {
            let _ = writeln!(out, "  {name}: {:.1} ms", value as f64 / 1000.0);
        } else {
            let _ = writeln!(out, "  {name}: {value}");
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_and_report() {
        add_count(Metric::Chunks, 2);
        add_count(Metric::Chunks, 1);
        {
            let _guard = span(Metric::Preprocess);
        }
        let rendered = report();
        assert!(rendered.contains("text.chunks"));
        assert!(rendered.contains("reference.preprocess"));
    }
}
