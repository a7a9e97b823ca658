//! Flow-sampling schedule, duration estimation, and noise generation.
//!
//! The backbone graph evaluates the flow velocity at one timestep per call;
//! the schedule, the Euler integration, and the initial Gaussian noise are
//! owned by the driver. Sway sampling reshapes the uniform schedule so more
//! evaluations land near `t = 0`, where the flow bends hardest.

use anyhow::Result;

/// Estimate the total mel-frame duration for one chunk.
///
/// The reference speaking rate (frames per text byte) is extrapolated over
/// the generation text and divided by the speed factor, then appended to the
/// reference frames, truncating like the integer arithmetic the checkpoint
/// was tuned against.
pub fn estimate_duration_frames(
    ref_frames: usize,
    ref_text_bytes: usize,
    gen_text_bytes: usize,
    speed: f32,
) -> Result<usize> {
    if ref_frames == 0 {
        anyhow::bail!("Reference audio produced no mel frames");
    }
    if ref_text_bytes == 0 {
        anyhow::bail!("Reference text must not be empty");
    }
    let gen_frames =
        (ref_frames as f64 / ref_text_bytes as f64 * gen_text_bytes as f64 / speed as f64) as usize;
    Ok(ref_frames + gen_frames)
}

/// Build the timestep schedule for `nfe_step` Euler steps.
///
/// Returns `nfe_step + 1` strictly increasing values spanning `[0, 1]`.
/// A negative sway coefficient front-loads steps towards `t = 0`; zero
/// yields the uniform schedule.
pub fn timestep_schedule(nfe_step: usize, sway_coef: f32) -> Result<Vec<f32>> {
    if nfe_step == 0 {
        anyhow::bail!("nfe_step must be at least 1");
    }
    let mut schedule = Vec::with_capacity(nfe_step + 1);
    for i in 0..=nfe_step {
        let t = i as f32 / nfe_step as f32;
        let swayed = t + sway_coef * ((std::f32::consts::FRAC_PI_2 * t).cos() - 1.0 + t);
        schedule.push(swayed);
    }
    Ok(schedule)
}

/// Deterministic xorshift64* generator for the initial flow noise.
///
/// Seeded runs reproduce their output exactly; unseeded runs draw entropy
/// from the clock and process id.
#[derive(Debug, Clone)]
pub struct NoiseRng {
    state: u64,
    spare: Option<f32>,
}

impl NoiseRng {
    /// Create a generator from an explicit seed.
    pub fn from_seed(seed: u64) -> Self {
        // A zero state would stick xorshift at zero forever.
        let state = if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed };
        Self { state, spare: None }
    }

    /// Create a generator seeded from runtime entropy.
    pub fn from_entropy() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let pid = u64::from(std::process::id());
        Self::from_seed(nanos ^ pid.rotate_left(17))
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Uniform draw in the half-open interval `(0, 1]`.
    fn next_unit(&mut self) -> f32 {
        ((self.next_u64() >> 40) + 1) as f32 / (1u64 << 24) as f32
    }

    /// Standard normal draw via the Box-Muller transform.
    pub fn next_gaussian(&mut self) -> f32 {
        if let Some(value) = self.spare.take() {
            return value;
        }
        let u1 = self.next_unit();
        let u2 = self.next_unit();
        let radius = (-2.0 * u1.ln()).sqrt();
        let angle = 2.0 * std::f32::consts::PI * u2;
        self.spare = Some(radius * angle.sin());
        radius * angle.cos()
    }

    /// Fill a buffer with standard normal noise.
    pub fn fill_gaussian(&mut self, buf: &mut [f32]) {
        for value in buf {
            *value = self.next_gaussian();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_extrapolates_reference_rate() {
        // 256 ref frames over 64 text bytes is 4 frames per byte; 32 bytes of
        // generation text at unit speed adds 128 frames.
        let frames = estimate_duration_frames(256, 64, 32, 1.0).expect("estimate");
        assert_eq!(frames, 256 + 128);

        // Double speed halves the generated span.
        let fast = estimate_duration_frames(256, 64, 32, 2.0).expect("estimate");
        assert_eq!(fast, 256 + 64);

        assert!(estimate_duration_frames(0, 64, 32, 1.0).is_err());
        assert!(estimate_duration_frames(256, 0, 32, 1.0).is_err());
    }

    #[test]
    fn schedule_spans_unit_interval() {
        let schedule = timestep_schedule(32, -1.0).expect("schedule");
        assert_eq!(schedule.len(), 33);
        assert!(schedule[0].abs() < 1e-6);
        assert!((schedule[32] - 1.0).abs() < 1e-6);
        for pair in schedule.windows(2) {
            assert!(pair[1] > pair[0], "schedule must be strictly increasing");
        }
    }

    #[test]
    fn negative_sway_front_loads_steps() {
        let uniform = timestep_schedule(16, 0.0).expect("uniform");
        let swayed = timestep_schedule(16, -1.0).expect("swayed");
        // Early swayed timesteps sit below the uniform ones.
        assert!(swayed[1] < uniform[1]);
        assert!(swayed[8] < uniform[8]);
    }

    #[test]
    fn zero_nfe_is_rejected() {
        assert!(timestep_schedule(0, -1.0).is_err());
    }

    #[test]
    fn seeded_noise_is_reproducible() {
        let mut a = NoiseRng::from_seed(42);
        let mut b = NoiseRng::from_seed(42);
        let mut buf_a = vec![0.0f32; 64];
        let mut buf_b = vec![0.0f32; 64];
        a.fill_gaussian(&mut buf_a);
        b.fill_gaussian(&mut buf_b);
        assert_eq!(buf_a, buf_b);
    }

    #[test]
    fn noise_is_roughly_standard_normal() {
        let mut rng = NoiseRng::from_seed(7);
        let mut buf = vec![0.0f32; 10_000];
        rng.fill_gaussian(&mut buf);
        let mean = buf.iter().sum::<f32>() / buf.len() as f32;
        let var = buf.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>() / buf.len() as f32;
        assert!(mean.abs() < 0.05, "mean {mean} too far from 0");
        assert!((var - 1.0).abs() < 0.1, "variance {var} too far from 1");
    }
}
