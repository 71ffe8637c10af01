//! Test signal generation
//!
//! Deterministic sine content for preloading playback devices. The
//! position verifiers never inspect signal data, but a playback scenario
//! still needs something audible to loop.

use std::f64::consts::PI;

/// Generate `sample_count` interleaved mono sine samples at `frequency_hz`.
///
/// A non-zero `sweep_hz` sweeps the frequency linearly across the buffer,
/// ending `sweep_hz` above the starting frequency.
pub fn sine_samples(
    sample_count: usize,
    sample_rate_hz: u32,
    frequency_hz: f64,
    sweep_hz: f64,
) -> Vec<f32> {
    let rate = f64::from(sample_rate_hz);
    let duration = sample_count as f64 / rate;
    let sweep_rate = if duration > 0.0 { sweep_hz / duration } else { 0.0 };
    let mut samples = Vec::with_capacity(sample_count);
    for i in 0..sample_count {
        let t = i as f64 / rate;
        // Instantaneous phase of a linear chirp.
        let phase = 2.0 * PI * (frequency_hz * t + 0.5 * sweep_rate * t * t);
        samples.push(phase.sin() as f32);
    }
    samples
}

/// Duplicate mono samples into `channels` interleaved channels.
pub fn interleave_channels(mono: &[f32], channels: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(mono.len() * channels);
    for &sample in mono {
        for _ in 0..channels {
            out.push(sample);
        }
    }
    out
}
