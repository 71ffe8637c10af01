//! Variable-rate playback harness
//!
//! Verifies that a playback device's position accounting tracks the rate
//! actually in effect over each interval rather than the originally
//! configured rate. The expected position is accumulated incrementally,
//! one interval at a time with that interval's own setting, because the
//! rate changes many times inside one measurement window.

use crate::error::SessionError;
use audioprobe_core::clock::tolerance_frames;
use audioprobe_core::signal::{interleave_channels, sine_samples};
use audioprobe_core::{AudioDevice, PlaybackParams, TransferMode};
use audioprobe_verify::verify_accumulated_position;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Accepted deviation for rate-change accumulation, in milliseconds of
/// frames at the final rate.
pub const DEFAULT_RATE_TOLERANCE_MS: u64 = 60;

/// Accepted deviation for speed-change accumulation, in milliseconds of
/// frames at the configured rate.
pub const DEFAULT_SPEED_TOLERANCE_MS: u64 = 100;

/// Tone used to preload the playback buffer.
const PRELOAD_FREQUENCY_HZ: f64 = 600.0;

/// One playback-rate setting held for an interval.
#[derive(Debug, Clone, Copy)]
pub struct RateStep {
    /// Rate to apply at the start of the interval
    pub rate_hz: u32,
    /// How long to hold it
    pub hold: Duration,
}

/// One speed/pitch setting held for an interval.
#[derive(Debug, Clone, Copy)]
pub struct SpeedStep {
    /// Parameters to apply at the start of the interval
    pub params: PlaybackParams,
    /// How long to hold them
    pub hold: Duration,
}

/// Result of an accumulation scenario.
#[derive(Debug, Clone, Copy)]
pub struct RateOutcome {
    /// Position when measurement began
    pub origin_frames: u64,
    /// Position when measurement ended
    pub end_frames: u64,
    /// Accumulated expectation over the schedule
    pub expected_frames: u64,
    /// Frame budget the deviation had to stay within
    pub tolerance_frames: u64,
}

/// Harness for variable-rate playback scenarios.
#[derive(Debug, Clone)]
pub struct VariableRateSession {
    /// Warm-up before measurement starts
    pub warmup: Duration,
    /// Accepted rate-accumulation deviation in milliseconds
    pub rate_tolerance_ms: u64,
    /// Accepted speed-accumulation deviation in milliseconds
    pub speed_tolerance_ms: u64,
}

impl Default for VariableRateSession {
    fn default() -> Self {
        Self {
            warmup: Duration::from_millis(300),
            rate_tolerance_ms: DEFAULT_RATE_TOLERANCE_MS,
            speed_tolerance_ms: DEFAULT_SPEED_TOLERANCE_MS,
        }
    }
}

impl VariableRateSession {
    /// Fill the device buffer with a sine tone and loop it, so the stream
    /// never drains regardless of rate.
    fn preload<D: AudioDevice>(&self, device: &D) -> Result<(), SessionError> {
        let config = device.config();
        let frames = config.buffer_frames as usize;
        let mono = sine_samples(frames, config.sample_rate_hz, PRELOAD_FREQUENCY_HZ, 0.0);
        let samples = interleave_channels(&mono, config.channels.channel_count());
        let written = device.write(&samples, frames, TransferMode::NonBlocking)?;
        if written != frames {
            return Err(SessionError::ShortTransfer {
                op: "write",
                requested: frames,
                transferred: written,
            });
        }
        device.set_loop_enabled(true)?;
        Ok(())
    }

    /// Run a playback-rate schedule and verify the accumulated position.
    pub async fn run_rates<D>(
        &self,
        device: &D,
        steps: &[RateStep],
    ) -> Result<RateOutcome, SessionError>
    where
        D: AudioDevice,
    {
        let Some(first) = steps.first() else {
            return Err(audioprobe_verify::VerifyError::InvalidInput {
                reason: "rate schedule is empty".to_string(),
            }
            .into());
        };
        info!(steps = steps.len(), "starting variable rate scenario");
        self.preload(device)?;
        device.set_playback_rate(first.rate_hz)?;
        device.start()?;
        tokio::time::sleep(self.warmup).await;

        let origin_frames = device.position()?;
        let mut expected = 0.0f64;
        let mut last_rate = first.rate_hz;
        for step in steps {
            device.set_playback_rate(step.rate_hz)?;
            let held_from = Instant::now();
            tokio::time::sleep(step.hold).await;
            // Accumulate with the measured interval; sleeping overshoots.
            expected += f64::from(step.rate_hz) * held_from.elapsed().as_secs_f64();
            last_rate = step.rate_hz;
        }
        let end_frames = device.position()?;
        device.stop()?;

        let tolerance = tolerance_frames(last_rate, self.rate_tolerance_ms);
        let observed = end_frames.saturating_sub(origin_frames);
        debug!(expected, observed, tolerance, "rate accumulation check");
        verify_accumulated_position(expected as u64, observed, tolerance)?;
        Ok(RateOutcome {
            origin_frames,
            end_frames,
            expected_frames: expected as u64,
            tolerance_frames: tolerance,
        })
    }

    /// Run a speed/pitch schedule and verify the accumulated position.
    pub async fn run_speeds<D>(
        &self,
        device: &D,
        steps: &[SpeedStep],
    ) -> Result<RateOutcome, SessionError>
    where
        D: AudioDevice,
    {
        if steps.is_empty() {
            return Err(audioprobe_verify::VerifyError::InvalidInput {
                reason: "speed schedule is empty".to_string(),
            }
            .into());
        }
        info!(steps = steps.len(), "starting variable speed scenario");
        let sample_rate = device.config().sample_rate_hz;
        self.preload(device)?;
        device.start()?;
        tokio::time::sleep(self.warmup).await;

        let origin_frames = device.position()?;
        let mut expected = 0.0f64;
        for step in steps {
            device.set_playback_params(step.params)?;
            // The settings must have taken effect.
            let applied = device.playback_params()?;
            if applied != step.params {
                return Err(audioprobe_verify::VerifyError::InvalidInput {
                    reason: format!(
                        "playback params not applied: requested {:?}, device reports {:?}",
                        step.params, applied
                    ),
                }
                .into());
            }
            let held_from = Instant::now();
            tokio::time::sleep(step.hold).await;
            expected +=
                f64::from(step.params.speed) * f64::from(sample_rate) * held_from.elapsed().as_secs_f64();
        }
        let end_frames = device.position()?;
        device.stop()?;

        let tolerance = tolerance_frames(sample_rate, self.speed_tolerance_ms);
        let observed = end_frames.saturating_sub(origin_frames);
        debug!(expected, observed, tolerance, "speed accumulation check");
        verify_accumulated_position(expected as u64, observed, tolerance)?;
        Ok(RateOutcome {
            origin_frames,
            end_frames,
            expected_frames: expected as u64,
            tolerance_frames: tolerance,
        })
    }
}
