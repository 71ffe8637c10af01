//! Device-under-test interface
//!
//! The harness consumes streaming audio devices through this trait. A
//! device owns a frame-position clock, delivers marker and periodic
//! position notifications from its own thread, and publishes frame
//! timestamps on a path separate from the data path.

use crate::clock::{FrameClockSample, Timebase};
use crate::config::DeviceConfig;
use crate::error::DeviceError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lifecycle states of a streaming device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceState {
    /// Construction failed or has not happened
    Uninitialized,
    /// Configured and ready to start
    Initialized,
    /// Streaming; position advances
    Active,
    /// Streaming suspended; position frozen but preserved
    Paused,
    /// Streaming ended; position preserved until flushed
    Stopped,
    /// Terminal; every further operation fails
    Released,
}

/// Direction a device moves audio in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Device produces frames; the harness reads them
    Capture,
    /// Device consumes frames; the harness writes them
    Playback,
}

/// Whether a transfer may return before moving all requested frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferMode {
    /// Return only once the full request is satisfied (or the stream ends)
    Blocking,
    /// Return immediately with whatever is available, possibly zero
    NonBlocking,
}

/// Behavior when requested playback parameters cannot be honored natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FallbackMode {
    /// Device picks a best-effort substitute
    Default,
    /// Device outputs silence instead of degraded audio
    Mute,
    /// Device rejects the parameters
    Fail,
}

/// Time-stretch and pitch settings for playback devices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackParams {
    /// Playback speed factor; position advances at `speed * sample_rate`
    pub speed: f32,
    /// Pitch factor; does not affect position accounting
    pub pitch: f32,
    /// What to do when the combination cannot be honored natively
    pub fallback: FallbackMode,
}

impl Default for PlaybackParams {
    fn default() -> Self {
        Self {
            speed: 1.0,
            pitch: 1.0,
            fallback: FallbackMode::Default,
        }
    }
}

impl PlaybackParams {
    /// Largest accepted speed or pitch factor.
    pub const MAX_FACTOR: f32 = 8.0;

    /// Return the params with the given speed.
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// Return the params with the given pitch.
    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    /// Return the params with the given fallback mode.
    pub fn with_fallback(mut self, fallback: FallbackMode) -> Self {
        self.fallback = fallback;
        self
    }

    /// Check both factors are positive, finite and within range.
    pub fn validate(&self) -> Result<(), DeviceError> {
        for (name, value) in [("speed", self.speed), ("pitch", self.pitch)] {
            if !value.is_finite() || value <= 0.0 || value > Self::MAX_FACTOR {
                return Err(DeviceError::InvalidArgument {
                    reason: format!(
                        "{} {} outside accepted range (0.0, {}]",
                        name,
                        value,
                        Self::MAX_FACTOR
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Receiver of position-triggered notifications.
///
/// Invoked on the device's delivery thread, asynchronously to the driver
/// thread; implementations must synchronize their own state. The device is
/// passed back so a marker handler can re-arm the marker.
pub trait PositionListener: Send + Sync {
    /// The stream reached the configured marker position. The marker is
    /// disarmed before this fires; re-arm it through `device` if wanted.
    fn on_marker_reached(&self, device: &dyn AudioDevice);

    /// The stream advanced by another notification period.
    fn on_periodic_notification(&self, device: &dyn AudioDevice);
}

/// A streaming audio device under test.
///
/// All methods take `&self`; implementations use interior mutability since
/// notifications and re-arming cross thread boundaries.
pub trait AudioDevice: Send + Sync {
    /// Current lifecycle state.
    fn state(&self) -> DeviceState;

    /// Direction of this device.
    fn direction(&self) -> Direction;

    /// Configuration granted at open time (buffer size may have been
    /// clamped up from the request).
    fn config(&self) -> DeviceConfig;

    /// Begin or resume streaming.
    fn start(&self) -> Result<(), DeviceError>;

    /// End streaming. Does not reset the frame position; a subsequent
    /// position query returns at least the last pre-stop value.
    fn stop(&self) -> Result<(), DeviceError>;

    /// Suspend streaming, preserving the frame position.
    fn pause(&self) -> Result<(), DeviceError>;

    /// Discard buffered frames, reset the frame position to zero and clear
    /// any pending loop points.
    fn flush(&self) -> Result<(), DeviceError>;

    /// Release the device. Terminal; all further operations fail with
    /// [`DeviceError::Released`].
    fn release(&self) -> Result<(), DeviceError>;

    /// Read up to `count_frames` frames of interleaved samples into `buf`.
    /// Returns frames transferred. Blocking mode returns the full request
    /// unless the stream leaves the active state.
    fn read(
        &self,
        buf: &mut [f32],
        count_frames: usize,
        mode: TransferMode,
    ) -> Result<usize, DeviceError>;

    /// Write up to `count_frames` frames of interleaved samples from `buf`.
    /// Returns frames transferred; blocking semantics mirror [`read`].
    ///
    /// [`read`]: AudioDevice::read
    fn write(
        &self,
        buf: &[f32],
        count_frames: usize,
        mode: TransferMode,
    ) -> Result<usize, DeviceError>;

    /// Current frame position. Non-decreasing while streaming; reset to
    /// zero only by [`flush`](AudioDevice::flush).
    fn position(&self) -> Result<u64, DeviceError>;

    /// Latest published frame timestamp in the requested timebase.
    ///
    /// Fails with [`DeviceError::NotReady`] before streaming starts, and
    /// possibly transiently just after start since timestamps follow a
    /// different path than data. Both timebases report the same frame
    /// position for one published timestamp.
    fn timestamp(&self, timebase: Timebase) -> Result<FrameClockSample, DeviceError>;

    /// Arm a single-shot notification at an absolute frame position.
    fn set_marker_position(&self, frames: u64) -> Result<(), DeviceError>;

    /// Configure a recurring notification every `frames` frames; zero
    /// disables it.
    fn set_notification_period(&self, frames: u64) -> Result<(), DeviceError>;

    /// Install or clear the position listener.
    fn set_position_listener(
        &self,
        listener: Option<Arc<dyn PositionListener>>,
    ) -> Result<(), DeviceError>;

    /// Change the playback rate in Hz. Position accounting tracks frames
    /// elapsed at each rate in effect, not the originally configured rate.
    fn set_playback_rate(&self, rate_hz: u32) -> Result<(), DeviceError>;

    /// Change speed/pitch playback parameters. Rejected parameters leave
    /// the previous settings untouched.
    fn set_playback_params(&self, params: PlaybackParams) -> Result<(), DeviceError>;

    /// Currently effective playback parameters.
    fn playback_params(&self) -> Result<PlaybackParams, DeviceError>;

    /// Loop the written content indefinitely (playback only). Cleared by
    /// [`flush`](AudioDevice::flush).
    fn set_loop_enabled(&self, enabled: bool) -> Result<(), DeviceError>;
}
