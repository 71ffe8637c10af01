//! Device configuration
//!
//! Stream format and buffer sizing requested when opening a device. The
//! device may clamp a too-small buffer up to its minimum, but an absurd
//! request is rejected outright and must not poison subsequent opens.

use crate::error::DeviceError;
use serde::{Deserialize, Serialize};

/// Lowest sample rate a device will accept, in Hz.
pub const MIN_SAMPLE_RATE_HZ: u32 = 4_000;

/// Highest sample rate a device will accept, in Hz.
pub const MAX_SAMPLE_RATE_HZ: u32 = 192_000;

/// Largest buffer a device will allocate, in frames.
pub const MAX_BUFFER_FRAMES: u64 = 1 << 24;

/// Smallest buffer granted in milliseconds of audio at the stream rate.
pub const MIN_BUFFER_MS: u64 = 20;

/// PCM sample encoding of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleEncoding {
    /// Unsigned 8-bit PCM
    Pcm8,
    /// Signed 16-bit PCM
    Pcm16,
    /// 32-bit float PCM
    PcmFloat,
}

impl SampleEncoding {
    /// Size of one sample in bytes.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleEncoding::Pcm8 => 1,
            SampleEncoding::Pcm16 => 2,
            SampleEncoding::PcmFloat => 4,
        }
    }
}

/// Channel layout of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelLayout {
    /// One channel per frame
    Mono,
    /// Two channels per frame
    Stereo,
}

impl ChannelLayout {
    /// Number of channels in one frame.
    pub fn channel_count(self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }
}

/// Stream configuration requested when opening a device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Sample rate in Hz
    pub sample_rate_hz: u32,

    /// Channel layout (mono or stereo)
    pub channels: ChannelLayout,

    /// PCM encoding of the samples
    pub encoding: SampleEncoding,

    /// Requested buffer size in frames; clamped up to the device minimum
    pub buffer_frames: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 48_000,
            channels: ChannelLayout::Stereo,
            encoding: SampleEncoding::Pcm16,
            buffer_frames: 2048,
        }
    }
}

impl DeviceConfig {
    /// Size of one frame in bytes.
    pub fn bytes_per_frame(&self) -> usize {
        self.channels.channel_count() * self.encoding.bytes_per_sample()
    }

    /// Number of frames covering `millis` milliseconds at the stream rate.
    pub fn frames_for_duration_ms(&self, millis: u64) -> u64 {
        crate::clock::frames_for_duration_ms(self.sample_rate_hz, millis)
    }

    /// Minimum buffer the device will grant for this format, in frames.
    pub fn min_buffer_frames(&self) -> u64 {
        self.frames_for_duration_ms(MIN_BUFFER_MS).max(1)
    }

    /// Validate the configuration and return the granted buffer size.
    ///
    /// A buffer request beyond [`MAX_BUFFER_FRAMES`] or a sample rate
    /// outside the supported range is a [`DeviceError::Config`]; a
    /// too-small buffer is clamped up to [`Self::min_buffer_frames`].
    pub fn validate(&self) -> Result<u64, DeviceError> {
        if self.sample_rate_hz < MIN_SAMPLE_RATE_HZ || self.sample_rate_hz > MAX_SAMPLE_RATE_HZ {
            return Err(DeviceError::Config {
                reason: format!(
                    "sample rate {} Hz outside supported range {}..={} Hz",
                    self.sample_rate_hz, MIN_SAMPLE_RATE_HZ, MAX_SAMPLE_RATE_HZ
                ),
            });
        }
        if self.buffer_frames > MAX_BUFFER_FRAMES {
            return Err(DeviceError::Config {
                reason: format!(
                    "buffer of {} frames exceeds maximum {}",
                    self.buffer_frames, MAX_BUFFER_FRAMES
                ),
            });
        }
        Ok(self.buffer_frames.max(self.min_buffer_frames()))
    }
}
