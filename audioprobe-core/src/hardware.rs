//! Real output device adapter (cpal)
//!
//! Plays written samples through the host's default output device and
//! derives the frame position from frames the output callback has
//! consumed. Requires a working audio backend at runtime, so the whole
//! module sits behind the `hardware` feature and is not part of default
//! builds.
//!
//! Marker/periodic notification delivery and variable-rate accounting are
//! not wired up here; the synthetic device covers those paths
//! deterministically. This adapter exists to run the timestamp and
//! position checks against real hardware.

use crate::clock::{self, FrameClockSample, Timebase};
use crate::config::DeviceConfig;
use crate::device::{
    AudioDevice, DeviceState, Direction, PlaybackParams, PositionListener, TransferMode,
};
use crate::error::DeviceError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const BLOCK_RECHECK: Duration = Duration::from_millis(5);

/// Frames consumed between timestamp publications (~10 ms at 48 kHz).
const PUBLISH_EVERY_FRAMES: u64 = 480;

#[derive(Debug, Clone, Copy)]
struct PublishedTimestamp {
    frame_position: u64,
    monotonic_nanos: i64,
    boottime_nanos: i64,
}

struct HwShared {
    config: DeviceConfig,
    state: Mutex<DeviceState>,
    ring: Mutex<VecDeque<f32>>,
    /// Frames the output callback has pulled since open.
    frames_consumed: AtomicU64,
    /// Position base subtracted after a flush.
    flush_base: AtomicU64,
    playing: AtomicBool,
    published: Mutex<Option<PublishedTimestamp>>,
}

/// Playback device over the host's default cpal output.
#[derive(Clone)]
pub struct CpalOutputDevice {
    shared: Arc<HwShared>,
}

impl CpalOutputDevice {
    /// Open the host default output device with the given stream format.
    pub fn open(config: DeviceConfig) -> Result<Self, DeviceError> {
        let granted_buffer = config.validate()?;
        let config = DeviceConfig {
            buffer_frames: granted_buffer,
            ..config
        };

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| DeviceError::Backend {
                reason: "no default output device".to_string(),
            })?;
        let supported = device
            .default_output_config()
            .map_err(|e| DeviceError::Backend {
                reason: format!("failed to query default output config: {}", e),
            })?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(DeviceError::Config {
                reason: format!(
                    "unsupported host sample format {:?}",
                    supported.sample_format()
                ),
            });
        }

        let shared = Arc::new(HwShared {
            config,
            state: Mutex::new(DeviceState::Initialized),
            ring: Mutex::new(VecDeque::new()),
            frames_consumed: AtomicU64::new(0),
            flush_base: AtomicU64::new(0),
            playing: AtomicBool::new(false),
            published: Mutex::new(None),
        });

        let stream_config = cpal::StreamConfig {
            channels: config.channels.channel_count() as cpal::ChannelCount,
            sample_rate: cpal::SampleRate(config.sample_rate_hz),
            buffer_size: cpal::BufferSize::Default,
        };
        let cb = Arc::clone(&shared);
        let channels = config.channels.channel_count();
        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !cb.playing.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }
                    let mut ring = cb.ring.lock();
                    let mut filled = 0usize;
                    while filled < data.len() {
                        match ring.pop_front() {
                            Some(sample) => {
                                data[filled] = sample;
                                filled += 1;
                            }
                            None => break,
                        }
                    }
                    data[filled..].fill(0.0);
                    drop(ring);

                    let frames = (filled / channels) as u64;
                    let consumed = cb.frames_consumed.fetch_add(frames, Ordering::Relaxed) + frames;
                    let base = cb.flush_base.load(Ordering::Relaxed);
                    if consumed / PUBLISH_EVERY_FRAMES
                        != consumed.saturating_sub(frames) / PUBLISH_EVERY_FRAMES
                    {
                        *cb.published.lock() = Some(PublishedTimestamp {
                            frame_position: consumed.saturating_sub(base),
                            monotonic_nanos: clock::monotonic_nanos(),
                            boottime_nanos: clock::boottime_nanos(),
                        });
                    }
                },
                move |err| {
                    warn!(error = %err, "output stream error");
                },
                None,
            )
            .map_err(|e| DeviceError::Backend {
                reason: format!("failed to build output stream: {}", e),
            })?;
        stream.play().map_err(|e| DeviceError::Backend {
            reason: format!("failed to start output stream: {}", e),
        })?;
        // The stream object is not Send; keep it alive for the process
        // lifetime the way the backend callbacks expect.
        std::mem::forget(stream);

        debug!(
            sample_rate_hz = config.sample_rate_hz,
            "opened cpal output device"
        );
        Ok(Self { shared })
    }

    fn guard_released(&self) -> Result<(), DeviceError> {
        if *self.shared.state.lock() == DeviceState::Released {
            return Err(DeviceError::Released);
        }
        Ok(())
    }
}

impl AudioDevice for CpalOutputDevice {
    fn state(&self) -> DeviceState {
        *self.shared.state.lock()
    }

    fn direction(&self) -> Direction {
        Direction::Playback
    }

    fn config(&self) -> DeviceConfig {
        self.shared.config
    }

    fn start(&self) -> Result<(), DeviceError> {
        let mut state = self.shared.state.lock();
        match *state {
            DeviceState::Initialized | DeviceState::Stopped | DeviceState::Paused => {
                *state = DeviceState::Active;
                *self.shared.published.lock() = None;
                self.shared.playing.store(true, Ordering::Relaxed);
                Ok(())
            }
            DeviceState::Released => Err(DeviceError::Released),
            other => Err(DeviceError::InvalidState { state: other }),
        }
    }

    fn stop(&self) -> Result<(), DeviceError> {
        let mut state = self.shared.state.lock();
        match *state {
            DeviceState::Active | DeviceState::Paused => {
                *state = DeviceState::Stopped;
                self.shared.playing.store(false, Ordering::Relaxed);
                let consumed = self.shared.frames_consumed.load(Ordering::Relaxed);
                let base = self.shared.flush_base.load(Ordering::Relaxed);
                *self.shared.published.lock() = Some(PublishedTimestamp {
                    frame_position: consumed.saturating_sub(base),
                    monotonic_nanos: clock::monotonic_nanos(),
                    boottime_nanos: clock::boottime_nanos(),
                });
                Ok(())
            }
            DeviceState::Released => Err(DeviceError::Released),
            other => Err(DeviceError::InvalidState { state: other }),
        }
    }

    fn pause(&self) -> Result<(), DeviceError> {
        let mut state = self.shared.state.lock();
        match *state {
            DeviceState::Active => {
                *state = DeviceState::Paused;
                self.shared.playing.store(false, Ordering::Relaxed);
                Ok(())
            }
            DeviceState::Released => Err(DeviceError::Released),
            other => Err(DeviceError::InvalidState { state: other }),
        }
    }

    fn flush(&self) -> Result<(), DeviceError> {
        let mut state = self.shared.state.lock();
        match *state {
            DeviceState::Active | DeviceState::Paused | DeviceState::Stopped => {
                *state = DeviceState::Stopped;
                self.shared.playing.store(false, Ordering::Relaxed);
                self.shared.ring.lock().clear();
                let consumed = self.shared.frames_consumed.load(Ordering::Relaxed);
                self.shared.flush_base.store(consumed, Ordering::Relaxed);
                *self.shared.published.lock() = None;
                Ok(())
            }
            DeviceState::Released => Err(DeviceError::Released),
            other => Err(DeviceError::InvalidState { state: other }),
        }
    }

    fn release(&self) -> Result<(), DeviceError> {
        let mut state = self.shared.state.lock();
        if *state == DeviceState::Released {
            return Err(DeviceError::Released);
        }
        *state = DeviceState::Released;
        self.shared.playing.store(false, Ordering::Relaxed);
        self.shared.ring.lock().clear();
        Ok(())
    }

    fn read(
        &self,
        _buf: &mut [f32],
        _count_frames: usize,
        _mode: TransferMode,
    ) -> Result<usize, DeviceError> {
        Err(DeviceError::InvalidArgument {
            reason: "read not supported on a Playback device".to_string(),
        })
    }

    fn write(
        &self,
        buf: &[f32],
        count_frames: usize,
        mode: TransferMode,
    ) -> Result<usize, DeviceError> {
        self.guard_released()?;
        let channels = self.shared.config.channels.channel_count();
        let samples_needed = count_frames * channels;
        if buf.len() < samples_needed {
            return Err(DeviceError::InvalidArgument {
                reason: format!(
                    "buffer of {} samples too small for {} frames",
                    buf.len(),
                    count_frames
                ),
            });
        }
        let capacity_samples = (self.shared.config.buffer_frames as usize) * channels;
        let mut written_samples = 0usize;
        loop {
            {
                let mut ring = self.shared.ring.lock();
                while written_samples < samples_needed && ring.len() < capacity_samples {
                    ring.push_back(buf[written_samples]);
                    written_samples += 1;
                }
            }
            let active = *self.shared.state.lock() == DeviceState::Active;
            if written_samples >= samples_needed
                || mode == TransferMode::NonBlocking
                || !active
            {
                return Ok(written_samples / channels);
            }
            thread::sleep(BLOCK_RECHECK);
        }
    }

    fn position(&self) -> Result<u64, DeviceError> {
        self.guard_released()?;
        let consumed = self.shared.frames_consumed.load(Ordering::Relaxed);
        let base = self.shared.flush_base.load(Ordering::Relaxed);
        Ok(consumed.saturating_sub(base))
    }

    fn timestamp(&self, timebase: Timebase) -> Result<FrameClockSample, DeviceError> {
        self.guard_released()?;
        match *self.shared.published.lock() {
            None => Err(DeviceError::NotReady),
            Some(ts) => Ok(FrameClockSample {
                frame_position: ts.frame_position,
                time_nanos: match timebase {
                    Timebase::Monotonic => ts.monotonic_nanos,
                    Timebase::BootTime => ts.boottime_nanos,
                },
                timebase,
            }),
        }
    }

    fn set_marker_position(&self, _frames: u64) -> Result<(), DeviceError> {
        Err(DeviceError::InvalidArgument {
            reason: "position notifications not supported by the cpal adapter".to_string(),
        })
    }

    fn set_notification_period(&self, _frames: u64) -> Result<(), DeviceError> {
        Err(DeviceError::InvalidArgument {
            reason: "position notifications not supported by the cpal adapter".to_string(),
        })
    }

    fn set_position_listener(
        &self,
        _listener: Option<Arc<dyn PositionListener>>,
    ) -> Result<(), DeviceError> {
        Err(DeviceError::InvalidArgument {
            reason: "position notifications not supported by the cpal adapter".to_string(),
        })
    }

    fn set_playback_rate(&self, _rate_hz: u32) -> Result<(), DeviceError> {
        Err(DeviceError::InvalidArgument {
            reason: "variable rate not supported by the cpal adapter".to_string(),
        })
    }

    fn set_playback_params(&self, _params: PlaybackParams) -> Result<(), DeviceError> {
        Err(DeviceError::InvalidArgument {
            reason: "variable rate not supported by the cpal adapter".to_string(),
        })
    }

    fn playback_params(&self) -> Result<PlaybackParams, DeviceError> {
        self.guard_released()?;
        Ok(PlaybackParams::default())
    }

    fn set_loop_enabled(&self, _enabled: bool) -> Result<(), DeviceError> {
        Err(DeviceError::InvalidArgument {
            reason: "looping not supported by the cpal adapter".to_string(),
        })
    }
}

impl std::fmt::Debug for CpalOutputDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalOutputDevice")
            .field("config", &self.shared.config)
            .field("state", &*self.shared.state.lock())
            .finish()
    }
}
