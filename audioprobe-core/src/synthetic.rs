//! Synthetic clock-model device
//!
//! A deterministic [`AudioDevice`] implementation backed by the process
//! monotonic clock instead of audio hardware. Frames elapse at the
//! configured (or currently set) rate; marker and periodic notifications
//! are delivered from a device-owned thread; timestamps are published
//! periodically on a path separate from the data path, so the first query
//! after start can race the publication exactly as it does on real
//! hardware.
//!
//! The device carries no signal content. Reads fill the caller's buffer
//! with silence and writes only account for frames; position and timing
//! behavior is the subject under test, not audio data.

use crate::clock::{self, FrameClockSample, Timebase};
use crate::config::DeviceConfig;
use crate::device::{
    AudioDevice, DeviceState, Direction, PlaybackParams, PositionListener, TransferMode,
};
use crate::error::DeviceError;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Delivery thread poll interval.
const TICK: Duration = Duration::from_millis(2);

/// Longest a blocking transfer sleeps before re-checking the stream state,
/// so stop() unblocks it well inside the grace window.
const BLOCK_RECHECK: Duration = Duration::from_millis(5);

/// Interval between timestamp publications.
const PUBLISH_INTERVAL: Duration = Duration::from_millis(10);

/// One published timestamp triple. Both timebase views carry the same
/// frame position.
#[derive(Debug, Clone, Copy)]
struct PublishedTimestamp {
    frame_position: u64,
    monotonic_nanos: i64,
    boottime_nanos: i64,
}

/// Position clock: accumulated frames plus an anchor while streaming.
struct ClockState {
    state: DeviceState,
    /// Frames accumulated before `anchor` was (re)set.
    base_frames: f64,
    /// Set while Active; elapsed time since it advances the clock.
    anchor: Option<Instant>,
    /// Effective advance rate; updated by rate/params changes.
    clock_rate_hz: f64,
    params: PlaybackParams,
    /// Capture: frames handed to the reader.
    frames_consumed: u64,
    /// Playback: frames queued by the writer.
    frames_written: u64,
    loop_enabled: bool,
}

impl ClockState {
    /// Frames elapsed on the device clock at `now`.
    fn clock_frames(&self, now: Instant) -> f64 {
        let streamed = self
            .anchor
            .map(|anchor| now.duration_since(anchor).as_secs_f64() * self.clock_rate_hz)
            .unwrap_or(0.0);
        self.base_frames + streamed
    }

    /// Fold elapsed frames into the base and re-anchor at `now`.
    fn fold(&mut self, now: Instant) {
        self.base_frames = self.clock_frames(now);
        if self.anchor.is_some() {
            self.anchor = Some(now);
        }
    }

    /// Head position: playback cannot advance past the written content
    /// unless looping.
    fn head_frames(&self, direction: Direction, now: Instant) -> u64 {
        let frames = self.clock_frames(now);
        let frames = match direction {
            Direction::Capture => frames,
            Direction::Playback if self.loop_enabled => frames,
            Direction::Playback => frames.min(self.frames_written as f64),
        };
        frames as u64
    }
}

struct EventState {
    marker: Option<u64>,
    period: u64,
    next_periodic: u64,
}

struct Shared {
    config: DeviceConfig,
    direction: Direction,
    clock: Mutex<ClockState>,
    events: Mutex<EventState>,
    published: Mutex<Option<PublishedTimestamp>>,
    listener: Mutex<Option<Arc<dyn PositionListener>>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

/// Simulated streaming device; cheap to clone, all clones share one
/// underlying stream.
#[derive(Clone)]
pub struct SyntheticDevice {
    shared: Arc<Shared>,
}

impl SyntheticDevice {
    /// Open a synthetic device for the given direction.
    ///
    /// Validates the configuration; the granted buffer size (possibly
    /// clamped up to the device minimum) is visible through
    /// [`AudioDevice::config`]. A rejected configuration leaves nothing
    /// behind; opening again with corrected parameters works.
    pub fn open(config: DeviceConfig, direction: Direction) -> Result<Self, DeviceError> {
        let granted_buffer = config.validate()?;
        let config = DeviceConfig {
            buffer_frames: granted_buffer,
            ..config
        };
        debug!(
            sample_rate_hz = config.sample_rate_hz,
            buffer_frames = config.buffer_frames,
            ?direction,
            "opened synthetic device"
        );
        Ok(Self {
            shared: Arc::new(Shared {
                clock: Mutex::new(ClockState {
                    state: DeviceState::Initialized,
                    base_frames: 0.0,
                    anchor: None,
                    clock_rate_hz: f64::from(config.sample_rate_hz),
                    params: PlaybackParams::default(),
                    frames_consumed: 0,
                    frames_written: 0,
                    loop_enabled: false,
                }),
                events: Mutex::new(EventState {
                    marker: None,
                    period: 0,
                    next_periodic: 0,
                }),
                published: Mutex::new(None),
                listener: Mutex::new(None),
                worker: Mutex::new(None),
                config,
                direction,
            }),
        })
    }

    /// Open a capture-direction device.
    pub fn capture(config: DeviceConfig) -> Result<Self, DeviceError> {
        Self::open(config, Direction::Capture)
    }

    /// Open a playback-direction device.
    pub fn playback(config: DeviceConfig) -> Result<Self, DeviceError> {
        Self::open(config, Direction::Playback)
    }

    fn guard_released(&self) -> Result<(), DeviceError> {
        if self.shared.clock.lock().state == DeviceState::Released {
            return Err(DeviceError::Released);
        }
        Ok(())
    }

    fn publish_now(&self) {
        let position = {
            let clock = self.shared.clock.lock();
            clock.head_frames(self.shared.direction, Instant::now())
        };
        *self.shared.published.lock() = Some(PublishedTimestamp {
            frame_position: position,
            monotonic_nanos: clock::monotonic_nanos(),
            boottime_nanos: clock::boottime_nanos(),
        });
    }

    fn join_worker(&self) {
        let handle = self.shared.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    fn require_direction(&self, direction: Direction, op: &str) -> Result<(), DeviceError> {
        if self.shared.direction != direction {
            return Err(DeviceError::InvalidArgument {
                reason: format!("{} not supported on a {:?} device", op, self.shared.direction),
            });
        }
        Ok(())
    }
}

/// Delivery loop: publishes timestamps and fires position notifications
/// while the stream is active. Holds only a weak reference so a dropped
/// device tears the thread down.
fn delivery_loop(weak: Weak<Shared>) {
    // First publication lands a full interval after start, so an immediate
    // query races the publication path the way it does on real hardware.
    let mut last_publish = Instant::now();
    loop {
        thread::sleep(TICK);
        let Some(shared) = weak.upgrade() else {
            return;
        };
        let device = SyntheticDevice { shared };

        let (state, position) = {
            let clock = device.shared.clock.lock();
            (
                clock.state,
                clock.head_frames(device.shared.direction, Instant::now()),
            )
        };
        if state != DeviceState::Active {
            return;
        }

        if last_publish.elapsed() >= PUBLISH_INTERVAL {
            device.publish_now();
            last_publish = Instant::now();
        }

        // Collect due notifications without holding the event lock across
        // the listener calls; a marker handler re-arms through the device.
        let (marker_fired, periodic_fires) = {
            let mut events = device.shared.events.lock();
            let marker_fired = match events.marker {
                Some(marker) if position >= marker => {
                    events.marker = None;
                    true
                }
                _ => false,
            };
            let mut periodic_fires = 0u32;
            if events.period > 0 {
                while position >= events.next_periodic {
                    events.next_periodic += events.period;
                    periodic_fires += 1;
                }
            }
            (marker_fired, periodic_fires)
        };

        if marker_fired || periodic_fires > 0 {
            let listener = device.shared.listener.lock().clone();
            if let Some(listener) = listener {
                if marker_fired {
                    listener.on_marker_reached(&device);
                }
                for _ in 0..periodic_fires {
                    listener.on_periodic_notification(&device);
                }
            }
        }
    }
}

impl AudioDevice for SyntheticDevice {
    fn state(&self) -> DeviceState {
        self.shared.clock.lock().state
    }

    fn direction(&self) -> Direction {
        self.shared.direction
    }

    fn config(&self) -> DeviceConfig {
        self.shared.config
    }

    fn start(&self) -> Result<(), DeviceError> {
        {
            let mut clock = self.shared.clock.lock();
            match clock.state {
                DeviceState::Initialized | DeviceState::Stopped | DeviceState::Paused => {}
                DeviceState::Active => {
                    return Err(DeviceError::InvalidState {
                        state: DeviceState::Active,
                    })
                }
                DeviceState::Released => return Err(DeviceError::Released),
                DeviceState::Uninitialized => {
                    return Err(DeviceError::InvalidState {
                        state: DeviceState::Uninitialized,
                    })
                }
            }
            let resuming = clock.state == DeviceState::Paused;
            clock.anchor = Some(Instant::now());
            clock.state = DeviceState::Active;
            if !resuming {
                // New session: the previous position-to-time correspondence
                // is gone, and the first query may race the publication path.
                *self.shared.published.lock() = None;
            }
            let position = clock.head_frames(self.shared.direction, Instant::now());
            let mut events = self.shared.events.lock();
            if events.period > 0 {
                events.next_periodic = position + events.period;
            }
        }
        self.join_worker();
        let weak = Arc::downgrade(&self.shared);
        let handle = thread::Builder::new()
            .name("audioprobe-delivery".to_string())
            .spawn(move || delivery_loop(weak))
            .map_err(|e| DeviceError::Backend {
                reason: format!("failed to spawn delivery thread: {}", e),
            })?;
        *self.shared.worker.lock() = Some(handle);
        debug!("synthetic device started");
        Ok(())
    }

    fn stop(&self) -> Result<(), DeviceError> {
        {
            let mut clock = self.shared.clock.lock();
            match clock.state {
                DeviceState::Active | DeviceState::Paused => {}
                DeviceState::Released => return Err(DeviceError::Released),
                state => return Err(DeviceError::InvalidState { state }),
            }
            clock.fold(Instant::now());
            clock.anchor = None;
            clock.state = DeviceState::Stopped;
        }
        // Final frozen timestamp so post-stop queries succeed; stop does
        // not reset the position counter.
        self.publish_now();
        self.join_worker();
        debug!("synthetic device stopped");
        Ok(())
    }

    fn pause(&self) -> Result<(), DeviceError> {
        {
            let mut clock = self.shared.clock.lock();
            match clock.state {
                DeviceState::Active => {}
                DeviceState::Released => return Err(DeviceError::Released),
                state => return Err(DeviceError::InvalidState { state }),
            }
            clock.fold(Instant::now());
            clock.anchor = None;
            clock.state = DeviceState::Paused;
        }
        self.publish_now();
        self.join_worker();
        Ok(())
    }

    fn flush(&self) -> Result<(), DeviceError> {
        {
            let mut clock = self.shared.clock.lock();
            match clock.state {
                DeviceState::Active | DeviceState::Paused | DeviceState::Stopped => {}
                DeviceState::Released => return Err(DeviceError::Released),
                state => return Err(DeviceError::InvalidState { state }),
            }
            clock.state = DeviceState::Stopped;
            clock.anchor = None;
        }
        self.join_worker();
        let mut clock = self.shared.clock.lock();
        clock.base_frames = 0.0;
        clock.frames_consumed = 0;
        clock.frames_written = 0;
        clock.loop_enabled = false;
        let mut events = self.shared.events.lock();
        events.next_periodic = events.period;
        *self.shared.published.lock() = None;
        debug!("synthetic device flushed");
        Ok(())
    }

    fn release(&self) -> Result<(), DeviceError> {
        {
            let mut clock = self.shared.clock.lock();
            if clock.state == DeviceState::Released {
                return Err(DeviceError::Released);
            }
            clock.fold(Instant::now());
            clock.anchor = None;
            clock.state = DeviceState::Released;
        }
        self.join_worker();
        *self.shared.listener.lock() = None;
        debug!("synthetic device released");
        Ok(())
    }

    fn read(
        &self,
        buf: &mut [f32],
        count_frames: usize,
        mode: TransferMode,
    ) -> Result<usize, DeviceError> {
        self.guard_released()?;
        self.require_direction(Direction::Capture, "read")?;
        let samples_needed = count_frames * self.shared.config.channels.channel_count();
        if buf.len() < samples_needed {
            return Err(DeviceError::InvalidArgument {
                reason: format!(
                    "buffer of {} samples too small for {} frames",
                    buf.len(),
                    count_frames
                ),
            });
        }

        let rate = f64::from(self.shared.config.sample_rate_hz);
        loop {
            let (available, state) = {
                let clock = self.shared.clock.lock();
                if clock.state == DeviceState::Initialized {
                    return Err(DeviceError::InvalidState {
                        state: DeviceState::Initialized,
                    });
                }
                let produced = clock.clock_frames(Instant::now()) as u64;
                (produced.saturating_sub(clock.frames_consumed), clock.state)
            };
            let enough = available as usize >= count_frames;
            if enough || mode == TransferMode::NonBlocking || state != DeviceState::Active {
                let transfer = count_frames.min(available as usize);
                let mut clock = self.shared.clock.lock();
                clock.frames_consumed += transfer as u64;
                let samples = transfer * self.shared.config.channels.channel_count();
                buf[..samples].fill(0.0);
                return Ok(transfer);
            }
            let deficit = count_frames - available as usize;
            let wait = Duration::from_secs_f64(deficit as f64 / rate);
            thread::sleep(wait.min(BLOCK_RECHECK));
        }
    }

    fn write(
        &self,
        buf: &[f32],
        count_frames: usize,
        mode: TransferMode,
    ) -> Result<usize, DeviceError> {
        self.guard_released()?;
        self.require_direction(Direction::Playback, "write")?;
        let samples_needed = count_frames * self.shared.config.channels.channel_count();
        if buf.len() < samples_needed {
            return Err(DeviceError::InvalidArgument {
                reason: format!(
                    "buffer of {} samples too small for {} frames",
                    buf.len(),
                    count_frames
                ),
            });
        }

        let mut written = 0usize;
        loop {
            let (space, state) = {
                let mut clock = self.shared.clock.lock();
                let drained = clock.head_frames(self.shared.direction, Instant::now());
                let pending = clock.frames_written.saturating_sub(drained);
                let space = self.shared.config.buffer_frames.saturating_sub(pending) as usize;
                let transfer = space.min(count_frames - written);
                clock.frames_written += transfer as u64;
                written += transfer;
                (space, clock.state)
            };
            if written >= count_frames
                || mode == TransferMode::NonBlocking
                || (space == 0 && state != DeviceState::Active)
            {
                return Ok(written);
            }
            if written < count_frames && space == 0 {
                thread::sleep(BLOCK_RECHECK);
            }
        }
    }

    fn position(&self) -> Result<u64, DeviceError> {
        self.guard_released()?;
        let clock = self.shared.clock.lock();
        Ok(clock.head_frames(self.shared.direction, Instant::now()))
    }

    fn timestamp(&self, timebase: Timebase) -> Result<FrameClockSample, DeviceError> {
        self.guard_released()?;
        let published = *self.shared.published.lock();
        match published {
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

    fn set_marker_position(&self, frames: u64) -> Result<(), DeviceError> {
        self.guard_released()?;
        self.shared.events.lock().marker = Some(frames);
        Ok(())
    }

    fn set_notification_period(&self, frames: u64) -> Result<(), DeviceError> {
        self.guard_released()?;
        let position = {
            let clock = self.shared.clock.lock();
            clock.head_frames(self.shared.direction, Instant::now())
        };
        let mut events = self.shared.events.lock();
        events.period = frames;
        events.next_periodic = if frames > 0 { position + frames } else { 0 };
        Ok(())
    }

    fn set_position_listener(
        &self,
        listener: Option<Arc<dyn PositionListener>>,
    ) -> Result<(), DeviceError> {
        self.guard_released()?;
        *self.shared.listener.lock() = listener;
        Ok(())
    }

    fn set_playback_rate(&self, rate_hz: u32) -> Result<(), DeviceError> {
        self.guard_released()?;
        self.require_direction(Direction::Playback, "set_playback_rate")?;
        let max_rate = crate::config::MAX_SAMPLE_RATE_HZ * 4;
        if rate_hz == 0 || rate_hz > max_rate {
            return Err(DeviceError::InvalidArgument {
                reason: format!("playback rate {} Hz outside 1..={} Hz", rate_hz, max_rate),
            });
        }
        let mut clock = self.shared.clock.lock();
        clock.fold(Instant::now());
        clock.clock_rate_hz = f64::from(rate_hz);
        Ok(())
    }

    fn set_playback_params(&self, params: PlaybackParams) -> Result<(), DeviceError> {
        self.guard_released()?;
        self.require_direction(Direction::Playback, "set_playback_params")?;
        params.validate()?;
        let mut clock = self.shared.clock.lock();
        clock.fold(Instant::now());
        clock.params = params;
        clock.clock_rate_hz = f64::from(self.shared.config.sample_rate_hz) * f64::from(params.speed);
        Ok(())
    }

    fn playback_params(&self) -> Result<PlaybackParams, DeviceError> {
        self.guard_released()?;
        Ok(self.shared.clock.lock().params)
    }

    fn set_loop_enabled(&self, enabled: bool) -> Result<(), DeviceError> {
        self.guard_released()?;
        self.require_direction(Direction::Playback, "set_loop_enabled")?;
        self.shared.clock.lock().loop_enabled = enabled;
        Ok(())
    }
}

impl std::fmt::Debug for SyntheticDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntheticDevice")
            .field("direction", &self.shared.direction)
            .field("config", &self.shared.config)
            .field("state", &self.shared.clock.lock().state)
            .finish()
    }
}
