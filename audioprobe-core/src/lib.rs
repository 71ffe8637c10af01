//! # Audioprobe Core
//!
//! Device-under-test abstraction and frame clock primitives for the
//! audioprobe timing verifier. This crate defines the [`AudioDevice`]
//! capability set a streaming audio device must expose, the clock model
//! relating frame positions to wall-clock time in two timebases, and a
//! deterministic synthetic device implementation for exercising the
//! verifiers without hardware.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod config;
pub mod device;
pub mod error;
#[cfg(feature = "hardware")]
pub mod hardware;
pub mod signal;
pub mod synthetic;

// Re-export main types
pub use clock::{FrameClockSample, Timebase};
pub use config::{ChannelLayout, DeviceConfig, SampleEncoding};
pub use device::{
    AudioDevice, DeviceState, Direction, FallbackMode, PlaybackParams, PositionListener,
    TransferMode,
};
pub use error::DeviceError;
#[cfg(feature = "hardware")]
pub use hardware::CpalOutputDevice;
pub use synthetic::SyntheticDevice;
