//! Session-level error type
//!
//! Wraps the device and verification taxonomies and adds the failure modes
//! only the harness itself can observe: timeouts, short blocking transfers
//! and notifications arriving after the session ended.

use audioprobe_core::{DeviceError, DeviceState};
use audioprobe_verify::VerifyError;
use std::time::Duration;
use thiserror::Error;

/// A fatal scenario failure. None of these is retried.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The device under test reported an error.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// A verifier found a contract violation.
    #[error(transparent)]
    Verify(#[from] VerifyError),

    /// A blocking transfer returned fewer frames than requested.
    ///
    /// Blocking mode is a contract, not a hint.
    #[error("blocking {op} moved {transferred} of {requested} frames")]
    ShortTransfer {
        /// Which transfer direction fell short
        op: &'static str,
        /// Frames requested
        requested: usize,
        /// Frames actually moved
        transferred: usize,
    },

    /// A blocking transfer exceeded its timeout budget; the device stalled.
    #[error("{op} did not complete within {budget:?}")]
    Timeout {
        /// Which operation stalled
        op: &'static str,
        /// Budget the operation was given
        budget: Duration,
    },

    /// No timestamp became available within the retry budget after start.
    #[error("no timestamp available after {attempts} attempts")]
    TimestampUnavailable {
        /// Queries made before giving up
        attempts: u32,
    },

    /// The device was not in the lifecycle state a transition promised.
    #[error("device in state {actual:?}, expected {expected:?}")]
    UnexpectedState {
        /// State the lifecycle contract promised
        expected: DeviceState,
        /// State actually observed
        actual: DeviceState,
    },

    /// Notifications fired after the session was stopped and the grace
    /// window had elapsed.
    #[error("{count} notification(s) delivered after session stop")]
    LateEvents {
        /// Number of late notifications
        count: u32,
    },
}
