//! Device error types
//!
//! Errors a device-under-test can signal. Verification failures (drift,
//! count bounds) are a separate taxonomy in `audioprobe-verify`; these are
//! the conditions the device itself reports.

use crate::device::DeviceState;
use thiserror::Error;

/// Errors reported by an [`AudioDevice`](crate::device::AudioDevice).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// The device rejected the requested configuration.
    ///
    /// Recoverable: a subsequent open with corrected parameters must work.
    #[error("invalid configuration: {reason}")]
    Config {
        /// Why the configuration was rejected
        reason: String,
    },

    /// A timestamp is not yet available.
    ///
    /// Always returned before streaming starts; may be returned transiently
    /// after start because timestamps follow a different path than data.
    #[error("timestamp not ready")]
    NotReady,

    /// The operation is not valid in the device's current lifecycle state.
    #[error("operation invalid in state {state:?}")]
    InvalidState {
        /// State the device was in when the operation was attempted
        state: DeviceState,
    },

    /// An argument was outside the accepted range.
    ///
    /// The device's prior settings are left untouched.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// Why the argument was rejected
        reason: String,
    },

    /// The device was released; no further operations are possible.
    #[error("device released")]
    Released,

    /// The platform audio backend failed.
    #[error("backend failure: {reason}")]
    Backend {
        /// Backend-reported failure description
        reason: String,
    },
}
