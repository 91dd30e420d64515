//! Error types used by the bus runtime and the envelope codec.
//!
//! This module defines two main error enums:
//!
//! - [`BusError`] — errors raised by bus lifecycle operations (mount, default bus).
//! - [`EnvelopeError`] — errors raised while encoding or decoding wire frames.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//!
//! Transport failures are never surfaced as errors: publishing is fire-and-forget
//! and a lost frame is a silent best-effort delivery failure.

use thiserror::Error;

use crate::transport::Role;

/// # Errors produced by bus lifecycle operations.
///
/// [`BusError::InvalidRole`] and [`BusError::NoRuntime`] come from mounting;
/// the remaining variants belong to the process-wide default bus.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// `mount()` was called in a process whose role cannot host the relay.
    #[error("cannot mount the relay in a {role} process")]
    InvalidRole {
        /// Role of the calling process.
        role: Role,
    },

    /// A task-spawning operation was called outside a Tokio runtime.
    #[error("no tokio runtime is running")]
    NoRuntime,

    /// The default bus was used before [`install`](crate::global::install).
    #[error("default bus is not installed")]
    NotInstalled,

    /// [`install`](crate::global::install) was called more than once.
    #[error("default bus is already installed")]
    AlreadyInstalled,
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use clusterbus::{BusError, Role};
    ///
    /// let err = BusError::InvalidRole { role: Role::Worker };
    /// assert_eq!(err.as_label(), "bus_invalid_role");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::InvalidRole { .. } => "bus_invalid_role",
            BusError::NoRuntime => "bus_no_runtime",
            BusError::NotInstalled => "bus_not_installed",
            BusError::AlreadyInstalled => "bus_already_installed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            BusError::InvalidRole { role } => format!("mount refused: role={role}"),
            BusError::NoRuntime => "mount refused: no tokio runtime".to_string(),
            BusError::NotInstalled => "default bus used before install".to_string(),
            BusError::AlreadyInstalled => "default bus installed twice".to_string(),
        }
    }
}

/// # Errors produced by the envelope codec.
///
/// Inbound frames cross a process boundary and are not trusted; the dispatcher
/// and the relay drop frames that fail to decode instead of propagating these.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// The frame is not a JSON object of the expected shape.
    #[error("malformed frame: {error}")]
    Malformed {
        /// Underlying decoder message.
        error: String,
    },

    /// The frame carries no `type` field, or an empty one.
    #[error("frame has no event type")]
    MissingType,

    /// The envelope could not be serialized.
    #[error("encode failed: {error}")]
    Encode {
        /// Underlying encoder message.
        error: String,
    },
}

impl EnvelopeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use clusterbus::EnvelopeError;
    ///
    /// assert_eq!(EnvelopeError::MissingType.as_label(), "envelope_missing_type");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            EnvelopeError::Malformed { .. } => "envelope_malformed",
            EnvelopeError::MissingType => "envelope_missing_type",
            EnvelopeError::Encode { .. } => "envelope_encode_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            EnvelopeError::Malformed { error } => format!("malformed: {error}"),
            EnvelopeError::MissingType => "missing type".to_string(),
            EnvelopeError::Encode { error } => format!("encode: {error}"),
        }
    }
}
