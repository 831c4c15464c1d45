//! Error handling for dipcoat
//!
//! Provides the error types for every layer of the controller:
//! - Connection errors (port discovery, open, write, link loss)
//! - Controller errors (operation preconditions, response timeouts)
//! - Protocol errors (decode anomalies, never surfaced to callers)
//!
//! All error types use `thiserror` for ergonomic error handling.

use crate::data::{Axis, LimitSide};
use thiserror::Error;

/// Connection error type
///
/// Represents errors related to the serial link with the dip coater:
/// discovery, opening the port and transport-level write failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// No serial port could be selected automatically
    #[error("No dip coater device found")]
    NoDeviceFound,

    /// Port not found
    #[error("Port not found: {port}")]
    PortNotFound {
        /// The name of the port that was not found.
        port: String,
    },

    /// Failed to open port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// Writing to the port failed
    #[error("Write failed: {reason}")]
    WriteError {
        /// The reason the write failed.
        reason: String,
    },

    /// Connection lost
    #[error("Connection lost: {reason}")]
    ConnectionLost {
        /// The reason the connection was lost.
        reason: String,
    },

    /// Port enumeration failed
    #[error("Failed to enumerate ports: {reason}")]
    EnumerationFailed {
        /// The reason enumeration failed.
        reason: String,
    },

    /// Invalid connection parameters
    #[error("Invalid connection parameters: {reason}")]
    InvalidParameters {
        /// The reason the parameters are invalid.
        reason: String,
    },
}

/// Controller error type
///
/// Represents errors raised by the operation API. Safety rejections
/// (`EmergencyActive`, `LimitReached`, `InvalidArgument`) are produced locally
/// and never reach the wire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// Controller is not connected
    #[error("Controller not connected")]
    NotConnected,

    /// No event arrived before the response timeout
    #[error("No response to '{command}' within {timeout_ms}ms")]
    ResponseTimeout {
        /// The command that was waiting.
        command: String,
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Emergency stop is engaged
    #[error("Emergency stop is active")]
    EmergencyActive,

    /// Axis already sits on the limit switch in the direction of travel
    #[error("Axis {axis} is at its {side} limit")]
    LimitReached {
        /// The blocked axis.
        axis: Axis,
        /// The limit switch that blocks the move.
        side: LimitSide,
    },

    /// An operation argument was rejected
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Why the argument was rejected.
        reason: String,
    },
}

/// Protocol error type
///
/// Raised internally when a received line looks like a known message but its
/// payload cannot be parsed. Decode logs these and falls back to a generic message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A line matched a known shape but its payload was unusable
    #[error("Decode anomaly in '{line}': {reason}")]
    DecodeAnomaly {
        /// The offending line.
        line: String,
        /// What was wrong with it.
        reason: String,
    },
}

/// Main error type for dipcoat
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Controller error
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Protocol error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Shorthand for an `InvalidArgument` controller error
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Error::Controller(ControllerError::InvalidArgument {
            reason: reason.into(),
        })
    }

    /// Check if this is a response timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Controller(ControllerError::ResponseTimeout { .. }))
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Check if the operation was refused locally by a safety precondition
    pub fn is_safety_rejection(&self) -> bool {
        matches!(
            self,
            Error::Controller(
                ControllerError::EmergencyActive
                    | ControllerError::LimitReached { .. }
                    | ControllerError::InvalidArgument { .. }
            )
        )
    }

    /// Check if the controller was not connected
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Error::Controller(ControllerError::NotConnected))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
