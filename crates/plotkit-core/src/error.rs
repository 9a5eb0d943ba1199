//! Error handling for PlotKit
//!
//! Provides error types for all layers of the driver:
//! - Device errors (reported by the plotter firmware)
//! - Connection errors (serial transport)
//! - Motion errors (local validation and buffer discipline)
//! - Protocol errors (malformed responses)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Device-reported error
///
/// The firmware prefixes a rejection response with a two-character code
/// (`E0`..`E3`). These variants are the decoded forms of those codes.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// The opcode was not recognized by the firmware
    #[error("Device rejected command: invalid command")]
    InvalidCommand,

    /// A second CONNECT was attempted on an established link
    #[error("Device rejected handshake: already connected")]
    AlreadyConnected,

    /// The requested target lies outside the machine's travel
    #[error("Device rejected move: position out of range")]
    OutOfRange,

    /// More moves were announced than the firmware buffer can hold
    #[error("Device rejected batch: command buffer too large")]
    BufferTooLarge,
}

/// Connection error type
///
/// Represents failures of the serial transport itself. These are fatal:
/// there is no retry or reconnect logic, a dropped connection requires a
/// caller-level restart.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    /// No session is established
    #[error("Not connected")]
    NotConnected,

    /// A handshake was attempted on a session that is already connected
    #[error("Session already connected")]
    AlreadyConnected,

    /// The session was already closed
    #[error("Session closed")]
    SessionClosed,

    /// Failed to open the serial port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// No response arrived within the read timeout
    #[error("Read timed out after {timeout_ms}ms")]
    ReadTimeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// The byte stream ended unexpectedly
    #[error("Connection lost: {reason}")]
    ConnectionLost {
        /// The reason the connection was lost.
        reason: String,
    },

    /// Low-level I/O failure on the port
    #[error("Serial I/O error: {reason}")]
    Io {
        /// The reason for the I/O error.
        reason: String,
    },
}

/// Motion error type
///
/// Local validation failures, detected before any transmission so a bad
/// request never costs a device round trip.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionError {
    /// Requested coordinate lies outside the axis travel limits
    #[error("{axis} target {requested}mm outside travel [0, {limit}mm]")]
    OutOfRange {
        /// The axis name (X, Y, or Z).
        axis: char,
        /// The requested coordinate in millimeters.
        requested: f64,
        /// The axis travel limit in millimeters.
        limit: f64,
    },

    /// Requested feed speed exceeds the configured maximum
    #[error("Requested speed {requested}mm/s exceeds limit {max}mm/s")]
    SpeedExceeded {
        /// The requested speed in mm/s.
        requested: f64,
        /// The configured maximum speed in mm/s.
        max: f64,
    },

    /// Push onto a full motion buffer
    ///
    /// Unreachable under the controller's auto-flush discipline; surfacing
    /// it means the flush invariant was violated.
    #[error("Motion buffer full ({capacity} moves)")]
    BufferFull {
        /// The buffer capacity.
        capacity: usize,
    },

    /// Pop from an empty motion buffer
    #[error("Motion buffer is empty")]
    BufferEmpty,
}

/// Protocol error type
///
/// A response arrived but could not be interpreted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A position payload was not three slash-separated integers
    #[error("Malformed position payload: {payload:?}")]
    MalformedPosition {
        /// The payload that failed to parse.
        payload: String,
    },
}

/// Main error type for PlotKit
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Device-reported error
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Motion error
    #[error(transparent)]
    Motion(#[from] MotionError),

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

    /// Check if this is a read timeout
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Connection(ConnectionError::ReadTimeout { .. })
        )
    }

    /// Check if this is a device-reported error
    pub fn is_device_error(&self) -> bool {
        matches!(self, Error::Device(_))
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Check if this is a local motion validation error
    pub fn is_motion_error(&self) -> bool {
        matches!(self, Error::Motion(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
