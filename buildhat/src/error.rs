//! Error types for buildhat.

use std::{fmt, io, path::PathBuf, time::Duration};
use thiserror::Error;

/// Result type for buildhat operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Bootloader session step that waits on a console marker.
///
/// Carried by [`Error::Timeout`] so a desynchronized session can be traced
/// back to the exact point where the peripheral stopped answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Waking the bootloader with a bare line terminator.
    Handshake,
    /// Reading the version banner.
    Version,
    /// Waiting for the prompt after `clear`.
    Clear,
    /// Waiting for the prompt after the firmware payload.
    LoadAck,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handshake => write!(f, "handshake"),
            Self::Version => write!(f, "version query"),
            Self::Clear => write!(f, "buffer clear"),
            Self::LoadAck => write!(f, "firmware load acknowledgement"),
        }
    }
}

/// Error type for buildhat operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the serial channel.
    ///
    /// A cancelled session surfaces here with [`io::ErrorKind::Interrupted`].
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Enumeration returned no serial ports at all.
    #[error("No serial ports found")]
    NoPortsFound,

    /// The requested port is not among the enumerated ports.
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// The GPIO peripheral could not be opened or mapped.
    #[error("GPIO hardware unavailable: {0}")]
    HardwareUnavailable(String),

    /// A GPIO line could not be configured or driven.
    #[error("GPIO error on pin {pin}: {message}")]
    Gpio {
        /// BCM pin number.
        pin: u8,
        /// Driver message.
        message: String,
    },

    /// No pattern matched before an `expect` deadline.
    #[error("Timeout: no match for {pattern} within {waited:?}")]
    ExpectTimeout {
        /// Names of the patterns that were expected.
        pattern: String,
        /// Time spent waiting.
        waited: Duration,
    },

    /// A bootloader step did not see its marker before the deadline.
    #[error("Timeout during {step}: no match for {pattern} within {waited:?}")]
    Timeout {
        /// Step that failed to synchronize.
        step: Step,
        /// Name of the marker that was expected.
        pattern: String,
        /// Time spent waiting.
        waited: Duration,
    },

    /// Protocol sequencing error.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Firmware or signature could not be obtained.
    #[error("Failed to read asset {}: {source}", path.display())]
    AssetRead {
        /// Asset location.
        path: PathBuf,
        /// Underlying cause.
        #[source]
        source: io::Error,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns the failing step if this is a protocol timeout.
    pub fn timeout_step(&self) -> Option<Step> {
        match self {
            Self::Timeout { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Whether the session was aborted by a cancellation request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::Interrupted)
    }

    /// Whether this error comes from port validation.
    pub fn is_port_validation(&self) -> bool {
        matches!(self, Self::NoPortsFound | Self::PortNotFound(_))
    }

    /// Attach the bootloader step to a channel-level timeout.
    #[must_use]
    pub fn at_step(self, step: Step) -> Self {
        match self {
            Self::ExpectTimeout { pattern, waited } => Self::Timeout {
                step,
                pattern,
                waited,
            },
            other => other,
        }
    }

    pub(crate) fn cancelled() -> Self {
        Self::Io(io::Error::new(
            io::ErrorKind::Interrupted,
            "session cancelled",
        ))
    }
}
