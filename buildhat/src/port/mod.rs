//! Port abstraction for the Build HAT serial link.
//!
//! The bootloader driver never touches `serialport` directly. It talks to a
//! [`Port`], which lets the protocol layer run unchanged against the native
//! UART or against an in-memory fake in tests.
//!
//! ```text
//! +----------------------+
//! |  BuildHatFlasher     |
//! +----------+-----------+
//!            |
//! +----------v-----------+
//! |  ExpectChannel       |
//! +----------+-----------+
//!            |
//! +----------v-----------+
//! |  Port trait          |
//! +----------+-----------+
//!            |
//! +----------v-----------+
//! |  NativePort          |
//! |  (serialport)        |
//! +----------------------+
//! ```

#[cfg(feature = "native")]
pub mod native;

use std::io::{Read, Write};
use std::time::Duration;

use log::debug;

use crate::error::{Error, Result};

/// Baud rate of the Build HAT bootloader console.
pub const BOOTLOADER_BAUD: u32 = 115200;

/// Serial port configuration.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/serial0", "/dev/ttyAMA0").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read timeout of a single poll.
    ///
    /// This is not a protocol deadline; it bounds how long one read may block
    /// so that step deadlines and cancellation are observed promptly.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: BOOTLOADER_BAUD,
            timeout: Duration::from_millis(100),
        }
    }
}

impl SerialConfig {
    /// Create a configuration for the given port at the bootloader baud rate.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Default::default()
        }
    }

}

/// Serial port information.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PortInfo {
    /// Port name/path.
    pub name: String,
    /// USB vendor ID (if available).
    pub vid: Option<u16>,
    /// USB product ID (if available).
    pub pid: Option<u16>,
    /// Product string (if available).
    pub product: Option<String>,
}

impl PortInfo {
    /// Port info with only a name, as reported for on-board UARTs.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vid: None,
            pid: None,
            product: None,
        }
    }
}

/// Duplex byte stream bound to one hardware port.
pub trait Port: Read + Write + Send {
    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Close the port and release resources.
    ///
    /// After calling this method every read and write fails. Calling it
    /// twice is harmless.
    fn close(&mut self) -> Result<()>;

    /// Write all bytes, blocking until complete.
    fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()> {
        std::io::Write::write_all(self, buf)?;
        std::io::Write::flush(self)?;
        Ok(())
    }
}

/// Trait for listing available serial ports.
pub trait PortEnumerator {
    /// List all available serial ports.
    fn list_ports() -> Result<Vec<PortInfo>>;
}

/// Check that `requested` is one of the enumerated `available` ports.
///
/// Enumeration lists device nodes, not aliases such as `/dev/serial0`, so a
/// name that is not listed is resolved through its symlinks and checked
/// again. An empty list fails with [`Error::NoPortsFound`]; a list without
/// the requested port fails with [`Error::PortNotFound`] naming `requested`
/// as given.
pub fn validate_port(requested: &str, available: &[PortInfo]) -> Result<()> {
    if available.is_empty() {
        return Err(Error::NoPortsFound);
    }

    let listed = |name: &str| {
        available
            .iter()
            .any(|p| p.name == name)
    };
    if listed(requested) {
        return Ok(());
    }

    if let Ok(target) = std::fs::canonicalize(requested) {
        let target = target.to_string_lossy();
        if listed(&target) {
            debug!("{requested} resolves to {target}");
            return Ok(());
        }
    }

    debug!(
        "Enumerated ports: {:?}",
        available
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
    );
    Err(Error::PortNotFound(requested.to_string()))
}

// Re-export the native implementation
#[cfg(feature = "native")]
pub use native::{NativePort, NativePortEnumerator};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_config_default() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 115200);
        assert!(config.port_name.is_empty());
    }

    #[test]
    fn test_serial_config_new() {
        let config = SerialConfig::new("/dev/ttyAMA0");
        assert_eq!(config.port_name, "/dev/ttyAMA0");
        assert_eq!(config.baud_rate, BOOTLOADER_BAUD);
        assert_eq!(config.timeout, Duration::from_millis(100));
    }

    #[test]
    fn test_validate_port_empty_list() {
        let err = validate_port("/dev/serial0", &[]).unwrap_err();
        assert!(matches!(err, Error::NoPortsFound));
    }

    #[test]
    fn test_validate_port_missing_names_requested_port() {
        let ports = vec![PortInfo::named("/dev/ttyUSB0"), PortInfo::named("/dev/ttyS0")];
        let err = validate_port("/dev/serial0", &ports).unwrap_err();
        match err {
            Error::PortNotFound(name) => assert_eq!(name, "/dev/serial0"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_port_accepts_symlink_to_listed_device() {
        let dir = tempfile::tempdir().unwrap();
        let device = dir.path().join("ttyAMA0");
        std::fs::write(&device, b"").unwrap();
        let alias = dir.path().join("serial0");
        std::os::unix::fs::symlink(&device, &alias).unwrap();

        let device = std::fs::canonicalize(&device).unwrap();
        let ports = vec![PortInfo::named(device.to_string_lossy())];
        validate_port(&alias.to_string_lossy(), &ports).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_port_symlink_to_unlisted_device() {
        let dir = tempfile::tempdir().unwrap();
        let device = dir.path().join("ttyS0");
        std::fs::write(&device, b"").unwrap();
        let alias = dir.path().join("serial1");
        std::os::unix::fs::symlink(&device, &alias).unwrap();

        let alias = alias.to_string_lossy().into_owned();
        let ports = vec![PortInfo::named("/dev/ttyAMA0")];
        match validate_port(&alias, &ports) {
            Err(Error::PortNotFound(name)) => assert_eq!(name, alias),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_validate_port_present() {
        let ports = vec![PortInfo::named("/dev/ttyS0"), PortInfo::named("/dev/serial0")];
        assert!(validate_port("/dev/serial0", &ports).is_ok());
    }

    #[test]
    fn test_validate_port_requires_exact_name() {
        let ports = vec![PortInfo::named("/dev/serial0")];
        assert!(validate_port("/dev/serial", &ports).is_err());
    }
}
