//! Host-side utilities for serial port discovery.

use crate::error::Result;
use crate::port::{PortEnumerator, PortInfo, validate_port};

/// List the serial ports present on this host.
#[cfg(feature = "native")]
pub fn discover_ports() -> Result<Vec<PortInfo>> {
    crate::port::NativePortEnumerator::list_ports()
}

/// Check that `requested` exists on this host before opening it.
#[cfg(feature = "native")]
pub fn validate_requested_port(requested: &str) -> Result<()> {
    validate_with::<crate::port::NativePortEnumerator>(requested)
}

/// Check `requested` against the ports reported by enumerator `E`.
///
/// An enumeration failure is returned as is, never read as an empty host.
pub fn validate_with<E: PortEnumerator>(requested: &str) -> Result<()> {
    let available = E::list_ports()?;
    validate_port(requested, &available)
}
