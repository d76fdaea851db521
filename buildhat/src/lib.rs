//! # buildhat
//!
//! A library for bringing a Raspberry Pi Build HAT into its serial
//! bootloader and uploading firmware to it.
//!
//! This crate provides:
//!
//! - The BOOT/RESET pulse that makes the Build HAT start in its bootloader
//! - A pattern-matched serial channel (`expect` with deadlines)
//! - The Build HAT image checksum
//! - The bootloader upload session (`version`, `clear`, `load`,
//!   `signature`, `reboot`)
//!
//! ## Features
//!
//! - `native` (default): serial port support via the `serialport` crate
//! - `rpi` (default, Linux only): GPIO header access via `rppal`
//! - `serde`: Serialization support for data types
//!
//! ## Example
//!
//! ```rust,no_run
//! use buildhat::{
//!     BuildHatFlasher, FirmwareBundle, FlasherConfig, NativePort, ResetConfig, SerialConfig,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bundle = FirmwareBundle::from_dir("data")?;
//!
//!     // Land the Build HAT in its bootloader
//!     buildhat::gpio::reset_on_header(ResetConfig::default())?;
//!
//!     // Upload firmware and signature, then reboot
//!     let port = NativePort::open(&SerialConfig::new("/dev/serial0"))?;
//!     let flasher = BuildHatFlasher::new(port, FlasherConfig::default());
//!     let report = flasher.run(&bundle, |state| println!("{state}"))?;
//!
//!     println!("Flashed {} bytes, {}", report.firmware_len, report.version);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::{Arc, OnceLock};

pub mod bootloader;
pub mod error;
pub mod gpio;
pub mod host;
pub mod image;
pub mod port;
pub mod protocol;

static INTERRUPT_CHECKER: OnceLock<Arc<dyn Fn() -> bool + Send + Sync>> = OnceLock::new();

/// Register a global interruption checker polled by every `expect` wait.
///
/// The checker should return `true` when the current session should stop
/// (for example after receiving Ctrl-C in CLI applications). Only the first
/// registration takes effect.
pub fn set_interrupt_checker<F>(checker: F)
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    let _ = INTERRUPT_CHECKER.set(Arc::new(checker));
}

/// Returns whether interruption was requested by the embedding application.
#[must_use]
pub fn is_interrupted_requested() -> bool {
    INTERRUPT_CHECKER
        .get()
        .is_some_and(|checker| checker())
}

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::{NativePort, NativePortEnumerator};
pub use {
    bootloader::{BuildHatFlasher, Command, FlashReport, FlashState, FlasherConfig},
    error::{Error, Result, Step},
    gpio::{ControlPins, ResetConfig, ResetSequencer},
    image::FirmwareBundle,
    port::{Port, PortEnumerator, PortInfo, SerialConfig, validate_port},
    protocol::{CancelHandle, ExpectChannel, Match, Pattern, checksum},
};
