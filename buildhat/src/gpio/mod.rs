//! BOOT/RESET line control for entering the Build HAT bootloader.
//!
//! The Build HAT microcontroller samples its BOOT line when it leaves reset.
//! Holding BOOT low across a RESET pulse makes it start in the serial
//! bootloader instead of the installed firmware:
//!
//! ```text
//! BOOT   ‾‾‾|______________________________
//! RESET  ‾‾‾|____________|‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾
//!           |<- settle ->|<- settle ->|
//!           both low     release      bootloader up
//! ```
//!
//! The sequencer is written against [`ControlPins`] so it can run on the
//! Raspberry Pi header ([`rpi::RpiPins`], feature `rpi`) or on a recording
//! fake.

#[cfg(all(feature = "rpi", target_os = "linux"))]
pub mod rpi;

use std::thread;
use std::time::Duration;

use log::{debug, info};

use crate::error::Result;

/// BCM number of the line wired to the Build HAT RESET input.
pub const DEFAULT_RESET_PIN: u8 = 4;

/// BCM number of the line wired to the Build HAT BOOT input.
pub const DEFAULT_BOOT_PIN: u8 = 22;

/// Hold time after each transition.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(100);

/// Digital output lines addressed by BCM number.
pub trait ControlPins {
    /// Configure `pin` as an output.
    fn set_output(&mut self, pin: u8) -> Result<()>;

    /// Drive `pin` low.
    fn drive_low(&mut self, pin: u8) -> Result<()>;

    /// Drive `pin` high.
    fn drive_high(&mut self, pin: u8) -> Result<()>;
}

/// Pin assignment and timing for the reset pulse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetConfig {
    /// RESET line.
    pub reset_pin: u8,
    /// BOOT line.
    pub boot_pin: u8,
    /// Hold time after asserting reset and after releasing it.
    pub settle: Duration,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            reset_pin: DEFAULT_RESET_PIN,
            boot_pin: DEFAULT_BOOT_PIN,
            settle: DEFAULT_SETTLE,
        }
    }
}

impl ResetConfig {
    /// Use another RESET line.
    #[must_use]
    pub fn with_reset_pin(mut self, pin: u8) -> Self {
        self.reset_pin = pin;
        self
    }

    /// Use another BOOT line.
    #[must_use]
    pub fn with_boot_pin(mut self, pin: u8) -> Self {
        self.boot_pin = pin;
        self
    }

    /// Use another hold time.
    #[must_use]
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }
}

/// Drives the BOOT/RESET pulse that lands the Build HAT in its bootloader.
pub struct ResetSequencer<P: ControlPins> {
    pins: P,
    config: ResetConfig,
}

impl<P: ControlPins> ResetSequencer<P> {
    /// Create a sequencer over `pins`.
    pub fn new(pins: P, config: ResetConfig) -> Self {
        Self { pins, config }
    }

    /// Give back the pin driver.
    pub fn into_inner(self) -> P {
        self.pins
    }

    /// Pulse RESET with BOOT held low.
    ///
    /// Returns once the second settle period has elapsed; the bootloader
    /// console is expected to be listening by then. Lines are left as
    /// driven (BOOT low, RESET high).
    pub fn reset(&mut self) -> Result<()> {
        let ResetConfig {
            reset_pin,
            boot_pin,
            settle,
        } = self.config;

        info!("Resetting Build HAT into bootloader (RESET={reset_pin}, BOOT={boot_pin})");

        self.pins
            .set_output(reset_pin)?;
        self.pins
            .set_output(boot_pin)?;

        self.pins
            .drive_low(boot_pin)?;
        self.pins
            .drive_low(reset_pin)?;
        debug!("BOOT and RESET low, holding {settle:?}");
        thread::sleep(settle);

        self.pins
            .drive_high(reset_pin)?;
        debug!("RESET released, waiting {settle:?}");
        thread::sleep(settle);

        Ok(())
    }
}

/// Run the reset pulse on the Raspberry Pi GPIO header.
#[cfg(all(feature = "rpi", target_os = "linux"))]
pub fn reset_on_header(config: ResetConfig) -> Result<()> {
    let pins = rpi::RpiPins::open()?;
    ResetSequencer::new(pins, config).reset()
}

/// Run the reset pulse on the Raspberry Pi GPIO header.
///
/// Always fails on builds without the `rpi` feature or off Linux.
#[cfg(not(all(feature = "rpi", target_os = "linux")))]
pub fn reset_on_header(config: ResetConfig) -> Result<()> {
    let _ = config;
    Err(crate::error::Error::HardwareUnavailable(
        "built without Raspberry Pi GPIO support".into(),
    ))
}
