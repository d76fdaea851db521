//! Raspberry Pi GPIO header backend.

use std::collections::HashMap;

use log::debug;
use rppal::gpio::{Gpio, OutputPin};

use crate::error::{Error, Result};
use crate::gpio::ControlPins;

/// Output lines on the Raspberry Pi header, claimed on first use.
pub struct RpiPins {
    gpio: Gpio,
    outputs: HashMap<u8, OutputPin>,
}

impl RpiPins {
    /// Open the GPIO peripheral.
    pub fn open() -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| Error::HardwareUnavailable(e.to_string()))?;
        Ok(Self {
            gpio,
            outputs: HashMap::new(),
        })
    }

    fn output(&mut self, pin: u8) -> Result<&mut OutputPin> {
        if !self
            .outputs
            .contains_key(&pin)
        {
            let mut output = self
                .gpio
                .get(pin)
                .map_err(|e| Error::Gpio {
                    pin,
                    message: e.to_string(),
                })?
                .into_output();
            // Lines must hold their level after the process exits.
            output.set_reset_on_drop(false);
            debug!("Claimed GPIO{pin} as output");
            self.outputs
                .insert(pin, output);
        }

        self.outputs
            .get_mut(&pin)
            .ok_or_else(|| Error::Gpio {
                pin,
                message: "pin not claimed".into(),
            })
    }
}

impl ControlPins for RpiPins {
    fn set_output(&mut self, pin: u8) -> Result<()> {
        self.output(pin)
            .map(|_| ())
    }

    fn drive_low(&mut self, pin: u8) -> Result<()> {
        self.output(pin)?
            .set_low();
        Ok(())
    }

    fn drive_high(&mut self, pin: u8) -> Result<()> {
        self.output(pin)?
            .set_high();
        Ok(())
    }
}
