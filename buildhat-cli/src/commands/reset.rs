//! GPIO reset command implementation.

use anyhow::{Context, Result};
use buildhat::ResetConfig;
use console::style;
use std::time::Duration;

use crate::config::Config;
use crate::{CliError, GpioArgs};

/// Resolve pins and timing from flags/env, then config files, then defaults.
pub(crate) fn resolve_reset_config(args: &GpioArgs, config: &Config) -> Result<ResetConfig> {
    let mut reset = ResetConfig::default();
    if let Some(pin) = args
        .reset_pin
        .or(config.gpio.reset_pin)
    {
        reset = reset.with_reset_pin(pin);
    }
    if let Some(pin) = args
        .boot_pin
        .or(config.gpio.boot_pin)
    {
        reset = reset.with_boot_pin(pin);
    }
    if let Some(ms) = args
        .settle_ms
        .or(config.gpio.settle_ms)
    {
        reset = reset.with_settle(Duration::from_millis(ms));
    }

    if reset.reset_pin == reset.boot_pin {
        return Err(CliError::Config(format!(
            "RESET and BOOT cannot share GPIO{}",
            reset.reset_pin
        ))
        .into());
    }

    Ok(reset)
}

/// Pulse BOOT/RESET on the GPIO header.
pub(crate) fn run_reset(quiet: bool, reset: ResetConfig) -> Result<()> {
    if !quiet {
        eprintln!(
            "{} Resetting Build HAT (RESET=GPIO{}, BOOT=GPIO{})",
            style("🔄").cyan(),
            reset.reset_pin,
            reset.boot_pin
        );
    }
    buildhat::gpio::reset_on_header(reset).context("Failed to reset Build HAT")
}

/// Reset command implementation.
pub(crate) fn cmd_reset(quiet: bool, config: &Config, args: &GpioArgs) -> Result<()> {
    let reset = resolve_reset_config(args, config)?;
    run_reset(quiet, reset)?;

    if !quiet {
        eprintln!(
            "{} Build HAT is in bootloader mode",
            style("✓").green()
        );
    }
    Ok(())
}
