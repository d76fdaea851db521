//! Firmware upload command implementation.

use anyhow::{Context, Result};
use buildhat::bootloader::flasher::PROMPT_TIMEOUT;
use buildhat::image::{DEFAULT_DIR, FIRMWARE_FILE, SIGNATURE_FILE};
use buildhat::{BuildHatFlasher, FirmwareBundle, FlashState, FlasherConfig, NativePort, SerialConfig};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use std::path::PathBuf;
use std::time::Duration;

use crate::commands::reset::{resolve_reset_config, run_reset};
use crate::config::Config;
use crate::{CliError, StartArgs, use_fancy_output, was_interrupted};

/// Asset paths after applying flags, config files and defaults.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct AssetPaths {
    pub firmware: PathBuf,
    pub signature: PathBuf,
}

/// Pick firmware and signature paths. Explicit paths win over the directory.
pub(crate) fn resolve_assets(args: &StartArgs, config: &Config) -> AssetPaths {
    let dir = args
        .firmware_dir
        .clone()
        .or_else(|| config.firmware.dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DIR));

    let firmware = args
        .firmware
        .clone()
        .or_else(|| config.firmware.firmware.clone())
        .unwrap_or_else(|| dir.join(FIRMWARE_FILE));
    let signature = args
        .signature
        .clone()
        .or_else(|| config.firmware.signature.clone())
        .unwrap_or_else(|| dir.join(SIGNATURE_FILE));

    AssetPaths {
        firmware,
        signature,
    }
}

fn resolve_port(args: &StartArgs, config: &Config) -> Result<String> {
    args.port
        .clone()
        .or_else(|| config.port.serial.clone())
        .ok_or_else(|| {
            CliError::Usage(
                "No serial port given; pass <PORT>, set BUILDHAT_PORT or [port] serial in buildhat.toml"
                    .into(),
            )
            .into()
        })
}

fn progress_spinner(quiet: bool) -> ProgressBar {
    if quiet || !use_fancy_output() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    #[allow(clippy::unwrap_used)] // Static template string
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Start command implementation.
pub(crate) fn cmd_start(quiet: bool, config: &Config, args: &StartArgs) -> Result<()> {
    let port_name = resolve_port(args, config)?;

    // Assets first, so a missing file never touches the hardware
    let assets = resolve_assets(args, config);
    if !quiet {
        eprintln!(
            "{} Loading {} and {}",
            style("📦").cyan(),
            assets.firmware.display(),
            assets.signature.display()
        );
    }
    let bundle = FirmwareBundle::from_files(&assets.firmware, &assets.signature)
        .context("Failed to load firmware bundle")?;

    buildhat::host::validate_requested_port(&port_name)
        .with_context(|| format!("Cannot use serial port {port_name}"))?;

    if args.reset || config.flash.reset {
        let reset = resolve_reset_config(&args.gpio, config)?;
        run_reset(quiet, reset)?;
    }

    let timeout = args
        .timeout
        .or(config.flash.timeout_secs)
        .map_or(PROMPT_TIMEOUT, Duration::from_secs);
    debug!("Per-step timeout: {timeout:?}");

    if !quiet {
        eprintln!("{} Using port {}", style("🔌").cyan(), port_name);
    }
    let port = NativePort::open(&SerialConfig::new(&port_name))
        .with_context(|| format!("Failed to open {port_name}"))?;

    let flasher = BuildHatFlasher::new(
        port,
        FlasherConfig::default().with_prompt_timeout(timeout),
    );

    let pb = progress_spinner(quiet);
    let result = flasher.run(&bundle, |state| {
        debug!("Session state: {state:?}");
        pb.set_message(state.to_string());
        if state == FlashState::Failed {
            pb.abandon();
        }
    });

    let report = match result {
        Ok(report) => report,
        Err(e) if e.is_cancelled() || was_interrupted() => {
            return Err(CliError::Cancelled("Interrupted by user".into()).into());
        },
        Err(e) => {
            if e.timeout_step().is_some() && !args.reset {
                warn!("The Build HAT may not be in bootloader mode; try `buildhat start --reset`");
            }
            return Err(e).context("Firmware upload failed");
        },
    };
    pb.finish_and_clear();

    if !quiet {
        eprintln!("{} {}", style("ℹ").blue(), report.version);
        eprintln!(
            "{} Uploaded {} bytes (checksum {}) and {}-byte signature",
            style("✓").green(),
            report.firmware_len,
            report.firmware_checksum,
            report.signature_len
        );
        eprintln!(
            "\n{} Build HAT is rebooting into the new firmware",
            style("🎉").green().bold()
        );
    }

    Ok(())
}
