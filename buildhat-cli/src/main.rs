//! buildhat CLI - Command-line tool for the Raspberry Pi Build HAT bootloader.
//!
//! ## Features
//!
//! - Reset the Build HAT into its serial bootloader over GPIO
//! - Upload firmware and signature, then reboot into the new image
//! - List serial ports
//! - Shell completion generation
//! - Environment variable and config file support

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use log::debug;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};

mod commands;
mod config;

use config::Config;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: AtomicBool = AtomicBool::new(true);

/// Set by the Ctrl-C handler.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Exit code for generic failures.
pub(crate) const EXIT_FAILURE: u8 = 1;
/// Exit code for usage errors (matches clap).
pub(crate) const EXIT_USAGE: u8 = 2;
/// Exit code for configuration errors.
pub(crate) const EXIT_CONFIG: u8 = 3;
/// Exit code when the port or GPIO hardware is missing.
pub(crate) const EXIT_HARDWARE: u8 = 4;
/// Exit code after Ctrl-C.
pub(crate) const EXIT_CANCELLED: u8 = 130;

/// Check if emoji/animations should be used (TTY and colors enabled).
pub(crate) fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// Whether the user pressed Ctrl-C.
pub(crate) fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

/// Errors raised by the CLI layer itself.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Missing or contradictory arguments.
    #[error("{0}")]
    Usage(String),
    /// Resolved configuration is unusable.
    #[error("{0}")]
    Config(String),
    /// The user aborted the operation.
    #[error("{0}")]
    Cancelled(String),
}

/// buildhat - Bring a Raspberry Pi Build HAT into its bootloader and flash it.
///
/// Environment variables:
///   BUILDHAT_PORT        - Default serial port
///   BUILDHAT_FIRMWARE    - Firmware image path
///   BUILDHAT_SIGNATURE   - Signature path
///   BUILDHAT_RESET_PIN   - RESET line (BCM, default: 4)
///   BUILDHAT_BOOT_PIN    - BOOT line (BCM, default: 22)
#[derive(Parser)]
#[command(name = "buildhat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// BOOT/RESET line options shared by `start --reset` and `reset`.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct GpioArgs {
    /// RESET line (BCM numbering).
    #[arg(long, env = "BUILDHAT_RESET_PIN", value_name = "N")]
    pub reset_pin: Option<u8>,

    /// BOOT line (BCM numbering).
    #[arg(long, env = "BUILDHAT_BOOT_PIN", value_name = "N")]
    pub boot_pin: Option<u8>,

    /// Hold time after each RESET transition.
    #[arg(long, value_name = "MS")]
    pub settle_ms: Option<u64>,
}

/// Options of the `start` command.
#[derive(Args, Debug, Clone)]
pub(crate) struct StartArgs {
    /// Serial port connected to the Build HAT (e.g., /dev/serial0).
    #[arg(env = "BUILDHAT_PORT")]
    pub port: Option<String>,

    /// Firmware image.
    #[arg(long, env = "BUILDHAT_FIRMWARE", value_name = "PATH")]
    pub firmware: Option<PathBuf>,

    /// Firmware signature.
    #[arg(long, env = "BUILDHAT_SIGNATURE", value_name = "PATH")]
    pub signature: Option<PathBuf>,

    /// Directory holding firmware.bin and signature.bin (default: data).
    #[arg(long, value_name = "DIR")]
    pub firmware_dir: Option<PathBuf>,

    /// Pulse BOOT/RESET before talking to the bootloader.
    #[arg(long)]
    pub reset: bool,

    /// Deadline for each bootloader reply, in seconds (default: 10).
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    #[command(flatten)]
    pub gpio: GpioArgs,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Upload firmware and signature to a Build HAT in bootloader mode.
    Start(StartArgs),

    /// Reset the Build HAT into its bootloader.
    Reset(GpioArgs),

    /// List available serial ports.
    ListPorts {
        /// Output port list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type.
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    install_interrupt_handler();

    debug!(
        "buildhat v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", style("Error:").red().bold());
            ExitCode::from(exit_code(&err))
        },
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let log_level = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(verbose >= 2)
        .format_timestamp(if verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();
}

fn install_interrupt_handler() {
    if let Err(e) = ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::Relaxed)) {
        debug!("Could not install Ctrl-C handler: {e}");
    }
    buildhat::set_interrupt_checker(was_interrupted);
}

fn run(cli: &Cli) -> Result<()> {
    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    match &cli.command {
        Commands::Start(args) => commands::start::cmd_start(cli.quiet, &config, args),
        Commands::Reset(args) => commands::reset::cmd_reset(cli.quiet, &config, args),
        Commands::ListPorts { json } => commands::ports::cmd_list_ports(*json),
        Commands::Completions { shell } => {
            commands::completions::cmd_completions(*shell);
            Ok(())
        },
    }
}

/// Map an error to the process exit code.
fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(cli_err) = cause.downcast_ref::<CliError>() {
            return match cli_err {
                CliError::Usage(_) => EXIT_USAGE,
                CliError::Config(_) => EXIT_CONFIG,
                CliError::Cancelled(_) => EXIT_CANCELLED,
            };
        }
        if let Some(lib_err) = cause.downcast_ref::<buildhat::Error>() {
            return library_exit_code(lib_err);
        }
    }

    if was_interrupted() {
        EXIT_CANCELLED
    } else {
        EXIT_FAILURE
    }
}

fn library_exit_code(err: &buildhat::Error) -> u8 {
    if err.is_cancelled() {
        EXIT_CANCELLED
    } else if err.is_port_validation() || matches!(err, buildhat::Error::HardwareUnavailable(_)) {
        EXIT_HARDWARE
    } else if matches!(err, buildhat::Error::Config(_)) {
        EXIT_CONFIG
    } else {
        EXIT_FAILURE
    }
}
