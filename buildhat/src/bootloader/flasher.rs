//! Build HAT bootloader session driver.
//!
//! A session is a fixed, strictly ordered walk through the bootloader
//! console. Every arrow below is "send, then wait for the marker"; nothing
//! is sent before the previous marker has matched.
//!
//! ```text
//! Start --"\r"--> PromptSeen --version--> VersionConfirmed --clear--> Cleared
//!   --(prompt)--> ReadyForFirmware --load+payload--> FirmwareLoaded
//!   --signature+payload--> SignatureLoaded --reboot--> Done
//! ```
//!
//! Any failed wait moves the session to [`FlashState::Failed`]. A failed
//! session cannot be resumed: close it, reset the Build HAT and start over.
//!
//! ## Example
//!
//! ```rust,no_run
//! use buildhat::{BuildHatFlasher, FirmwareBundle, FlasherConfig, NativePort, SerialConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bundle = FirmwareBundle::from_dir("data")?;
//!     let port = NativePort::open(&SerialConfig::new("/dev/serial0"))?;
//!
//!     let flasher = BuildHatFlasher::new(port, FlasherConfig::default());
//!     let report = flasher.run(&bundle, |state| println!("{state}"))?;
//!     println!("{}", report.version);
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::thread;
use std::time::Duration;

use log::{debug, info};

use crate::bootloader::command::{Command, PROMPT, VERSION_BANNER, frame_payload};
use crate::error::{Error, Result, Step};
use crate::image::FirmwareBundle;
use crate::port::Port;
use crate::protocol::checksum::checksum;
use crate::protocol::expect::{CancelHandle, ExpectChannel, Match, Pattern};

/// Deadline for each console marker.
pub const PROMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause between a `load`/`signature` command and its payload, giving the
/// bootloader time to switch into binary receive mode.
pub const PAYLOAD_DELAY: Duration = Duration::from_millis(100);

/// Session timing.
#[derive(Debug, Clone)]
pub struct FlasherConfig {
    /// Deadline for every `expect`.
    pub prompt_timeout: Duration,
    /// Pause before each binary payload.
    pub payload_delay: Duration,
}

impl Default for FlasherConfig {
    fn default() -> Self {
        Self {
            prompt_timeout: PROMPT_TIMEOUT,
            payload_delay: PAYLOAD_DELAY,
        }
    }
}

impl FlasherConfig {
    /// Set the per-step deadline.
    #[must_use]
    pub fn with_prompt_timeout(mut self, timeout: Duration) -> Self {
        self.prompt_timeout = timeout;
        self
    }

    /// Set the pre-payload pause.
    #[must_use]
    pub fn with_payload_delay(mut self, delay: Duration) -> Self {
        self.payload_delay = delay;
        self
    }
}

/// Position of a session in the upload sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlashState {
    /// Nothing sent yet.
    Start,
    /// The console answered the wake-up with its prompt.
    PromptSeen,
    /// The version banner was read.
    VersionConfirmed,
    /// `clear` was sent.
    Cleared,
    /// The prompt after `clear` was seen.
    ReadyForFirmware,
    /// The firmware was uploaded and acknowledged.
    FirmwareLoaded,
    /// The signature was uploaded.
    SignatureLoaded,
    /// `reboot` was sent.
    Done,
    /// A step failed; the session is unusable.
    Failed,
}

impl fmt::Display for FlashState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Start => "Waking bootloader",
            Self::PromptSeen => "Bootloader prompt received",
            Self::VersionConfirmed => "Bootloader version confirmed",
            Self::Cleared => "Clearing image buffer",
            Self::ReadyForFirmware => "Ready for firmware",
            Self::FirmwareLoaded => "Firmware loaded",
            Self::SignatureLoaded => "Signature loaded",
            Self::Done => "Rebooting into new firmware",
            Self::Failed => "Session failed",
        };
        f.write_str(text)
    }
}

/// Outcome of a completed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashReport {
    /// Version banner printed by the bootloader.
    pub version: String,
    /// Firmware size in bytes.
    pub firmware_len: usize,
    /// Checksum sent with the firmware.
    pub firmware_checksum: u32,
    /// Signature size in bytes.
    pub signature_len: usize,
}

/// Build HAT bootloader driver.
///
/// Generic over the port type `P` so the same driver runs on the native
/// UART and on test doubles.
pub struct BuildHatFlasher<P: Port> {
    channel: ExpectChannel<P>,
    config: FlasherConfig,
    state: FlashState,
}

impl<P: Port> BuildHatFlasher<P> {
    /// Create a driver owning an opened port.
    pub fn new(port: P, config: FlasherConfig) -> Self {
        Self {
            channel: ExpectChannel::new(port),
            config,
            state: FlashState::Start,
        }
    }

    /// Current session state.
    pub fn state(&self) -> FlashState {
        self.state
    }

    /// Handle that aborts the session from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.channel
            .cancel_handle()
    }

    /// Get a reference to the underlying port.
    pub fn port(&self) -> &P {
        self.channel
            .port()
    }

    /// Run the whole upload sequence, then close the port whatever the
    /// outcome.
    pub fn run<F>(mut self, bundle: &FirmwareBundle, progress: F) -> Result<FlashReport>
    where
        F: FnMut(FlashState),
    {
        let result = self.flash(bundle.firmware(), bundle.signature(), progress);
        let closed = self.close();
        let report = result?;
        closed?;
        Ok(report)
    }

    /// Upload `firmware` and `signature`, then reboot the Build HAT.
    ///
    /// `progress` is called after every state transition. The session can
    /// only be driven once; the port stays open until [`Self::close`].
    pub fn flash<F>(
        &mut self,
        firmware: &[u8],
        signature: &[u8],
        mut progress: F,
    ) -> Result<FlashReport>
    where
        F: FnMut(FlashState),
    {
        if self.state != FlashState::Start {
            return Err(Error::Protocol(format!(
                "session already used (state: {:?}); reset the Build HAT and open a new session",
                self.state
            )));
        }

        let result = self.run_sequence(firmware, signature, &mut progress);
        if let Err(ref e) = result {
            debug!("Session failed in state {:?}: {e}", self.state);
            self.state = FlashState::Failed;
            progress(FlashState::Failed);
        }
        result
    }

    fn run_sequence(
        &mut self,
        firmware: &[u8],
        signature: &[u8],
        progress: &mut dyn FnMut(FlashState),
    ) -> Result<FlashReport> {
        progress(FlashState::Start);

        // 1. Wake the console
        info!("Waiting for Build HAT bootloader on {}...", self.port().name());
        self.send_command(Command::Wake)?;
        self.wait_for(Step::Handshake, &PROMPT)?;
        self.transition(FlashState::PromptSeen, progress);

        // 2. Version banner
        self.send_command(Command::Version)?;
        let banner = self.wait_for(Step::Version, &VERSION_BANNER)?;
        let version = banner.text();
        info!("{version}");
        self.transition(FlashState::VersionConfirmed, progress);

        // 3. Clear, no reply awaited here
        self.send_command(Command::Clear)?;
        self.transition(FlashState::Cleared, progress);

        // 4. Prompt confirming the clear. A prompt still buffered from the
        // version reply matches here too; see
        // test_prompt_after_banner_satisfies_clear_wait.
        self.wait_for(Step::Clear, &PROMPT)?;
        self.transition(FlashState::ReadyForFirmware, progress);

        // 5. Firmware
        let firmware_checksum = checksum(firmware);
        info!(
            "Loading firmware ({} bytes, checksum {firmware_checksum})",
            firmware.len()
        );
        self.send_command(Command::Load {
            length: firmware.len(),
            checksum: firmware_checksum,
        })?;
        self.send_payload(firmware)?;
        self.wait_for(Step::LoadAck, &PROMPT)?;
        self.transition(FlashState::FirmwareLoaded, progress);

        // 6. Signature, no prompt awaited afterwards
        info!("Loading signature ({} bytes)", signature.len());
        self.send_command(Command::signature(signature))?;
        self.send_payload(signature)?;
        self.transition(FlashState::SignatureLoaded, progress);

        // 7. Reboot
        self.send_command(Command::Reboot)?;
        self.transition(FlashState::Done, progress);
        info!("Reboot requested");

        Ok(FlashReport {
            version,
            firmware_len: firmware.len(),
            firmware_checksum,
            signature_len: signature.len(),
        })
    }

    fn transition(&mut self, next: FlashState, progress: &mut dyn FnMut(FlashState)) {
        debug!("{:?} -> {:?}", self.state, next);
        self.state = next;
        progress(next);
    }

    fn send_command(&mut self, command: Command) -> Result<()> {
        debug!("Sending command {command:?}");
        self.channel
            .send(&command.build())
    }

    fn send_payload(&mut self, data: &[u8]) -> Result<()> {
        thread::sleep(self.config.payload_delay);
        debug!("Sending {} byte payload", data.len());
        self.channel
            .send(&frame_payload(data))
    }

    fn wait_for(&mut self, step: Step, pattern: &Pattern) -> Result<Match> {
        self.channel
            .expect(&[pattern], self.config.prompt_timeout)
            .map_err(|e| e.at_step(step))
    }

    /// Close the session and release the port.
    pub fn close(&mut self) -> Result<()> {
        self.channel
            .close()
    }
}
