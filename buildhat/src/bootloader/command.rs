//! Build HAT bootloader console commands and markers.
//!
//! ## Wire format
//!
//! ```text
//! Command line:    <ascii text> '\r'
//! Binary payload:  0x02 | raw bytes (no escaping) | 0x03
//! Prompt:          "BHBL>"
//! Version banner:  "BuildHAT bootloader version <n> <timestamp>" '\r'
//! ```

use std::fmt;
use std::sync::LazyLock;

use crate::protocol::checksum::checksum;
use crate::protocol::expect::Pattern;

/// Line terminator for every command.
pub const TERMINATOR: u8 = b'\r';

/// Start-of-binary marker preceding a payload.
pub const STX: u8 = 0x02;

/// End-of-binary marker following a payload.
pub const ETX: u8 = 0x03;

/// Ready prompt printed by the bootloader.
pub const PROMPT_MARKER: &str = "BHBL>";

/// Product name opening the version banner.
pub const PRODUCT_NAME: &str = "BuildHAT";

/// Bootloader ready prompt.
pub static PROMPT: LazyLock<Pattern> =
    LazyLock::new(|| Pattern::literal("ready prompt", PROMPT_MARKER));

/// Version banner line, up to the first carriage return.
pub static VERSION_BANNER: LazyLock<Pattern> = LazyLock::new(|| {
    #[allow(clippy::expect_used)] // Static expression
    Pattern::new("version banner", &format!(r"{PRODUCT_NAME}[^\r\n]*\r"))
        .expect("version banner pattern must compile")
});

/// Bootloader console commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Bare line terminator, wakes the console.
    Wake,
    /// Print the bootloader version banner.
    Version,
    /// Clear the image buffer.
    Clear,
    /// Announce a firmware image of `length` bytes.
    Load {
        /// Image size in bytes.
        length: usize,
        /// Image checksum.
        checksum: u32,
    },
    /// Announce a signature of `length` bytes.
    Signature {
        /// Signature size in bytes.
        length: usize,
    },
    /// Start the uploaded firmware.
    Reboot,
}

impl Command {
    /// `load` command for `image`, checksum computed over the same bytes.
    pub fn load(image: &[u8]) -> Self {
        Self::Load {
            length: image.len(),
            checksum: checksum(image),
        }
    }

    /// `signature` command for `signature`.
    pub fn signature(signature: &[u8]) -> Self {
        Self::Signature {
            length: signature.len(),
        }
    }

    /// Build the bytes sent on the wire, terminator included.
    pub fn build(&self) -> Vec<u8> {
        let mut buf = self
            .to_string()
            .into_bytes();
        buf.push(TERMINATOR);
        buf
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wake => Ok(()),
            Self::Version => write!(f, "version"),
            Self::Clear => write!(f, "clear"),
            Self::Load { length, checksum } => write!(f, "load {length} {checksum}"),
            Self::Signature { length } => write!(f, "signature {length}"),
            Self::Reboot => write!(f, "reboot"),
        }
    }
}

/// Bracket `data` with the start and end markers.
pub fn frame_payload(data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(data.len() + 2);
    buf.push(STX);
    buf.extend_from_slice(data);
    buf.push(ETX);
    buf
}
