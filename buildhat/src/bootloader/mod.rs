//! Build HAT serial bootloader support.

pub mod command;
pub mod flasher;

pub use command::{Command, PROMPT, VERSION_BANNER};
pub use flasher::{BuildHatFlasher, FlashReport, FlashState, FlasherConfig};
