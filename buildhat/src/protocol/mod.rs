//! Protocol building blocks.

pub mod checksum;
pub mod expect;

// Re-export common types
pub use checksum::checksum;
pub use expect::{CancelHandle, ExpectChannel, Match, MatchBuffer, Pattern};
