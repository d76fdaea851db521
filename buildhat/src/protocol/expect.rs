//! Pattern-matched request/response over an unframed serial stream.
//!
//! The Build HAT bootloader console has no message framing: replies are
//! plain text ending in a `BHBL>` prompt. [`ExpectChannel`] turns that into
//! synchronous steps by accumulating incoming bytes in a [`MatchBuffer`] and
//! testing every active [`Pattern`] after each chunk.
//!
//! ## Buffer rules
//!
//! - Bytes up to and including a match are handed back to the caller and
//!   dropped from the buffer.
//! - Bytes after the match stay buffered, so a marker that arrives in the
//!   same chunk as the previous one is still seen by the next `expect`.
//!   A console that prints its prompt right after the version banner
//!   therefore satisfies the prompt wait after `clear` on its own (see
//!   `test_prompt_after_banner_satisfies_clear_wait` in the session driver).

use std::fmt;
use std::io::ErrorKind;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, trace};
use regex::bytes::Regex;

use crate::error::{Error, Result};
use crate::port::Port;

/// Size of one read from the port.
const READ_CHUNK: usize = 256;

/// Back-off when a port reports zero bytes without blocking.
const IDLE_BACKOFF: Duration = Duration::from_millis(5);

/// A named, compiled rule recognising one console marker.
#[derive(Clone)]
pub struct Pattern {
    name: &'static str,
    regex: Regex,
}

impl Pattern {
    /// Compile a regular expression pattern.
    pub fn new(name: &'static str, expr: &str) -> Result<Self> {
        let regex = Regex::new(expr)
            .map_err(|e| Error::Config(format!("invalid pattern {name}: {e}")))?;
        Ok(Self { name, regex })
    }

    /// Pattern matching `text` literally.
    #[allow(clippy::missing_panics_doc)]
    pub fn literal(name: &'static str, text: &str) -> Self {
        #[allow(clippy::expect_used)] // An escaped literal is always a valid regex
        let regex = Regex::new(&regex::escape(text)).expect("escaped literal must compile");
        Self { name, regex }
    }

    /// Human-readable pattern name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Source expression.
    pub fn as_str(&self) -> &str {
        self.regex
            .as_str()
    }

    /// Whether `haystack` contains a match.
    pub fn is_match(&self, haystack: &[u8]) -> bool {
        self.regex
            .is_match(haystack)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("name", &self.name)
            .field("expr", &self.as_str())
            .finish()
    }
}

/// Result of a successful `expect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Index into the pattern list that matched.
    pub index: usize,
    /// Name of the matched pattern.
    pub pattern: &'static str,
    /// The matched bytes.
    pub matched: Vec<u8>,
    /// Everything consumed from the stream, up to and including the match.
    pub consumed: Vec<u8>,
}

impl Match {
    /// Matched bytes as text, with trailing line terminators removed.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.matched)
            .trim_end_matches(['\r', '\n'])
            .to_string()
    }
}

/// Growing receive buffer tested against a set of patterns.
#[derive(Debug, Default)]
pub struct MatchBuffer {
    buf: Vec<u8>,
}

impl MatchBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly received bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf
            .extend_from_slice(bytes);
    }

    /// Bytes currently buffered.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Drop everything buffered.
    pub fn clear(&mut self) {
        self.buf
            .clear();
    }

    /// Look for the earliest-ending match among `patterns`.
    ///
    /// Ties go to the pattern listed first. On success the buffer is drained
    /// through the end of the match; trailing bytes are kept.
    pub fn take_match(&mut self, patterns: &[&Pattern]) -> Option<Match> {
        let (index, start, end) = patterns
            .iter()
            .enumerate()
            .filter_map(|(i, p)| {
                p.regex
                    .find(&self.buf)
                    .map(|m| (i, m.start(), m.end()))
            })
            .min_by_key(|&(i, _, end)| (end, i))?;

        let consumed: Vec<u8> = self
            .buf
            .drain(..end)
            .collect();
        Some(Match {
            index,
            pattern: patterns[index].name,
            matched: consumed[start..].to_vec(),
            consumed,
        })
    }
}

/// Cloneable handle that aborts a pending or future `expect`.
///
/// Once cancelled, the owning channel closes its port and every blocked or
/// subsequent operation fails with an `Interrupted` I/O error.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Request cancellation.
    pub fn cancel(&self) {
        self.0
            .store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0
            .load(Ordering::SeqCst)
    }
}

/// Send/expect channel owning one port for the length of a session.
///
/// The port is closed when the channel is closed explicitly, cancelled, or
/// dropped.
pub struct ExpectChannel<P: Port> {
    port: P,
    buffer: MatchBuffer,
    cancel: CancelHandle,
    closed: bool,
}

impl<P: Port> ExpectChannel<P> {
    /// Wrap an opened port.
    pub fn new(port: P) -> Self {
        Self {
            port,
            buffer: MatchBuffer::new(),
            cancel: CancelHandle::default(),
            closed: false,
        }
    }

    /// Handle that can cancel this channel from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel
            .clone()
    }

    /// Get a reference to the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Whether the channel has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn check_cancelled(&mut self) -> Result<()> {
        if self
            .cancel
            .is_cancelled()
            || crate::is_interrupted_requested()
        {
            debug!("Cancellation requested, closing {}", self.port.name());
            self.close()?;
            return Err(Error::cancelled());
        }
        Ok(())
    }

    /// Write raw bytes to the port.
    pub fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_cancelled()?;
        trace!("TX {:?}", String::from_utf8_lossy(bytes));
        self.port
            .write_all_bytes(bytes)
    }

    /// Block until one of `patterns` matches or `timeout` elapses.
    ///
    /// Bytes left over from the previous call are tested before anything new
    /// is read. A timeout is never reported before `timeout` has passed.
    pub fn expect(&mut self, patterns: &[&Pattern], timeout: Duration) -> Result<Match> {
        let start = Instant::now();
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if let Some(found) = self
                .buffer
                .take_match(patterns)
            {
                debug!(
                    "Matched {} after {:?}",
                    found.pattern,
                    start.elapsed()
                );
                return Ok(found);
            }

            self.check_cancelled()?;

            let waited = start.elapsed();
            if waited >= timeout {
                trace!(
                    "Unmatched input: {:?}",
                    String::from_utf8_lossy(self.buffer.pending())
                );
                return Err(Error::ExpectTimeout {
                    pattern: describe(patterns),
                    waited,
                });
            }

            match self
                .port
                .read(&mut chunk)
            {
                Ok(0) => thread::sleep(IDLE_BACKOFF),
                Ok(n) => {
                    trace!("RX {:?}", String::from_utf8_lossy(&chunk[..n]));
                    self.buffer
                        .push(&chunk[..n]);
                },
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {},
                Err(e) if e.kind() == ErrorKind::Interrupted => {},
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    /// Close the port. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.buffer
            .clear();
        self.port
            .close()
    }
}

impl<P: Port> Drop for ExpectChannel<P> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn describe(patterns: &[&Pattern]) -> String {
    patterns
        .iter()
        .map(|p| p.name)
        .collect::<Vec<_>>()
        .join(" | ")
}
