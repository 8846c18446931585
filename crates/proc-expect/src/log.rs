//! The shared interaction log.
//!
//! [`InteractionLog`] is the only mutable state shared between the controller
//! thread and the capture thread. It is an append-only sequence of
//! [`Event`]s guarded by a single mutex, plus a cursor recording how much of
//! the output has been claimed by completed expectation checks.
//!
//! Invariants enforced here rather than by convention:
//!
//! - events are strictly append-ordered and indices are stable (no
//!   compaction),
//! - the cursor only moves forward, and only via [`advance_cursor`],
//!   never as a side effect of [`append`].
//!
//! [`append`]: InteractionLog::append
//! [`advance_cursor`]: InteractionLog::advance_cursor

use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::event::{Channel, Event};

/// Width of the separator lines bracketing a dump.
const SEPARATOR_WIDTH: usize = 72;

#[derive(Debug, Default)]
struct LogInner {
    events: Vec<Event>,
    /// Index of the first event not yet claimed by an expect call.
    last_expect: usize,
}

/// A thread-safe, time-ordered log of everything sent and received.
#[derive(Debug, Default)]
pub struct InteractionLog {
    inner: Mutex<LogInner>,
}

impl InteractionLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // The log stays usable even if a peer thread panicked while holding the
    // lock: appends are single writes of immutable records, so the inner
    // state cannot be observed half-updated.
    fn lock(&self) -> MutexGuard<'_, LogInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an event on the given channel.
    pub fn append(&self, channel: Channel, text: impl Into<String>) {
        self.lock().events.push(Event::now(channel, text));
    }

    /// Append a comment annotation.
    pub fn comment(&self, text: impl Into<String>) {
        self.append(Channel::Comment, text);
    }

    /// Number of events recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    /// Check whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().events.is_empty()
    }

    /// The current cursor position.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.lock().last_expect
    }

    /// Concatenate the text of every stdout event at or past the cursor.
    ///
    /// This is the substrate expectation patterns are matched against.
    #[must_use]
    pub fn unconsumed_text(&self) -> String {
        let inner = self.lock();
        inner.events[inner.last_expect..]
            .iter()
            .filter(|e| e.channel == Channel::Stdout)
            .map(|e| e.text.as_str())
            .collect()
    }

    /// Claim everything recorded so far, moving the cursor to the end.
    ///
    /// Called only by a finishing expect check, so that successive checks
    /// see strictly growing, non-overlapping windows of new output.
    pub fn advance_cursor(&self) {
        let mut inner = self.lock();
        inner.last_expect = inner.events.len();
    }

    /// Snapshot the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    /// Render the full log, one line per event, bracketed by separators.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `out` fails.
    pub fn write_dump<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let events = self.events();
        writeln!(out)?;
        writeln!(out, "{}", "-".repeat(SEPARATOR_WIDTH))?;
        for event in &events {
            writeln!(out, "{}", event.render())?;
        }
        writeln!(out, "{}", "-".repeat(SEPARATOR_WIDTH))?;
        out.flush()
    }

    /// Dump the log to the diagnostic stream (stderr).
    pub fn dump(&self) {
        let mut stderr = io::stderr().lock();
        // Diagnostics are best effort; a full stderr must not take the
        // harness down with it.
        let _ = self.write_dump(&mut stderr);
    }
}
