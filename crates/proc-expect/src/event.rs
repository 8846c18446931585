//! Events recorded in the interaction log.
//!
//! Every line exchanged with the child process, plus internal annotations,
//! becomes one immutable [`Event`] tagged with the channel it travelled on
//! and the wall-clock time it was observed.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// The channel an event was recorded on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Text written to the child's standard input.
    Stdin,

    /// A line read from the child's merged standard output/error stream.
    Stdout,

    /// An internal annotation (EOF notices, expect outcomes, exit reports).
    Comment,
}

impl Channel {
    /// The three-character marker used when rendering a dump line.
    #[must_use]
    pub const fn marker(self) -> &'static str {
        match self {
            Self::Comment => "###",
            Self::Stdin => "<--",
            Self::Stdout => "-->",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// A single timestamped entry in the interaction log.
///
/// Events are created by exactly one writer (the capture thread for
/// [`Channel::Stdout`], the controller for [`Channel::Stdin`], either for
/// [`Channel::Comment`]) and never mutated after being appended.
#[derive(Debug, Clone)]
pub struct Event {
    /// When the event was recorded.
    pub timestamp: SystemTime,

    /// Which channel the event belongs to.
    pub channel: Channel,

    /// The recorded text. Stdout lines carry a trailing newline.
    pub text: String,
}

impl Event {
    /// Create an event stamped with the current time.
    pub fn now(channel: Channel, text: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            channel,
            text: text.into(),
        }
    }

    /// Render the event as one dump line: `HH:MM:SS.mmm <marker> <text>`.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "{} {} {}",
            format_timestamp(self.timestamp),
            self.channel.marker(),
            self.text.trim_end_matches(['\r', '\n'])
        )
    }
}

/// Format a wall-clock instant as `HH:MM:SS.mmm` (UTC).
fn format_timestamp(ts: SystemTime) -> String {
    let since = ts.duration_since(UNIX_EPOCH).unwrap_or_default();
    let secs = since.as_secs();
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        (secs / 3600) % 24,
        (secs / 60) % 60,
        secs % 60,
        since.subsec_millis()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn channel_markers() {
        assert_eq!(Channel::Comment.marker(), "###");
        assert_eq!(Channel::Stdin.marker(), "<--");
        assert_eq!(Channel::Stdout.marker(), "-->");
    }

    #[test]
    fn render_strips_trailing_newline() {
        let event = Event::now(Channel::Stdout, "hello\n");
        let line = event.render();
        assert!(line.ends_with("--> hello"));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn render_keeps_interior_whitespace() {
        let event = Event::now(Channel::Stdin, "a  b");
        assert!(event.render().ends_with("<-- a  b"));
    }

    #[test]
    fn timestamp_format_shape() {
        let ts = UNIX_EPOCH + Duration::from_millis(3_723_456); // 01:02:03.456 UTC
        assert_eq!(format_timestamp(ts), "01:02:03.456");
    }

    #[test]
    fn timestamp_wraps_at_midnight() {
        let ts = UNIX_EPOCH + Duration::from_secs(86_400 + 61);
        assert_eq!(format_timestamp(ts), "00:01:01.000");
    }
}
