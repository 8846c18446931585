//! Expectation matching over accumulated output.
//!
//! An [`Expectation`] is a set of regular expressions that must all
//! eventually be found in the unconsumed output tail. Patterns are compiled
//! in multiline mode, so `^` and `$` anchor to line boundaries within the
//! accumulated text while `.` still refuses to cross lines.
//!
//! The polling decision itself is the pure function [`ExpectStep::evaluate`],
//! a deterministic function of (text, pending patterns, elapsed time, stream
//! state). The session's expect loop is a thin driver around it, which keeps
//! the tricky part unit-testable without a real subprocess.

use std::time::Duration;

use regex::{Regex, RegexBuilder};

use crate::error::Result;

/// One compiled pattern together with its source text, kept for reporting.
#[derive(Debug, Clone)]
struct CompiledPattern {
    source: String,
    regex: Regex,
}

/// A set of patterns that must all match before a deadline.
#[derive(Debug, Clone)]
pub struct Expectation {
    pending: Vec<CompiledPattern>,
}

impl Expectation {
    /// Compile a set of patterns.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Pattern`](crate::HarnessError::Pattern) if any
    /// pattern is not a valid regular expression.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pending = patterns
            .into_iter()
            .map(|p| {
                let source = p.as_ref().to_string();
                let regex = RegexBuilder::new(&source).multi_line(true).build()?;
                Ok(CompiledPattern { source, regex })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { pending })
    }

    /// Compile a single pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is not a valid regular expression.
    pub fn single(pattern: &str) -> Result<Self> {
        Self::new([pattern])
    }

    /// Search `text` for every still-pending pattern, dropping the ones that
    /// match. Patterns match independently; order of satisfaction does not
    /// matter.
    ///
    /// Returns `true` once no patterns remain.
    pub fn match_against(&mut self, text: &str) -> bool {
        self.pending.retain(|p| p.regex.find(text).is_none());
        self.pending.is_empty()
    }

    /// Check whether every pattern has matched.
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        self.pending.is_empty()
    }

    /// Source text of the patterns that have not matched yet.
    #[must_use]
    pub fn pending(&self) -> Vec<&str> {
        self.pending.iter().map(|p| p.source.as_str()).collect()
    }
}

/// The outcome of one expect polling iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectStep {
    /// Every pattern has matched.
    Satisfied,

    /// The deadline passed with patterns still pending.
    TimedOut,

    /// The output stream closed with patterns still pending.
    StreamClosed,

    /// Nothing decided yet; sleep one interval and poll again.
    KeepPolling,
}

impl ExpectStep {
    /// Decide what one polling iteration should do.
    ///
    /// Checks run in this order: match, deadline, stream state. The caller
    /// must snapshot the stream state *before* the text, so that the final
    /// iteration after EOF still sees the complete output.
    pub fn evaluate(
        expectation: &mut Expectation,
        text: &str,
        elapsed: Duration,
        timeout: Duration,
        stream_open: bool,
    ) -> Self {
        if expectation.match_against(text) {
            Self::Satisfied
        } else if elapsed > timeout {
            Self::TimedOut
        } else if !stream_open {
            Self::StreamClosed
        } else {
            Self::KeepPolling
        }
    }
}

/// Build a pattern expecting `name = type:value` on a line of its own.
///
/// A reusable helper for tools that report named properties as
/// `name = type:value` lines.
#[must_use]
pub fn property_equals(name: &str, type_name: &str, value: &str) -> String {
    format!("^{name} = {type_name}:{value}$")
}

/// Build a pattern expecting the named property to be unset.
#[must_use]
pub fn property_unknown(name: &str) -> String {
    format!("^{name} = Unknown$")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(Expectation::single("(unclosed").is_err());
    }

    #[test]
    fn search_not_full_match() {
        let mut exp = Expectation::single("midd").unwrap();
        assert!(exp.match_against("start middle end"));
    }

    #[test]
    fn anchors_bind_to_line_boundaries() {
        let mut exp = Expectation::single("^pong$").unwrap();
        assert!(!exp.match_against("pingpong\n"));
        assert!(exp.match_against("ping\npong\ndone\n"));
    }

    #[test]
    fn dot_does_not_cross_lines() {
        let mut exp = Expectation::single("a.b").unwrap();
        assert!(!exp.match_against("a\nb"));
    }

    #[test]
    fn all_patterns_must_match_in_any_order() {
        let mut exp = Expectation::new(["alpha", "beta"]).unwrap();
        assert!(!exp.match_against("beta only"));
        assert_eq!(exp.pending(), vec!["alpha"]);
        assert!(exp.match_against("beta then alpha"));
        assert!(exp.is_satisfied());
    }

    #[test]
    fn matched_patterns_stay_matched() {
        // A pattern satisfied by an earlier snapshot does not come back even
        // if later text no longer contains it.
        let mut exp = Expectation::new(["one", "two"]).unwrap();
        assert!(!exp.match_against("one"));
        assert!(exp.match_against("two"));
    }

    #[test]
    fn evaluate_prefers_match_over_timeout() {
        let mut exp = Expectation::single("ready").unwrap();
        let step = ExpectStep::evaluate(
            &mut exp,
            "ready\n",
            Duration::from_secs(10),
            Duration::from_secs(1),
            true,
        );
        assert_eq!(step, ExpectStep::Satisfied);
    }

    #[test]
    fn evaluate_times_out_after_deadline() {
        let mut exp = Expectation::single("never").unwrap();
        let step = ExpectStep::evaluate(
            &mut exp,
            "",
            Duration::from_millis(1001),
            Duration::from_secs(1),
            true,
        );
        assert_eq!(step, ExpectStep::TimedOut);
    }

    #[test]
    fn evaluate_reports_closed_stream() {
        let mut exp = Expectation::single("never").unwrap();
        let step = ExpectStep::evaluate(
            &mut exp,
            "partial output\n",
            Duration::from_millis(10),
            Duration::from_secs(1),
            false,
        );
        assert_eq!(step, ExpectStep::StreamClosed);
    }

    #[test]
    fn evaluate_polls_while_open_and_in_time() {
        let mut exp = Expectation::single("never").unwrap();
        let step = ExpectStep::evaluate(
            &mut exp,
            "",
            Duration::from_millis(10),
            Duration::from_secs(1),
            true,
        );
        assert_eq!(step, ExpectStep::KeepPolling);
    }

    #[test]
    fn property_patterns() {
        assert_eq!(
            property_equals("Media.NowPlaying", "string", "song"),
            "^Media.NowPlaying = string:song$"
        );
        assert_eq!(property_unknown("Battery.Level"), "^Battery.Level = Unknown$");

        let mut exp = Expectation::single(&property_equals("x", "int", "42")).unwrap();
        assert!(exp.match_against("noise\nx = int:42\nmore\n"));
    }
}
