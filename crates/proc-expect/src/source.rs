//! Pattern-match sources.
//!
//! Tests sometimes want to run expectation patterns against saved text
//! instead of a live subprocess (for example when exercising the regex
//! helpers themselves). [`PatternSource`] is the seam: callers pick either
//! a [`ProcessSession`] or a [`StaticSource`] explicitly, rather than the
//! choice being made by ambient flags.

use std::time::Duration;

use crate::error::Result;
use crate::expect::Expectation;
use crate::session::ProcessSession;

/// Something expectation patterns can be run against.
pub trait PatternSource {
    /// Check that every pattern eventually matches, within `timeout` where
    /// waiting is meaningful.
    ///
    /// # Errors
    ///
    /// Returns an error only if a pattern does not compile.
    fn expect_patterns(
        &mut self,
        patterns: &[&str],
        timeout: Duration,
        want_dump: bool,
    ) -> Result<bool>;
}

impl PatternSource for ProcessSession {
    fn expect_patterns(
        &mut self,
        patterns: &[&str],
        timeout: Duration,
        want_dump: bool,
    ) -> Result<bool> {
        self.expect_within(patterns, timeout, want_dump)
    }
}

/// An in-process source matching against a fixed piece of text.
///
/// There is nothing to wait for, so the timeout is irrelevant: the answer
/// is decided on the first evaluation.
#[derive(Debug, Clone)]
pub struct StaticSource {
    text: String,
}

impl StaticSource {
    /// Create a source over the given text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The text patterns are matched against.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl PatternSource for StaticSource {
    fn expect_patterns(
        &mut self,
        patterns: &[&str],
        _timeout: Duration,
        _want_dump: bool,
    ) -> Result<bool> {
        let mut expectation = Expectation::new(patterns)?;
        Ok(expectation.match_against(&self.text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expect::{property_equals, property_unknown};

    fn check(source: &mut impl PatternSource, patterns: &[&str]) -> bool {
        source
            .expect_patterns(patterns, Duration::from_secs(1), false)
            .unwrap()
    }

    #[test]
    fn static_source_matches_immediately() {
        let mut source = StaticSource::new("a = string:hi\nb = Unknown\n");
        assert!(check(
            &mut source,
            &[&property_equals("a", "string", "hi"), &property_unknown("b")],
        ));
    }

    #[test]
    fn static_source_requires_all_patterns() {
        let mut source = StaticSource::new("only this\n");
        assert!(!check(&mut source, &["only this", "missing"]));
    }

    #[test]
    fn static_source_rejects_bad_pattern() {
        let mut source = StaticSource::new("text");
        assert!(
            source
                .expect_patterns(&["(oops"], Duration::ZERO, false)
                .is_err()
        );
    }
}
