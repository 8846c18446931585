//! Session configuration.
//!
//! The polling interval and deadlines are explicit values here rather than
//! constants buried in the expect loop. Every knob can also be overridden
//! through `PROC_EXPECT_*` environment variables, which is handy when a CI
//! box needs longer timeouts than a developer laptop.

use std::time::Duration;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "PROC_EXPECT";

/// Tunables for a [`ProcessSession`](crate::session::ProcessSession).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Default deadline for `expect` when the caller does not give one.
    pub default_timeout: Duration,

    /// Sleep between expect polling iterations. A latency/CPU tradeoff, not
    /// a correctness requirement.
    pub poll_interval: Duration,

    /// Whether a failed expectation dumps the interaction log by default.
    pub dump_on_failure: bool,

    /// How long teardown waits for the capture thread before force-killing
    /// the child.
    pub teardown_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
            dump_on_failure: true,
            teardown_grace: Duration::from_secs(3),
        }
    }
}

impl SessionConfig {
    /// Create the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default expect deadline.
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Set the expect polling interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set whether failed expectations dump the log by default.
    #[must_use]
    pub const fn with_dump_on_failure(mut self, dump: bool) -> Self {
        self.dump_on_failure = dump;
        self
    }

    /// Set the teardown grace period.
    #[must_use]
    pub const fn with_teardown_grace(mut self, grace: Duration) -> Self {
        self.teardown_grace = grace;
        self
    }

    /// Default configuration with `PROC_EXPECT_*` environment overrides:
    /// `TIMEOUT_MS`, `POLL_INTERVAL_MS`, `DUMP_ON_FAILURE`,
    /// `TEARDOWN_GRACE_MS`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().overridden_by(|name| std::env::var(format!("{ENV_PREFIX}_{name}")).ok())
    }

    /// Apply overrides from a lookup function (environment-shaped, but
    /// injectable for tests).
    #[must_use]
    pub fn overridden_by(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(ms) = parse(&lookup, "TIMEOUT_MS") {
            self.default_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse(&lookup, "POLL_INTERVAL_MS") {
            self.poll_interval = Duration::from_millis(ms);
        }
        if let Some(v) = lookup("DUMP_ON_FAILURE") {
            self.dump_on_failure = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(ms) = parse(&lookup, "TEARDOWN_GRACE_MS") {
            self.teardown_grace = Duration::from_millis(ms);
        }
        self
    }
}

fn parse(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<u64> {
    lookup(name).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.default_timeout, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert!(config.dump_on_failure);
        assert_eq!(config.teardown_grace, Duration::from_secs(3));
    }

    #[test]
    fn builder_setters() {
        let config = SessionConfig::new()
            .with_default_timeout(Duration::from_secs(1))
            .with_poll_interval(Duration::from_millis(10))
            .with_dump_on_failure(false);
        assert_eq!(config.default_timeout, Duration::from_secs(1));
        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert!(!config.dump_on_failure);
    }

    #[test]
    fn env_overrides() {
        let config = SessionConfig::default().overridden_by(|name| match name {
            "TIMEOUT_MS" => Some("250".to_string()),
            "DUMP_ON_FAILURE" => Some("no".to_string()),
            _ => None,
        });
        assert_eq!(config.default_timeout, Duration::from_millis(250));
        assert!(!config.dump_on_failure);
        // Untouched knobs keep their defaults.
        assert_eq!(config.poll_interval, Duration::from_millis(100));
    }

    #[test]
    fn env_overrides_ignore_garbage() {
        let config = SessionConfig::default()
            .overridden_by(|name| (name == "POLL_INTERVAL_MS").then(|| "soon".to_string()));
        assert_eq!(config.poll_interval, Duration::from_millis(100));
    }
}
