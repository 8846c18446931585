//! Error types for proc-expect.
//!
//! Only spawn and write failures propagate as hard errors to the caller.
//! Expectation timeouts and closed streams are ordinary `Ok(false)` results,
//! since "did not happen in time" is an expected outcome for negative-path
//! tests.

use std::io;

use thiserror::Error;

/// The main error type for harness operations.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Failed to spawn the child process.
    #[error("failed to spawn process: {0}")]
    Spawn(#[from] SpawnError),

    /// Writing to the child's standard input failed.
    ///
    /// The interaction log has already been dumped to stderr when this is
    /// returned; a broken pipe is never silently swallowed.
    #[error("{context}: {source}")]
    Write {
        /// What was being written.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The child's standard input was already closed by [`close`].
    ///
    /// [`close`]: crate::session::ProcessSession::close
    #[error("child stdin is closed")]
    StdinClosed,

    /// An expectation pattern failed to compile.
    #[error("invalid expect pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Delivering a signal to the child failed.
    #[error("signal delivery failed: {message}")]
    Signal {
        /// Description of the failure.
        message: String,
    },

    /// The capture thread ended abnormally.
    #[error("capture thread failed: {message}")]
    Capture {
        /// Description of the failure.
        message: String,
    },
}

/// Errors related to process spawning.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The executable could not be resolved.
    #[error("command not found: {command}")]
    CommandNotFound {
        /// The command that was not found.
        command: String,
    },

    /// The executable exists but may not be executed.
    #[error("permission denied: {command}")]
    PermissionDenied {
        /// The command that could not be executed.
        command: String,
    },

    /// Any other I/O error during spawn (pipe creation, fork, exec).
    #[error("I/O error during spawn: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

impl HarnessError {
    /// Create a write error with context.
    pub fn write(context: impl Into<String>, source: io::Error) -> Self {
        Self::Write {
            context: context.into(),
            source,
        }
    }

    /// Create a signal delivery error.
    pub fn signal(message: impl Into<String>) -> Self {
        Self::Signal {
            message: message.into(),
        }
    }

    /// Create a capture thread error.
    pub fn capture(message: impl Into<String>) -> Self {
        Self::Capture {
            message: message.into(),
        }
    }

    /// Check if this is a spawn error.
    #[must_use]
    pub const fn is_spawn(&self) -> bool {
        matches!(self, Self::Spawn(_))
    }
}

impl SpawnError {
    /// Classify an I/O error from `Command::spawn` for the given command.
    pub fn from_io(command: impl Into<String>, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::CommandNotFound {
                command: command.into(),
            },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                command: command.into(),
            },
            _ => Self::Io(source),
        }
    }
}
