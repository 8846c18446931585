//! proc-expect: blocking process-interaction harness
//!
//! This crate drives an external command-line program under test: it spawns
//! the child with stdout and stderr merged into one line stream, captures
//! that stream with timestamps on a background thread, lets the controller
//! send input lines, and lets it block on regex expectations over the
//! not-yet-consumed output with a deadline.
//!
//! # Design
//!
//! - **One child per session.** A [`ProcessSession`] owns exactly one child
//!   process, its capture thread, and the shared [`InteractionLog`].
//! - **Polling expectations.** [`ProcessSession::expect`] re-reads the
//!   log's unconsumed tail at a fixed interval until every pattern matches,
//!   the deadline passes, or the stream closes. A timeout is an ordinary
//!   `Ok(false)`, not an error.
//! - **No terminal emulation.** The child talks over plain pipes; there is
//!   no PTY and no ANSI interpretation.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use proc_expect::ProcessSession;
//!
//! fn main() -> proc_expect::Result<()> {
//!     let mut session = ProcessSession::spawn("my-tool", &["--monitor"])?;
//!     assert!(session.expect("ready")?);
//!     session.send("query foo")?;
//!     assert!(session.expect_within(&["^foo = string:bar$"], Duration::from_secs(2), true)?);
//!     session.kill()?;
//!     session.wait()?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod expect;
pub mod log;
pub mod prelude;
pub mod session;
pub mod source;

pub use config::SessionConfig;
pub use error::{HarnessError, Result, SpawnError};
pub use event::{Channel, Event};
pub use expect::{ExpectStep, Expectation, property_equals, property_unknown};
pub use log::InteractionLog;
pub use session::{ProcessSession, SessionBuilder};
pub use source::{PatternSource, StaticSource};
