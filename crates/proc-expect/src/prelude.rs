//! Convenience re-exports for harness users.
//!
//! ```no_run
//! use proc_expect::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let mut session = ProcessSession::spawn("/bin/cat", &[])?;
//!     session.send("ping")?;
//!     assert!(session.expect("^ping$")?);
//!     session.wait()?;
//!     Ok(())
//! }
//! ```

pub use crate::config::SessionConfig;
pub use crate::error::{HarnessError, Result, SpawnError};
pub use crate::event::{Channel, Event};
pub use crate::expect::{Expectation, property_equals, property_unknown};
pub use crate::log::InteractionLog;
pub use crate::session::{ProcessSession, SessionBuilder};
pub use crate::source::{PatternSource, StaticSource};
