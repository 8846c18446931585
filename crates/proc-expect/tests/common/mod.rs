//! Shared helpers for the integration tests.

use proc_expect::ProcessSession;

/// Path to the `test-child` helper binary built alongside the crate.
pub const TEST_CHILD: &str = env!("CARGO_BIN_EXE_test-child");

/// Opt-in tracing output: `RUST_LOG=proc_expect=trace cargo test`.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Spawn the helper child with default configuration.
pub fn spawn_child() -> ProcessSession {
    init();
    ProcessSession::spawn(TEST_CHILD, &[]).expect("failed to spawn test-child")
}
