//! Line-protocol helper child for the integration tests.
//!
//! Prints `ready` on startup, then answers commands read from stdin:
//!
//! - `ping` — print `pong`
//! - `stderr <msg>` — print `<msg>` on stderr
//! - `quit <code>` — exit with the given code
//! - `abort` — die via SIGABRT
//! - anything else — echo the line back
//!
//! Output is flushed after every line; pipes are block-buffered otherwise.

use std::io::{self, BufRead, Write};
use std::process::exit;

fn main() {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    writeln!(out, "ready").and_then(|()| out.flush()).ok();

    for line in io::stdin().lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim_end();

        let outcome = if line == "ping" {
            writeln!(out, "pong")
        } else if let Some(msg) = line.strip_prefix("stderr ") {
            eprintln!("{msg}");
            io::stderr().flush()
        } else if let Some(code) = line.strip_prefix("quit ") {
            exit(code.parse().unwrap_or(0));
        } else if line == "abort" {
            out.flush().ok();
            std::process::abort();
        } else {
            writeln!(out, "{line}")
        };

        if outcome.and_then(|()| out.flush()).is_err() {
            break;
        }
    }
}
