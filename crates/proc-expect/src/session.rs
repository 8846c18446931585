//! Process session: lifecycle of one child under test.
//!
//! [`ProcessSession`] spawns the child with its stdout and stderr merged
//! into a single pipe, starts the capture thread that drains that pipe into
//! the [`InteractionLog`], and provides the controller-side primitives:
//! [`send`], [`expect`], [`suspend`]/[`resume`], [`close`], [`kill`] and
//! [`wait`].
//!
//! Teardown is scoped: dropping the session closes stdin, gives the capture
//! thread a bounded grace period and force-kills the child if its output
//! never closes. There is no process-wide cleanup registry.
//!
//! [`send`]: ProcessSession::send
//! [`expect`]: ProcessSession::expect
//! [`suspend`]: ProcessSession::suspend
//! [`resume`]: ProcessSession::resume
//! [`close`]: ProcessSession::close
//! [`kill`]: ProcessSession::kill
//! [`wait`]: ProcessSession::wait

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rustix::process::{Pid, Signal, kill_process};
use tracing::{debug, trace};

use crate::config::SessionConfig;
use crate::error::{HarnessError, Result, SpawnError};
use crate::event::Channel;
use crate::expect::{ExpectStep, Expectation};
use crate::log::InteractionLog;

/// How long teardown waits for EOF after force-killing the child.
const KILL_GRACE: Duration = Duration::from_millis(500);

/// State shared between the controller thread and the capture thread.
#[derive(Debug)]
struct Shared {
    log: InteractionLog,
    /// True until the capture thread observes EOF on the merged stream.
    /// Only the capture thread clears it.
    running: AtomicBool,
    /// True once the controller deliberately killed the child. Suppresses
    /// the automatic termination report.
    killed: AtomicBool,
    /// Exit code once reaped; signal deaths are stored as the negated
    /// signal number.
    exit: Mutex<Option<i32>>,
}

impl Shared {
    fn set_exit(&self, code: i32) {
        *self.exit.lock().unwrap_or_else(PoisonError::into_inner) = Some(code);
    }

    fn exit(&self) -> Option<i32> {
        *self.exit.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A handle for driving one child process under test.
///
/// # Example
///
/// ```no_run
/// use proc_expect::ProcessSession;
///
/// fn main() -> proc_expect::Result<()> {
///     let mut session = ProcessSession::spawn("/bin/cat", &[])?;
///     session.send("hello")?;
///     assert!(session.expect("^hello$")?);
///     session.wait()?;
///     Ok(())
/// }
/// ```
pub struct ProcessSession {
    shared: Arc<Shared>,
    stdin: Mutex<Option<ChildStdin>>,
    capture: Option<JoinHandle<()>>,
    pid: u32,
    config: SessionConfig,
}

/// Builder for a [`ProcessSession`].
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    program: String,
    args: Vec<String>,
    config: SessionConfig,
}

impl SessionBuilder {
    /// Start building a session for the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            config: SessionConfig::default(),
        }
    }

    /// Add one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Use the given configuration.
    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Shorthand for overriding the default expect deadline.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    /// Spawn the child and start the capture thread.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError`] if the executable cannot be resolved or
    /// started.
    pub fn spawn(self) -> Result<ProcessSession> {
        ProcessSession::spawn_inner(&self.program, &self.args, self.config)
    }
}

impl ProcessSession {
    /// Spawn `program` with `args` using the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError`] if the executable cannot be resolved or
    /// started.
    pub fn spawn(program: &str, args: &[&str]) -> Result<Self> {
        SessionBuilder::new(program).args(args.iter().copied()).spawn()
    }

    /// Start building a session with custom arguments or configuration.
    pub fn builder(program: impl Into<String>) -> SessionBuilder {
        SessionBuilder::new(program)
    }

    fn spawn_inner(program: &str, args: &[String], config: SessionConfig) -> Result<Self> {
        // One pipe carries both stdout and stderr so the log preserves the
        // child's own interleaving.
        let (pipe_read, pipe_write) = rustix::pipe::pipe()
            .map_err(|e| SpawnError::Io(io::Error::from_raw_os_error(e.raw_os_error())))?;
        let stderr_write = pipe_write
            .try_clone()
            .map_err(SpawnError::Io)?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::from(pipe_write))
            .stderr(Stdio::from(stderr_write));

        // SAFETY: the hook runs between fork and exec, so it is limited to
        // async-signal-safe calls (prctl, getrlimit, setrlimit).
        unsafe {
            cmd.pre_exec(|| {
                // Die with the parent instead of lingering as an orphan.
                #[cfg(target_os = "linux")]
                if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL as libc::c_ulong) == -1 {
                    return Err(io::Error::last_os_error());
                }

                // Raise the core-dump limit as far as the hard limit allows,
                // to aid postmortem debugging of crashed children.
                let mut core = libc::rlimit {
                    rlim_cur: 0,
                    rlim_max: 0,
                };
                if libc::getrlimit(libc::RLIMIT_CORE, &raw mut core) == 0 {
                    core.rlim_cur = core.rlim_max;
                    let _ = libc::setrlimit(libc::RLIMIT_CORE, &raw const core);
                }
                Ok(())
            });
        }

        let mut child = cmd.spawn().map_err(|e| SpawnError::from_io(program, e))?;
        let pid = child.id();
        let stdin = child.stdin.take().ok_or_else(|| {
            SpawnError::Io(io::Error::other("child spawned without a stdin pipe"))
        })?;

        debug!(program, pid, "spawned child");

        let shared = Arc::new(Shared {
            log: InteractionLog::new(),
            running: AtomicBool::new(true),
            killed: AtomicBool::new(false),
            exit: Mutex::new(None),
        });

        let reader = BufReader::new(File::from(pipe_read));
        let capture_shared = Arc::clone(&shared);
        let capture = thread::Builder::new()
            .name(format!("capture-{pid}"))
            .spawn(move || capture_loop(reader, child, &capture_shared))
            .map_err(SpawnError::Io)?;

        Ok(Self {
            shared,
            stdin: Mutex::new(Some(stdin)),
            capture: Some(capture),
            pid,
            config,
        })
    }

    /// The child's process ID.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// The session configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The shared interaction log.
    #[must_use]
    pub fn log(&self) -> &InteractionLog {
        &self.shared.log
    }

    /// Whether the child's output stream is still open.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// The child's exit code, if it has been reaped. Signal deaths are
    /// reported as the negated signal number.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        self.shared.exit()
    }

    /// Write one line to the child's standard input, flushing immediately.
    ///
    /// The line is recorded in the log before the write, so a broken pipe
    /// still leaves a trace of what was attempted.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::StdinClosed`] after [`close`](Self::close),
    /// or [`HarnessError::Write`] if the pipe write fails; in the latter
    /// case the full log has already been dumped to stderr.
    pub fn send(&self, text: &str) -> Result<()> {
        self.shared.log.append(Channel::Stdin, text);
        trace!(text, "send");

        // The stdin handle has its own lock; the log lock is never held
        // across the pipe write.
        let mut guard = self.stdin.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(stdin) = guard.as_mut() else {
            return Err(HarnessError::StdinClosed);
        };
        let outcome = writeln!(stdin, "{text}").and_then(|()| stdin.flush());
        drop(guard);

        outcome.map_err(|e| {
            self.shared.log.dump();
            HarnessError::write("writing to child stdin", e)
        })
    }

    /// Stop the child with SIGSTOP.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be delivered.
    pub fn suspend(&self) -> Result<()> {
        self.deliver(libc::SIGSTOP)
    }

    /// Resume the child with SIGCONT.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be delivered.
    pub fn resume(&self) -> Result<()> {
        self.deliver(libc::SIGCONT)
    }

    /// Terminate the child with SIGTERM.
    ///
    /// Marks the kill as deliberate first, so the capture thread does not
    /// report the resulting signal death as unexpected.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be delivered.
    pub fn kill(&self) -> Result<()> {
        self.shared.killed.store(true, Ordering::SeqCst);
        self.deliver(libc::SIGTERM)
    }

    /// Close the child's standard input. Idempotent.
    pub fn close(&self) {
        let mut guard = self.stdin.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.take().is_some() {
            self.shared.log.comment("EOF ON STDIN");
        }
    }

    /// Close stdin, wait for the capture thread to observe EOF and return
    /// the child's exit code (negated signal number for signal deaths).
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Capture`] if the capture thread panicked or
    /// never produced an exit status.
    pub fn wait(&mut self) -> Result<i32> {
        self.close();
        if let Some(handle) = self.capture.take() {
            handle
                .join()
                .map_err(|_| HarnessError::capture("capture thread panicked"))?;
        }
        self.shared
            .exit()
            .ok_or_else(|| HarnessError::capture("exit status was never recorded"))
    }

    /// Dump the full interaction log to stderr.
    pub fn dump_log(&self) {
        self.shared.log.dump();
    }

    /// Expect a single pattern with the configured default deadline and
    /// dump policy.
    ///
    /// # Errors
    ///
    /// Returns an error only if the pattern does not compile; timeouts and
    /// closed streams are `Ok(false)`.
    pub fn expect(&self, pattern: &str) -> Result<bool> {
        self.expect_within(
            &[pattern],
            self.config.default_timeout,
            self.config.dump_on_failure,
        )
    }

    /// Expect several patterns, all of which must match, with the
    /// configured defaults.
    ///
    /// # Errors
    ///
    /// Returns an error only if a pattern does not compile.
    pub fn expect_all(&self, patterns: &[&str]) -> Result<bool> {
        self.expect_within(
            patterns,
            self.config.default_timeout,
            self.config.dump_on_failure,
        )
    }

    /// Expect patterns in the unconsumed output tail within `timeout`.
    ///
    /// Polls the log at the configured interval. On success appends an
    /// `EXPECT OK` comment and returns `Ok(true)`. On timeout appends a
    /// `TIMEOUT` comment listing the unmatched patterns, dumps the log if
    /// `want_dump`, and returns `Ok(false)`; a closed stream behaves the
    /// same minus the comment. Either way the log cursor advances, so the
    /// next expect only sees newer output.
    ///
    /// # Errors
    ///
    /// Returns an error only if a pattern does not compile.
    pub fn expect_within(
        &self,
        patterns: &[&str],
        timeout: Duration,
        want_dump: bool,
    ) -> Result<bool> {
        let mut expectation = Expectation::new(patterns)?;
        let start = Instant::now();
        loop {
            // Stream state first, text second: if EOF lands in between, this
            // iteration still matches against the complete output.
            let stream_open = self.is_running();
            let text = self.shared.log.unconsumed_text();
            match ExpectStep::evaluate(&mut expectation, &text, start.elapsed(), timeout, stream_open)
            {
                ExpectStep::Satisfied => {
                    self.shared.log.comment("EXPECT OK");
                    self.shared.log.advance_cursor();
                    trace!(?patterns, "expect ok");
                    return Ok(true);
                }
                ExpectStep::TimedOut => {
                    let pending = expectation.pending();
                    self.shared.log.comment(format!("TIMEOUT {pending:?}"));
                    self.shared.log.advance_cursor();
                    if want_dump {
                        self.shared.log.dump();
                    }
                    debug!(?pending, ?timeout, "expect timed out");
                    return Ok(false);
                }
                ExpectStep::StreamClosed => {
                    self.shared.log.advance_cursor();
                    if want_dump {
                        self.shared.log.dump();
                    }
                    debug!(pending = ?expectation.pending(), "stream closed before match");
                    return Ok(false);
                }
                ExpectStep::KeepPolling => thread::sleep(self.config.poll_interval),
            }
        }
    }

    fn deliver(&self, raw: i32) -> Result<()> {
        let pid = Pid::from_raw(self.pid as i32)
            .ok_or_else(|| HarnessError::signal(format!("invalid pid {}", self.pid)))?;
        let signal = Signal::from_named_raw(raw)
            .ok_or_else(|| HarnessError::signal(format!("invalid signal {raw}")))?;
        kill_process(pid, signal)
            .map_err(|e| HarnessError::signal(format!("kill({pid:?}, {raw}): {e}")))
    }
}

impl Drop for ProcessSession {
    /// Deterministic teardown: close stdin, wait a bounded grace period for
    /// EOF, force-kill if the child keeps its output open, and detach only
    /// as a last resort (another process may hold the pipe's write end).
    fn drop(&mut self) {
        self.close();
        let Some(handle) = self.capture.take() else {
            return;
        };

        let deadline = Instant::now() + self.config.teardown_grace;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        if !handle.is_finished() {
            self.shared.killed.store(true, Ordering::SeqCst);
            let _ = self.deliver(libc::SIGKILL);
            let deadline = Instant::now() + KILL_GRACE;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
        }
        if handle.is_finished() {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for ProcessSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSession")
            .field("pid", &self.pid)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Background reader draining the child's merged output into the log.
///
/// Runs until EOF, then reaps the child and reports abnormal endings:
/// a signal death that was not a deliberate [`ProcessSession::kill`] gets a
/// `TERMINATED WITH SIGNAL` comment plus an automatic dump, a nonzero exit
/// gets an `EXIT CODE` comment, and a clean exit stays quiet.
fn capture_loop(mut reader: BufReader<File>, mut child: Child, shared: &Shared) {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => {
                shared.log.comment("EOF ON STDOUT");
                break;
            }
            Ok(_) => {
                // Normalize trailing whitespace to a single newline.
                shared.log.append(Channel::Stdout, format!("{}\n", line.trim_end()));
            }
            Err(e) => {
                // Bookkeeping errors stay local; they are diagnostics, not
                // harness failures.
                shared.log.comment(format!("READ ERROR: {e}"));
                break;
            }
        }
    }
    shared.running.store(false, Ordering::SeqCst);
    trace!("capture loop finished");

    let status = match child.wait() {
        Ok(status) => status,
        Err(e) => {
            shared.log.comment(format!("WAIT FAILED: {e}"));
            return;
        }
    };
    let code = exit_code(status);
    shared.set_exit(code);

    let killed = shared.killed.load(Ordering::SeqCst);
    if let Some(signal) = status.signal() {
        if !killed {
            shared.log.comment(format!("TERMINATED WITH SIGNAL {signal}"));
            // Surface the crash even when no expect call is pending.
            shared.log.dump();
        }
    } else if code != 0 && !killed {
        shared.log.comment(format!("EXIT CODE: {code}"));
    }
}

/// Collapse an [`ExitStatus`] to a single code: the exit code for normal
/// exits, the negated signal number for signal deaths.
fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .unwrap_or_else(|| -status.signal().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_for_normal_exit() {
        let status = ExitStatus::from_raw(3 << 8);
        assert_eq!(exit_code(status), 3);
    }

    #[test]
    fn exit_code_for_signal_death() {
        let status = ExitStatus::from_raw(libc::SIGTERM);
        assert_eq!(exit_code(status), -libc::SIGTERM);
    }

    #[test]
    fn builder_collects_args() {
        let builder = SessionBuilder::new("prog")
            .arg("-v")
            .args(["a", "b"])
            .timeout(Duration::from_secs(1));
        assert_eq!(builder.args, vec!["-v", "a", "b"]);
        assert_eq!(builder.config.default_timeout, Duration::from_secs(1));
    }
}
