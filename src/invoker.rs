//! Subprocess invocation of the tool under test.
//!
//! One process per call, awaited to completion before the next call starts.
//! The timeout is enforced by polling `try_wait` and killing the child when
//! it runs over; stdout is drained on a helper thread so a chatty tool can't
//! block on a full pipe while we poll. The same deadline covers waiting for
//! stdout to close after the tool has exited.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{HarnessError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs the tool with an argument vector and returns what it did.
///
/// `ProcessRunner` is the real implementation; tests substitute in-process fakes.
pub trait ToolRunner {
    fn run(&self, args: &[String], timeout: Duration) -> Result<Invocation>;
}

/// Captured result of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Human-readable command line, used in diagnostics.
    pub command: String,
    /// Exit code; `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
}

impl Invocation {
    pub fn new(command: impl Into<String>, code: Option<i32>, stdout: impl Into<Vec<u8>>) -> Self {
        Invocation {
            command: command.into(),
            code,
            stdout: stdout.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn status_text(&self) -> String {
        match self.code {
            Some(code) => format!("exit {}", code),
            None => "terminated by signal".to_string(),
        }
    }

    /// Fail with `ToolFailed` unless the process exited zero.
    pub fn into_success(self) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(HarnessError::ToolFailed {
                status: self.status_text(),
                command: self.command,
            })
        }
    }

    /// The output line without its terminator. Output that does not end in
    /// `\n` is malformed.
    pub fn line(&self) -> Result<&str> {
        if self.stdout.last() != Some(&b'\n') {
            return Err(self.malformed("output is not newline-terminated"));
        }
        std::str::from_utf8(&self.stdout).map_err(|_| self.malformed("output is not valid UTF-8"))
    }

    /// Whitespace-delimited tokens of a well-formed output line; exactly
    /// `expected` of them.
    pub fn tokens(&self, expected: usize) -> Result<Vec<&str>> {
        let tokens: Vec<&str> = self.line()?.split_whitespace().collect();
        if tokens.len() != expected {
            return Err(self.malformed(format!(
                "expected {} tokens, got {}",
                expected,
                tokens.len()
            )));
        }
        Ok(tokens)
    }

    pub fn malformed(&self, reason: impl Into<String>) -> HarnessError {
        HarnessError::MalformedOutput {
            command: self.command.clone(),
            reason: reason.into(),
        }
    }
}

/// Spawns the tool binary as a child process.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
}

impl ProcessRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        ProcessRunner {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn describe(&self, args: &[String]) -> String {
        let mut command = self.program.display().to_string();
        for arg in args {
            command.push(' ');
            command.push_str(arg);
        }
        command
    }
}

impl ToolRunner for ProcessRunner {
    fn run(&self, args: &[String], timeout: Duration) -> Result<Invocation> {
        let command = self.describe(args);
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| HarnessError::Spawn {
                command: command.clone(),
                source,
            })?;

        let stdout_handle = child.stdout.take();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut out) = stdout_handle {
                let _ = out.read_to_end(&mut buf);
            }
            let _ = tx.send(buf);
        });

        // The reader thread is never joined: a grandchild may hold the pipe
        // open long after the tool itself is gone.
        let start = Instant::now();
        loop {
            let polled = match child.try_wait() {
                Ok(polled) => polled,
                Err(err) => {
                    abandon(&mut child);
                    return Err(err.into());
                }
            };
            match polled {
                Some(status) => {
                    let remaining = timeout.saturating_sub(start.elapsed());
                    let stdout = match rx.recv_timeout(remaining) {
                        Ok(buf) => buf,
                        Err(RecvTimeoutError::Disconnected) => Vec::new(),
                        Err(RecvTimeoutError::Timeout) => {
                            debug!(
                                command = %command,
                                ?timeout,
                                "tool exited but stdout stayed open"
                            );
                            return Err(HarnessError::ProcessTimeout { command, timeout });
                        }
                    };
                    debug!(
                        command = %command,
                        code = ?status.code(),
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "tool exited"
                    );
                    return Ok(Invocation::new(command, status.code(), stdout));
                }
                None => {
                    if start.elapsed() > timeout {
                        abandon(&mut child);
                        debug!(command = %command, ?timeout, "tool timed out");
                        return Err(HarnessError::ProcessTimeout { command, timeout });
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
            }
        }
    }
}

/// Kill and reap a child we are giving up on.
fn abandon(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
