//! Fixed boundary and malformed-input checks run before any randomized trial.
//!
//! Each check is an argument vector plus whether the tool must succeed or
//! fail on it. A timeout counts as failure; a tool that cannot be launched
//! aborts the run. A generate call that must succeed also has to print a
//! well-formed `p q n e d` line.

use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::error::{HarnessError, Result};
use crate::invoker::ToolRunner;
use crate::invoker::Invocation;
use crate::oracle::{self, Mode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    Success,
    Failure,
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Success => write!(f, "success"),
            Expectation::Failure => write!(f, "failure"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeCheck {
    pub args: Vec<String>,
    pub expect: Expectation,
}

impl SmokeCheck {
    fn new(args: Vec<String>, expect: Expectation) -> Self {
        SmokeCheck { args, expect }
    }

    fn fails(mode: Mode, rest: &[&str]) -> Self {
        SmokeCheck::new(mode.args(rest), Expectation::Failure)
    }

    fn succeeds(mode: Mode, rest: &[&str]) -> Self {
        SmokeCheck::new(mode.args(rest), Expectation::Success)
    }

    fn generates(&self) -> bool {
        self.args.first().map(String::as_str) == Some(Mode::Generate.flag())
    }

    /// Whether `inv` counts as the tool succeeding, and what was observed.
    fn judge(&self, inv: &Invocation) -> (bool, String) {
        if !inv.success() {
            return (false, inv.status_text());
        }
        if self.expect == Expectation::Success && self.generates() {
            match oracle::parse_keypair(inv) {
                Ok(_) => {}
                Err(HarnessError::MalformedOutput { reason, .. }) => return (false, reason),
                Err(err) => return (false, err.to_string()),
            }
        }
        (true, inv.status_text())
    }

    pub fn describe(&self) -> String {
        if self.args.is_empty() {
            "<no arguments>".to_string()
        } else {
            self.args.join(" ")
        }
    }
}

/// The battery every run starts with.
pub fn default_battery() -> Vec<SmokeCheck> {
    let mut checks = vec![SmokeCheck::new(Vec::new(), Expectation::Failure)];
    for bits in ["-1", "0", "1", "2", "3", "4", "5", "6"] {
        checks.push(SmokeCheck::fails(Mode::Generate, &[bits]));
    }
    checks.push(SmokeCheck::succeeds(Mode::Generate, &["32"]));
    checks.push(SmokeCheck::succeeds(Mode::Generate, &["33"]));
    checks.push(SmokeCheck::fails(Mode::Generate, &["bla"]));
    checks.push(SmokeCheck::fails(Mode::Generate, &["32", "64"]));
    checks
}

/// Stricter input validation, enabled with `--extended-smoke`: hex-prefixed
/// or zero-modulus arguments and short argument lists must be rejected.
/// Whether `-g 7` must succeed is left unasserted.
pub fn extended_battery() -> Vec<SmokeCheck> {
    vec![
        SmokeCheck::fails(Mode::Encrypt, &["1", "0x2", "3"]),
        SmokeCheck::fails(Mode::Decrypt, &["1", "2", "0x3"]),
        SmokeCheck::fails(Mode::Break, &["0"]),
        SmokeCheck::fails(Mode::Break, &["0x1", "2", "3"]),
        SmokeCheck::fails(Mode::Encrypt, &["0x7", "0x5", "0xc"]),
        SmokeCheck::fails(Mode::Encrypt, &["0xb", "0x0", "0x25"]),
        SmokeCheck::fails(Mode::Decrypt, &["0xb", "0x0", "0x25"]),
        SmokeCheck::fails(Mode::Break, &["0xb", "0x0", "0x25"]),
    ]
}

pub fn run_check(runner: &dyn ToolRunner, check: &SmokeCheck, timeout: Duration) -> Result<()> {
    let (succeeded, observed) = match runner.run(&check.args, timeout) {
        Ok(inv) => check.judge(&inv),
        Err(HarnessError::ProcessTimeout { .. }) => (false, "timeout".to_string()),
        Err(err) => return Err(err),
    };
    let expected_success = check.expect == Expectation::Success;
    debug!(check = %check.describe(), %observed, "smoke check");
    if succeeded != expected_success {
        return Err(HarnessError::SmokeCheckFailure {
            check: check.describe(),
            expected: check.expect,
            observed,
        });
    }
    Ok(())
}

/// Run every check in order, stopping at the first mismatch. Returns the
/// number of checks that passed.
pub fn run_battery(
    runner: &dyn ToolRunner,
    checks: &[SmokeCheck],
    timeout: Duration,
) -> Result<usize> {
    for check in checks {
        run_check(runner, check, timeout)?;
    }
    Ok(checks.len())
}
