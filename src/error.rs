//! # Error — Harness Failure Taxonomy
//!
//! Every fault the harness can detect is fatal: the run stops at the first
//! one and the error carries enough context to reproduce it. Process-level
//! faults (spawn, timeout, non-zero exit, malformed output) come from the
//! invoker and oracle calls; `InvariantViolation` comes from the checker;
//! `SmokeCheckFailure` from the fixed boundary battery.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::smoke::Expectation;

pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    ProcessTimeout { command: String, timeout: Duration },

    #[error("`{command}` failed: {status}")]
    ToolFailed { command: String, status: String },

    #[error("malformed output from `{command}`: {reason}")]
    MalformedOutput { command: String, reason: String },

    #[error("invariant violated: {property} ({detail}) in {context}")]
    InvariantViolation {
        property: Property,
        detail: String,
        context: Box<TrialContext>,
    },

    #[error("smoke check failed: `{check}` expected {expected}, observed {observed}")]
    SmokeCheckFailure {
        check: String,
        expected: Expectation,
        observed: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    pub(crate) fn violation(
        property: Property,
        detail: impl Into<String>,
        context: &TrialContext,
    ) -> Self {
        HarnessError::InvariantViolation {
            property,
            detail: detail.into(),
            context: Box::new(context.clone()),
        }
    }

    /// The violated property, if this is an invariant failure.
    pub fn property(&self) -> Option<Property> {
        match self {
            HarnessError::InvariantViolation { property, .. } => Some(*property),
            _ => None,
        }
    }
}

/// Properties checked once per trial, in checking order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    ExponentsDistinct,
    FactorsDistinct,
    FactorsPrime,
    BitLengthSplit,
    ModulusBitLength,
    ModulusOdd,
    RoundTrip,
    CrackPlaintext,
    CrackFactors,
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Property::ExponentsDistinct => "exponents-distinct",
            Property::FactorsDistinct => "factors-distinct",
            Property::FactorsPrime => "factors-prime",
            Property::BitLengthSplit => "bit-length-split",
            Property::ModulusBitLength => "modulus-bit-length",
            Property::ModulusOdd => "modulus-odd",
            Property::RoundTrip => "round-trip",
            Property::CrackPlaintext => "crack-plaintext",
            Property::CrackFactors => "crack-factors",
        };
        f.write_str(name)
    }
}

/// Everything known about a trial so far, rendered as the `Conf(...)`
/// reproduction line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrialContext {
    pub bit_length: u32,
    pub message: Option<String>,
    pub ciphertext: Option<String>,
    pub p: String,
    pub q: String,
    pub n: String,
    pub e: String,
    pub d: String,
}

impl fmt::Display for TrialContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Conf(M={},C={},bitlen={},p={},q={},n={},e={},d={})",
            self.message.as_deref().unwrap_or("-"),
            self.ciphertext.as_deref().unwrap_or("-"),
            self.bit_length,
            self.p,
            self.q,
            self.n,
            self.e,
            self.d
        )
    }
}
