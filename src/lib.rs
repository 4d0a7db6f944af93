//! # kry-conformance — Black-box Conformance Harness for an RSA CLI
//!
//! Drives an external RSA tool through its command-line interface and checks
//! the mathematical identities any conforming implementation must satisfy.
//! The tool is never linked against or inspected; every value crosses the
//! process boundary as a hexadecimal text token.
//!
//! ## Pipeline
//!
//! ```text
//! driver ─▶ trial (random length, random message)
//!        ─▶ oracle (generate / encrypt / decrypt / break, via invoker)
//!        ─▶ invariants (fail-fast)
//! ```
//!
//! A run first executes a fixed smoke battery of malformed and boundary
//! invocations ([`smoke`]), then N randomized trials ([`driver`]).

pub mod config;
pub mod driver;
pub mod error;
pub mod invariants;
pub mod invoker;
pub mod oracle;
pub mod smoke;
pub mod trial;

pub use config::Settings;
pub use driver::{Harness, HarnessConfig, RunSummary, Stage, TrialOutcome};
pub use error::{HarnessError, Property, Result, TrialContext};
pub use invariants::{MillerRabinOracle, PrimalityOracle};
pub use invoker::{Invocation, ProcessRunner, ToolRunner};
pub use oracle::{Ciphertext, CrackedResult, GeneratedKeypair, HexValue, Mode};
