//! # Oracle — Typed Calls Into the Tool Under Test
//!
//! Four thin wrappers over [`ToolRunner`]: generate, encrypt, decrypt and
//! break. Each builds the argument vector for its mode, requires a zero exit
//! status and a newline-terminated line with a fixed token count, and parses
//! the tokens as hexadecimal integers.
//!
//! ## Wire Format
//!
//! | Call | Arguments | Output tokens |
//! |------|-----------|---------------|
//! | generate | `-g <bits>` | `p q n e d` |
//! | encrypt | `-e <e> <n> <m>` | `c` |
//! | decrypt | `-d <d> <n> <c>` | `m` |
//! | break | `-b <e> <n> <c>` | `p q m` |
//!
//! Tokens are hexadecimal with an optional `0x` prefix. Values reach
//! hundreds of bits, so they decode to `rug::Integer`.

use rug::Integer;
use std::fmt;
use std::time::Duration;

use crate::error::Result;
use crate::invoker::{Invocation, ToolRunner};

/// Tool operating mode, selected by the first argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Generate,
    Encrypt,
    Decrypt,
    Break,
}

impl Mode {
    pub fn flag(self) -> &'static str {
        match self {
            Mode::Generate => "-g",
            Mode::Encrypt => "-e",
            Mode::Decrypt => "-d",
            Mode::Break => "-b",
        }
    }

    /// Full argument vector: the mode flag followed by `rest`.
    pub fn args<S: AsRef<str>>(self, rest: &[S]) -> Vec<String> {
        std::iter::once(self.flag().to_string())
            .chain(rest.iter().map(|s| s.as_ref().to_string()))
            .collect()
    }
}

/// A hexadecimal token as the tool printed it, together with its value.
///
/// Equality is textual: two tokens are equal only if the tool printed the
/// same digits. Compare [`HexValue::value`] for numeric equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexValue {
    token: String,
    value: Integer,
}

impl HexValue {
    pub fn parse(token: &str) -> std::result::Result<Self, String> {
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        if digits.is_empty() {
            return Err(format!("empty hexadecimal token {:?}", token));
        }
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(format!("not a hexadecimal token: {:?}", token));
        }
        let value = Integer::from_str_radix(digits, 16)
            .map_err(|e| format!("cannot parse {:?}: {}", token, e))?;
        Ok(HexValue {
            token: token.to_string(),
            value,
        })
    }

    /// Render a value the way messages are handed to the tool: `0x` + lowercase hex.
    pub fn from_integer(value: Integer) -> Self {
        HexValue {
            token: format!("0x{:x}", value),
            value,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn value(&self) -> &Integer {
        &self.value
    }

    pub fn bit_length(&self) -> u32 {
        self.value.significant_bits()
    }
}

impl fmt::Display for HexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}

/// Output of `generate`: factors, modulus, and the two exponents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedKeypair {
    pub p: HexValue,
    pub q: HexValue,
    pub n: HexValue,
    pub e: HexValue,
    pub d: HexValue,
}

/// Output of `encrypt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ciphertext(pub HexValue);

impl Ciphertext {
    pub fn token(&self) -> &str {
        self.0.token()
    }
}

/// Output of `break`: the recovered factors (either order) and plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrackedResult {
    pub p: HexValue,
    pub q: HexValue,
    pub m: HexValue,
}

fn call(
    runner: &dyn ToolRunner,
    mode: Mode,
    rest: &[&str],
    timeout: Duration,
) -> Result<Invocation> {
    runner.run(&mode.args(rest), timeout)?.into_success()
}

fn parse_tokens<const N: usize>(inv: &Invocation) -> Result<[HexValue; N]> {
    let tokens = inv.tokens(N)?;
    let mut values = Vec::with_capacity(N);
    for token in tokens {
        values.push(HexValue::parse(token).map_err(|reason| inv.malformed(reason))?);
    }
    values
        .try_into()
        .map_err(|_| inv.malformed("token count changed while parsing"))
}

/// Ask the tool for a fresh keypair with an `bit_length`-bit modulus.
pub fn generate(
    runner: &dyn ToolRunner,
    bit_length: u32,
    timeout: Duration,
) -> Result<GeneratedKeypair> {
    let inv = call(
        runner,
        Mode::Generate,
        &[bit_length.to_string().as_str()],
        timeout,
    )?;
    parse_keypair(&inv)
}

/// Parse the five-token `p q n e d` line of a generate call.
pub(crate) fn parse_keypair(inv: &Invocation) -> Result<GeneratedKeypair> {
    let [p, q, n, e, d] = parse_tokens::<5>(inv)?;
    Ok(GeneratedKeypair { p, q, n, e, d })
}

pub fn encrypt(
    runner: &dyn ToolRunner,
    e: &HexValue,
    n: &HexValue,
    message: &HexValue,
    timeout: Duration,
) -> Result<Ciphertext> {
    let inv = call(
        runner,
        Mode::Encrypt,
        &[e.token(), n.token(), message.token()],
        timeout,
    )?;
    let [c] = parse_tokens::<1>(&inv)?;
    Ok(Ciphertext(c))
}

pub fn decrypt(
    runner: &dyn ToolRunner,
    d: &HexValue,
    n: &HexValue,
    ciphertext: &Ciphertext,
    timeout: Duration,
) -> Result<HexValue> {
    let inv = call(
        runner,
        Mode::Decrypt,
        &[d.token(), n.token(), ciphertext.token()],
        timeout,
    )?;
    let [m] = parse_tokens::<1>(&inv)?;
    Ok(m)
}

/// Recover the factors and plaintext from the public key and ciphertext alone.
pub fn crack(
    runner: &dyn ToolRunner,
    e: &HexValue,
    n: &HexValue,
    ciphertext: &Ciphertext,
    timeout: Duration,
) -> Result<CrackedResult> {
    let inv = call(
        runner,
        Mode::Break,
        &[e.token(), n.token(), ciphertext.token()],
        timeout,
    )?;
    let [p, q, m] = parse_tokens::<3>(&inv)?;
    Ok(CrackedResult { p, q, m })
}
