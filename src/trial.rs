//! Randomized trial generation.
//!
//! A seeded `StdRng` picks each trial's modulus length uniformly from
//! `[low, high)`; a `rug` `RandState` seeded from the same value draws the
//! plaintext uniformly from `[1, n)`. Same seed and same tool output give
//! the same trial sequence.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rug::rand::RandState;
use rug::Integer;
use std::ops::Range;
use std::time::Duration;

use crate::error::{HarnessError, Result};
use crate::invoker::ToolRunner;
use crate::oracle::{self, GeneratedKeypair, HexValue};

/// One randomized test case: the requested modulus length and the message
/// sampled under the modulus the tool produced for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trial {
    pub bit_length: u32,
    pub message: HexValue,
    pub timeout: Duration,
}

pub struct TrialGenerator {
    bits: Range<u32>,
    rng: StdRng,
    big: RandState<'static>,
}

impl TrialGenerator {
    pub fn new(bits: Range<u32>, seed: u64) -> Result<Self> {
        if bits.is_empty() {
            return Err(HarnessError::Config(format!(
                "bit-length range [{}, {}) is empty",
                bits.start, bits.end
            )));
        }
        let mut big = RandState::new();
        big.seed(&Integer::from(seed));
        Ok(TrialGenerator {
            bits,
            rng: StdRng::seed_from_u64(seed),
            big,
        })
    }

    pub fn pick_bit_length(&mut self) -> u32 {
        self.rng.gen_range(self.bits.clone())
    }

    /// Uniform message in `[1, n)`, or `None` when that range is empty.
    pub fn message_below(&mut self, n: &Integer) -> Option<HexValue> {
        if *n <= 1u32 {
            return None;
        }
        let span = Integer::from(n - 1u32);
        let m = span.random_below(&mut self.big) + 1u32;
        Some(HexValue::from_integer(m))
    }

    /// Pick a bit length and ask the tool for a keypair of that size.
    pub fn keypair(
        &mut self,
        runner: &dyn ToolRunner,
        timeout: Duration,
    ) -> Result<(u32, GeneratedKeypair)> {
        let bit_length = self.pick_bit_length();
        let keys = oracle::generate(runner, bit_length, timeout)?;
        Ok((bit_length, keys))
    }
}
