//! # Invariants — Properties Every Conforming RSA Tool Must Satisfy
//!
//! Checks run once per trial and stop at the first violation:
//!
//! 1. **Distinctness**: `e != d` and `p != q`.
//! 2. **Primality** (optional): `p` and `q` pass the configured
//!    [`PrimalityOracle`].
//! 3. **Bit-length split**: for a requested length `L`, even `L` means both
//!    factors have `L/2` bits; odd `L` means one has `L/2` and the other
//!    `L/2 + 1`, in either order.
//! 4. **Modulus shape**: `n` has exactly `L` bits and is odd.
//! 5. **Round trip**: decrypting the ciphertext yields the original message
//!    token, digit for digit.
//! 6. **Crack** (crack mode only): the recovered message equals the original
//!    token and the recovered factors equal `{p, q}` in either order.
//!
//! Distinctness and factor comparisons are numeric; message comparisons are
//! textual, since the tool must echo the plaintext it was given.

use rug::integer::IsPrime;
use rug::Integer;

use crate::error::{HarnessError, Property, Result, TrialContext};
use crate::oracle::{CrackedResult, GeneratedKeypair, HexValue};

/// Capability to decide whether a generated factor is prime.
pub trait PrimalityOracle {
    fn name(&self) -> &str;
    fn is_prime(&self, n: &Integer) -> bool;
}

/// Small primes for trial division pre-filter.
const SMALL_PRIMES: [u32; 64] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
    101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173, 179, 181, 191, 193,
    197, 199, 211, 223, 227, 229, 233, 239, 241, 251, 257, 263, 269, 271, 277, 281, 283, 293, 307,
    311,
];

/// Trial division followed by GMP's Miller-Rabin (BPSW + `rounds` extra rounds).
#[derive(Debug, Clone, Copy)]
pub struct MillerRabinOracle {
    pub rounds: u32,
}

impl MillerRabinOracle {
    pub fn new(rounds: u32) -> Self {
        MillerRabinOracle { rounds }
    }

    /// True if n has a small prime factor and is not that prime itself.
    fn has_small_factor(n: &Integer) -> bool {
        for &p in &SMALL_PRIMES {
            if n.is_divisible_u(p) {
                return *n > p;
            }
        }
        false
    }
}

impl PrimalityOracle for MillerRabinOracle {
    fn name(&self) -> &str {
        "miller-rabin"
    }

    fn is_prime(&self, n: &Integer) -> bool {
        if *n < 2u32 || Self::has_small_factor(n) {
            return false;
        }
        // Two cheap rounds first; most composites fail here.
        if self.rounds > 2 && n.is_probably_prime(2) == IsPrime::No {
            return false;
        }
        n.is_probably_prime(self.rounds) != IsPrime::No
    }
}

/// Whether factor lengths `p_bits` and `q_bits` are the right split of an
/// `bit_length`-bit modulus.
pub fn bit_length_split_ok(bit_length: u32, p_bits: u32, q_bits: u32) -> bool {
    let half = bit_length / 2;
    if bit_length % 2 == 0 {
        p_bits == half && q_bits == half
    } else {
        (p_bits == half && q_bits == half + 1) || (p_bits == half + 1 && q_bits == half)
    }
}

/// Structural checks on a generated keypair (properties 1 to 4).
pub fn check_keypair(
    bit_length: u32,
    keys: &GeneratedKeypair,
    primality: Option<&dyn PrimalityOracle>,
    context: &TrialContext,
) -> Result<()> {
    if keys.e.value() == keys.d.value() {
        return Err(HarnessError::violation(
            Property::ExponentsDistinct,
            format!("e == d == {}", keys.e),
            context,
        ));
    }
    if keys.p.value() == keys.q.value() {
        return Err(HarnessError::violation(
            Property::FactorsDistinct,
            format!("p == q == {}", keys.p),
            context,
        ));
    }

    if let Some(oracle) = primality {
        for (name, factor) in [("p", &keys.p), ("q", &keys.q)] {
            if !oracle.is_prime(factor.value()) {
                return Err(HarnessError::violation(
                    Property::FactorsPrime,
                    format!("{} = {} is not prime ({})", name, factor, oracle.name()),
                    context,
                ));
            }
        }
    }

    let (p_bits, q_bits) = (keys.p.bit_length(), keys.q.bit_length());
    if !bit_length_split_ok(bit_length, p_bits, q_bits) {
        return Err(HarnessError::violation(
            Property::BitLengthSplit,
            format!(
                "p has {} bits and q has {} bits for a {}-bit modulus",
                p_bits, q_bits, bit_length
            ),
            context,
        ));
    }

    let n_bits = keys.n.bit_length();
    if n_bits != bit_length {
        return Err(HarnessError::violation(
            Property::ModulusBitLength,
            format!("n has {} bits, requested {}", n_bits, bit_length),
            context,
        ));
    }
    if keys.n.value().is_even() {
        return Err(HarnessError::violation(
            Property::ModulusOdd,
            format!("n = {} is even", keys.n),
            context,
        ));
    }
    Ok(())
}

pub fn check_round_trip(
    message: &HexValue,
    decrypted: &HexValue,
    context: &TrialContext,
) -> Result<()> {
    if message.token() != decrypted.token() {
        return Err(HarnessError::violation(
            Property::RoundTrip,
            format!("decrypted {} != message {}", decrypted, message),
            context,
        ));
    }
    Ok(())
}

pub fn check_crack(
    message: &HexValue,
    keys: &GeneratedKeypair,
    cracked: &CrackedResult,
    context: &TrialContext,
) -> Result<()> {
    if message.token() != cracked.m.token() {
        return Err(HarnessError::violation(
            Property::CrackPlaintext,
            format!("recovered {} != message {}", cracked.m, message),
            context,
        ));
    }
    let (p, q) = (keys.p.value(), keys.q.value());
    let (rp, rq) = (cracked.p.value(), cracked.q.value());
    let same_order = rp == p && rq == q;
    let swapped = rp == q && rq == p;
    if !(same_order || swapped) {
        return Err(HarnessError::violation(
            Property::CrackFactors,
            format!(
                "recovered factors {{{}, {}}} != {{{}, {}}}",
                cracked.p, cracked.q, keys.p, keys.q
            ),
            context,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(token: &str) -> HexValue {
        HexValue::parse(token).unwrap()
    }

    fn keys(p: &str, q: &str, n: &str, e: &str, d: &str) -> GeneratedKeypair {
        GeneratedKeypair {
            p: hex(p),
            q: hex(q),
            n: hex(n),
            e: hex(e),
            d: hex(d),
        }
    }

    /// A real 32-bit keypair (16 + 16 bit factors).
    fn keys32() -> GeneratedKeypair {
        keys("0xf2a7", "0x8c5d", "0x850b7aab", "0x10001", "0x3c8ce2a1")
    }

    /// A real 33-bit keypair (16 + 17 bit factors).
    fn keys33() -> GeneratedKeypair {
        keys("0xecad", "0x1a759", "0x187642325", "0x10001", "0x7e7300c1")
    }

    fn violated(result: Result<()>) -> Property {
        match result {
            Err(err) => err
                .property()
                .unwrap_or_else(|| panic!("not an invariant violation: {:?}", err)),
            Ok(()) => panic!("expected a violation"),
        }
    }

    fn ctx() -> TrialContext {
        TrialContext::default()
    }

    // ── Bit-length Split ────────────────────────────────────────────

    #[test]
    fn even_length_requires_equal_halves() {
        assert!(bit_length_split_ok(96, 48, 48));
        assert!(!bit_length_split_ok(96, 47, 49));
        assert!(!bit_length_split_ok(96, 49, 47));
        assert!(!bit_length_split_ok(96, 48, 49));
    }

    #[test]
    fn odd_length_accepts_either_order() {
        assert!(bit_length_split_ok(97, 48, 49));
        assert!(bit_length_split_ok(97, 49, 48));
        assert!(!bit_length_split_ok(97, 48, 48));
        assert!(!bit_length_split_ok(97, 49, 49));
        assert!(!bit_length_split_ok(97, 47, 50));
    }

    #[test]
    fn tiny_lengths() {
        assert!(bit_length_split_ok(0, 0, 0));
        assert!(bit_length_split_ok(1, 0, 1));
        assert!(bit_length_split_ok(1, 1, 0));
        assert!(!bit_length_split_ok(1, 1, 1));
    }

    // ── Keypair Checks ──────────────────────────────────────────────

    #[test]
    fn valid_keypairs_pass() {
        check_keypair(32, &keys32(), None, &ctx()).unwrap();
        check_keypair(33, &keys33(), None, &ctx()).unwrap();
    }

    #[test]
    fn valid_keypairs_pass_primality() {
        let oracle = MillerRabinOracle::new(25);
        check_keypair(32, &keys32(), Some(&oracle), &ctx()).unwrap();
        check_keypair(33, &keys33(), Some(&oracle), &ctx()).unwrap();
    }

    #[test]
    fn equal_exponents_are_rejected_first() {
        // p == q as well; the exponent check must win.
        let k = keys("0xf2a7", "0xf2a7", "0x850b7aab", "0x5", "0x05");
        assert_eq!(violated(check_keypair(32, &k, None, &ctx())), Property::ExponentsDistinct);
    }

    #[test]
    fn equal_factors_are_rejected() {
        let k = keys("0xf2a7", "0xF2A7", "0x850b7aab", "0x10001", "0x3c8ce2a1");
        assert_eq!(violated(check_keypair(32, &k, None, &ctx())), Property::FactorsDistinct);
    }

    #[test]
    fn composite_factor_fails_primality_when_enabled() {
        // 0xf2a9 = 62121 = 3 * 20707
        let k = keys("0xf2a9", "0x8c5d", "0x850b7aab", "0x10001", "0x3c8ce2a1");
        let oracle = MillerRabinOracle::new(25);
        assert_eq!(
            violated(check_keypair(32, &k, Some(&oracle), &ctx())),
            Property::FactorsPrime
        );
        // Without an oracle, primality is not checked.
        check_keypair(32, &k, None, &ctx()).unwrap();
    }

    #[test]
    fn uneven_factor_split_is_rejected() {
        // 33-bit key presented as a 32-bit request
        assert_eq!(
            violated(check_keypair(32, &keys33(), None, &ctx())),
            Property::BitLengthSplit
        );
    }

    #[test]
    fn modulus_length_mismatch_is_rejected() {
        let k = keys("0xf2a7", "0x8c5d", "0x50b7aab", "0x10001", "0x3c8ce2a1");
        assert_eq!(violated(check_keypair(32, &k, None, &ctx())), Property::ModulusBitLength);
    }

    #[test]
    fn even_modulus_is_rejected() {
        let k = keys("0xf2a7", "0x8c5d", "0x850b7aac", "0x10001", "0x3c8ce2a1");
        assert_eq!(violated(check_keypair(32, &k, None, &ctx())), Property::ModulusOdd);
    }

    // ── Round Trip and Crack ────────────────────────────────────────

    #[test]
    fn round_trip_requires_identical_token() {
        check_round_trip(&hex("0x1f"), &hex("0x1f"), &ctx()).unwrap();
        assert_eq!(
            violated(check_round_trip(&hex("0x1f"), &hex("0x20"), &ctx())),
            Property::RoundTrip
        );
        // Same value, different spelling: still a violation.
        assert_eq!(
            violated(check_round_trip(&hex("0x1f"), &hex("0x1F"), &ctx())),
            Property::RoundTrip
        );
    }

    #[test]
    fn crack_accepts_factors_in_either_order() {
        let k = keys32();
        let m = hex("0x1f");
        let straight = CrackedResult { p: hex("0xf2a7"), q: hex("0x8c5d"), m: hex("0x1f") };
        let swapped = CrackedResult { p: hex("0x8c5d"), q: hex("0xf2a7"), m: hex("0x1f") };
        check_crack(&m, &k, &straight, &ctx()).unwrap();
        check_crack(&m, &k, &swapped, &ctx()).unwrap();
    }

    #[test]
    fn crack_with_wrong_message_is_rejected() {
        let cracked = CrackedResult { p: hex("0xf2a7"), q: hex("0x8c5d"), m: hex("0x2") };
        assert_eq!(
            violated(check_crack(&hex("0x1f"), &keys32(), &cracked, &ctx())),
            Property::CrackPlaintext
        );
    }

    #[test]
    fn crack_with_wrong_factors_is_rejected() {
        // Same factor twice is not the set {p, q}.
        let cracked = CrackedResult { p: hex("0xf2a7"), q: hex("0xf2a7"), m: hex("0x1f") };
        assert_eq!(
            violated(check_crack(&hex("0x1f"), &keys32(), &cracked, &ctx())),
            Property::CrackFactors
        );
    }

    // ── Primality Oracle ────────────────────────────────────────────

    #[test]
    fn oracle_accepts_small_primes_in_table() {
        let oracle = MillerRabinOracle::new(25);
        for &p in &SMALL_PRIMES {
            assert!(oracle.is_prime(&Integer::from(p)), "rejected prime {}", p);
        }
    }

    #[test]
    fn oracle_rejects_composites_and_units() {
        let oracle = MillerRabinOracle::new(25);
        for c in [0u32, 1, 4, 9, 15, 1001, 99221, 313 * 317] {
            assert!(!oracle.is_prime(&Integer::from(c)), "accepted {}", c);
        }
    }

    #[test]
    fn oracle_with_two_rounds_skips_prescreen() {
        let oracle = MillerRabinOracle::new(2);
        assert!(oracle.is_prime(&Integer::from(10007u32)));
        assert!(!oracle.is_prime(&Integer::from(10001u32)));
    }
}
