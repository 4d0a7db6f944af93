//! Shared test helpers for integration tests.
//!
//! `FixtureTool` writes a POSIX shell stand-in for the RSA tool into a temp
//! directory. It serves precomputed keypairs from a table keyed by bit
//! length, implements encrypt/decrypt as the identity on the message token,
//! and answers break by looking the factors up by modulus. Individual
//! behaviours can be swapped out to break one property at a time.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Real keypairs: bit length → `p q n e d`.
pub const KEYS: &[(&str, &str)] = &[
    ("32", "0xf2a7 0x8c5d 0x850b7aab 0x10001 0x3c8ce2a1"),
    ("33", "0xecad 0x1a759 0x187642325 0x10001 0x7e7300c1"),
    (
        "96",
        "0xfd2ceeeacbe3 0xf52d616499c9 0xf278e1de389103f191e0c03b 0x10001 0x80bf9d377112cec561047c71",
    ),
    (
        "97",
        "0x99f9895fd7b3 0x1ba2bf2ee4e45 0x109f34636c672222ff8f7ad3f 0x10001 0x8ab821ffa031e13f07174641",
    ),
    (
        "98",
        "0x14ca2b9f3635d 0x1918c7b8444d1 0x209c16ec1fc69a057610cd2ed 0x10001 0x76fb0e67dc480ea49c73b2c1",
    ),
    (
        "99",
        "0x1e183756b7289 0x2a552f81e54dd 0x4f9fcb4512915a771c364d445 0x10001 0x2a80aab9a1328d055fa9b6621",
    ),
];

pub struct FixtureTool {
    keys: BTreeMap<String, String>,
    encrypt: String,
    decrypt: String,
    crack: String,
}

impl FixtureTool {
    pub fn conforming() -> Self {
        FixtureTool {
            keys: KEYS
                .iter()
                .map(|(bits, line)| (bits.to_string(), line.to_string()))
                .collect(),
            encrypt: r#"echo "$3""#.to_string(),
            decrypt: r#"echo "$3""#.to_string(),
            crack: r#"echo "$q $p $3""#.to_string(),
        }
    }

    /// Answer `-g <bits>` with `line` instead of the table entry.
    pub fn with_keys(mut self, bits: &str, line: &str) -> Self {
        self.keys.insert(bits.to_string(), line.to_string());
        self
    }

    /// Make `-g <bits>` fail.
    pub fn without_keys(mut self, bits: &str) -> Self {
        self.keys.remove(bits);
        self
    }

    /// Shell body for `-e`; the arguments are `$1 $2 $3` = `e n m`.
    pub fn with_encrypt(mut self, body: &str) -> Self {
        self.encrypt = body.to_string();
        self
    }

    /// Shell body for `-d`; the arguments are `$1 $2 $3` = `d n c`.
    pub fn with_decrypt(mut self, body: &str) -> Self {
        self.decrypt = body.to_string();
        self
    }

    /// Shell body for `-b`; `$p`, `$q` hold the factors, `$3` the ciphertext.
    pub fn with_crack(mut self, body: &str) -> Self {
        self.crack = body.to_string();
        self
    }

    pub fn script(&self) -> String {
        let mut keys = String::new();
        let mut factors = String::new();
        for (bits, line) in &self.keys {
            keys.push_str(&format!("    {}) echo \"{}\" ;;\n", bits, line));
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() == 5 {
                factors.push_str(&format!(
                    "    {}) p={}; q={} ;;\n",
                    fields[2], fields[0], fields[1]
                ));
            }
        }
        format!(
            r#"#!/bin/sh
[ $# -gt 0 ] || {{ echo "usage: kry -g|-e|-d|-b ..." >&2; exit 2; }}
mode="$1"
shift
case "$mode" in
  -g)
    [ $# -eq 1 ] || exit 2
    case "$1" in
{keys}    *) exit 1 ;;
    esac
    ;;
  -e)
    [ $# -eq 3 ] || exit 2
    {encrypt}
    ;;
  -d)
    [ $# -eq 3 ] || exit 2
    {decrypt}
    ;;
  -b)
    [ $# -eq 3 ] || exit 2
    case "$2" in
{factors}    *) exit 1 ;;
    esac
    {crack}
    ;;
  *)
    exit 2
    ;;
esac
"#,
            keys = keys,
            factors = factors,
            encrypt = self.encrypt,
            decrypt = self.decrypt,
            crack = self.crack,
        )
    }

    /// Write the script as an executable `kry` in `dir`.
    #[cfg(unix)]
    pub fn install(&self, dir: &tempfile::TempDir) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("kry");
        std::fs::write(&path, self.script()).expect("write fixture tool");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod fixture tool");
        path
    }
}

/// Count of `Conf(` reproduction lines in captured stdout.
pub fn conf_lines(stdout: &[u8]) -> usize {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|l| l.starts_with("Conf(M="))
        .count()
}
