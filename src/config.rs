//! Harness settings: TOML file overlay, CLI precedence, and validation.
//!
//! Every field is optional so that two layers can be merged: the CLI layer
//! wins over the file layer, and anything still unset falls back to the
//! defaults below.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::driver::HarnessConfig;
use crate::error::{HarnessError, Result};

pub const DEFAULT_TOOL: &str = "./kry";
pub const DEFAULT_START: u32 = 96;
pub const DEFAULT_END: u32 = 100;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_RUNS: usize = 60;
pub const DEFAULT_MR_ROUNDS: u32 = 25;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub tool: Option<PathBuf>,
    pub start: Option<u32>,
    pub end: Option<u32>,
    pub timeout: Option<u64>,
    pub runs: Option<usize>,
    pub crack: Option<bool>,
    pub seed: Option<u64>,
    pub check_primality: Option<bool>,
    pub mr_rounds: Option<u32>,
    pub extended_smoke: Option<bool>,
}

impl Settings {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| HarnessError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Fill every unset field from `lower`.
    pub fn or(self, lower: Settings) -> Settings {
        Settings {
            tool: self.tool.or(lower.tool),
            start: self.start.or(lower.start),
            end: self.end.or(lower.end),
            timeout: self.timeout.or(lower.timeout),
            runs: self.runs.or(lower.runs),
            crack: self.crack.or(lower.crack),
            seed: self.seed.or(lower.seed),
            check_primality: self.check_primality.or(lower.check_primality),
            mr_rounds: self.mr_rounds.or(lower.mr_rounds),
            extended_smoke: self.extended_smoke.or(lower.extended_smoke),
        }
    }

    pub fn tool_path(&self) -> PathBuf {
        self.tool
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TOOL))
    }

    /// Apply defaults and validate. An unset seed is drawn at random.
    pub fn harness_config(&self) -> Result<HarnessConfig> {
        let start = self.start.unwrap_or(DEFAULT_START);
        let end = self.end.unwrap_or(DEFAULT_END);
        if start >= end {
            return Err(HarnessError::Config(format!(
                "start ({}) must be below end ({})",
                start, end
            )));
        }
        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout == 0 {
            return Err(HarnessError::Config("timeout must be positive".into()));
        }
        let mr_rounds = self.mr_rounds.unwrap_or(DEFAULT_MR_ROUNDS);
        if mr_rounds == 0 {
            return Err(HarnessError::Config("mr_rounds must be positive".into()));
        }
        Ok(HarnessConfig {
            bits: start..end,
            timeout: Duration::from_secs(timeout),
            runs: self.runs.unwrap_or(DEFAULT_RUNS),
            crack: self.crack.unwrap_or(false),
            seed: self.seed.unwrap_or_else(rand::random),
            check_primality: self.check_primality.unwrap_or(false),
            mr_rounds,
            extended_smoke: self.extended_smoke.unwrap_or(false),
        })
    }
}
