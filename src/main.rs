//! # Main — CLI Entry Point
//!
//! Parses the harness flags, layers them over an optional TOML config file,
//! and runs the smoke battery plus randomized trials against the tool.
//!
//! ## Options
//!
//! - `-s/--start`, `-e/--end`: modulus bit-length range `[start, end)` (96..100).
//! - `-t/--timeout`: per-call timeout in seconds (60).
//! - `-r/--runs`: number of randomized trials (60).
//! - `-c/--crack`: also exercise and time the tool's break mode. Each
//!   boolean flag has a `--no-` form that overrides a config file value.
//! - `--tool` / `KRY_TOOL`: path of the tool under test (`./kry`).
//!
//! Exit status is zero only if every smoke check and trial passed.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kry_conformance::{Harness, ProcessRunner, Settings};

#[derive(Parser)]
#[command(
    name = "kry-conformance",
    about = "Randomized conformance and robustness tests for the kry RSA tool"
)]
struct Cli {
    /// Smallest modulus bit length to test (inclusive, default 96)
    #[arg(short, long)]
    start: Option<u32>,

    /// Largest modulus bit length to test (exclusive, default 100)
    #[arg(short, long)]
    end: Option<u32>,

    /// Timeout for each tool invocation in seconds (default 60)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Number of randomized trials (default 60)
    #[arg(short, long)]
    runs: Option<usize>,

    /// Also break each ciphertext and report how long it took
    #[arg(short, long, overrides_with = "no_crack")]
    crack: bool,

    /// Do not break ciphertexts, even if the config file enables it
    #[arg(long, overrides_with = "crack")]
    no_crack: bool,

    /// Path to the RSA tool under test (default ./kry)
    #[arg(long, env = "KRY_TOOL")]
    tool: Option<PathBuf>,

    /// Seed for bit-length and message selection (random if omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Check that generated factors are probable primes
    #[arg(long, overrides_with = "no_check_primality")]
    check_primality: bool,

    /// Skip the primality check, even if the config file enables it
    #[arg(long, overrides_with = "check_primality")]
    no_check_primality: bool,

    /// Miller-Rabin rounds for --check-primality (default 25)
    #[arg(long)]
    mr_rounds: Option<u32>,

    /// Also require rejection of hex-prefixed and zero-modulus arguments
    #[arg(long, overrides_with = "no_extended_smoke")]
    extended_smoke: bool,

    /// Skip the extended smoke checks, even if the config file enables them
    #[arg(long, overrides_with = "extended_smoke")]
    no_extended_smoke: bool,

    /// TOML file with defaults for any of the options above
    #[arg(long)]
    config: Option<PathBuf>,
}

/// `--x` / `--no-x` pair: `None` leaves the value to the config file.
fn switch(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            tool: self.tool.clone(),
            start: self.start,
            end: self.end,
            timeout: self.timeout,
            runs: self.runs,
            crack: switch(self.crack, self.no_crack),
            seed: self.seed,
            check_primality: switch(self.check_primality, self.no_check_primality),
            mr_rounds: self.mr_rounds,
            extended_smoke: switch(self.extended_smoke, self.no_extended_smoke),
        }
    }
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // LOG_FORMAT=json for machine-readable logs, human-readable otherwise
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let cli = Cli::parse();

    let file = match &cli.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Settings::default(),
    };
    let settings = cli.settings().or(file);
    let config = settings.harness_config()?;
    let runner = ProcessRunner::new(settings.tool_path());

    info!(
        tool = %runner.program().display(),
        start = config.bits.start,
        end = config.bits.end,
        runs = config.runs,
        crack = config.crack,
        seed = config.seed,
        "kry-conformance starting"
    );

    let stdout = std::io::stdout();
    let mut harness = Harness::new(&runner, config, stdout.lock());
    harness.run()?;
    Ok(())
}
