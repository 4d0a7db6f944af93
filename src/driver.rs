//! # Driver — Harness Run State Machine
//!
//! A run moves through `SmokeTesting → Trials → Reporting → Done`. Any error
//! moves it to `Aborted` and is returned unchanged; nothing after the first
//! failure is executed.
//!
//! ## Trial Protocol
//!
//! For each trial: generate a keypair at a random length, draw a message in
//! `[1, n)`, encrypt, print the `Conf(...)` reproduction line, check the
//! keypair invariants, decrypt and check the round trip, then (crack mode)
//! break the ciphertext, print the crack time, and check the recovered
//! values. If a trial fails before its `Conf` line is printed, the line is
//! printed anyway so every abort leaves the trial's values on stdout.

use std::io::Write;
use std::ops::Range;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::error::{HarnessError, Property, Result, TrialContext};
use crate::invariants::{self, MillerRabinOracle, PrimalityOracle};
use crate::invoker::ToolRunner;
use crate::oracle::{self, GeneratedKeypair};
use crate::smoke;
use crate::trial::{Trial, TrialGenerator};

/// Resolved run configuration. Build it from [`crate::config::Settings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Modulus lengths to draw from, half-open.
    pub bits: Range<u32>,
    /// Per-call timeout.
    pub timeout: Duration,
    pub runs: usize,
    pub crack: bool,
    pub seed: u64,
    pub check_primality: bool,
    pub mr_rounds: u32,
    pub extended_smoke: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ready,
    SmokeTesting,
    Trials { trial: usize },
    Reporting,
    Done,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialOutcome {
    pub index: usize,
    pub bit_length: u32,
    /// Wall-clock time of the break call, in crack mode.
    pub crack_time: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub seed: u64,
    pub smoke_checks: usize,
    pub trials: Vec<TrialOutcome>,
    pub elapsed: Duration,
}

/// Min, max and mean of the crack times, if any trial was cracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrackStats {
    pub min: Duration,
    pub max: Duration,
    pub mean: Duration,
}

impl RunSummary {
    pub fn crack_stats(&self) -> Option<CrackStats> {
        let times: Vec<Duration> = self.trials.iter().filter_map(|t| t.crack_time).collect();
        let min = *times.iter().min()?;
        let max = *times.iter().max()?;
        let total: Duration = times.iter().sum();
        Some(CrackStats {
            min,
            max,
            mean: total / times.len() as u32,
        })
    }
}

pub struct Harness<'a, W: Write> {
    runner: &'a dyn ToolRunner,
    config: HarnessConfig,
    out: W,
    stage: Stage,
}

impl<'a, W: Write> Harness<'a, W> {
    pub fn new(runner: &'a dyn ToolRunner, config: HarnessConfig, out: W) -> Self {
        Harness {
            runner,
            config,
            out,
            stage: Stage::Ready,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn into_output(self) -> W {
        self.out
    }

    fn enter(&mut self, stage: Stage) {
        debug!(from = ?self.stage, to = ?stage, "stage transition");
        self.stage = stage;
    }

    /// Run the smoke battery and every trial. Stops at the first failure.
    pub fn run(&mut self) -> Result<RunSummary> {
        let start = Instant::now();
        match self.run_stages(start) {
            Ok(summary) => {
                self.enter(Stage::Done);
                Ok(summary)
            }
            Err(err) => {
                error!(stage = ?self.stage, error = %err, "run aborted");
                self.enter(Stage::Aborted);
                Err(err)
            }
        }
    }

    fn run_stages(&mut self, start: Instant) -> Result<RunSummary> {
        let timeout = self.config.timeout;

        self.enter(Stage::SmokeTesting);
        let mut checks = smoke::default_battery();
        if self.config.extended_smoke {
            checks.extend(smoke::extended_battery());
        }
        let smoke_checks = smoke::run_battery(self.runner, &checks, timeout)?;
        info!(checks = smoke_checks, "smoke checks passed");

        let mut generator = TrialGenerator::new(self.config.bits.clone(), self.config.seed)?;
        let primality = self
            .config
            .check_primality
            .then(|| MillerRabinOracle::new(self.config.mr_rounds));

        let mut trials = Vec::with_capacity(self.config.runs);
        for index in 0..self.config.runs {
            self.enter(Stage::Trials { trial: index });
            let outcome = self.run_trial(
                index,
                &mut generator,
                primality.as_ref().map(|o| o as &dyn PrimalityOracle),
            )?;
            trials.push(outcome);
        }

        self.enter(Stage::Reporting);
        let summary = RunSummary {
            seed: self.config.seed,
            smoke_checks,
            trials,
            elapsed: start.elapsed(),
        };
        self.out.flush()?;
        match summary.crack_stats() {
            Some(stats) => info!(
                trials = summary.trials.len(),
                elapsed_secs = summary.elapsed.as_secs_f64(),
                crack_min_secs = stats.min.as_secs_f64(),
                crack_max_secs = stats.max.as_secs_f64(),
                crack_mean_secs = stats.mean.as_secs_f64(),
                "all trials passed"
            ),
            None => info!(
                trials = summary.trials.len(),
                elapsed_secs = summary.elapsed.as_secs_f64(),
                "all trials passed"
            ),
        }
        Ok(summary)
    }

    fn run_trial(
        &mut self,
        index: usize,
        generator: &mut TrialGenerator,
        primality: Option<&dyn PrimalityOracle>,
    ) -> Result<TrialOutcome> {
        let timeout = self.config.timeout;
        let (bit_length, keys) = generator.keypair(self.runner, timeout)?;
        info!(trial = index, bit_length, "trial started");

        let mut context = TrialContext {
            bit_length,
            message: None,
            ciphertext: None,
            p: keys.p.to_string(),
            q: keys.q.to_string(),
            n: keys.n.to_string(),
            e: keys.e.to_string(),
            d: keys.d.to_string(),
        };
        let mut announced = false;
        let result = self.exercise(
            index,
            bit_length,
            &keys,
            generator,
            primality,
            &mut context,
            &mut announced,
        );
        if result.is_err() && !announced {
            writeln!(self.out, "{}", context)?;
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn exercise(
        &mut self,
        index: usize,
        bit_length: u32,
        keys: &GeneratedKeypair,
        generator: &mut TrialGenerator,
        primality: Option<&dyn PrimalityOracle>,
        context: &mut TrialContext,
        announced: &mut bool,
    ) -> Result<TrialOutcome> {
        let message = match generator.message_below(keys.n.value()) {
            Some(message) => message,
            None => {
                // Report the keypair's first violation in check order.
                invariants::check_keypair(bit_length, keys, primality, context)?;
                return Err(HarnessError::violation(
                    Property::ModulusBitLength,
                    format!("n = {} leaves no message in [1, n)", keys.n),
                    context,
                ));
            }
        };
        let trial = Trial {
            bit_length,
            message,
            timeout: self.config.timeout,
        };
        context.message = Some(trial.message.to_string());

        let ciphertext = oracle::encrypt(
            self.runner,
            &keys.e,
            &keys.n,
            &trial.message,
            trial.timeout,
        )?;
        context.ciphertext = Some(ciphertext.token().to_string());
        writeln!(self.out, "{}", context)?;
        *announced = true;

        invariants::check_keypair(bit_length, keys, primality, context)?;

        let decrypted =
            oracle::decrypt(self.runner, &keys.d, &keys.n, &ciphertext, trial.timeout)?;
        invariants::check_round_trip(&trial.message, &decrypted, context)?;

        let mut crack_time = None;
        if self.config.crack {
            let started = Instant::now();
            let cracked =
                oracle::crack(self.runner, &keys.e, &keys.n, &ciphertext, trial.timeout)?;
            let elapsed = started.elapsed();
            writeln!(self.out, "Time to crack: {:.6} seconds", elapsed.as_secs_f64())?;
            invariants::check_crack(&trial.message, keys, &cracked, context)?;
            crack_time = Some(elapsed);
        }

        debug!(trial = index, bit_length, "trial passed");
        Ok(TrialOutcome {
            index,
            bit_length,
            crack_time,
        })
    }
}
