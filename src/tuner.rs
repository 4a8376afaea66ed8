use crate::config::{Config, ParameterSet};
use crate::error::{Result, TunerError};
use crate::pgn::{self, GameRecord};
use crate::runner::{GameRunner, RoundStatus};
use crate::sampler::{Contestant, ParameterSampler};
use crate::trajectory::TrajectoryLog;
use log::{debug, info, warn};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};

/// Campaign state after construction. Initialization is `Tuner::new` or
/// `Tuner::resume` itself: it either returns a tuner that is `Iterating`
/// (`Terminated` when zero generations were requested) or an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Iterating,
    Terminated,
    Failed,
}

/// What one generation did to the estimates.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    pub generation: usize,
    pub status: RoundStatus,
    pub games: usize,
    pub decisive: usize,
    pub applied: usize,
    pub estimates: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CampaignReport {
    pub generations: usize,
    pub interrupted: bool,
    pub estimates: Vec<(String, f64)>,
}

/// Pull every estimate toward the winner's sampled value:
/// `estimate += apply_factor * (sampled - estimate)`.
pub fn apply_win(params: &mut ParameterSet, winner: &Contestant, apply_factor: f64) {
    for (name, range) in params.iter_mut() {
        if let Some(v) = winner.value(name) {
            range.estimate += apply_factor * (v - range.estimate);
        }
    }
}

/// Fold one game into the estimates. Returns false when the game carries no
/// signal: a draw, an unfinished game, or a winner that is not one of this
/// generation's contestants (e.g. a fixed opponent).
pub fn apply_record(params: &mut ParameterSet, contestants: &[Contestant], record: &GameRecord, apply_factor: f64) -> bool {
    let Some(winner) = record.winner() else { return false };
    match contestants.iter().find(|c| c.name == winner) {
        Some(c) => {
            apply_win(params, c, apply_factor);
            true
        }
        None => false,
    }
}

fn format_estimates(params: &ParameterSet) -> String {
    params.iter().map(|(n, r)| format!("{}={:.3}", n, r.estimate)).collect::<Vec<_>>().join(" ")
}

/// The tuning campaign. Owns the live estimates; each generation samples
/// contestants, plays one round, folds the decisive games in sequentially
/// and appends the new estimate vector to the trajectory log.
pub struct Tuner<G, R> {
    config: Config,
    params: ParameterSet,
    sampler: ParameterSampler<R>,
    runner: G,
    log: TrajectoryLog,
    phase: Phase,
    generation: usize,
}

impl<G: GameRunner, R: Rng> Tuner<G, R> {
    /// Validate the config, open the log and write the starting estimates.
    pub fn new(config: Config, runner: G, sampler: ParameterSampler<R>) -> Result<Self> {
        Self::start(config, runner, sampler, false)
    }

    /// Like `new`, but continue from the last row of an existing log instead
    /// of the configured starting values. Nothing already in the log is
    /// rewritten; with an empty log this behaves like `new`.
    pub fn resume(config: Config, runner: G, sampler: ParameterSampler<R>) -> Result<Self> {
        Self::start(config, runner, sampler, true)
    }

    fn start(config: Config, runner: G, sampler: ParameterSampler<R>, resume: bool) -> Result<Self> {
        config.validate()?;
        let mut params = config.parameter_ranges.clone();
        let existing = if resume { TrajectoryLog::read_rows(&config.log_csv_path)? } else { Vec::new() };
        let mut log = TrajectoryLog::open(&config.log_csv_path)?;
        match existing.last() {
            Some(last) => {
                params.set_estimates(last)?;
                info!("resuming from row {} of {}: {}", existing.len(), log.path().display(), format_estimates(&params));
            }
            None => log.append(&params.estimates())?,
        }
        let phase = if config.n_generations == 0 { Phase::Terminated } else { Phase::Iterating };
        Ok(Self { config, params, sampler, runner, log, phase, generation: 0 })
    }

    pub fn phase(&self) -> Phase { self.phase }
    pub fn generation(&self) -> usize { self.generation }
    pub fn params(&self) -> &ParameterSet { &self.params }
    pub fn config(&self) -> &Config { &self.config }
    pub fn runner(&self) -> &G { &self.runner }

    /// Run a single generation. Any error is fatal and leaves the tuner in
    /// `Phase::Failed`.
    pub fn step(&mut self) -> Result<IterationReport> {
        if self.phase != Phase::Iterating {
            return Err(TunerError::Config(format!("cannot step a tuner in phase {:?}", self.phase)));
        }
        let res = self.iterate();
        if res.is_err() {
            self.phase = Phase::Failed;
        }
        res
    }

    fn iterate(&mut self) -> Result<IterationReport> {
        let generation = self.generation + 1;
        let contestants = self.sampler.sample(&self.params, self.config.concurrency)?;
        for c in &contestants {
            debug!("generation {}: {} {}", generation, c.name, c.option_assignments().join(" "));
        }
        let round = self.runner.run_round(&contestants)?;
        let mut report = IterationReport {
            generation,
            status: round.status,
            games: 0,
            decisive: 0,
            applied: 0,
            estimates: Vec::new(),
        };

        if round.status == RoundStatus::Interrupted {
            // Partial output is discarded; no update and no row.
            warn!("generation {} interrupted; discarding its games", generation);
            self.phase = Phase::Terminated;
            report.estimates = self.params.estimates();
            return Ok(report);
        }

        match pgn::open(round.pgn_path()) {
            Ok(reader) => {
                for rec in reader {
                    let rec = match rec {
                        Ok(r) => r,
                        Err(e) => {
                            warn!("stopped reading {}: {}", round.pgn_path().display(), e);
                            break;
                        }
                    };
                    report.games += 1;
                    if !rec.outcome.is_decisive() { continue; }
                    report.decisive += 1;
                    if apply_record(&mut self.params, &contestants, &rec, self.config.apply_factor) {
                        report.applied += 1;
                        debug!("{} won ({} vs {}): {}", rec.winner().unwrap_or("?"), rec.white, rec.black, format_estimates(&self.params));
                    } else {
                        let winner = rec.winner().unwrap_or("?");
                        if self.config.opponents.iter().any(|o| o.name == winner) {
                            debug!("ignoring win by fixed opponent {}", winner);
                        } else {
                            warn!("ignoring win by unknown participant {}", winner);
                        }
                    }
                }
            }
            Err(e) => warn!("no games read from {}: {}", round.pgn_path().display(), e),
        }

        let estimates = self.params.estimates();
        self.log.append(&estimates)?;
        self.generation = generation;
        info!(
            "generation {}/{}: games={} decisive={} applied={} {}",
            generation, self.config.n_generations, report.games, report.decisive, report.applied, format_estimates(&self.params)
        );
        if self.generation >= self.config.n_generations {
            self.phase = Phase::Terminated;
        }
        report.estimates = estimates;
        Ok(report)
    }

    /// Run until `n_generations` are done or `stop` is raised. The flag is
    /// checked between generations; a round already in flight is abandoned
    /// by the runner.
    pub fn run<F>(&mut self, stop: &AtomicBool, mut on_iteration: F) -> Result<CampaignReport>
    where
        F: FnMut(&IterationReport),
    {
        let mut interrupted = false;
        while self.phase == Phase::Iterating {
            if stop.load(Ordering::SeqCst) {
                info!("stop requested after {} generations", self.generation);
                interrupted = true;
                self.phase = Phase::Terminated;
                break;
            }
            let report = self.step()?;
            if report.status == RoundStatus::Interrupted {
                interrupted = true;
            }
            on_iteration(&report);
        }
        Ok(CampaignReport {
            generations: self.generation,
            interrupted,
            estimates: self.params.iter().map(|(n, r)| (n.to_string(), r.estimate)).collect(),
        })
    }
}
