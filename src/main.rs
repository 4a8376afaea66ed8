use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use ucituner::runner::build_command;
use ucituner::{Config, ParameterSampler, ProcessGameRunner, Tuner};

#[derive(Parser, Debug)]
#[command(name = "ucituner", author, version, about = "Tune UCI engine options with cutechess-cli matches", long_about = None)]
struct Args {
    /// Path to the JSON tuning config
    config: PathBuf,

    /// Override n_generations from the config
    #[arg(long)]
    generations: Option<usize>,

    /// Override concurrency (contestants per round)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Seed for the parameter sampler (defaults to the config seed, then entropy)
    #[arg(long)]
    seed: Option<u64>,

    /// Continue from the last row of an existing trajectory log
    #[arg(long)]
    resume: bool,

    /// Sample one round and print the match command without running it
    #[arg(long)]
    print_command: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = Config::load(&args.config).with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(n) = args.generations { config.n_generations = n; }
    if let Some(c) = args.concurrency { config.concurrency = c; }
    if args.seed.is_some() { config.seed = args.seed; }
    config.validate()?;

    let mut sampler = match config.seed {
        Some(seed) => ParameterSampler::seeded(seed),
        None => ParameterSampler::from_entropy(),
    };

    if args.print_command {
        let contestants = sampler.sample(&config.parameter_ranges, config.concurrency)?;
        println!("{}", build_command(&config, &contestants, Path::new("round.pgn")));
        return Ok(());
    }

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            eprintln!("interrupt: stopping; the current round will be discarded");
            stop.store(true, Ordering::SeqCst);
        })
        .context("installing interrupt handler")?;
    }

    let generations = config.n_generations;
    let runner = ProcessGameRunner::new(config.clone(), stop.clone());
    let mut tuner = if args.resume {
        Tuner::resume(config, runner, sampler)?
    } else {
        Tuner::new(config, runner, sampler)?
    };
    info!("tuning {} parameters for {} generations, log {}",
        tuner.params().len(), generations, tuner.config().log_csv_path.display());

    let pb = ProgressBar::new(generations as u64);
    pb.set_style(ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?);
    let summary = tuner.run(&stop, |r| {
        pb.set_position(r.generation as u64);
        pb.set_message(format!("games={} decisive={}", r.games, r.decisive));
    })?;
    pb.finish_and_clear();

    println!("summary: generations={} interrupted={}", summary.generations, summary.interrupted);
    for (name, value) in &summary.estimates {
        println!("{} = {:.3}", name, value);
    }
    Ok(())
}
