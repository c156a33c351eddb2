use std::{path::PathBuf, process::ExitCode, time::Instant};

use anyhow::Result;
use clap::Parser;
use log::{error, info};
use rand::Rng;

use selfish_sim::{
    daa::{Algorithm, Daa},
    params::SweepConfig,
    results::ResultsWriter,
    sweep::Sweep,
};

/// Simulate selfish-mining attacks against proof-of-work difficulty
/// adjustment algorithms.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Difficulty adjustment algorithm to simulate.
    #[arg(long, value_enum)]
    algo: Algorithm,

    /// Simulations per parameter combination.
    #[arg(long, default_value_t = 1)]
    num_sims: usize,

    /// Blocks to simulate past the starting prefix.
    #[arg(long, default_value_t = 5000)]
    num_blocks: usize,

    /// Seconds between blocks (per-algorithm default when unset).
    #[arg(long)]
    block_time: Option<i64>,

    /// Attacker's hashrate fraction (lower bound when sweeping).
    #[arg(long, default_value_t = 0.35)]
    alpha: f64,

    /// Upper bound when sweeping over alpha.
    #[arg(long)]
    alpha_max: Option<f64>,

    /// Alpha increment per sweep iteration.
    #[arg(long, default_value_t = 0.01)]
    alpha_step: f64,

    /// Fraction of the honest network mining on attacker blocks during
    /// a race (lower bound when sweeping).
    #[arg(long, default_value_t = 0.0)]
    gamma: f64,

    /// Upper bound when sweeping over gamma.
    #[arg(long)]
    gamma_max: Option<f64>,

    /// Gamma increment per sweep iteration.
    #[arg(long, default_value_t = 0.01)]
    gamma_step: f64,

    /// Seconds the attacker forward-dates withheld blocks (lower bound
    /// when sweeping).
    #[arg(long, default_value_t = 0)]
    timewarp: i64,

    /// Upper bound when sweeping over the timewarp.
    #[arg(long)]
    timewarp_max: Option<i64>,

    /// Timewarp increment per sweep iteration, in seconds.
    #[arg(long, default_value_t = 1)]
    timewarp_step: i64,

    /// Master seed; drawn from OS entropy when unset.
    #[arg(long)]
    seed: Option<u64>,

    /// Directory holding per-algorithm parameter files.
    #[arg(long, default_value = ".")]
    params_dir: PathBuf,

    /// Results file, appended to across invocations.
    #[arg(long, default_value = "results.json")]
    results: PathBuf,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn"),
    )
    .init();

    if let Err(error) = try_main() {
        error!("{error:#}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn try_main() -> Result<()> {
    let args = Args::parse();

    let daa = Daa::load(args.algo, &args.params_dir)?;
    let seed = args.seed.unwrap_or_else(|| rand::thread_rng().gen());
    info!("master seed {seed}");

    let config = SweepConfig {
        algo: args.algo,
        num_sims: args.num_sims,
        num_blocks: args.num_blocks,
        block_time: args.block_time,
        alpha: args.alpha,
        alpha_max: args.alpha_max,
        alpha_step: args.alpha_step,
        gamma: args.gamma,
        gamma_max: args.gamma_max,
        gamma_step: args.gamma_step,
        timewarp: args.timewarp,
        timewarp_max: args.timewarp_max,
        timewarp_step: args.timewarp_step,
        seed,
    };

    let sweep = Sweep::new(config, daa.clone())?;
    let mut writer = ResultsWriter::open(&args.results, daa)?;

    print_banner(&sweep);

    let started = Instant::now();
    sweep.run(&mut writer)?;

    println!("total running time: {:.2?}", started.elapsed());
    Ok(())
}

fn print_banner(sweep: &Sweep) {
    let config = sweep.config();

    println!("simulating with the following parameters");
    println!(
        "algo: {}\tblocks per sim: {}\tsims per cell: {}\tblock time: {}s",
        config.algo,
        config.num_blocks,
        config.num_sims,
        config.block_time(),
    );
    println!(
        "params: {}",
        serde_json::to_string(sweep.daa()).expect("parameters serialize"),
    );
    println!(
        "alpha range:    {} - {} (step {})",
        config.alpha,
        config.alpha_end(),
        config.alpha_step,
    );
    println!(
        "gamma range:    {} - {} (step {})",
        config.gamma,
        config.gamma_end(),
        config.gamma_step,
    );
    println!(
        "timewarp range: {} - {} (step {})",
        config.timewarp,
        config.timewarp_end(),
        config.timewarp_step,
    );
}
