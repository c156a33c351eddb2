//! Grid sweeps over attacker parameters
//!
//! One sweep walks the `(alpha, gamma, timewarp)` grid cell by cell,
//! fans each cell's simulations out across threads, and persists the
//! averaged record before moving on. Cells are independent, so the
//! per-cell batch parallelizes freely; determinism is kept by assigning
//! every simulation its seed before dispatch.

use std::time::Instant;

use log::info;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;
use rayon::prelude::*;

use crate::{
    daa::Daa,
    params::{ConfigError, SimulationParams, SweepConfig},
    results::{self, CellResult, ResultsError, ResultsWriter},
    simulation::{run_one_simulation, SimulationError},
};

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error(transparent)]
    Results(#[from] ResultsError),
}

/// A validated sweep, ready to run.
#[derive(Debug, Clone)]
pub struct Sweep {
    config: SweepConfig,
    daa: Daa,
}

impl Sweep {
    pub fn new(config: SweepConfig, daa: Daa) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Sweep { config, daa })
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn daa(&self) -> &Daa {
        &self.daa
    }

    /// Runs every grid cell in order, flushing the results file after
    /// each one so an interrupted sweep keeps its completed cells.
    pub fn run(&self, writer: &mut ResultsWriter) -> Result<(), SweepError> {
        let config = &self.config;
        let block_time = config.block_time();
        let mut seeder = ChaChaRng::seed_from_u64(config.seed);

        let mut alpha = round3(config.alpha);
        let alpha_end = round3(config.alpha_end());
        while alpha <= alpha_end {
            let mut gamma = round3(config.gamma);
            let gamma_end = round3(config.gamma_end());
            while gamma <= gamma_end {
                let mut timewarp = config.timewarp;
                while timewarp <= config.timewarp_end() {
                    let params = SimulationParams {
                        alpha,
                        gamma,
                        timewarp,
                        num_blocks: config.num_blocks,
                        block_time,
                    };

                    let cell = self.run_cell(&params, &mut seeder)?;
                    writer.push(cell);
                    writer.flush()?;

                    timewarp += config.timewarp_step;
                }
                gamma = round3(gamma + config.gamma_step);
            }
            alpha = round3(alpha + config.alpha_step);
        }

        Ok(())
    }

    /// Runs one cell's batch of simulations in parallel and folds the
    /// outcomes into the averaged record.
    fn run_cell(
        &self,
        params: &SimulationParams,
        seeder: &mut ChaChaRng,
    ) -> Result<CellResult, SweepError> {
        let started = Instant::now();

        // Seeds are drawn up front so the thread schedule cannot change
        // which simulation gets which stream.
        let seeds: Vec<u64> =
            (0..self.config.num_sims).map(|_| seeder.gen()).collect();

        let runs = seeds
            .into_par_iter()
            .map(|seed| {
                run_one_simulation(params, self.daa.clone(), seed)
                    .map(|output| output.result)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let cell = results::aggregate(params, &runs);
        info!(
            "alpha {:.3} gamma {:.3} timewarp {}: win ratio {:.4}, \
             adjusted {:.4}, {} sims in {:.2?}",
            params.alpha,
            params.gamma,
            params.timewarp,
            cell.win_ratio,
            cell.adjusted_winning,
            cell.num_sims,
            started.elapsed(),
        );
        Ok(cell)
    }
}

/// Rounds to three decimals so stepped floats compare cleanly across
/// grid iterations.
fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
