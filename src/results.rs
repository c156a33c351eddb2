//! Result records, per-cell aggregation, and the appendable results
//! file

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{daa::Daa, params::SimulationParams};

/// What a single simulation run reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationResult {
    /// Attacker blocks over total accepted blocks.
    pub win_ratio: f64,
    /// `win_ratio` divided by the ratio of real to expected elapsed
    /// time, crediting the attacker for slowing the chain down.
    pub adjusted_winning: f64,
    /// Real seconds per accepted attacker block; `-1` when the attacker
    /// landed none.
    pub selfish_seconds_per_block: f64,
    /// `(win_ratio - alpha) / alpha`.
    pub relative_gain: f64,
    /// `(adjusted_winning - alpha) / alpha`.
    pub adjusted_relative_gain: f64,
    pub final_height: usize,
    /// Races entered.
    pub num_reorgs: u64,
    /// Races the attacker won.
    pub sm_win_reorgs: u64,
}

/// Averages over all runs of one grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellResult {
    pub num_sims: usize,
    pub alpha: f64,
    pub gamma: f64,
    pub timewarp: i64,
    pub num_blocks: usize,
    pub block_time: i64,
    pub win_ratio: f64,
    pub adjusted_winning: f64,
    pub selfish_seconds_per_block: f64,
    pub relative_gain: f64,
    pub adjusted_relative_gain: f64,
    pub gain_std_dev: f64,
    pub adjusted_gain_std_dev: f64,
    pub seconds_per_block_std_dev: f64,
    pub final_height: f64,
    pub num_reorgs: f64,
    /// Mean of each run's won-races fraction (0 for runs with no races).
    pub sm_win_reorgs: f64,
    /// Fraction of runs whose raw win ratio beat alpha.
    pub did_better_naive: f64,
    /// Fraction of runs whose time-adjusted win ratio beat alpha.
    pub did_better_time_adjust: f64,
}

pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    let center = mean(values);
    let variance = values
        .iter()
        .map(|value| {
            let diff = value - center;
            diff * diff
        })
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

/// Folds the runs of one grid cell into its averaged record.
pub fn aggregate(
    params: &SimulationParams,
    runs: &[SimulationResult],
) -> CellResult {
    let count = runs.len() as f64;
    let of = |f: fn(&SimulationResult) -> f64| -> Vec<f64> {
        runs.iter().map(f).collect()
    };

    let gains = of(|r| r.relative_gain);
    let adjusted_gains = of(|r| r.adjusted_relative_gain);
    let seconds_per_block = of(|r| r.selfish_seconds_per_block);

    let won_fraction: Vec<f64> = runs
        .iter()
        .map(|r| {
            if r.num_reorgs == 0 {
                0.0
            } else {
                r.sm_win_reorgs as f64 / r.num_reorgs as f64
            }
        })
        .collect();

    let beat_alpha =
        runs.iter().filter(|r| r.win_ratio > params.alpha).count();
    let beat_alpha_adjusted =
        runs.iter().filter(|r| r.adjusted_winning > params.alpha).count();

    CellResult {
        num_sims: runs.len(),
        alpha: params.alpha,
        gamma: params.gamma,
        timewarp: params.timewarp,
        num_blocks: params.num_blocks,
        block_time: params.block_time,
        win_ratio: mean(&of(|r| r.win_ratio)),
        adjusted_winning: mean(&of(|r| r.adjusted_winning)),
        selfish_seconds_per_block: mean(&seconds_per_block),
        relative_gain: mean(&gains),
        adjusted_relative_gain: mean(&adjusted_gains),
        gain_std_dev: std_dev(&gains),
        adjusted_gain_std_dev: std_dev(&adjusted_gains),
        seconds_per_block_std_dev: std_dev(&seconds_per_block),
        final_height: mean(&of(|r| r.final_height as f64)),
        num_reorgs: mean(&of(|r| r.num_reorgs as f64)),
        sm_win_reorgs: mean(&won_fraction),
        did_better_naive: beat_alpha as f64 / count,
        did_better_time_adjust: beat_alpha_adjusted as f64 / count,
    }
}

/// One invocation's worth of cells under the algorithm that produced
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsGroup {
    pub params: Daa,
    pub results: Vec<CellResult>,
}

#[derive(Debug, thiserror::Error)]
pub enum ResultsError {
    #[error("could not access results file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("results file {path} is not a results array")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Write-through sink for the results file: groups from earlier
/// invocations are preserved, and the file is rewritten whole on every
/// flush so completed cells survive an interrupted sweep.
#[derive(Debug)]
pub struct ResultsWriter {
    path: PathBuf,
    prior: Vec<ResultsGroup>,
    current: ResultsGroup,
}

impl ResultsWriter {
    /// Opens (or creates) the results file and starts a fresh group for
    /// this invocation.
    pub fn open(path: &Path, daa: Daa) -> Result<Self, ResultsError> {
        let prior = if path.exists() {
            let text = fs::read_to_string(path).map_err(|source| {
                ResultsError::Io { path: path.into(), source }
            })?;
            serde_json::from_str(&text).map_err(|source| {
                ResultsError::Format { path: path.into(), source }
            })?
        } else {
            Vec::new()
        };

        Ok(ResultsWriter {
            path: path.into(),
            prior,
            current: ResultsGroup { params: daa, results: Vec::new() },
        })
    }

    pub fn push(&mut self, cell: CellResult) {
        self.current.results.push(cell);
    }

    /// Cells recorded by this invocation so far.
    pub fn results(&self) -> &[CellResult] {
        &self.current.results
    }

    /// Rewrites the file as every prior group plus the current one.
    pub fn flush(&self) -> Result<(), ResultsError> {
        let groups: Vec<&ResultsGroup> =
            self.prior.iter().chain([&self.current]).collect();

        let json = serde_json::to_vec_pretty(&groups)
            .expect("result records always serialize");
        fs::write(&self.path, json).map_err(|source| ResultsError::Io {
            path: self.path.clone(),
            source,
        })
    }
}
