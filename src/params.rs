//! Simulation and sweep parameters

use crate::daa::Algorithm;

/// Smallest attacker hashrate fraction the sweep surface accepts.
pub const MIN_ALPHA: f64 = 0.01;

/// Largest timestamp offset (seconds) an attacker may apply, matching
/// the common two-hour future-timestamp acceptance window.
pub const MAX_TIMEWARP: i64 = 7200;

/// Parameters of a single simulation run (one grid cell).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParams {
    /// Attacker's share of total hashrate.
    pub alpha: f64,
    /// Fraction of the honest network that mines on a published
    /// attacker block during a race.
    pub gamma: f64,
    /// Seconds added to every withheld block's timestamp.
    pub timewarp: i64,
    /// Blocks simulated past the starting prefix.
    pub num_blocks: usize,
    /// Target seconds between blocks.
    pub block_time: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} = {value} is outside the allowed range {range}")]
    OutOfRange { field: &'static str, value: f64, range: &'static str },
    #[error("{field} upper bound {max} does not exceed the starting value {start}")]
    EmptyRange { field: &'static str, start: f64, max: f64 },
}

/// Everything one invocation sweeps over: a starting value, an optional
/// upper bound, and a step per swept parameter, plus the fixed knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    pub algo: Algorithm,
    /// Simulations averaged per grid cell.
    pub num_sims: usize,
    pub num_blocks: usize,
    /// Target seconds between blocks; the per-algorithm default applies
    /// when unset.
    pub block_time: Option<i64>,
    pub alpha: f64,
    pub alpha_max: Option<f64>,
    pub alpha_step: f64,
    pub gamma: f64,
    pub gamma_max: Option<f64>,
    pub gamma_step: f64,
    pub timewarp: i64,
    pub timewarp_max: Option<i64>,
    pub timewarp_step: i64,
    /// Master seed the per-simulation seeds derive from.
    pub seed: u64,
}

impl SweepConfig {
    /// A single-cell sweep with every parameter at its resting value.
    pub fn new(algo: Algorithm) -> Self {
        SweepConfig {
            algo,
            num_sims: 1,
            num_blocks: 5000,
            block_time: None,
            alpha: 0.35,
            alpha_max: None,
            alpha_step: 0.01,
            gamma: 0.0,
            gamma_max: None,
            gamma_step: 0.01,
            timewarp: 0,
            timewarp_max: None,
            timewarp_step: 1,
            seed: 0,
        }
    }

    pub fn block_time(&self) -> i64 {
        self.block_time.unwrap_or_else(|| self.algo.default_block_time())
    }

    pub fn alpha_end(&self) -> f64 {
        self.alpha_max.unwrap_or(self.alpha)
    }

    pub fn gamma_end(&self) -> f64 {
        self.gamma_max.unwrap_or(self.gamma)
    }

    pub fn timewarp_end(&self) -> i64 {
        self.timewarp_max.unwrap_or(self.timewarp)
    }

    /// Checks every parameter and range before anything runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        use ConfigError::*;

        if self.num_sims < 1 {
            return Err(OutOfRange {
                field: "num_sims",
                value: self.num_sims as f64,
                range: "1..",
            });
        }
        if self.num_blocks < 1 {
            return Err(OutOfRange {
                field: "num_blocks",
                value: self.num_blocks as f64,
                range: "1..",
            });
        }
        if let Some(block_time) = self.block_time {
            if block_time < 1 {
                return Err(OutOfRange {
                    field: "block_time",
                    value: block_time as f64,
                    range: "1..",
                });
            }
        }

        if !(MIN_ALPHA..=1.0).contains(&self.alpha) {
            return Err(OutOfRange {
                field: "alpha",
                value: self.alpha,
                range: "0.01..=1.0",
            });
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(OutOfRange {
                field: "gamma",
                value: self.gamma,
                range: "0.0..=1.0",
            });
        }
        if !(0..=MAX_TIMEWARP).contains(&self.timewarp) {
            return Err(OutOfRange {
                field: "timewarp",
                value: self.timewarp as f64,
                range: "0..=7200",
            });
        }

        if let Some(alpha_max) = self.alpha_max {
            if alpha_max > 1.0 {
                return Err(OutOfRange {
                    field: "alpha_max",
                    value: alpha_max,
                    range: "0.01..=1.0",
                });
            }
            if alpha_max <= self.alpha {
                return Err(EmptyRange {
                    field: "alpha",
                    start: self.alpha,
                    max: alpha_max,
                });
            }
        }
        if let Some(gamma_max) = self.gamma_max {
            if gamma_max > 1.0 {
                return Err(OutOfRange {
                    field: "gamma_max",
                    value: gamma_max,
                    range: "0.0..=1.0",
                });
            }
            if gamma_max <= self.gamma {
                return Err(EmptyRange {
                    field: "gamma",
                    start: self.gamma,
                    max: gamma_max,
                });
            }
        }
        if let Some(timewarp_max) = self.timewarp_max {
            if timewarp_max > MAX_TIMEWARP {
                return Err(OutOfRange {
                    field: "timewarp_max",
                    value: timewarp_max as f64,
                    range: "0..=7200",
                });
            }
            if timewarp_max <= self.timewarp {
                return Err(EmptyRange {
                    field: "timewarp",
                    start: self.timewarp as f64,
                    max: timewarp_max as f64,
                });
            }
        }

        if self.alpha_step <= 0.0 {
            return Err(OutOfRange {
                field: "alpha_step",
                value: self.alpha_step,
                range: "0.0..",
            });
        }
        if self.gamma_step <= 0.0 {
            return Err(OutOfRange {
                field: "gamma_step",
                value: self.gamma_step,
                range: "0.0..",
            });
        }
        if self.timewarp_step < 1 {
            return Err(OutOfRange {
                field: "timewarp_step",
                value: self.timewarp_step as f64,
                range: "1..",
            });
        }

        Ok(())
    }
}
