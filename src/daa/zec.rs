//! Zcash's dampened median-of-medians retarget.

use serde::{Deserialize, Serialize};

use super::DaaError;
use crate::block::ChainView;

/// Parameters for the Zcash retargeting rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZecParams {
    /// Blocks folded into the target average.
    pub n_averaging_interval: usize,
    /// Width of the median filter applied at each end of the interval.
    pub n_median_timespan: usize,
    /// Largest allowed downward timespan deviation, in percent.
    pub n_max_adjust_up: u32,
    /// Largest allowed upward timespan deviation, in percent.
    pub n_max_adjust_down: u32,
    /// Divisor pulling the measured timespan toward the target.
    pub dampening_factor: f64,
}

impl Default for ZecParams {
    fn default() -> Self {
        ZecParams {
            n_averaging_interval: 17,
            n_median_timespan: 11,
            n_max_adjust_up: 16,
            n_max_adjust_down: 32,
            dampening_factor: 4.0,
        }
    }
}

pub(super) fn next_difficulty(
    params: &ZecParams,
    view: ChainView<'_>,
    expected_block_time: i64,
) -> Result<f64, DaaError> {
    let len = view.len();
    let needed = params.n_averaging_interval + params.n_median_timespan + 1;
    if len < needed {
        return Err(DaaError::ViewTooShort { len, needed });
    }

    let newest = view[len - 1];
    let oldest = view[len - 1 - params.n_averaging_interval];

    // Median-time-past of the blocks strictly below each anchor.
    let newest_median = view.median_by_timestamp(
        newest.height - params.n_median_timespan..newest.height,
    );
    let oldest_median = view.median_by_timestamp(
        oldest.height - params.n_median_timespan..oldest.height,
    );

    let target =
        (params.n_averaging_interval as i64 * expected_block_time) as f64;
    let min_timespan = target * (100 - params.n_max_adjust_up) as f64 / 100.0;
    let max_timespan =
        target * (100 + params.n_max_adjust_down) as f64 / 100.0;

    let actual = (newest_median.timestamp - oldest_median.timestamp) as f64;
    let mut damped = target + (actual - target) / params.dampening_factor;
    if damped < min_timespan {
        damped = min_timespan;
    } else if damped > max_timespan {
        damped = max_timespan;
    }

    let mut avg_target = 0.0;
    for i in newest.height - params.n_averaging_interval..newest.height {
        avg_target += 1.0 / view[i].difficulty;
    }
    avg_target /= params.n_averaging_interval as f64;

    let next_target = avg_target / target * damped;
    Ok(1.0 / next_target)
}
