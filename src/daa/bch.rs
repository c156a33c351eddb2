//! Bitcoin Cash's every-block retarget over a median-filtered day.

use serde::{Deserialize, Serialize};

use super::DaaError;
use crate::block::ChainView;

/// Parameters for the Bitcoin Cash retargeting rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BchParams {
    /// Nominal span of the measured interval, in blocks.
    pub lookback: usize,
    /// Carried for parity with the other parameter records; the
    /// suffix-sum formulation used here has no extra fencepost to toggle.
    pub off_by_one: bool,
    /// Width of the median-time-past filter applied at each end of the
    /// interval.
    pub median_time_past: usize,
}

impl Default for BchParams {
    fn default() -> Self {
        BchParams { lookback: 144, off_by_one: true, median_time_past: 3 }
    }
}

pub(super) fn next_difficulty(
    params: &BchParams,
    view: ChainView<'_>,
    expected_block_time: i64,
) -> Result<f64, DaaError> {
    let len = view.len();
    let needed = params.lookback + params.median_time_past;
    if len < needed {
        return Err(DaaError::ViewTooShort { len, needed });
    }

    // Median-time-past at both ends damps single-timestamp manipulation.
    let top = view.median_by_timestamp(len - params.median_time_past..len);
    let bottom =
        view.median_by_timestamp(len - needed..len - params.lookback);

    let work = view.sum_difficulty(bottom.height..top.height + 1);

    let t = expected_block_time;
    let lookback = params.lookback as i64;
    let mut elapsed = top.timestamp - bottom.timestamp;
    if elapsed > 2 * lookback * t {
        elapsed = 2 * lookback * t;
    } else if elapsed < lookback * t / 2 {
        elapsed = lookback * t / 2;
    }

    Ok(work * t as f64 / elapsed as f64)
}
