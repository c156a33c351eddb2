//! Dash's Dark Gravity Wave: a rolling average of recent targets.

use serde::{Deserialize, Serialize};

use super::DaaError;
use crate::block::ChainView;

/// Parameters for the Dark Gravity Wave retargeting rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashParams {
    /// Blocks folded into the rolling target average.
    pub n_past_blocks: usize,
    /// When `true`, the measured interval spans `n_past_blocks - 1`
    /// block gaps, reproducing the reference fencepost bug. Disable to
    /// span the full `n_past_blocks` gaps.
    pub off_by_one: bool,
}

impl Default for DashParams {
    fn default() -> Self {
        DashParams { n_past_blocks: 24, off_by_one: true }
    }
}

pub(super) fn next_difficulty(
    params: &DashParams,
    view: ChainView<'_>,
    expected_block_time: i64,
) -> Result<f64, DaaError> {
    let len = view.len();
    let needed = params.n_past_blocks + usize::from(!params.off_by_one);
    if len < needed {
        return Err(DaaError::ViewTooShort { len, needed });
    }

    let tip = len - 1;

    // Walk back from the tip keeping a running mean of targets
    // (reciprocal difficulties), weighted exactly as the reference
    // implementation accumulates it.
    let mut avg_target = 0.0;
    let mut index = tip;
    for counted in 1..=params.n_past_blocks {
        let target = 1.0 / view[index].difficulty;
        avg_target = if counted == 1 {
            target
        } else {
            (avg_target * counted as f64 + target) / (counted as f64 + 1.0)
        };
        if counted != params.n_past_blocks {
            index -= 1;
        }
    }

    if !params.off_by_one {
        index -= 1;
    }

    let target_timespan = expected_block_time * params.n_past_blocks as i64;
    let mut actual = view[tip].timestamp - view[index].timestamp;
    if actual > target_timespan * 3 {
        actual = target_timespan * 3;
    } else if (actual as f64) < target_timespan as f64 / 3.0 {
        actual = target_timespan / 3;
    }

    let next_target = avg_target * actual as f64 / target_timespan as f64;
    Ok(1.0 / next_target)
}

#[cfg(test)]
mod tests {
    use super::{next_difficulty, DashParams};
    use crate::{
        block::{Block, ChainView},
        chain::STARTING_BLOCKS,
        daa::{testutil::baseline_chain, DaaError},
    };

    const T: i64 = 150;

    #[test]
    fn steady_chain_stays_near_baseline() {
        let params = DashParams::default();
        let chain = baseline_chain(STARTING_BLOCKS, T);

        let next =
            next_difficulty(&params, ChainView::Whole(&chain), T).unwrap();
        // 23 block gaps measured against a 24-gap target.
        let expected = 24.0 / 23.0;
        assert!((next - expected).abs() < 1e-9);
    }

    #[test]
    fn disabling_the_fencepost_bug_measures_the_full_window() {
        let params = DashParams { off_by_one: false, ..Default::default() };
        let chain = baseline_chain(STARTING_BLOCKS, T);

        let next =
            next_difficulty(&params, ChainView::Whole(&chain), T).unwrap();
        assert!((next - 1.0).abs() < 1e-9);
    }

    #[test]
    fn averages_targets_not_difficulties() {
        let params = DashParams::default();
        let mut chain = baseline_chain(STARTING_BLOCKS, T);
        // Double the difficulty of the last 24 blocks; the target
        // average halves, so the next difficulty roughly doubles.
        for block in chain.iter_mut().skip(STARTING_BLOCKS - 24) {
            block.difficulty = 2.0;
        }

        let next =
            next_difficulty(&params, ChainView::Whole(&chain), T).unwrap();
        assert!((next - 2.0 * 24.0 / 23.0).abs() < 1e-9);
    }

    #[test]
    fn slow_chains_hit_the_upper_clamp() {
        let params = DashParams::default();
        let chain = baseline_chain(STARTING_BLOCKS, T * 10);

        let next =
            next_difficulty(&params, ChainView::Whole(&chain), T).unwrap();
        // Elapsed clamps to three times the target span.
        assert!((next - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn fast_chains_hit_the_lower_clamp() {
        let params = DashParams::default();
        let chain: Vec<Block> = (0..STARTING_BLOCKS)
            .map(|i| Block::new(i, 1.0, 0, true))
            .collect();

        let next =
            next_difficulty(&params, ChainView::Whole(&chain), T).unwrap();
        assert!((next - 3.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_short_views() {
        let params = DashParams::default();
        let chain = baseline_chain(10, T);

        assert!(matches!(
            next_difficulty(&params, ChainView::Whole(&chain), T),
            Err(DaaError::ViewTooShort { len: 10, needed: 24 }),
        ));
    }
}
