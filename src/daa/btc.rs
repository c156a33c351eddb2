//! Bitcoin's once-per-period retarget.

use serde::{Deserialize, Serialize};

use super::DaaError;
use crate::{block::ChainView, chain::STARTING_BLOCKS};

/// Parameters for the Bitcoin retargeting rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BtcParams {
    /// Blocks between retargets.
    pub period: usize,
    /// When `true`, the measured interval spans `period - 1` block gaps,
    /// reproducing the reference client's fencepost bug. Disable to span
    /// the full `period` gaps.
    pub off_by_one: bool,
}

impl Default for BtcParams {
    fn default() -> Self {
        BtcParams { period: 2016, off_by_one: true }
    }
}

pub(super) fn next_difficulty(
    params: &BtcParams,
    view: ChainView<'_>,
    expected_block_time: i64,
) -> Result<f64, DaaError> {
    let len = view.len();
    if len < STARTING_BLOCKS {
        return Err(DaaError::ViewTooShort { len, needed: STARTING_BLOCKS });
    }

    // Between retarget boundaries the difficulty simply carries over.
    if (len - STARTING_BLOCKS) % params.period != 0 {
        return Ok(view[len - 1].difficulty);
    }

    let reach = params.period + 1 + usize::from(!params.off_by_one);
    if len < reach {
        return Err(DaaError::ViewTooShort { len, needed: reach });
    }

    let bottom = if params.off_by_one {
        len - params.period
    } else {
        len - params.period - 1
    };

    let top = &view[len - 1];
    let work = view.sum_difficulty(len - params.period..len - 1);

    let t = expected_block_time;
    let period = params.period as i64;
    let mut elapsed = top.timestamp - view[bottom].timestamp;
    if elapsed > period * 4 * t {
        elapsed = period * 4 * t;
    } else if elapsed < (period / 4) * t {
        elapsed = (period / 4) * t;
    }

    Ok(work * t as f64 / elapsed as f64)
}

#[cfg(test)]
mod tests {
    use super::{next_difficulty, BtcParams};
    use crate::{
        block::{Block, ChainView},
        chain::STARTING_BLOCKS,
        daa::{testutil::baseline_chain, DaaError},
    };

    const T: i64 = 600;

    #[test]
    fn carries_the_previous_difficulty_off_boundary() {
        let params = BtcParams::default();
        let mut chain = baseline_chain(STARTING_BLOCKS, T);
        chain.push(Block::new(STARTING_BLOCKS, 3.5, 0, true));

        for extra in 1..5 {
            let next =
                next_difficulty(&params, ChainView::Whole(&chain), T).unwrap();
            assert_eq!(next, 3.5, "{} blocks past the boundary", extra);
            chain.push(Block::new(chain.len(), next, 0, true));
        }
    }

    #[test]
    fn retargets_exactly_at_the_boundary() {
        let params = BtcParams::default();
        let chain = baseline_chain(STARTING_BLOCKS + params.period, T);

        let next =
            next_difficulty(&params, ChainView::Whole(&chain), T).unwrap();
        assert_eq!(next, 1.0);
    }

    #[test]
    fn disabling_the_fencepost_bug_widens_the_interval() {
        let params = BtcParams { off_by_one: false, ..Default::default() };
        let chain = baseline_chain(STARTING_BLOCKS + params.period, T);

        let next =
            next_difficulty(&params, ChainView::Whole(&chain), T).unwrap();
        let expected = (params.period - 1) as f64 / params.period as f64;
        assert!((next - expected).abs() < 1e-12);
    }

    #[test]
    fn slow_chains_hit_the_upper_clamp() {
        let params = BtcParams::default();
        // Ten times the target spacing: raw elapsed would be 10x the
        // period, well past the 4x clamp.
        let chain = baseline_chain(STARTING_BLOCKS + params.period, T * 10);

        let next =
            next_difficulty(&params, ChainView::Whole(&chain), T).unwrap();
        let clamped = (params.period - 1) as f64 / (params.period * 4) as f64;
        assert!((next - clamped).abs() < 1e-12);
    }

    #[test]
    fn fast_chains_hit_the_lower_clamp() {
        let params = BtcParams::default();
        // Spacing of zero seconds: raw elapsed underruns the clamp.
        let chain: Vec<Block> = (0..STARTING_BLOCKS + params.period)
            .map(|i| Block::new(i, 1.0, 0, true))
            .collect();

        let next =
            next_difficulty(&params, ChainView::Whole(&chain), T).unwrap();
        let floor = ((params.period / 4) as i64 * T) as f64;
        let expected = (params.period - 1) as f64 * T as f64 / floor;
        assert!((next - expected).abs() < 1e-12);
    }

    #[test]
    fn rejects_views_shorter_than_the_starting_prefix() {
        let params = BtcParams::default();
        let chain = baseline_chain(100, T);

        assert!(matches!(
            next_difficulty(&params, ChainView::Whole(&chain), T),
            Err(DaaError::ViewTooShort { .. }),
        ));
    }
}
