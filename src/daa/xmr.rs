//! Monero's delayed, outlier-trimmed window retarget.

use serde::{Deserialize, Serialize};

use super::DaaError;
use crate::block::ChainView;

/// Parameters for the Monero retargeting rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XmrParams {
    /// Width of the examined window, in blocks.
    pub lookback: usize,
    /// Blocks between the window and the tip.
    pub delay: usize,
    /// Blocks dropped from each end of the window.
    pub outliers: usize,
}

impl Default for XmrParams {
    fn default() -> Self {
        XmrParams { lookback: 720, delay: 15, outliers: 60 }
    }
}

pub(super) fn next_difficulty(
    params: &XmrParams,
    view: ChainView<'_>,
    expected_block_time: i64,
) -> Result<f64, DaaError> {
    let len = view.len();
    let needed = params.lookback + params.delay + 1;
    if len < needed {
        return Err(DaaError::ViewTooShort { len, needed });
    }
    if params.lookback <= 2 * params.outliers {
        return Err(DaaError::TrimTooWide {
            len: params.lookback,
            trim: params.outliers,
        });
    }

    let height = len - 1;
    let start = height - params.lookback - params.delay;
    let end = height - params.delay;

    // Timestamps are trimmed after sorting; difficulties are trimmed by
    // position in the window as mined. The two trimmed sets need not
    // contain the same blocks.
    let mut timestamps: Vec<i64> =
        (start..end).map(|i| view[i].timestamp).collect();
    timestamps.sort_unstable();
    let trimmed = &timestamps[params.outliers..timestamps.len() - params.outliers];
    let timespan = trimmed[trimmed.len() - 1] - trimmed[0];

    let work =
        view.sum_difficulty(start + params.outliers..end - params.outliers);

    Ok(work * expected_block_time as f64 / timespan as f64)
}

#[cfg(test)]
mod tests {
    use super::{next_difficulty, XmrParams};
    use crate::{
        block::ChainView,
        chain::STARTING_BLOCKS,
        daa::{testutil::baseline_chain, DaaError},
    };

    const T: i64 = 120;

    #[test]
    fn steady_chain_stays_near_baseline() {
        let params = XmrParams::default();
        let chain = baseline_chain(STARTING_BLOCKS, T);

        let next =
            next_difficulty(&params, ChainView::Whole(&chain), T).unwrap();
        // 600 blocks of work over 599 block gaps.
        let expected = 600.0 / 599.0;
        assert!((next - expected).abs() < 1e-9);
    }

    #[test]
    fn trimming_discards_timestamp_outliers() {
        let params = XmrParams::default();
        let mut wild = baseline_chain(STARTING_BLOCKS, T);
        // Date the newest few window blocks wildly forward; fewer than
        // `outliers`, so every one of them lands in the trimmed tail and
        // the measured span cannot change.
        let height = wild.len() - 1;
        let end = height - params.delay;
        for block in &mut wild[end - 10..end] {
            block.timestamp += 1_000_000;
        }

        let plain = baseline_chain(STARTING_BLOCKS, T);
        let a = next_difficulty(&params, ChainView::Whole(&plain), T).unwrap();
        let b = next_difficulty(&params, ChainView::Whole(&wild), T).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn difficulties_are_trimmed_by_position_not_value() {
        let params = XmrParams::default();
        let mut chain = baseline_chain(STARTING_BLOCKS, T);
        // A spike inside the trimmed margin of the window is dropped no
        // matter how large it is...
        let height = chain.len() - 1;
        let start = height - params.lookback - params.delay;
        chain[start + 10].difficulty = 1_000.0;

        let next =
            next_difficulty(&params, ChainView::Whole(&chain), T).unwrap();
        assert!((next - 600.0 / 599.0).abs() < 1e-9);

        // ...while the same spike mid-window is counted in full.
        chain[start + 10].difficulty = 1.0;
        chain[start + 300].difficulty = 1_000.0;

        let spiked =
            next_difficulty(&params, ChainView::Whole(&chain), T).unwrap();
        assert!((spiked - 1599.0 / 599.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_short_views() {
        let params = XmrParams::default();
        let chain = baseline_chain(700, T);

        assert!(matches!(
            next_difficulty(&params, ChainView::Whole(&chain), T),
            Err(DaaError::ViewTooShort { len: 700, needed: 736 }),
        ));
    }

    #[test]
    fn rejects_degenerate_trim_widths() {
        let params = XmrParams { lookback: 100, outliers: 50, delay: 15 };
        let chain = baseline_chain(STARTING_BLOCKS, T);

        assert!(matches!(
            next_difficulty(&params, ChainView::Whole(&chain), T),
            Err(DaaError::TrimTooWide { len: 100, trim: 50 }),
        ));
    }

    #[test]
    fn window_sits_behind_the_delay() {
        let params = XmrParams::default();
        let mut chain = baseline_chain(STARTING_BLOCKS, T);
        // Difficulty inside the delay gap must not influence the result.
        let len = chain.len();
        for block in &mut chain[len - 10..] {
            block.difficulty = 500.0;
        }

        let next =
            next_difficulty(&params, ChainView::Whole(&chain), T).unwrap();
        assert!((next - 600.0 / 599.0).abs() < 1e-9);
    }
}
