//! Definitions for blocks and chain views

use std::ops::{Index, Range};

use log::warn;

/// A mined block. Immutable once constructed.
///
/// `difficulty` is relative work, with `1.0` as the baseline the chain
/// starts from. Timestamps are whole seconds since the genesis block and
/// are *not* required to be monotone: an attacker may date a withheld
/// block ahead of the public tip, and two parties can find blocks within
/// the same second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Block {
    /// Height of this block on its chain.
    pub height: usize,
    /// Relative amount of work this block represents.
    pub difficulty: f64,
    /// Seconds since genesis.
    pub timestamp: i64,
    /// Whether the honest majority mined this block.
    pub honest: bool,
}

impl Block {
    pub fn new(
        height: usize,
        difficulty: f64,
        timestamp: i64,
        honest: bool,
    ) -> Self {
        Block { height, difficulty, timestamp, honest }
    }
}

/// Read-only view of a chain, indexed by height.
///
/// Difficulty algorithms only ever read contiguous spans of whichever
/// chain they are retargeting, so the private view (public prefix up to
/// the fork plus the withheld branch) is presented without copying
/// either side. Both variants satisfy `view[i].height == i`.
#[derive(Debug, Clone, Copy)]
pub enum ChainView<'a> {
    /// The public chain as-is.
    Whole(&'a [Block]),
    /// `base` is the public prefix up to and including the fork point;
    /// `branch` is the private branch stacked on top of it.
    Forked { base: &'a [Block], branch: &'a [Block] },
}

impl ChainView<'_> {
    pub fn len(&self) -> usize {
        match self {
            Self::Whole(blocks) => blocks.len(),
            Self::Forked { base, branch } => base.len() + branch.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The highest block in the view.
    ///
    /// # Panics
    /// Panics if the view is empty.
    pub fn tip(&self) -> &Block {
        &self[self.len() - 1]
    }

    /// Total work over `range`.
    pub fn sum_difficulty(&self, range: Range<usize>) -> f64 {
        range.map(|i| self[i].difficulty).sum()
    }

    /// The block in `range` carrying the median timestamp of the range,
    /// where the median of an even-sized set is the upper of its two
    /// middle values.
    ///
    /// # Panics
    /// Panics if `range` is empty.
    pub fn median_by_timestamp(&self, range: Range<usize>) -> &Block {
        assert!(!range.is_empty(), "median of an empty block range");

        let mut timestamps: Vec<i64> =
            range.clone().map(|i| self[i].timestamp).collect();
        timestamps.sort_unstable();

        self.block_with_timestamp(range, timestamps[timestamps.len() / 2])
    }

    /// The first block in `range` whose timestamp equals `timestamp`.
    /// If no block matches, logs a warning and falls back to the first
    /// block of the range.
    pub fn block_with_timestamp(
        &self,
        range: Range<usize>,
        timestamp: i64,
    ) -> &Block {
        let start = range.start;
        for i in range {
            if self[i].timestamp == timestamp {
                return &self[i];
            }
        }

        warn!(
            "no block with timestamp {} at or above height {}; \
             using the window start",
            timestamp, start,
        );
        &self[start]
    }
}

impl Index<usize> for ChainView<'_> {
    type Output = Block;

    fn index(&self, index: usize) -> &Block {
        match self {
            Self::Whole(blocks) => &blocks[index],
            Self::Forked { base, branch } => {
                if index < base.len() {
                    &base[index]
                } else {
                    &branch[index - base.len()]
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::ops::Range;

    use super::{Block, ChainView};

    fn blocks(heights: Range<usize>, step: i64) -> Vec<Block> {
        heights.map(|h| Block::new(h, 1.0, h as i64 * step, true)).collect()
    }

    #[test]
    fn forked_view_indexes_across_the_seam() {
        let base = blocks(0..5, 600);
        let branch = blocks(5..8, 600);
        let view = ChainView::Forked { base: &base, branch: &branch };

        assert_eq!(view.len(), 8);
        for i in 0..view.len() {
            assert_eq!(view[i].height, i);
        }
        assert_eq!(view.tip().height, 7);
    }

    #[test]
    fn sum_spans_the_seam() {
        let base = blocks(0..5, 600);
        let branch = blocks(5..8, 600);
        let view = ChainView::Forked { base: &base, branch: &branch };

        assert_eq!(view.sum_difficulty(3..8), 5.0);
    }

    #[test]
    fn median_of_odd_window() {
        let chain = blocks(0..9, 600);
        let view = ChainView::Whole(&chain);

        assert_eq!(view.median_by_timestamp(2..7).height, 4);
    }

    #[test]
    fn median_of_even_window_takes_the_upper_middle() {
        let chain = blocks(0..10, 600);
        let view = ChainView::Whole(&chain);

        assert_eq!(view.median_by_timestamp(0..4).height, 2);
    }

    #[test]
    fn missing_timestamp_falls_back_to_window_start() {
        let chain = blocks(0..6, 600);
        let view = ChainView::Whole(&chain);

        let block = view.block_with_timestamp(2..5, 999_999);
        assert_eq!(block.height, 2);
    }
}
