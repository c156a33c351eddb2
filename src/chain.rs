//! The blockchain store: a public chain plus the attacker's withheld
//! branch, with the fork bookkeeping and reorg primitives that connect
//! them.

use log::debug;

use crate::{
    block::{Block, ChainView},
    daa::{Daa, DaaError},
};

/// Difficulty every starting-prefix block carries.
pub const BASELINE_DIFFICULTY: f64 = 1.0;

/// Number of baseline blocks the chain is seeded with. Large enough to
/// cover the longest lookback of any difficulty algorithm.
pub const STARTING_BLOCKS: usize = 3000;

/// A public chain and the private branch forked off it.
///
/// The public chain always satisfies `public[i].height == i`. When the
/// private branch is non-empty it starts at `fork_height + 1` and is
/// itself contiguous. `fork_height == 0` means no fork is active.
#[derive(Debug, Clone)]
pub struct Blockchain {
    public: Vec<Block>,
    private: Vec<Block>,
    fork_height: usize,
    fork_history: Vec<usize>,
    time: i64,
    next_public_difficulty: f64,
    next_private_difficulty: f64,
    expected_block_time: i64,
    daa: Daa,
}

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("pushed block at height {got} where the public tip expects {expected}")]
    HeightMismatch { expected: usize, got: usize },
    #[error(transparent)]
    Daa(#[from] DaaError),
}

/// How [`Blockchain::set_fork`] moves the fork point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkUpdate {
    /// The fork is resolved; clear it.
    Clear,
    /// A fork just opened at the current public tip.
    AtTip,
    /// Move the fork point up by the given number of heights.
    Advance(usize),
}

impl Blockchain {
    /// Creates a chain seeded with [`STARTING_BLOCKS`] baseline blocks
    /// spaced exactly `expected_block_time` seconds apart.
    pub fn new(expected_block_time: i64, daa: Daa) -> Self {
        let mut chain = Blockchain {
            public: Vec::new(),
            private: Vec::new(),
            fork_height: 0,
            fork_history: Vec::new(),
            time: 0,
            next_public_difficulty: 0.0,
            next_private_difficulty: 0.0,
            expected_block_time,
            daa,
        };
        chain.init();
        chain
    }

    fn init(&mut self) {
        for i in 0..STARTING_BLOCKS {
            self.public.push(Block::new(
                i,
                BASELINE_DIFFICULTY,
                i as i64 * self.expected_block_time,
                true,
            ));
        }
        self.time = self.public[STARTING_BLOCKS - 1].timestamp;
        self.fork_height = 0;
        self.next_public_difficulty = BASELINE_DIFFICULTY;
        self.next_private_difficulty = BASELINE_DIFFICULTY;
    }

    /// Discards all history and returns to the freshly seeded state.
    pub fn reset(&mut self) {
        self.public.clear();
        self.private.clear();
        self.fork_history.clear();
        self.init();
    }

    /// Height of the public tip.
    pub fn height(&self) -> usize {
        self.public.len() - 1
    }

    /// Timestamp of the most recently pushed block on either chain.
    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn tip(&self) -> &Block {
        self.public.last().expect("the chain is never empty")
    }

    pub fn private_len(&self) -> usize {
        self.private.len()
    }

    pub fn fork_height(&self) -> usize {
        self.fork_height
    }

    /// Every value the fork point has taken, in order. Diagnostic only.
    pub fn fork_history(&self) -> &[usize] {
        &self.fork_history
    }

    pub fn next_public_difficulty(&self) -> f64 {
        self.next_public_difficulty
    }

    pub fn next_private_difficulty(&self) -> f64 {
        self.next_private_difficulty
    }

    pub fn expected_block_time(&self) -> i64 {
        self.expected_block_time
    }

    pub fn public_chain(&self) -> &[Block] {
        &self.public
    }

    pub fn private_branch(&self) -> &[Block] {
        &self.private
    }

    /// Makes the attacker mine against the public difficulty. Used when
    /// both parties work on the same tip and after lost races.
    pub fn align_private_difficulty(&mut self) {
        self.next_private_difficulty = self.next_public_difficulty;
    }

    /// Counts blocks past the starting prefix:
    /// `(selfish, total, selfish / total)`.
    pub fn stats(&self) -> (usize, usize, f64) {
        let mined = &self.public[STARTING_BLOCKS.min(self.public.len())..];
        let selfish = mined.iter().filter(|block| !block.honest).count();
        let total = mined.len();

        let win_ratio =
            if total == 0 { 0.0 } else { selfish as f64 / total as f64 };
        (selfish, total, win_ratio)
    }

    /// Appends `block` to the public chain.
    pub fn push_public(&mut self, block: Block) -> Result<(), ChainError> {
        let expected = self.public.len();
        if block.height != expected {
            return Err(ChainError::HeightMismatch {
                expected,
                got: block.height,
            });
        }

        self.time = block.timestamp;
        self.public.push(block);
        Ok(())
    }

    /// Appends `block` to the private branch.
    pub fn push_private(&mut self, block: Block) {
        self.time = block.timestamp;
        self.private.push(block);
    }

    /// Removes and returns the public tip, or `None` at genesis.
    pub fn pop_public_tip(&mut self) -> Option<Block> {
        if self.public.len() > 1 {
            self.public.pop()
        } else {
            None
        }
    }

    /// Removes and returns the newest private block.
    pub fn pop_private_tip(&mut self) -> Option<Block> {
        self.private.pop()
    }

    /// Removes and returns the *oldest* private block.
    pub fn pop_private_head(&mut self) -> Option<Block> {
        if self.private.is_empty() {
            None
        } else {
            Some(self.private.remove(0))
        }
    }

    /// Drops the entire private branch.
    pub fn clear_private_branch(&mut self) {
        self.private.clear();
    }

    /// Work accumulated past the fork point on each side:
    /// `(public, private)`. Both are zero when no fork is active.
    pub fn post_fork_work(&self) -> (f64, f64) {
        if self.fork_height == 0 {
            return (0.0, 0.0);
        }

        let public: f64 = self.public[self.fork_height + 1..]
            .iter()
            .map(|block| block.difficulty)
            .sum();
        let private: f64 =
            self.private.iter().map(|block| block.difficulty).sum();

        (public, private)
    }

    /// Moves the fork point and records it in the fork history.
    pub fn set_fork(&mut self, update: ForkUpdate) {
        self.fork_height = match update {
            ForkUpdate::Clear => 0,
            ForkUpdate::AtTip => self.height(),
            ForkUpdate::Advance(by) => self.fork_height + by,
        };
        self.fork_history.push(self.fork_height);
    }

    /// The chain as the attacker sees it: the public prefix up to the
    /// fork point with the private branch on top.
    pub fn private_view(&self) -> ChainView<'_> {
        ChainView::Forked {
            base: &self.public[..=self.fork_height],
            branch: &self.private,
        }
    }

    pub fn public_view(&self) -> ChainView<'_> {
        ChainView::Whole(&self.public)
    }

    /// Mints an honest block at the public tip and retargets the public
    /// difficulty.
    pub fn new_public_block(
        &mut self,
        timestamp: i64,
    ) -> Result<Block, ChainError> {
        let block = Block::new(
            self.height() + 1,
            self.next_public_difficulty,
            timestamp,
            true,
        );
        self.push_public(block)?;
        self.recompute_difficulty(false)?;
        Ok(block)
    }

    /// Mints an attacker block on top of the private branch (or at the
    /// public tip if the branch is empty) and retargets the private
    /// difficulty.
    pub fn new_private_block(
        &mut self,
        timestamp: i64,
    ) -> Result<Block, ChainError> {
        let height = match self.private.last() {
            Some(tip) => tip.height + 1,
            None => self.height() + 1,
        };

        let block = Block::new(
            height,
            self.next_private_difficulty,
            timestamp,
            false,
        );
        self.push_private(block);
        self.recompute_difficulty(true)?;
        Ok(block)
    }

    /// Replaces everything past the fork point with the private branch.
    ///
    /// Public blocks above the fork are orphaned, the branch lands on
    /// the public chain oldest-first, the fork is cleared, and the
    /// public difficulty adopts the private one.
    pub fn reorg(&mut self) -> Result<(), ChainError> {
        let orphaned = self.height() - self.fork_height;
        debug!(
            "reorg: orphaning {} public blocks for {} private ones at fork \
             height {}",
            orphaned,
            self.private.len(),
            self.fork_height,
        );

        for _ in 0..orphaned {
            let _ = self.pop_public_tip();
        }
        while let Some(block) = self.pop_private_head() {
            self.push_public(block)?;
        }

        self.set_fork(ForkUpdate::Clear);
        self.next_public_difficulty = self.next_private_difficulty;
        Ok(())
    }

    /// Publishes a two-block lead during a race: the public tip is
    /// orphaned, the two oldest private blocks take its place, and a
    /// fresh fork opens at the new tip for whatever the branch still
    /// holds.
    pub fn reorg_race(&mut self) -> Result<(), ChainError> {
        debug!(
            "race reorg at public height {} with {} private blocks",
            self.height(),
            self.private.len(),
        );

        let _ = self.pop_public_tip();
        for _ in 0..2 {
            let block = self
                .pop_private_head()
                .expect("a race publish requires two private blocks");
            self.push_public(block)?;
        }

        self.set_fork(ForkUpdate::AtTip);
        self.recompute_difficulty(false)?;
        Ok(())
    }

    /// Recomputes the next difficulty for one side of the fork.
    pub fn recompute_difficulty(
        &mut self,
        private: bool,
    ) -> Result<(), DaaError> {
        let view =
            if private { self.private_view() } else { self.public_view() };
        let next = self.daa.next_difficulty(view, self.expected_block_time)?;

        if private {
            self.next_private_difficulty = next;
        } else {
            self.next_public_difficulty = next;
        }
        Ok(())
    }
}
