//! Event timing for the two mining parties
//!
//! Block discovery is a Poisson process per party, with rate
//! `hashrate_fraction / (difficulty * expected_block_time)`. The
//! scheduler samples the exponential inter-arrival delays that drive
//! simulated time forward, plus the uniform draws behind every
//! Bernoulli trial.
//!
//! Delays and coins come from two independent seeded streams, so a
//! simulation replays bit-exactly from its seed regardless of how the
//! two kinds of draws interleave.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;
use rand_distr::{Distribution, Exp};

/// Delay stood in for a party with no effective hashrate. Only ever
/// compared against, never added to the clock: a party that "never"
/// finds a block cannot win the comparison.
const NEVER: i64 = i64::MAX;

/// Seeded source of inter-arrival delays and coin tosses.
#[derive(Debug, Clone)]
pub struct Scheduler {
    delays: ChaChaRng,
    coins: ChaChaRng,
}

impl Scheduler {
    pub fn new(seed: u64) -> Self {
        let mut delays = ChaChaRng::seed_from_u64(seed);
        delays.set_stream(0);
        let mut coins = ChaChaRng::seed_from_u64(seed);
        coins.set_stream(1);

        Scheduler { delays, coins }
    }

    /// One exponential inter-arrival delay at rate `lambda`, truncated
    /// to whole seconds.
    pub fn delay(&mut self, lambda: f64) -> i64 {
        if lambda <= 0.0 {
            return NEVER;
        }

        let exp = Exp::new(lambda).expect("rate is positive and finite");
        exp.sample(&mut self.delays) as i64
    }

    /// Delays for both parties, honest drawn first.
    pub fn delays(
        &mut self,
        lambda_honest: f64,
        lambda_selfish: f64,
    ) -> (i64, i64) {
        let honest = self.delay(lambda_honest);
        let selfish = self.delay(lambda_selfish);
        (honest, selfish)
    }

    /// Uniform draw from `[0, 1)` for Bernoulli trials.
    pub fn coin(&mut self) -> f64 {
        self.coins.gen()
    }
}
