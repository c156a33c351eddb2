//! The selfish-mining strategy and the event loop driving it
//!
//! One simulation races an honest majority against a single withholding
//! attacker until the public chain has grown by the configured number
//! of blocks *and* the attacker holds nothing back. Each tick samples
//! exponential delays for whichever parties are mining, advances the
//! clock by the winner's delay, mutates the chain, and re-derives the
//! strategy state from the post-fork work balance.

use log::debug;

use crate::{
    chain::{Blockchain, ChainError, ForkUpdate, STARTING_BLOCKS},
    daa::Daa,
    params::SimulationParams,
    results::SimulationResult,
    scheduler::Scheduler,
};

/// Position of the attacker's withheld branch relative to the public
/// chain, derived from post-fork work after every chain mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No withheld branch; everyone mines the public tip.
    NoBranch,
    /// The branch leads by exactly one public block's worth of work:
    /// an honest block would force a race.
    LeadOne,
    /// The branch leads by more than the next public block is worth.
    /// Covers every lead of two or larger.
    Lead,
    /// Both sides have equal post-fork work; the next block decides.
    Race,
}

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// A single run of the mining race.
#[derive(Debug, Clone)]
pub struct Simulation {
    chain: Blockchain,
    scheduler: Scheduler,
    alpha: f64,
    honest_ratio: f64,
    gamma: f64,
    timewarp: i64,
    num_sim_blocks: usize,
    real_time: i64,
    start_time: i64,
    state: State,
    /// Post-fork work on the withheld branch minus post-fork work on
    /// the public chain.
    work_lead: f64,
    /// What remains of `work_lead` if the honest majority wins the next
    /// public block.
    lead_margin: f64,
    num_reorgs: u64,
    sm_win_reorgs: u64,
}

/// Everything a finished simulation leaves behind.
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    pub chain: Blockchain,
    pub result: SimulationResult,
}

/// Runs one full simulation. Deterministic in `(params, daa, seed)`.
pub fn run_one_simulation(
    params: &SimulationParams,
    daa: Daa,
    seed: u64,
) -> Result<SimulationOutput, SimulationError> {
    Simulation::new(params, daa, seed).run()
}

impl Simulation {
    pub fn new(params: &SimulationParams, daa: Daa, seed: u64) -> Self {
        let chain = Blockchain::new(params.block_time, daa);
        let real_time = chain.time();

        Simulation {
            chain,
            scheduler: Scheduler::new(seed),
            alpha: params.alpha,
            honest_ratio: 1.0 - params.alpha,
            gamma: params.gamma,
            timewarp: params.timewarp,
            num_sim_blocks: params.num_blocks,
            real_time,
            start_time: STARTING_BLOCKS as i64 * params.block_time,
            state: State::NoBranch,
            work_lead: 0.0,
            lead_margin: 0.0,
            num_reorgs: 0,
            sm_win_reorgs: 0,
        }
    }

    /// Drives the race to completion and reports on it.
    pub fn run(mut self) -> Result<SimulationOutput, SimulationError> {
        let target_height = STARTING_BLOCKS + self.num_sim_blocks;

        while self.chain.height() < target_height
            || self.chain.private_len() > 0
        {
            match self.state {
                State::NoBranch => self.tick_no_branch()?,
                State::LeadOne => self.tick_lead_one()?,
                State::Lead => self.tick_lead()?,
                State::Race => self.tick_race()?,
            }
        }

        let result = self.finish();
        Ok(SimulationOutput { chain: self.chain, result })
    }

    /// Poisson rates for the two parties against their respective
    /// difficulties.
    fn lambdas(&self) -> (f64, f64) {
        let t = self.chain.expected_block_time() as f64;
        let honest =
            self.honest_ratio / (self.chain.next_public_difficulty() * t);
        let selfish =
            self.alpha / (self.chain.next_private_difficulty() * t);
        (honest, selfish)
    }

    /// Mints a withheld block, timestamped with the attacker's offset.
    fn mint_private(&mut self) -> Result<(), ChainError> {
        self.chain.new_private_block(self.real_time + self.timewarp)?;
        Ok(())
    }

    /// Both parties mine the public tip. One combined draw advances the
    /// clock, then a coin weighted by hashrate picks the finder.
    fn tick_no_branch(&mut self) -> Result<(), SimulationError> {
        self.chain.align_private_difficulty();

        let t = self.chain.expected_block_time() as f64;
        let lambda = 1.0 / (self.chain.next_public_difficulty() * t);
        self.real_time += self.scheduler.delay(lambda);

        if self.scheduler.coin() <= self.alpha {
            // The attacker found it and keeps it: a fork opens.
            self.chain.set_fork(ForkUpdate::AtTip);
            self.mint_private()?;
            self.recompute_state(false);
        } else {
            self.chain.new_public_block(self.real_time)?;
        }
        Ok(())
    }

    /// The attacker leads by one block's worth of work. An honest block
    /// now would level the race.
    fn tick_lead_one(&mut self) -> Result<(), SimulationError> {
        let (lambda_honest, lambda_selfish) = self.lambdas();
        let (honest, selfish) =
            self.scheduler.delays(lambda_honest, lambda_selfish);

        if selfish < honest {
            self.real_time += selfish;
            self.mint_private()?;
            self.recompute_state(false);
        } else {
            self.real_time += honest;
            self.chain.new_public_block(self.real_time)?;
            self.recompute_state(true);
        }
        Ok(())
    }

    /// The attacker leads by two or more. An honest block shrinks the
    /// lead; once the lead would not survive another honest block, the
    /// whole branch is published.
    fn tick_lead(&mut self) -> Result<(), SimulationError> {
        let (lambda_honest, lambda_selfish) = self.lambdas();
        let (honest, selfish) =
            self.scheduler.delays(lambda_honest, lambda_selfish);

        if selfish < honest {
            self.real_time += selfish;
            self.mint_private()?;
            self.recompute_state(false);
        } else {
            self.real_time += honest;
            self.chain.new_public_block(self.real_time)?;
            self.recompute_state(false);

            if self.lead_margin < 0.0 && self.chain.private_len() > 0 {
                self.chain.reorg()?;
                self.recompute_state(false);
            }
        }
        Ok(())
    }

    /// Equal work on both sides of the fork. The attacker wins by
    /// finding the next block; otherwise a `gamma`-weighted share of
    /// the honest network extends the attacker's published block.
    fn tick_race(&mut self) -> Result<(), SimulationError> {
        self.num_reorgs += 1;

        let (lambda_honest, lambda_selfish) = self.lambdas();
        let (honest, selfish) =
            self.scheduler.delays(lambda_honest, lambda_selfish);

        if selfish < honest {
            self.real_time += selfish;
            self.mint_private()?;
            self.chain.reorg()?;
            self.recompute_state(false);
            self.sm_win_reorgs += 1;
        } else if self.scheduler.coin() < self.gamma {
            // Honest block lands on the attacker's published branch.
            self.real_time += honest;
            self.chain.reorg()?;
            self.chain.new_public_block(self.real_time)?;
            self.chain.align_private_difficulty();
            self.chain.set_fork(ForkUpdate::Clear);
            self.recompute_state(false);
        } else {
            // Honest block extends the honest tip; the withheld branch
            // is worthless.
            self.real_time += honest;
            self.chain.new_public_block(self.real_time)?;
            self.chain.clear_private_branch();
            self.chain.align_private_difficulty();
            self.chain.set_fork(ForkUpdate::Clear);
            self.recompute_state(false);
        }
        Ok(())
    }

    /// Re-derives the strategy state from post-fork work. `force_race`
    /// pins the race state regardless of the work balance, as does a
    /// one-block lead evaporating to zero.
    fn recompute_state(&mut self, force_race: bool) {
        let (public_work, private_work) = self.chain.post_fork_work();
        self.work_lead = private_work - public_work;
        self.lead_margin =
            self.work_lead - self.chain.next_public_difficulty();

        let private_len = self.chain.private_len();
        let previous = self.state;

        self.state = if previous == State::LeadOne
            && private_len > 0
            && self.work_lead == 0.0
        {
            State::Race
        } else if force_race {
            State::Race
        } else if private_len == 0 {
            State::NoBranch
        } else if self.lead_margin < 0.0 {
            State::Race
        } else if self.lead_margin == 0.0 {
            State::LeadOne
        } else {
            State::Lead
        };

        debug!(
            "state {:?} -> {:?} (lead {:.4}, margin {:.4}, withheld {})",
            previous, self.state, self.work_lead, self.lead_margin,
            private_len,
        );
    }

    fn finish(&self) -> SimulationResult {
        let (selfish, _total, win_ratio) = self.chain.stats();

        let elapsed = self.real_time - self.start_time;
        let mined = (self.chain.height() - STARTING_BLOCKS) as i64;
        let time_ratio = elapsed as f64
            / (mined * self.chain.expected_block_time()) as f64;

        let adjusted_winning = win_ratio / time_ratio;
        let selfish_seconds_per_block = if selfish == 0 {
            -1.0
        } else {
            elapsed as f64 / selfish as f64
        };

        SimulationResult {
            win_ratio,
            adjusted_winning,
            selfish_seconds_per_block,
            relative_gain: (win_ratio - self.alpha) / self.alpha,
            adjusted_relative_gain: (adjusted_winning - self.alpha)
                / self.alpha,
            final_height: self.chain.height(),
            num_reorgs: self.num_reorgs,
            sm_win_reorgs: self.sm_win_reorgs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{run_one_simulation, Simulation, State};
    use crate::{
        chain::{ForkUpdate, STARTING_BLOCKS},
        daa::{Algorithm, Daa},
        params::SimulationParams,
        results,
    };

    fn params(algo: Algorithm, alpha: f64, gamma: f64) -> SimulationParams {
        SimulationParams {
            alpha,
            gamma,
            timewarp: 0,
            num_blocks: 5000,
            block_time: algo.default_block_time(),
        }
    }

    #[test]
    fn powerless_attacker_wins_nothing() {
        let params = params(Algorithm::Btc, 0.0, 0.0);
        let output =
            run_one_simulation(&params, Daa::defaults(Algorithm::Btc), 11)
                .unwrap();

        assert_eq!(output.result.win_ratio, 0.0);
        assert_eq!(output.result.num_reorgs, 0);
        assert_eq!(output.result.selfish_seconds_per_block, -1.0);
        assert_eq!(output.result.final_height, STARTING_BLOCKS + 5000);
        assert!(output.chain.public_chain().iter().all(|b| b.honest));
    }

    #[test]
    fn identical_seeds_replay_identically() {
        let params = SimulationParams {
            num_blocks: 500,
            ..params(Algorithm::Bch, 0.3, 0.5)
        };
        let daa = Daa::defaults(Algorithm::Bch);

        let a = run_one_simulation(&params, daa.clone(), 1234).unwrap();
        let b = run_one_simulation(&params, daa, 1234).unwrap();

        assert_eq!(a.result, b.result);
        assert_eq!(a.chain.height(), b.chain.height());
        assert_eq!(a.chain.public_chain(), b.chain.public_chain());
    }

    #[test]
    fn heights_stay_contiguous_through_a_full_run() {
        let params = SimulationParams {
            num_blocks: 800,
            ..params(Algorithm::Zec, 0.4, 0.5)
        };
        let output =
            run_one_simulation(&params, Daa::defaults(Algorithm::Zec), 5)
                .unwrap();

        for (i, block) in output.chain.public_chain().iter().enumerate() {
            assert_eq!(block.height, i);
        }
    }

    #[test]
    fn an_evaporated_one_block_lead_forces_a_race() {
        let params = params(Algorithm::Btc, 0.3, 0.0);
        let mut sim =
            Simulation::new(&params, Daa::defaults(Algorithm::Btc), 1);

        // One withheld block, then an honest block of equal work: the
        // post-fork lead is exactly zero.
        let now = sim.chain.time();
        sim.chain.set_fork(ForkUpdate::AtTip);
        sim.chain.new_private_block(now + 10).unwrap();
        sim.chain.new_public_block(now + 20).unwrap();
        sim.state = State::LeadOne;

        sim.recompute_state(false);
        assert_eq!(sim.state, State::Race);
        assert_eq!(sim.work_lead, 0.0);
    }

    #[test]
    fn majority_attacker_beats_its_hashrate() {
        // E2: at the critical hashrate the attacker's share of accepted
        // blocks must exceed the share of work it put in.
        let params = params(Algorithm::Btc, 0.5, 0.5);
        let output =
            run_one_simulation(&params, Daa::defaults(Algorithm::Btc), 22)
                .unwrap();

        assert!(
            output.result.win_ratio > 0.5,
            "win ratio {} not above alpha",
            output.result.win_ratio,
        );
        assert!(output.result.relative_gain > 0.0);
    }

    #[test]
    fn borderline_attacker_lands_near_its_hashrate() {
        // E3: below the profitability threshold with gamma 0, the
        // attacker's share stays close to alpha and the time-adjusted
        // share is no worse than the raw one.
        let params = params(Algorithm::Bch, 0.35, 0.0);
        let output =
            run_one_simulation(&params, Daa::defaults(Algorithm::Bch), 33)
                .unwrap();

        assert!((output.result.win_ratio - 0.35).abs() < 0.05);
        // Time adjustment credits the slowed chain back to the attacker;
        // the adjusted share must not fall materially below the raw one.
        assert!(
            output.result.adjusted_winning
                >= output.result.win_ratio * 0.97,
        );
    }

    #[test]
    fn timewarp_amplifies_the_adjusted_gain() {
        // E4: with the same seed, forward-dating withheld blocks lowers
        // the attacker's difficulty and lifts time-adjusted revenue.
        let honest_clock = params(Algorithm::Bch, 0.35, 0.0);
        let warped =
            SimulationParams { timewarp: 7200, ..honest_clock };
        let daa = Daa::defaults(Algorithm::Bch);

        let baseline =
            run_one_simulation(&honest_clock, daa.clone(), 33).unwrap();
        let shifted = run_one_simulation(&warped, daa, 33).unwrap();

        assert!(
            shifted.result.adjusted_relative_gain
                > baseline.result.adjusted_relative_gain,
        );
    }

    #[test]
    fn races_happen_and_are_sometimes_won() {
        // E5: a strong attacker with network support both enters and
        // wins races.
        let params = params(Algorithm::Zec, 0.4, 0.5);
        let output =
            run_one_simulation(&params, Daa::defaults(Algorithm::Zec), 44)
                .unwrap();

        assert!(output.result.num_reorgs > 0);
        assert!(output.result.sm_win_reorgs > 0);
    }

    #[test]
    fn outlier_trimming_smooths_the_difficulty_trace() {
        // E6: Monero's trimmed window reacts less sharply to attacker
        // timing than Bitcoin Cash's per-block rule at the same alpha.
        let run = |algo: Algorithm, seed: u64| {
            let params = params(algo, 0.3, 0.0);
            let output =
                run_one_simulation(&params, Daa::defaults(algo), seed)
                    .unwrap();
            let difficulties: Vec<f64> = output.chain.public_chain()
                [STARTING_BLOCKS..]
                .iter()
                .map(|b| b.difficulty)
                .collect();
            results::std_dev(&difficulties)
        };

        assert!(run(Algorithm::Xmr, 55) < run(Algorithm::Bch, 55));
    }
}
