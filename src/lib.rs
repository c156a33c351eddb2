/*!
Monte Carlo simulator for selfish mining against proof-of-work
difficulty adjustment algorithms.

An honest majority and a single withholding attacker race as
independent Poisson processes over a simulated chain. The attacker
keeps found blocks on a private branch and publishes them to orphan
honest work; a pluggable difficulty adjustment algorithm (Bitcoin,
Bitcoin Cash, Dash, Monero, or Zcash) retargets both chains as they
grow. Each run reports how the attacker's share of accepted blocks and
time-adjusted revenue compare with its share of hashrate.

```
use selfish_sim::prelude::*;

let params = SimulationParams {
    alpha: 0.3,
    gamma: 0.5,
    timewarp: 0,
    num_blocks: 100,
    block_time: 600,
};

let output =
    run_one_simulation(&params, Daa::defaults(Algorithm::Btc), 7).unwrap();
println!("attacker share: {:.3}", output.result.win_ratio);
```

Simulations are deterministic in `(params, algorithm, seed)` and own
all of their state, so a [`sweep::Sweep`] runs them in parallel without
any cross-run coordination.
*/

pub mod block;
pub mod chain;
pub mod daa;
pub mod params;
pub mod prelude;
pub mod results;
pub mod scheduler;
pub mod simulation;
pub mod sweep;
