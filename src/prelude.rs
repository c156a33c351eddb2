/*!
Re-export of common values and datatypes used for configuring and
running simulations. Must be imported manually.

```
use selfish_sim::prelude::*;
```
*/

use crate::{
    block, chain, daa, params, results, scheduler, simulation, sweep,
};

pub use block::{Block, ChainView};

pub use chain::{
    Blockchain, ChainError, ForkUpdate, BASELINE_DIFFICULTY, STARTING_BLOCKS,
};

pub use daa::{
    Algorithm, BchParams, BtcParams, Daa, DaaError, DashParams,
    ParamFileError, XmrParams, ZecParams, MIN_DIFFICULTY,
};

pub use params::{
    ConfigError, SimulationParams, SweepConfig, MAX_TIMEWARP, MIN_ALPHA,
};

pub use results::{
    CellResult, ResultsError, ResultsGroup, ResultsWriter, SimulationResult,
};

pub use scheduler::Scheduler;

pub use simulation::{
    run_one_simulation, Simulation, SimulationError, SimulationOutput, State,
};

pub use sweep::{Sweep, SweepError};
