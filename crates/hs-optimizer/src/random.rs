//! Uniform random search over precomputed candidate pools.

use chrono::Utc;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use hs_types::{ExecutionParameterSet, HsResult, InputParameter, InputParameterSet, ParameterValue, ProcessResult};

use crate::expansion::{expand_space, ValuePools};
use crate::manager::{JobsTodo, ParameterManager};

/// Picks every parameter uniformly at random from its candidate pool.
///
/// Sampling is with replacement and the strategy keeps no memory of past
/// trials, so repeats are possible and invalid configurations may come
/// back. It never runs out of jobs.
#[derive(Debug, Clone)]
pub struct RandomSearchManager {
    space: InputParameterSet,
    pools: ValuePools,
    rng: ChaCha8Rng,
    seed: u64,
}

impl RandomSearchManager {
    /// Seeded from the wall clock. The seed is logged and available through
    /// [`RandomSearchManager::seed`] so a run can be replayed.
    pub fn new(space: InputParameterSet, sample_width: usize) -> HsResult<Self> {
        let seed = Utc::now().timestamp_millis() as u64;
        Self::with_seed(space, sample_width, seed)
    }

    pub fn with_seed(space: InputParameterSet, sample_width: usize, seed: u64) -> HsResult<Self> {
        space.validate()?;
        let pools = ValuePools::build(&space, sample_width)?;
        info!(
            "Created random search over {} parameters (sample width {}, seed {})",
            pools.len(),
            sample_width,
            seed
        );
        Ok(Self {
            space,
            pools,
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl ParameterManager for RandomSearchManager {
    fn name(&self) -> &'static str {
        "random"
    }

    fn has_jobs_to_explore(&self) -> bool {
        true
    }

    fn jobs_todo(&self) -> JobsTodo {
        JobsTodo::Unbounded
    }

    fn next_parameters(&mut self) -> HsResult<ExecutionParameterSet> {
        let Self { space, pools, rng, .. } = self;
        let mut pick = |param: &InputParameter| -> HsResult<ParameterValue> {
            let values = pools.values(&param.name)?;
            Ok(values[rng.gen_range(0..values.len())].clone())
        };
        let params = expand_space(space, &mut pick)?;
        debug!("Random search picked {}", params);
        Ok(params)
    }

    fn can_not_be_done_now(&mut self, _params: ExecutionParameterSet) {}

    fn update_observer(&mut self, _result: &ProcessResult) {}

    fn notify_invalid(&mut self, _params: &ExecutionParameterSet) {}
}
