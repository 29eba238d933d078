//! The parameter manager contract and its configuration-driven factory.

use serde::{Deserialize, Serialize};
use std::fmt;

use hs_types::{ExecutionParameterSet, HsResult, InputParameterSet, ProcessResult};

use crate::grid::GridSearchManager;
use crate::random::RandomSearchManager;

/// Estimate of the trials a manager can still produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobsTodo {
    Known(usize),
    /// Open-ended strategy; not usable to size a progress bar.
    Unbounded,
}

impl JobsTodo {
    /// Integer form where `-1` stands for [`JobsTodo::Unbounded`].
    pub fn as_sentinel(self) -> i64 {
        match self {
            JobsTodo::Known(n) => i64::try_from(n).unwrap_or(i64::MAX),
            JobsTodo::Unbounded => -1,
        }
    }

    pub fn known(self) -> Option<usize> {
        match self {
            JobsTodo::Known(n) => Some(n),
            JobsTodo::Unbounded => None,
        }
    }
}

impl fmt::Display for JobsTodo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobsTodo::Known(n) => write!(f, "{n}"),
            JobsTodo::Unbounded => f.write_str("?"),
        }
    }
}

/// Exploration strategy over a whole input parameter space.
///
/// Every strategy states explicitly what it does with feedback; strategies
/// without memory implement the feedback methods as no-ops.
pub trait ParameterManager: Send {
    /// Human-readable strategy name.
    fn name(&self) -> &'static str;

    /// Whether more trials could still be generated.
    fn has_jobs_to_explore(&self) -> bool;

    /// Remaining trials, when the strategy can tell.
    fn jobs_todo(&self) -> JobsTodo;

    /// Full configuration of the next trial, built from every independent
    /// parameter.
    fn next_parameters(&mut self) -> HsResult<ExecutionParameterSet>;

    /// The execution environment refused to dispatch `params` for now.
    fn can_not_be_done_now(&mut self, params: ExecutionParameterSet);

    /// A trial finished; adaptive strategies learn from it.
    fn update_observer(&mut self, result: &ProcessResult);

    /// `params` is structurally invalid and should not be generated again.
    fn notify_invalid(&mut self, params: &ExecutionParameterSet);
}

fn default_sample_width() -> usize {
    10
}

fn default_max_combinations() -> usize {
    100_000
}

/// Strategy selection. [`ManagerConfig::build`] is the only way managers
/// are constructed from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ManagerConfig {
    /// Uniform random choice from per-parameter candidate pools.
    Random {
        /// Pool width for continuous domains.
        #[serde(default = "default_sample_width")]
        sample_width: usize,
        /// Explicit seed; the wall clock is used when absent.
        #[serde(default)]
        seed: Option<u64>,
    },
    /// Exhaustive enumeration of the conditional tree.
    Grid {
        #[serde(default = "default_sample_width")]
        sample_width: usize,
        #[serde(default = "default_max_combinations")]
        max_combinations: usize,
    },
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfig::Random {
            sample_width: default_sample_width(),
            seed: None,
        }
    }
}

impl ManagerConfig {
    pub fn build(&self, space: InputParameterSet) -> HsResult<Box<dyn ParameterManager>> {
        let manager: Box<dyn ParameterManager> = match self {
            ManagerConfig::Random { sample_width, seed } => match seed {
                Some(seed) => Box::new(RandomSearchManager::with_seed(space, *sample_width, *seed)?),
                None => Box::new(RandomSearchManager::new(space, *sample_width)?),
            },
            ManagerConfig::Grid {
                sample_width,
                max_combinations,
            } => Box::new(GridSearchManager::new(space, *sample_width, *max_combinations)?),
        };
        Ok(manager)
    }
}
