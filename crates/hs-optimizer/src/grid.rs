//! Exhaustive grid search over the conditional parameter tree.

use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};

use hs_types::{
    config_error, ExecutionParameter, ExecutionParameterSet, HsError, HsResult, InputParameter,
    InputParameterSet, ProcessResult,
};

use crate::expansion::ValuePools;
use crate::manager::{JobsTodo, ParameterManager};

/// Enumerates every configuration of the space once.
///
/// Refused dispatches are retried before fresh configurations, and
/// configurations reported invalid are never handed out again.
#[derive(Debug, Clone)]
pub struct GridSearchManager {
    pending: VecDeque<ExecutionParameterSet>,
    retry: VecDeque<ExecutionParameterSet>,
    excluded: HashSet<ExecutionParameterSet>,
    total: usize,
    completed: usize,
}

impl GridSearchManager {
    pub fn new(space: InputParameterSet, sample_width: usize, max_combinations: usize) -> HsResult<Self> {
        space.validate()?;
        let pools = ValuePools::build(&space, sample_width)?;
        let combos = build_grid(&space, &pools, max_combinations)?;
        info!(
            "Created grid search with {} configurations (sample width {})",
            combos.len(),
            sample_width
        );
        Ok(Self {
            total: combos.len(),
            pending: combos.into(),
            retry: VecDeque::new(),
            excluded: HashSet::new(),
            completed: 0,
        })
    }

    /// Size of the full grid.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Results fed back so far.
    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn excluded(&self) -> usize {
        self.excluded.len()
    }
}

impl ParameterManager for GridSearchManager {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn has_jobs_to_explore(&self) -> bool {
        !self.retry.is_empty() || !self.pending.is_empty()
    }

    fn jobs_todo(&self) -> JobsTodo {
        JobsTodo::Known(self.retry.len() + self.pending.len())
    }

    fn next_parameters(&mut self) -> HsResult<ExecutionParameterSet> {
        while let Some(params) = self.retry.pop_front().or_else(|| self.pending.pop_front()) {
            if !self.excluded.contains(&params) {
                return Ok(params);
            }
        }
        debug!("Grid search exhausted after {} completed trials", self.completed);
        Err(HsError::NoJobsLeft)
    }

    fn can_not_be_done_now(&mut self, params: ExecutionParameterSet) {
        if self.excluded.contains(&params) {
            return;
        }
        debug!("Requeueing refused configuration {}", params);
        self.retry.push_back(params);
    }

    fn update_observer(&mut self, _result: &ProcessResult) {
        self.completed += 1;
    }

    fn notify_invalid(&mut self, params: &ExecutionParameterSet) {
        warn!("Excluding invalid configuration {}", params);
        self.retry.retain(|p| p != params);
        self.pending.retain(|p| p != params);
        self.excluded.insert(params.clone());
    }
}

/// Cartesian product of the independent parameters' expansions.
fn build_grid(space: &InputParameterSet, pools: &ValuePools, limit: usize) -> HsResult<Vec<ExecutionParameterSet>> {
    let mut grid = vec![ExecutionParameterSet::from_parts(Vec::new(), true)?];
    for param in space.independent_parameters() {
        let options = enumerate_parameter(param, pools, limit)?;
        grid = cartesian(grid, &options, limit)?;
    }
    Ok(grid)
}

/// Every assignment of `param` and the sub-parameters each value activates.
fn enumerate_parameter(
    param: &InputParameter,
    pools: &ValuePools,
    limit: usize,
) -> HsResult<Vec<ExecutionParameterSet>> {
    let mut out = Vec::new();
    for value in pools.values(&param.name)? {
        let mut own = ExecutionParameterSet::new();
        own.add(ExecutionParameter::new(param.name.clone(), value.clone()))?;
        let mut combos = vec![own];
        for sub_param in param.associated_sub_params(value) {
            let options = enumerate_parameter(sub_param, pools, limit)?;
            combos = cartesian(combos, &options, limit)?;
        }
        if out.len() + combos.len() > limit {
            return Err(too_large(limit));
        }
        out.extend(combos);
    }
    Ok(out)
}

fn cartesian(
    left: Vec<ExecutionParameterSet>,
    right: &[ExecutionParameterSet],
    limit: usize,
) -> HsResult<Vec<ExecutionParameterSet>> {
    let size = left
        .len()
        .checked_mul(right.len())
        .filter(|n| *n <= limit)
        .ok_or_else(|| too_large(limit))?;
    let mut next = Vec::with_capacity(size);
    for existing in &left {
        for option in right {
            let mut combo = existing.clone();
            combo.merge(option.clone())?;
            next.push(combo);
        }
    }
    Ok(next)
}

fn too_large(limit: usize) -> HsError {
    config_error!("grid exceeds {limit} configurations; lower the sample width or raise max_combinations")
}
