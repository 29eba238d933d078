//! Expansion of input parameters into concrete execution parameter sets.

use std::collections::BTreeMap;

use hs_types::{
    config_error, ExecutionParameter, ExecutionParameterSet, HsResult, InputParameter,
    InputParameterSet, ParameterName, ParameterValue,
};

/// Chooses the concrete value of one parameter during expansion.
pub trait ValuePicker {
    fn pick(&mut self, param: &InputParameter) -> HsResult<ParameterValue>;
}

impl<F> ValuePicker for F
where
    F: FnMut(&InputParameter) -> HsResult<ParameterValue>,
{
    fn pick(&mut self, param: &InputParameter) -> HsResult<ParameterValue> {
        self(param)
    }
}

/// Pick a value for `param` and recursively expand the sub-parameters that
/// value activates. The result holds `param` and every activated descendant.
pub fn expand_parameter<P>(param: &InputParameter, picker: &mut P) -> HsResult<ExecutionParameterSet>
where
    P: ValuePicker + ?Sized,
{
    let value = picker.pick(param)?;
    let mut set = ExecutionParameterSet::new();
    set.add(ExecutionParameter::new(param.name.clone(), value.clone()))?;
    for sub_param in param.associated_sub_params(&value) {
        set.merge(expand_parameter(sub_param, picker)?)?;
    }
    Ok(set)
}

/// Expand every independent parameter of `space` into one root set.
pub fn expand_space<P>(space: &InputParameterSet, picker: &mut P) -> HsResult<ExecutionParameterSet>
where
    P: ValuePicker + ?Sized,
{
    let parts = space
        .independent_parameters()
        .map(|param| expand_parameter(param, picker))
        .collect::<HsResult<Vec<_>>>()?;
    ExecutionParameterSet::from_parts(parts, true)
}

/// Precomputed candidate values per parameter name.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuePools {
    pools: BTreeMap<ParameterName, Vec<ParameterValue>>,
}

impl ValuePools {
    /// Largest finite domain enumerated in full; wider integer ranges are
    /// sampled like continuous ones.
    pub const MAX_ENUMERATED: usize = 100_000;

    /// Build one pool per parameter of the space: all values of finite
    /// domains, `sample_width` values of continuous or very wide ones, plus
    /// every branch key so that each branch can be activated. Fails if any
    /// pool comes out empty.
    pub fn build(space: &InputParameterSet, sample_width: usize) -> HsResult<Self> {
        let mut pools = BTreeMap::new();
        for param in space.all_parameters() {
            let width = match param.cardinality() {
                Some(n) if n <= Self::MAX_ENUMERATED => n,
                _ => sample_width,
            };
            let values = param.possible_values(width);
            if values.is_empty() {
                return Err(config_error!(
                    "parameter {} produces no candidate values (width {width})",
                    param.name
                ));
            }
            pools.insert(param.name.clone(), values);
        }

        let mut stack: Vec<&InputParameter> = space.parameters.iter().collect();
        while let Some(param) = stack.pop() {
            for branch in &param.branches {
                if let Some(pool) = pools.get_mut(&param.name) {
                    if !pool.contains(&branch.value) {
                        pool.push(branch.value.clone());
                    }
                }
                stack.extend(branch.parameters.iter());
            }
        }
        Ok(Self { pools })
    }

    pub fn values(&self, name: &ParameterName) -> HsResult<&[ParameterValue]> {
        match self.pools.get(name) {
            Some(values) if !values.is_empty() => Ok(values),
            _ => Err(config_error!("no candidate values for parameter {name}")),
        }
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}
