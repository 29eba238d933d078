//! Declarative parameter space: domains, conditional sub-parameters and the
//! full input parameter set.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config_error;
use crate::errors::HsResult;
use crate::parameters::{ParameterName, ParameterValue};

/// Describes the values a parameter can take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Domain {
    /// Categorical choices.
    Choice { values: Vec<ParameterValue> },
    /// Integer range [low, high] inclusive.
    IntRange { low: i64, high: i64 },
    /// Continuous range [low, high].
    FloatRange { low: f64, high: f64 },
    /// Continuous range [low, high] spaced in log-space.
    LogUniform { low: f64, high: f64 },
}

impl Domain {
    /// Number of distinct values for enumerable domains, `None` for
    /// continuous ones.
    pub fn cardinality(&self) -> Option<usize> {
        match self {
            Domain::Choice { values } => Some(values.len()),
            Domain::IntRange { low, high } => {
                if high < low {
                    Some(0)
                } else {
                    usize::try_from(high.abs_diff(*low)).ok()?.checked_add(1)
                }
            }
            Domain::FloatRange { .. } | Domain::LogUniform { .. } => None,
        }
    }

    /// Up to `k` concrete values of this domain.
    ///
    /// Enumerable domains yield their own values (an evenly spaced subset of
    /// an integer range when `k` is smaller than it); continuous ranges yield
    /// `k` evenly spaced points including both bounds.
    pub fn possible_values(&self, k: usize) -> Vec<ParameterValue> {
        if k == 0 {
            return Vec::new();
        }
        match self {
            Domain::Choice { values } => values.iter().take(k).cloned().collect(),
            Domain::IntRange { low, high } => {
                if high < low {
                    return Vec::new();
                }
                let size = self.cardinality().unwrap_or(usize::MAX);
                if k >= size {
                    return (*low..=*high).map(ParameterValue::Int).collect();
                }
                let mut values: Vec<ParameterValue> = linspace(*low as f64, *high as f64, k)
                    .into_iter()
                    .map(|v| ParameterValue::Int(v.round() as i64))
                    .collect();
                values.dedup();
                values
            }
            Domain::FloatRange { low, high } => {
                let mut values: Vec<ParameterValue> = linspace(*low, *high, k)
                    .into_iter()
                    .map(ParameterValue::Float)
                    .collect();
                values.dedup();
                values
            }
            Domain::LogUniform { low, high } => {
                if *low <= 0.0 || *high <= 0.0 {
                    return Vec::new();
                }
                let mut values: Vec<ParameterValue> = linspace(low.ln(), high.ln(), k)
                    .into_iter()
                    .map(|v| ParameterValue::Float(v.exp().clamp(*low, *high)))
                    .collect();
                values.dedup();
                values
            }
        }
    }

    /// Whether `value` belongs to this domain.
    pub fn contains(&self, value: &ParameterValue) -> bool {
        match (self, value) {
            (Domain::Choice { values }, v) => values.contains(v),
            (Domain::IntRange { low, high }, ParameterValue::Int(v)) => low <= v && v <= high,
            (Domain::FloatRange { low, high } | Domain::LogUniform { low, high }, v) => match v {
                ParameterValue::Float(_) | ParameterValue::Int(_) => v
                    .as_f64()
                    .map(|x| *low <= x && x <= *high)
                    .unwrap_or(false),
                _ => false,
            },
            _ => false,
        }
    }

    fn validate(&self, name: &ParameterName) -> HsResult<()> {
        match self {
            Domain::Choice { values } if values.is_empty() => {
                Err(config_error!("parameter {name} has no choices"))
            }
            Domain::IntRange { low, high } if high < low => {
                Err(config_error!("parameter {name} has an empty range [{low}, {high}]"))
            }
            Domain::FloatRange { low, high } if !(low <= high) => {
                Err(config_error!("parameter {name} has an empty range [{low}, {high}]"))
            }
            Domain::LogUniform { low, high } if !(*low > 0.0 && low <= high) => Err(config_error!(
                "parameter {name} needs 0 < low <= high for log spacing, got [{low}, {high}]"
            )),
            _ => Ok(()),
        }
    }
}

fn linspace(low: f64, high: f64, k: usize) -> Vec<f64> {
    if k == 1 {
        return vec![low];
    }
    (0..k)
        .map(|i| {
            let t = i as f64 / (k - 1) as f64;
            low + t * (high - low)
        })
        .collect()
}

/// Sub-parameters that only become relevant when their parent takes `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalBranch {
    pub value: ParameterValue,
    pub parameters: Vec<InputParameter>,
}

/// A node of the parameter space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputParameter {
    pub name: ParameterName,
    pub domain: Domain,
    /// Independent parameters are always assigned; dependent ones only when
    /// a parent activates them.
    #[serde(default = "default_independent")]
    pub independent: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<ConditionalBranch>,
}

fn default_independent() -> bool {
    true
}

impl InputParameter {
    pub fn new(name: impl Into<ParameterName>, domain: Domain) -> Self {
        Self {
            name: name.into(),
            domain,
            independent: true,
            branches: Vec::new(),
        }
    }

    pub fn choice(name: impl Into<ParameterName>, values: Vec<ParameterValue>) -> Self {
        Self::new(name, Domain::Choice { values })
    }

    pub fn int_range(name: impl Into<ParameterName>, low: i64, high: i64) -> Self {
        Self::new(name, Domain::IntRange { low, high })
    }

    pub fn float_range(name: impl Into<ParameterName>, low: f64, high: f64) -> Self {
        Self::new(name, Domain::FloatRange { low, high })
    }

    pub fn log_uniform(name: impl Into<ParameterName>, low: f64, high: f64) -> Self {
        Self::new(name, Domain::LogUniform { low, high })
    }

    /// Mark this parameter as only reachable through a parent's branch.
    pub fn dependent(mut self) -> Self {
        self.independent = false;
        self
    }

    /// Attach sub-parameters activated when this parameter takes `value`.
    /// Calling it twice with the same value extends the branch.
    pub fn with_sub_params(mut self, value: impl Into<ParameterValue>, params: Vec<InputParameter>) -> Self {
        let value = value.into();
        match self.branches.iter_mut().find(|b| b.value == value) {
            Some(branch) => branch.parameters.extend(params),
            None => self.branches.push(ConditionalBranch {
                value,
                parameters: params,
            }),
        }
        self
    }

    /// Sub-parameters activated by `value`; empty for leaves and for values
    /// without a branch.
    pub fn associated_sub_params(&self, value: &ParameterValue) -> &[InputParameter] {
        self.branches
            .iter()
            .find(|b| &b.value == value)
            .map(|b| b.parameters.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_leaf(&self) -> bool {
        self.branches.iter().all(|b| b.parameters.is_empty())
    }

    pub fn cardinality(&self) -> Option<usize> {
        self.domain.cardinality()
    }

    pub fn possible_values(&self, k: usize) -> Vec<ParameterValue> {
        self.domain.possible_values(k)
    }
}

/// The full declared parameter space.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputParameterSet {
    pub parameters: Vec<InputParameter>,
}

impl InputParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, parameter: InputParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Expansion entry points.
    pub fn independent_parameters(&self) -> impl Iterator<Item = &InputParameter> {
        self.parameters.iter().filter(|p| p.independent)
    }

    /// Every node of the tree in pre-order, first occurrence of each name.
    pub fn all_parameters(&self) -> Vec<&InputParameter> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        let mut stack: Vec<&InputParameter> = self.parameters.iter().rev().collect();
        while let Some(param) = stack.pop() {
            if seen.insert(&param.name) {
                out.push(param);
            }
            for branch in param.branches.iter().rev() {
                stack.extend(branch.parameters.iter().rev());
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Check that the space is well formed.
    pub fn validate(&self) -> HsResult<()> {
        if self.independent_parameters().next().is_none() {
            return Err(config_error!("parameter space has no independent parameters"));
        }
        check_siblings(&self.parameters)?;
        co_active_names(self.independent_parameters())?;

        let mut domains: BTreeMap<&ParameterName, &Domain> = BTreeMap::new();
        let mut stack: Vec<&InputParameter> = self.parameters.iter().collect();
        while let Some(param) = stack.pop() {
            param.domain.validate(&param.name)?;
            if let Some(previous) = domains.insert(&param.name, &param.domain) {
                if previous != &param.domain {
                    return Err(config_error!(
                        "parameter {} is declared twice with different domains",
                        param.name
                    ));
                }
            }
            for branch in &param.branches {
                if !param.domain.contains(&branch.value) {
                    return Err(config_error!(
                        "branch value {} is outside the domain of parameter {}",
                        branch.value,
                        param.name
                    ));
                }
                check_siblings(&branch.parameters)?;
                stack.extend(branch.parameters.iter());
            }
        }
        Ok(())
    }
}

/// Names that may be assigned together when `params` are all expanded.
/// Fails if one name can be assigned twice in the same configuration;
/// mutually exclusive branches of one parent may reuse names.
fn co_active_names<'a>(
    params: impl IntoIterator<Item = &'a InputParameter>,
) -> HsResult<BTreeSet<&'a ParameterName>> {
    let mut names = BTreeSet::new();
    for param in params {
        for name in subtree_names(param)? {
            if !names.insert(name) {
                return Err(config_error!(
                    "parameter {name} can be assigned twice in one configuration"
                ));
            }
        }
    }
    Ok(names)
}

fn subtree_names(param: &InputParameter) -> HsResult<BTreeSet<&ParameterName>> {
    let mut names = BTreeSet::new();
    for branch in &param.branches {
        names.extend(co_active_names(&branch.parameters)?);
    }
    if !names.insert(&param.name) {
        return Err(config_error!(
            "parameter {} is reachable again below itself",
            param.name
        ));
    }
    Ok(names)
}

fn check_siblings(params: &[InputParameter]) -> HsResult<()> {
    let mut names = BTreeSet::new();
    for param in params {
        if !names.insert(&param.name) {
            return Err(config_error!("parameter {} appears twice among siblings", param.name));
        }
    }
    Ok(())
}
