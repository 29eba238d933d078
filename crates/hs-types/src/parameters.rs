//! Concrete parameter assignments: names, values and flattened execution sets.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::errors::{HsError, HsResult};

/// Identifier of a tunable parameter (e.g. "learning_rate").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterName(String);

impl ParameterName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParameterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParameterName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ParameterName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A concrete parameter value.
///
/// Floats compare by their total order so that values can key maps and take
/// part in set equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParameterValue {
    fn rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Int(_) => 1,
            Self::Float(_) => 2,
            Self::Text(_) => 3,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl PartialEq for ParameterValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ParameterValue {}

impl PartialOrd for ParameterValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ParameterValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for ParameterValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Bool(v) => v.hash(state),
            Self::Int(v) => v.hash(state),
            Self::Float(v) => v.to_bits().hash(state),
            Self::Text(v) => v.hash(state),
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// One concrete (name, value) pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExecutionParameter {
    pub name: ParameterName,
    pub value: ParameterValue,
}

impl ExecutionParameter {
    pub fn new(name: impl Into<ParameterName>, value: impl Into<ParameterValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A flattened, concrete configuration for one trial.
///
/// Equality and hashing only look at the (name, value) content; the `root`
/// flag is bookkeeping and does not take part in dedup lookups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionParameterSet {
    parameters: BTreeMap<ParameterName, ParameterValue>,
    #[serde(default)]
    root: bool,
}

impl ExecutionParameterSet {
    /// An empty, nested (non-root) set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge several partial sets into one. `root` marks the set built from
    /// the independent parameters of a space.
    pub fn from_parts(parts: impl IntoIterator<Item = ExecutionParameterSet>, root: bool) -> HsResult<Self> {
        let mut set = Self {
            parameters: BTreeMap::new(),
            root,
        };
        for part in parts {
            set.merge(part)?;
        }
        Ok(set)
    }

    /// Add one assignment. Re-adding an identical pair is a no-op; assigning
    /// a different value to an existing name fails.
    pub fn add(&mut self, parameter: ExecutionParameter) -> HsResult<()> {
        match self.parameters.get(&parameter.name) {
            Some(existing) if *existing != parameter.value => Err(HsError::ConflictingAssignment {
                name: parameter.name,
                existing: existing.clone(),
                incoming: parameter.value,
            }),
            Some(_) => Ok(()),
            None => {
                self.parameters.insert(parameter.name, parameter.value);
                Ok(())
            }
        }
    }

    pub fn with(mut self, name: impl Into<ParameterName>, value: impl Into<ParameterValue>) -> HsResult<Self> {
        self.add(ExecutionParameter::new(name, value))?;
        Ok(self)
    }

    /// Set-union with another set.
    pub fn merge(&mut self, other: ExecutionParameterSet) -> HsResult<()> {
        for (name, value) in other.parameters {
            self.add(ExecutionParameter { name, value })?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.parameters.get(&ParameterName::new(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.root
    }

    pub fn names(&self) -> impl Iterator<Item = &ParameterName> {
        self.parameters.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = ExecutionParameter> + '_ {
        self.parameters
            .iter()
            .map(|(name, value)| ExecutionParameter::new(name.clone(), value.clone()))
    }

    /// Canonical, order-independent textual key of the content.
    pub fn fingerprint(&self) -> String {
        self.parameters
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl PartialEq for ExecutionParameterSet {
    fn eq(&self, other: &Self) -> bool {
        self.parameters == other.parameters
    }
}

impl Eq for ExecutionParameterSet {}

impl Hash for ExecutionParameterSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parameters.hash(state);
    }
}

impl fmt::Display for ExecutionParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.fingerprint())
    }
}

impl FromIterator<ExecutionParameter> for ExecutionParameterSet {
    /// Later duplicates of a name overwrite earlier ones.
    fn from_iter<I: IntoIterator<Item = ExecutionParameter>>(iter: I) -> Self {
        Self {
            parameters: iter.into_iter().map(|p| (p.name, p.value)).collect(),
            root: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn set(pairs: &[(&str, ParameterValue)]) -> ExecutionParameterSet {
        pairs
            .iter()
            .map(|(n, v)| ExecutionParameter::new(*n, v.clone()))
            .collect()
    }

    #[test]
    fn value_ordering_is_total() {
        let mut values = vec![
            ParameterValue::Text("adam".into()),
            ParameterValue::Float(0.5),
            ParameterValue::Int(3),
            ParameterValue::Bool(true),
            ParameterValue::Float(f64::NAN),
        ];
        values.sort();
        assert_eq!(values[0], ParameterValue::Bool(true));
        assert_eq!(values[1], ParameterValue::Int(3));
        assert_eq!(values[4], ParameterValue::Text("adam".into()));
        assert_eq!(ParameterValue::Float(f64::NAN), ParameterValue::Float(f64::NAN));
    }

    #[test]
    fn untagged_values_deserialize_to_narrowest_kind() {
        let values: Vec<ParameterValue> = serde_json::from_str(r#"[true, 3, 0.25, "sgd"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                ParameterValue::Bool(true),
                ParameterValue::Int(3),
                ParameterValue::Float(0.25),
                ParameterValue::Text("sgd".into()),
            ]
        );
    }

    #[test]
    fn adding_same_pair_twice_is_idempotent() {
        let mut s = ExecutionParameterSet::new();
        s.add(ExecutionParameter::new("lr", 0.1)).unwrap();
        s.add(ExecutionParameter::new("lr", 0.1)).unwrap();
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn conflicting_assignment_is_rejected() {
        let mut s = ExecutionParameterSet::new();
        s.add(ExecutionParameter::new("lr", 0.1)).unwrap();
        let err = s.add(ExecutionParameter::new("lr", 0.01)).unwrap_err();
        assert!(matches!(err, HsError::ConflictingAssignment { .. }));
        assert_eq!(s.get("lr"), Some(&ParameterValue::Float(0.1)));
    }

    #[test]
    fn merge_order_does_not_matter() {
        let a = set(&[("optimizer", "sgd".into())]);
        let b = set(&[("momentum", 0.9.into())]);
        let c = set(&[("layers", 4i64.into())]);

        let abc = ExecutionParameterSet::from_parts(vec![a.clone(), b.clone(), c.clone()], true).unwrap();
        let cba = ExecutionParameterSet::from_parts(vec![c.clone(), b.clone(), a.clone()], true).unwrap();

        let mut ab = a.clone();
        ab.merge(b.clone()).unwrap();
        let mut ab_c = ab;
        ab_c.merge(c.clone()).unwrap();

        let mut bc = b;
        bc.merge(c).unwrap();
        let mut a_bc = a;
        a_bc.merge(bc).unwrap();

        assert_eq!(abc, cba);
        assert_eq!(ab_c, a_bc);
        assert_eq!(abc, ab_c);
        assert_eq!(abc.len(), 3);
        assert!(abc.is_root());
    }

    #[test]
    fn equality_ignores_root_flag_and_insertion_order() {
        let nested = set(&[("a", 1i64.into()), ("b", "x".into())]);
        let root = ExecutionParameterSet::from_parts(
            vec![set(&[("b", "x".into())]), set(&[("a", 1i64.into())])],
            true,
        )
        .unwrap();
        assert_eq!(nested, root);

        let mut seen = HashSet::new();
        seen.insert(nested);
        assert!(seen.contains(&root));
    }

    #[test]
    fn fingerprint_is_canonical() {
        let s = set(&[("b", 2i64.into()), ("a", "sgd".into())]);
        assert_eq!(s.fingerprint(), "a=sgd,b=2");
        assert_eq!(s.to_string(), "{a=sgd,b=2}");
    }

    #[test]
    fn execution_set_serialization() {
        let s = ExecutionParameterSet::from_parts(vec![set(&[("lr", 0.01.into()), ("opt", "adam".into())])], true)
            .unwrap();
        let json = serde_json::to_string(&s).unwrap();
        let back: ExecutionParameterSet = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
        assert!(back.is_root());
    }
}
