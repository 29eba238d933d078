//! Outcomes of trial executions and dedup lookups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::parameters::ExecutionParameterSet;

/// Result of running one execution parameter set through the executor.
///
/// The core only routes it; `payload` carries whatever the executor
/// produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResult {
    pub parameters: ExecutionParameterSet,
    /// Scalar score, when the process produces one.
    pub objective: Option<f64>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub duration_ms: Option<u64>,
    pub finished_at: DateTime<Utc>,
}

impl ProcessResult {
    pub fn new(parameters: ExecutionParameterSet) -> Self {
        Self {
            parameters,
            objective: None,
            metrics: BTreeMap::new(),
            payload: serde_json::Value::Null,
            duration_ms: None,
            finished_at: Utc::now(),
        }
    }

    pub fn with_objective(mut self, objective: f64) -> Self {
        self.objective = Some(objective);
        self
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }
}

/// Outcome of a dedup lookup against the results store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SaverAnswer<R> {
    /// No recorded result for this configuration.
    NotDone,
    /// Another worker (or an earlier run) already produced this result.
    Done(R),
}

impl<R> SaverAnswer<R> {
    pub fn is_done(&self) -> bool {
        matches!(self, SaverAnswer::Done(_))
    }

    pub fn into_result(self) -> Option<R> {
        match self {
            SaverAnswer::Done(r) => Some(r),
            SaverAnswer::NotDone => None,
        }
    }
}
