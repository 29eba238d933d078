//! # hs-store
//!
//! Results store gateway for Hypersweep: looks up whether a configuration
//! was already completed elsewhere and persists finished results.
//!
//! `job_done` followed by `save_result` is a check-then-act sequence and is
//! not atomic; two racing workers may both run the same configuration.

pub mod file;
pub mod memory;

pub use file::JsonLinesResultsSaver;
pub use memory::{MemoryResultsSaver, SaverStats};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use hs_types::{ExecutionParameterSet, HsResult, SaverAnswer};

/// Dedup boundary between the exploration loop and durable storage.
///
/// Lookups compare the full (name, value) content of the configuration,
/// independent of order. Both implementations here are last-write-wins.
pub trait ResultsSaver<R>: Send + Sync {
    /// Recorded result for exactly this configuration, if any.
    fn job_done(&self, params: &ExecutionParameterSet) -> HsResult<SaverAnswer<R>>;

    /// Associate `params` with `result`. Safe to call when another writer
    /// already stored the same key.
    fn save_result(&self, params: &ExecutionParameterSet, result: &R) -> HsResult<()>;
}

/// Which results store backs a run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SaverConfig {
    #[default]
    Memory,
    JsonLines { path: PathBuf },
}

impl SaverConfig {
    pub fn build<R>(&self) -> HsResult<Box<dyn ResultsSaver<R>>>
    where
        R: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let saver: Box<dyn ResultsSaver<R>> = match self {
            SaverConfig::Memory => Box::new(MemoryResultsSaver::new()),
            SaverConfig::JsonLines { path } => Box::new(JsonLinesResultsSaver::open(path)?),
        };
        Ok(saver)
    }
}
