//! Exploration settings loaded from JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use hs_optimizer::ManagerConfig;
use hs_store::{ResultsSaver, SaverConfig};
use hs_types::{HsResult, InputParameterSet, ProcessResult};

use crate::explorer::{Explorer, ObjectiveDirection};
use crate::progress::ProgressConfig;
use crate::stop::StopConfig;

/// Everything needed to run one exploration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationConfig {
    pub space: InputParameterSet,
    #[serde(default)]
    pub manager: ManagerConfig,
    #[serde(default)]
    pub saver: SaverConfig,
    #[serde(default)]
    pub stop: StopConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub direction: ObjectiveDirection,
    /// Extra attempts for a results-store call that reports the store as unavailable.
    #[serde(default = "default_store_retries")]
    pub store_retries: usize,
    #[serde(default)]
    pub store_retry_delay_ms: u64,
}

fn default_store_retries() -> usize {
    3
}

impl ExplorationConfig {
    pub fn new(space: InputParameterSet) -> Self {
        Self {
            space,
            manager: ManagerConfig::default(),
            saver: SaverConfig::default(),
            stop: StopConfig::default(),
            progress: ProgressConfig::default(),
            direction: ObjectiveDirection::default(),
            store_retries: default_store_retries(),
            store_retry_delay_ms: 0,
        }
    }

    pub fn from_json_str(json: &str) -> HsResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.space.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> HsResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        info!("Loading exploration config from {}", path.as_ref().display());
        Self::from_json_str(&text)
    }

    /// Build the manager, results store, stop condition and observer.
    pub fn build_explorer(&self) -> HsResult<Explorer> {
        let manager = self.manager.build(self.space.clone())?;
        let saver: Arc<dyn ResultsSaver<ProcessResult>> = Arc::from(self.saver.build::<ProcessResult>()?);
        Ok(Explorer::new(manager, saver, self.stop.build()?)
            .with_observer(Box::new(self.progress.build(self.direction)))
            .with_direction(self.direction)
            .with_store_retries(self.store_retries, Duration::from_millis(self.store_retry_delay_ms)))
    }
}
