//! # hs-engine
//!
//! Exploration driver for Hypersweep.
//!
//! Ties a [`ParameterManager`](hs_optimizer::ParameterManager) to a
//! [`ResultsSaver`](hs_store::ResultsSaver) and a [`ProcessExecutor`]:
//! configurations are drawn, looked up in the results store, executed when
//! missing, and every outcome is fed back to the manager and the progress
//! observer until a [`StopCondition`] fires.

pub mod config;
pub mod executor;
pub mod explorer;
pub mod progress;
pub mod stop;

pub use config::ExplorationConfig;
pub use executor::{ExecutionError, ProcessExecutor};
pub use explorer::{ExplorationSummary, Explorer, ObjectiveDirection, StopReason};
pub use progress::{ExecutionProgress, ExplorationProgress, LogProgress, ProgressConfig, ProgressEvent, ProgressMonitor};
pub use stop::{AnyOf, MaxTrials, Never, StopCondition, StopConfig, TimeBudget};
