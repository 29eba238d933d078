//! Progress observers notified by the exploration loop.

use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use tracing::info;

use hs_optimizer::{JobsTodo, ParameterManager};
use hs_types::ProcessResult;

use crate::explorer::ObjectiveDirection;
use crate::stop::StopCondition;

/// Counters of a running exploration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationProgress {
    /// Configurations drawn from the manager.
    pub iterations: usize,
    /// Trials run by this process.
    pub executed: usize,
    /// Trials answered by the results store instead of running them.
    pub reused: usize,
    pub rejected: usize,
    pub invalid: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
}

impl ExplorationProgress {
    pub fn new() -> Self {
        Self {
            iterations: 0,
            executed: 0,
            reused: 0,
            rejected: 0,
            invalid: 0,
            failed: 0,
            started_at: Utc::now(),
        }
    }

    /// Trials that produced a result.
    pub fn completed(&self) -> usize {
        self.executed + self.reused
    }

    /// Trials that reached a final outcome; rejected dispatches are not
    /// counted since they come back later.
    pub fn attempted(&self) -> usize {
        self.completed() + self.invalid + self.failed
    }
}

impl Default for ExplorationProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle notifications; nothing flows back into the loop.
pub trait ExecutionProgress {
    fn init(&mut self, manager: &dyn ParameterManager, stop: &dyn StopCondition);

    fn show_progress(&mut self, progress: &ExplorationProgress, jobs_todo: JobsTodo);

    fn update_observer(&mut self, result: &ProcessResult);
}

/// Event forwarded by [`ProgressMonitor::Channel`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Started { strategy: &'static str, jobs_todo: JobsTodo },
    Progress { progress: ExplorationProgress, jobs_todo: JobsTodo },
    Result(ProcessResult),
}

/// Logs a line every `every` results, with the best objective seen so far
/// under `direction`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogProgress {
    every: usize,
    direction: ObjectiveDirection,
    results: usize,
    best_objective: Option<f64>,
}

impl LogProgress {
    pub fn new(every: usize, direction: ObjectiveDirection) -> Self {
        Self {
            every: every.max(1),
            direction,
            results: 0,
            best_objective: None,
        }
    }

    pub fn results(&self) -> usize {
        self.results
    }

    pub fn best_objective(&self) -> Option<f64> {
        self.best_objective
    }
}

/// Built-in observers.
#[derive(Debug, Clone)]
pub enum ProgressMonitor {
    /// Discards every notification.
    Silent,
    Log(LogProgress),
    /// Forwards events; a dropped receiver is ignored.
    Channel(Sender<ProgressEvent>),
}

impl ExecutionProgress for ProgressMonitor {
    fn init(&mut self, manager: &dyn ParameterManager, _stop: &dyn StopCondition) {
        match self {
            ProgressMonitor::Silent => {}
            ProgressMonitor::Log(_) => {
                info!(
                    strategy = manager.name(),
                    "Exploration started, {} jobs to do",
                    manager.jobs_todo()
                );
            }
            ProgressMonitor::Channel(tx) => {
                let _ = tx.try_send(ProgressEvent::Started {
                    strategy: manager.name(),
                    jobs_todo: manager.jobs_todo(),
                });
            }
        }
    }

    fn show_progress(&mut self, progress: &ExplorationProgress, jobs_todo: JobsTodo) {
        match self {
            ProgressMonitor::Silent => {}
            ProgressMonitor::Log(log) => {
                if progress.iterations % log.every == 0 {
                    info!(
                        "Iteration {}: {} executed, {} reused, {} failed, {} remaining",
                        progress.iterations, progress.executed, progress.reused, progress.failed, jobs_todo
                    );
                }
            }
            ProgressMonitor::Channel(tx) => {
                let _ = tx.try_send(ProgressEvent::Progress {
                    progress: progress.clone(),
                    jobs_todo,
                });
            }
        }
    }

    fn update_observer(&mut self, result: &ProcessResult) {
        match self {
            ProgressMonitor::Silent => {}
            ProgressMonitor::Log(log) => {
                log.results += 1;
                if let Some(objective) = result.objective {
                    if log
                        .best_objective
                        .map_or(true, |best| log.direction.improves(objective, best))
                    {
                        log.best_objective = Some(objective);
                    }
                }
                if log.results % log.every == 0 {
                    info!(
                        "{} results, best objective {:?}, last {}",
                        log.results, log.best_objective, result.parameters
                    );
                }
            }
            ProgressMonitor::Channel(tx) => {
                let _ = tx.try_send(ProgressEvent::Result(result.clone()));
            }
        }
    }
}

/// Observer selection from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressConfig {
    #[default]
    Silent,
    Log {
        #[serde(default = "default_every")]
        every: usize,
    },
}

fn default_every() -> usize {
    10
}

impl ProgressConfig {
    pub fn build(&self, direction: ObjectiveDirection) -> ProgressMonitor {
        match self {
            ProgressConfig::Silent => ProgressMonitor::Silent,
            ProgressConfig::Log { every } => ProgressMonitor::Log(LogProgress::new(*every, direction)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stop::MaxTrials;
    use crossbeam_channel::unbounded;
    use hs_optimizer::RandomSearchManager;
    use hs_types::{ExecutionParameterSet, InputParameter, InputParameterSet};

    fn manager() -> RandomSearchManager {
        let space = InputParameterSet::new().add(InputParameter::choice("lr", vec![0.1.into(), 0.01.into()]));
        RandomSearchManager::with_seed(space, 4, 3).unwrap()
    }

    fn result(objective: f64) -> ProcessResult {
        ProcessResult::new(ExecutionParameterSet::new().with("lr", 0.1).unwrap()).with_objective(objective)
    }

    #[test]
    fn silent_monitor_accepts_everything() {
        let mut monitor = ProgressMonitor::Silent;
        monitor.init(&manager(), &MaxTrials::new(3));
        monitor.show_progress(&ExplorationProgress::new(), JobsTodo::Unbounded);
        monitor.update_observer(&result(1.0));
    }

    #[test]
    fn log_monitor_tracks_best_objective() {
        let mut monitor = ProgressConfig::Log { every: 2 }.build(ObjectiveDirection::Maximize);
        for objective in [0.3, 0.9, 0.5] {
            monitor.update_observer(&result(objective));
        }
        match monitor {
            ProgressMonitor::Log(log) => {
                assert_eq!(log.results(), 3);
                assert_eq!(log.best_objective(), Some(0.9));
            }
            other => panic!("unexpected monitor {other:?}"),
        }
    }

    #[test]
    fn log_monitor_follows_minimize_direction() {
        let mut monitor = ProgressMonitor::Log(LogProgress::new(5, ObjectiveDirection::Minimize));
        for objective in [0.3, 0.9, 0.1, 0.5] {
            monitor.update_observer(&result(objective));
        }
        match monitor {
            ProgressMonitor::Log(log) => assert_eq!(log.best_objective(), Some(0.1)),
            other => panic!("unexpected monitor {other:?}"),
        }
    }

    #[test]
    fn channel_monitor_forwards_events() {
        let (tx, rx) = unbounded();
        let mut monitor = ProgressMonitor::Channel(tx);
        monitor.init(&manager(), &MaxTrials::new(3));
        monitor.show_progress(&ExplorationProgress::new(), JobsTodo::Known(4));
        monitor.update_observer(&result(0.7));

        assert!(matches!(
            rx.try_recv().unwrap(),
            ProgressEvent::Started {
                strategy: "random",
                jobs_todo: JobsTodo::Unbounded
            }
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            ProgressEvent::Progress {
                jobs_todo: JobsTodo::Known(4),
                ..
            }
        ));
        match rx.try_recv().unwrap() {
            ProgressEvent::Result(r) => assert_eq!(r.objective, Some(0.7)),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_receiver_is_ignored() {
        let (tx, rx) = unbounded();
        drop(rx);
        let mut monitor = ProgressMonitor::Channel(tx);
        monitor.update_observer(&result(0.1));
    }
}
