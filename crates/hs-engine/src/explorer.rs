//! Reference exploration loop: draw, dedup, execute, feed back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use hs_optimizer::ParameterManager;
use hs_store::ResultsSaver;
use hs_types::{HsError, HsResult, ProcessResult, SaverAnswer};

use crate::executor::{ExecutionError, ProcessExecutor};
use crate::progress::{ExecutionProgress, ExplorationProgress, ProgressMonitor};
use crate::stop::StopCondition;

/// Whether we are maximizing or minimizing the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveDirection {
    #[default]
    Maximize,
    Minimize,
}

impl ObjectiveDirection {
    pub fn improves(self, candidate: f64, current: f64) -> bool {
        match self {
            ObjectiveDirection::Maximize => candidate > current,
            ObjectiveDirection::Minimize => candidate < current,
        }
    }
}

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    StopCondition,
    Exhausted,
}

/// Outcome of one exploration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationSummary {
    pub run_id: Uuid,
    pub strategy: String,
    pub progress: ExplorationProgress,
    pub best: Option<ProcessResult>,
    pub stop_reason: StopReason,
    pub finished_at: DateTime<Utc>,
}

/// Drives a parameter manager against an executor until the stop condition
/// fires or the manager runs out of jobs.
///
/// Store failures are retried `store_retries` times and then returned; every
/// other failure is logged and the loop goes on.
pub struct Explorer {
    manager: Box<dyn ParameterManager>,
    saver: Arc<dyn ResultsSaver<ProcessResult>>,
    stop: Box<dyn StopCondition>,
    observer: Box<dyn ExecutionProgress>,
    store_retries: usize,
    retry_delay: Duration,
    direction: ObjectiveDirection,
}

impl Explorer {
    pub fn new(
        manager: Box<dyn ParameterManager>,
        saver: Arc<dyn ResultsSaver<ProcessResult>>,
        stop: Box<dyn StopCondition>,
    ) -> Self {
        Self {
            manager,
            saver,
            stop,
            observer: Box::new(ProgressMonitor::Silent),
            store_retries: 3,
            retry_delay: Duration::ZERO,
            direction: ObjectiveDirection::default(),
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn ExecutionProgress>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_store_retries(mut self, retries: usize, delay: Duration) -> Self {
        self.store_retries = retries;
        self.retry_delay = delay;
        self
    }

    pub fn with_direction(mut self, direction: ObjectiveDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn manager(&self) -> &dyn ParameterManager {
        self.manager.as_ref()
    }

    pub fn run<E>(&mut self, executor: &mut E) -> HsResult<ExplorationSummary>
    where
        E: ProcessExecutor + ?Sized,
    {
        let run_id = Uuid::new_v4();
        let mut progress = ExplorationProgress::new();
        let mut best: Option<ProcessResult> = None;

        self.stop.init(self.manager.as_ref());
        self.observer.init(self.manager.as_ref(), self.stop.as_ref());
        info!(%run_id, strategy = self.manager.name(), "Starting exploration");

        let stop_reason = loop {
            if self.stop.should_stop(&progress) {
                break StopReason::StopCondition;
            }
            if !self.manager.has_jobs_to_explore() {
                break StopReason::Exhausted;
            }
            let params = match self.manager.next_parameters() {
                Ok(params) => params,
                Err(HsError::NoJobsLeft) => break StopReason::Exhausted,
                Err(e) => return Err(e),
            };
            progress.iterations += 1;
            self.observer.show_progress(&progress, self.manager.jobs_todo());

            if let SaverAnswer::Done(result) = self.with_store(|saver| saver.job_done(&params))? {
                debug!("Reusing stored result for {}", params);
                progress.reused += 1;
                self.record(result, &mut best);
                continue;
            }

            match executor.execute(&params) {
                Ok(result) => {
                    self.with_store(|saver| saver.save_result(&params, &result))?;
                    progress.executed += 1;
                    self.record(result, &mut best);
                }
                Err(ExecutionError::Rejected { reason }) => {
                    debug!("Dispatch of {} rejected: {}", params, reason);
                    progress.rejected += 1;
                    self.manager.can_not_be_done_now(params);
                }
                Err(ExecutionError::InvalidParameters { reason }) => {
                    warn!("Invalid parameters {}: {}", params, reason);
                    progress.invalid += 1;
                    self.manager.notify_invalid(&params);
                }
                Err(ExecutionError::Failed { message }) => {
                    warn!("Trial {} failed: {}", params, message);
                    progress.failed += 1;
                }
            }
        };

        info!(
            %run_id,
            "Exploration finished ({:?}): {} executed, {} reused, {} failed",
            stop_reason,
            progress.executed,
            progress.reused,
            progress.failed
        );
        Ok(ExplorationSummary {
            run_id,
            strategy: self.manager.name().to_string(),
            progress,
            best,
            stop_reason,
            finished_at: Utc::now(),
        })
    }

    fn record(&mut self, result: ProcessResult, best: &mut Option<ProcessResult>) {
        self.manager.update_observer(&result);
        self.observer.update_observer(&result);

        let Some(objective) = result.objective else {
            return;
        };
        let improves = match best.as_ref().and_then(|b| b.objective) {
            None => true,
            Some(current) => self.direction.improves(objective, current),
        };
        if improves {
            *best = Some(result);
        }
    }

    fn with_store<T>(
        &self,
        mut op: impl FnMut(&dyn ResultsSaver<ProcessResult>) -> HsResult<T>,
    ) -> HsResult<T> {
        let mut attempt = 0;
        loop {
            match op(self.saver.as_ref()) {
                Err(e) if e.is_retryable() && attempt < self.store_retries => {
                    attempt += 1;
                    warn!(attempt, "Results store unavailable, retrying: {}", e);
                    if !self.retry_delay.is_zero() {
                        std::thread::sleep(self.retry_delay);
                    }
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stop::{MaxTrials, Never};
    use hs_optimizer::{GridSearchManager, RandomSearchManager};
    use hs_store::MemoryResultsSaver;
    use hs_types::{ExecutionParameterSet, InputParameter, InputParameterSet, StoreError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn layers_space() -> InputParameterSet {
        InputParameterSet::new().add(InputParameter::int_range("layers", 1, 4))
    }

    fn score(params: &ExecutionParameterSet) -> Result<ProcessResult, ExecutionError> {
        let layers = params.get("layers").and_then(|v| v.as_f64()).unwrap_or(0.0);
        Ok(ProcessResult::new(params.clone()).with_objective(layers))
    }

    fn grid_explorer(saver: Arc<dyn ResultsSaver<ProcessResult>>) -> Explorer {
        let grid = GridSearchManager::new(layers_space(), 4, 100).unwrap();
        Explorer::new(Box::new(grid), saver, Box::new(Never))
    }

    #[test]
    fn grid_run_ends_when_exhausted() {
        let mut explorer = grid_explorer(Arc::new(MemoryResultsSaver::new()));
        let summary = explorer.run(&mut score).unwrap();

        assert_eq!(summary.stop_reason, StopReason::Exhausted);
        assert_eq!(summary.strategy, "grid");
        assert_eq!(summary.progress.executed, 4);
        assert_eq!(summary.progress.reused, 0);
        assert_eq!(summary.best.unwrap().objective, Some(4.0));
    }

    #[test]
    fn minimize_keeps_lowest_objective() {
        let mut explorer =
            grid_explorer(Arc::new(MemoryResultsSaver::new())).with_direction(ObjectiveDirection::Minimize);
        let summary = explorer.run(&mut score).unwrap();
        assert_eq!(summary.best.unwrap().objective, Some(1.0));
    }

    #[test]
    fn stored_results_are_reused_instead_of_executed() {
        let saver: Arc<MemoryResultsSaver<ProcessResult>> = Arc::new(MemoryResultsSaver::new());
        let done = ExecutionParameterSet::new().with("layers", 2i64).unwrap();
        saver
            .save_result(&done, &ProcessResult::new(done.clone()).with_objective(99.0))
            .unwrap();

        let runs = AtomicUsize::new(0);
        let mut executor = |params: &ExecutionParameterSet| {
            runs.fetch_add(1, Ordering::SeqCst);
            score(params)
        };
        let mut explorer = grid_explorer(saver.clone());
        let summary = explorer.run(&mut executor).unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(summary.progress.reused, 1);
        assert_eq!(summary.progress.executed, 3);
        assert_eq!(summary.best.unwrap().objective, Some(99.0));
        assert_eq!(saver.len(), 4);
    }

    #[test]
    fn rejected_dispatch_is_retried_by_stateful_manager() {
        let mut rejected_once = false;
        let mut executor = |params: &ExecutionParameterSet| {
            if !rejected_once {
                rejected_once = true;
                return Err(ExecutionError::Rejected {
                    reason: "no free GPU".into(),
                });
            }
            score(params)
        };
        let mut explorer = grid_explorer(Arc::new(MemoryResultsSaver::new()));
        let summary = explorer.run(&mut executor).unwrap();

        assert_eq!(summary.progress.rejected, 1);
        assert_eq!(summary.progress.executed, 4);
        assert_eq!(summary.progress.iterations, 5);
    }

    #[test]
    fn invalid_parameters_are_excluded_and_failures_counted() {
        let mut executor = |params: &ExecutionParameterSet| match params.get("layers").and_then(|v| v.as_f64()) {
            Some(v) if v == 1.0 => Err(ExecutionError::InvalidParameters {
                reason: "too shallow".into(),
            }),
            Some(v) if v == 3.0 => Err(ExecutionError::Failed {
                message: "diverged".into(),
            }),
            _ => score(params),
        };
        let mut explorer = grid_explorer(Arc::new(MemoryResultsSaver::new()));
        let summary = explorer.run(&mut executor).unwrap();

        assert_eq!(summary.progress.invalid, 1);
        assert_eq!(summary.progress.failed, 1);
        assert_eq!(summary.progress.executed, 2);
        assert_eq!(summary.stop_reason, StopReason::Exhausted);
    }

    #[test]
    fn random_run_stops_on_condition() {
        let manager = RandomSearchManager::with_seed(layers_space(), 4, 21).unwrap();
        let mut explorer = Explorer::new(
            Box::new(manager),
            Arc::new(MemoryResultsSaver::new()),
            Box::new(MaxTrials::new(10)),
        );
        let summary = explorer.run(&mut score).unwrap();

        assert_eq!(summary.stop_reason, StopReason::StopCondition);
        assert_eq!(summary.progress.completed(), 10);
        assert!(explorer.manager().has_jobs_to_explore());
    }

    /// Fails the first `failures` calls with an unavailable store.
    struct FlakySaver {
        failures: AtomicUsize,
        inner: MemoryResultsSaver<ProcessResult>,
    }

    impl ResultsSaver<ProcessResult> for FlakySaver {
        fn job_done(&self, params: &ExecutionParameterSet) -> HsResult<SaverAnswer<ProcessResult>> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(StoreError::Unavailable {
                    message: "connection reset".into(),
                }
                .into());
            }
            self.inner.job_done(params)
        }

        fn save_result(&self, params: &ExecutionParameterSet, result: &ProcessResult) -> HsResult<()> {
            self.inner.save_result(params, result)
        }
    }

    #[test]
    fn store_outage_is_retried() {
        let saver = Arc::new(FlakySaver {
            failures: AtomicUsize::new(2),
            inner: MemoryResultsSaver::new(),
        });
        let mut explorer = grid_explorer(saver).with_store_retries(2, Duration::ZERO);
        let summary = explorer.run(&mut score).unwrap();
        assert_eq!(summary.progress.executed, 4);
    }

    #[test]
    fn persistent_store_outage_is_propagated() {
        let saver = Arc::new(FlakySaver {
            failures: AtomicUsize::new(10),
            inner: MemoryResultsSaver::new(),
        });
        let mut explorer = grid_explorer(saver).with_store_retries(2, Duration::ZERO);
        let err = explorer.run(&mut score).unwrap_err();
        assert!(err.is_retryable());
    }
}
