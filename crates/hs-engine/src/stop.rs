//! Stop conditions polled by the exploration loop between trials.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use hs_optimizer::{JobsTodo, ParameterManager};
use hs_types::{config_error, HsResult};

use crate::progress::ExplorationProgress;

/// Global termination policy. Queried between dispatches, never mid-trial.
pub trait StopCondition: Send {
    fn init(&mut self, manager: &dyn ParameterManager);

    fn should_stop(&self, progress: &ExplorationProgress) -> bool;
}

/// Stop once this many trials reached a final outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaxTrials {
    max: usize,
}

impl MaxTrials {
    pub fn new(max: usize) -> Self {
        Self { max }
    }
}

impl StopCondition for MaxTrials {
    fn init(&mut self, manager: &dyn ParameterManager) {
        if let JobsTodo::Known(n) = manager.jobs_todo() {
            if n < self.max {
                info!("Manager only has {} jobs, fewer than the {} trial cap", n, self.max);
            }
        }
    }

    fn should_stop(&self, progress: &ExplorationProgress) -> bool {
        progress.attempted() >= self.max
    }
}

/// Stop once the wall-clock budget, counted from `init`, is spent. A budget
/// reaching past the representable calendar never fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeBudget {
    budget: Duration,
    deadline: Option<DateTime<Utc>>,
}

impl TimeBudget {
    pub fn new(budget: Duration) -> Self {
        Self { budget, deadline: None }
    }
}

impl StopCondition for TimeBudget {
    fn init(&mut self, _manager: &dyn ParameterManager) {
        self.deadline = Utc::now().checked_add_signed(self.budget);
        match self.deadline {
            Some(deadline) => debug!("Time budget ends at {}", deadline),
            None => warn!("Time budget of {} is out of range and will never fire", self.budget),
        }
    }

    fn should_stop(&self, progress: &ExplorationProgress) -> bool {
        self.deadline
            .or_else(|| progress.started_at.checked_add_signed(self.budget))
            .map_or(false, |deadline| Utc::now() >= deadline)
    }
}

/// Never fires; the run ends when the manager runs out of jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Never;

impl StopCondition for Never {
    fn init(&mut self, _manager: &dyn ParameterManager) {}

    fn should_stop(&self, _progress: &ExplorationProgress) -> bool {
        false
    }
}

/// Fires as soon as any inner condition fires.
pub struct AnyOf {
    conditions: Vec<Box<dyn StopCondition>>,
}

impl AnyOf {
    pub fn new(conditions: Vec<Box<dyn StopCondition>>) -> Self {
        Self { conditions }
    }
}

impl StopCondition for AnyOf {
    fn init(&mut self, manager: &dyn ParameterManager) {
        for condition in &mut self.conditions {
            condition.init(manager);
        }
    }

    fn should_stop(&self, progress: &ExplorationProgress) -> bool {
        self.conditions.iter().any(|c| c.should_stop(progress))
    }
}

/// Stop policy selection from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopConfig {
    MaxTrials { max: usize },
    TimeBudget { seconds: i64 },
    Never,
    AnyOf { conditions: Vec<StopConfig> },
}

impl Default for StopConfig {
    fn default() -> Self {
        StopConfig::MaxTrials { max: 100 }
    }
}

impl StopConfig {
    pub fn build(&self) -> HsResult<Box<dyn StopCondition>> {
        let condition: Box<dyn StopCondition> = match self {
            StopConfig::MaxTrials { max } => Box::new(MaxTrials::new(*max)),
            StopConfig::TimeBudget { seconds } => {
                let budget = Duration::try_seconds(*seconds)
                    .filter(|budget| *budget >= Duration::zero())
                    .ok_or_else(|| config_error!("time budget of {seconds} seconds is out of range"))?;
                Box::new(TimeBudget::new(budget))
            }
            StopConfig::Never => Box::new(Never),
            StopConfig::AnyOf { conditions } => Box::new(AnyOf::new(
                conditions
                    .iter()
                    .map(StopConfig::build)
                    .collect::<HsResult<Vec<_>>>()?,
            )),
        };
        Ok(condition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_optimizer::{GridSearchManager, RandomSearchManager};
    use hs_types::{InputParameter, InputParameterSet};

    fn manager() -> RandomSearchManager {
        let space = InputParameterSet::new().add(InputParameter::int_range("layers", 1, 4));
        RandomSearchManager::with_seed(space, 4, 11).unwrap()
    }

    fn progress(executed: usize, rejected: usize) -> ExplorationProgress {
        ExplorationProgress {
            executed,
            rejected,
            ..ExplorationProgress::new()
        }
    }

    #[test]
    fn max_trials_ignores_rejections() {
        let mut stop = MaxTrials::new(3);
        stop.init(&manager());
        assert!(!stop.should_stop(&progress(2, 10)));
        assert!(stop.should_stop(&progress(3, 0)));
    }

    #[test]
    fn max_trials_init_with_small_grid() {
        let space = InputParameterSet::new().add(InputParameter::int_range("layers", 1, 2));
        let grid = GridSearchManager::new(space, 2, 10).unwrap();
        let mut stop = MaxTrials::new(50);
        stop.init(&grid);
        assert!(!stop.should_stop(&progress(2, 0)));
    }

    #[test]
    fn time_budget_counts_from_init() {
        let mut spent = TimeBudget::new(Duration::zero());
        spent.init(&manager());
        assert!(spent.should_stop(&progress(0, 0)));

        let mut generous = TimeBudget::new(Duration::hours(1));
        generous.init(&manager());
        assert!(!generous.should_stop(&progress(0, 0)));
    }

    #[test]
    fn out_of_range_time_budget_is_a_config_error() {
        for seconds in [i64::MAX, -5] {
            let err = StopConfig::TimeBudget { seconds }.build().err().unwrap();
            assert!(matches!(err, hs_types::HsError::Config(_)));
        }
    }

    #[test]
    fn deadline_past_calendar_never_fires() {
        let mut stop = StopConfig::TimeBudget {
            seconds: 1_000_000_000_000_000,
        }
        .build()
        .unwrap();
        stop.init(&manager());
        assert!(!stop.should_stop(&progress(0, 0)));

        let unstarted = TimeBudget::new(Duration::MAX);
        assert!(!unstarted.should_stop(&progress(0, 0)));
    }

    #[test]
    fn never_never_fires() {
        let mut stop = Never;
        stop.init(&manager());
        assert!(!stop.should_stop(&progress(1_000_000, 0)));
    }

    #[test]
    fn any_of_fires_when_one_fires() {
        let mut stop = StopConfig::AnyOf {
            conditions: vec![StopConfig::Never, StopConfig::MaxTrials { max: 5 }],
        }
        .build()
        .unwrap();
        stop.init(&manager());
        assert!(!stop.should_stop(&progress(4, 0)));
        assert!(stop.should_stop(&progress(5, 0)));
    }

    #[test]
    fn config_deserializes() {
        let config: StopConfig = serde_json::from_str(
            r#"{"kind": "any_of", "conditions": [{"kind": "max_trials", "max": 20}, {"kind": "time_budget", "seconds": 60}]}"#,
        )
        .unwrap();
        assert_eq!(
            config,
            StopConfig::AnyOf {
                conditions: vec![
                    StopConfig::MaxTrials { max: 20 },
                    StopConfig::TimeBudget { seconds: 60 }
                ]
            }
        );
    }
}
