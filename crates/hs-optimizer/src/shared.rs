//! Thread-safe handle over a parameter manager.

use parking_lot::Mutex;
use std::sync::Arc;

use hs_types::{ExecutionParameterSet, HsResult, ProcessResult};

use crate::manager::{JobsTodo, ParameterManager};

/// Cloneable handle that serializes every operation on the wrapped manager
/// behind one lock, so several workers can pull configurations and push
/// results concurrently.
#[derive(Clone)]
pub struct SharedParameterManager {
    inner: Arc<Mutex<Box<dyn ParameterManager>>>,
}

impl SharedParameterManager {
    pub fn new(manager: Box<dyn ParameterManager>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(manager)),
        }
    }

    /// Run `f` with exclusive access, for sequences that must not interleave
    /// with other workers.
    pub fn with<T>(&self, f: impl FnOnce(&mut dyn ParameterManager) -> T) -> T {
        let mut guard = self.inner.lock();
        f(guard.as_mut())
    }
}

impl ParameterManager for SharedParameterManager {
    fn name(&self) -> &'static str {
        self.inner.lock().name()
    }

    fn has_jobs_to_explore(&self) -> bool {
        self.inner.lock().has_jobs_to_explore()
    }

    fn jobs_todo(&self) -> JobsTodo {
        self.inner.lock().jobs_todo()
    }

    fn next_parameters(&mut self) -> HsResult<ExecutionParameterSet> {
        self.inner.lock().next_parameters()
    }

    fn can_not_be_done_now(&mut self, params: ExecutionParameterSet) {
        self.inner.lock().can_not_be_done_now(params)
    }

    fn update_observer(&mut self, result: &ProcessResult) {
        self.inner.lock().update_observer(result)
    }

    fn notify_invalid(&mut self, params: &ExecutionParameterSet) {
        self.inner.lock().notify_invalid(params)
    }
}
