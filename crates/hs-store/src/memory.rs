use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use hs_types::{ExecutionParameterSet, HsResult, SaverAnswer};

use crate::ResultsSaver;

/// Lookup and write counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaverStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub overwrites: u64,
}

impl SaverStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// In-process results store shared by every worker of one process.
#[derive(Debug)]
pub struct MemoryResultsSaver<R> {
    entries: DashMap<ExecutionParameterSet, R>,
    stats: RwLock<SaverStats>,
}

impl<R> MemoryResultsSaver<R> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            stats: RwLock::new(SaverStats::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> SaverStats {
        *self.stats.read()
    }
}

impl<R> Default for MemoryResultsSaver<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> ResultsSaver<R> for MemoryResultsSaver<R>
where
    R: Clone + Send + Sync,
{
    fn job_done(&self, params: &ExecutionParameterSet) -> HsResult<SaverAnswer<R>> {
        let answer = match self.entries.get(params) {
            Some(entry) => SaverAnswer::Done(entry.value().clone()),
            None => SaverAnswer::NotDone,
        };
        let mut stats = self.stats.write();
        if answer.is_done() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        Ok(answer)
    }

    fn save_result(&self, params: &ExecutionParameterSet, result: &R) -> HsResult<()> {
        let previous = self.entries.insert(params.clone(), result.clone());
        let mut stats = self.stats.write();
        stats.writes += 1;
        if previous.is_some() {
            stats.overwrites += 1;
            debug!("Overwrote stored result for {}", params);
        }
        Ok(())
    }
}
