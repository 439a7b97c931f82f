//! Live recalculation engine: derivations, dependency ordering, pending
//! states and the worker pool that resolves them.

pub mod context;
pub mod derivation;
pub mod eval;
pub mod graph;
mod pass;
pub mod pending;
pub mod scheduler;
pub mod worker;

#[cfg(test)]
mod tests;

use std::time::Duration;

pub use context::DerivationContext;
pub use derivation::{Derivation, DerivationId};
pub use eval::LiveTable;
pub use graph::{AggregateExclusion, DependencyGraph, NoExclusion, Region};
pub use pending::{CorrelationId, PendingRegistry, PendingState};
pub use scheduler::Scheduler;
pub use worker::{ResultPoster, WorkerPool, current_correlation, post_result};

use crate::traits::TableStore;

/// Engine configuration, read once when the table is built.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Rounding digits applied to derivations created without an explicit
    /// precision. `None` keeps full precision.
    pub precision: Option<u32>,
    /// Worker threads kept alive while idle.
    pub core_pool_size: usize,
    pub max_pool_size: usize,
    /// How long a worker above the core size may sit idle.
    pub keep_alive: Duration,
    pub thread_name_prefix: String,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            precision: None,
            core_pool_size: 2,
            max_pool_size: 8,
            keep_alive: Duration::from_secs(60),
            thread_name_prefix: "livetab-worker".to_string(),
        }
    }
}

impl EvalConfig {
    pub fn with_precision(mut self, digits: u32) -> Self {
        self.precision = Some(digits);
        self
    }

    pub fn with_pool_size(mut self, core: usize, max: usize) -> Self {
        self.core_pool_size = core;
        self.max_pool_size = max.max(core).max(1);
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }
}

/// Construct a live table over `store` with the given configuration
pub fn new_live_table<S>(store: S, config: EvalConfig) -> LiveTable<S>
where
    S: TableStore + 'static,
{
    LiveTable::new(store, config)
}
