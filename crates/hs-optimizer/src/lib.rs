//! # hs-optimizer
//!
//! Parameter managers for Hypersweep.
//!
//! Provides the search-space expansion algorithm, the [`ParameterManager`]
//! strategy contract, a uniform random strategy, an exhaustive grid strategy,
//! and a lock-protected handle for sharing a manager between workers.

pub mod expansion;
mod grid;
mod manager;
mod random;
mod shared;

pub use expansion::{expand_parameter, expand_space, ValuePicker, ValuePools};
pub use grid::GridSearchManager;
pub use manager::{JobsTodo, ManagerConfig, ParameterManager};
pub use random::RandomSearchManager;
pub use shared::SharedParameterManager;
