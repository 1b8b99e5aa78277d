// Capacity & Exposure Planner
// Decides tasks per respondent (T), exposures per element (E) and per-category
// absence budgets before any concrete task rows are assigned.
// Everything under this module is pure and synchronous; handlers run it inside
// tokio::task::spawn_blocking.

pub mod capacity;
pub mod category;
pub mod exposure;
pub mod handlers;
pub mod identifiability;
pub mod policy;
pub mod tasks;

use thiserror::Error;

pub use exposure::ExposureBound;

/// Errors raised by the planning core. Only the tasks-per-consumer façade is allowed
/// to swallow these; everything else propagates them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanningError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(
        "Infeasible: T={tasks_per_respondent} exceeds visible capacity {capacity}. \
         Add elements/categories or relax absence_ratio/t_ratio."
    )]
    Infeasible {
        tasks_per_respondent: u64,
        capacity: u128,
        /// Best `E` reached at the previous `T`, if the search ran at all.
        exposure_upper: Option<u64>,
        binding_bound: Option<ExposureBound>,
    },

    #[error("Visible capacity does not fit in 128 bits; reduce the number of categories")]
    CapacityOverflow,
}
