use crate::config::Config;
use crate::planning::tasks::TaskCalculator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Debug, Clone)]
pub struct AppState {
    #[allow(dead_code)]
    pub config: Config,
    /// Planner policy and grid row cap used by every planning handler.
    pub calculator: TaskCalculator,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let calculator = TaskCalculator::new(config.policy.clone(), config.grid_row_cap);
        Self { config, calculator }
    }
}
