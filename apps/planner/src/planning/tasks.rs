//! Tasks-per-consumer façade.
//!
//! Wraps the exposure planner and two closed-form fallbacks. The façade never fails:
//! when the planner cannot produce a plan it logs the reason and answers with the
//! simple fallback instead.
//!
//! Both fallbacks pick a row size `K` by element-count tier, take half of
//! `C(total_elements, K)` and clamp it to a tiered ceiling. They differ only in how
//! the binomial coefficient is computed; the `javascript` variant reproduces the
//! browser client's floor-division loop so both sides agree bit for bit.

use serde::Serialize;
use tracing::{debug, warn};

use crate::planning::category::{CategoryInfo, StudyMode};
use crate::planning::exposure::{plan_t_e_auto, PlanResult};
use crate::planning::policy::PlannerPolicy;
use crate::planning::PlanningError;

/// Designs with fewer elements than this get `MIN_TASKS` without any planning.
pub const MIN_TOTAL_ELEMENTS: u64 = 4;
pub const MIN_TASKS: u64 = 8;
/// Grid studies are planned with at most this many active categories per row.
pub const DEFAULT_GRID_ROW_CAP: u64 = 4;

// ────────────────────────────────────────────────────────────────────────────
// Calculator
// ────────────────────────────────────────────────────────────────────────────

/// Advanced-mode settings shared by every façade call.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskCalculator {
    pub policy: PlannerPolicy,
    pub grid_row_cap: u64,
}

impl Default for TaskCalculator {
    fn default() -> Self {
        Self {
            policy: PlannerPolicy::default(),
            grid_row_cap: DEFAULT_GRID_ROW_CAP,
        }
    }
}

/// Every strategy's answer for the same input, keyed by strategy name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyReport {
    pub simple: u64,
    pub javascript: u64,
    /// What the façade answers in advanced mode; present only with categories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advanced: Option<u64>,
    /// Planner failure that made `advanced` fall back to the simple value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advanced_error: Option<String>,
}

impl ConsistencyReport {
    pub fn fallbacks_agree(&self) -> bool {
        self.simple == self.javascript
    }
}

impl TaskCalculator {
    pub fn new(policy: PlannerPolicy, grid_row_cap: u64) -> Self {
        Self {
            policy,
            grid_row_cap,
        }
    }

    /// Runs the exposure planner with the façade's row-cap rule:
    /// `min(grid_row_cap, C)` for grid studies, uncapped for layer studies.
    pub fn plan(&self, info: &CategoryInfo, mode: StudyMode) -> Result<PlanResult, PlanningError> {
        let max_active = match mode {
            StudyMode::Grid => Some(self.grid_row_cap.min(info.category_count())),
            StudyMode::Layer => None,
        };
        plan_t_e_auto(info, mode, max_active, &self.policy)
    }

    /// Tasks per respondent. Never fails; planner errors degrade to the simple fallback.
    pub fn tasks_per_consumer(
        &self,
        total_elements: u64,
        info: Option<&CategoryInfo>,
        mode: StudyMode,
        use_advanced: bool,
    ) -> u64 {
        self.resolve(total_elements, info, mode, use_advanced).0
    }

    /// Runs every strategy and reports all answers side by side. `advanced` is
    /// exactly what `tasks_per_consumer` returns in advanced mode.
    pub fn consistency(
        &self,
        total_elements: u64,
        info: Option<&CategoryInfo>,
        mode: StudyMode,
    ) -> ConsistencyReport {
        let (advanced, advanced_error) = match info {
            Some(info) => {
                let (tasks, error) = self.resolve(total_elements, Some(info), mode, true);
                (Some(tasks), error.map(|e| e.to_string()))
            }
            None => (None, None),
        };

        ConsistencyReport {
            simple: calculate_tasks_per_consumer_simple(total_elements),
            javascript: calculate_tasks_per_consumer_javascript(total_elements),
            advanced,
            advanced_error,
        }
    }

    /// The façade's answer together with the planner error it swallowed, if any.
    fn resolve(
        &self,
        total_elements: u64,
        info: Option<&CategoryInfo>,
        mode: StudyMode,
        use_advanced: bool,
    ) -> (u64, Option<PlanningError>) {
        if total_elements < MIN_TOTAL_ELEMENTS {
            return (MIN_TASKS, None);
        }

        if use_advanced {
            if let Some(info) = info {
                match self.plan(info, mode) {
                    Ok(plan) => {
                        debug!(
                            tasks = plan.tasks_per_respondent,
                            exposures = plan.exposures_per_element,
                            "Advanced planner calculated tasks_per_consumer"
                        );
                        return (plan.tasks_per_respondent, None);
                    }
                    Err(e) => {
                        warn!(
                            error = %e,
                            total_elements,
                            "Advanced planner failed, using simple fallback"
                        );
                        return (calculate_tasks_per_consumer_simple(total_elements), Some(e));
                    }
                }
            }
        }

        (calculate_tasks_per_consumer_simple(total_elements), None)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Free-function entry points (default policy)
// ────────────────────────────────────────────────────────────────────────────

#[allow(dead_code)]
pub fn calculate_tasks_per_consumer(
    total_elements: u64,
    info: Option<&CategoryInfo>,
    mode: StudyMode,
    use_advanced: bool,
) -> u64 {
    TaskCalculator::default().tasks_per_consumer(total_elements, info, mode, use_advanced)
}

#[allow(dead_code)]
pub fn validate_calculation_consistency(
    total_elements: u64,
    info: Option<&CategoryInfo>,
    mode: StudyMode,
) -> ConsistencyReport {
    TaskCalculator::default().consistency(total_elements, info, mode)
}

// ────────────────────────────────────────────────────────────────────────────
// Closed-form fallbacks
// ────────────────────────────────────────────────────────────────────────────

pub fn calculate_tasks_per_consumer_simple(total_elements: u64) -> u64 {
    if total_elements < MIN_TOTAL_ELEMENTS {
        return MIN_TASKS;
    }
    let k = row_size_for(total_elements);
    let max_combinations = binomial(total_elements, k);
    let tasks = clamp_tasks(total_elements, max_combinations);
    debug!(
        total_elements,
        k,
        max_combinations = %max_combinations,
        tasks,
        "Simple calculation"
    );
    tasks
}

pub fn calculate_tasks_per_consumer_javascript(total_elements: u64) -> u64 {
    if total_elements < MIN_TOTAL_ELEMENTS {
        return MIN_TASKS;
    }
    let k = row_size_for(total_elements);
    let max_combinations = javascript_combination(total_elements, k);
    let tasks = clamp_tasks(total_elements, max_combinations);
    debug!(
        total_elements,
        k,
        max_combinations = %max_combinations,
        tasks,
        "JavaScript-compatible calculation"
    );
    tasks
}

fn row_size_for(total_elements: u64) -> u64 {
    match total_elements {
        0..=8 => 2,
        9..=16 => 3,
        _ => 4,
    }
}

fn max_tasks_for(total_elements: u64) -> u64 {
    match total_elements {
        0..=16 => 24,
        17..=32 => 48,
        33..=64 => 96,
        _ => 120,
    }
}

/// `min(max_cap, max(1, floor(combinations / 2)))`
fn clamp_tasks(total_elements: u64, max_combinations: u128) -> u64 {
    let half = (max_combinations / 2).max(1);
    let cap = max_tasks_for(total_elements);
    u64::try_from(half).map_or(cap, |h| h.min(cap))
}

/// `C(n, k)` as falling factorial over `k!`. Saturates at `u128::MAX`, which only
/// happens far above every tier ceiling.
fn binomial(n: u64, k: u64) -> u128 {
    if k > n {
        return 0;
    }
    let n = u128::from(n);
    let k = u128::from(k);
    let mut numerator: u128 = 1;
    let mut denominator: u128 = 1;
    for i in 0..k {
        numerator = match numerator.checked_mul(n - i) {
            Some(v) => v,
            None => return u128::MAX,
        };
        denominator *= i + 1;
    }
    numerator / denominator
}

/// Mirrors the client-side loop: `result = floor(result * (n - i + 1) / i)`.
fn javascript_combination(n: u64, k: u64) -> u128 {
    if k > n {
        return 0;
    }
    if k == 0 || k == n {
        return 1;
    }
    let n = u128::from(n);
    let mut result: u128 = 1;
    for i in 1..=u128::from(k) {
        result = match result.checked_mul(n - i + 1) {
            Some(v) => v / i,
            None => return u128::MAX,
        };
    }
    result
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
