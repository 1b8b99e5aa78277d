//! Exposure Planner: searches for the smallest feasible tasks-per-respondent `T`
//! and the largest exposures-per-element `E` at that `T`.
//!
//! # Search
//! 1. Start from the main-effects floor `P + safety_rows` (at least 2), scaled by
//!    `t_ratio` when it exceeds 1.
//! 2. At each `T`, `E` is the smaller of two bounds:
//!    - per-category ratio: `T - q[c]·E >= absence_ratio·E` for every category,
//!      i.e. `E <= floor(T / (q[c] + absence_ratio))`;
//!    - row capacity: `M·E <= T·rowcap`, i.e. `E <= floor(T·rowcap / M)`.
//! 3. Accept the first `T` whose `E` reaches `per_elem_exposures`; otherwise `T += 1`.
//!
//! `T` may never exceed the number of distinct visible row patterns. The planner tries
//! to leave `capacity_slack` patterns unused and drops the slack once `T` reaches it;
//! past the capacity itself the search fails with `PlanningError::Infeasible`.
//! Since `E` is non-decreasing in `T`, a design that falls short even at `T = capacity`
//! is rejected before the search starts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::planning::capacity::visible_capacity;
use crate::planning::category::{CategoryInfo, StudyMode};
use crate::planning::identifiability::params_main_effects;
use crate::planning::policy::PlannerPolicy;
use crate::planning::PlanningError;

// ────────────────────────────────────────────────────────────────────────────
// Output types
// ────────────────────────────────────────────────────────────────────────────

/// Result of one planning call. Field names on the wire follow the study service's
/// established vocabulary (`T`, `E`, `A_map`, `avg_k`, `A_min_used`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    #[serde(rename = "T")]
    pub tasks_per_respondent: u64,
    #[serde(rename = "E")]
    pub exposures_per_element: u64,
    /// Rows (out of `T`) in which each category is absent.
    #[serde(rename = "A_map")]
    pub absences: BTreeMap<String, u64>,
    /// Mean number of active categories per row, `M·E / T`.
    #[serde(rename = "avg_k")]
    pub avg_active_per_row: f64,
    /// `ceil(absence_ratio · E)`; every entry of `absences` is at least this.
    #[serde(rename = "A_min_used")]
    pub min_absences: u64,
}

/// Which of the two exposure bounds limited `E` at a given `T`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureBound {
    PerCategoryRatio,
    RowCapacity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExposureUpper {
    pub exposures: u64,
    pub binding: ExposureBound,
}

// ────────────────────────────────────────────────────────────────────────────
// Public entry point
// ────────────────────────────────────────────────────────────────────────────

/// Plans `(T, E)` and the per-category absence budget for a study.
///
/// `max_active_per_row` only applies to grid studies; layer studies let every
/// layer be active and ignore it.
pub fn plan_t_e_auto(
    info: &CategoryInfo,
    mode: StudyMode,
    max_active_per_row: Option<u64>,
    policy: &PlannerPolicy,
) -> Result<PlanResult, PlanningError> {
    plan_with_capacity(info, mode, max_active_per_row, policy).map(|(plan, _)| plan)
}

/// Like [`plan_t_e_auto`], also returning the visible capacity the search ran against.
pub fn plan_with_capacity(
    info: &CategoryInfo,
    mode: StudyMode,
    max_active_per_row: Option<u64>,
    policy: &PlannerPolicy,
) -> Result<(PlanResult, u128), PlanningError> {
    policy.validate()?;

    let row_limit = match mode {
        StudyMode::Grid => max_active_per_row,
        StudyMode::Layer => None,
    };
    let rowcap = row_limit.unwrap_or_else(|| info.category_count());

    let p = params_main_effects(info);
    let capacity = visible_capacity(info, policy.min_active_per_row, row_limit)?;
    let mut t = policy.initial_tasks(p)?;

    debug!(
        mode = %mode,
        params = p,
        capacity = %capacity,
        rowcap,
        initial_t = t,
        "Exposure planner: starting search"
    );

    // E never shrinks as T grows, so if the largest T the search may reach still
    // falls short, no T will do.
    if u128::from(t) <= capacity {
        let t_max = u64::try_from(capacity).unwrap_or(u64::MAX);
        let best = exposure_upper_at(info, t_max, rowcap, policy);
        if best.exposures < policy.per_elem_exposures {
            return Err(PlanningError::Infeasible {
                tasks_per_respondent: t_max.saturating_add(1),
                capacity,
                exposure_upper: Some(best.exposures),
                binding_bound: Some(best.binding),
            });
        }
    }

    let mut slack = u128::from(policy.capacity_slack);
    let mut last_upper: Option<ExposureUpper> = None;

    let upper = loop {
        let t_wide = u128::from(t);
        if t_wide > capacity.saturating_sub(slack) {
            if t_wide > capacity {
                return Err(PlanningError::Infeasible {
                    tasks_per_respondent: t,
                    capacity,
                    exposure_upper: last_upper.map(|u| u.exposures),
                    binding_bound: last_upper.map(|u| u.binding),
                });
            }
            slack = 0;
        }

        let upper = exposure_upper_at(info, t, rowcap, policy);
        if upper.exposures >= policy.per_elem_exposures {
            break upper;
        }
        last_upper = Some(upper);
        t = t.checked_add(1).ok_or(PlanningError::Infeasible {
            tasks_per_respondent: t,
            capacity,
            exposure_upper: Some(upper.exposures),
            binding_bound: Some(upper.binding),
        })?;
    };

    let e = upper.exposures;
    let min_absences = policy.min_absences(e);
    let absences = absence_budget(info, t, e);
    let avg_active_per_row = average_active(info.total_elements(), e, t);

    debug!(
        t,
        e,
        binding = ?upper.binding,
        min_absences,
        "Exposure planner: accepted plan"
    );

    let plan = PlanResult {
        tasks_per_respondent: t,
        exposures_per_element: e,
        absences,
        avg_active_per_row,
        min_absences,
    };
    Ok((plan, capacity))
}

/// `T - q[c]·E` per category, floored at 0. Products are taken in `u128`.
fn absence_budget(info: &CategoryInfo, t: u64, e: u64) -> BTreeMap<String, u64> {
    info.iter_counts()
        .map(|(name, q)| {
            let shown = u128::from(q) * u128::from(e);
            let absent = u128::from(t).saturating_sub(shown);
            // absent <= t
            (name.to_string(), u64::try_from(absent).unwrap_or(t))
        })
        .collect()
}

/// `M·E / T`
fn average_active(total_elements: u64, e: u64, t: u64) -> f64 {
    (u128::from(total_elements) * u128::from(e)) as f64 / t as f64
}

// ────────────────────────────────────────────────────────────────────────────
// Bounds
// ────────────────────────────────────────────────────────────────────────────

/// Largest `E` feasible at `t`, with the bound that produced it.
/// Ties are reported as `PerCategoryRatio`.
pub(crate) fn exposure_upper_at(
    info: &CategoryInfo,
    t: u64,
    rowcap: u64,
    policy: &PlannerPolicy,
) -> ExposureUpper {
    let ratio_bound = info
        .counts()
        .iter()
        .map(|&q| (t as f64 / (q as f64 + policy.absence_ratio)).floor() as u64)
        .min()
        .unwrap_or(0);

    // M >= 1 is guaranteed by CategoryInfo.
    let rowcap_bound = u128::from(t) * u128::from(rowcap) / u128::from(info.total_elements());
    let rowcap_bound = u64::try_from(rowcap_bound).unwrap_or(u64::MAX);

    if ratio_bound <= rowcap_bound {
        ExposureUpper {
            exposures: ratio_bound,
            binding: ExposureBound::PerCategoryRatio,
        }
    } else {
        ExposureUpper {
            exposures: rowcap_bound,
            binding: ExposureBound::RowCapacity,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
