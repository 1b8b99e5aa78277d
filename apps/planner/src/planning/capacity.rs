//! Capacity Enumerator: counts distinct absence-collapsed row patterns.
//!
//! Each category contributes the generating polynomial `1 + q[c]·x`: the constant
//! term is the absent state, the linear term picks one of its `q[c]` elements.
//! Multiplying these across categories gives a polynomial whose `x^k` coefficient
//! is the number of distinct rows with exactly `k` active categories.
//!
//! Coefficients grow like `∏(1 + q[c])`, so the convolution runs on `u128` with
//! checked arithmetic and reports `CapacityOverflow` rather than wrapping.

use crate::planning::category::CategoryInfo;
use crate::planning::PlanningError;

/// Coefficients of `∏(1 + q[c]·x)`; index `k` holds the pattern count with `k` actives.
pub fn active_count_coefficients(info: &CategoryInfo) -> Result<Vec<u128>, PlanningError> {
    let c = info.counts().len();
    let mut coeff = vec![0u128; c + 1];
    coeff[0] = 1;

    for (step, &q) in info.counts().iter().enumerate() {
        let q = u128::from(q);
        // After `step` categories only degrees 0..=step are populated; walk them
        // downwards so the update can happen in place.
        for k in (0..=step).rev() {
            if coeff[k] == 0 {
                continue;
            }
            let chosen = coeff[k]
                .checked_mul(q)
                .ok_or(PlanningError::CapacityOverflow)?;
            coeff[k + 1] = coeff[k + 1]
                .checked_add(chosen)
                .ok_or(PlanningError::CapacityOverflow)?;
        }
    }

    Ok(coeff)
}

/// Number of distinct row patterns whose active-category count lies in
/// `[max(min_active, 0), min(max_active or C, C)]`. An empty range yields 0.
pub fn visible_capacity(
    info: &CategoryInfo,
    min_active: u64,
    max_active: Option<u64>,
) -> Result<u128, PlanningError> {
    let coeff = active_count_coefficients(info)?;
    let c = info.category_count();
    let hi = max_active.map_or(c, |m| m.min(c));
    let lo = min_active;
    if lo > hi {
        return Ok(0);
    }

    coeff[lo as usize..=hi as usize]
        .iter()
        .try_fold(0u128, |acc, &n| acc.checked_add(n))
        .ok_or(PlanningError::CapacityOverflow)
}
