use serde::{Deserialize, Serialize};

use crate::planning::PlanningError;

pub const PER_ELEM_EXPOSURES: u64 = 3;
pub const MIN_ACTIVE_PER_ROW: u64 = 2;
pub const SAFETY_ROWS: u64 = 3;
pub const ABSENCE_RATIO: f64 = 2.0;
pub const T_RATIO: f64 = 1.5;
pub const CAPACITY_SLACK: u64 = 1;

/// Tuning constants for the exposure planner.
///
/// None of these are derived; they are policy. Missing fields in a serialized
/// policy fall back to the defaults so callers can override a single knob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerPolicy {
    /// Minimum acceptable exposures per element.
    pub per_elem_exposures: u64,
    pub min_active_per_row: u64,
    /// Rows added on top of the main-effects floor.
    pub safety_rows: u64,
    /// Desired absences per exposure within each category.
    pub absence_ratio: f64,
    /// Scale-up applied to the floor; values <= 1 leave it untouched.
    pub t_ratio: f64,
    /// Capacity patterns to keep unused when possible.
    pub capacity_slack: u64,
}

impl Default for PlannerPolicy {
    fn default() -> Self {
        Self {
            per_elem_exposures: PER_ELEM_EXPOSURES,
            min_active_per_row: MIN_ACTIVE_PER_ROW,
            safety_rows: SAFETY_ROWS,
            absence_ratio: ABSENCE_RATIO,
            t_ratio: T_RATIO,
            capacity_slack: CAPACITY_SLACK,
        }
    }
}

impl PlannerPolicy {
    pub fn validate(&self) -> Result<(), PlanningError> {
        if self.per_elem_exposures == 0 {
            return Err(PlanningError::Configuration(
                "per_elem_exposures must be at least 1".to_string(),
            ));
        }
        if !self.absence_ratio.is_finite() || self.absence_ratio < 0.0 {
            return Err(PlanningError::Configuration(format!(
                "absence_ratio must be a finite non-negative number, got {}",
                self.absence_ratio
            )));
        }
        if !self.t_ratio.is_finite() || self.t_ratio <= 0.0 {
            return Err(PlanningError::Configuration(format!(
                "t_ratio must be a finite positive number, got {}",
                self.t_ratio
            )));
        }
        Ok(())
    }

    /// Starting `T` for the search: `max(params + safety_rows, 2)`, scaled up by
    /// `t_ratio` when it exceeds 1. Rejects policies that push it past `u64`.
    pub fn initial_tasks(&self, params: u64) -> Result<u64, PlanningError> {
        let floor = params
            .checked_add(self.safety_rows)
            .ok_or_else(|| {
                PlanningError::Configuration(format!(
                    "safety_rows {} overflows the task floor",
                    self.safety_rows
                ))
            })?
            .max(2);
        if self.t_ratio <= 1.0 {
            return Ok(floor);
        }

        let scaled = (floor as f64 * self.t_ratio).ceil();
        if scaled >= u64::MAX as f64 {
            return Err(PlanningError::Configuration(format!(
                "t_ratio {} scales the task floor {floor} out of range",
                self.t_ratio
            )));
        }
        Ok(scaled as u64)
    }

    /// `ceil(absence_ratio · E)`: the absence floor every category must respect.
    pub fn min_absences(&self, exposures: u64) -> u64 {
        (self.absence_ratio * exposures as f64).ceil() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_constants() {
        let p = PlannerPolicy::default();
        assert_eq!(p.per_elem_exposures, 3);
        assert_eq!(p.min_active_per_row, 2);
        assert_eq!(p.safety_rows, 3);
        assert_eq!(p.absence_ratio, 2.0);
        assert_eq!(p.t_ratio, 1.5);
        assert_eq!(p.capacity_slack, 1);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let p: PlannerPolicy = serde_json::from_str(r#"{"absence_ratio": 1.0}"#).unwrap();
        assert_eq!(p.absence_ratio, 1.0);
        assert_eq!(p.per_elem_exposures, PER_ELEM_EXPOSURES);
    }

    #[test]
    fn test_rejects_bad_values() {
        let zero = PlannerPolicy {
            per_elem_exposures: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());

        let negative = PlannerPolicy {
            absence_ratio: -0.5,
            ..Default::default()
        };
        assert!(negative.validate().is_err());

        let nan = PlannerPolicy {
            t_ratio: f64::NAN,
            ..Default::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_initial_tasks() {
        let p = PlannerPolicy::default();
        assert_eq!(p.initial_tasks(9).unwrap(), 18);
        assert_eq!(p.initial_tasks(4).unwrap(), 11);

        let flat = PlannerPolicy {
            safety_rows: 0,
            t_ratio: 1.0,
            ..Default::default()
        };
        assert_eq!(flat.initial_tasks(0).unwrap(), 2);
    }

    #[test]
    fn test_initial_tasks_rejects_out_of_range_policies() {
        let rows = PlannerPolicy {
            safety_rows: u64::MAX,
            ..Default::default()
        };
        assert!(rows.validate().is_ok());
        assert!(matches!(
            rows.initial_tasks(9),
            Err(PlanningError::Configuration(_))
        ));

        let ratio = PlannerPolicy {
            t_ratio: 1e30,
            ..Default::default()
        };
        assert!(matches!(
            ratio.initial_tasks(181),
            Err(PlanningError::Configuration(_))
        ));
    }

    #[test]
    fn test_min_absences_rounds_up() {
        let p = PlannerPolicy {
            absence_ratio: 1.5,
            ..Default::default()
        };
        assert_eq!(p.min_absences(3), 5);
        assert_eq!(p.min_absences(4), 6);
        assert_eq!(PlannerPolicy::default().min_absences(3), 6);
    }
}
