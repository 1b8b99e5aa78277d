use std::fmt::Display;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};

use crate::planning::policy::PlannerPolicy;
use crate::planning::tasks::DEFAULT_GRID_ROW_CAP;

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub policy: PlannerPolicy,
    /// Grid studies planned through the façade use `min(grid_row_cap, C)`.
    pub grid_row_cap: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = PlannerPolicy::default();
        let policy = PlannerPolicy {
            per_elem_exposures: parse_or(
                &lookup,
                "PLANNER_PER_ELEM_EXPOSURES",
                defaults.per_elem_exposures,
            )?,
            min_active_per_row: parse_or(
                &lookup,
                "PLANNER_MIN_ACTIVE_PER_ROW",
                defaults.min_active_per_row,
            )?,
            safety_rows: parse_or(&lookup, "PLANNER_SAFETY_ROWS", defaults.safety_rows)?,
            absence_ratio: parse_or(&lookup, "PLANNER_ABSENCE_RATIO", defaults.absence_ratio)?,
            t_ratio: parse_or(&lookup, "PLANNER_T_RATIO", defaults.t_ratio)?,
            capacity_slack: parse_or(&lookup, "PLANNER_CAPACITY_SLACK", defaults.capacity_slack)?,
        };
        policy
            .validate()
            .context("Planner policy from environment is invalid")?;

        Ok(Config {
            port: parse_or(&lookup, "PORT", 8080u16).context("PORT must be a valid port number")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            policy,
            grid_row_cap: parse_or(&lookup, "PLANNER_GRID_ROW_CAP", DEFAULT_GRID_ROW_CAP)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("Environment variable '{key}' has invalid value '{raw}': {e}")),
        None => Ok(default),
    }
}
