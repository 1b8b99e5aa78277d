use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::planning::category::{CategoryInfo, CategoryInput, StudyMode};
use crate::planning::exposure::{plan_with_capacity, PlanResult};
use crate::planning::identifiability::params_main_effects;
use crate::planning::policy::PlannerPolicy;
use crate::planning::tasks::{ConsistencyReport, TaskCalculator};
use crate::planning::PlanningError;
use crate::state::AppState;

/// Ceilings on a policy supplied with a request. The server's own policy is not checked.
const MAX_REQUEST_EXPOSURES: u64 = 1_000;
const MAX_REQUEST_SAFETY_ROWS: u64 = 10_000;
const MAX_REQUEST_RATIO: f64 = 100.0;

#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    #[serde(default)]
    pub study_mode: StudyMode,
    #[serde(alias = "layers")]
    pub categories: Vec<CategoryInput>,
    pub max_active_per_row: Option<u64>,
    /// Overrides the server's policy for this call only.
    pub policy: Option<PlannerPolicy>,
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub plan: PlanResult,
    pub study_mode: StudyMode,
    pub params_main_effects: u64,
    pub visible_capacity: u128,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct TasksRequest {
    pub total_elements: Option<u64>,
    #[serde(default, alias = "layers")]
    pub categories: Option<Vec<CategoryInput>>,
    #[serde(default)]
    pub study_mode: StudyMode,
    #[serde(default = "default_use_advanced")]
    pub use_advanced: bool,
}

fn default_use_advanced() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct TasksResponse {
    pub tasks_per_consumer: u64,
    pub total_elements: u64,
    pub study_mode: StudyMode,
}

/// POST /api/v1/plan
pub async fn handle_plan(
    State(state): State<AppState>,
    Json(req): Json<PlanRequest>,
) -> Result<Json<PlanResponse>, AppError> {
    let policy = req
        .policy
        .clone()
        .unwrap_or_else(|| state.calculator.policy.clone());

    // Capacity enumeration and the T search are CPU-bound.
    let response = tokio::task::spawn_blocking(move || build_plan_response(&req, &policy))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed in planner: {e}")))??;

    info!(
        mode = %response.study_mode,
        tasks = response.plan.tasks_per_respondent,
        exposures = response.plan.exposures_per_element,
        "Planned study"
    );
    Ok(Json(response))
}

/// POST /api/v1/tasks-per-consumer
pub async fn handle_tasks_per_consumer(
    State(state): State<AppState>,
    Json(req): Json<TasksRequest>,
) -> Result<Json<TasksResponse>, AppError> {
    let calculator = state.calculator.clone();
    let response = tokio::task::spawn_blocking(move || -> Result<TasksResponse, AppError> {
        let (total_elements, info) = resolve_inputs(&req)?;
        let tasks_per_consumer = calculator.tasks_per_consumer(
            total_elements,
            info.as_ref(),
            req.study_mode,
            req.use_advanced,
        );
        Ok(TasksResponse {
            tasks_per_consumer,
            total_elements,
            study_mode: req.study_mode,
        })
    })
    .await
    .map_err(|e| {
        AppError::Internal(anyhow::anyhow!(
            "spawn_blocking failed in tasks-per-consumer: {e}"
        ))
    })??;

    Ok(Json(response))
}

/// POST /api/v1/tasks-per-consumer/consistency
pub async fn handle_consistency(
    State(state): State<AppState>,
    Json(req): Json<TasksRequest>,
) -> Result<Json<ConsistencyReport>, AppError> {
    let calculator: TaskCalculator = state.calculator.clone();
    let report = tokio::task::spawn_blocking(move || -> Result<ConsistencyReport, AppError> {
        let (total_elements, info) = resolve_inputs(&req)?;
        Ok(calculator.consistency(total_elements, info.as_ref(), req.study_mode))
    })
    .await
    .map_err(|e| {
        AppError::Internal(anyhow::anyhow!("spawn_blocking failed in consistency check: {e}"))
    })??;

    if !report.fallbacks_agree() {
        warn!(
            simple = report.simple,
            javascript = report.javascript,
            "Fallback calculators diverged"
        );
    }
    Ok(Json(report))
}

// ────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ────────────────────────────────────────────────────────────────────────────

pub(crate) fn build_plan_response(
    req: &PlanRequest,
    policy: &PlannerPolicy,
) -> Result<PlanResponse, PlanningError> {
    if let Some(requested) = &req.policy {
        check_request_policy(requested)?;
    }
    let info = CategoryInfo::from_inputs(&req.categories)?;
    let (plan, capacity) =
        plan_with_capacity(&info, req.study_mode, req.max_active_per_row, policy)?;

    Ok(PlanResponse {
        plan,
        study_mode: req.study_mode,
        params_main_effects: params_main_effects(&info),
        visible_capacity: capacity,
        generated_at: Utc::now(),
    })
}

/// Keeps a caller-supplied policy within limits that bound the T search.
fn check_request_policy(policy: &PlannerPolicy) -> Result<(), PlanningError> {
    if policy.per_elem_exposures > MAX_REQUEST_EXPOSURES {
        return Err(PlanningError::Configuration(format!(
            "per_elem_exposures may be at most {MAX_REQUEST_EXPOSURES}"
        )));
    }
    if policy.safety_rows > MAX_REQUEST_SAFETY_ROWS {
        return Err(PlanningError::Configuration(format!(
            "safety_rows may be at most {MAX_REQUEST_SAFETY_ROWS}"
        )));
    }
    if policy.absence_ratio > MAX_REQUEST_RATIO || policy.t_ratio > MAX_REQUEST_RATIO {
        return Err(PlanningError::Configuration(format!(
            "absence_ratio and t_ratio may be at most {MAX_REQUEST_RATIO}"
        )));
    }
    policy.validate()
}

/// An empty category list counts as "no categories", matching the façade's
/// "advanced only when categories are supplied" rule.
fn resolve_inputs(req: &TasksRequest) -> Result<(u64, Option<CategoryInfo>), AppError> {
    let info = req
        .categories
        .as_deref()
        .filter(|c| !c.is_empty())
        .map(CategoryInfo::from_inputs)
        .transpose()?;

    let total_elements = req
        .total_elements
        .or_else(|| info.as_ref().map(CategoryInfo::total_elements))
        .ok_or_else(|| {
            AppError::Validation("Either 'total_elements' or 'categories' is required".to_string())
        })?;

    Ok((total_elements, info))
}
