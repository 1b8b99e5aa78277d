use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::planning::PlanningError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Planning error: {0}")]
    Planning(#[from] PlanningError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut details = Value::Null;

        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Planning(PlanningError::Configuration(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Planning(e) => {
                tracing::warn!("Infeasible design: {e}");
                if let PlanningError::Infeasible {
                    tasks_per_respondent,
                    capacity,
                    exposure_upper,
                    binding_bound,
                } = e
                {
                    details = json!({
                        "tasks_per_respondent": tasks_per_respondent,
                        // Capacity can exceed what a JSON number holds losslessly.
                        "capacity": u64::try_from(*capacity)
                            .map(Value::from)
                            .unwrap_or_else(|_| Value::String(capacity.to_string())),
                        "exposure_upper": exposure_upper,
                        "binding_bound": binding_bound,
                    });
                }
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "INFEASIBLE_DESIGN",
                    e.to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if !details.is_null() {
            error["details"] = details;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planning::ExposureBound;

    async fn body_json(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_configuration_error_is_bad_request() {
        let resp = AppError::from(PlanningError::Configuration("no categories".into())).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["message"], "no categories");
    }

    #[tokio::test]
    async fn test_infeasible_is_unprocessable_with_details() {
        let resp = AppError::from(PlanningError::Infeasible {
            tasks_per_respondent: 7,
            capacity: 6,
            exposure_upper: Some(2),
            binding_bound: Some(ExposureBound::RowCapacity),
        })
        .into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["code"], "INFEASIBLE_DESIGN");
        assert_eq!(body["error"]["details"]["capacity"], 6);
        assert_eq!(body["error"]["details"]["binding_bound"], "row_capacity");
    }

    #[tokio::test]
    async fn test_huge_capacity_is_stringified() {
        let resp = AppError::from(PlanningError::Infeasible {
            tasks_per_respondent: 7,
            capacity: u128::MAX,
            exposure_upper: None,
            binding_bound: None,
        })
        .into_response();
        let body = body_json(resp).await;
        assert_eq!(
            body["error"]["details"]["capacity"],
            Value::String(u128::MAX.to_string())
        );
    }

    #[tokio::test]
    async fn test_validation_error_is_bad_request() {
        let resp = AppError::Validation("missing input".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let resp = AppError::Internal(anyhow::anyhow!("secret")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["message"], "An internal server error occurred");
    }
}
