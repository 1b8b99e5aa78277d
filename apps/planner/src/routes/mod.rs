pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::planning::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Planning API
        .route("/api/v1/plan", post(handlers::handle_plan))
        .route(
            "/api/v1/tasks-per-consumer",
            post(handlers::handle_tasks_per_consumer),
        )
        .route(
            "/api/v1/tasks-per-consumer/consistency",
            post(handlers::handle_consistency),
        )
        .with_state(state)
}
