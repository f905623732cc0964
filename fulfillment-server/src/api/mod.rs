//! HTTP API
//!
//! Operational surface only: health probe and manual job triggers. Both jobs
//! are also fired by the scheduler; the POST endpoints exist so operators can
//! run a cycle on demand and read the count back.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::core::AppState;
use crate::jobs::{OrderGenerator, ShipmentReconciler};
use crate::utils::{AppResponse, ok};

/// Build the service router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tasks/orders/run", post(run_order_generation))
        .route("/tasks/tracking/run", post(run_tracking))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthInfo {
    service: &'static str,
    version: &'static str,
    environment: String,
}

async fn health(State(state): State<AppState>) -> Json<AppResponse<HealthInfo>> {
    ok(HealthInfo {
        service: "fulfillment-server",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.clone(),
    })
}

/// Count returned by a manual job run
#[derive(Debug, Serialize)]
struct TaskRunResult {
    count: usize,
}

async fn run_order_generation(State(state): State<AppState>) -> Json<AppResponse<TaskRunResult>> {
    let generator = OrderGenerator::new(state.db.clone(), state.notifications.clone());
    let count = generator.run(state.clock.as_ref()).await;
    ok(TaskRunResult { count })
}

async fn run_tracking(State(state): State<AppState>) -> Json<AppResponse<TaskRunResult>> {
    let reconciler = ShipmentReconciler::new(
        state.db.clone(),
        state.carrier.clone(),
        state.notifications.clone(),
        state.config.not_found_flag_threshold,
    );
    let count = reconciler.run(state.clock.as_ref()).await;
    ok(TaskRunResult { count })
}
