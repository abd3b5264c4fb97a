//! Irrigation plan handlers

use axum::{extract::State, Json};
use serde::Serialize;
use shared::IrrigationEvent;

use crate::error::{AppError, AppResult};
use crate::services::engine::RecomputeOutcome;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub events: Vec<IrrigationEvent>,
    pub computing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecomputeResponse {
    pub status: &'static str,
    pub events: usize,
}

pub fn outcome_label(outcome: RecomputeOutcome) -> &'static str {
    match outcome {
        RecomputeOutcome::Completed(_) => "completed",
        RecomputeOutcome::Skipped => "already_running",
        RecomputeOutcome::Failed => "failed",
        RecomputeOutcome::NoInput => "no_input",
    }
}

/// Current irrigation plan
pub async fn get_schedule(State(state): State<AppState>) -> Json<ScheduleResponse> {
    Json(ScheduleResponse {
        events: state.engine.plan(),
        computing: state.engine.is_computing(),
        focus: state.engine.focus(),
    })
}

/// Recompute the plan now. Dropped with 409 when a computation is in flight.
pub async fn recompute_schedule(State(state): State<AppState>) -> AppResult<Json<RecomputeResponse>> {
    let outcome = state.engine.recompute().await;
    if outcome == RecomputeOutcome::Skipped {
        return Err(AppError::AlreadyRunning);
    }

    Ok(Json(RecomputeResponse {
        status: outcome_label(outcome),
        events: state.engine.plan().len(),
    }))
}
