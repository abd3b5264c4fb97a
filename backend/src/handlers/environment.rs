use axum::{extract::State, Json};
use serde::Serialize;
use shared::{EnvironmentalSnapshot, FarmLocation};

use crate::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct EnvironmentResponse {
    pub location: FarmLocation,
    pub snapshot: EnvironmentalSnapshot,
}

/// Latest environmental snapshot for the farm
pub async fn get_environment(State(state): State<AppState>) -> AppResult<Json<EnvironmentResponse>> {
    let snapshot = state
        .engine
        .environment()
        .ok_or_else(|| AppError::NotFound("Environmental snapshot".to_string()))?;

    Ok(Json(EnvironmentResponse {
        location: state.engine.location().clone(),
        snapshot,
    }))
}
