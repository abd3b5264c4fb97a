//! Field handlers: listing, local edits and manual calibration

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{validate_field_input, Field, FieldInput};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::handlers::schedule::outcome_label;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct FieldMutationResponse {
    pub field: Field,
    /// What happened to the triggered schedule recompute
    pub recompute: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct CalibrationInput {
    pub moisture: Decimal,
}

/// List the current working set of fields
pub async fn list_fields(State(state): State<AppState>) -> Json<Vec<Field>> {
    Json(state.engine.fields())
}

/// Create a field locally; it stays pending until the feed confirms it
pub async fn create_field(
    State(state): State<AppState>,
    Json(input): Json<FieldInput>,
) -> AppResult<(StatusCode, Json<FieldMutationResponse>)> {
    validate_field_input(&input).map_err(|e| AppError::ValidationError(e.to_string()))?;

    let field = input.into_new_field(Uuid::new_v4().to_string());
    let outcome = state.engine.upsert_field(field.clone()).await?;

    Ok((
        StatusCode::CREATED,
        Json(FieldMutationResponse {
            field,
            recompute: outcome_label(outcome),
        }),
    ))
}

/// Edit an existing field's configuration
pub async fn update_field(
    State(state): State<AppState>,
    Path(field_id): Path<String>,
    Json(input): Json<FieldInput>,
) -> AppResult<Json<FieldMutationResponse>> {
    validate_field_input(&input).map_err(|e| AppError::ValidationError(e.to_string()))?;

    let existing = state
        .engine
        .field(&field_id)
        .ok_or_else(|| AppError::NotFound(format!("Field {}", field_id)))?;
    let field = input.apply_to(&existing);
    let outcome = state.engine.upsert_field(field.clone()).await?;

    Ok(Json(FieldMutationResponse {
        field,
        recompute: outcome_label(outcome),
    }))
}

/// Record a manual soil moisture reading
pub async fn calibrate_field(
    State(state): State<AppState>,
    Path(field_id): Path<String>,
    Json(input): Json<CalibrationInput>,
) -> AppResult<Json<Field>> {
    let field = state.engine.calibrate_field(&field_id, input.moisture).await?;
    Ok(Json(field))
}
