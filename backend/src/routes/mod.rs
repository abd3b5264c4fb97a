//! Route definitions for the AquaCrop irrigation engine

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // External field feed (HMAC-signed when a secret is configured)
        .route("/feed/fields", post(handlers::push_fields))
        .nest("/fields", field_routes())
        .nest("/schedule", schedule_routes())
        .route("/environment", get(handlers::get_environment))
        .route("/activity", get(handlers::get_activity))
        .route(
            "/session",
            get(handlers::get_session).put(handlers::update_session),
        )
}

/// Field management routes
fn field_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_fields).post(handlers::create_field))
        .route("/:field_id", put(handlers::update_field))
        .route("/:field_id/calibration", post(handlers::calibrate_field))
}

/// Irrigation plan routes
fn schedule_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_schedule))
        .route("/recompute", post(handlers::recompute_schedule))
}
