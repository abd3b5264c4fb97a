use axum::{extract::State, Json};
use serde::Deserialize;
use shared::ServiceTier;

use crate::services::engine::SessionContext;
use crate::AppState;

/// Partial session change; omitted values keep their current setting
#[derive(Debug, Deserialize)]
pub struct SessionUpdate {
    pub tier: Option<ServiceTier>,
    pub alerts_permitted: Option<bool>,
    pub read_only: Option<bool>,
}

pub async fn get_session(State(state): State<AppState>) -> Json<SessionContext> {
    Json(state.engine.session())
}

pub async fn update_session(
    State(state): State<AppState>,
    Json(update): Json<SessionUpdate>,
) -> Json<SessionContext> {
    let current = state.engine.session();
    let next = SessionContext {
        tier: update.tier.unwrap_or(current.tier),
        alerts_permitted: update.alerts_permitted.unwrap_or(current.alerts_permitted),
        read_only: update.read_only.unwrap_or(current.read_only),
    };

    Json(state.engine.update_session(next).await)
}
