//! External field feed webhook

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use shared::Field;

use crate::error::{AppError, AppResult};
use crate::AppState;

pub const FEED_SIGNATURE_HEADER: &str = "x-feed-signature";

#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub success: bool,
    pub fields: usize,
}

/// Receive the authoritative field list and merge it into the store
pub async fn push_fields(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<FeedResponse>> {
    if let Some(secret) = state.config.feed.webhook_secret.as_deref() {
        if let Err(e) = verify_feed_signature(secret, &headers, &body) {
            tracing::warn!("Field feed signature verification failed: {}", e);
            return Err(AppError::Unauthorized("Invalid signature".to_string()));
        }
    }

    let fields: Vec<Field> = serde_json::from_slice(&body)
        .map_err(|e| AppError::ValidationError(format!("Invalid field list: {}", e)))?;

    state.engine.merge_fields(fields).await;

    Ok(Json(FeedResponse {
        success: true,
        fields: state.engine.fields().len(),
    }))
}

/// Signature of a feed body: base64(HMAC-SHA256(body, secret))
pub fn sign_feed_body(secret: &str, body: &[u8]) -> Result<String, String> {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "Failed to create HMAC")?;
    mac.update(body);
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Check the feed signature header against the body
pub fn verify_feed_signature(secret: &str, headers: &HeaderMap, body: &[u8]) -> Result<(), String> {
    let signature = headers
        .get(FEED_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or("Missing x-feed-signature header")?;

    let expected = sign_feed_body(secret, body)?;
    if signature != expected {
        return Err("Signature mismatch".to_string());
    }

    Ok(())
}
