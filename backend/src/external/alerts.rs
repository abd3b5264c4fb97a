//! Alert sinks
//!
//! Delivery is fire-and-forget: callers never retry and never wait on a
//! confirmation beyond the HTTP status.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::NotificationDeliveryError;

/// User-facing alert
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub body: String,
    pub icon: String,
    /// Deduplication tag understood by the receiving platform
    pub tag: String,
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, alert: &Alert) -> Result<(), NotificationDeliveryError>;
}

/// Push gateway client
#[derive(Clone)]
pub struct PushAlertSink {
    endpoint: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct PushGatewayResponse {
    #[serde(default)]
    message: Option<String>,
}

impl PushAlertSink {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AlertSink for PushAlertSink {
    async fn deliver(&self, alert: &Alert) -> Result<(), NotificationDeliveryError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(alert)
            .send()
            .await
            .map_err(|e| NotificationDeliveryError::Delivery(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let error: PushGatewayResponse = response
                .json()
                .await
                .unwrap_or(PushGatewayResponse { message: None });
            Err(NotificationDeliveryError::Rejected(
                error.message.unwrap_or_else(|| "Unknown error".to_string()),
            ))
        }
    }
}

/// Sink used when no push gateway is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn deliver(&self, alert: &Alert) -> Result<(), NotificationDeliveryError> {
        tracing::info!(tag = %alert.tag, "{}: {}", alert.title, alert.body);
        Ok(())
    }
}
