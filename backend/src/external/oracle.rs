//! Remote scheduling oracle client
//!
//! The oracle receives the same structured inputs as the local water balance
//! and must answer with a plan of the same shape. Anything that does not parse
//! into that shape is a `SchedulingError`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    ActivityLogEntry, EventStatus, GpsCoordinates, GrowthData, GrowthStage, IrrigationEvent,
    IrrigationSystem, SoilType, WeatherData,
};

use crate::error::SchedulingError;
use crate::services::focus::{FocusAdvisor, FocusSummary};
use crate::services::scheduling::{ScheduleRequest, ScheduleStrategy};

#[derive(Clone)]
pub struct RemoteOracle {
    api_endpoint: String,
    focus_endpoint: String,
    api_key: Option<String>,
    http_client: Client,
}

/// Field as sent to the oracle, without imagery or history
#[derive(Debug, Serialize)]
struct OracleField<'a> {
    id: &'a str,
    name: &'a str,
    #[serde(rename = "cropTypes")]
    crop_types: &'a [String],
    #[serde(rename = "growthStage")]
    growth_stage: GrowthStage,
    #[serde(rename = "soilType")]
    soil_type: SoilType,
    #[serde(rename = "irrigationSystemType")]
    irrigation_system: IrrigationSystem,
    #[serde(rename = "flowRate")]
    flow_rate_gpm: Decimal,
    location: &'a GpsCoordinates,
    #[serde(rename = "soilMoisture")]
    soil_moisture: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    ndvi: Option<Decimal>,
}

#[derive(Debug, Serialize)]
struct OracleRequest<'a> {
    fields: Vec<OracleField<'a>>,
    weather: &'a WeatherData,
    growth: &'a GrowthData,
    #[serde(rename = "windowStart")]
    window_start: DateTime<Utc>,
    #[serde(rename = "recentActivity")]
    recent_activity: &'a [ActivityLogEntry],
}

/// Event as returned by the oracle, before validation
#[derive(Debug, Deserialize)]
pub struct OracleEvent {
    #[serde(rename = "fieldId")]
    pub field_id: String,
    #[serde(rename = "startTime")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "durationMinutes")]
    pub duration_minutes: f64,
    pub status: EventStatus,
}

#[derive(Debug, Deserialize)]
struct FocusAnswer {
    message: String,
}

impl RemoteOracle {
    /// Focus messages go to `focus_endpoint`, or `{api_endpoint}/focus`
    pub fn new(api_endpoint: String, focus_endpoint: Option<String>, api_key: Option<String>) -> Self {
        let focus_endpoint =
            focus_endpoint.unwrap_or_else(|| format!("{}/focus", api_endpoint.trim_end_matches('/')));
        Self {
            api_endpoint,
            focus_endpoint,
            api_key,
            http_client: Client::new(),
        }
    }

    pub fn focus_endpoint(&self) -> &str {
        &self.focus_endpoint
    }

    async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<String, SchedulingError> {
        let mut call = self
            .http_client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(key) = &self.api_key {
            call = call.header("x-api-key", key);
        }

        let response = call
            .send()
            .await
            .map_err(|e| SchedulingError::OracleUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SchedulingError::OracleStatus { status, body });
        }

        response
            .text()
            .await
            .map_err(|e| SchedulingError::OracleUnavailable(e.to_string()))
    }
}

#[async_trait]
impl ScheduleStrategy for RemoteOracle {
    fn name(&self) -> &'static str {
        "remote-oracle"
    }

    async fn compute(&self, request: &ScheduleRequest) -> Result<Vec<IrrigationEvent>, SchedulingError> {
        let body = OracleRequest {
            fields: request
                .fields
                .iter()
                .map(|f| OracleField {
                    id: &f.id,
                    name: &f.name,
                    crop_types: &f.crop_types,
                    growth_stage: f.growth_stage,
                    soil_type: f.soil_type,
                    irrigation_system: f.irrigation_system,
                    flow_rate_gpm: f.flow_rate_gpm,
                    location: &f.location,
                    soil_moisture: f.soil_moisture,
                    ndvi: f.vegetation_index,
                })
                .collect(),
            weather: &request.environment.weather,
            growth: &request.environment.growth,
            window_start: request.window_start,
            recent_activity: &request.recent_activity,
        };

        let text = self.post_json(&self.api_endpoint, &body).await?;
        parse_oracle_plan(&text)
    }
}

#[async_trait]
impl FocusAdvisor for RemoteOracle {
    async fn focus(&self, summary: &FocusSummary) -> Result<String, SchedulingError> {
        let text = self.post_json(&self.focus_endpoint, summary).await?;
        parse_focus_message(&text)
    }
}

/// Parse a focus answer; blank messages are rejected
pub fn parse_focus_message(text: &str) -> Result<String, SchedulingError> {
    let answer: FocusAnswer =
        serde_json::from_str(text).map_err(|e| SchedulingError::MalformedOutput(e.to_string()))?;
    let message = answer.message.trim();
    if message.is_empty() {
        return Err(SchedulingError::MalformedOutput("empty focus message".to_string()));
    }
    Ok(message.to_string())
}

/// Parse and validate an oracle answer
pub fn parse_oracle_plan(text: &str) -> Result<Vec<IrrigationEvent>, SchedulingError> {
    let raw: Vec<OracleEvent> =
        serde_json::from_str(text).map_err(|e| SchedulingError::MalformedOutput(e.to_string()))?;

    raw.into_iter().map(into_event).collect()
}

fn into_event(raw: OracleEvent) -> Result<IrrigationEvent, SchedulingError> {
    if raw.status != EventStatus::Scheduled {
        return Err(SchedulingError::InvalidEvent(format!(
            "{}: new events must be Scheduled",
            raw.field_id
        )));
    }
    if !raw.duration_minutes.is_finite() || raw.duration_minutes < 0.0 {
        return Err(SchedulingError::InvalidEvent(format!(
            "{}: duration must be a non-negative number of minutes",
            raw.field_id
        )));
    }

    let minutes = Decimal::try_from(raw.duration_minutes)
        .ok()
        .and_then(|d| d.round().to_u32())
        .ok_or_else(|| {
            SchedulingError::InvalidEvent(format!("{}: duration out of range", raw.field_id))
        })?;

    Ok(IrrigationEvent::scheduled(raw.field_id, raw.start_time, minutes))
}
