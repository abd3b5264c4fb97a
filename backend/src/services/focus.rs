//! Daily focus message
//!
//! A short headline for the farmer derived from the current weather, field
//! set and plan. The enhanced tier asks a remote advisor when one is
//! configured; otherwise the message is summarized locally. Advisor failures
//! fall back to a fixed status line.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{Field, IrrigationEvent, WeatherData, ACTION_THRESHOLD_PERCENT};

use crate::error::SchedulingError;

/// Shown whenever the advisor cannot produce a message
pub const FALLBACK_FOCUS: &str =
    "**System Status:** All parameters are currently stable. Monitoring for changes.";

/// Inputs to the focus message
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FocusSummary {
    pub weather: WeatherData,
    #[serde(rename = "fieldCount")]
    pub field_count: usize,
    /// Fields below the action threshold
    #[serde(rename = "lowMoistureFields")]
    pub low_moisture_fields: usize,
    #[serde(rename = "lowestMoisture")]
    pub lowest_moisture: Decimal,
    #[serde(rename = "scheduledEvents")]
    pub scheduled_events: usize,
}

impl FocusSummary {
    /// `None` until there are fields and a non-empty plan
    pub fn new(weather: &WeatherData, fields: &[Field], plan: &[IrrigationEvent]) -> Option<Self> {
        if plan.is_empty() {
            return None;
        }
        let lowest_moisture = fields.iter().map(|f| f.soil_moisture).min()?;
        let threshold = Decimal::from(ACTION_THRESHOLD_PERCENT);

        Some(Self {
            weather: weather.clone(),
            field_count: fields.len(),
            low_moisture_fields: fields.iter().filter(|f| f.soil_moisture < threshold).count(),
            lowest_moisture,
            scheduled_events: plan.len(),
        })
    }

    /// Locally composed message
    pub fn local_message(&self) -> String {
        let events = plural(self.scheduled_events, "irrigation event", "irrigation events");
        if self.low_moisture_fields > 0 {
            format!(
                "**Critical Alert:** {} of {} below {}% soil moisture, lowest at {}%. {} queued for the next low-evaporation window.",
                self.low_moisture_fields,
                plural(self.field_count, "field", "fields"),
                ACTION_THRESHOLD_PERCENT,
                self.lowest_moisture.normalize(),
                events,
            )
        } else {
            format!(
                "**Today's Focus:** {} planned across {}. ET₀ is {} in/day with {} in of rain forecast.",
                events,
                plural(self.field_count, "field", "fields"),
                self.weather.et0_in.normalize(),
                self.weather.precipitation_in.normalize(),
            )
        }
    }
}

fn plural(count: usize, one: &str, many: &str) -> String {
    if count == 1 {
        format!("1 {}", one)
    } else {
        format!("{} {}", count, many)
    }
}

/// Remote source of focus messages
#[async_trait]
pub trait FocusAdvisor: Send + Sync {
    async fn focus(&self, summary: &FocusSummary) -> Result<String, SchedulingError>;
}
