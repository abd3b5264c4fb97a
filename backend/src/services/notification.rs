//! Notification engine: deduplicated alert decisions
//!
//! Two alert classes share one engine:
//!
//! - **Low moisture**: fires once when a field drops below 35%, re-arms only
//!   after the field recovers to 40% or more. The 35–40 band is a dead zone.
//! - **Irrigation reminder**: fires once per `(field, start time)` when the
//!   event is more than 5 and at most 10 minutes away.
//!
//! The engine only decides. Delivery belongs to an [`AlertSink`](crate::external::AlertSink).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};
use shared::{EventStatus, Field, FieldId, IrrigationEvent};

use crate::clock::Clock;
use crate::external::Alert;

/// Moisture (percent) below which the low-moisture alert fires
pub const LOW_MOISTURE_ALERT_PERCENT: u32 = 35;

/// Moisture (percent) at or above which the low-moisture alert re-arms
pub const LOW_MOISTURE_CLEAR_PERCENT: u32 = 40;

/// Reminder window, exclusive lower bound
pub const REMINDER_LEAD_MIN_MS: i64 = 5 * 60 * 1000;

/// Reminder window, inclusive upper bound
pub const REMINDER_LEAD_MAX_MS: i64 = 10 * 60 * 1000;

pub const LOW_MOISTURE_TITLE: &str = "AquaCrop: Critical Soil Moisture Alert";
pub const REMINDER_TITLE: &str = "AquaCrop: Irrigation Reminder";

pub struct NotificationEngine {
    low_moisture_alerted: HashSet<FieldId>,
    reminded: HashSet<String>,
    icon_url: String,
    clock: Arc<dyn Clock>,
}

impl NotificationEngine {
    pub fn new(icon_url: String, clock: Arc<dyn Clock>) -> Self {
        Self {
            low_moisture_alerted: HashSet::new(),
            reminded: HashSet::new(),
            icon_url,
            clock,
        }
    }

    /// Run the low-moisture state machine over the full field set. State for
    /// fields no longer present is dropped.
    pub fn evaluate_moisture(&mut self, fields: &[Field]) -> Vec<Alert> {
        let alert_below = Decimal::from(LOW_MOISTURE_ALERT_PERCENT);
        let clear_at = Decimal::from(LOW_MOISTURE_CLEAR_PERCENT);

        let present: HashSet<&str> = fields.iter().map(|f| f.id.as_str()).collect();
        self.low_moisture_alerted.retain(|id| present.contains(id.as_str()));

        let mut alerts = Vec::new();
        for field in fields {
            if field.soil_moisture < alert_below {
                if self.low_moisture_alerted.insert(field.id.clone()) {
                    alerts.push(self.low_moisture_alert(field));
                }
            } else if field.soil_moisture >= clear_at {
                self.low_moisture_alerted.remove(&field.id);
            }
        }
        alerts
    }

    /// Check the plan for events entering the reminder window. Reminder keys
    /// for events no longer in the plan are dropped.
    pub fn sweep_reminders(&mut self, plan: &[IrrigationEvent], fields: &[Field]) -> Vec<Alert> {
        if plan.is_empty() {
            self.reminded.clear();
            return Vec::new();
        }

        let planned: HashSet<String> = plan.iter().map(IrrigationEvent::reminder_key).collect();
        self.reminded.retain(|key| planned.contains(key));

        let now = self.clock.now();
        let names: HashMap<&str, &str> = fields.iter().map(|f| (f.id.as_str(), f.name.as_str())).collect();

        let mut alerts = Vec::new();
        for event in plan.iter().filter(|e| e.status == EventStatus::Scheduled) {
            let Some(name) = names.get(event.field_id.as_str()) else {
                continue;
            };

            let key = event.reminder_key();
            if self.reminded.contains(&key) {
                continue;
            }

            let lead_ms = (event.start_time - now).num_milliseconds();
            if lead_ms > REMINDER_LEAD_MIN_MS && lead_ms <= REMINDER_LEAD_MAX_MS {
                alerts.push(self.reminder_alert(name, &key, lead_ms));
                self.reminded.insert(key);
            }
        }
        alerts
    }

    /// Alerts became unavailable. Pending reminders are forgotten so
    /// re-enabling does not replay stale ones; low-moisture state is kept.
    pub fn disable(&mut self) {
        self.reminded.clear();
    }

    pub fn is_low_moisture_alerted(&self, field_id: &str) -> bool {
        self.low_moisture_alerted.contains(field_id)
    }

    pub fn is_reminded(&self, event: &IrrigationEvent) -> bool {
        self.reminded.contains(&event.reminder_key())
    }

    /// Fields currently latched as alerted
    pub fn low_moisture_tracked(&self) -> usize {
        self.low_moisture_alerted.len()
    }

    /// Reminder keys currently remembered
    pub fn reminders_tracked(&self) -> usize {
        self.reminded.len()
    }

    /// One-off confirmation sent when alerts are switched on
    pub fn enabled_alert(&self) -> Alert {
        Alert {
            title: "Notifications enabled".to_string(),
            body: "You will now receive smart alerts from AquaCrop.".to_string(),
            icon: self.icon_url.clone(),
            tag: "notifications-enabled".to_string(),
        }
    }

    fn low_moisture_alert(&self, field: &Field) -> Alert {
        Alert {
            title: LOW_MOISTURE_TITLE.to_string(),
            body: format!(
                "{} has reached a critical moisture level of {}%.",
                field.name,
                field.soil_moisture.normalize()
            ),
            icon: self.icon_url.clone(),
            tag: format!("low-moisture-{}", field.id),
        }
    }

    fn reminder_alert(&self, field_name: &str, key: &str, lead_ms: i64) -> Alert {
        let minutes = (Decimal::from(lead_ms) / Decimal::from(60_000))
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        Alert {
            title: REMINDER_TITLE.to_string(),
            body: format!(
                "Irrigation for {} is scheduled to start in approximately {} minutes.",
                field_name, minutes
            ),
            icon: self.icon_url.clone(),
            tag: format!("reminder-{}", key),
        }
    }
}
