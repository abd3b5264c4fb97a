//! Irrigation plan models

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::field::FieldId;

/// Lifecycle of a planned irrigation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventStatus {
    Scheduled,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
}

/// A single planned irrigation run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IrrigationEvent {
    #[serde(rename = "fieldId")]
    pub field_id: FieldId,
    #[serde(rename = "startTime")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "durationMinutes")]
    pub duration_minutes: u32,
    pub status: EventStatus,
}

impl IrrigationEvent {
    pub fn scheduled(field_id: FieldId, start_time: DateTime<Utc>, duration_minutes: u32) -> Self {
        Self {
            field_id,
            start_time,
            duration_minutes,
            status: EventStatus::Scheduled,
        }
    }

    /// Identity used to dedup reminders. Stable across recomputes as long as
    /// the start time does not move.
    pub fn reminder_key(&self) -> String {
        format!(
            "{}-{}",
            self.field_id,
            self.start_time.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_reminder_key_tracks_start_time() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 5, 30, 0).unwrap();
        let event = IrrigationEvent::scheduled("f-1".to_string(), start, 11);
        assert_eq!(event.reminder_key(), "f-1-2024-06-01T05:30:00.000Z");

        let moved = IrrigationEvent::scheduled("f-1".to_string(), start + chrono::Duration::minutes(15), 11);
        assert_ne!(event.reminder_key(), moved.reminder_key());
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&EventStatus::InProgress).unwrap(), "\"In Progress\"");
        let status: EventStatus = serde_json::from_str("\"Scheduled\"").unwrap();
        assert_eq!(status, EventStatus::Scheduled);
    }
}
