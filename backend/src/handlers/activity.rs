//! Activity log handlers with CSV export

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::AppState;

const DEFAULT_ACTIVITY_LIMIT: usize = 50;

#[derive(Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<usize>,
    pub format: Option<String>, // "json" or "csv"
}

/// Recent engine decisions, newest first
pub async fn get_activity(
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> AppResult<impl IntoResponse> {
    let entries = state.engine.activity(query.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT));

    if query.format.as_deref() == Some("csv") {
        let csv = export_to_csv(&entries)?;
        Ok((
            [(header::CONTENT_TYPE, "text/csv"), (header::CONTENT_DISPOSITION, "attachment; filename=\"activity_log.csv\"")],
            csv,
        ).into_response())
    } else {
        Ok(Json(entries).into_response())
    }
}

pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in data {
        wtr.serialize(record)
            .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
    }
    let csv_data = String::from_utf8(
        wtr.into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?,
    )
    .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))?;
    Ok(csv_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use shared::{ActivityLogEntry, Severity};

    #[test]
    fn test_csv_export_has_header_and_rows() {
        let entries = vec![ActivityLogEntry {
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 5, 0, 0).unwrap(),
            message: "Analyzing real-time weather and crop data...".to_string(),
            severity: Severity::Info,
        }];

        let csv = export_to_csv(&entries).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("timestamp,message,type"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("2024-06-01T05:00:00Z,"));
        assert!(row.ends_with(",INFO"));
    }
}
