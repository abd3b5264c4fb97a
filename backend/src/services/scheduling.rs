//! Scheduling engine: turns fields and telemetry into an irrigation plan
//!
//! Two interchangeable strategies satisfy the same contract:
//!
//! - [`LocalWaterBalance`] runs the deterministic water balance from `shared`
//! - [`RemoteOracle`](crate::external::RemoteOracle) delegates to an external
//!   scheduling service
//!
//! The enhanced tier first enriches fields with a vegetation index. Indices
//! only live on the copies handed to the strategy and are never stored.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Offset, TimeZone, Utc};
use shared::{
    evaluate_field, ActivityLogEntry, EnvironmentalSnapshot, Field, IrrigationEvent, ServiceTier,
};

use crate::error::SchedulingError;
use crate::external::VegetationSource;
use crate::services::activity::ActivityLog;

/// Everything a strategy needs to produce a plan
#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    pub fields: Vec<Field>,
    pub environment: EnvironmentalSnapshot,
    /// Most recent activity, newest first
    pub recent_activity: Vec<ActivityLogEntry>,
    /// Start of the next low-evaporation window
    pub window_start: DateTime<Utc>,
}

#[async_trait]
pub trait ScheduleStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn compute(&self, request: &ScheduleRequest) -> Result<Vec<IrrigationEvent>, SchedulingError>;
}

// ============================================================================
// Local water balance
// ============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalWaterBalance;

impl LocalWaterBalance {
    /// Plan one event per field with a deficit, driest fields first
    pub fn plan(&self, request: &ScheduleRequest) -> Vec<IrrigationEvent> {
        let mut candidates: Vec<(&Field, u32)> = request
            .fields
            .iter()
            .filter_map(|field| {
                let balance = evaluate_field(field, &request.environment.weather);
                balance
                    .needs_irrigation()
                    .then_some((field, balance.duration_minutes))
            })
            .collect();

        candidates.sort_by(|(a, _), (b, _)| {
            a.soil_moisture
                .cmp(&b.soil_moisture)
                .then_with(|| a.id.cmp(&b.id))
        });

        candidates
            .into_iter()
            .map(|(field, minutes)| IrrigationEvent::scheduled(field.id.clone(), request.window_start, minutes))
            .collect()
    }
}

#[async_trait]
impl ScheduleStrategy for LocalWaterBalance {
    fn name(&self) -> &'static str {
        "local-water-balance"
    }

    async fn compute(&self, request: &ScheduleRequest) -> Result<Vec<IrrigationEvent>, SchedulingError> {
        Ok(self.plan(request))
    }
}

// ============================================================================
// Start-time policy
// ============================================================================

/// Next occurrence (now or later) of `window` on the farm's local clock
pub fn next_window_start(now: DateTime<Utc>, utc_offset_seconds: i32, window: NaiveTime) -> DateTime<Utc> {
    let offset = FixedOffset::east_opt(utc_offset_seconds).unwrap_or_else(|| Utc.fix());
    let local_now = now.with_timezone(&offset);

    let today = offset
        .from_local_datetime(&local_now.date_naive().and_time(window))
        .single();

    match today {
        Some(start) if start >= local_now => start.with_timezone(&Utc),
        Some(start) => (start + Duration::days(1)).with_timezone(&Utc),
        None => now,
    }
}

// ============================================================================
// Scheduling engine
// ============================================================================

/// A sanitized plan plus whether vegetation indices fed into it
#[derive(Debug, Clone, Default)]
pub struct ComputedPlan {
    pub events: Vec<IrrigationEvent>,
    pub vegetation_adjusted: bool,
}

pub struct SchedulingEngine {
    vegetation: Arc<dyn VegetationSource>,
    local: LocalWaterBalance,
    oracle: Option<Arc<dyn ScheduleStrategy>>,
    window: NaiveTime,
}

impl SchedulingEngine {
    pub fn new(
        vegetation: Arc<dyn VegetationSource>,
        oracle: Option<Arc<dyn ScheduleStrategy>>,
        window: NaiveTime,
    ) -> Self {
        Self {
            vegetation,
            local: LocalWaterBalance,
            oracle,
            window,
        }
    }

    /// Strategy used for a tier: the oracle only for the enhanced tier, and
    /// only when one is configured
    pub fn strategy_for(&self, tier: ServiceTier) -> &dyn ScheduleStrategy {
        match (&self.oracle, tier.is_enhanced()) {
            (Some(oracle), true) => &**oracle,
            _ => &self.local,
        }
    }

    /// Compute a fresh plan. The returned events only reference fields in
    /// `fields` and all have a positive duration.
    pub async fn compute_schedule(
        &self,
        fields: &[Field],
        environment: &EnvironmentalSnapshot,
        tier: ServiceTier,
        recent_activity: Vec<ActivityLogEntry>,
        now: DateTime<Utc>,
        log: &ActivityLog,
    ) -> Result<ComputedPlan, SchedulingError> {
        if fields.is_empty() {
            return Ok(ComputedPlan::default());
        }

        let (fields, vegetation_adjusted) = if tier.is_enhanced() {
            log.info("Fetching satellite vegetation data (Pro feature)...");
            self.enrich(fields, log).await
        } else {
            (fields.to_vec(), false)
        };

        let request = ScheduleRequest {
            fields,
            environment: environment.clone(),
            recent_activity,
            window_start: next_window_start(now, environment.utc_offset_seconds, self.window),
        };

        let strategy = self.strategy_for(tier);
        tracing::debug!(strategy = strategy.name(), fields = request.fields.len(), "Computing schedule");

        let events = strategy.compute(&request).await?;
        Ok(ComputedPlan {
            events: sanitize_plan(events, &request.fields),
            vegetation_adjusted,
        })
    }

    /// Copies of `fields` carrying their vegetation index, and whether any
    /// index was found
    async fn enrich(&self, fields: &[Field], log: &ActivityLog) -> (Vec<Field>, bool) {
        match self.vegetation.vegetation_indices(fields).await {
            Ok(indices) => {
                let enriched: Vec<Field> = fields
                    .iter()
                    .map(|f| f.with_vegetation_index(indices.get(&f.id).copied()))
                    .collect();
                let adjusted = enriched.iter().any(|f| f.vegetation_index.is_some());
                (enriched, adjusted)
            }
            Err(e) => {
                tracing::warn!("Vegetation index lookup failed: {}", e);
                log.warning("Satellite vegetation data unavailable. Scheduling without vegetation adjustment.");
                (fields.to_vec(), false)
            }
        }
    }
}

/// Drop events for unknown fields and zero-length runs
pub fn sanitize_plan(events: Vec<IrrigationEvent>, fields: &[Field]) -> Vec<IrrigationEvent> {
    let known: HashSet<&str> = fields.iter().map(|f| f.id.as_str()).collect();
    events
        .into_iter()
        .filter(|e| e.duration_minutes > 0 && known.contains(e.field_id.as_str()))
        .collect()
}
