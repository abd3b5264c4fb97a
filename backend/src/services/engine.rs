//! Irrigation engine: owns the shared state and wires the components together
//!
//! Flow per cycle: environmental refresh → schedule recompute (field store +
//! snapshot) → plan → notification checks. Every decision lands in the
//! activity log. No component error escapes the operation that owns it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::NaiveTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    ActivityLogEntry, EnvironmentalSnapshot, FarmLocation, Field, IrrigationEvent, ServiceTier,
};
use tokio::sync::{Notify, Semaphore};

use crate::clock::Clock;
use crate::error::{FieldStoreError, ProviderError};
use crate::external::{Alert, AlertSink, EnvironmentalFeed, VegetationSource};
use crate::services::activity::ActivityLog;
use crate::services::field_store::FieldStore;
use crate::services::focus::{FocusAdvisor, FocusSummary, FALLBACK_FOCUS};
use crate::services::notification::NotificationEngine;
use crate::services::scheduling::{ScheduleStrategy, SchedulingEngine};

/// Activity entries handed to the scheduling oracle as context
pub const ORACLE_CONTEXT_ENTRIES: usize = 5;

/// Session signals consumed by the engine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SessionContext {
    pub tier: ServiceTier,
    pub alerts_permitted: bool,
    pub read_only: bool,
}

impl SessionContext {
    /// Smart alerts need the enhanced tier and platform permission
    pub fn alerts_enabled(&self) -> bool {
        self.tier.is_enhanced() && self.alerts_permitted
    }
}

/// Result of a recompute request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeOutcome {
    /// A new plan with this many events replaced the previous one
    Completed(usize),
    /// Another computation was in flight; this request was dropped
    Skipped,
    /// The computation failed and the previous plan was kept
    Failed,
    /// No snapshot or no fields yet
    NoInput,
}

/// Collaborators injected into the engine
pub struct EngineDependencies {
    pub feed: Arc<dyn EnvironmentalFeed>,
    pub vegetation: Arc<dyn VegetationSource>,
    pub oracle: Option<Arc<dyn ScheduleStrategy>>,
    pub focus_advisor: Option<Arc<dyn FocusAdvisor>>,
    pub alerts: Arc<dyn AlertSink>,
    pub clock: Arc<dyn Clock>,
}

/// Static engine settings
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub location: FarmLocation,
    pub window_start: NaiveTime,
    pub icon_url: String,
    pub max_log_entries: usize,
    pub session: SessionContext,
}

pub struct Engine {
    location: FarmLocation,
    store: FieldStore,
    environment: RwLock<Option<EnvironmentalSnapshot>>,
    plan: RwLock<Vec<IrrigationEvent>>,
    focus: RwLock<Option<String>>,
    session: RwLock<SessionContext>,
    notifications: Mutex<NotificationEngine>,
    activity: ActivityLog,
    scheduling: SchedulingEngine,
    focus_advisor: Option<Arc<dyn FocusAdvisor>>,
    feed: Arc<dyn EnvironmentalFeed>,
    alerts: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
    recompute_permit: Semaphore,
    inputs_changed: Notify,
    computations: AtomicU64,
}

impl Engine {
    pub fn new(settings: EngineSettings, deps: EngineDependencies) -> Self {
        Self {
            location: settings.location,
            store: FieldStore::new(),
            environment: RwLock::new(None),
            plan: RwLock::new(Vec::new()),
            focus: RwLock::new(None),
            session: RwLock::new(settings.session),
            notifications: Mutex::new(NotificationEngine::new(settings.icon_url, deps.clock.clone())),
            activity: ActivityLog::new(settings.max_log_entries, deps.clock.clone()),
            scheduling: SchedulingEngine::new(deps.vegetation, deps.oracle, settings.window_start),
            focus_advisor: deps.focus_advisor,
            feed: deps.feed,
            alerts: deps.alerts,
            clock: deps.clock,
            recompute_permit: Semaphore::new(1),
            inputs_changed: Notify::new(),
            computations: AtomicU64::new(0),
        }
    }

    // ========================================================================
    // Read access
    // ========================================================================

    pub fn location(&self) -> &FarmLocation {
        &self.location
    }

    pub fn fields(&self) -> Vec<Field> {
        self.store.snapshot()
    }

    pub fn field(&self, id: &str) -> Option<Field> {
        self.store.get(id)
    }

    pub fn plan(&self) -> Vec<IrrigationEvent> {
        self.plan.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Latest focus message; `None` until a non-empty plan has been computed
    pub fn focus(&self) -> Option<String> {
        self.focus.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn environment(&self) -> Option<EnvironmentalSnapshot> {
        self.environment.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn session(&self) -> SessionContext {
        *self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn activity(&self, limit: usize) -> Vec<ActivityLogEntry> {
        self.activity.recent(limit)
    }

    pub fn activity_log(&self) -> &ActivityLog {
        &self.activity
    }

    /// Number of schedule computations that actually ran
    pub fn computations(&self) -> u64 {
        self.computations.load(Ordering::Acquire)
    }

    /// Whether a schedule computation currently holds the in-flight token
    pub fn is_computing(&self) -> bool {
        self.recompute_permit.available_permits() == 0
    }

    pub fn is_low_moisture_alerted(&self, field_id: &str) -> bool {
        self.notifications().is_low_moisture_alerted(field_id)
    }

    /// Telemetry and fields are present but no plan exists yet
    pub fn initial_inputs_ready(&self) -> bool {
        self.environment().is_some() && !self.store.is_empty() && self.plan().is_empty()
    }

    /// Signalled whenever the snapshot or the field set changes
    pub fn inputs_changed(&self) -> &Notify {
        &self.inputs_changed
    }

    // ========================================================================
    // Environmental refresh
    // ========================================================================

    /// Fetch a fresh snapshot. On failure the previous snapshot is kept.
    pub async fn refresh_environment(&self) -> Result<(), ProviderError> {
        let snapshot = match self.feed.fetch(&self.location).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!("Environmental refresh failed: {}", e);
                self.activity.warning("Failed to fetch real-time environmental data.");
                return Err(e);
            }
        };

        let calibration = snapshot.growth.soil_moisture_pct;
        *self.environment.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);

        if let Some(moisture) = calibration {
            self.calibrate_from_provider(moisture).await;
        }

        self.inputs_changed.notify_one();
        Ok(())
    }

    async fn calibrate_from_provider(&self, moisture: Decimal) {
        if self.session().read_only || self.store.is_empty() {
            return;
        }

        match self.store.calibrate_all(moisture) {
            Ok(_) => {
                self.activity.info(format!(
                    "Calibrated soil moisture to {}% from Open-Meteo data.",
                    moisture.normalize()
                ));
                self.check_moisture_alerts().await;
            }
            Err(e) => tracing::warn!("Skipping provider calibration: {}", e),
        }
    }

    // ========================================================================
    // Schedule recompute
    // ========================================================================

    /// Recompute the plan unless a computation is already in flight, in which
    /// case the request is dropped.
    pub async fn recompute(&self) -> RecomputeOutcome {
        let Ok(_permit) = self.recompute_permit.try_acquire() else {
            tracing::debug!("Schedule computation in flight, dropping trigger");
            return RecomputeOutcome::Skipped;
        };

        let fields = self.store.snapshot();
        let Some(environment) = self.environment() else {
            return RecomputeOutcome::NoInput;
        };
        if fields.is_empty() {
            return RecomputeOutcome::NoInput;
        }

        let tier = self.session().tier;
        let context = self.activity.recent(ORACLE_CONTEXT_ENTRIES);
        self.computations.fetch_add(1, Ordering::AcqRel);
        self.activity.info("Analyzing real-time weather and crop data...");

        let result = self
            .scheduling
            .compute_schedule(&fields, &environment, tier, context, self.clock.now(), &self.activity)
            .await;

        match result {
            Ok(computed) => {
                let count = self.replace_plan(computed.events);
                if !tier.is_enhanced() {
                    self.activity.action(
                        "Generated basic irrigation schedule. Upgrade to Pro for satellite data optimization.",
                    );
                } else if computed.vegetation_adjusted {
                    self.activity
                        .action("Generated a new irrigation schedule based on satellite vegetation data.");
                } else {
                    self.activity
                        .action("Generated a new irrigation schedule without satellite vegetation data.");
                }
                self.refresh_focus(&environment, tier).await;
                RecomputeOutcome::Completed(count)
            }
            Err(e) => {
                tracing::error!("Schedule computation failed: {}", e);
                self.activity.warning(
                    "Failed to generate an irrigation schedule. The previous plan has been kept.",
                );
                RecomputeOutcome::Failed
            }
        }
    }

    /// Regenerate the focus message from the current fields and plan. An
    /// empty plan keeps the previous message.
    async fn refresh_focus(&self, environment: &EnvironmentalSnapshot, tier: ServiceTier) {
        let fields = self.store.snapshot();
        let plan = self.plan();
        let Some(summary) = FocusSummary::new(&environment.weather, &fields, &plan) else {
            return;
        };

        let message = match (&self.focus_advisor, tier.is_enhanced()) {
            (Some(advisor), true) => match advisor.focus(&summary).await {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!("Focus message generation failed: {}", e);
                    FALLBACK_FOCUS.to_string()
                }
            },
            _ => summary.local_message(),
        };

        *self.focus.write().unwrap_or_else(PoisonError::into_inner) = Some(message);
    }

    /// Store a freshly computed plan and return how many events survived
    fn replace_plan(&self, events: Vec<IrrigationEvent>) -> usize {
        let known = self.store.snapshot();
        let events = crate::services::scheduling::sanitize_plan(events, &known);
        let count = events.len();
        *self.plan.write().unwrap_or_else(PoisonError::into_inner) = events;
        count
    }

    // ========================================================================
    // Field mutations
    // ========================================================================

    /// Apply an authoritative field list from the external feed
    pub async fn merge_fields(&self, latest: Vec<Field>) {
        self.store.merge(latest);

        let fields = self.store.snapshot();
        {
            let mut plan = self.plan.write().unwrap_or_else(PoisonError::into_inner);
            let before = plan.len();
            plan.retain(|e| fields.iter().any(|f| f.id == e.field_id));
            if plan.len() != before {
                tracing::debug!(dropped = before - plan.len(), "Pruned events for removed fields");
            }
        }

        self.check_moisture_alerts().await;
        self.inputs_changed.notify_one();
    }

    /// Stage a local create or edit and re-evaluate the plan
    pub async fn upsert_field(&self, field: Field) -> Result<RecomputeOutcome, FieldStoreError> {
        if self.session().read_only {
            return Err(FieldStoreError::ReadOnly);
        }

        let name = field.name.clone();
        self.store.upsert_local(field)?;
        self.activity.action(format!(
            "Field \"{}\" configuration updated. Re-evaluating irrigation models.",
            name
        ));

        self.check_moisture_alerts().await;
        self.inputs_changed.notify_one();
        Ok(self.recompute().await)
    }

    /// Record a manual moisture reading for one field
    pub async fn calibrate_field(&self, field_id: &str, moisture: Decimal) -> Result<Field, FieldStoreError> {
        if self.session().read_only {
            return Err(FieldStoreError::ReadOnly);
        }

        let field = self.store.apply_moisture_calibration(field_id, moisture)?;
        self.check_moisture_alerts().await;
        Ok(field)
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    /// Low-moisture check over the current field set
    pub async fn check_moisture_alerts(&self) {
        if !self.session().alerts_enabled() {
            return;
        }
        let fields = self.store.snapshot();
        let alerts = self.notifications().evaluate_moisture(&fields);
        self.deliver(alerts).await;
    }

    /// Reminder sweep over the current plan
    pub async fn sweep_reminders(&self) {
        if !self.session().alerts_enabled() {
            self.notifications().disable();
            return;
        }
        let plan = self.plan();
        let fields = self.store.snapshot();
        let alerts = self.notifications().sweep_reminders(&plan, &fields);
        self.deliver(alerts).await;
    }

    /// Replace the session context and react to the transition
    pub async fn update_session(&self, next: SessionContext) -> SessionContext {
        let previous = {
            let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *session, next)
        };

        if previous.alerts_enabled() && !next.alerts_enabled() {
            self.notifications().disable();
        }

        if !previous.tier.is_enhanced() && next.tier.is_enhanced() {
            self.activity.action("Upgraded to Pro! Smart alerts are now active.");
            if next.alerts_permitted {
                let alert = self.notifications().enabled_alert();
                self.deliver(vec![alert]).await;
            }
        }

        if !previous.alerts_enabled() && next.alerts_enabled() {
            self.check_moisture_alerts().await;
        }

        tracing::info!(tier = %next.tier, alerts_permitted = next.alerts_permitted, read_only = next.read_only, "Session updated");
        next
    }

    async fn deliver(&self, alerts: Vec<Alert>) {
        for alert in alerts {
            if let Err(e) = self.alerts.deliver(&alert).await {
                tracing::debug!(tag = %alert.tag, "Alert suppressed: {}", e);
            }
        }
    }

    fn notifications(&self) -> std::sync::MutexGuard<'_, NotificationEngine> {
        self.notifications.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
