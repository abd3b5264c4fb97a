//! Test doubles and builders shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aquacrop_engine::clock::{Clock, ManualClock};
use aquacrop_engine::error::{NotificationDeliveryError, ProviderError, SchedulingError};
use aquacrop_engine::external::{Alert, AlertSink, EnvironmentalFeed, VegetationSource};
use aquacrop_engine::services::{
    EngineDependencies, EngineSettings, FocusAdvisor, FocusSummary, LocalWaterBalance,
    ScheduleRequest, ScheduleStrategy, SessionContext,
};
use aquacrop_engine::Engine;
use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use shared::{
    EnvironmentalSnapshot, FarmLocation, Field, FieldId, GpsCoordinates, GrowthData, GrowthStage,
    IrrigationEvent, IrrigationSystem, MoistureHistory, ServiceTier, SoilType, WeatherData,
};
use tokio::sync::{Notify, Semaphore};

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// 2024-06-01 03:00 UTC
pub fn start_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 3, 0, 0).unwrap()
}

pub fn field(id: &str, stage: GrowthStage, moisture: &str, flow_rate: &str) -> Field {
    let moisture = dec(moisture);
    Field {
        id: id.to_string(),
        name: format!("Field {}", id),
        crop_types: vec!["Tomatoes".to_string()],
        growth_stage: stage,
        soil_type: SoilType::Loam,
        irrigation_system: IrrigationSystem::Drip,
        flow_rate_gpm: dec(flow_rate),
        location: GpsCoordinates::new(dec("36.75"), dec("-119.77")),
        soil_moisture: moisture,
        soil_moisture_history: MoistureHistory::uniform(moisture),
        image_url: String::new(),
        vegetation_index: None,
    }
}

pub fn snapshot(et0: &str, precipitation: &str, soil_moisture: Option<&str>) -> EnvironmentalSnapshot {
    EnvironmentalSnapshot {
        fetched_at: start_instant(),
        utc_offset_seconds: 0,
        weather: WeatherData {
            temperature_f: dec("88"),
            precipitation_in: dec(precipitation),
            wind_speed_mph: dec("6"),
            relative_humidity_pct: dec("30"),
            et0_in: dec(et0),
        },
        growth: GrowthData {
            solar_radiation_kwh_m2: dec("7.5"),
            temperature_f: dec("88"),
            soil_moisture_pct: soil_moisture.map(dec),
        },
    }
}

// ============================================================================
// Fakes
// ============================================================================

/// Feed returning a configurable snapshot or failure
pub struct FakeFeed {
    snapshot: Mutex<Option<EnvironmentalSnapshot>>,
    pub calls: AtomicUsize,
}

impl FakeFeed {
    pub fn returning(snapshot: EnvironmentalSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            snapshot: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, snapshot: Option<EnvironmentalSnapshot>) {
        *self.snapshot.lock().unwrap() = snapshot;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EnvironmentalFeed for FakeFeed {
    async fn fetch(&self, _location: &FarmLocation) -> Result<EnvironmentalSnapshot, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.snapshot
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ProviderError::Network("connection refused".to_string()))
    }
}

/// Vegetation source with fixed answers
pub struct FixedVegetation {
    indices: HashMap<FieldId, Decimal>,
    fail: bool,
    pub calls: AtomicUsize,
}

impl FixedVegetation {
    pub fn with(indices: &[(&str, &str)]) -> Self {
        Self {
            indices: indices.iter().map(|(id, v)| (id.to_string(), dec(v))).collect(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            indices: HashMap::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VegetationSource for FixedVegetation {
    async fn vegetation_indices(&self, _fields: &[Field]) -> Result<HashMap<FieldId, Decimal>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::Status {
                status: 503,
                body: "sensor offline".to_string(),
            });
        }
        Ok(self.indices.clone())
    }
}

/// Oracle that can be held mid-computation and made to fail
pub struct ScriptedOracle {
    gated: bool,
    fail: AtomicBool,
    canned: Mutex<Option<Vec<IrrigationEvent>>>,
    pub entered: Notify,
    release: Semaphore,
    pub calls: AtomicUsize,
}

impl ScriptedOracle {
    /// Answers with the local water balance plan
    pub fn new() -> Self {
        Self {
            gated: false,
            fail: AtomicBool::new(false),
            canned: Mutex::new(None),
            entered: Notify::new(),
            release: Semaphore::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Blocks every computation until [`ScriptedOracle::release`] is called
    pub fn gated() -> Self {
        Self {
            gated: true,
            ..Self::new()
        }
    }

    pub fn failing() -> Self {
        let oracle = Self::new();
        oracle.fail.store(true, Ordering::SeqCst);
        oracle
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn answer_with(&self, events: Vec<IrrigationEvent>) {
        *self.canned.lock().unwrap() = Some(events);
    }

    pub fn release(&self) {
        self.release.add_permits(1);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScheduleStrategy for ScriptedOracle {
    fn name(&self) -> &'static str {
        "scripted-oracle"
    }

    async fn compute(&self, request: &ScheduleRequest) -> Result<Vec<IrrigationEvent>, SchedulingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        if self.gated {
            if let Ok(permit) = self.release.acquire().await {
                permit.forget();
            }
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(SchedulingError::MalformedOutput("not JSON".to_string()));
        }
        if let Some(events) = self.canned.lock().unwrap().clone() {
            return Ok(events);
        }
        Ok(LocalWaterBalance.plan(request))
    }
}

/// Focus advisor answering with a fixed message, or failing
pub struct ScriptedAdvisor {
    answer: Option<String>,
    seen: Mutex<Vec<FocusSummary>>,
}

impl ScriptedAdvisor {
    pub fn answering(message: &str) -> Self {
        Self {
            answer: Some(message.to_string()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<FocusSummary> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl FocusAdvisor for ScriptedAdvisor {
    async fn focus(&self, summary: &FocusSummary) -> Result<String, SchedulingError> {
        self.seen.lock().unwrap().push(summary.clone());
        self.answer
            .clone()
            .ok_or_else(|| SchedulingError::OracleStatus { status: 500, body: "overloaded".to_string() })
    }
}

/// Sink that records every alert handed to it
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<Alert>>,
    attempts: AtomicUsize,
    fail: AtomicBool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.fail.store(true, Ordering::SeqCst);
        sink
    }

    pub fn delivered(&self) -> Vec<Alert> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn titles(&self) -> Vec<String> {
        self.delivered().into_iter().map(|a| a.title).collect()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn deliver(&self, alert: &Alert) -> Result<(), NotificationDeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotificationDeliveryError::Rejected("permission denied".to_string()));
        }
        self.delivered.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub engine: Arc<Engine>,
    pub clock: Arc<ManualClock>,
    pub feed: Arc<FakeFeed>,
    pub sink: Arc<RecordingSink>,
}

pub struct HarnessBuilder {
    session: SessionContext,
    feed: Arc<FakeFeed>,
    vegetation: Arc<dyn VegetationSource>,
    oracle: Option<Arc<dyn ScheduleStrategy>>,
    focus_advisor: Option<Arc<dyn FocusAdvisor>>,
    sink: Arc<RecordingSink>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            session: SessionContext::default(),
            feed: Arc::new(FakeFeed::returning(snapshot("0.2", "0", None))),
            vegetation: Arc::new(FixedVegetation::with(&[])),
            oracle: None,
            focus_advisor: None,
            sink: Arc::new(RecordingSink::default()),
        }
    }

    pub fn session(mut self, tier: ServiceTier, alerts_permitted: bool, read_only: bool) -> Self {
        self.session = SessionContext {
            tier,
            alerts_permitted,
            read_only,
        };
        self
    }

    pub fn feed(mut self, feed: Arc<FakeFeed>) -> Self {
        self.feed = feed;
        self
    }

    pub fn vegetation(mut self, vegetation: Arc<dyn VegetationSource>) -> Self {
        self.vegetation = vegetation;
        self
    }

    pub fn oracle(mut self, oracle: Arc<dyn ScheduleStrategy>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn focus_advisor(mut self, advisor: Arc<dyn FocusAdvisor>) -> Self {
        self.focus_advisor = Some(advisor);
        self
    }

    pub fn sink(mut self, sink: Arc<RecordingSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn build(self) -> Harness {
        let clock = Arc::new(ManualClock::new(start_instant()));
        let engine_clock: Arc<dyn Clock> = clock.clone();

        let engine = Engine::new(
            EngineSettings {
                location: FarmLocation {
                    name: "Fresno, California, USA".to_string(),
                    coordinates: GpsCoordinates::new(dec("36.746842"), dec("-119.772591")),
                },
                window_start: NaiveTime::from_hms_opt(5, 30, 0).unwrap(),
                icon_url: "https://example.com/droplet.png".to_string(),
                max_log_entries: 500,
                session: self.session,
            },
            EngineDependencies {
                feed: self.feed.clone(),
                vegetation: self.vegetation,
                oracle: self.oracle,
                focus_advisor: self.focus_advisor,
                alerts: self.sink.clone(),
                clock: engine_clock,
            },
        );

        Harness {
            engine: Arc::new(engine),
            clock,
            feed: self.feed,
            sink: self.sink,
        }
    }
}

impl Harness {
    pub fn messages(&self) -> Vec<String> {
        self.engine.activity(500).into_iter().map(|e| e.message).collect()
    }

    pub fn logged(&self, message: &str) -> bool {
        self.messages().iter().any(|m| m == message)
    }
}

/// Poll `condition` until it holds or two seconds pass
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
