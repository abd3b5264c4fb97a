//! Engine components

pub mod activity;
pub mod engine;
pub mod field_store;
pub mod focus;
pub mod notification;
pub mod refresh;
pub mod scheduling;

pub use activity::ActivityLog;
pub use engine::{Engine, EngineDependencies, EngineSettings, RecomputeOutcome, SessionContext};
pub use field_store::FieldStore;
pub use focus::{FocusAdvisor, FocusSummary, FALLBACK_FOCUS};
pub use notification::NotificationEngine;
pub use refresh::{RefreshPeriods, RefreshScheduler, TriggerHandle, TriggerKind};
pub use scheduling::{ComputedPlan, LocalWaterBalance, ScheduleRequest, ScheduleStrategy, SchedulingEngine};
