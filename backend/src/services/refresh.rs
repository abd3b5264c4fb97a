//! Refresh scheduler: the engine's periodic triggers
//!
//! Each trigger runs as its own task and is owned through a [`TriggerHandle`]
//! that aborts the task when cancelled or dropped. A failing cycle never stops
//! its trigger or any other trigger.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};

use crate::config::RefreshConfig;
use crate::services::engine::Engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    /// Environmental refresh, fires immediately then every period
    Environment,
    /// Schedule recompute, first fires one period after start
    Schedule,
    /// Reminder sweep, first fires one period after start
    Reminders,
    /// One-shot initial schedule once inputs are available
    InitialSchedule,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 4] = [
        TriggerKind::Environment,
        TriggerKind::Schedule,
        TriggerKind::Reminders,
        TriggerKind::InitialSchedule,
    ];
}

#[derive(Debug, Clone, Copy)]
pub struct RefreshPeriods {
    pub environment: Duration,
    pub schedule: Duration,
    pub reminders: Duration,
}

impl Default for RefreshPeriods {
    fn default() -> Self {
        Self {
            environment: Duration::from_secs(30 * 60),
            schedule: Duration::from_secs(10 * 60),
            reminders: Duration::from_secs(30),
        }
    }
}

impl From<&RefreshConfig> for RefreshPeriods {
    fn from(config: &RefreshConfig) -> Self {
        Self {
            environment: config.environment_period(),
            schedule: config.schedule_period(),
            reminders: config.reminder_period(),
        }
    }
}

/// Cancellation handle for one running trigger
#[derive(Debug)]
pub struct TriggerHandle {
    kind: TriggerKind,
    task: JoinHandle<()>,
}

impl TriggerHandle {
    pub fn kind(&self) -> TriggerKind {
        self.kind
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for TriggerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct RefreshScheduler {
    engine: Arc<Engine>,
    periods: RefreshPeriods,
    triggers: Mutex<Vec<TriggerHandle>>,
    initial_attempted: Arc<AtomicBool>,
}

impl RefreshScheduler {
    pub fn new(engine: Arc<Engine>, periods: RefreshPeriods) -> Self {
        Self {
            engine,
            periods,
            triggers: Mutex::new(Vec::new()),
            initial_attempted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start every trigger that is not already running
    pub fn start_all(&self) {
        for kind in TriggerKind::ALL {
            self.start(kind);
        }
    }

    /// Start one trigger. Returns false if it is already running or its
    /// period is zero.
    pub fn start(&self, kind: TriggerKind) -> bool {
        if let Some(period) = self.period_of(kind) {
            if period.is_zero() {
                tracing::error!(?kind, "Refusing to start trigger with a zero period");
                return false;
            }
        }

        let mut triggers = self.triggers();
        triggers.retain(|t| !t.is_finished());
        if triggers.iter().any(|t| t.kind == kind) {
            return false;
        }

        let engine = self.engine.clone();
        let task = match kind {
            TriggerKind::Environment => tokio::spawn(environment_loop(engine, self.periods.environment)),
            TriggerKind::Schedule => tokio::spawn(schedule_loop(engine, self.periods.schedule)),
            TriggerKind::Reminders => tokio::spawn(reminder_loop(engine, self.periods.reminders)),
            TriggerKind::InitialSchedule => {
                tokio::spawn(initial_schedule(engine, self.initial_attempted.clone()))
            }
        };

        tracing::debug!(?kind, "Trigger started");
        triggers.push(TriggerHandle { kind, task });
        true
    }

    /// Cancel one trigger. Returns false if it was not running.
    pub fn stop(&self, kind: TriggerKind) -> bool {
        let mut triggers = self.triggers();
        let before = triggers.len();
        triggers.retain(|t| t.kind != kind);
        before != triggers.len()
    }

    /// Cancel every trigger as a unit
    pub fn stop_all(&self) {
        let stopped: Vec<TriggerHandle> = self.triggers().drain(..).collect();
        if !stopped.is_empty() {
            tracing::info!(triggers = stopped.len(), "Stopping refresh triggers");
        }
    }

    /// Triggers whose tasks are still alive
    pub fn running(&self) -> Vec<TriggerKind> {
        self.triggers()
            .iter()
            .filter(|t| !t.is_finished())
            .map(|t| t.kind)
            .collect()
    }

    /// Whether the one-shot initial computation has been attempted
    pub fn initial_attempted(&self) -> bool {
        self.initial_attempted.load(Ordering::Acquire)
    }

    fn period_of(&self, kind: TriggerKind) -> Option<Duration> {
        match kind {
            TriggerKind::Environment => Some(self.periods.environment),
            TriggerKind::Schedule => Some(self.periods.schedule),
            TriggerKind::Reminders => Some(self.periods.reminders),
            TriggerKind::InitialSchedule => None,
        }
    }

    fn triggers(&self) -> std::sync::MutexGuard<'_, Vec<TriggerHandle>> {
        self.triggers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop_all();
    }
}

// ============================================================================
// Trigger loops
// ============================================================================

async fn environment_loop(engine: Arc<Engine>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        // Failures are already logged; the next tick retries.
        let _ = engine.refresh_environment().await;
    }
}

async fn schedule_loop(engine: Arc<Engine>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let outcome = engine.recompute().await;
        tracing::debug!(?outcome, "Periodic schedule recompute");
    }
}

async fn reminder_loop(engine: Arc<Engine>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        engine.sweep_reminders().await;
    }
}

/// Runs the first computation exactly once, as soon as inputs allow it.
/// Later coverage comes from the periodic recompute.
async fn initial_schedule(engine: Arc<Engine>, attempted: Arc<AtomicBool>) {
    loop {
        if attempted.load(Ordering::Acquire) {
            return;
        }
        if engine.initial_inputs_ready() {
            if attempted
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let outcome = engine.recompute().await;
                tracing::info!(?outcome, "Initial schedule computation");
            }
            return;
        }
        engine.inputs_changed().notified().await;
    }
}
