//! Refresh scheduler integration tests
//!
//! Tests for the periodic triggers including:
//! - Drop-not-queue recompute guard
//! - One-shot initial computation
//! - Cancellation as a unit

mod common;

use std::sync::Arc;
use std::time::Duration;

use aquacrop_engine::services::{RecomputeOutcome, RefreshPeriods, RefreshScheduler, TriggerKind};
use common::*;
use shared::{GrowthStage, ServiceTier};

fn fast_periods() -> RefreshPeriods {
    RefreshPeriods {
        environment: Duration::from_millis(20),
        schedule: Duration::from_millis(30),
        reminders: Duration::from_millis(10),
    }
}

/// Periods long enough that only the immediate ticks matter
fn slow_periods() -> RefreshPeriods {
    RefreshPeriods {
        environment: Duration::from_secs(3600),
        schedule: Duration::from_secs(3600),
        reminders: Duration::from_secs(3600),
    }
}

#[tokio::test]
async fn test_concurrent_recompute_is_dropped() {
    let oracle = Arc::new(ScriptedOracle::gated());
    let h = HarnessBuilder::new()
        .session(ServiceTier::Pro, false, false)
        .oracle(oracle.clone())
        .build();
    h.engine.merge_fields(vec![field("f-1", GrowthStage::Flowering, "25", "500")]).await;
    h.engine.refresh_environment().await.unwrap();

    let engine = h.engine.clone();
    let first = tokio::spawn(async move { engine.recompute().await });
    oracle.entered.notified().await;

    assert!(h.engine.is_computing());
    assert_eq!(h.engine.recompute().await, RecomputeOutcome::Skipped);

    oracle.release();
    assert_eq!(first.await.unwrap(), RecomputeOutcome::Completed(1));
    assert_eq!(h.engine.computations(), 1);
    assert_eq!(oracle.calls(), 1);
    assert!(!h.engine.is_computing());
}

#[tokio::test]
async fn test_initial_schedule_runs_once_inputs_arrive() {
    let h = HarnessBuilder::new().build();
    let scheduler = RefreshScheduler::new(h.engine.clone(), slow_periods());
    scheduler.start(TriggerKind::InitialSchedule);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!scheduler.initial_attempted());

    h.engine.refresh_environment().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!scheduler.initial_attempted());

    h.engine.merge_fields(vec![field("f-1", GrowthStage::Flowering, "25", "500")]).await;
    assert!(eventually(|| h.engine.computations() == 1).await);
    assert!(scheduler.initial_attempted());
    assert!(eventually(|| !scheduler.running().contains(&TriggerKind::InitialSchedule)).await);

    // Further input changes do not re-run it
    h.engine.merge_fields(vec![field("f-1", GrowthStage::Flowering, "22", "500")]).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(h.engine.computations(), 1);
}

#[tokio::test]
async fn test_initial_schedule_not_retried_after_failure() {
    let oracle = Arc::new(ScriptedOracle::failing());
    let h = HarnessBuilder::new()
        .session(ServiceTier::Pro, false, false)
        .oracle(oracle.clone())
        .build();
    h.engine.merge_fields(vec![field("f-1", GrowthStage::Flowering, "25", "500")]).await;

    let scheduler = RefreshScheduler::new(h.engine.clone(), slow_periods());
    scheduler.start(TriggerKind::Environment);
    scheduler.start(TriggerKind::InitialSchedule);

    assert!(eventually(|| oracle.calls() == 1).await);
    assert!(eventually(|| h.logged("Failed to generate an irrigation schedule. The previous plan has been kept.")).await);

    oracle.set_failing(false);
    assert!(eventually(|| !scheduler.running().contains(&TriggerKind::InitialSchedule)).await);
    assert!(scheduler.start(TriggerKind::InitialSchedule));
    h.engine.merge_fields(vec![field("f-1", GrowthStage::Flowering, "24", "500")]).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(oracle.calls(), 1);
    assert!(h.engine.plan().is_empty());
}

#[tokio::test]
async fn test_periodic_triggers_fire() {
    let h = HarnessBuilder::new().build();
    h.engine.merge_fields(vec![field("f-1", GrowthStage::Flowering, "25", "500")]).await;

    let scheduler = RefreshScheduler::new(h.engine.clone(), fast_periods());
    scheduler.start_all();

    assert!(eventually(|| h.feed.calls() >= 3).await);
    // Initial run plus at least one periodic recompute
    assert!(eventually(|| h.engine.computations() >= 2).await);
    scheduler.stop_all();
}

#[tokio::test]
async fn test_feed_failures_do_not_stop_triggers() {
    let h = HarnessBuilder::new().feed(Arc::new(FakeFeed::failing())).build();
    let scheduler = RefreshScheduler::new(h.engine.clone(), fast_periods());
    scheduler.start_all();

    assert!(eventually(|| h.feed.calls() >= 3).await);
    assert!(scheduler.running().contains(&TriggerKind::Environment));
    assert!(scheduler.running().contains(&TriggerKind::Schedule));
    assert!(scheduler.running().contains(&TriggerKind::Reminders));
    assert!(h.engine.environment().is_none());
}

#[tokio::test]
async fn test_stop_all_cancels_every_trigger() {
    let h = HarnessBuilder::new().build();
    let scheduler = RefreshScheduler::new(h.engine.clone(), fast_periods());
    scheduler.start_all();
    assert!(eventually(|| h.feed.calls() >= 1).await);

    scheduler.stop_all();
    assert!(scheduler.running().is_empty());

    tokio::time::sleep(Duration::from_millis(10)).await;
    let calls = h.feed.calls();
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(h.feed.calls(), calls);
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let h = HarnessBuilder::new().build();
    let scheduler = RefreshScheduler::new(h.engine.clone(), slow_periods());

    assert!(scheduler.start(TriggerKind::Reminders));
    assert!(!scheduler.start(TriggerKind::Reminders));
    assert_eq!(scheduler.running(), vec![TriggerKind::Reminders]);

    assert!(scheduler.stop(TriggerKind::Reminders));
    assert!(!scheduler.stop(TriggerKind::Reminders));
}

#[tokio::test]
async fn test_dropping_scheduler_cancels_triggers() {
    let h = HarnessBuilder::new().build();
    let scheduler = RefreshScheduler::new(h.engine.clone(), fast_periods());
    scheduler.start(TriggerKind::Environment);
    assert!(eventually(|| h.feed.calls() >= 1).await);

    drop(scheduler);
    tokio::time::sleep(Duration::from_millis(10)).await;
    let calls = h.feed.calls();
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(h.feed.calls(), calls);
}

#[tokio::test]
async fn test_zero_period_trigger_is_refused() {
    let h = HarnessBuilder::new().build();
    let scheduler = RefreshScheduler::new(
        h.engine.clone(),
        RefreshPeriods {
            reminders: Duration::from_secs(0),
            ..slow_periods()
        },
    );

    assert!(!scheduler.start(TriggerKind::Reminders));
    assert!(scheduler.start(TriggerKind::Environment));
    assert_eq!(scheduler.running(), vec![TriggerKind::Environment]);
    scheduler.stop_all();
}

/// A merge landing mid-computation only prunes deleted fields; the running
/// computation keeps its snapshot and the next one sees the merge
#[tokio::test]
async fn test_merge_during_computation_applies_to_next_run() {
    let oracle = Arc::new(ScriptedOracle::gated());
    let h = HarnessBuilder::new()
        .session(ServiceTier::Pro, false, false)
        .oracle(oracle.clone())
        .build();
    h.engine
        .merge_fields(vec![
            field("a", GrowthStage::Flowering, "20", "500"),
            field("b", GrowthStage::Flowering, "25", "500"),
        ])
        .await;
    h.engine.refresh_environment().await.unwrap();

    oracle.release();
    assert_eq!(h.engine.recompute().await, RecomputeOutcome::Completed(2));
    // Consume the stored wakeup from the first run
    oracle.entered.notified().await;

    let engine = h.engine.clone();
    let running = tokio::spawn(async move { engine.recompute().await });
    oracle.entered.notified().await;

    h.engine.merge_fields(vec![field("b", GrowthStage::Maturity, "25", "500")]).await;
    let plan = h.engine.plan();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].field_id, "b");
    assert_eq!(h.engine.field("b").unwrap().growth_stage, GrowthStage::Maturity);

    // Flowering snapshot: ETc 0.22, 11.95 minutes
    oracle.release();
    assert_eq!(running.await.unwrap(), RecomputeOutcome::Completed(1));
    let plan = h.engine.plan();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].field_id, "b");
    assert_eq!(plan[0].duration_minutes, 12);

    // Maturity: ETc 0.16, 8.69 minutes
    oracle.release();
    assert_eq!(h.engine.recompute().await, RecomputeOutcome::Completed(1));
    assert_eq!(h.engine.plan()[0].duration_minutes, 9);
    assert_eq!(oracle.calls(), 3);
}
