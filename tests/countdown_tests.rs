// Integration tests for the countdown timer: tick arithmetic, the clamp at
// zero, the single automatic stop, and deterministic cancellation.
//
// All tests run on the paused tokio clock; sleeps land between one-second
// tick marks so assertions never race a tick.

mod common;

use anyhow::Result;
use common::MockGateway;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use talktime_metering::{ConversationContext, QuotaKind, SessionEvent};

async fn sleep_secs_f(secs: f64) {
    tokio::time::sleep(Duration::from_millis((secs * 1000.0) as u64)).await;
}

#[tokio::test(start_paused = true)]
async fn duration_derives_from_absolute_elapsed_time() -> Result<()> {
    let gateway = Arc::new(MockGateway::new(100));
    let ctx = ConversationContext::open(gateway.clone(), "user-1", "conv-1").await;
    let controller = ctx.controller();

    controller.start_recording().await?;
    sleep_secs_f(5.5).await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.session_duration_seconds, 5);
    assert_eq!(snapshot.remaining_seconds, 95);

    controller.stop_recording().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn remaining_is_monotonically_non_increasing_while_active() -> Result<()> {
    let gateway = Arc::new(MockGateway::new(100));
    let ctx = ConversationContext::open(gateway.clone(), "user-1", "conv-1").await;
    let controller = ctx.controller();

    controller.start_recording().await?;

    // Sample halfway between tick marks so reads never race a tick
    let mut previous = controller.snapshot().await.remaining_seconds;
    sleep_secs_f(0.5).await;
    for _ in 0..4 {
        sleep_secs_f(1.0).await;
        let current = controller.snapshot().await.remaining_seconds;
        assert!(current <= previous, "remaining went up: {previous} -> {current}");
        previous = current;
    }
    assert_eq!(previous, 96);

    controller.stop_recording().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn countdown_reaching_zero_auto_stops_exactly_once() -> Result<()> {
    let gateway = Arc::new(MockGateway::new(3));
    gateway.end_duration.store(3, Ordering::SeqCst);

    let ctx = ConversationContext::open(gateway.clone(), "user-1", "conv-1").await;
    let controller = ctx.controller();
    let mut events = controller.events();
    let mut snapshots = controller.subscribe();

    controller.start_recording().await?;

    // Three ticks burn the whole budget; the third forces the stop
    sleep_secs_f(10.0).await;

    let snapshot = controller.snapshot().await;
    assert!(!snapshot.is_recording);
    assert!(!snapshot.is_processing);
    assert_eq!(snapshot.remaining_seconds, 0);
    assert!(!snapshot.can_start_conversation);
    assert_eq!(gateway.end_calls(), 1);

    // The published snapshot agrees with the queried one
    assert!(!snapshots.borrow_and_update().is_recording);

    // Exactly one limit notice
    let mut limit_notices = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SessionEvent::LimitReached(QuotaKind::Monthly)) {
            limit_notices += 1;
        }
    }
    assert_eq!(limit_notices, 1);

    // And the timer is gone: nothing moves afterwards
    sleep_secs_f(5.0).await;
    assert_eq!(gateway.end_calls(), 1);
    assert_eq!(controller.snapshot().await.remaining_seconds, 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn projection_never_goes_negative() -> Result<()> {
    let gateway = Arc::new(MockGateway::new(2));
    gateway.end_duration.store(2, Ordering::SeqCst);

    let ctx = ConversationContext::open(gateway.clone(), "user-1", "conv-1").await;
    let controller = ctx.controller();

    controller.start_recording().await?;
    // Far more wall time than budget; the clamp and the auto-stop keep the
    // projection pinned at zero
    sleep_secs_f(10.0).await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.remaining_seconds, 0);
    assert!(!snapshot.is_recording);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_the_timer_before_returning() -> Result<()> {
    let gateway = Arc::new(MockGateway::new(100));
    gateway.end_duration.store(2, Ordering::SeqCst);

    let ctx = ConversationContext::open(gateway.clone(), "user-1", "conv-1").await;
    let controller = ctx.controller();

    controller.start_recording().await?;
    sleep_secs_f(2.5).await;
    controller.stop_recording().await?;

    let after_stop = controller.snapshot().await;
    assert_eq!(after_stop.session_duration_seconds, 2);
    assert_eq!(after_stop.remaining_seconds, 98);

    // A cancelled timer leaves the snapshot frozen
    sleep_secs_f(10.0).await;
    let later = controller.snapshot().await;
    assert_eq!(later.remaining_seconds, after_stop.remaining_seconds);
    assert_eq!(later.session_duration_seconds, after_stop.session_duration_seconds);
    assert_eq!(gateway.end_calls(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn timer_is_cancelled_even_when_the_close_fails() -> Result<()> {
    let gateway = Arc::new(MockGateway::new(100));
    gateway.fail_end.store(true, Ordering::SeqCst);

    let ctx = ConversationContext::open(gateway.clone(), "user-1", "conv-1").await;
    let controller = ctx.controller();

    controller.start_recording().await?;
    sleep_secs_f(1.5).await;
    let _ = controller.stop_recording().await;

    // Reconciliation reread the authority (still 100); nothing ticks anymore
    let after_stop = controller.snapshot().await.remaining_seconds;
    sleep_secs_f(10.0).await;
    assert_eq!(controller.snapshot().await.remaining_seconds, after_stop);
    assert_eq!(gateway.end_calls(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn every_tick_publishes_a_snapshot() -> Result<()> {
    let gateway = Arc::new(MockGateway::new(100));
    let ctx = ConversationContext::open(gateway.clone(), "user-1", "conv-1").await;
    let controller = ctx.controller();
    let mut snapshots = controller.subscribe();

    controller.start_recording().await?;
    snapshots.borrow_and_update();

    sleep_secs_f(1.5).await;
    assert!(snapshots.has_changed()?);
    assert_eq!(snapshots.borrow_and_update().remaining_seconds, 99);

    sleep_secs_f(1.0).await;
    assert!(snapshots.has_changed()?);
    assert_eq!(snapshots.borrow_and_update().remaining_seconds, 98);

    controller.stop_recording().await?;
    Ok(())
}
