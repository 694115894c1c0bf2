//! Integration tests for the toast lifecycle as seen by the page surface.

use std::sync::Arc;
use std::time::Duration;

use tokio_live_orchestrator::config::NotificationConfig;
use tokio_live_orchestrator::fallback::{FallbackHandler, GENERIC_ERROR_MESSAGE};
use tokio_live_orchestrator::{
    Dispatcher, Intent, MemorySurface, NotificationCenter, NotificationKind, OrchestratorError,
    Scheduler,
};

fn center_with(config: NotificationConfig) -> (NotificationCenter, Arc<MemorySurface>) {
    let surface = Arc::new(MemorySurface::new());
    let center = NotificationCenter::new(config, Dispatcher::new(surface.clone()));
    (center, surface)
}

fn center() -> (NotificationCenter, Arc<MemorySurface>) {
    center_with(NotificationConfig::default())
}

#[tokio::test(start_paused = true)]
async fn test_timed_toast_is_gone_within_duration_plus_exit() {
    let (center, surface) = center();
    let id = center.notify_for("Saved", NotificationKind::Success, Duration::from_millis(2000));

    tokio::time::sleep(Duration::from_millis(1999)).await;
    assert!(center.contains(id));

    // 2000ms duration + 300ms exit, plus a little tolerance.
    tokio::time::sleep(Duration::from_millis(2000 + 300 + 10 - 1999)).await;
    assert!(!center.contains(id));
    assert!(surface.toasts().is_empty());

    let lifecycle: Vec<_> = surface.journal();
    assert!(matches!(lifecycle[0], Intent::InsertNotification { .. }));
    assert!(matches!(lifecycle[1], Intent::ShowNotification { .. }));
    assert!(matches!(lifecycle[2], Intent::HideNotification { .. }));
    assert!(matches!(lifecycle[3], Intent::RemoveNotification { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_default_duration_is_five_seconds() {
    let (center, _surface) = center();
    let id = center.notify("Heads up", NotificationKind::Warning);
    tokio::time::sleep(Duration::from_millis(4900)).await;
    assert!(center.contains(id));
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!center.contains(id));
}

#[tokio::test(start_paused = true)]
async fn test_two_rapid_notifies_stack_in_order_and_dismiss_independently() {
    let (center, surface) = center();
    let first = center.notify_for("User 3 deleted", NotificationKind::Success, Duration::ZERO);
    let second = center.notify_for("User 4 deleted", NotificationKind::Success, Duration::ZERO);
    assert_ne!(first, second);

    let ids: Vec<_> = center.snapshot().iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![first, second]);

    assert!(center.dismiss(first));
    tokio::time::sleep(Duration::from_millis(400)).await;

    let remaining = center.snapshot();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, second);
    assert!(remaining[0].visible);
    assert_eq!(surface.toasts().len(), 1);
    assert_eq!(surface.toasts()[0].id, second);
}

#[tokio::test(start_paused = true)]
async fn test_dedupe_can_be_disabled() {
    let (center, _surface) = center_with(NotificationConfig {
        dedupe: false,
        ..NotificationConfig::default()
    });
    let a = center.notify("Refreshing data...", NotificationKind::Info);
    let b = center.notify("Refreshing data...", NotificationKind::Info);
    assert_ne!(a, b);
    assert_eq!(center.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_dismissing_entry_does_not_absorb_new_identical_message() {
    let (center, _surface) = center();
    let a = center.notify_for("Session saved", NotificationKind::Info, Duration::ZERO);
    assert!(center.dismiss(a));
    let b = center.notify_for("Session saved", NotificationKind::Info, Duration::ZERO);
    assert_ne!(a, b);
}

#[tokio::test(start_paused = true)]
async fn test_sticky_request_is_not_absorbed_by_timed_duplicate() {
    let (center, _surface) = center();
    let timed = center.notify_for("Sync pending", NotificationKind::Warning, Duration::from_millis(2000));
    let sticky = center.notify_for("Sync pending", NotificationKind::Warning, Duration::ZERO);
    assert_ne!(timed, sticky);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!center.contains(timed));
    assert!(center.contains(sticky));

    let again = center.notify_for("Sync pending", NotificationKind::Warning, Duration::ZERO);
    assert_eq!(again, sticky);
}

#[tokio::test(start_paused = true)]
async fn test_missing_stack_container_never_fails_the_caller() {
    let surface = Arc::new(MemorySurface::without_notification_stack());
    let center = NotificationCenter::new(
        NotificationConfig::default(),
        Dispatcher::new(surface.clone()),
    );

    let id = center.notify_for("lost", NotificationKind::Error, Duration::from_millis(100));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!center.contains(id));
    assert!(surface.journal().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failing_scheduled_task_surfaces_generic_error() {
    let (center, surface) = center();
    let scheduler = Scheduler::new().with_fallback(FallbackHandler::new(center.clone()));
    scheduler.schedule("tick", Duration::from_secs(1), || async {
        Err(OrchestratorError::Other("stray failure".into()))
    });

    tokio::time::sleep(Duration::from_millis(1500)).await;
    let toasts = surface.toasts();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].kind, NotificationKind::Error);
    assert_eq!(toasts[0].message, GENERIC_ERROR_MESSAGE);

    // A second failure while the first toast is live collapses into it.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(center.len(), 1);
    scheduler.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_clears_and_rejects_new_toasts() {
    let (center, surface) = center();
    center.notify_for("a", NotificationKind::Info, Duration::ZERO);
    center.notify_for("b", NotificationKind::Info, Duration::ZERO);
    center.shutdown();
    assert!(center.is_empty());
    assert!(surface.toasts().is_empty());

    center.notify("after", NotificationKind::Info);
    assert!(center.is_empty());
}
