//! Integration tests for refresh cycles driven by the scheduler.
//!
//! Covers:
//! - Mixed success/failure cycle: one error toast, render applied, busy cleared once
//! - Overlap prevention for manual triggers and cadences
//! - Scheduler skip-not-queue behaviour with a slow callback
//! - Loading indicator lifetime

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;

use tokio_live_orchestrator::config::{NotificationConfig, RefreshConfig};
use tokio_live_orchestrator::{
    CycleOutcome, CycleParams, CycleScope, Dispatcher, Intent, MemorySurface, Method,
    NotificationCenter, NotificationKind, OrchestratorError, Producer, RefreshOrchestrator,
    Scheduler, ScriptedTransport, Transport, Trigger,
};

// ============================================================================
// Helpers
// ============================================================================

struct Console {
    orchestrator: RefreshOrchestrator,
    notifications: NotificationCenter,
    surface: Arc<MemorySurface>,
}

fn console() -> Console {
    let surface = Arc::new(MemorySurface::new());
    let dispatcher = Dispatcher::new(surface.clone());
    let notifications = NotificationCenter::new(NotificationConfig::default(), dispatcher.clone());
    let orchestrator =
        RefreshOrchestrator::new(RefreshConfig::default(), notifications.clone(), dispatcher);
    Console {
        orchestrator,
        notifications,
        surface,
    }
}

fn slow_counter(name: &str, delay: Duration, calls: &Arc<AtomicU64>) -> Producer {
    let calls = Arc::clone(calls);
    Producer::new(name, move |_| {
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            Ok(())
        }
    })
}

fn loading_toggles(surface: &MemorySurface) -> (usize, usize) {
    let journal = surface.journal();
    let started = journal.iter().filter(|i| **i == Intent::LoadingStarted).count();
    let finished = journal.iter().filter(|i| **i == Intent::LoadingFinished).count();
    (started, finished)
}

// ============================================================================
// Mixed outcomes
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_slow_success_and_fast_failure_settle_together() {
    let c = console();
    let transport = ScriptedTransport::new();
    transport.respond_after(Method::Get, "/a", Duration::from_millis(50), json!({"value": 1}));
    transport.fail_after(
        Method::Get,
        "/b",
        Duration::from_millis(10),
        OrchestratorError::status(502, "bad gateway"),
    );
    let transport: Arc<dyn Transport> = Arc::new(transport);

    let rendered = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&rendered);
    c.orchestrator.register_producer(Producer::fetch_and_render(
        "A",
        Arc::clone(&transport),
        "/a",
        move |payload| {
            *sink.lock() = Some(payload);
            Ok(())
        },
    ));
    let b_renders = Arc::new(AtomicU64::new(0));
    let b_sink = Arc::clone(&b_renders);
    c.orchestrator.register_producer(Producer::fetch_and_render(
        "B",
        transport,
        "/b",
        move |_| {
            b_sink.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
    ));

    let start = tokio::time::Instant::now();
    let outcome = c
        .orchestrator
        .trigger_cycle(CycleScope::All, Trigger::Timer, CycleParams::default())
        .await;
    assert!(start.elapsed() >= Duration::from_millis(50));

    let CycleOutcome::Completed(report) = outcome else {
        panic!("cycle should have run");
    };
    assert_eq!(report.succeeded, vec!["A".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "B");

    assert_eq!(*rendered.lock(), Some(json!({"value": 1})));
    assert_eq!(b_renders.load(Ordering::SeqCst), 0, "render never runs on failure");

    let errors: Vec<_> = c
        .notifications
        .snapshot()
        .into_iter()
        .filter(|n| n.kind == NotificationKind::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains('B'));

    assert!(!c.orchestrator.is_busy());
    assert_eq!(c.orchestrator.completed_cycles(), 1);
    assert_eq!(loading_toggles(&c.surface), (1, 1));
    assert!(!c.surface.is_loading());
}

#[tokio::test(start_paused = true)]
async fn test_failed_cycle_does_not_block_next_cycle() {
    let c = console();
    let attempts = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&attempts);
    c.orchestrator.register_producer(Producer::new("flaky", move |_| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if n == 0 {
                Err(OrchestratorError::network("connection reset"))
            } else {
                Ok(())
            }
        }
    }));

    let first = c
        .orchestrator
        .trigger_cycle(CycleScope::All, Trigger::Timer, CycleParams::default())
        .await;
    let second = c
        .orchestrator
        .trigger_cycle(CycleScope::All, Trigger::Timer, CycleParams::default())
        .await;

    assert!(!first.report().map(|r| r.is_success()).unwrap_or(true));
    assert!(second.report().map(|r| r.is_success()).unwrap_or(false));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(loading_toggles(&c.surface), (2, 2));
}

// ============================================================================
// Overlap prevention
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_triggers_while_busy_invoke_nothing() {
    let c = console();
    let calls = Arc::new(AtomicU64::new(0));
    c.orchestrator
        .register_producer(slow_counter("slow", Duration::from_secs(2), &calls));

    let orchestrator = c.orchestrator.clone();
    let running = tokio::spawn(async move {
        orchestrator
            .trigger_cycle(CycleScope::All, Trigger::Manual, CycleParams::default())
            .await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    for trigger in [Trigger::Manual, Trigger::Timer, Trigger::Search] {
        let outcome = c
            .orchestrator
            .trigger_cycle(CycleScope::All, trigger, CycleParams::default())
            .await;
        assert!(matches!(outcome, CycleOutcome::Skipped));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    running.await.expect("cycle task must not panic");
    assert_eq!(calls.load(Ordering::SeqCst), 1, "skipped triggers are not queued");
    assert_eq!(c.orchestrator.skipped_cycles(), 3);
    assert!(!c.orchestrator.is_busy());
}

#[tokio::test(start_paused = true)]
async fn test_settlement_handler_retrigger_is_guarded() {
    let c = console();
    let calls = Arc::new(AtomicU64::new(0));
    let outcomes = Arc::new(Mutex::new(Vec::new()));

    let orchestrator = c.orchestrator.clone();
    let counter = Arc::clone(&calls);
    let seen = Arc::clone(&outcomes);
    c.orchestrator.register_producer(Producer::new("reentrant", move |_| {
        let orchestrator = orchestrator.clone();
        let counter = Arc::clone(&counter);
        let seen = Arc::clone(&seen);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            let nested = orchestrator
                .trigger_cycle(CycleScope::All, Trigger::Manual, CycleParams::default())
                .await;
            seen.lock().push(matches!(nested, CycleOutcome::Skipped));
            Ok(())
        }
    }));

    c.orchestrator
        .trigger_cycle(CycleScope::All, Trigger::Timer, CycleParams::default())
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(*outcomes.lock(), vec![true]);
}

// ============================================================================
// Cadences
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_slow_callback_skips_exactly_one_firing() {
    let scheduler = Scheduler::new();
    let starts = Arc::new(Mutex::new(Vec::new()));
    let origin = tokio::time::Instant::now();

    let log = Arc::clone(&starts);
    let handle = scheduler.schedule("slow", Duration::from_secs(30), move || {
        let log = Arc::clone(&log);
        async move {
            log.lock().push(origin.elapsed().as_secs());
            tokio::time::sleep(Duration::from_secs(45)).await;
            Ok(())
        }
    });

    // Fires at 30s, busy until 75s; the 60s boundary is skipped; resumes at 90s.
    tokio::time::sleep(Duration::from_secs(95)).await;
    assert_eq!(*starts.lock(), vec![30, 90]);
    assert_eq!(handle.skipped(), 1);
    scheduler.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_cadence_and_manual_share_busy_guard() {
    let c = console();
    let calls = Arc::new(AtomicU64::new(0));
    c.orchestrator
        .register_producer(slow_counter("stats", Duration::from_secs(5), &calls));

    let scheduler = Scheduler::new();
    c.orchestrator
        .schedule_cadence(&scheduler, "stats", Duration::from_secs(30), CycleScope::All);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert!(c.orchestrator.is_busy());
    let manual = c
        .orchestrator
        .trigger_cycle(CycleScope::All, Trigger::Manual, CycleParams::default())
        .await;
    assert!(matches!(manual, CycleOutcome::Skipped));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!c.orchestrator.is_busy());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    scheduler.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_cadence_stops_after_cancel() {
    let c = console();
    let calls = Arc::new(AtomicU64::new(0));
    c.orchestrator
        .register_producer(slow_counter("charts", Duration::ZERO, &calls));

    let scheduler = Scheduler::new();
    c.orchestrator
        .schedule_cadence(&scheduler, "charts", Duration::from_secs(120), CycleScope::All);

    tokio::time::sleep(Duration::from_secs(250)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    assert!(scheduler.cancel("charts"));
    assert!(!scheduler.cancel("charts"));
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
