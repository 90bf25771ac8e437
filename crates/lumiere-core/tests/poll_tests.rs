mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use lumiere_core::poll::{self, PollContext, PollKind, PollUpdate, Pollers};
use lumiere_core::{Backend, Config};
use parking_lot::RwLock;
use tokio::sync::mpsc;

fn context(requester: &str) -> Arc<RwLock<PollContext>> {
    Arc::new(RwLock::new(PollContext {
        requester: requester.to_string(),
        specialty: None,
    }))
}

#[tokio::test(start_paused = true)]
async fn test_first_fetch_waits_one_period() {
    let backend = Arc::new(FakeBackend::new());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _handle = poll::spawn(
        PollKind::DueReminders,
        Duration::from_secs(15),
        backend.clone(),
        context("ama"),
        tx,
    );

    tokio::time::sleep(Duration::from_secs(14)).await;
    assert_eq!(backend.count("due_reminders"), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(backend.count("due_reminders"), 1);
    assert!(matches!(rx.recv().await, Some(PollUpdate::DueReminders(Ok(_)))));
}

#[tokio::test(start_paused = true)]
async fn test_slow_fetch_does_not_hold_back_next_tick() {
    let backend = Arc::new(FakeBackend::new().with_stats_delay(Duration::from_secs(100)));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _handle = poll::spawn(
        PollKind::AgentStats,
        Duration::from_secs(30),
        backend.clone(),
        context("ama"),
        tx,
    );

    tokio::time::sleep(Duration::from_secs(95)).await;
    assert_eq!(backend.count("agent_stats"), 3);
    assert!(rx.try_recv().is_err());

    tokio::time::sleep(Duration::from_secs(40)).await;
    assert!(matches!(rx.try_recv(), Ok(PollUpdate::AgentStats(Ok(_)))));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_further_fetches() {
    let backend = Arc::new(FakeBackend::new());
    let (tx, _rx) = mpsc::unbounded_channel();
    let handle = poll::spawn(
        PollKind::MemoryFact,
        Duration::from_secs(20),
        backend.clone(),
        context("ama"),
        tx,
    );

    tokio::time::sleep(Duration::from_secs(45)).await;
    assert_eq!(backend.count("memory_fact"), 2);

    handle.cancel();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(backend.count("memory_fact"), 2);
    assert!(!handle.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_stops_timer() {
    let backend = Arc::new(FakeBackend::new());
    let (tx, _rx) = mpsc::unbounded_channel();
    let handle = poll::spawn(
        PollKind::Presence,
        Duration::from_secs(30),
        backend.clone(),
        context("ama"),
        tx,
    );
    drop(handle);

    tokio::time::sleep(Duration::from_secs(90)).await;
    assert_eq!(backend.count("presence"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_context_changes_apply_to_next_tick() {
    let backend = Arc::new(FakeBackend::new());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let ctx = context("ama");
    let _handle = poll::spawn(
        PollKind::MemoryFact,
        Duration::from_secs(20),
        backend.clone(),
        ctx.clone(),
        tx,
    );

    tokio::time::sleep(Duration::from_secs(21)).await;
    ctx.write().specialty = Some("language".to_string());
    tokio::time::sleep(Duration::from_secs(20)).await;

    let first = rx.recv().await;
    let second = rx.recv().await;
    assert!(matches!(first, Some(PollUpdate::MemoryFact(Ok(ref f))) if f == "A personal fact"));
    assert!(matches!(second, Some(PollUpdate::MemoryFact(Ok(ref f))) if f == "A language fact"));
}

#[tokio::test(start_paused = true)]
async fn test_pollers_follow_config() {
    let backend: Arc<dyn Backend> = Arc::new(FakeBackend::new());
    let (tx, _rx) = mpsc::unbounded_channel();
    let config = Config {
        presence_poll_secs: 0,
        ..Config::new()
    };

    let mut pollers = Pollers::start(&config, backend, context("ama"), tx);
    assert_eq!(
        pollers.kinds(),
        vec![PollKind::AgentStats, PollKind::MemoryFact, PollKind::DueReminders]
    );

    pollers.stop();
    assert!(pollers.kinds().is_empty());
}

#[tokio::test]
async fn test_poll_errors_are_delivered_not_dropped() {
    let backend = FakeBackend::new();
    backend.fail("presence");

    let update = poll::fetch(PollKind::Presence, &backend, &PollContext::default()).await;
    assert_eq!(update.kind(), PollKind::Presence);
    assert!(matches!(update, PollUpdate::Presence(Err(_))));
}
