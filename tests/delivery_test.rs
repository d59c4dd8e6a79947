//! End-to-end delivery tests over in-memory sources and sinks, with real
//! checkpoint files where restarts are involved

use chrono::{DateTime, Duration, TimeZone, Utc};
use ferry::config::FerryConfig;
use ferry::core::{DeliveryLoop, DeliveryOutcome, Progress};
use ferry::error::FerryError;
use ferry::event::{AuditEvent, Cursor, EventId};
use ferry::sink::RecordingSink;
use ferry::source::{MemorySearch, PagedSearch, SearchEvents};
use ferry_core_checkpoint::{source_key, CheckpointStore, FileStore, MemoryStore};
use std::future::pending;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
}

fn ev(id: &str) -> AuditEvent {
    AuditEvent::new(id, "user.login", base()).with_field("user", "alice")
}

fn config(batch_size: usize, max_events: u64) -> FerryConfig {
    FerryConfig {
        batch_size,
        max_events: Some(max_events),
        retry_delay_secs: 0,
        dry_run: true,
        ..Default::default()
    }
}

fn key() -> String {
    source_key("https://auth.example.com:3025", "default")
}

/// One process lifetime: load progress, deliver, hand the store back
async fn run_once<S, C>(
    client: S,
    sink: &Arc<RecordingSink>,
    store: C,
    config: &FerryConfig,
) -> (Result<DeliveryOutcome, FerryError>, C)
where
    S: SearchEvents,
    C: CheckpointStore,
{
    let progress = Progress::load(store, &key(), config.start_time).unwrap();
    let mut delivery = DeliveryLoop::from_config(client, sink.clone(), progress, config);
    let outcome = delivery.run(pending()).await;
    (outcome, delivery.into_progress().into_store())
}

fn open(dir: &Path) -> FileStore {
    FileStore::open(dir).unwrap()
}

#[tokio::test]
async fn test_every_event_delivered_once_in_order() {
    let log = Arc::new(MemorySearch::new());
    let ids: Vec<String> = (0..23).map(|i| format!("evt-{i:02}")).collect();
    log.extend(ids.iter().map(|id| ev(id)));

    let sink = Arc::new(RecordingSink::new());
    let (outcome, _) = run_once(log, &sink, MemoryStore::new(), &config(5, 23)).await;

    assert_eq!(outcome.unwrap(), DeliveryOutcome::Completed);
    assert_eq!(sink.sent_ids(), ids);
}

#[tokio::test]
async fn test_restarts_between_every_event_lose_and_repeat_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let log = Arc::new(MemorySearch::new());
    let ids: Vec<String> = (0..7).map(|i| format!("e{i}")).collect();
    log.extend(ids.iter().map(|id| ev(id)));

    let sink = Arc::new(RecordingSink::new());
    for _ in 0..ids.len() {
        let (outcome, _) = run_once(log.clone(), &sink, open(temp_dir.path()), &config(3, 1)).await;
        assert_eq!(outcome.unwrap(), DeliveryOutcome::Completed);
    }

    assert_eq!(sink.sent_ids(), ids);
}

#[tokio::test]
async fn test_crash_mid_page_resumes_after_last_delivered() {
    let temp_dir = TempDir::new().unwrap();
    let pages = Arc::new(PagedSearch::new());
    pages.set_page("", vec![ev("a"), ev("b"), ev("c")], "p2");

    let sink = Arc::new(RecordingSink::new());
    run_once(pages.clone(), &sink, open(temp_dir.path()), &config(3, 2)).await;
    assert_eq!(sink.sent_ids(), vec!["a", "b"]);

    // Restart: same cursor, "b" found on the page, only "c" remains
    let (outcome, store) = run_once(pages.clone(), &sink, open(temp_dir.path()), &config(3, 1)).await;
    assert_eq!(outcome.unwrap(), DeliveryOutcome::Completed);
    assert_eq!(sink.sent_ids(), vec!["a", "b", "c"]);

    let restart_query = pages.queries().pop().unwrap();
    assert!(restart_query.cursor.is_empty());

    let progress = Progress::load(store, &key(), DateTime::<Utc>::UNIX_EPOCH).unwrap();
    assert_eq!(progress.last_delivered_id(), &EventId::from("c"));
}

#[tokio::test]
async fn test_fully_delivered_page_flips_to_next_cursor() {
    let temp_dir = TempDir::new().unwrap();
    let pages = Arc::new(PagedSearch::new());
    pages.set_page("", vec![ev("a")], "p2");
    pages.set_page("p2", vec![ev("b"), ev("c")], "");

    let sink = Arc::new(RecordingSink::new());
    run_once(pages.clone(), &sink, open(temp_dir.path()), &config(2, 1)).await;
    let (_, store) = run_once(pages.clone(), &sink, open(temp_dir.path()), &config(2, 1)).await;

    assert_eq!(sink.sent_ids(), vec!["a", "b"]);
    let progress = Progress::load(store, &key(), DateTime::<Utc>::UNIX_EPOCH).unwrap();
    assert_eq!(progress.cursor(), &Cursor::from("p2"));
    assert_eq!(progress.last_delivered_id(), &EventId::from("b"));
}

#[tokio::test]
async fn test_rejected_event_is_not_checkpointed_and_is_resent() {
    let temp_dir = TempDir::new().unwrap();
    let log = Arc::new(MemorySearch::new());
    log.extend(["a", "b", "c"].map(ev));

    let failing = Arc::new(RecordingSink::new());
    failing.reject("b");
    let (outcome, store) = run_once(log.clone(), &failing, open(temp_dir.path()), &config(10, 3)).await;
    assert!(matches!(outcome, Err(FerryError::Sink { .. })));

    let progress = Progress::load(store, &key(), DateTime::<Utc>::UNIX_EPOCH).unwrap();
    assert_eq!(progress.last_delivered_id(), &EventId::from("a"));

    let healthy = Arc::new(RecordingSink::new());
    run_once(log, &healthy, open(temp_dir.path()), &config(10, 2)).await;
    assert_eq!(healthy.sent_ids(), vec!["b", "c"]);
}

#[tokio::test]
async fn test_lost_checkpoint_write_redelivers_event() {
    let log = Arc::new(MemorySearch::new());
    log.extend(["a", "b"].map(ev));

    // Fresh progress takes three writes and "a" one more (the cursor does not
    // change); the write recording "b" fails after "b" was sent
    let mut store = MemoryStore::new();
    store.fail_writes_after(3 + 1);

    let first = Arc::new(RecordingSink::new());
    let (outcome, mut store) = run_once(log.clone(), &first, store, &config(10, 2)).await;
    assert!(matches!(outcome, Err(FerryError::Checkpoint(_))));
    assert_eq!(first.sent_ids(), vec!["a", "b"]);

    store.fail_writes_after(usize::MAX);
    let second = Arc::new(RecordingSink::new());
    run_once(log, &second, store, &config(10, 1)).await;
    assert_eq!(second.sent_ids(), vec!["b"]);
}

#[tokio::test]
async fn test_start_time_change_rescans_from_new_start() {
    let temp_dir = TempDir::new().unwrap();
    let log = Arc::new(MemorySearch::new());
    for i in 0..4 {
        log.push(AuditEvent::new(
            format!("e{i}"),
            "user.login",
            base() + Duration::hours(i),
        ));
    }

    let sink = Arc::new(RecordingSink::new());
    run_once(log.clone(), &sink, open(temp_dir.path()), &config(10, 4)).await;
    assert_eq!(sink.sent_ids(), vec!["e0", "e1", "e2", "e3"]);

    let mut moved = config(10, 2);
    moved.start_time = base() + Duration::hours(2);
    let rescan = Arc::new(RecordingSink::new());
    let (outcome, store) = run_once(log.clone(), &rescan, open(temp_dir.path()), &moved).await;

    assert_eq!(outcome.unwrap(), DeliveryOutcome::Completed);
    assert_eq!(rescan.sent_ids(), vec!["e2", "e3"]);
    let last_query = log.queries().pop().unwrap();
    assert_eq!(last_query.from, base() + Duration::hours(2));

    let stored_start = store.get(&format!("{}.start_time", key())).unwrap();
    assert_eq!(stored_start.as_deref(), Some("2024-05-01T11:00:00Z"));
}

#[tokio::test]
async fn test_unknown_last_id_restarts_page_from_beginning() {
    let temp_dir = TempDir::new().unwrap();
    let pages = Arc::new(PagedSearch::new());
    pages.set_page("", vec![ev("a"), ev("b")], "");

    let sink = Arc::new(RecordingSink::new());
    run_once(pages.clone(), &sink, open(temp_dir.path()), &config(2, 1)).await;

    // "a" aged out of retention before the restart
    pages.set_page("", vec![ev("b"), ev("c")], "");
    run_once(pages, &sink, open(temp_dir.path()), &config(2, 2)).await;

    assert_eq!(sink.sent_ids(), vec!["a", "b", "c"]);
}

#[tokio::test(start_paused = true)]
async fn test_idle_source_polls_until_events_arrive() {
    let log = Arc::new(MemorySearch::new());
    let sink = Arc::new(RecordingSink::new());
    let cfg = FerryConfig {
        poll_timeout_secs: 5,
        ..config(10, 1)
    };

    let progress = Progress::load(MemoryStore::new(), &key(), cfg.start_time).unwrap();
    let mut delivery = DeliveryLoop::from_config(log.clone(), sink.clone(), progress, &cfg);

    let producer = {
        let log = log.clone();
        async move {
            tokio::time::sleep(std::time::Duration::from_secs(12)).await;
            log.push(ev("late"));
        }
    };
    let (outcome, ()) = tokio::join!(delivery.run(pending()), producer);

    assert_eq!(outcome.unwrap(), DeliveryOutcome::Completed);
    assert_eq!(sink.sent_ids(), vec!["late"]);
    assert!(delivery.stats().empty_polls >= 2);
    assert!(log.queries().iter().all(|q| q.cursor.is_empty()));
}
