use std::sync::{Arc, Barrier, Mutex};

use chunkcast::config::EngineConfig;
use chunkcast::engine::pool::SessionPool;
use chunkcast::engine::session::{session_id_for, Session, SessionRole, SessionState};
use chunkcast::error::Error;
use chunkcast::source::memory_source::MemoryChunkSource;
use chunkcast::source::traits::ChunkSource;

fn memory_session(id: &str, role: SessionRole) -> Session {
    Session::with_id(id, role, Arc::new(MemoryChunkSource::new()), 100)
}

fn load(session: &Session, units: u32) {
    for _ in 0..units {
        session.increment_workload();
    }
}

#[tokio::test]
async fn test_select_skips_sessions_that_are_not_running() {
    let pool = SessionPool::new();
    pool.register(memory_session("primary", SessionRole::Primary))
        .unwrap();
    let failing = Arc::new(MemoryChunkSource::new());
    failing.set_fail_connect(true);
    pool.register(Session::with_id("worker_a", SessionRole::Worker, failing.clone(), 100))
        .unwrap();

    assert!(pool.select().is_none());

    let report = pool.start_all().await;
    assert_eq!(report.started, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(pool.failed_count(), 1);

    let selected = pool.select().unwrap();
    assert_eq!(selected.id(), "primary");
    assert!(selected.is_running());

    let failed = pool.get("worker_a").unwrap();
    assert_eq!(failed.state(), SessionState::Failed);
    assert_eq!(failed.last_error().as_deref(), Some("connection refused"));
}

#[tokio::test]
async fn test_select_least_workload_with_id_tie_break() {
    let pool = SessionPool::new();
    let b = pool
        .register(memory_session("worker_b", SessionRole::Worker))
        .unwrap();
    let a = pool
        .register(memory_session("worker_a", SessionRole::Worker))
        .unwrap();
    pool.start_all().await;

    assert_eq!(pool.select().unwrap().id(), "worker_a");

    load(&a, 2);
    load(&b, 1);
    assert_eq!(pool.select().unwrap().id(), "worker_b");

    load(&b, 1);
    assert_eq!(pool.select().unwrap().id(), "worker_a");

    // select never mutates workload
    assert_eq!(a.workload(), 2);
    assert_eq!(b.workload(), 2);
}

#[tokio::test]
async fn test_worker_preferred_over_idle_primary() {
    let pool = SessionPool::new();
    let primary = pool
        .register(memory_session("primary", SessionRole::Primary))
        .unwrap();
    let worker = pool
        .register(memory_session("worker_1", SessionRole::Worker))
        .unwrap();
    pool.start_all().await;

    load(&worker, 40);
    assert_eq!(primary.workload(), 0);
    assert_eq!(pool.select().unwrap().id(), "worker_1");

    // A saturated worker leaves the primary as the only candidate.
    load(&worker, 60);
    assert!(!worker.is_available());
    assert_eq!(pool.select().unwrap().id(), "primary");
}

#[tokio::test]
async fn test_acquire_brackets_workload() {
    let pool = SessionPool::new();
    let worker = pool
        .register(Session::with_id(
            "worker_1",
            SessionRole::Worker,
            Arc::new(MemoryChunkSource::new()),
            2,
        ))
        .unwrap();
    pool.start_all().await;

    let first = pool.acquire().unwrap();
    let second = pool.acquire().unwrap();
    assert_eq!(worker.workload(), 2);
    assert!(matches!(pool.acquire(), Err(Error::CapacityExhausted)));

    drop(first);
    assert_eq!(worker.workload(), 1);
    assert!(pool.acquire().is_ok());

    drop(second);
    assert_eq!(worker.workload(), 0);
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_second_primary() {
    let pool = SessionPool::new();
    pool.register(memory_session("primary", SessionRole::Primary))
        .unwrap();
    pool.register(memory_session("worker_1", SessionRole::Worker))
        .unwrap();

    assert!(matches!(
        pool.register(memory_session("worker_1", SessionRole::Worker)),
        Err(Error::DuplicateSession(id)) if id == "worker_1"
    ));
    assert!(matches!(
        pool.register(memory_session("primary_2", SessionRole::Primary)),
        Err(Error::MultiplePrimary { existing, rejected })
            if existing == "primary" && rejected == "primary_2"
    ));
    assert_eq!(pool.len(), 2);
}

#[tokio::test]
async fn test_stop_all_is_idempotent() {
    let pool = SessionPool::new();
    pool.register(memory_session("primary", SessionRole::Primary))
        .unwrap();
    pool.register(memory_session("worker_1", SessionRole::Worker))
        .unwrap();
    pool.start_all().await;

    assert_eq!(pool.stop_all().await, 2);
    assert_eq!(pool.stop_all().await, 0);
    for session in pool.all() {
        assert_eq!(session.state(), SessionState::Stopped);
        session.stop().await;
        assert_eq!(session.state(), SessionState::Stopped);
    }
    assert!(pool.select().is_none());
}

#[tokio::test]
async fn test_unregister() {
    let pool = SessionPool::new();
    let primary = pool
        .register(memory_session("primary", SessionRole::Primary))
        .unwrap();
    pool.start_all().await;

    assert!(pool.unregister("primary").await);
    assert!(!pool.unregister("primary").await);
    assert!(pool.is_empty());
    assert!(pool.primary().is_none());
    assert_eq!(primary.state(), SessionState::Stopped);

    // The primary slot is free again.
    pool.register(memory_session("primary", SessionRole::Primary))
        .unwrap();
}

#[tokio::test]
async fn test_select_random_draws_from_candidates() {
    let pool = SessionPool::new();
    pool.register(memory_session("primary", SessionRole::Primary))
        .unwrap();
    pool.register(memory_session("worker_a", SessionRole::Worker))
        .unwrap();
    pool.register(memory_session("worker_b", SessionRole::Worker))
        .unwrap();
    assert!(pool.select_random().is_none());

    pool.start_all().await;
    for _ in 0..20 {
        let picked = pool.select_random().unwrap();
        assert!(picked.is_available());
        assert!(!picked.is_primary());
    }
}

#[test]
fn test_from_config_counts_rejected_workers() {
    let config = EngineConfig {
        primary_credential: "primary-token".to_string(),
        worker_credentials: vec![
            "worker-token".to_string(),
            "   ".to_string(),
            "worker-token".to_string(),
        ],
        ..Default::default()
    };
    let connector = |_: &str, _: SessionRole| -> anyhow::Result<Arc<dyn ChunkSource>> {
        Ok(Arc::new(MemoryChunkSource::new()))
    };

    let pool = SessionPool::from_config(&config, &connector).unwrap();
    assert_eq!(pool.len(), 2);
    assert_eq!(pool.config_rejections(), 2);
    assert_eq!(pool.primary().unwrap().id(), "primary");
    assert!(pool
        .get(&session_id_for("worker-token", SessionRole::Worker))
        .is_some());
}

#[test]
fn test_from_config_requires_primary_credential() {
    let config = EngineConfig::default();
    let connector = |_: &str, _: SessionRole| -> anyhow::Result<Arc<dyn ChunkSource>> {
        Ok(Arc::new(MemoryChunkSource::new()))
    };
    assert!(matches!(
        SessionPool::from_config(&config, &connector),
        Err(Error::Configuration(_))
    ));
}

#[tokio::test]
async fn test_concurrent_acquire_never_exceeds_capacity() {
    let pool = SessionPool::new();
    let worker = pool
        .register(Session::with_id(
            "worker_1",
            SessionRole::Worker,
            Arc::new(MemoryChunkSource::new()),
            5,
        ))
        .unwrap();
    pool.start_all().await;

    let guards = Mutex::new(Vec::new());
    let barrier = Barrier::new(16);
    std::thread::scope(|scope| {
        for _ in 0..16 {
            scope.spawn(|| {
                barrier.wait();
                for _ in 0..10 {
                    if let Ok(guard) = pool.acquire() {
                        guards.lock().unwrap().push(guard);
                    }
                }
            });
        }
    });

    assert_eq!(guards.lock().unwrap().len(), 5);
    assert_eq!(worker.workload(), 5);
    drop(guards);
    assert_eq!(worker.workload(), 0);
}
