// Per-session fetch and stream counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub chunks_fetched: u64,
    pub bytes_fetched: u64,
    pub fetch_failures: u64,
    pub streams_opened: u64,
}

#[derive(Default)]
pub struct StatsCollector {
    chunks_fetched: AtomicU64,
    bytes_fetched: AtomicU64,
    fetch_failures: AtomicU64,
    streams_opened: AtomicU64,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_chunk(&self, bytes: u64) {
        self.chunks_fetched.fetch_add(1, Ordering::Relaxed);
        self.bytes_fetched.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stream(&self) {
        self.streams_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            chunks_fetched: self.chunks_fetched.load(Ordering::Relaxed),
            bytes_fetched: self.bytes_fetched.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            streams_opened: self.streams_opened.load(Ordering::Relaxed),
        }
    }
}
