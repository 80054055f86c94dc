// Range streamer: pull-based delivery of a byte interval from chunk fetches.

use std::sync::Arc;

use anyhow::anyhow;
use bytes::Bytes;
use futures::Stream;
use tracing::{debug, warn};

use super::plan::ChunkPlan;
use super::session::WorkloadGuard;
use super::stats::StatsCollector;
use crate::error::{Error, Result};
use crate::source::traits::{ChunkSource, FileLocator, SourceError};

#[derive(Debug, Clone, Copy)]
pub struct RangeStreamer {
    chunk_size: u64,
}

impl RangeStreamer {
    pub fn new(chunk_size: u64) -> Self {
        Self { chunk_size }
    }

    pub fn plan(&self, start: u64, end: u64, file_size: u64) -> Result<ChunkPlan> {
        ChunkPlan::new(start, end, file_size, self.chunk_size)
    }

    /// Stream `plan` straight from `source`.
    pub fn stream(
        &self,
        source: Arc<dyn ChunkSource>,
        locator: FileLocator,
        plan: ChunkPlan,
    ) -> RangeStream {
        RangeStream::new(source, locator, plan, None, None)
    }

    /// Stream `plan` through the session held by `guard`.
    ///
    /// The guard's workload unit is released when the stream finishes, fails,
    /// or is dropped by a disconnecting client.
    pub fn stream_on(
        &self,
        guard: WorkloadGuard,
        locator: FileLocator,
        plan: ChunkPlan,
    ) -> RangeStream {
        let session = guard.session().clone();
        session.stats().record_stream();
        RangeStream::new(
            session.source().clone(),
            locator,
            plan,
            Some(session.stats().clone()),
            Some(guard),
        )
    }
}

/// Single-use sequence of trimmed chunk slices covering exactly `plan`.
///
/// Each call to [`next_chunk`](Self::next_chunk) issues at most one fetch, so the
/// consumer sets the pace. Dropping the stream stops further fetches.
pub struct RangeStream {
    source: Arc<dyn ChunkSource>,
    locator: FileLocator,
    plan: ChunkPlan,
    next_part: u64,
    delivered: u64,
    done: bool,
    stats: Option<Arc<StatsCollector>>,
    guard: Option<WorkloadGuard>,
}

impl RangeStream {
    fn new(
        source: Arc<dyn ChunkSource>,
        locator: FileLocator,
        plan: ChunkPlan,
        stats: Option<Arc<StatsCollector>>,
        guard: Option<WorkloadGuard>,
    ) -> Self {
        Self {
            source,
            locator,
            plan,
            next_part: 0,
            delivered: 0,
            done: false,
            stats,
            guard,
        }
    }

    pub fn plan(&self) -> &ChunkPlan {
        &self.plan
    }

    /// Bytes handed out so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    fn finish(&mut self) {
        self.done = true;
        self.guard = None;
    }

    /// Fetch and trim the next chunk. `None` once the interval is complete or after an error.
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes>> {
        if self.done || self.next_part >= self.plan.part_count {
            self.finish();
            return None;
        }

        let part = self.next_part;
        let chunk = self.plan.first_chunk() + part;
        let fetched = self
            .source
            .fetch_chunk(&self.locator, chunk, self.plan.chunk_size)
            .await;

        let data = match fetched {
            Ok(data) => data,
            Err(e) => {
                warn!("chunk {} of {} failed: {}", chunk, self.locator, e);
                if let Some(stats) = &self.stats {
                    stats.record_failure();
                }
                self.finish();
                return Some(Err(Error::StreamFetch { chunk, source: e }));
            }
        };

        let (from, to) = self.plan.slice_bounds(part);
        if (data.len() as u64) < to {
            if let Some(stats) = &self.stats {
                stats.record_failure();
            }
            self.finish();
            return Some(Err(Error::StreamFetch {
                chunk,
                source: SourceError::Other(anyhow!(
                    "short chunk: got {} bytes, need {}",
                    data.len(),
                    to
                )),
            }));
        }

        if let Some(stats) = &self.stats {
            stats.record_chunk(data.len() as u64);
        }

        let slice = data.slice(from as usize..to as usize);
        self.delivered += slice.len() as u64;
        self.next_part += 1;

        if self.next_part == self.plan.part_count {
            debug!(
                "range [{}, {}] of {} complete: {} bytes in {} chunks",
                self.plan.start, self.plan.end, self.locator, self.delivered, self.plan.part_count
            );
            self.finish();
        }

        Some(Ok(slice))
    }

    /// Adapt into a `Stream` for response bodies. Pull-driven: a chunk is only
    /// fetched when the consumer polls for it.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes>> + Send + 'static {
        futures::stream::unfold(self, |mut stream| async move {
            stream.next_chunk().await.map(|item| (item, stream))
        })
    }
}
