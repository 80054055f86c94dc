use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use super::traits::{ChunkSource, FileDescriptor, FileLocator, SourceError};

struct StoredFile {
    data: Bytes,
    mime_type: Option<String>,
}

/// In-process chunk source holding whole files in memory.
///
/// Used by the tests and for running the server without a platform gateway.
/// Failures can be injected on connect and on individual chunk indexes.
#[derive(Default)]
pub struct MemoryChunkSource {
    files: RwLock<HashMap<String, StoredFile>>,
    failing_chunks: RwLock<HashSet<u64>>,
    fail_connect: AtomicBool,
    connects: AtomicU64,
    resolves: AtomicU64,
    fetches: AtomicU64,
}

impl MemoryChunkSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(chat_id: i64, message_id: i64) -> String {
        format!("{}:{}", chat_id, message_id)
    }

    pub fn insert_file(
        &self,
        chat_id: i64,
        message_id: i64,
        data: impl Into<Bytes>,
        mime_type: Option<&str>,
    ) {
        self.files.write().insert(
            Self::key(chat_id, message_id),
            StoredFile {
                data: data.into(),
                mime_type: mime_type.map(str::to_string),
            },
        );
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::Relaxed);
    }

    /// Make every fetch of `chunk_index` fail with a network error.
    pub fn fail_chunk(&self, chunk_index: u64) {
        self.failing_chunks.write().insert(chunk_index);
    }

    pub fn connect_count(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }

    pub fn resolve_count(&self) -> u64 {
        self.resolves.load(Ordering::Relaxed)
    }

    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ChunkSource for MemoryChunkSource {
    async fn connect(&self) -> Result<()> {
        self.connects.fetch_add(1, Ordering::Relaxed);
        if self.fail_connect.load(Ordering::Relaxed) {
            return Err(anyhow!("connection refused"));
        }
        Ok(())
    }

    async fn resolve(&self, chat_id: i64, message_id: i64) -> Result<FileDescriptor, SourceError> {
        self.resolves.fetch_add(1, Ordering::Relaxed);
        let key = Self::key(chat_id, message_id);
        let files = self.files.read();
        let file = files.get(&key).ok_or(SourceError::NotFound)?;
        Ok(FileDescriptor {
            size: file.data.len() as u64,
            mime_type: file.mime_type.clone(),
            locator: FileLocator::new(key),
        })
    }

    async fn fetch_chunk(
        &self,
        locator: &FileLocator,
        chunk_index: u64,
        chunk_size: u64,
    ) -> Result<Bytes, SourceError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        if self.failing_chunks.read().contains(&chunk_index) {
            return Err(SourceError::Network(format!(
                "injected failure at chunk {}",
                chunk_index
            )));
        }

        let files = self.files.read();
        let file = files.get(locator.as_str()).ok_or(SourceError::NotFound)?;
        let len = file.data.len() as u64;
        let start = (chunk_index * chunk_size).min(len);
        let end = (start + chunk_size).min(len);
        Ok(file.data.slice(start as usize..end as usize))
    }
}
