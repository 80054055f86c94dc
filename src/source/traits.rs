use std::fmt;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Opaque platform handle for a resolved file, only meaningful to the source that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileLocator(String);

impl FileLocator {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct FileDescriptor {
    pub size: u64,
    pub mime_type: Option<String>,
    pub locator: FileLocator,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("file not found")]
    NotFound,
    #[error("rate limited (retry after {0:?})")]
    RateLimited(Option<Duration>),
    #[error("credential rejected: HTTP {0}")]
    Rejected(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        SourceError::Network(e.to_string())
    }
}

/// Platform client capability owned by one session.
///
/// `fetch_chunk` returns the bytes `[index * chunk_size, (index + 1) * chunk_size)`
/// clipped to the file end.
#[async_trait]
pub trait ChunkSource: Send + Sync {
    async fn resolve(&self, chat_id: i64, message_id: i64) -> Result<FileDescriptor, SourceError>;
    async fn fetch_chunk(
        &self,
        locator: &FileLocator,
        chunk_index: u64,
        chunk_size: u64,
    ) -> Result<Bytes, SourceError>;
    async fn connect(&self) -> Result<()> {
        Ok(())
    }
    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}
