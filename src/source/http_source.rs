use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, info, warn};

use super::traits::{ChunkSource, FileDescriptor, FileLocator, SourceError};

/// Chunk source backed by an HTTP file gateway in front of the messaging platform.
///
/// Files are addressed as `{base}/files/{chat_id}/{message_id}` and fetched with
/// byte-range requests; the session credential travels as a bearer token.
pub struct HttpChunkSource {
    client: Client,
    base_url: String,
    credential: Arc<RwLock<String>>,
    connected: AtomicBool,
}

impl HttpChunkSource {
    pub fn new(base_url: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential: Arc::new(RwLock::new(credential.into())),
            connected: AtomicBool::new(false),
        }
    }

    /// Replace the credential (e.g. after rotation). Takes effect on the next request.
    pub fn update_credential(&self, credential: String) {
        if !credential.trim().is_empty() {
            *self.credential.write() = credential;
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn build_request(&self, path: &str, range_header: Option<&str>) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let token = self.credential.read().clone();

        let mut req = self.client.get(&url).bearer_auth(token);
        if let Some(range) = range_header {
            req = req.header("Range", range);
        }
        req
    }

    fn check_status(resp: &Response, what: &str) -> Result<(), SourceError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        warn!("gateway {} failed status={}", what, status.as_u16());
        Err(match status {
            StatusCode::NOT_FOUND => SourceError::NotFound,
            StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimited(retry_after(resp.headers())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                SourceError::Rejected(status.as_u16())
            }
            other => SourceError::Network(format!("{} failed: HTTP {}", what, other.as_u16())),
        })
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Start offset from `Content-Range: bytes <start>-<end>/<total>`.
fn content_range_start(headers: &HeaderMap) -> Option<u64> {
    header_str(headers, &CONTENT_RANGE)?
        .strip_prefix("bytes ")?
        .split_once('-')
        .and_then(|(start, _)| start.trim().parse().ok())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &reqwest::header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[async_trait]
impl ChunkSource for HttpChunkSource {
    async fn connect(&self) -> Result<()> {
        let resp = self.build_request("session", None).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("gateway refused session: HTTP {}", status.as_u16()));
        }
        self.connected.store(true, Ordering::Release);
        info!("gateway session established base={}", self.base_url);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::Release);
        Ok(())
    }

    async fn resolve(&self, chat_id: i64, message_id: i64) -> Result<FileDescriptor, SourceError> {
        let path = format!("files/{}/{}", chat_id, message_id);
        let resp = self.build_request(&path, Some("bytes=0-0")).send().await?;

        debug!("gateway resolve {} status={}", path, resp.status().as_u16());
        Self::check_status(&resp, "resolve")?;

        // Content-Range: bytes 0-0/<total>
        let headers = resp.headers();
        let size = if resp.status() == StatusCode::PARTIAL_CONTENT {
            header_str(headers, &CONTENT_RANGE)
                .and_then(|v| v.rsplit('/').next())
                .and_then(|v| v.parse::<u64>().ok())
        } else {
            header_str(headers, &CONTENT_LENGTH).and_then(|v| v.parse::<u64>().ok())
        }
        .ok_or_else(|| SourceError::Other(anyhow!("gateway did not report a size for {}", path)))?;

        let mime_type = header_str(headers, &CONTENT_TYPE)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        Ok(FileDescriptor {
            size,
            mime_type,
            locator: FileLocator::new(path),
        })
    }

    async fn fetch_chunk(
        &self,
        locator: &FileLocator,
        chunk_index: u64,
        chunk_size: u64,
    ) -> Result<Bytes, SourceError> {
        let start = chunk_index * chunk_size;
        let range = format!("bytes={}-{}", start, start + chunk_size - 1);
        let resp = self
            .build_request(locator.as_str(), Some(&range))
            .send()
            .await?;

        Self::check_status(&resp, "fetch_chunk")?;

        // Gateways may ignore Range. Only a 206 at the requested offset is usable,
        // or a full 200 body when the first chunk was asked for.
        let status = resp.status();
        let whole_file = status == StatusCode::OK && chunk_index == 0;
        if status == StatusCode::PARTIAL_CONTENT {
            let served_from = content_range_start(resp.headers());
            if served_from != Some(start) {
                return Err(SourceError::Network(format!(
                    "gateway served {} from offset {:?}, requested {}",
                    locator, served_from, start
                )));
            }
        } else if !whole_file {
            return Err(SourceError::Network(format!(
                "gateway ignored range {} for {} (HTTP {})",
                range,
                locator,
                status.as_u16()
            )));
        }

        let mut bytes = resp.bytes().await?;
        if whole_file {
            bytes.truncate(chunk_size as usize);
        }
        debug!(
            "gateway chunk {} of {} ({} bytes)",
            chunk_index,
            locator,
            bytes.len()
        );
        Ok(bytes)
    }
}
