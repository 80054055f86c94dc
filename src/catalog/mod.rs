// Catalog records the streaming path resolves against.

pub mod memory;
pub mod models;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use models::{Album, Artist, Track};

/// `limit`/`page` pagination as taken from the query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Page {
    pub limit: u32,
    pub page: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            page: 1,
        }
    }
}

impl Page {
    pub fn new(limit: u32, page: u32) -> Self {
        Self { limit, page }
    }

    /// Rows per page, clamped to `1..=MAX_PAGE_LIMIT`.
    pub fn limit(&self) -> u32 {
        self.limit.clamp(1, MAX_PAGE_LIMIT)
    }

    /// Rows skipped before this page: `(page - 1) * limit`, with page floored at 1.
    pub fn skip(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.limit())
    }
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn track(&self, track_id: &str) -> Result<Option<Track>>;
    async fn tracks(&self, page: Page) -> Result<Vec<Track>>;
    async fn artist(&self, artist_id: &str) -> Result<Option<Artist>>;
    async fn artists(&self, page: Page) -> Result<Vec<Artist>>;
    async fn album(&self, album_id: &str) -> Result<Option<Album>>;
    async fn albums(&self, page: Page) -> Result<Vec<Album>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_skip() {
        assert_eq!(Page::default().skip(), 0);
        assert_eq!(Page::new(10, 3).skip(), 20);
        assert_eq!(Page::new(25, 2).skip(), 25);
    }

    #[test]
    fn test_page_clamps() {
        assert_eq!(Page::new(0, 1).limit(), 1);
        assert_eq!(Page::new(10_000, 1).limit(), MAX_PAGE_LIMIT);
        assert_eq!(Page::new(10, 0).skip(), 0);
    }
}
