use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;

use super::models::{Album, Artist, Track};
use super::{Catalog, Page};

/// Insertion-ordered in-memory catalog.
#[derive(Default)]
pub struct MemoryCatalog {
    tracks: RwLock<Vec<Track>>,
    artists: RwLock<Vec<Artist>>,
    albums: RwLock<Vec<Album>>,
}

fn page_of<T: Clone>(items: &[T], page: Page) -> Vec<T> {
    items
        .iter()
        .skip(page.skip() as usize)
        .take(page.limit() as usize)
        .cloned()
        .collect()
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_track(&self, track: Track) {
        self.tracks.write().push(track);
    }

    pub fn insert_artist(&self, artist: Artist) {
        self.artists.write().push(artist);
    }

    pub fn insert_album(&self, album: Album) {
        self.albums.write().push(album);
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn track(&self, track_id: &str) -> Result<Option<Track>> {
        Ok(self
            .tracks
            .read()
            .iter()
            .find(|t| t.track_id == track_id)
            .cloned())
    }

    async fn tracks(&self, page: Page) -> Result<Vec<Track>> {
        Ok(page_of(&self.tracks.read(), page))
    }

    async fn artist(&self, artist_id: &str) -> Result<Option<Artist>> {
        Ok(self
            .artists
            .read()
            .iter()
            .find(|a| a.artist_id == artist_id)
            .cloned())
    }

    async fn artists(&self, page: Page) -> Result<Vec<Artist>> {
        Ok(page_of(&self.artists.read(), page))
    }

    async fn album(&self, album_id: &str) -> Result<Option<Album>> {
        Ok(self
            .albums
            .read()
            .iter()
            .find(|a| a.album_id == album_id)
            .cloned())
    }

    async fn albums(&self, page: Page) -> Result<Vec<Album>> {
        Ok(page_of(&self.albums.read(), page))
    }
}
