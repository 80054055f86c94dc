// SQLite-backed catalog. Listings come back in insertion order.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::models::{Album, Artist, Track};
use super::{Catalog, Page};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS songs (
        track_id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        artist TEXT NOT NULL,
        artist_id TEXT,
        album TEXT,
        album_id TEXT,
        duration INTEGER,
        chat_id INTEGER,
        msg_id INTEGER,
        file_unique_id TEXT,
        mime_type TEXT,
        file_size INTEGER,
        provider TEXT
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_songs_storage ON songs (chat_id, msg_id);
    CREATE INDEX IF NOT EXISTS idx_songs_file_unique_id ON songs (file_unique_id);
    CREATE INDEX IF NOT EXISTS idx_songs_artist ON songs (artist);

    CREATE TABLE IF NOT EXISTS artists (
        artist_id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        genres TEXT NOT NULL DEFAULT '[]',
        image TEXT,
        provider TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_artists_name ON artists (name);

    CREATE TABLE IF NOT EXISTS albums (
        album_id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        artist TEXT NOT NULL,
        artist_id TEXT,
        release_date TEXT,
        total_tracks INTEGER,
        cover TEXT,
        provider TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_albums_artist_id ON albums (artist_id);
";

const TRACK_COLUMNS: &str = "track_id, title, artist, artist_id, album, album_id, duration, \
     chat_id, msg_id, file_unique_id, mime_type, file_size, provider";
const ARTIST_COLUMNS: &str = "artist_id, name, genres, image, provider";
const ALBUM_COLUMNS: &str =
    "album_id, title, artist, artist_id, release_date, total_tracks, cover, provider";

fn track_from_row(row: &Row<'_>) -> rusqlite::Result<Track> {
    Ok(Track {
        track_id: row.get(0)?,
        title: row.get(1)?,
        artist: row.get(2)?,
        artist_id: row.get(3)?,
        album: row.get(4)?,
        album_id: row.get(5)?,
        duration: row.get::<_, Option<i64>>(6)?.map(|v| v as u64),
        chat_id: row.get(7)?,
        msg_id: row.get(8)?,
        file_unique_id: row.get(9)?,
        mime_type: row.get(10)?,
        file_size: row.get::<_, Option<i64>>(11)?.map(|v| v as u64),
        provider: row.get(12)?,
    })
}

fn artist_from_row(row: &Row<'_>) -> rusqlite::Result<Artist> {
    let genres: String = row.get(2)?;
    Ok(Artist {
        artist_id: row.get(0)?,
        name: row.get(1)?,
        genres: serde_json::from_str(&genres)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?,
        image: row.get(3)?,
        provider: row.get(4)?,
    })
}

fn album_from_row(row: &Row<'_>) -> rusqlite::Result<Album> {
    Ok(Album {
        album_id: row.get(0)?,
        title: row.get(1)?,
        artist: row.get(2)?,
        artist_id: row.get(3)?,
        release_date: row.get(4)?,
        total_tracks: row.get::<_, Option<i64>>(5)?.map(|v| v as u32),
        cover: row.get(6)?,
        provider: row.get(7)?,
    })
}

/// Reads from the async `Catalog` trait run on the blocking pool.
pub struct SqliteCatalog {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalog {
    /// Open (or create) the catalog database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        info!("catalog opened at {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn insert_track(&self, track: &Track) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO songs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                TRACK_COLUMNS
            ),
            params![
                track.track_id,
                track.title,
                track.artist,
                track.artist_id,
                track.album,
                track.album_id,
                track.duration.map(|v| v as i64),
                track.chat_id,
                track.msg_id,
                track.file_unique_id,
                track.mime_type,
                track.file_size.map(|v| v as i64),
                track.provider,
            ],
        )?;
        Ok(())
    }

    /// Whether a track is already catalogued, by id or by platform file identity.
    pub fn track_exists(&self, track_id: &str, file_unique_id: Option<&str>) -> Result<bool> {
        let conn = self.conn.lock();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM songs WHERE track_id = ?1 OR (?2 IS NOT NULL AND file_unique_id = ?2) LIMIT 1",
                params![track_id, file_unique_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn insert_artist(&self, artist: &Artist) -> Result<()> {
        let genres = serde_json::to_string(&artist.genres)?;
        let conn = self.conn.lock();
        conn.execute(
            &format!("INSERT INTO artists ({}) VALUES (?1, ?2, ?3, ?4, ?5)", ARTIST_COLUMNS),
            params![
                artist.artist_id,
                artist.name,
                genres,
                artist.image,
                artist.provider
            ],
        )?;
        Ok(())
    }

    /// Whether an artist is already catalogued, by id or, failing that, by name.
    pub fn artist_exists(&self, artist_id: &str, name: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM artists WHERE artist_id = ?1 OR name = ?2 LIMIT 1",
                params![artist_id, name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn insert_album(&self, album: &Album) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO albums ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                ALBUM_COLUMNS
            ),
            params![
                album.album_id,
                album.title,
                album.artist,
                album.artist_id,
                album.release_date,
                album.total_tracks.map(i64::from),
                album.cover,
                album.provider,
            ],
        )?;
        Ok(())
    }

    pub fn album_exists(&self, album_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM albums WHERE album_id = ?1 LIMIT 1",
                [album_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn blocking<T, F>(&self, query: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || query(&conn.lock())).await?
    }

    async fn find<T: Send + 'static>(
        &self,
        table: &'static str,
        columns: &'static str,
        key: &'static str,
        id: &str,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Option<T>> {
        let id = id.to_string();
        self.blocking(move |conn| {
            let sql = format!("SELECT {} FROM {} WHERE {} = ?1", columns, table, key);
            Ok(conn.query_row(&sql, [&id], map).optional()?)
        })
        .await
    }

    async fn list<T: Send + 'static>(
        &self,
        table: &'static str,
        columns: &'static str,
        page: Page,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        self.blocking(move |conn| {
            let sql = format!(
                "SELECT {} FROM {} ORDER BY rowid LIMIT ?1 OFFSET ?2",
                columns, table
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![i64::from(page.limit()), page.skip() as i64], map)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn track(&self, track_id: &str) -> Result<Option<Track>> {
        self.find("songs", TRACK_COLUMNS, "track_id", track_id, track_from_row)
            .await
    }

    async fn tracks(&self, page: Page) -> Result<Vec<Track>> {
        self.list("songs", TRACK_COLUMNS, page, track_from_row).await
    }

    async fn artist(&self, artist_id: &str) -> Result<Option<Artist>> {
        self.find("artists", ARTIST_COLUMNS, "artist_id", artist_id, artist_from_row)
            .await
    }

    async fn artists(&self, page: Page) -> Result<Vec<Artist>> {
        self.list("artists", ARTIST_COLUMNS, page, artist_from_row).await
    }

    async fn album(&self, album_id: &str) -> Result<Option<Album>> {
        self.find("albums", ALBUM_COLUMNS, "album_id", album_id, album_from_row)
            .await
    }

    async fn albums(&self, page: Page) -> Result<Vec<Album>> {
        self.list("albums", ALBUM_COLUMNS, page, album_from_row).await
    }
}
