use serde::{Deserialize, Serialize};

/// Where a track's audio lives on the platform: the channel and the message carrying the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StorageCoordinates {
    pub chat_id: i64,
    pub msg_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub track_id: String,
    pub title: String,
    pub artist: String,
    pub artist_id: Option<String>,
    pub album: Option<String>,
    pub album_id: Option<String>,
    /// Duration in milliseconds.
    pub duration: Option<u64>,
    pub chat_id: Option<i64>,
    pub msg_id: Option<i64>,
    pub file_unique_id: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: Option<u64>,
    pub provider: Option<String>,
}

impl Track {
    /// Channel ids are non-zero (negative for channels), message ids are positive.
    pub fn storage(&self) -> Option<StorageCoordinates> {
        match (self.chat_id, self.msg_id) {
            (Some(chat_id), Some(msg_id)) if chat_id != 0 && msg_id > 0 => {
                Some(StorageCoordinates { chat_id, msg_id })
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub artist_id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    pub image: Option<String>,
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub album_id: String,
    pub title: String,
    pub artist: String,
    pub artist_id: Option<String>,
    pub release_date: Option<String>,
    pub total_tracks: Option<u32>,
    pub cover: Option<String>,
    pub provider: Option<String>,
}
