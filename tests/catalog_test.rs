use chunkcast::catalog::models::{Album, Artist, Track};
use chunkcast::catalog::sqlite::SqliteCatalog;
use chunkcast::catalog::{Catalog, Page};

fn track(n: u32) -> Track {
    Track {
        track_id: format!("track-{}", n),
        title: format!("Song {}", n),
        artist: "Band".to_string(),
        duration: Some(180_000 + u64::from(n)),
        chat_id: Some(-1_001_234),
        msg_id: Some(i64::from(n) + 1),
        file_unique_id: Some(format!("uniq-{}", n)),
        mime_type: Some("audio/flac".to_string()),
        file_size: Some(5_000_000_000),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_tracks_persist_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");

    {
        let catalog = SqliteCatalog::open(&path).unwrap();
        for n in 0..5 {
            catalog.insert_track(&track(n)).unwrap();
        }
    }

    let catalog = SqliteCatalog::open(&path).unwrap();
    let found = catalog.track("track-3").await.unwrap().unwrap();
    assert_eq!(found, track(3));
    assert_eq!(found.storage().unwrap().msg_id, 4);
    assert!(catalog.track("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_track_pagination() {
    let catalog = SqliteCatalog::open_in_memory().unwrap();
    for n in 0..25 {
        catalog.insert_track(&track(n)).unwrap();
    }

    let first = catalog.tracks(Page::default()).await.unwrap();
    assert_eq!(first.len(), 10);
    assert_eq!(first[0].track_id, "track-0");

    let third = catalog.tracks(Page::new(10, 3)).await.unwrap();
    let ids: Vec<_> = third.iter().map(|t| t.track_id.as_str()).collect();
    assert_eq!(ids, ["track-20", "track-21", "track-22", "track-23", "track-24"]);

    assert!(catalog.tracks(Page::new(10, 4)).await.unwrap().is_empty());
    // limit 0 clamps to 1
    assert_eq!(catalog.tracks(Page::new(0, 1)).await.unwrap().len(), 1);
}

#[test]
fn test_track_exists_and_duplicate_coordinates() {
    let catalog = SqliteCatalog::open_in_memory().unwrap();
    catalog.insert_track(&track(1)).unwrap();

    assert!(catalog.track_exists("track-1", None).unwrap());
    assert!(catalog.track_exists("other", Some("uniq-1")).unwrap());
    assert!(!catalog.track_exists("other", None).unwrap());
    assert!(!catalog.track_exists("other", Some("uniq-9")).unwrap());

    // Same channel and message under another id.
    let mut clash = track(1);
    clash.track_id = "track-clash".to_string();
    assert!(catalog.insert_track(&clash).is_err());
}

#[tokio::test]
async fn test_artists_and_albums() {
    let catalog = SqliteCatalog::open_in_memory().unwrap();
    let artist = Artist {
        artist_id: "a1".to_string(),
        name: "Band".to_string(),
        genres: vec!["rock".to_string(), "shoegaze".to_string()],
        image: None,
        provider: Some("spotify".to_string()),
    };
    catalog.insert_artist(&artist).unwrap();

    let album = Album {
        album_id: "al1".to_string(),
        title: "Loveless".to_string(),
        artist: "Band".to_string(),
        artist_id: Some("a1".to_string()),
        release_date: Some("1991-11-04".to_string()),
        total_tracks: Some(11),
        ..Default::default()
    };
    catalog.insert_album(&album).unwrap();

    assert_eq!(catalog.artist("a1").await.unwrap(), Some(artist));
    assert!(catalog.artist_exists("zz", "Band").unwrap());
    assert!(!catalog.artist_exists("zz", "Other").unwrap());

    assert_eq!(catalog.album("al1").await.unwrap(), Some(album));
    assert!(catalog.album_exists("al1").unwrap());
    assert_eq!(catalog.albums(Page::default()).await.unwrap().len(), 1);
    assert!(catalog.artists(Page::new(10, 2)).await.unwrap().is_empty());
}
