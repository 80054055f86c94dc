// Catalog read endpoints: paginated listings and lookups by id.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use super::AppState;
use crate::catalog::models::{Album, Artist, Track};
use crate::catalog::Page;
use crate::error::{Error, Result};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/songs", get(list_songs))
        .route("/songs/{id}", get(get_song))
        .route("/artists", get(list_artists))
        .route("/artists/{id}", get(get_artist))
        .route("/albums", get(list_albums))
        .route("/albums/{id}", get(get_album))
}

async fn list_songs(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<Track>>> {
    Ok(Json(state.catalog.tracks(page).await?))
}

async fn get_song(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Track>> {
    state
        .catalog
        .track(&id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::CatalogNotFound(format!("song {}", id)))
}

async fn list_artists(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<Artist>>> {
    Ok(Json(state.catalog.artists(page).await?))
}

async fn get_artist(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Artist>> {
    state
        .catalog
        .artist(&id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::CatalogNotFound(format!("artist {}", id)))
}

async fn list_albums(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<Album>>> {
    Ok(Json(state.catalog.albums(page).await?))
}

async fn get_album(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Album>> {
    state
        .catalog
        .album(&id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::CatalogNotFound(format!("album {}", id)))
}
