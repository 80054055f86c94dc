// Axum request handlers: HTTP range requests to session-backed chunk streams.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error};

use super::AppState;
use crate::catalog::models::Track;
use crate::config::FALLBACK_CONTENT_TYPE;
use crate::engine::session::{SessionStatus, WorkloadGuard};
use crate::error::{Error, Result};
use crate::source::traits::{FileDescriptor, SourceError};

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::CatalogNotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidStorageCoordinates(_) => StatusCode::BAD_REQUEST,
            Error::CapacityExhausted => {
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    [(header::RETRY_AFTER, "1")],
                    self.to_string(),
                )
                    .into_response();
            }
            Error::RangeNotSatisfiable { file_size, .. } => {
                return (
                    StatusCode::RANGE_NOT_SATISFIABLE,
                    [(header::CONTENT_RANGE, format!("bytes */{}", file_size))],
                    self.to_string(),
                )
                    .into_response();
            }
            Error::Resolve(SourceError::NotFound) => StatusCode::NOT_FOUND,
            Error::Resolve(SourceError::RateLimited(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Resolve(_) | Error::StreamFetch { .. } => StatusCode::BAD_GATEWAY,
            Error::Configuration(_)
            | Error::DuplicateSession(_)
            | Error::MultiplePrimary { .. }
            | Error::SessionStart { .. }
            | Error::Catalog(_) => {
                error!("request failed: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}

/// A single `bytes=<start>-[<end>]` range. Multi-range and suffix forms are not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ByteRange {
    start: u64,
    end: Option<u64>,
}

fn parse_range_header(value: &str) -> Option<ByteRange> {
    let rest = value.trim().strip_prefix("bytes=")?;
    let (start_str, end_str) = rest.split_once('-')?;
    let (start_str, end_str) = (start_str.trim(), end_str.trim());

    if start_str.is_empty() || !start_str.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let start: u64 = start_str.parse().ok()?;

    let end = if end_str.is_empty() {
        None
    } else {
        if !end_str.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let end: u64 = end_str.parse().ok()?;
        if end < start {
            return None;
        }
        Some(end)
    };

    Some(ByteRange { start, end })
}

/// Inclusive interval to serve. `end` is clamped to the last byte of the file.
fn requested_interval(range: Option<ByteRange>, file_size: u64) -> Result<(u64, u64)> {
    let last = file_size - 1;
    match range {
        None => Ok((0, last)),
        Some(ByteRange { start, end }) => {
            let end = end.unwrap_or(last).min(last);
            if start > end {
                return Err(Error::RangeNotSatisfiable {
                    start,
                    end,
                    file_size,
                });
            }
            Ok((start, end))
        }
    }
}

/// A track resolved on a selected session, ready to stream.
struct Resolved {
    track: Track,
    guard: WorkloadGuard,
    file: FileDescriptor,
}

impl Resolved {
    fn content_type(&self) -> HeaderValue {
        self.track
            .mime_type
            .as_deref()
            .or(self.file.mime_type.as_deref())
            .and_then(|ct| HeaderValue::from_str(ct).ok())
            .unwrap_or_else(|| HeaderValue::from_static(FALLBACK_CONTENT_TYPE))
    }
}

/// Catalog lookup, coordinate check, session selection, then platform resolution.
///
/// Selection happens before any chunk source is contacted, so an exhausted pool
/// answers 503 without touching the platform.
async fn resolve_track(state: &AppState, track_id: &str) -> Result<Resolved> {
    let track = state
        .catalog
        .track(track_id)
        .await?
        .ok_or_else(|| Error::CatalogNotFound(format!("track {}", track_id)))?;

    let storage = track
        .storage()
        .ok_or_else(|| Error::InvalidStorageCoordinates(track_id.to_string()))?;

    let guard = state.pool.acquire()?;
    let file = guard
        .session()
        .source()
        .resolve(storage.chat_id, storage.msg_id)
        .await
        .map_err(Error::Resolve)?;

    debug!(
        "track {} resolved on session {}: {} bytes",
        track_id,
        guard.session().id(),
        file.size
    );
    Ok(Resolved { track, guard, file })
}

fn requested_range(headers: &HeaderMap) -> Option<ByteRange> {
    headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_range_header)
}

fn framed(
    status: StatusCode,
    content_type: HeaderValue,
    content_length: u64,
    content_range: Option<String>,
    body: Body,
) -> Response {
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, content_length)
        .header(header::ACCEPT_RANGES, "bytes");
    if let Some(range) = content_range {
        builder = builder.header(header::CONTENT_RANGE, range);
    }
    builder.body(body).unwrap_or_else(|e| {
        error!("failed to build response: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}

/// GET /stream/{track_id}: serve the track with single-range support.
pub async fn stream_handler(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response> {
    let resolved = resolve_track(&state, &track_id).await?;
    let content_type = resolved.content_type();
    let total = resolved.file.size;

    if total == 0 {
        return Ok(framed(StatusCode::OK, content_type, 0, None, Body::empty()));
    }

    let range = requested_range(&headers);
    let (start, end) = requested_interval(range, total)?;
    let plan = state.streamer.plan(start, end, total)?;

    debug!(
        "stream request track={} session={} range=[{}, {}] parts={}",
        track_id,
        resolved.guard.session().id(),
        start,
        end,
        plan.part_count
    );

    let Resolved { guard, file, .. } = resolved;
    let stream = state.streamer.stream_on(guard, file.locator, plan);
    let body = Body::from_stream(stream.into_stream());

    let (status, content_range) = if range.is_some() {
        (
            StatusCode::PARTIAL_CONTENT,
            Some(format!("bytes {}-{}/{}", start, end, total)),
        )
    } else {
        (StatusCode::OK, None)
    };

    Ok(framed(status, content_type, plan.total_bytes(), content_range, body))
}

/// HEAD /stream/{track_id}: the GET framing without fetching any chunk.
pub async fn head_handler(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response> {
    let resolved = resolve_track(&state, &track_id).await?;
    let content_type = resolved.content_type();
    let total = resolved.file.size;

    if total == 0 {
        return Ok(framed(StatusCode::OK, content_type, 0, None, Body::empty()));
    }

    let range = requested_range(&headers);
    let (start, end) = requested_interval(range, total)?;
    let (status, content_range) = if range.is_some() {
        (
            StatusCode::PARTIAL_CONTENT,
            Some(format!("bytes {}-{}/{}", start, end, total)),
        )
    } else {
        (StatusCode::OK, None)
    };

    Ok(framed(
        status,
        content_type,
        end - start + 1,
        content_range,
        Body::empty(),
    ))
}

#[derive(Debug, Serialize)]
pub struct PoolStatus {
    pub sessions: Vec<SessionStatus>,
    pub failed: usize,
    pub config_rejections: usize,
}

/// GET /sessions: state and workload of every registered session.
pub async fn sessions_handler(State(state): State<AppState>) -> Json<PoolStatus> {
    Json(PoolStatus {
        sessions: state.pool.all().iter().map(|s| s.status()).collect(),
        failed: state.pool.failed_count(),
        config_rejections: state.pool.config_rejections(),
    })
}
