// HTTP surface: range streaming plus catalog and session reads.

pub mod catalog_api;
pub mod handler;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::catalog::Catalog;
use crate::engine::pool::SessionPool;
use crate::engine::streamer::RangeStreamer;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<SessionPool>,
    pub catalog: Arc<dyn Catalog>,
    pub streamer: RangeStreamer,
}

impl AppState {
    pub fn new(pool: Arc<SessionPool>, catalog: Arc<dyn Catalog>, chunk_size: u64) -> Self {
        Self {
            pool,
            catalog,
            streamer: RangeStreamer::new(chunk_size),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/stream/{track_id}",
            get(handler::stream_handler).head(handler::head_handler),
        )
        .route("/sessions", get(handler::sessions_handler))
        .merge(catalog_api::routes())
        .with_state(state)
}

pub struct StreamServer {
    addr: SocketAddr,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl StreamServer {
    /// Bind `bind_addr` (use port 0 for a random port) and serve in the background.
    pub async fn start(state: AppState, bind_addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let app = router(state);

        let task = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = served {
                error!("http server exited with error: {}", e);
            }
        });

        info!("stream server listening on {}", addr);
        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Build a URL for streaming a specific track.
    pub fn url_for_track(&self, track_id: &str) -> String {
        format!("http://127.0.0.1:{}/stream/{}", self.addr.port(), track_id)
    }

    /// Stop accepting connections and wait for in-flight responses to drain.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}
