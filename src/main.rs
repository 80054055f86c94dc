use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::{info, warn};

use chunkcast::catalog::sqlite::SqliteCatalog;
use chunkcast::config::EngineConfig;
use chunkcast::engine::pool::SessionPool;
use chunkcast::engine::session::SessionRole;
use chunkcast::server::{AppState, StreamServer};
use chunkcast::source::http_source::HttpChunkSource;
use chunkcast::source::traits::ChunkSource;
use chunkcast::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let config = match std::env::var("CHUNKCAST_CONFIG") {
        Ok(path) => EngineConfig::from_json_file(Path::new(&path))?,
        Err(_) => EngineConfig::from_env()?,
    };

    let catalog = Arc::new(SqliteCatalog::open(Path::new(&config.catalog_path))?);

    let gateway = config.gateway_url.clone();
    let connector = move |credential: &str, _role: SessionRole| -> Result<Arc<dyn ChunkSource>> {
        Ok(Arc::new(HttpChunkSource::new(gateway.clone(), credential)))
    };
    let pool = Arc::new(SessionPool::from_config(&config, &connector)?);

    let report = pool.start_all().await;
    let primary_up = pool.primary().map(|p| p.is_running()).unwrap_or(false);
    if !primary_up {
        pool.stop_all().await;
        bail!("primary session failed to start");
    }
    if report.failed > 0 {
        warn!("{} worker sessions failed to start, continuing degraded", report.failed);
    }

    let state = AppState::new(pool.clone(), catalog, config.chunk_size);
    let server = StreamServer::start(state, &config.bind_addr).await?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    server.shutdown().await;
    pool.stop_all().await;
    Ok(())
}
